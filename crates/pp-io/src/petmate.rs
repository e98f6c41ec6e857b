//! Conteneur JSON structuré : framebufs par cellule et polices embarquées.
//!
//! Chaque framebuf nomme son charset ; le nom est résolu contre les
//! `customFonts` du fichier (8 octets par glyphe dans `bits`) ou contre le
//! charset par défaut fourni par l'appelant. Les charsets sont internés
//! dans l'ordre de première référence.

use std::collections::HashMap;

use pp_core::{
    Charset, CharsetId, PackError, Screen, ScreenSequence, SCREEN_HEIGHT, SCREEN_WIDTH,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct PetmateFile {
    framebufs: Vec<Framebuf>,
    #[serde(rename = "customFonts", default)]
    custom_fonts: HashMap<String, CustomFont>,
}

#[derive(Deserialize)]
struct Framebuf {
    charset: String,
    #[serde(rename = "borderColor")]
    border_color: u8,
    #[serde(rename = "backgroundColor")]
    background_color: u8,
    framebuf: Vec<Vec<Cell>>,
}

#[derive(Deserialize)]
struct Cell {
    code: u8,
    color: u8,
}

#[derive(Deserialize)]
struct CustomFont {
    font: FontBits,
}

#[derive(Deserialize)]
struct FontBits {
    bits: Vec<u8>,
}

/// Parse un conteneur JSON en séquence d'écrans.
///
/// `default_charset` répond aux noms de charset absents des polices
/// embarquées (typiquement la police machine).
///
/// # Errors
/// `InvalidInput` pour un JSON malformé, un nom de charset irrésolu, ou une
/// police embarquée qui ne code pas un nombre entier de glyphes.
pub fn parse_petmate(
    json: &str,
    default_charset: Option<&Charset>,
) -> Result<ScreenSequence, PackError> {
    let file: PetmateFile = serde_json::from_str(json)
        .map_err(|e| PackError::InvalidInput(format!("bad petmate container: {e}")))?;

    let mut charsets: Vec<Charset> = Vec::new();
    let mut interned: HashMap<String, usize> = HashMap::new();
    let mut screens = Vec::new();

    for (index, frame) in file.framebufs.iter().enumerate() {
        let charset_id = match interned.get(&frame.charset) {
            Some(&id) => id,
            None => {
                let charset = resolve_charset(&frame.charset, &file.custom_fonts, default_charset)?;
                charsets.push(charset);
                let id = charsets.len() - 1;
                interned.insert(frame.charset.clone(), id);
                id
            }
        };
        log::debug!(
            "frame {index}: charset {:?}, border {}, background {}",
            frame.charset,
            frame.border_color,
            frame.background_color
        );

        let mut screen = Screen::blank(index, CharsetId(charset_id));
        screen.border = Some(frame.border_color);
        screen.background = Some(frame.background_color);
        for (row, cells) in frame.framebuf.iter().take(SCREEN_HEIGHT).enumerate() {
            for (col, cell) in cells.iter().take(SCREEN_WIDTH).enumerate() {
                let offset = row * SCREEN_WIDTH + col;
                screen.codes[offset] = cell.code;
                screen.colors[offset] = cell.color;
            }
        }
        screens.push(screen);
    }

    let seq = ScreenSequence::new(screens, charsets);
    seq.check_invariants()?;
    Ok(seq)
}

fn resolve_charset(
    name: &str,
    fonts: &HashMap<String, CustomFont>,
    default_charset: Option<&Charset>,
) -> Result<Charset, PackError> {
    if let Some(font) = fonts.get(name) {
        return charset_from_bits(name, &font.font.bits);
    }
    default_charset.cloned().ok_or_else(|| {
        PackError::InvalidInput(format!("cannot resolve charset {name:?} and no default given"))
    })
}

/// Police embarquée : 8 octets par glyphe, rangée 0 en tête.
fn charset_from_bits(name: &str, bits: &[u8]) -> Result<Charset, PackError> {
    if bits.len() % 8 != 0 {
        return Err(PackError::InvalidInput(format!(
            "custom font {name:?}: {} bytes is not a whole number of glyphs",
            bits.len()
        )));
    }
    let glyph_count = bits.len() / 8;
    if glyph_count > 256 {
        return Err(PackError::InvalidInput(format!(
            "custom font {name:?}: {glyph_count} glyphs exceed a charset"
        )));
    }
    log::debug!("custom font {name:?}: {glyph_count} glyphs");
    Ok(Charset::from_bytes(bits))
}
