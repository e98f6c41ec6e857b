//! Dump texte de frames : tableaux C d'entiers décimaux.
//!
//! Chaque frame est un bloc `unsigned char frameNNNN[]={...};` contenant
//! deux octets d'en-tête (bordure puis fond) suivis de 1000 codes écran et
//! 1000 codes couleur. Tous les écrans d'un dump partagent le même charset.

use pp_core::{Charset, CharsetId, PackError, Screen, ScreenSequence, SCREEN_CELLS, SCREEN_WIDTH};

/// Parse un dump texte contre un charset partagé.
///
/// # Errors
/// `InvalidInput` pour un bloc sans les 2002 valeurs attendues, une valeur
/// hors de `0..=255`, ou des codes écran débordant du charset.
///
/// # Example
/// ```
/// use pp_core::Charset;
/// use pp_io::frame_dump::{parse_frame_dump, write_frame_dump};
///
/// let charset = Charset::seeded();
/// let text = "unsigned char frame0000[]={// border,bg,chars,colors\n0, 0,\n".to_string()
///     + &"0,".repeat(2000)
///     + "\n};\n";
/// let seq = parse_frame_dump(&text, &charset).unwrap();
/// assert_eq!(seq.screens.len(), 1);
/// assert_eq!(write_frame_dump(&seq).matches("frame0000").count(), 1);
/// ```
pub fn parse_frame_dump(content: &str, charset: &Charset) -> Result<ScreenSequence, PackError> {
    let mut screens = Vec::new();

    for block in content.split("};") {
        let Some(open) = block.find('{') else { continue };
        let header = &block[..open];
        let Some(name) = header.find("frame") else { continue };

        let id: String = header[name + "frame".len()..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        let index = if id.is_empty() {
            screens.len()
        } else {
            id.parse::<usize>().map_err(|e| {
                PackError::InvalidInput(format!("bad frame id {id:?}: {e}"))
            })?
        };

        let values = parse_values(&block[open + 1..])?;
        if values.len() != 2 + 2 * SCREEN_CELLS {
            return Err(PackError::InvalidInput(format!(
                "frame {index}: expected {} values, found {}",
                2 + 2 * SCREEN_CELLS,
                values.len()
            )));
        }

        let mut screen = Screen::blank(index, CharsetId(0));
        screen.border = Some(values[0]);
        screen.background = Some(values[1]);
        screen.codes.copy_from_slice(&values[2..2 + SCREEN_CELLS]);
        screen
            .colors
            .copy_from_slice(&values[2 + SCREEN_CELLS..2 + 2 * SCREEN_CELLS]);
        screens.push(screen);
    }

    let seq = ScreenSequence::new(screens, vec![charset.clone()]);
    seq.check_invariants()?;
    log::debug!("parsed {} screens from frame dump", seq.screens.len());
    Ok(seq)
}

/// Valeurs décimales d'un corps de bloc, commentaires `//` ignorés.
fn parse_values(body: &str) -> Result<Vec<u8>, PackError> {
    let mut values = Vec::new();
    for line in body.lines() {
        let line = line.split("//").next().unwrap_or("");
        for item in line.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let value = item.parse::<u8>().map_err(|e| {
                PackError::InvalidInput(format!("bad byte value {item:?}: {e}"))
            })?;
            values.push(value);
        }
    }
    Ok(values)
}

/// Écrit la séquence au format dump, une frame par bloc.
#[must_use]
pub fn write_frame_dump(seq: &ScreenSequence) -> String {
    let mut out = String::new();
    for screen in &seq.screens {
        out.push_str(&format!(
            "unsigned char frame{:04}[]={{// border,bg,chars,colors\n",
            screen.index
        ));
        out.push_str(&format!(
            "{}, {},\n",
            screen.border.unwrap_or(0),
            screen.background.unwrap_or(0)
        ));
        write_rows(&mut out, &screen.codes);
        write_rows(&mut out, &screen.colors);
        out.push_str("};\n");
    }
    out
}

fn write_rows(out: &mut String, cells: &[u8]) {
    for row in cells.chunks(SCREEN_WIDTH) {
        let line: Vec<String> = row.iter().map(u8::to_string).collect();
        out.push_str(&line.join(","));
        out.push_str(",\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_core::Glyph;

    fn charset() -> Charset {
        let mut cs = Charset::seeded();
        for v in 1..=6u8 {
            cs.push(Glyph::from_rows([v; 8]));
        }
        cs
    }

    #[test]
    fn dump_round_trips() {
        let cs = charset();
        let mut screen = Screen::blank(3, CharsetId(0));
        screen.border = Some(2);
        screen.background = Some(6);
        for (cell, code) in screen.codes.iter_mut().enumerate() {
            *code = (cell % 7) as u8;
        }
        for (cell, color) in screen.colors.iter_mut().enumerate() {
            *color = (cell % 16) as u8;
        }
        let seq = ScreenSequence::new(vec![screen], vec![cs.clone()]);

        let text = write_frame_dump(&seq);
        let parsed = parse_frame_dump(&text, &cs).expect("round trip");

        assert_eq!(parsed.screens.len(), 1);
        assert_eq!(parsed.screens[0].index, 3);
        assert_eq!(parsed.screens[0].border, Some(2));
        assert_eq!(parsed.screens[0].background, Some(6));
        assert_eq!(parsed.screens[0].codes, seq.screens[0].codes);
        assert_eq!(parsed.screens[0].colors, seq.screens[0].colors);
    }

    #[test]
    fn header_order_is_border_then_background() {
        let mut screen = Screen::blank(0, CharsetId(0));
        screen.border = Some(11);
        screen.background = Some(12);
        let seq = ScreenSequence::new(vec![screen], vec![charset()]);

        let text = write_frame_dump(&seq);
        let header_line = text.lines().nth(1).expect("header line");
        assert_eq!(header_line, "11, 12,");
    }

    #[test]
    fn truncated_blocks_are_rejected() {
        let text = "unsigned char frame0000[]={\n1, 2,\n3, 4, 5,\n};";
        assert!(matches!(
            parse_frame_dump(text, &charset()),
            Err(PackError::InvalidInput(_))
        ));
    }

    #[test]
    fn out_of_range_codes_are_rejected() {
        // 8-glyph charset, code 250 out of range.
        let text = "unsigned char frame0000[]={\n0, 0,\n".to_string()
            + &"250,".repeat(SCREEN_CELLS)
            + &"0,".repeat(SCREEN_CELLS)
            + "};";
        assert!(matches!(
            parse_frame_dump(&text, &charset()),
            Err(PackError::InvalidInput(_))
        ));
    }

    #[test]
    fn unrelated_text_is_ignored() {
        let text = "// commentary only\nint x[]={1,2,3};";
        let seq = parse_frame_dump(text, &charset()).expect("no frames is fine");
        assert!(seq.screens.is_empty());
    }
}
