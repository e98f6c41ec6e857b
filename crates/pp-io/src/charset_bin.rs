//! Binaires de charset : 8 octets par glyphe, sans en-tête.
//!
//! Les fichiers `.64c` portent une adresse de chargement de 2 octets en
//! tête, sautée à la lecture.

use std::path::Path;

use anyhow::{Context, Result};
use pp_core::Charset;

/// Lit un charset binaire. L'extension `.64c` saute les 2 premiers octets.
///
/// # Errors
/// Retourne une erreur si le fichier est illisible ou contient plus de 256
/// glyphes.
pub fn read_charset_file(path: &Path) -> Result<Charset> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Impossible de lire le charset {}", path.display()))?;

    let skip = if path.extension().is_some_and(|e| e == "64c") {
        2
    } else {
        0
    };
    let payload = bytes.get(skip..).unwrap_or(&[]);

    let charset = Charset::from_bytes(payload);
    anyhow::ensure!(
        charset.len() <= 256,
        "charset {} holds {} glyphs, more than a screen code can address",
        path.display(),
        charset.len()
    );
    log::debug!("{}: {} glyphs", path.display(), charset.len());
    Ok(charset)
}

/// Écrit un charset binaire brut.
///
/// # Errors
/// Retourne une erreur d'E/S si l'écriture échoue.
pub fn write_charset_file(path: &Path, charset: &Charset) -> Result<()> {
    std::fs::write(path, charset.to_bytes())
        .with_context(|| format!("Impossible d'écrire le charset {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_core::Glyph;

    #[test]
    #[allow(clippy::expect_used)]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("charset_0.bin");

        let mut charset = Charset::seeded();
        charset.push(Glyph::from_rows([1, 2, 3, 4, 5, 6, 7, 8]));
        write_charset_file(&path, &charset).expect("write");

        let read = read_charset_file(&path).expect("read");
        assert_eq!(read, charset);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn sixty_four_c_header_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("font.64c");

        let charset = Charset::seeded();
        let mut bytes = vec![0x00, 0x38]; // load address
        bytes.extend(charset.to_bytes());
        std::fs::write(&path, bytes).expect("write");

        let read = read_charset_file(&path).expect("read");
        assert_eq!(read, charset);
    }
}
