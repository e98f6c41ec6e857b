use crate::charset::{Charset, CharsetId};
use crate::error::PackError;

/// Largeur de l'écran en cellules.
pub const SCREEN_WIDTH: usize = 40;
/// Hauteur de l'écran en cellules.
pub const SCREEN_HEIGHT: usize = 25;
/// Nombre total de cellules.
pub const SCREEN_CELLS: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// One frame: a 40×25 grid of charset indices plus a parallel color grid.
///
/// `codes[offset]` indexes into the charset referenced by `charset`;
/// `colors[offset]` is a palette index. Border and background are optional
/// ("unchanged" when `None`).
///
/// # Example
/// ```
/// use pp_core::{CharsetId, Screen};
/// let screen = Screen::blank(0, CharsetId(0));
/// assert_eq!(screen.codes.len(), 1000);
/// assert_eq!(screen.codes[0], 0);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Screen {
    /// Index de la frame dans la séquence.
    pub index: usize,
    /// 1000 codes écran, row-major.
    pub codes: Vec<u8>,
    /// 1000 codes couleur, row-major.
    pub colors: Vec<u8>,
    /// Charset référencé dans l'arène de la séquence.
    pub charset: CharsetId,
    /// Couleur de bordure, `None` = inchangée.
    pub border: Option<u8>,
    /// Couleur de fond, `None` = inchangée.
    pub background: Option<u8>,
}

impl Screen {
    /// Écran vide (tout à zéro), sans bordure ni fond.
    #[must_use]
    pub fn blank(index: usize, charset: CharsetId) -> Self {
        Screen {
            index,
            codes: vec![0; SCREEN_CELLS],
            colors: vec![0; SCREEN_CELLS],
            charset,
            border: None,
            background: None,
        }
    }

    /// Cell accessor by row/column.
    #[inline(always)]
    #[must_use]
    pub fn code_at(&self, row: usize, col: usize) -> u8 {
        self.codes[row * SCREEN_WIDTH + col]
    }

    #[inline(always)]
    pub fn set_code(&mut self, row: usize, col: usize, code: u8) {
        self.codes[row * SCREEN_WIDTH + col] = code;
    }
}

/// An ordered list of screens plus the arena of charsets they reference.
///
/// Invariant: every screen code is a valid index into its screen's charset,
/// and every `CharsetId` is a valid index into `charsets`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScreenSequence {
    pub screens: Vec<Screen>,
    pub charsets: Vec<Charset>,
}

impl ScreenSequence {
    #[must_use]
    pub fn new(screens: Vec<Screen>, charsets: Vec<Charset>) -> Self {
        ScreenSequence { screens, charsets }
    }

    #[must_use]
    pub fn charset_of(&self, screen: &Screen) -> &Charset {
        &self.charsets[screen.charset.0]
    }

    /// Vérifie les invariants du modèle de données.
    ///
    /// # Errors
    /// `InvalidInput` si un écran référence un charset absent, si un tableau
    /// n'a pas 1000 cellules, ou si un code écran déborde de son charset.
    pub fn check_invariants(&self) -> Result<(), PackError> {
        for screen in &self.screens {
            if screen.charset.0 >= self.charsets.len() {
                return Err(PackError::InvalidInput(format!(
                    "screen {} references missing charset {}",
                    screen.index, screen.charset.0
                )));
            }
            if screen.codes.len() != SCREEN_CELLS || screen.colors.len() != SCREEN_CELLS {
                return Err(PackError::InvalidInput(format!(
                    "screen {} has {} codes / {} colors, expected {SCREEN_CELLS}",
                    screen.index,
                    screen.codes.len(),
                    screen.colors.len()
                )));
            }
            let charset_len = self.charsets[screen.charset.0].len();
            for (offset, &code) in screen.codes.iter().enumerate() {
                if usize::from(code) >= charset_len {
                    return Err(PackError::InvalidInput(format!(
                        "screen {} offset {offset}: code {code} outside charset of {charset_len}",
                        screen.index
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::Glyph;

    #[test]
    fn blank_screen_is_all_zero() {
        let s = Screen::blank(3, CharsetId(0));
        assert_eq!(s.index, 3);
        assert!(s.codes.iter().all(|&c| c == 0));
        assert!(s.colors.iter().all(|&c| c == 0));
        assert_eq!(s.border, None);
    }

    #[test]
    fn cell_accessors_are_row_major() {
        let mut s = Screen::blank(0, CharsetId(0));
        s.set_code(1, 2, 7);
        assert_eq!(s.codes[42], 7);
        assert_eq!(s.code_at(1, 2), 7);
    }

    #[test]
    fn invariants_reject_out_of_range_code() {
        let mut charset = Charset::seeded();
        charset.push(Glyph::from_rows([1; 8]));
        let mut screen = Screen::blank(0, CharsetId(0));
        screen.codes[999] = 3; // charset has 3 glyphs, max code is 2

        let seq = ScreenSequence::new(vec![screen], vec![charset]);
        assert!(matches!(
            seq.check_invariants(),
            Err(PackError::InvalidInput(_))
        ));
    }

    #[test]
    fn invariants_accept_valid_sequence() {
        let seq = ScreenSequence::new(
            vec![Screen::blank(0, CharsetId(0))],
            vec![Charset::seeded()],
        );
        assert!(seq.check_invariants().is_ok());
    }
}
