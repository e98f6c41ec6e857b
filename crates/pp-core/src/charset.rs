use crate::glyph::{Glyph, GlyphEquality};

/// Taille maximale d'un charset : l'index d'un glyphe doit tenir dans un
/// octet de code écran.
pub const MAX_CHARSET_LEN: usize = 256;

/// Identifiant d'un charset dans l'arène d'une [`crate::ScreenSequence`].
///
/// Les écrans référencent leur charset par ce petit index plutôt que par
/// partage de pointeur, ce qui garde la propriété des données sans ambiguïté.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CharsetId(pub usize);

/// An ordered list of up to 256 glyphs.
///
/// The index of a glyph inside its charset is the byte written into a screen
/// cell. When the reducer builds a charset from scratch the first two
/// positions are reserved for [`Glyph::BLANK`] and [`Glyph::FULL`].
///
/// # Example
/// ```
/// use pp_core::{Charset, Glyph};
/// let cs = Charset::seeded();
/// assert_eq!(cs.glyphs()[0], Glyph::BLANK);
/// assert_eq!(cs.glyphs()[1], Glyph::FULL);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Charset {
    glyphs: Vec<Glyph>,
}

impl Charset {
    #[must_use]
    pub fn new() -> Self {
        Charset { glyphs: Vec::new() }
    }

    /// Charset amorcé avec BLANK puis FULL, comme le réducteur les construit.
    #[must_use]
    pub fn seeded() -> Self {
        Charset {
            glyphs: vec![Glyph::BLANK, Glyph::FULL],
        }
    }

    #[must_use]
    pub fn from_glyphs(glyphs: Vec<Glyph>) -> Self {
        debug_assert!(glyphs.len() <= MAX_CHARSET_LEN);
        Charset { glyphs }
    }

    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    #[inline(always)]
    #[must_use]
    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    #[inline(always)]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Glyph> {
        self.glyphs.get(index).copied()
    }

    /// Append a glyph and return its index.
    pub fn push(&mut self, glyph: Glyph) -> usize {
        self.glyphs.push(glyph);
        self.glyphs.len() - 1
    }

    /// Index of the first glyph bit-identical to `glyph`.
    #[must_use]
    pub fn position(&self, glyph: Glyph) -> Option<usize> {
        self.glyphs.iter().position(|&g| g == glyph)
    }

    /// Index of the first glyph equal to `glyph` under `eq`.
    ///
    /// Linear scan in charset order, so under a fuzzy mode the first
    /// near-match wins, matching the reducer's merge semantics.
    #[must_use]
    pub fn position_matching(&self, glyph: Glyph, eq: GlyphEquality) -> Option<usize> {
        self.glyphs.iter().position(|&g| eq.matches(glyph, g))
    }

    /// Closest glyph by Hamming distance, with early exit on distance 0.
    ///
    /// Returns `(index, distance)`; `None` only for an empty charset.
    ///
    /// # Example
    /// ```
    /// use pp_core::{Charset, Glyph};
    /// let cs = Charset::seeded();
    /// let almost_full = Glyph::from_rows([0xFF; 8].map(|r: u8| r & 0xFE));
    /// let (idx, dist) = cs.closest(almost_full).unwrap();
    /// assert_eq!(idx, 1); // FULL
    /// assert_eq!(dist, 8);
    /// ```
    #[must_use]
    pub fn closest(&self, glyph: Glyph) -> Option<(usize, u32)> {
        let mut best: Option<(usize, u32)> = None;
        for (idx, &candidate) in self.glyphs.iter().enumerate() {
            let d = glyph.distance(candidate);
            if d == 0 {
                return Some((idx, 0));
            }
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((idx, d));
            }
        }
        best
    }

    /// Sérialise en `8 * len` octets, 8 octets par glyphe, rangée 0 en tête,
    /// bit de poids fort à gauche. Pas d'en-tête.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.glyphs.len() * 8);
        for glyph in &self.glyphs {
            out.extend_from_slice(&glyph.rows());
        }
        out
    }

    /// Reads back a charset written by [`Charset::to_bytes`]. Trailing bytes
    /// that do not fill a whole glyph are ignored.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut glyphs = Vec::with_capacity(bytes.len() / 8);
        for chunk in bytes.chunks_exact(8) {
            let mut rows = [0u8; 8];
            rows.copy_from_slice(chunk);
            glyphs.push(Glyph::from_rows(rows));
        }
        Charset { glyphs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_reserves_blank_and_full() {
        let cs = Charset::seeded();
        assert_eq!(cs.len(), 2);
        assert_eq!(cs.position(Glyph::BLANK), Some(0));
        assert_eq!(cs.position(Glyph::FULL), Some(1));
    }

    #[test]
    fn position_matching_returns_first_fuzzy_hit() {
        let near_blank = Glyph::from_rows([1, 0, 0, 0, 0, 0, 0, 0]);
        let mut cs = Charset::seeded();
        cs.push(near_blank);

        // Exact finds the exact entry, fuzzy finds BLANK first (scan order).
        assert_eq!(cs.position_matching(near_blank, GlyphEquality::Exact), Some(2));
        assert_eq!(cs.position_matching(near_blank, GlyphEquality::Fuzzy(1)), Some(0));
    }

    #[test]
    fn closest_prefers_smallest_distance() {
        let mut cs = Charset::new();
        cs.push(Glyph::BLANK);
        cs.push(Glyph::from_rows([0xF0, 0, 0, 0, 0, 0, 0, 0]));

        let probe = Glyph::from_rows([0xE0, 0, 0, 0, 0, 0, 0, 0]);
        let (idx, dist) = cs.closest(probe).expect("non-empty charset");
        assert_eq!(idx, 1);
        assert_eq!(dist, 1);
    }

    #[test]
    fn closest_early_exits_on_exact() {
        let mut cs = Charset::seeded();
        cs.push(Glyph::from_rows([9, 9, 9, 9, 9, 9, 9, 9]));
        let (idx, dist) = cs.closest(Glyph::FULL).expect("non-empty charset");
        assert_eq!((idx, dist), (1, 0));
    }

    #[test]
    fn bytes_round_trip() {
        let mut cs = Charset::seeded();
        cs.push(Glyph::from_rows([0x18, 0x3C, 0x7E, 0xFF, 0xFF, 0x7E, 0x3C, 0x18]));
        let bytes = cs.to_bytes();
        assert_eq!(bytes.len(), 24);
        assert_eq!(Charset::from_bytes(&bytes), cs);
    }
}
