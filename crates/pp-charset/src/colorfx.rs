//! Utilitaires sur les frames couleur : rotation et mélange déterministe.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use pp_core::ScreenSequence;

/// Décale les frames couleur de `offset` positions : l'écran `i` reçoit les
/// couleurs de l'écran `(offset + i) mod n`. Les codes écran ne bougent pas.
///
/// # Example
/// ```
/// use pp_core::{Charset, CharsetId, Screen, ScreenSequence};
/// use pp_charset::colorfx::offset_color_frames;
///
/// let mut s0 = Screen::blank(0, CharsetId(0));
/// s0.colors.fill(1);
/// let mut s1 = Screen::blank(1, CharsetId(0));
/// s1.colors.fill(2);
/// let mut seq = ScreenSequence::new(vec![s0, s1], vec![Charset::seeded()]);
///
/// offset_color_frames(&mut seq, 1);
/// assert_eq!(seq.screens[0].colors[0], 2);
/// assert_eq!(seq.screens[1].colors[0], 1);
/// ```
pub fn offset_color_frames(seq: &mut ScreenSequence, offset: usize) {
    let n = seq.screens.len();
    if n == 0 {
        return;
    }

    let color_frames: Vec<Vec<u8>> = seq.screens.iter().map(|s| s.colors.clone()).collect();
    let mut index = offset % n;
    for screen in &mut seq.screens {
        screen.colors = color_frames[index].clone();
        index = (index + 1) % n;
    }
}

/// Mélange les frames couleur avec une graine fixe, pour un résultat
/// reproductible d'une exécution à l'autre.
pub fn randomize_color_frames(seq: &mut ScreenSequence, seed: u64) {
    let mut color_frames: Vec<Vec<u8>> = seq.screens.iter().map(|s| s.colors.clone()).collect();

    let mut rng = StdRng::seed_from_u64(seed);
    color_frames.shuffle(&mut rng);

    for (screen, colors) in seq.screens.iter_mut().zip(color_frames) {
        screen.colors = colors;
    }
}
