//! Réordonnancement des frames par similarité de glyphes.
//!
//! Parcours glouton : on part de la frame qui partage le plus de glyphes
//! avec les autres, puis on enchaîne à chaque pas la frame non placée la
//! plus proche de la courante. Moins de glyphes changent entre frames
//! adjacentes, moins le packer émet de changements de charset.

use std::collections::HashSet;

use pp_core::{Glyph, ScreenSequence};

/// Glyphes réellement utilisés par les cellules d'un écran.
fn used_glyphs(seq: &ScreenSequence, index: usize) -> HashSet<Glyph> {
    let screen = &seq.screens[index];
    let charset = seq.charset_of(screen);
    screen
        .codes
        .iter()
        .map(|&code| charset.glyphs()[usize::from(code)])
        .collect()
}

/// Réordonne les écrans pour que les frames partageant le plus de glyphes
/// soient adjacentes. Les séquences de deux frames ou moins sont laissées
/// telles quelles.
///
/// # Example
/// ```
/// use pp_core::{Charset, CharsetId, Screen, ScreenSequence};
/// use pp_charset::reorder_by_similarity;
///
/// let mut seq = ScreenSequence::new(
///     vec![Screen::blank(0, CharsetId(0)), Screen::blank(1, CharsetId(0))],
///     vec![Charset::seeded()],
/// );
/// reorder_by_similarity(&mut seq);
/// assert_eq!(seq.screens.len(), 2);
/// ```
pub fn reorder_by_similarity(seq: &mut ScreenSequence) {
    let n = seq.screens.len();
    if n <= 2 {
        return;
    }

    let glyph_sets: Vec<HashSet<Glyph>> = (0..n).map(|i| used_glyphs(seq, i)).collect();
    let shared = |a: usize, b: usize| glyph_sets[a].intersection(&glyph_sets[b]).count();

    // Frame de départ : la plus connectée aux autres (premier maximum).
    let mut start = 0usize;
    let mut best_total = 0usize;
    for i in 0..n {
        let total: usize = (0..n).filter(|&j| j != i).map(|j| shared(i, j)).sum();
        if total > best_total {
            best_total = total;
            start = i;
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut used = vec![false; n];
    let mut current = start;
    used[current] = true;
    order.push(current);

    while order.len() < n {
        let mut next = None;
        let mut best = 0usize;
        for candidate in 0..n {
            if used[candidate] {
                continue;
            }
            let score = shared(current, candidate);
            if next.is_none() || score > best {
                next = Some(candidate);
                best = score;
            }
        }
        let Some(next) = next else { break };
        used[next] = true;
        order.push(next);
        current = next;
    }

    let mut screens = std::mem::take(&mut seq.screens);
    let mut reordered = Vec::with_capacity(n);
    // Drain in the greedy order; indices shift as we remove, so mark instead.
    let mut taken: Vec<Option<pp_core::Screen>> = screens.drain(..).map(Some).collect();
    for index in order {
        if let Some(screen) = taken[index].take() {
            reordered.push(screen);
        }
    }
    seq.screens = reordered;

    log::info!("reordered {n} frames by glyph similarity");
}
