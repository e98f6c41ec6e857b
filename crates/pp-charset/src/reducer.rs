//! Réduction des charsets par frame vers N charsets globaux.
//!
//! Phase A : fusion exacte autour d'un charset d'amorce, fermeture à 255
//! entrées. Phase B : si la phase A dépasse la limite, l'égalité entre
//! glyphes est élargie (distance de Hamming ≤ t) et la phase A est rejouée
//! avec t croissant jusqu'à tenir dans la limite. Le mode d'égalité est
//! passé explicitement ; en dehors du réducteur l'égalité reste bit à bit.

use std::collections::HashMap;

use pp_core::{Charset, CharsetId, Glyph, GlyphEquality, PackError, Screen, ScreenSequence};

/// Le remplissage par usage du charset d'amorce s'arrête à cette taille.
pub const SEED_FILL_LIMIT: usize = 31;

/// Un charset est fermé plutôt que de dépasser cette taille : l'index doit
/// rester un code écran valide et la dernière entrée est réservée.
const CHARSET_SOFT_CAP: usize = 255;

/// Nombre de glyphes gardés par l'effondrement, en plus de BLANK et FULL.
const COLLAPSE_KEEP: usize = 253;

/// Diagnostics d'une passe de fusion (phase A).
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeReport {
    /// Charsets produits.
    pub charsets: usize,
    /// Glyphes uniques du pool (sous le mode d'égalité de la passe).
    pub unique_glyphs: usize,
    /// Cellules remappées sur un glyphe approchant (erreur de Hamming > 0).
    pub substituted_cells: usize,
    /// Frames touchées par au moins une substitution.
    pub affected_frames: usize,
    /// Erreur de Hamming maximale observée lors du remap.
    pub max_error: u32,
}

/// Diagnostics d'une réduction complète (phase A + phase B éventuelle).
#[derive(Clone, Copy, Debug, Default)]
pub struct ReduceReport {
    /// Charsets finaux.
    pub charsets: usize,
    /// Seuil retenu par la phase B, `None` si la fusion exacte a suffi.
    pub threshold: Option<u32>,
    /// Cellules substituées par la dernière passe.
    pub substituted_cells: usize,
    /// Frames touchées par la dernière passe.
    pub affected_frames: usize,
    /// Erreur maximale observée par la dernière passe.
    pub max_error: u32,
}

/// Un glyphe du pool et ses statistiques d'usage, tenues hors du glyphe
/// lui-même pour qu'il reste un simple type valeur.
struct PoolEntry {
    glyph: Glyph,
    /// Positions de frame où le glyphe apparaît, en ordre croissant.
    frames: Vec<usize>,
    /// Cellules qui l'utilisent, toutes frames confondues.
    uses: usize,
}

/// Pool ordonné des glyphes uniques de la séquence, en ordre de première
/// rencontre (frame, rangée, colonne). L'itération suit toujours l'ordre
/// d'insertion pour garder la réduction déterministe.
struct GlyphPool {
    entries: Vec<PoolEntry>,
    exact_index: HashMap<Glyph, usize>,
}

impl GlyphPool {
    fn build(seq: &ScreenSequence, eq: GlyphEquality) -> Self {
        let mut pool = GlyphPool {
            entries: Vec::new(),
            exact_index: HashMap::new(),
        };

        for (frame, screen) in seq.screens.iter().enumerate() {
            let charset = seq.charset_of(screen);
            for &code in &screen.codes {
                let glyph = charset.glyphs()[usize::from(code)];
                let slot = match pool.lookup(glyph, eq) {
                    Some(slot) => slot,
                    None => {
                        pool.entries.push(PoolEntry {
                            glyph,
                            frames: Vec::new(),
                            uses: 0,
                        });
                        let slot = pool.entries.len() - 1;
                        pool.exact_index.insert(glyph, slot);
                        slot
                    }
                };
                let entry = &mut pool.entries[slot];
                entry.uses += 1;
                if entry.frames.last() != Some(&frame) {
                    entry.frames.push(frame);
                }
            }
        }
        pool
    }

    /// Sous le mode flou, la recherche balaie le pool en ordre d'insertion et
    /// la première entrée approchante absorbe le glyphe.
    fn lookup(&self, glyph: Glyph, eq: GlyphEquality) -> Option<usize> {
        match eq {
            GlyphEquality::Exact => self.exact_index.get(&glyph).copied(),
            GlyphEquality::Fuzzy(_) => self
                .entries
                .iter()
                .position(|entry| eq.matches(glyph, entry.glyph)),
        }
    }

    fn uses_of(&self, glyph: Glyph) -> usize {
        self.exact_index
            .get(&glyph)
            .map_or(0, |&slot| self.entries[slot].uses)
    }
}

/// Amorce : BLANK et FULL, puis les glyphes présents dans chaque frame, puis
/// les plus utilisés jusqu'à 31 entrées.
fn build_seed(pool: &GlyphPool, frame_count: usize, eq: GlyphEquality) -> Charset {
    let mut seed = Charset::seeded();

    for entry in &pool.entries {
        if entry.frames.len() == frame_count && seed.position_matching(entry.glyph, eq).is_none() {
            seed.push(entry.glyph);
        }
    }

    let mut by_usage: Vec<&PoolEntry> = pool.entries.iter().collect();
    by_usage.sort_by(|a, b| b.uses.cmp(&a.uses)); // stable: ties keep first-seen order

    for entry in by_usage {
        if seed.len() >= SEED_FILL_LIMIT {
            break;
        }
        if seed.position_matching(entry.glyph, eq).is_none() {
            seed.push(entry.glyph);
        }
    }
    seed
}

/// Glyphes d'une frame en ordre de première cellule, dédupliqués bit à bit.
fn frame_glyphs(charset: &Charset, screen: &Screen) -> Vec<Glyph> {
    let mut seen = vec![false; charset.len()];
    let mut out = Vec::new();
    for &code in &screen.codes {
        let code = usize::from(code);
        if !seen[code] {
            seen[code] = true;
            out.push(charset.glyphs()[code]);
        }
    }
    out
}

/// Effondre un charset qui a dépassé 255 entrées.
///
/// Le choix de stratégie suit le taux de réduction : en dessous de 1.5 les
/// glyphes les plus utilisés sont gardés tels quels ; au-delà, BLANK et FULL
/// sont préservés en tête puis les places restantes sont remplies par usage
/// décroissant. Le palier agressif (≥ 3.0) se comporte comme le palier
/// intermédiaire.
fn collapse_charset(
    charset: &Charset,
    pool: &GlyphPool,
    frame: usize,
) -> Result<Charset, PackError> {
    let ratio = charset.len() as f64 / COLLAPSE_KEEP as f64;

    let collapsed = if ratio < 1.5 {
        let mut sorted: Vec<Glyph> = charset.glyphs().to_vec();
        sorted.sort_by(|a, b| pool.uses_of(*b).cmp(&pool.uses_of(*a)));
        let mut out = Charset::new();
        for glyph in sorted {
            if out.len() >= CHARSET_SOFT_CAP {
                break;
            }
            if out.position(glyph).is_none() {
                out.push(glyph);
            }
        }
        out
    } else {
        let mut sorted: Vec<Glyph> = charset
            .glyphs()
            .iter()
            .copied()
            .filter(|&g| g != Glyph::BLANK && g != Glyph::FULL)
            .collect();
        sorted.sort_by(|a, b| pool.uses_of(*b).cmp(&pool.uses_of(*a)));

        let mut out = Charset::seeded();
        for glyph in sorted {
            if out.len() >= 2 + COLLAPSE_KEEP {
                break;
            }
            if out.position(glyph).is_none() {
                out.push(glyph);
            }
        }
        out
    };

    if collapsed.len() > CHARSET_SOFT_CAP {
        return Err(PackError::CharsetLimitInfeasible {
            frame,
            glyphs: charset.len(),
        });
    }
    Ok(collapsed)
}

/// Remappe chaque écran sur son charset assigné : correspondance exacte
/// quand elle existe, sinon le glyphe le plus proche, avec une erreur de
/// Hamming bornée rapportée en diagnostic.
fn remap_screens(
    seq: &mut ScreenSequence,
    groups: Vec<Charset>,
    assign: &[usize],
    report: &mut MergeReport,
) -> Result<(), PackError> {
    let old_charsets = std::mem::take(&mut seq.charsets);

    for (frame, screen) in seq.screens.iter_mut().enumerate() {
        let old = &old_charsets[screen.charset.0];
        let new = &groups[assign[frame]];
        let mut cache: Vec<Option<(u8, u32)>> = vec![None; old.len()];
        let mut frame_substitutions = 0usize;

        for code in &mut screen.codes {
            let slot = usize::from(*code);
            let (new_code, error) = match cache[slot] {
                Some(hit) => hit,
                None => {
                    let glyph = old.glyphs()[slot];
                    let resolved = match new.position(glyph) {
                        Some(index) => (index as u8, 0),
                        None => {
                            let (index, distance) = new.closest(glyph).ok_or_else(|| {
                                PackError::InvalidInput("remap against an empty charset".into())
                            })?;
                            (index as u8, distance)
                        }
                    };
                    cache[slot] = Some(resolved);
                    resolved
                }
            };
            *code = new_code;
            if error > 0 {
                frame_substitutions += 1;
                report.substituted_cells += 1;
                report.max_error = report.max_error.max(error);
            }
        }

        if frame_substitutions > 0 {
            report.affected_frames += 1;
            log::debug!(
                "frame {frame}: {frame_substitutions} cells remapped to a nearby glyph"
            );
        }
        screen.charset = CharsetId(assign[frame]);
    }

    seq.charsets = groups;
    Ok(())
}

/// Phase A : fusionne les charsets par frame en une petite liste de charsets
/// globaux, sous le mode d'égalité donné, puis remappe les écrans.
///
/// # Errors
/// `CharsetLimitInfeasible` si une frame seule déborde même après
/// effondrement.
///
/// # Example
/// ```
/// use pp_core::{Charset, CharsetId, Glyph, GlyphEquality, Screen, ScreenSequence};
/// use pp_charset::merge_charsets;
///
/// let mut charset = Charset::seeded();
/// charset.push(Glyph::from_rows([0x18; 8]));
/// let mut screen = Screen::blank(0, CharsetId(0));
/// screen.codes[0] = 2;
/// let mut seq = ScreenSequence::new(vec![screen], vec![charset]);
///
/// let report = merge_charsets(&mut seq, GlyphEquality::Exact).unwrap();
/// assert_eq!(report.charsets, 1);
/// assert_eq!(report.substituted_cells, 0);
/// ```
pub fn merge_charsets(
    seq: &mut ScreenSequence,
    eq: GlyphEquality,
) -> Result<MergeReport, PackError> {
    let frame_count = seq.screens.len();
    if frame_count == 0 {
        seq.charsets = vec![Charset::seeded()];
        return Ok(MergeReport {
            charsets: 1,
            ..MergeReport::default()
        });
    }

    let pool = GlyphPool::build(seq, eq);
    let seed = build_seed(&pool, frame_count, eq);
    log::debug!(
        "{frame_count} screens hold {} unique glyphs, seed charset has {}",
        pool.entries.len(),
        seed.len()
    );

    let mut groups: Vec<Charset> = Vec::new();
    let mut assign: Vec<usize> = Vec::with_capacity(frame_count);
    let mut current = seed.clone();
    let mut frames_in_current = 0usize;

    for (frame, screen) in seq.screens.iter().enumerate() {
        let glyphs = frame_glyphs(seq.charset_of(screen), screen);

        let missing: Vec<Glyph> = {
            let mut probe = current.clone();
            let mut missing = Vec::new();
            for &glyph in &glyphs {
                if probe.position_matching(glyph, eq).is_none() {
                    probe.push(glyph);
                    missing.push(glyph);
                }
            }
            missing
        };

        if current.len() + missing.len() > CHARSET_SOFT_CAP {
            if frames_in_current > 0 {
                groups.push(current);
                current = seed.clone();
                frames_in_current = 0;
            }
            for &glyph in &glyphs {
                if current.position_matching(glyph, eq).is_none() {
                    current.push(glyph);
                }
            }
            if current.len() > CHARSET_SOFT_CAP {
                log::debug!(
                    "frame {frame}: charset grew to {}, collapsing",
                    current.len()
                );
                current = collapse_charset(&current, &pool, frame)?;
            }
        } else {
            for glyph in missing {
                current.push(glyph);
            }
        }

        assign.push(groups.len());
        frames_in_current += 1;
    }
    groups.push(current);

    let mut report = MergeReport {
        charsets: groups.len(),
        unique_glyphs: pool.entries.len(),
        ..MergeReport::default()
    };
    remap_screens(seq, groups, &assign, &mut report)?;

    log::info!(
        "merged {frame_count} screens into {} charsets ({} unique glyphs)",
        report.charsets,
        report.unique_glyphs
    );
    if report.max_error > 0 {
        log::warn!(
            "{} cells over {} frames were remapped to a nearby glyph (max Hamming error {})",
            report.substituted_cells,
            report.affected_frames,
            report.max_error
        );
    }
    Ok(report)
}

/// Écrase tous les glyphes de la séquence dans un unique charset.
fn crunch_to_single(seq: &mut ScreenSequence) -> Result<ReduceReport, PackError> {
    let pool = GlyphPool::build(seq, GlyphEquality::Exact);
    log::info!(
        "crunching all {} unique glyphs into one charset",
        pool.entries.len()
    );

    let mut keep: Vec<&PoolEntry> = pool.entries.iter().collect();
    if keep.len() > COLLAPSE_KEEP {
        keep.sort_by(|a, b| b.uses.cmp(&a.uses));
        keep.truncate(COLLAPSE_KEEP);
    }

    let mut charset = Charset::seeded();
    for entry in keep {
        if charset.position(entry.glyph).is_none() {
            charset.push(entry.glyph);
        }
    }

    let assign = vec![0usize; seq.screens.len()];
    let mut report = MergeReport {
        charsets: 1,
        unique_glyphs: pool.entries.len(),
        ..MergeReport::default()
    };
    remap_screens(seq, vec![charset], &assign, &mut report)?;

    Ok(ReduceReport {
        charsets: 1,
        threshold: None,
        substituted_cells: report.substituted_cells,
        affected_frames: report.affected_frames,
        max_error: report.max_error,
    })
}

/// Réduit la séquence à au plus `max_charsets` charsets.
///
/// Phase A exacte d'abord ; si la limite est dépassée, phase B : le seuil
/// d'égalité part de `start_threshold` et augmente de 1 entre chaque passe
/// jusqu'à ce que la limite tienne. Le seuil est local à cette boucle.
///
/// # Errors
/// `InvalidInput` pour une limite nulle, ou les erreurs de la fusion.
pub fn reduce_charsets(
    seq: &mut ScreenSequence,
    max_charsets: usize,
    start_threshold: u32,
) -> Result<ReduceReport, PackError> {
    if max_charsets == 0 {
        return Err(PackError::InvalidInput(
            "charset limit must be at least 1".into(),
        ));
    }
    if max_charsets == 1 {
        return crunch_to_single(seq);
    }

    let mut merge = merge_charsets(seq, GlyphEquality::Exact)?;
    let mut threshold = None;

    let mut t = start_threshold;
    while seq.charsets.len() > max_charsets {
        log::info!(
            "compressing charsets: threshold={t}, charsets={}",
            seq.charsets.len()
        );
        merge = merge_charsets(seq, GlyphEquality::Fuzzy(t))?;
        threshold = Some(t);
        t += 1;
    }

    Ok(ReduceReport {
        charsets: seq.charsets.len(),
        threshold,
        substituted_cells: merge.substituted_cells,
        affected_frames: merge.affected_frames,
        max_error: merge.max_error,
    })
}
