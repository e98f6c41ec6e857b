//! Recherche de la géométrie de blocs produisant le flux le plus court.
//!
//! Chaque candidate construit un packer indépendant sur des écrans
//! immuables ; la réduction est déterministe : longueur minimale, égalité
//! tranchée par l'ordre fixe de la liste des candidates.

use pp_core::{PackError, ScreenSequence};
use rayon::prelude::*;

use crate::geometry::{BlockSize, Geometry, CANDIDATE_BLOCK_SIZES};
use crate::packer::{PackOptions, Packer};
use crate::validator::Validator;

/// Résultat complet d'un emballage : flux, géométrie retenue et table
/// compagnon gelée pour les consommateurs externes.
#[derive(Clone, Debug)]
pub struct PackedAnimation {
    /// Le flux d'opcodes plus charge utile, clos par RESTART.
    pub stream: Vec<u8>,
    /// Taille de bloc retenue par la recherche.
    pub block_size: BlockSize,
    /// Table compagnon `octet -> nom symbolique`, entrées inutilisées gelées
    /// sur `ERROR`.
    pub opcodes: Vec<(u8, String)>,
    /// Géométrie retenue, avec ses offsets par bloc dans l'ordre d'émission.
    pub geometry: Geometry,
    /// Blocs touchés par au moins une frame.
    pub used_blocks: usize,
    /// Nombre total de blocs de la géométrie.
    pub total_blocks: usize,
    /// Longueur de flux par candidate ayant abouti, dans l'ordre
    /// d'exploration ; les candidates écartées n'y figurent pas.
    pub candidate_lengths: Vec<(BlockSize, usize)>,
}

/// Emballe la séquence avec la meilleure géométrie candidate.
///
/// Essaie chaque taille de bloc (sans (2,2) quand la couleur est emballée),
/// garde la plus courte, ré-emballe avec celle-ci puis valide le flux par
/// aller-retour avant de geler la table d'opcodes. Une candidate qui échoue
/// (espace d'opcodes épuisé par exemple) est écartée de la recherche, pas
/// fatale : seule une séquence qu'aucune géométrie ne sait emballer l'est.
///
/// # Errors
/// `InvalidInput` si la séquence viole ses invariants ; la première erreur
/// de candidate si toutes échouent ; les erreurs du ré-emballage final et du
/// validateur.
pub fn pack_animation(
    seq: &ScreenSequence,
    options: &PackOptions,
) -> Result<PackedAnimation, PackError> {
    seq.check_invariants()?;

    let no_color_support = BlockSize::new(2, 2);
    let candidates: Vec<BlockSize> = CANDIDATE_BLOCK_SIZES
        .iter()
        .copied()
        .filter(|&bs| !(options.use_color && bs == no_color_support))
        .collect();

    let trials: Vec<Result<usize, PackError>> = candidates
        .par_iter()
        .map(|&block_size| {
            let mut packer = Packer::new(block_size, options.clone())?;
            Ok(packer.pack(seq)?.len())
        })
        .collect();

    let mut candidate_lengths = Vec::with_capacity(candidates.len());
    let mut best: Option<(usize, usize)> = None; // (length, candidate index)
    let mut first_error: Option<PackError> = None;
    for (index, trial) in trials.into_iter().enumerate() {
        match trial {
            Ok(length) => {
                candidate_lengths.push((candidates[index], length));
                if best.is_none_or(|(best_length, _)| length < best_length) {
                    best = Some((length, index));
                }
            }
            Err(error) => {
                log::warn!(
                    "block size {} dropped from the search: {error}",
                    candidates[index]
                );
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }
    let Some((_, best_index)) = best else {
        return Err(first_error
            .unwrap_or_else(|| PackError::InvalidInput("no candidate geometry".into())));
    };
    let block_size = candidates[best_index];

    let mut packer = Packer::new(block_size, options.clone())?;
    let stream = packer.pack(seq)?;
    Validator::new(&packer).validate(&stream, seq)?;
    packer.warn_if_rle_poor_fit();
    packer.freeze_ops();

    log::info!(
        "selected block size {block_size}: {} blocks ({} used), {} bytes of animation data",
        packer.geometry().blocks().len(),
        packer.used_block_count(),
        stream.len()
    );

    Ok(PackedAnimation {
        stream,
        block_size,
        opcodes: packer.ops().entries(),
        geometry: packer.geometry().clone(),
        used_blocks: packer.used_block_count(),
        total_blocks: packer.geometry().blocks().len(),
        candidate_lengths,
    })
}
