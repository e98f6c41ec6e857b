//! Artefacts compagnons du flux emballé.
//!
//! À côté de `anim.bin` et des `charset_{i}.bin`, deux descripteurs JSON
//! permettent aux consommateurs externes de générer un interpréteur
//! assorti : la table d'opcodes gelée et la géométrie de blocs avec ses
//! offsets dans l'ordre d'émission.

use std::path::Path;

use anyhow::{Context, Result};
use pp_core::Charset;
use pp_pack::{Geometry, PackedAnimation};
use serde::Serialize;

/// Une entrée de la table compagnon `octet -> nom symbolique`.
#[derive(Serialize)]
pub struct OpcodeEntry {
    pub byte: u8,
    pub name: String,
}

/// Un bloc et ses offsets linéaires, dans l'ordre d'émission.
#[derive(Serialize)]
pub struct BlockEntry {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub offsets: Vec<usize>,
}

/// Descripteur de géométrie : taille de bloc, facteur de macro-bloc et la
/// liste des blocs nécessaire pour résoudre les indices de SET_DEST_PTR.
#[derive(Serialize)]
pub struct GeometryDescriptor {
    pub block_width: usize,
    pub block_height: usize,
    pub macro_factor_x: usize,
    pub macro_factor_y: usize,
    pub blocks: Vec<BlockEntry>,
}

impl GeometryDescriptor {
    #[must_use]
    pub fn from_geometry(geometry: &Geometry) -> Self {
        GeometryDescriptor {
            block_width: geometry.block_size.x,
            block_height: geometry.block_size.y,
            macro_factor_x: geometry.macro_factor.x,
            macro_factor_y: geometry.macro_factor.y,
            blocks: geometry
                .blocks()
                .iter()
                .map(|b| BlockEntry {
                    x: b.x,
                    y: b.y,
                    width: b.width,
                    height: b.height,
                    offsets: b.offsets().to_vec(),
                })
                .collect(),
        }
    }
}

/// Écrit le flux et tous ses artefacts compagnons dans `dir`.
///
/// Produit `anim.bin`, un `charset_{i}.bin` par charset, `opcodes.json` et
/// `geometry.json`.
///
/// # Errors
/// Retourne une erreur d'E/S ou de sérialisation.
pub fn write_outputs(dir: &Path, packed: &PackedAnimation, charsets: &[Charset]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Impossible de créer {}", dir.display()))?;

    std::fs::write(dir.join("anim.bin"), &packed.stream).context("écriture de anim.bin")?;

    for (index, charset) in charsets.iter().enumerate() {
        crate::charset_bin::write_charset_file(&dir.join(format!("charset_{index}.bin")), charset)?;
    }

    let opcodes: Vec<OpcodeEntry> = packed
        .opcodes
        .iter()
        .map(|(byte, name)| OpcodeEntry {
            byte: *byte,
            name: name.clone(),
        })
        .collect();
    let opcodes_json =
        serde_json::to_string_pretty(&opcodes).context("sérialisation de opcodes.json")?;
    std::fs::write(dir.join("opcodes.json"), opcodes_json).context("écriture de opcodes.json")?;

    let descriptor = GeometryDescriptor::from_geometry(&packed.geometry);
    let geometry_json =
        serde_json::to_string_pretty(&descriptor).context("sérialisation de geometry.json")?;
    std::fs::write(dir.join("geometry.json"), geometry_json)
        .context("écriture de geometry.json")?;

    log::info!(
        "wrote {} bytes of animation data and {} charsets to {}",
        packed.stream.len(),
        charsets.len(),
        dir.display()
    );
    Ok(())
}
