use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration complète d'une conversion.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine ; le
/// fichier de configuration ne fournit que des surcharges partielles et la
/// ligne de commande surcharge le fichier.
///
/// # Example
/// ```
/// use pp_core::config::ConvertConfig;
/// let config = ConvertConfig::default();
/// assert_eq!(config.start_threshold, 2);
/// assert!(config.rle_enabled);
/// ```
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConvertConfig {
    // === Charsets ===
    /// Nombre maximal de charsets émis. `None` = pas de limite.
    pub limit_charsets: Option<usize>,
    /// Seuil de Hamming initial de la phase B du réducteur [1, 7].
    pub start_threshold: u32,

    // === Packer ===
    /// Émettre aussi le canal couleur.
    pub use_color: bool,
    /// N'émettre que le canal couleur.
    pub use_only_color: bool,
    /// Restreindre le differ à l'encodage par rangée.
    pub only_per_row: bool,
    /// Autoriser l'encodage RLE plein écran.
    pub rle_enabled: bool,
    /// Réinitialiser la mémoire couleur au changement d'animation source.
    pub init_color_between_anims: bool,
    /// Table cyclique de ralentissement, un octet par frame.
    pub anim_slowdown_table: Vec<u8>,

    // === Préparation des frames ===
    /// Réordonner les frames par similarité de glyphes.
    pub reorder_frames: bool,
    /// Décaler les frames couleur de N positions.
    pub offset_color_frames: Option<usize>,
    /// Mélanger les frames couleur avec cette graine.
    pub randomize_color_frames: Option<u64>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            limit_charsets: None,
            start_threshold: 2,
            use_color: false,
            use_only_color: false,
            only_per_row: false,
            rle_enabled: true,
            init_color_between_anims: false,
            anim_slowdown_table: Vec::new(),
            reorder_frames: false,
            offset_color_frames: None,
            randomize_color_frames: None,
        }
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    charsets: Option<CharsetSection>,
    pack: Option<PackSection>,
    frames: Option<FramesSection>,
}

/// Charset section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
struct CharsetSection {
    limit: Option<usize>,
    start_threshold: Option<u32>,
}

/// Pack section of the TOML config, all fields optional.
#[derive(Deserialize)]
struct PackSection {
    use_color: Option<bool>,
    use_only_color: Option<bool>,
    only_per_row: Option<bool>,
    rle_enabled: Option<bool>,
    init_color_between_anims: Option<bool>,
    anim_slowdown_table: Option<Vec<u8>>,
}

/// Frame-preparation section of the TOML config, all fields optional.
#[derive(Deserialize)]
struct FramesSection {
    reorder: Option<bool>,
    offset_color: Option<usize>,
    randomize_color_seed: Option<u64>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use pp_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("petpack.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<ConvertConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Erreur de parsing TOML dans {}", path.display()))
}

fn parse_config(content: &str) -> Result<ConvertConfig> {
    let file: ConfigFile = toml::from_str(content)?;

    let mut config = ConvertConfig::default();

    if let Some(c) = file.charsets {
        if let Some(v) = c.limit {
            config.limit_charsets = Some(v);
        }
        if let Some(v) = c.start_threshold {
            config.start_threshold = v;
        }
    }

    if let Some(p) = file.pack {
        if let Some(v) = p.use_color {
            config.use_color = v;
        }
        if let Some(v) = p.use_only_color {
            config.use_only_color = v;
        }
        if let Some(v) = p.only_per_row {
            config.only_per_row = v;
        }
        if let Some(v) = p.rle_enabled {
            config.rle_enabled = v;
        }
        if let Some(v) = p.init_color_between_anims {
            config.init_color_between_anims = v;
        }
        if let Some(v) = p.anim_slowdown_table {
            config.anim_slowdown_table = v;
        }
    }

    if let Some(f) = file.frames {
        if let Some(v) = f.reorder {
            config.reorder_frames = v;
        }
        if let Some(v) = f.offset_color {
            config.offset_color_frames = Some(v);
        }
        if let Some(v) = f.randomize_color_seed {
            config.randomize_color_frames = Some(v);
        }
    }

    Ok(config)
}
