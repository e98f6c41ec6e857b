use std::path::PathBuf;

use clap::Parser;

/// petpack — PETSCII animation packer for 8-bit character displays.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichiers d'entrée : dumps texte (.c) ou conteneurs JSON (.petmate, .json).
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Charset par défaut (binaire brut, ou .64c avec adresse de chargement).
    #[arg(long)]
    pub charset: Option<PathBuf>,

    /// Fichier de configuration TOML. Les drapeaux CLI le surchargent.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dossier de sortie pour anim.bin et les artefacts compagnons.
    #[arg(short, long, default_value = "build")]
    pub output: PathBuf,

    /// Emballer aussi le canal couleur.
    #[arg(long, default_value_t = false)]
    pub use_color: bool,

    /// N'emballer que le canal couleur. Requiert --use-color.
    #[arg(long, default_value_t = false)]
    pub only_color: bool,

    /// Restreindre le differ à l'encodage par rangée.
    #[arg(long, default_value_t = false)]
    pub only_per_row: bool,

    /// Désactiver le RLE plein écran.
    #[arg(long, default_value_t = false)]
    pub no_rle: bool,

    /// Nombre maximal de charsets émis.
    #[arg(long)]
    pub limit_charsets: Option<usize>,

    /// Seuil de Hamming initial de la phase B du réducteur [1-7].
    #[arg(long)]
    pub start_threshold: Option<u32>,

    /// Réinitialiser la mémoire couleur au premier frame de chaque entrée.
    #[arg(long, default_value_t = false)]
    pub init_color_between_anims: bool,

    /// Réordonner les frames par similarité de glyphes.
    #[arg(long, default_value_t = false)]
    pub reorder_frames: bool,

    /// Décaler les frames couleur de N positions.
    #[arg(long)]
    pub offset_color_frames: Option<usize>,

    /// Mélanger les frames couleur avec cette graine.
    #[arg(long)]
    pub randomize_color_frames: Option<u64>,

    /// Écrire aussi les frames remappées au format dump texte.
    #[arg(long, default_value_t = false)]
    pub write_dump: bool,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Validate flag consistency.
    ///
    /// # Errors
    /// Returns an error on contradictory flags.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.only_color && !self.use_color {
            anyhow::bail!("--only-color n'a de sens qu'avec --use-color.");
        }
        if let Some(t) = self.start_threshold
            && !(1..=7).contains(&t)
        {
            anyhow::bail!("--start-threshold doit être entre 1 et 7 (reçu {t}).");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_color_requires_use_color() {
        let cli = Cli::parse_from(["petpack", "--only-color", "anim.c"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["petpack", "--only-color", "--use-color", "anim.c"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn start_threshold_is_range_checked() {
        let cli = Cli::parse_from(["petpack", "--start-threshold", "9", "anim.c"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["petpack", "--start-threshold", "3", "anim.c"]);
        assert!(cli.validate().is_ok());
    }
}
