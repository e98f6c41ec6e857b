//! Pipeline de conversion : ingestion, préparation, réduction, emballage.

use std::path::Path;

use anyhow::{Context, Result};
use pp_charset::{colorfx, reduce_charsets, reorder_by_similarity};
use pp_core::{Charset, CharsetId, ConvertConfig, ScreenSequence};
use pp_io::{parse_frame_dump, parse_petmate, read_charset_file, write_frame_dump, write_outputs};
use pp_pack::{pack_animation, PackOptions};

use crate::cli::Cli;

/// Fusionne le résultat de config fichier + surcharges CLI.
fn resolve_config(cli: &Cli) -> Result<ConvertConfig> {
    let mut config = match &cli.config {
        Some(path) => pp_core::config::load_config(path)?,
        None => ConvertConfig::default(),
    };

    if cli.use_color {
        config.use_color = true;
    }
    if cli.only_color {
        config.use_only_color = true;
    }
    if cli.only_per_row {
        config.only_per_row = true;
    }
    if cli.no_rle {
        config.rle_enabled = false;
    }
    if cli.init_color_between_anims {
        config.init_color_between_anims = true;
    }
    if cli.reorder_frames {
        config.reorder_frames = true;
    }
    if let Some(v) = cli.limit_charsets {
        config.limit_charsets = Some(v);
    }
    if let Some(v) = cli.start_threshold {
        config.start_threshold = v;
    }
    if let Some(v) = cli.offset_color_frames {
        config.offset_color_frames = Some(v);
    }
    if let Some(v) = cli.randomize_color_frames {
        config.randomize_color_frames = Some(v);
    }
    Ok(config)
}

/// Lit un fichier d'entrée selon son extension.
fn read_input(path: &Path, default_charset: Option<&Charset>) -> Result<ScreenSequence> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "c" | "txt" => {
            let charset = default_charset.context(
                "un dump texte requiert un charset par défaut (--charset)",
            )?;
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Impossible de lire {}", path.display()))?;
            Ok(parse_frame_dump(&content, charset)?)
        }
        "petmate" | "json" => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Impossible de lire {}", path.display()))?;
            Ok(parse_petmate(&content, default_charset)?)
        }
        other => anyhow::bail!(
            "Format non supporté : {other:?} ({}). Attendu .c, .txt, .petmate ou .json.",
            path.display()
        ),
    }
}

/// Concatène `addition` à `combined` en fusionnant les arènes de charsets.
/// Les charsets identiques sont dédupliqués pour que plusieurs dumps sur la
/// même police n'en internent qu'une.
fn append_sequence(combined: &mut ScreenSequence, addition: ScreenSequence) {
    let mut id_map = Vec::with_capacity(addition.charsets.len());
    for charset in addition.charsets {
        let id = match combined.charsets.iter().position(|c| *c == charset) {
            Some(existing) => existing,
            None => {
                combined.charsets.push(charset);
                combined.charsets.len() - 1
            }
        };
        id_map.push(id);
    }

    for mut screen in addition.screens {
        screen.charset = CharsetId(id_map[screen.charset.0]);
        combined.screens.push(screen);
    }
}

/// Exécute la conversion complète décrite par la ligne de commande.
///
/// # Errors
/// Toute erreur d'ingestion, de réduction, d'emballage, de validation ou
/// d'écriture interrompt la conversion.
pub fn run(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;

    let default_charset = match &cli.charset {
        Some(path) => {
            log::info!("reading default charset from {}", path.display());
            Some(read_charset_file(path)?)
        }
        None => None,
    };

    let mut seq = ScreenSequence::default();
    let mut anim_change_indexes = Vec::new();

    for input in &cli.inputs {
        log::info!("processing {}", input.display());
        anim_change_indexes.push(seq.screens.len());
        let addition = read_input(input, default_charset.as_ref())?;
        log::info!("found {} screens", addition.screens.len());
        append_sequence(&mut seq, addition);
    }
    anyhow::ensure!(!seq.screens.is_empty(), "aucune frame dans les entrées.");

    if config.reorder_frames {
        reorder_by_similarity(&mut seq);
    }
    if let Some(offset) = config.offset_color_frames {
        log::info!("offsetting color frames by {offset}");
        colorfx::offset_color_frames(&mut seq, offset);
    }
    if let Some(seed) = config.randomize_color_frames {
        log::info!("randomizing color frames with seed {seed}");
        colorfx::randomize_color_frames(&mut seq, seed);
    }

    if let Some(limit) = config.limit_charsets {
        if seq.charsets.len() > limit {
            let report = reduce_charsets(&mut seq, limit, config.start_threshold)?;
            log::info!(
                "reduced to {} charsets (threshold {:?}, {} cells substituted, max error {})",
                report.charsets,
                report.threshold,
                report.substituted_cells,
                report.max_error
            );
        } else {
            log::info!(
                "no need to limit charsets, already at {}",
                seq.charsets.len()
            );
        }
    }

    let options = PackOptions {
        use_color: config.use_color,
        use_only_color: config.use_only_color,
        only_per_row: config.only_per_row,
        rle_enabled: config.rle_enabled,
        init_color_between_anims: config.init_color_between_anims,
        anim_change_indexes,
        anim_slowdown_table: config.anim_slowdown_table.clone(),
    };

    log::info!("packing, use_color = {}", options.use_color);
    let packed = pack_animation(&seq, &options)?;

    write_outputs(&cli.output, &packed, &seq.charsets)?;

    if cli.write_dump {
        let dump_path = cli.output.join("frames.c");
        std::fs::write(&dump_path, write_frame_dump(&seq))
            .with_context(|| format!("Impossible d'écrire {}", dump_path.display()))?;
        log::info!("wrote remapped frames to {}", dump_path.display());
    }

    log::info!(
        "selected block size {}: {} of {} blocks used, {} bytes of animation data",
        packed.block_size,
        packed.used_blocks,
        packed.total_blocks,
        packed.stream.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pp_core::{Glyph, Screen};

    fn charset() -> Charset {
        let mut cs = Charset::seeded();
        cs.push(Glyph::from_rows([0x18; 8]));
        cs
    }

    #[test]
    fn append_sequence_dedups_identical_charsets() {
        let mut combined = ScreenSequence::default();
        let a = ScreenSequence::new(vec![Screen::blank(0, CharsetId(0))], vec![charset()]);
        let b = ScreenSequence::new(vec![Screen::blank(0, CharsetId(0))], vec![charset()]);

        append_sequence(&mut combined, a);
        append_sequence(&mut combined, b);

        assert_eq!(combined.screens.len(), 2);
        assert_eq!(combined.charsets.len(), 1);
        assert!(combined.screens.iter().all(|s| s.charset == CharsetId(0)));
    }

    #[test]
    fn append_sequence_keeps_distinct_charsets_apart() {
        let mut combined = ScreenSequence::default();
        let a = ScreenSequence::new(vec![Screen::blank(0, CharsetId(0))], vec![charset()]);
        let b = ScreenSequence::new(
            vec![Screen::blank(0, CharsetId(0))],
            vec![Charset::seeded()],
        );

        append_sequence(&mut combined, a);
        append_sequence(&mut combined, b);

        assert_eq!(combined.charsets.len(), 2);
        assert_eq!(combined.screens[1].charset, CharsetId(1));
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn end_to_end_over_a_frame_dump() {
        let dir = tempfile::tempdir().expect("tempdir");
        let charset_path = dir.path().join("font.bin");
        pp_io::write_charset_file(&charset_path, &charset()).expect("charset");

        let mut screen = Screen::blank(0, CharsetId(0));
        screen.border = Some(1);
        screen.background = Some(0);
        screen.codes[41] = 2;
        let seq = ScreenSequence::new(vec![screen], vec![charset()]);
        let dump_path = dir.path().join("anim.c");
        std::fs::write(&dump_path, write_frame_dump(&seq)).expect("dump");

        let out_dir = dir.path().join("build");
        let cli = Cli::parse_from([
            "petpack",
            "--charset",
            charset_path.to_str().expect("utf8 path"),
            "--output",
            out_dir.to_str().expect("utf8 path"),
            dump_path.to_str().expect("utf8 path"),
        ]);
        run(&cli).expect("pipeline");

        assert!(out_dir.join("anim.bin").exists());
        assert!(out_dir.join("charset_0.bin").exists());
        assert!(out_dir.join("opcodes.json").exists());
        assert!(out_dir.join("geometry.json").exists());
    }
}
