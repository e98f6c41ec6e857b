//! Pilote du packer : état inter-frames et émission du flux.

use std::collections::HashMap;

use pp_core::{PackError, ScreenSequence, SCREEN_CELLS};

use crate::geometry::{BlockSize, Geometry, MACRO_FACTOR};
use crate::opcodes::OpcodeTable;

/// Classification d'un octet d'opcode de remplissage, pour le validateur.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FillKind {
    None,
    /// `FILL{n}` : cellules brutes.
    Raw,
    /// `FILL_SAME{n}` : une valeur répétée.
    Same,
    /// `FILL_RLE{enc}_{dec}` : charge utile RLE de `encoded_len` octets.
    Rle { encoded_len: usize },
}

/// Options du packer, au-delà de la géométrie.
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Debug)]
pub struct PackOptions {
    /// Émettre aussi le canal couleur (corps encadré par SET_COLOR_MODE /
    /// SET_SCREEN_MODE).
    pub use_color: bool,
    /// N'émettre que le canal couleur.
    pub use_only_color: bool,
    /// Restreindre le differ à l'encodage par rangée.
    pub only_per_row: bool,
    /// Autoriser le RLE plein écran comme stratégie candidate.
    pub rle_enabled: bool,
    /// Émettre CLEAR_COLOR au premier frame de chaque animation source.
    pub init_color_between_anims: bool,
    /// Indices de frame où une nouvelle animation source commence.
    pub anim_change_indexes: Vec<usize>,
    /// Table cyclique de ralentissement (un octet par frame émise).
    pub anim_slowdown_table: Vec<u8>,
}

impl Default for PackOptions {
    fn default() -> Self {
        PackOptions {
            use_color: false,
            use_only_color: false,
            only_per_row: false,
            rle_enabled: true,
            init_color_between_anims: false,
            anim_change_indexes: Vec::new(),
            anim_slowdown_table: Vec::new(),
        }
    }
}

/// The bytecode-emitting compressor for one block geometry.
///
/// A packer is constructed fresh per geometry trial; it owns its opcode
/// table and never mutates the screens it packs.
///
/// # Example
/// ```
/// use pp_core::{Charset, CharsetId, Screen, ScreenSequence};
/// use pp_pack::{BlockSize, PackOptions, Packer};
///
/// let seq = ScreenSequence::new(
///     vec![Screen::blank(0, CharsetId(0))],
///     vec![Charset::seeded()],
/// );
/// let mut packer = Packer::new(BlockSize::new(3, 3), PackOptions::default()).unwrap();
/// let stream = packer.pack(&seq).unwrap();
/// assert!(!stream.is_empty());
/// ```
pub struct Packer {
    geometry: Geometry,
    ops: OpcodeTable,
    options: PackOptions,

    pub(crate) fill_op_by_size: HashMap<usize, u8>,
    pub(crate) fill_same_by_size: HashMap<usize, u8>,
    pub(crate) fill_rle_by_shape: HashMap<(usize, usize), u8>,
    pub(crate) fill_kinds: Vec<FillKind>,

    ops_used: [bool; 256],
    used_blocks: Vec<bool>,
    used_macro_blocks: Vec<bool>,
    pub(crate) rle_run_counts: Vec<u32>,
}

impl Packer {
    /// Construit un packer pour une taille de bloc donnée : géométrie,
    /// noyau d'opcodes fixe, puis `FILL{n}`/`FILL_SAME{n}` par taille de
    /// bloc distincte.
    ///
    /// # Errors
    /// `OpcodeSpaceExhausted` si la géométrie demande plus d'opcodes que
    /// l'espace n'en offre.
    pub fn new(block_size: BlockSize, options: PackOptions) -> Result<Self, PackError> {
        let geometry = Geometry::new(block_size, MACRO_FACTOR);
        let mut ops = OpcodeTable::with_fixed_ops()?;

        let mut fill_op_by_size = HashMap::new();
        let mut fill_same_by_size = HashMap::new();
        let mut fill_kinds = vec![FillKind::None; 256];

        for sz in geometry.distinct_block_sizes() {
            let fill = ops.add(&format!("FILL{sz}"))?;
            let same = ops.add(&format!("FILL_SAME{sz}"))?;
            fill_op_by_size.insert(sz, fill);
            fill_same_by_size.insert(sz, same);
            fill_kinds[usize::from(fill)] = FillKind::Raw;
            fill_kinds[usize::from(same)] = FillKind::Same;
        }

        let block_count = geometry.blocks().len();
        let macro_count = geometry.macro_blocks().len();

        Ok(Packer {
            geometry,
            ops,
            options,
            fill_op_by_size,
            fill_same_by_size,
            fill_rle_by_shape: HashMap::new(),
            fill_kinds,
            ops_used: [false; 256],
            used_blocks: vec![false; block_count],
            used_macro_blocks: vec![false; macro_count],
            rle_run_counts: vec![0; 256],
        })
    }

    #[inline(always)]
    #[must_use]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline(always)]
    #[must_use]
    pub fn ops(&self) -> &OpcodeTable {
        &self.ops
    }

    #[inline(always)]
    #[must_use]
    pub fn options(&self) -> &PackOptions {
        &self.options
    }

    /// Blocs touchés par au moins un diff de la séquence emballée.
    #[must_use]
    pub fn used_block_count(&self) -> usize {
        self.used_blocks.iter().filter(|&&u| u).count()
    }

    #[must_use]
    pub fn used_macro_block_count(&self) -> usize {
        self.used_macro_blocks.iter().filter(|&&u| u).count()
    }

    pub(crate) fn mark_op_used(&mut self, op: u8) {
        self.ops_used[usize::from(op)] = true;
    }

    /// Registers (or reuses) the `FILL_RLE{enc}_{dec}` opcode for one
    /// encoded/decoded shape.
    pub(crate) fn fill_rle_op(
        &mut self,
        encoded_len: usize,
        decoded_len: usize,
    ) -> Result<u8, PackError> {
        if let Some(&op) = self.fill_rle_by_shape.get(&(encoded_len, decoded_len)) {
            return Ok(op);
        }
        let op = self.ops.add(&format!("FILL_RLE{encoded_len}_{decoded_len}"))?;
        self.fill_rle_by_shape.insert((encoded_len, decoded_len), op);
        self.fill_kinds[usize::from(op)] = FillKind::Rle { encoded_len };
        Ok(op)
    }

    pub(crate) fn fill_op(&self, size: usize) -> Result<u8, PackError> {
        self.fill_op_by_size.get(&size).copied().ok_or_else(|| {
            PackError::InvalidInput(format!("no FILL opcode for block size {size}"))
        })
    }

    pub(crate) fn fill_same_op(&self, size: usize) -> Result<u8, PackError> {
        self.fill_same_by_size.get(&size).copied().ok_or_else(|| {
            PackError::InvalidInput(format!("no FILL_SAME opcode for block size {size}"))
        })
    }

    /// Emballe la séquence en un flux d'opcodes plus charge utile.
    ///
    /// L'écran précédent de la frame 0 est entièrement à zéro, pour les deux
    /// canaux. Le flux se termine par RESTART.
    ///
    /// # Errors
    /// Propage les erreurs du differ (espace d'opcodes) et rejette un
    /// identifiant de charset qui ne tient pas dans un octet.
    pub fn pack(&mut self, seq: &ScreenSequence) -> Result<Vec<u8>, PackError> {
        let fixed = self.ops.fixed();
        let zero = vec![0u8; SCREEN_CELLS];

        self.ops_used = [false; 256];
        self.used_blocks = vec![false; self.geometry.blocks().len()];
        self.used_macro_blocks = vec![false; self.geometry.macro_blocks().len()];
        self.mark_used_blocks(seq);

        let mut stream = Vec::new();
        let mut prev_border = 0u8;
        let mut prev_background = 0u8;
        let mut prev_charset: Option<usize> = None;
        let mut slowdown_idx = 0usize;

        for (idx, screen) in seq.screens.iter().enumerate() {
            if let Some(border) = screen.border
                && border != prev_border
            {
                self.mark_op_used(fixed.set_border);
                stream.push(fixed.set_border);
                stream.push(border);
                prev_border = border;
            }

            if let Some(background) = screen.background
                && background != prev_background
            {
                self.mark_op_used(fixed.set_background);
                stream.push(fixed.set_background);
                stream.push(background);
                prev_background = background;
            }

            let charset = screen.charset.0;
            if prev_charset != Some(charset) {
                let id = u8::try_from(charset).map_err(|_| {
                    PackError::InvalidInput(format!(
                        "screen {idx}: charset id {charset} does not fit in one byte"
                    ))
                })?;
                log::debug!("frame {idx}: charset change {prev_charset:?} -> {charset}");
                self.mark_op_used(fixed.set_charset);
                stream.push(fixed.set_charset);
                stream.push(id);
                prev_charset = Some(charset);
            }

            if !self.options.use_only_color {
                let prev_codes = if idx > 0 { &seq.screens[idx - 1].codes } else { &zero };
                let body = self.diff_frames(prev_codes, &screen.codes, self.options.use_color)?;
                for op in &body.ops {
                    self.mark_op_used(*op);
                }
                stream.extend_from_slice(&body.bytes);
            }

            if self.options.use_color {
                self.mark_op_used(fixed.set_color_mode);
                stream.push(fixed.set_color_mode);

                let prev_colors = if idx > 0 { &seq.screens[idx - 1].colors } else { &zero };
                let body = self.diff_frames(prev_colors, &screen.colors, true)?;
                for op in &body.ops {
                    self.mark_op_used(*op);
                }
                stream.extend_from_slice(&body.bytes);

                self.mark_op_used(fixed.set_screen_mode);
                stream.push(fixed.set_screen_mode);
            } else if self.options.init_color_between_anims
                && self.options.anim_change_indexes.contains(&idx)
            {
                log::debug!("frame {idx}: clear color memory to {}", screen.colors[0]);
                self.mark_op_used(fixed.clear_color);
                stream.push(fixed.clear_color);
                stream.push(screen.colors[0]);
            }

            if !self.options.anim_slowdown_table.is_empty() {
                let slowdown = self.options.anim_slowdown_table[slowdown_idx];
                self.mark_op_used(fixed.set_anim_slowdown);
                stream.push(fixed.set_anim_slowdown);
                stream.push(slowdown);
                slowdown_idx = (slowdown_idx + 1) % self.options.anim_slowdown_table.len();
            }

            self.mark_op_used(fixed.frame_end);
            stream.push(fixed.frame_end);
        }

        self.mark_op_used(fixed.restart);
        stream.push(fixed.restart);

        Ok(stream)
    }

    /// Marque les blocs et macro-blocs touchés par la séquence, pour les
    /// consommateurs en aval du flux.
    fn mark_used_blocks(&mut self, seq: &ScreenSequence) {
        let zero = vec![0u8; SCREEN_CELLS];

        for (idx, screen) in seq.screens.iter().enumerate() {
            let prev = if idx > 0 { &seq.screens[idx - 1] } else { &seq.screens[idx] };
            let (prev_codes, prev_colors) = if idx > 0 {
                (&prev.codes, &prev.colors)
            } else {
                (&zero, &zero)
            };

            for (mi, mb) in self.geometry.macro_blocks().iter().enumerate() {
                for (bi, block) in self.geometry.blocks_of(mb).iter().enumerate() {
                    let index = mb.blocks.start + bi;
                    if !block.is_same(prev_codes, &screen.codes) {
                        self.used_blocks[index] = true;
                        self.used_macro_blocks[mi] = true;
                    }
                    if self.options.use_color && !block.is_same(prev_colors, &screen.colors) {
                        self.used_blocks[index] = true;
                        self.used_macro_blocks[mi] = true;
                    }
                }
            }
        }
    }

    /// Gèle la table d'opcodes : les entrées jamais émises retombent sur la
    /// sentinelle `ERROR`.
    pub fn freeze_ops(&mut self) {
        let used = self.ops_used;
        self.ops.freeze(&used);
    }

    /// Signale un RLE plein écran qui va mal se comporter sur ces données :
    /// la longueur de run la plus fréquente est 1.
    pub(crate) fn warn_if_rle_poor_fit(&self) {
        let fixed = self.ops.fixed();
        if !self.ops_used[usize::from(fixed.full_screen_rle)] {
            return;
        }
        let mut top_count = 0u32;
        let mut top_run = 0usize;
        for (run, &count) in self.rle_run_counts.iter().enumerate() {
            if count > top_count {
                top_count = count;
                top_run = run;
            }
        }
        if top_run == 1 {
            log::warn!(
                "full-screen RLE selected but the dominant run length is 1; \
                 it will perform poorly on this data"
            );
        }
    }
}
