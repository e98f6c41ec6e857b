//! Les quatre stratégies d'encodage d'une frame et leur sélection.
//!
//! Chaque stratégie produit un corps candidat ; le plus court gagne, à
//! égalité l'ordre déclaré tranche : diff par blocs, diff bitmap par
//! macro-blocs, delta par rangée, RLE plein écran. Un écran uniforme
//! s'effondre en `CLEAR` quoi qu'il arrive.

use pp_core::{PackError, SCREEN_HEIGHT, SCREEN_WIDTH};

use crate::packer::Packer;
use crate::rle;

/// Marqueur de fin de rangée de l'encodage par rangée.
pub const PER_ROW_END_LINE_MARKER: u8 = 200;
/// Décalage des codes de run de l'encodage par rangée.
pub const PER_ROW_CODE_OFFSET: u8 = 100;
/// Longueur minimale (exclusive) d'un run compressé par rangée.
pub const MIN_COMPRESSION_RUN_LENGTH: usize = 3;

/// Corps candidat : octets émis plus les opcodes qu'il consomme, pour le
/// marquage d'usage une fois le gagnant choisi.
#[derive(Clone, Debug)]
pub(crate) struct Body {
    pub bytes: Vec<u8>,
    pub ops: Vec<u8>,
}

impl Packer {
    /// Encode le passage de `prev` à `cur` (1000 cellules chacun) et choisit
    /// le corps le plus court parmi les stratégies actives.
    ///
    /// # Errors
    /// `OpcodeSpaceExhausted` si un opcode `FILL_RLE` paresseux ne trouve
    /// plus de place.
    pub(crate) fn diff_frames(
        &mut self,
        prev: &[u8],
        cur: &[u8],
        use_color: bool,
    ) -> Result<Body, PackError> {
        if self.options().only_per_row {
            return Ok(self.diff_per_row(prev, cur));
        }

        // Un écran uniforme s'effondre en CLEAR, quel que soit le diff.
        if cur.iter().all(|&v| v == cur[0]) {
            let clear = self.ops().fixed().clear;
            return Ok(Body {
                bytes: vec![clear, cur[0]],
                ops: vec![clear],
            });
        }

        let mut candidates: Vec<Body> = Vec::with_capacity(4);
        if let Some(body) = self.diff_blocks(prev, cur)? {
            candidates.push(body);
        }
        if !use_color {
            candidates.push(self.diff_macro(prev, cur));
        }
        candidates.push(self.diff_per_row(prev, cur));
        if self.options().rle_enabled {
            candidates.push(self.full_screen_rle(cur));
        }

        let mut best: Option<Body> = None;
        for candidate in candidates {
            if best
                .as_ref()
                .is_none_or(|b| candidate.bytes.len() < b.bytes.len())
            {
                best = Some(candidate);
            }
        }
        best.ok_or_else(|| PackError::InvalidInput("no differ strategy available".into()))
    }

    /// Diff par blocs : `SET_DEST_PTR, index` puis le corps du bloc pour
    /// chaque bloc modifié.
    ///
    /// `None` quand un bloc modifié a un index qui ne tient pas dans l'octet
    /// d'argument de SET_DEST_PTR ; la stratégie est alors disqualifiée pour
    /// cette frame.
    fn diff_blocks(&mut self, prev: &[u8], cur: &[u8]) -> Result<Option<Body>, PackError> {
        let set_dest_ptr = self.ops().fixed().set_dest_ptr;

        let mut changed: Vec<(usize, Vec<u8>)> = Vec::new();
        for (index, block) in self.geometry().blocks().iter().enumerate() {
            if !block.is_same(prev, cur) {
                changed.push((index, block.read(cur)));
            }
        }

        // Disqualify before encoding anything: encode_block may register a
        // lazy FILL_RLE opcode, and the table never gives slots back. Blocks
        // are enumerated in ascending order, so the last index is the widest.
        if changed
            .last()
            .is_some_and(|&(index, _)| index > usize::from(u8::MAX))
        {
            return Ok(None);
        }

        let mut bytes = Vec::new();
        let mut ops = Vec::new();
        for (index, data) in changed {
            bytes.push(set_dest_ptr);
            bytes.push(index as u8);
            ops.push(set_dest_ptr);
            self.encode_block(&data, &mut bytes, &mut ops)?;
        }

        Ok(Some(Body { bytes, ops }))
    }

    /// Corps d'un bloc : valeur unique, RLE si l'encodage économise au moins
    /// 3 octets, sinon cellules brutes.
    fn encode_block(
        &mut self,
        data: &[u8],
        bytes: &mut Vec<u8>,
        ops: &mut Vec<u8>,
    ) -> Result<(), PackError> {
        let n = data.len();
        if data.iter().all(|&v| v == data[0]) {
            let op = self.fill_same_op(n)?;
            bytes.push(op);
            bytes.push(data[0]);
            ops.push(op);
            return Ok(());
        }

        let encoded = rle::encode(data);
        if encoded.len() < n.saturating_sub(2) {
            let op = self.fill_rle_op(encoded.len(), n)?;
            bytes.push(op);
            bytes.extend_from_slice(&encoded);
            ops.push(op);
        } else {
            let op = self.fill_op(n)?;
            bytes.push(op);
            bytes.extend_from_slice(data);
            ops.push(op);
        }
        Ok(())
    }

    /// Diff bitmap par macro-blocs : un octet de bitmap par macro-bloc (bit
    /// k = bloc k modifié), suivi des cellules brutes des blocs modifiés.
    fn diff_macro(&self, prev: &[u8], cur: &[u8]) -> Body {
        let op = self.ops().fixed().full_screen_blocks;
        let mut bytes = vec![op];

        for mb in self.geometry().macro_blocks() {
            let mut changes = 0u8;
            let mut payload = Vec::new();
            for (k, block) in self.geometry().blocks_of(mb).iter().enumerate() {
                if !block.is_same(prev, cur) {
                    debug_assert!(k < 8, "macro-block bitmap only holds 8 blocks");
                    changes |= 1 << k;
                    payload.extend(block.read(cur));
                }
            }
            bytes.push(changes);
            bytes.extend_from_slice(&payload);
        }

        Body {
            bytes,
            ops: vec![op],
        }
    }

    /// Delta par rangée : par rangée, des singletons `(x, valeur)` ou des
    /// runs `(100+longueur, x, valeur)`, rangée close par l'octet 200.
    pub(crate) fn diff_per_row(&self, prev: &[u8], cur: &[u8]) -> Body {
        let op = self.ops().fixed().per_row_changes;
        let mut bytes = vec![op];

        for y in 0..SCREEN_HEIGHT {
            let row: Vec<(usize, u8)> = (0..SCREEN_WIDTH)
                .filter_map(|x| {
                    let offset = y * SCREEN_WIDTH + x;
                    (prev[offset] != cur[offset]).then_some((x, cur[offset]))
                })
                .collect();

            let mut i = 0usize;
            while i < row.len() {
                let start = i;
                while i + 1 < row.len() && row[i + 1].0 == row[i].0 + 1 && row[i + 1].1 == row[i].1
                {
                    i += 1;
                }
                let run_length = i - start + 1;

                if run_length > MIN_COMPRESSION_RUN_LENGTH {
                    // x < 40 < 100 et run <= 40 <= 99 : les codes de contrôle
                    // 100 et 200 restent inatteignables comme coordonnées.
                    debug_assert!(row[start].0 < usize::from(PER_ROW_CODE_OFFSET));
                    debug_assert!(run_length <= 99);
                    bytes.push(PER_ROW_CODE_OFFSET + run_length as u8);
                    bytes.push(row[start].0 as u8);
                    bytes.push(row[start].1);
                } else {
                    for &(x, value) in &row[start..=i] {
                        debug_assert!(x < usize::from(PER_ROW_CODE_OFFSET));
                        bytes.push(x as u8);
                        bytes.push(value);
                    }
                }
                i += 1;
            }

            bytes.push(PER_ROW_END_LINE_MARKER);
        }

        Body {
            bytes,
            ops: vec![op],
        }
    }

    /// RLE plein écran : paires `(longueur, valeur)` couvrant les 1000
    /// cellules, longueur plafonnée à 254, puis le marqueur 255.
    fn full_screen_rle(&mut self, cur: &[u8]) -> Body {
        let op = self.ops().fixed().full_screen_rle;
        let body = rle::encode_full_screen(cur);

        for pair in body[..body.len() - 1].chunks_exact(2) {
            self.rle_run_counts[usize::from(pair[0])] += 1;
        }

        let mut bytes = Vec::with_capacity(1 + body.len());
        bytes.push(op);
        bytes.extend_from_slice(&body);
        Body {
            bytes,
            ops: vec![op],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BlockSize;
    use crate::packer::PackOptions;
    use pp_core::SCREEN_CELLS;

    fn packer(block_size: BlockSize) -> Packer {
        Packer::new(block_size, PackOptions::default()).expect("packer")
    }

    #[test]
    fn single_cell_delta_picks_block_diff_over_per_row() {
        let mut p = packer(BlockSize::new(2, 2));
        let prev = vec![0u8; SCREEN_CELLS];
        let mut cur = vec![0u8; SCREEN_CELLS];
        cur[0] = 1;

        let body = p.diff_frames(&prev, &cur, false).expect("diff");
        let fixed = p.ops().fixed();
        // SET_DEST_PTR 0, FILL4, 1, 0, 0, 0 -> 7 bytes, vs 28 for per-row.
        assert_eq!(body.bytes.len(), 7);
        assert_eq!(body.bytes[0], fixed.set_dest_ptr);
        assert_eq!(body.bytes[1], 0);

        let per_row = p.diff_per_row(&prev, &cur);
        assert_eq!(per_row.bytes.len(), 1 + 2 + 25);
    }

    #[test]
    fn high_block_indexes_disqualify_block_diff_without_registrations() {
        // (2,2) has 260 blocks; touching the bottom-right corner drags in
        // block 259, whose index does not fit SET_DEST_PTR's argument byte.
        let mut p = packer(BlockSize::new(2, 2));
        let prev = vec![0u8; SCREEN_CELLS];
        let mut cur = vec![0u8; SCREEN_CELLS];
        cur[0] = 1;
        cur[999] = 1;

        let ops_before = p.ops().len();
        let body = p.diff_frames(&prev, &cur, false).expect("diff");

        // Block diff is out; another strategy wins and the opcode table is
        // exactly as it was before the disqualified candidate was tried.
        assert_ne!(body.bytes[0], p.ops().fixed().set_dest_ptr);
        assert_eq!(p.ops().len(), ops_before);
    }

    #[test]
    fn uniform_screen_collapses_to_clear() {
        let mut p = packer(BlockSize::new(3, 3));
        let prev = vec![3u8; SCREEN_CELLS];
        let cur = vec![9u8; SCREEN_CELLS];
        let body = p.diff_frames(&prev, &cur, false).expect("diff");
        assert_eq!(body.bytes, vec![p.ops().fixed().clear, 9]);
    }

    #[test]
    fn half_and_half_screen_picks_full_screen_rle() {
        let mut p = packer(BlockSize::new(3, 3));
        let prev = vec![0u8; SCREEN_CELLS];
        let mut cur = vec![0u8; SCREEN_CELLS];
        cur[500..].fill(1);

        let body = p.diff_frames(&prev, &cur, false).expect("diff");
        let fixed = p.ops().fixed();
        // FULL_SCREEN_RLE, (254,0),(246,0),(254,1),(246,1), 255
        assert_eq!(
            body.bytes,
            vec![fixed.full_screen_rle, 254, 0, 246, 0, 254, 1, 246, 1, 255]
        );
    }

    #[test]
    fn rle_disabled_removes_the_candidate() {
        let options = PackOptions {
            rle_enabled: false,
            ..PackOptions::default()
        };
        let mut p = Packer::new(BlockSize::new(3, 3), options).expect("packer");
        let prev = vec![0u8; SCREEN_CELLS];
        let mut cur = vec![0u8; SCREEN_CELLS];
        cur[500..].fill(1);

        let body = p.diff_frames(&prev, &cur, false).expect("diff");
        assert_ne!(body.bytes[0], p.ops().fixed().full_screen_rle);
    }

    #[test]
    fn only_per_row_mode_forces_per_row() {
        let options = PackOptions {
            only_per_row: true,
            ..PackOptions::default()
        };
        let mut p = Packer::new(BlockSize::new(3, 3), options).expect("packer");
        let prev = vec![0u8; SCREEN_CELLS];
        let cur = vec![0u8; SCREEN_CELLS];

        let body = p.diff_frames(&prev, &cur, false).expect("diff");
        assert_eq!(body.bytes[0], p.ops().fixed().per_row_changes);
        // 25 empty rows -> 25 end markers.
        assert_eq!(body.bytes.len(), 26);
    }

    #[test]
    fn per_row_compresses_long_runs() {
        let p = packer(BlockSize::new(3, 3));
        let prev = vec![0u8; SCREEN_CELLS];
        let mut cur = vec![0u8; SCREEN_CELLS];
        // Row 2: a run of 6 identical cells from x=4, plus a lone change.
        for x in 4..10 {
            cur[2 * SCREEN_WIDTH + x] = 8;
        }
        cur[2 * SCREEN_WIDTH + 20] = 3;

        let body = p.diff_per_row(&prev, &cur);
        let expected_row = [
            PER_ROW_CODE_OFFSET + 6,
            4,
            8,
            20,
            3,
            PER_ROW_END_LINE_MARKER,
        ];
        // Two empty rows, then the encoded row.
        assert_eq!(body.bytes[1], PER_ROW_END_LINE_MARKER);
        assert_eq!(body.bytes[2], PER_ROW_END_LINE_MARKER);
        assert_eq!(&body.bytes[3..3 + expected_row.len()], &expected_row);
    }

    #[test]
    fn per_row_writes_short_runs_as_singletons() {
        let p = packer(BlockSize::new(3, 3));
        let prev = vec![0u8; SCREEN_CELLS];
        let mut cur = vec![0u8; SCREEN_CELLS];
        // A run of exactly 3 stays uncompressed (threshold is exclusive).
        for x in 0..3 {
            cur[x] = 5;
        }

        let body = p.diff_per_row(&prev, &cur);
        assert_eq!(
            &body.bytes[1..8],
            &[0, 5, 1, 5, 2, 5, PER_ROW_END_LINE_MARKER]
        );
    }

    #[test]
    fn macro_diff_sets_one_bit_per_changed_block() {
        let p = packer(BlockSize::new(3, 3));
        let prev = vec![0u8; SCREEN_CELLS];
        let mut cur = vec![0u8; SCREEN_CELLS];
        cur[0] = 1; // block 0 of macro-block 0
        cur[3] = 2; // block 1 of macro-block 0

        let body = p.diff_macro(&prev, &cur);
        assert_eq!(body.bytes[0], p.ops().fixed().full_screen_blocks);
        assert_eq!(body.bytes[1], 0b11);
        // 18 raw cells follow: two 3x3 blocks.
        assert_eq!(body.bytes[2], 1);
        // Remaining macro-blocks are untouched bitmaps.
        let zero_bitmaps = body.bytes[2 + 18..].iter().filter(|&&b| b == 0).count();
        assert_eq!(zero_bitmaps, 20);
    }

    #[test]
    fn block_rle_needs_a_three_byte_margin() {
        let mut p = packer(BlockSize::new(4, 5));
        // 20-cell block: 18 cells of 7 then 2 of 9 -> RLE is 4 bytes, wins.
        let mut data = vec![7u8; 18];
        data.extend([9, 9]);
        let mut bytes = Vec::new();
        let mut ops = Vec::new();
        p.encode_block(&data, &mut bytes, &mut ops).expect("encode");

        let rle_op = p.ops().byte_of("FILL_RLE4_20").expect("lazily registered");
        assert_eq!(bytes, vec![rle_op, 18, 7, 2, 9]);

        // A second block of the same shape reuses the opcode.
        let before = p.ops().len();
        p.encode_block(&data, &mut bytes, &mut ops).expect("encode");
        assert_eq!(p.ops().len(), before);
    }

    #[test]
    fn block_without_compression_margin_stays_raw() {
        let mut p = packer(BlockSize::new(2, 2));
        let data = [1u8, 2, 3, 4];
        let mut bytes = Vec::new();
        let mut ops = Vec::new();
        p.encode_block(&data, &mut bytes, &mut ops).expect("encode");

        let fill4 = p.ops().byte_of("FILL4").expect("registered at build");
        assert_eq!(bytes, vec![fill4, 1, 2, 3, 4]);
    }
}
