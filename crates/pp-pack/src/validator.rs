//! Interprète de référence du flux emballé.
//!
//! Piloté par la table d'opcodes du packer, il rejoue chaque frame à partir
//! de la précédente et sert uniquement à valider le flux par aller-retour
//! contre les écrans sources. Toute divergence est un bug du packer.

use pp_core::{PackError, ScreenSequence, SCREEN_CELLS, SCREEN_HEIGHT, SCREEN_WIDTH};

use crate::differ::{PER_ROW_CODE_OFFSET, PER_ROW_END_LINE_MARKER};
use crate::packer::{FillKind, Packer};
use crate::rle;

/// Reference interpreter over a packed stream.
///
/// Shares the packer's opcode table and block geometry read-only.
///
/// # Example
/// ```
/// use pp_core::{Charset, CharsetId, Screen, ScreenSequence};
/// use pp_pack::{BlockSize, PackOptions, Packer};
/// use pp_pack::validator::Validator;
///
/// let seq = ScreenSequence::new(
///     vec![Screen::blank(0, CharsetId(0))],
///     vec![Charset::seeded()],
/// );
/// let mut packer = Packer::new(BlockSize::new(3, 3), PackOptions::default()).unwrap();
/// let stream = packer.pack(&seq).unwrap();
/// Validator::new(&packer).validate(&stream, &seq).unwrap();
/// ```
pub struct Validator<'a> {
    packer: &'a Packer,
}

impl<'a> Validator<'a> {
    #[must_use]
    pub fn new(packer: &'a Packer) -> Self {
        Validator { packer }
    }

    /// Rejoue le flux et compare chaque frame reproduite à sa source.
    ///
    /// Les deux canaux partent de zéro ; le canal écran est comparé sauf en
    /// mode couleur seule, le canal couleur l'est quand il est emballé.
    ///
    /// # Errors
    /// `ValidatorMismatch` à la première divergence, ou les erreurs
    /// d'interprétation du flux.
    pub fn validate(&self, stream: &[u8], seq: &ScreenSequence) -> Result<(), PackError> {
        let options = self.packer.options();
        let mut screen = vec![0u8; SCREEN_CELLS];
        let mut color = vec![0u8; SCREEN_CELLS];
        let mut offset = 0usize;

        for (frame, source) in seq.screens.iter().enumerate() {
            offset = self.unpack_frame(stream, offset, &mut screen, &mut color)?;

            if !options.use_only_color {
                check_channel(frame, "screen", &screen, &source.codes)?;
            }
            if options.use_color {
                check_channel(frame, "color", &color, &source.colors)?;
            }
        }

        let op = *stream
            .get(offset)
            .ok_or(PackError::TruncatedStream { offset })?;
        if op != self.packer.ops().fixed().restart {
            return Err(PackError::UnknownOpcode { op, offset });
        }
        Ok(())
    }

    /// Interprète un corps de frame jusqu'à FRAME_END inclus et rend l'offset
    /// du premier octet de la frame suivante.
    ///
    /// # Errors
    /// `UnknownOpcode` sur un octet sans signification enregistrée,
    /// `TruncatedStream` sur une lecture au-delà du flux, `InvalidInput` sur
    /// un état incohérent (remplissage sans SET_DEST_PTR, débordement).
    pub fn unpack_frame(
        &self,
        stream: &[u8],
        mut offset: usize,
        screen: &mut [u8],
        color: &mut [u8],
    ) -> Result<usize, PackError> {
        let fixed = self.packer.ops().fixed();
        let geometry = self.packer.geometry();
        let mut block_ptr: Option<usize> = None;
        let mut writing_screen = true;

        loop {
            let op_offset = offset;
            let op = read_byte(stream, &mut offset)?;

            if op == fixed.frame_end {
                return Ok(offset);
            } else if op == fixed.full_screen_blocks {
                let target: &mut [u8] = if writing_screen { &mut *screen } else { &mut *color };
                for mb in geometry.macro_blocks() {
                    let changes = read_byte(stream, &mut offset)?;
                    for (k, block) in geometry.blocks_of(mb).iter().enumerate() {
                        if changes & (1 << k) != 0 {
                            for &cell in block.offsets() {
                                target[cell] = read_byte(stream, &mut offset)?;
                            }
                        }
                    }
                }
            } else if op == fixed.set_dest_ptr {
                let index = usize::from(read_byte(stream, &mut offset)?);
                if index >= geometry.blocks().len() {
                    return Err(PackError::InvalidInput(format!(
                        "SET_DEST_PTR {index} outside the {} blocks of the geometry",
                        geometry.blocks().len()
                    )));
                }
                block_ptr = Some(index);
            } else if op == fixed.set_border
                || op == fixed.set_background
                || op == fixed.set_charset
                || op == fixed.set_anim_slowdown
            {
                // One argument byte, no effect on the reproduced arrays.
                read_byte(stream, &mut offset)?;
            } else if op == fixed.set_color_mode {
                writing_screen = false;
            } else if op == fixed.set_screen_mode {
                writing_screen = true;
            } else if op == fixed.clear {
                let value = read_byte(stream, &mut offset)?;
                let target: &mut [u8] = if writing_screen { &mut *screen } else { &mut *color };
                target.fill(value);
            } else if op == fixed.clear_color {
                let value = read_byte(stream, &mut offset)?;
                color.fill(value);
            } else if op == fixed.full_screen_rle {
                let target: &mut [u8] = if writing_screen { &mut *screen } else { &mut *color };
                let mut cell = 0usize;
                loop {
                    let count = read_byte(stream, &mut offset)?;
                    if count == rle::FULL_SCREEN_END_MARKER {
                        break;
                    }
                    let value = read_byte(stream, &mut offset)?;
                    let end = cell + usize::from(count);
                    if end > SCREEN_CELLS {
                        return Err(PackError::InvalidInput(format!(
                            "full-screen RLE overruns the screen at offset {op_offset}"
                        )));
                    }
                    target[cell..end].fill(value);
                    cell = end;
                }
            } else if op == fixed.per_row_changes {
                let target: &mut [u8] = if writing_screen { &mut *screen } else { &mut *color };
                for y in 0..SCREEN_HEIGHT {
                    let mut code = read_byte(stream, &mut offset)?;
                    while code != PER_ROW_END_LINE_MARKER {
                        if code > PER_ROW_CODE_OFFSET {
                            let count = usize::from(code - PER_ROW_CODE_OFFSET);
                            let x = usize::from(read_byte(stream, &mut offset)?);
                            let value = read_byte(stream, &mut offset)?;
                            // A run never crosses its row; a malformed one
                            // would silently spill into the next row.
                            if x + count > SCREEN_WIDTH {
                                return Err(PackError::InvalidInput(format!(
                                    "per-row run x={x} len={count} overruns row {y} \
                                     at offset {op_offset}"
                                )));
                            }
                            for i in 0..count {
                                target[y * SCREEN_WIDTH + x + i] = value;
                            }
                        } else {
                            let x = usize::from(code);
                            let value = read_byte(stream, &mut offset)?;
                            if x >= SCREEN_WIDTH {
                                return Err(PackError::InvalidInput(format!(
                                    "per-row cell x={x} outside row {y} at offset {op_offset}"
                                )));
                            }
                            target[y * SCREEN_WIDTH + x] = value;
                        }
                        code = read_byte(stream, &mut offset)?;
                    }
                }
            } else {
                match self.packer.fill_kinds[usize::from(op)] {
                    FillKind::Raw => {
                        let block = current_block(self.packer, block_ptr, op_offset)?;
                        let target: &mut [u8] = if writing_screen { &mut *screen } else { &mut *color };
                        for &cell in block {
                            target[cell] = read_byte(stream, &mut offset)?;
                        }
                    }
                    FillKind::Same => {
                        let value = read_byte(stream, &mut offset)?;
                        let block = current_block(self.packer, block_ptr, op_offset)?;
                        let target: &mut [u8] = if writing_screen { &mut *screen } else { &mut *color };
                        for &cell in block {
                            target[cell] = value;
                        }
                    }
                    FillKind::Rle { encoded_len } => {
                        if offset + encoded_len > stream.len() {
                            return Err(PackError::TruncatedStream {
                                offset: stream.len(),
                            });
                        }
                        let decoded = rle::decode(&stream[offset..offset + encoded_len])?;
                        offset += encoded_len;
                        let block = current_block(self.packer, block_ptr, op_offset)?;
                        let target: &mut [u8] = if writing_screen { &mut *screen } else { &mut *color };
                        for (&cell, &value) in block.iter().zip(decoded.iter()) {
                            target[cell] = value;
                        }
                    }
                    FillKind::None => {
                        return Err(PackError::UnknownOpcode {
                            op,
                            offset: op_offset,
                        });
                    }
                }
            }
        }
    }
}

/// Offsets du bloc courant, ou erreur si aucun SET_DEST_PTR n'a été vu.
fn current_block<'p>(
    packer: &'p Packer,
    block_ptr: Option<usize>,
    op_offset: usize,
) -> Result<&'p [usize], PackError> {
    let index = block_ptr.ok_or_else(|| {
        PackError::InvalidInput(format!("fill opcode at offset {op_offset} without SET_DEST_PTR"))
    })?;
    Ok(packer.geometry().blocks()[index].offsets())
}

fn read_byte(stream: &[u8], offset: &mut usize) -> Result<u8, PackError> {
    let byte = *stream
        .get(*offset)
        .ok_or(PackError::TruncatedStream { offset: *offset })?;
    *offset += 1;
    Ok(byte)
}

fn check_channel(
    frame: usize,
    channel: &'static str,
    actual: &[u8],
    expected: &[u8],
) -> Result<(), PackError> {
    for (offset, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        if a != e {
            return Err(PackError::ValidatorMismatch {
                frame,
                channel,
                offset,
                expected: e,
                actual: a,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BlockSize;
    use crate::packer::PackOptions;
    use pp_core::{Charset, CharsetId, Glyph, Screen};

    fn test_charset(len: usize) -> Charset {
        Charset::from_glyphs((0..len).map(|i| Glyph::from_rows([i as u8; 8])).collect())
    }

    fn xorshift(state: &mut u32) -> u32 {
        *state ^= *state << 13;
        *state ^= *state >> 17;
        *state ^= *state << 5;
        *state
    }

    /// Frames corrélées : chacune part de la précédente et mute des cellules
    /// pseudo-aléatoires, pour exercer toutes les stratégies du differ.
    fn correlated_sequence(frames: usize, seed: u32) -> ScreenSequence {
        let charset = test_charset(16);
        let mut state = seed;
        let mut screens: Vec<Screen> = Vec::new();

        for index in 0..frames {
            let mut screen = if index == 0 {
                Screen::blank(0, CharsetId(0))
            } else {
                let mut s = screens[index - 1].clone();
                s.index = index;
                s
            };
            for _ in 0..120 {
                let cell = xorshift(&mut state) as usize % 1000;
                screen.codes[cell] = (xorshift(&mut state) % 16) as u8;
                screen.colors[cell] = (xorshift(&mut state) % 16) as u8;
            }
            screens.push(screen);
        }

        ScreenSequence::new(screens, vec![charset])
    }

    #[test]
    fn round_trips_the_screen_channel() {
        let seq = correlated_sequence(5, 0xDEAD_BEEF);
        for block_size in [BlockSize::new(2, 2), BlockSize::new(3, 3), BlockSize::new(4, 5)] {
            let mut packer = Packer::new(block_size, PackOptions::default()).expect("packer");
            let stream = packer.pack(&seq).expect("pack");
            Validator::new(&packer)
                .validate(&stream, &seq)
                .unwrap_or_else(|e| panic!("round trip failed for {block_size}: {e}"));
        }
    }

    #[test]
    fn round_trips_both_channels_in_color_mode() {
        let seq = correlated_sequence(4, 0x1234_5678);
        let options = PackOptions {
            use_color: true,
            ..PackOptions::default()
        };
        let mut packer = Packer::new(BlockSize::new(3, 3), options).expect("packer");
        let stream = packer.pack(&seq).expect("pack");
        Validator::new(&packer).validate(&stream, &seq).expect("color round trip");
    }

    #[test]
    fn round_trips_in_only_per_row_mode() {
        let seq = correlated_sequence(3, 0xCAFE_F00D);
        let options = PackOptions {
            only_per_row: true,
            ..PackOptions::default()
        };
        let mut packer = Packer::new(BlockSize::new(3, 3), options).expect("packer");
        let stream = packer.pack(&seq).expect("pack");
        Validator::new(&packer).validate(&stream, &seq).expect("per-row round trip");
    }

    #[test]
    fn corruption_is_reported_at_the_first_diverging_frame() {
        let charset = test_charset(4);
        let frame0 = Screen::blank(0, CharsetId(0));
        let mut frame1 = Screen::blank(1, CharsetId(0));
        frame1.codes[0] = 1;
        let seq = ScreenSequence::new(vec![frame0, frame1], vec![charset]);

        let mut packer =
            Packer::new(BlockSize::new(2, 2), PackOptions::default()).expect("packer");
        let mut stream = packer.pack(&seq).expect("pack");
        Validator::new(&packer).validate(&stream, &seq).expect("sane before corruption");

        // Flip the FILL4 payload byte that carries the single changed cell.
        let fill4 = packer.ops().byte_of("FILL4").expect("registered");
        let payload = stream
            .iter()
            .position(|&b| b == fill4)
            .expect("FILL4 in stream")
            + 1;
        stream[payload] ^= 0x02;

        let err = Validator::new(&packer)
            .validate(&stream, &seq)
            .expect_err("corruption must be caught");
        assert!(matches!(
            err,
            PackError::ValidatorMismatch {
                frame: 1,
                channel: "screen",
                offset: 0,
                ..
            }
        ));
    }

    #[test]
    fn per_row_overruns_are_rejected() {
        let seq = correlated_sequence(1, 11);
        let mut packer =
            Packer::new(BlockSize::new(3, 3), PackOptions::default()).expect("packer");
        let _ = packer.pack(&seq).expect("pack");
        let per_row = packer.ops().fixed().per_row_changes;

        // A run of 50 cells from x=0 spills past the 40-cell row.
        let err = Validator::new(&packer)
            .unpack_frame(&[per_row, 150, 0, 7], 0, &mut [0; 1000], &mut [0; 1000])
            .expect_err("row overrun");
        assert!(matches!(err, PackError::InvalidInput(_)));

        // A singleton at x=45 lies outside the row entirely.
        let err = Validator::new(&packer)
            .unpack_frame(&[per_row, 45, 7], 0, &mut [0; 1000], &mut [0; 1000])
            .expect_err("cell outside row");
        assert!(matches!(err, PackError::InvalidInput(_)));
    }

    #[test]
    fn unregistered_opcode_is_rejected() {
        let seq = correlated_sequence(1, 7);
        let mut packer =
            Packer::new(BlockSize::new(3, 3), PackOptions::default()).expect("packer");
        let _ = packer.pack(&seq).expect("pack");

        // Byte 254 is far past every allocated opcode of this geometry.
        let err = Validator::new(&packer)
            .unpack_frame(&[254, 0], 0, &mut [0; 1000], &mut [0; 1000])
            .expect_err("unknown opcode");
        assert!(matches!(err, PackError::UnknownOpcode { op: 254, offset: 0 }));
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let seq = correlated_sequence(2, 99);
        let mut packer =
            Packer::new(BlockSize::new(3, 3), PackOptions::default()).expect("packer");
        let stream = packer.pack(&seq).expect("pack");

        let err = Validator::new(&packer)
            .validate(&stream[..stream.len() - 2], &seq)
            .expect_err("missing FRAME_END and RESTART");
        assert!(matches!(
            err,
            PackError::TruncatedStream { .. } | PackError::UnknownOpcode { .. }
        ));
    }
}
