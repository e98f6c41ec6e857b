//! Découpage de l'écran 40×25 en macro-blocs et blocs.
//!
//! La table `index de bloc → offsets` est précalculée une fois par géométrie
//! et partagée en lecture seule par le packer et le validateur.

use std::ops::Range;

use pp_core::{SCREEN_CELLS, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Dimensions d'un bloc (ou facteur de macro-bloc) en cellules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSize {
    pub x: usize,
    pub y: usize,
}

impl BlockSize {
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        BlockSize { x, y }
    }
}

impl std::fmt::Display for BlockSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// Facteur de macro-bloc : chaque macro-bloc contient 2×4 blocs.
pub const MACRO_FACTOR: BlockSize = BlockSize::new(2, 4);

/// Tailles de bloc explorées par la recherche de géométrie, dans l'ordre de
/// départage.
pub const CANDIDATE_BLOCK_SIZES: [BlockSize; 8] = [
    BlockSize::new(2, 2),
    BlockSize::new(2, 3),
    BlockSize::new(3, 2),
    BlockSize::new(3, 3),
    BlockSize::new(3, 4),
    BlockSize::new(4, 3),
    BlockSize::new(4, 4),
    BlockSize::new(4, 5),
];

/// Rectangle `(x, y, w, h)` sur la grille écran, avec ses offsets linéaires
/// précalculés (`y*40 + x + …`, seuls les offsets < 1000 sont gardés).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    offsets: Vec<usize>,
}

impl Block {
    fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        let mut offsets = Vec::with_capacity(width * height);
        for yy in y..y + height {
            for xx in x..x + width {
                let offset = yy * SCREEN_WIDTH + xx;
                if offset < SCREEN_CELLS {
                    offsets.push(offset);
                }
            }
        }
        Block {
            x,
            y,
            width,
            height,
            offsets,
        }
    }

    /// Linear cell offsets covered by this block, in row-major order.
    #[inline(always)]
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// True when the block covers the same cells in both screens.
    #[inline]
    #[must_use]
    pub fn is_same(&self, screen1: &[u8], screen2: &[u8]) -> bool {
        self.offsets.iter().all(|&o| screen1[o] == screen2[o])
    }

    /// Copy of the block cells from `screen`, in offset order.
    #[must_use]
    pub fn read(&self, screen: &[u8]) -> Vec<u8> {
        self.offsets.iter().map(|&o| screen[o]).collect()
    }
}

/// Un macro-bloc : une fenêtre de `mx·bx × my·by` cellules contenant une
/// plage contiguë de blocs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroBlock {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    /// Plage d'indices dans [`Geometry::blocks`].
    pub blocks: Range<usize>,
}

/// Block layout over the 40×25 grid for one candidate block size.
///
/// Macro-blocks are walked top-to-bottom, left-to-right; blocks inside a
/// macro-block likewise. Blocks whose first offset falls outside the screen
/// are dropped.
///
/// # Example
/// ```
/// use pp_pack::geometry::{BlockSize, Geometry, MACRO_FACTOR};
/// let geo = Geometry::new(BlockSize::new(3, 3), MACRO_FACTOR);
/// assert_eq!(geo.blocks().len(), 126);
/// assert_eq!(&geo.blocks()[0].offsets()[..3], &[0, 1, 2]);
/// ```
#[derive(Clone, Debug)]
pub struct Geometry {
    pub block_size: BlockSize,
    pub macro_factor: BlockSize,
    blocks: Vec<Block>,
    macro_blocks: Vec<MacroBlock>,
}

impl Geometry {
    #[must_use]
    pub fn new(block_size: BlockSize, macro_factor: BlockSize) -> Self {
        let x_step = macro_factor.x * block_size.x;
        let y_step = macro_factor.y * block_size.y;

        let mut blocks = Vec::new();
        let mut macro_blocks = Vec::new();

        for macro_y in (0..SCREEN_HEIGHT).step_by(y_step) {
            for macro_x in (0..SCREEN_WIDTH).step_by(x_step) {
                let start = blocks.len();
                for y in (macro_y..macro_y + y_step).step_by(block_size.y) {
                    for x in (macro_x..macro_x + x_step).step_by(block_size.x) {
                        let block = Block::new(x, y, block_size.x, block_size.y);
                        if !block.is_empty() {
                            blocks.push(block);
                        }
                    }
                }
                macro_blocks.push(MacroBlock {
                    x: macro_x,
                    y: macro_y,
                    width: x_step,
                    height: y_step,
                    blocks: start..blocks.len(),
                });
            }
        }

        Geometry {
            block_size,
            macro_factor,
            blocks,
            macro_blocks,
        }
    }

    #[inline(always)]
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[inline(always)]
    #[must_use]
    pub fn macro_blocks(&self) -> &[MacroBlock] {
        &self.macro_blocks
    }

    /// Blocks of one macro-block, in emission order.
    #[inline]
    #[must_use]
    pub fn blocks_of(&self, macro_block: &MacroBlock) -> &[Block] {
        &self.blocks[macro_block.blocks.clone()]
    }

    /// Distinct block sizes (`len(offsets)`) in first-seen emission order.
    /// Drives the registration of the `FILL{n}`/`FILL_SAME{n}` opcodes.
    #[must_use]
    pub fn distinct_block_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::new();
        for block in &self.blocks {
            let sz = block.len();
            if sz > 0 && !sizes.contains(&sz) {
                sizes.push(sz);
            }
        }
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_by_three_layout() {
        let geo = Geometry::new(BlockSize::new(3, 3), MACRO_FACTOR);
        // 3 macro rows x 7 macro columns.
        assert_eq!(geo.macro_blocks().len(), 21);
        // Two full macro rows of 8 blocks, bottom row keeps only y=24.
        assert_eq!(geo.blocks().len(), 126);
        assert_eq!(geo.distinct_block_sizes(), vec![9, 3, 1]);
    }

    #[test]
    fn two_by_two_layout_exceeds_one_byte_of_blocks() {
        let geo = Geometry::new(BlockSize::new(2, 2), MACRO_FACTOR);
        assert_eq!(geo.blocks().len(), 260);
        assert_eq!(geo.distinct_block_sizes(), vec![4, 2]);
    }

    #[test]
    fn offsets_are_clipped_to_the_screen() {
        let geo = Geometry::new(BlockSize::new(3, 3), MACRO_FACTOR);
        for block in geo.blocks() {
            assert!(!block.is_empty());
            assert!(block.offsets().iter().all(|&o| o < SCREEN_CELLS));
        }
        // Bottom-right block wraps past the row end and keeps a single cell.
        let last = geo.blocks().last().expect("non-empty geometry");
        assert_eq!(last.offsets(), &[999]);
    }

    #[test]
    fn macro_ranges_cover_all_blocks_once() {
        let geo = Geometry::new(BlockSize::new(4, 5), MACRO_FACTOR);
        let mut covered = 0usize;
        for mb in geo.macro_blocks() {
            assert!(!geo.blocks_of(mb).is_empty());
            covered += geo.blocks_of(mb).len();
        }
        assert_eq!(covered, geo.blocks().len());
    }

    #[test]
    fn block_same_and_read() {
        let geo = Geometry::new(BlockSize::new(2, 2), MACRO_FACTOR);
        let a = vec![0u8; SCREEN_CELLS];
        let mut b = vec![0u8; SCREEN_CELLS];
        b[41] = 9; // row 1, col 1 -> inside block 0

        let block0 = &geo.blocks()[0];
        assert!(!block0.is_same(&a, &b));
        assert_eq!(block0.read(&b), vec![0, 0, 0, 9]);

        assert!(geo.blocks()[1].is_same(&a, &b));
    }
}
