/// Compression inter-frames : géométrie de blocs, table d'opcodes, differ,
/// packer, validateur et recherche de géométrie.
///
/// The packer turns a [`pp_core::ScreenSequence`] into a flat byte stream of
/// opcodes plus payload that rebuilds each frame from the previous one. The
/// validator is a reference interpreter used purely to round-trip the stream
/// against the source screens.

pub mod differ;
pub mod geometry;
pub mod opcodes;
pub mod packer;
pub mod rle;
pub mod search;
pub mod validator;

pub use geometry::{BlockSize, Geometry, CANDIDATE_BLOCK_SIZES, MACRO_FACTOR};
pub use opcodes::OpcodeTable;
pub use packer::{PackOptions, Packer};
pub use search::{pack_animation, PackedAnimation};
