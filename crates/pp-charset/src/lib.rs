/// Réduction et fusion de charsets, et préparation des frames.
///
/// The reducer maps the unbounded set of glyphs drawn from every input frame
/// into a small number of 256-entry charsets assigned across frames, with a
/// similarity-driven fallback when exact deduplication is not enough.

pub mod colorfx;
pub mod reducer;
pub mod reorder;

pub use reducer::{merge_charsets, reduce_charsets, MergeReport, ReduceReport};
pub use reorder::reorder_by_similarity;
