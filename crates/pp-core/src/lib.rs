/// Types, erreurs et configuration partagés de petpack.
///
/// This crate contains the glyph/distance primitives, charset and screen
/// data model, error taxonomy, and configuration logic used across the
/// petpack workspace.

pub mod charset;
pub mod config;
pub mod error;
pub mod glyph;
pub mod screen;

pub use charset::{Charset, CharsetId, MAX_CHARSET_LEN};
pub use config::ConvertConfig;
pub use error::PackError;
pub use glyph::{Glyph, GlyphEquality};
pub use screen::{Screen, ScreenSequence, SCREEN_CELLS, SCREEN_HEIGHT, SCREEN_WIDTH};
