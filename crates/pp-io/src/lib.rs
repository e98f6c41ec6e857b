/// Entrées/sorties de petpack : dumps texte, conteneur JSON, binaires de
/// charset et artefacts compagnons du flux.

pub mod charset_bin;
pub mod frame_dump;
pub mod petmate;
pub mod report;

pub use charset_bin::{read_charset_file, write_charset_file};
pub use frame_dump::{parse_frame_dump, write_frame_dump};
pub use petmate::parse_petmate;
pub use report::write_outputs;
