use thiserror::Error;

/// Errors originating from the packing pipeline.
///
/// Aucune n'est rattrapée silencieusement : chaque variante est fatale pour
/// l'exécution en cours et remonte à l'appelant.
#[derive(Error, Debug)]
pub enum PackError {
    /// Malformed caller input (frame dump, container, sequence invariants).
    #[error("Entrée invalide : {0}")]
    InvalidInput(String),

    /// The opcode table ran past 255 live entries.
    #[error("Espace d'opcodes épuisé : {count} opcodes vivants")]
    OpcodeSpaceExhausted {
        /// Live opcode count at the time of failure.
        count: usize,
    },

    /// RLE payload with an odd number of bytes.
    #[error("Flux RLE malformé : longueur impaire {len}")]
    MalformedRle {
        /// Length of the offending payload.
        len: usize,
    },

    /// A single frame needs more glyphs than a charset can hold, even after
    /// the maximum reduction tier.
    #[error("Limite de charsets intenable : frame {frame} demande {glyphs} glyphes")]
    CharsetLimitInfeasible {
        /// Frame that overflowed.
        frame: usize,
        /// Glyph count required by that frame.
        glyphs: usize,
    },

    /// The reference interpreter reproduced something else than the source
    /// frame. Always a packer bug.
    #[error(
        "Désaccord packer/validateur : frame {frame}, canal {channel}, offset {offset} \
         (attendu {expected}, obtenu {actual})"
    )]
    ValidatorMismatch {
        /// First diverging frame.
        frame: usize,
        /// `"screen"` or `"color"`.
        channel: &'static str,
        /// First diverging cell offset.
        offset: usize,
        /// Value in the source frame.
        expected: u8,
        /// Value reproduced by the interpreter.
        actual: u8,
    },

    /// The interpreter hit an opcode byte with no registered meaning.
    #[error("Opcode inconnu {op} à l'offset {offset} du flux")]
    UnknownOpcode {
        /// Offending opcode byte.
        op: u8,
        /// Stream offset where it was read.
        offset: usize,
    },

    /// The interpreter ran off the end of the stream.
    #[error("Flux tronqué à l'offset {offset}")]
    TruncatedStream {
        /// Offset of the read past the end.
        offset: usize,
    },
}
