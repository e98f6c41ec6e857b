//! Table d'opcodes dynamique du packer.
//!
//! Le noyau fixe est enregistré en premier, puis deux opcodes de remplissage
//! par taille de bloc distincte de la géométrie. Les variantes RLE
//! dimensionnées sont ajoutées paresseusement à leur première utilisation.
//! L'octet 255 n'est jamais un opcode valide.

use std::collections::HashMap;

use pp_core::PackError;

/// Nom sentinelle des entrées non allouées ou gelées.
pub const ERROR_NAME: &str = "ERROR";

/// Nombre maximal d'opcodes vivants (octets 0..=254).
pub const MAX_OPCODES: usize = 255;

/// Les opcodes du noyau fixe, dans l'ordre d'allocation.
const FIXED_NAMES: [&str; 15] = [
    ERROR_NAME,
    "SET_BORDER",
    "SET_BACKGROUND",
    "FRAME_END",
    "SET_CHARSET",
    "RESTART",
    "SET_DEST_PTR",
    "SET_COLOR_MODE",
    "SET_SCREEN_MODE",
    "FULL_SCREEN_RLE",
    "CLEAR",
    "CLEAR_COLOR",
    "FULL_SCREEN_2x2_BLOCKS",
    "PER_ROW_CHANGES",
    "SET_ANIM_SLOWDOWN",
];

/// Octets des opcodes du noyau fixe.
#[derive(Clone, Copy, Debug)]
pub struct FixedOps {
    pub error: u8,
    pub set_border: u8,
    pub set_background: u8,
    pub frame_end: u8,
    pub set_charset: u8,
    pub restart: u8,
    pub set_dest_ptr: u8,
    pub set_color_mode: u8,
    pub set_screen_mode: u8,
    pub full_screen_rle: u8,
    pub clear: u8,
    pub clear_color: u8,
    pub full_screen_blocks: u8,
    pub per_row_changes: u8,
    pub set_anim_slowdown: u8,
}

/// Two-way map `opcode byte <-> symbolic name`, allocated densely from 0.
///
/// # Example
/// ```
/// use pp_pack::opcodes::OpcodeTable;
/// let table = OpcodeTable::with_fixed_ops().unwrap();
/// assert_eq!(table.fixed().frame_end, 3);
/// assert_eq!(table.name_of(5), "RESTART");
/// ```
#[derive(Clone, Debug)]
pub struct OpcodeTable {
    names: Vec<String>,
    by_name: HashMap<String, u8>,
    next_free: usize,
    fixed: FixedOps,
}

impl OpcodeTable {
    /// Construit la table et enregistre le noyau fixe dans l'ordre déclaré.
    ///
    /// # Errors
    /// `OpcodeSpaceExhausted` ne peut pas se produire ici (15 opcodes), mais
    /// la signature suit [`OpcodeTable::add`].
    pub fn with_fixed_ops() -> Result<Self, PackError> {
        let mut table = OpcodeTable {
            names: vec![ERROR_NAME.to_string(); 256],
            by_name: HashMap::new(),
            next_free: 0,
            fixed: FixedOps {
                error: 0,
                set_border: 0,
                set_background: 0,
                frame_end: 0,
                set_charset: 0,
                restart: 0,
                set_dest_ptr: 0,
                set_color_mode: 0,
                set_screen_mode: 0,
                full_screen_rle: 0,
                clear: 0,
                clear_color: 0,
                full_screen_blocks: 0,
                per_row_changes: 0,
                set_anim_slowdown: 0,
            },
        };

        let mut bytes = [0u8; FIXED_NAMES.len()];
        for (i, name) in FIXED_NAMES.iter().enumerate() {
            bytes[i] = table.add(name)?;
        }
        table.fixed = FixedOps {
            error: bytes[0],
            set_border: bytes[1],
            set_background: bytes[2],
            frame_end: bytes[3],
            set_charset: bytes[4],
            restart: bytes[5],
            set_dest_ptr: bytes[6],
            set_color_mode: bytes[7],
            set_screen_mode: bytes[8],
            full_screen_rle: bytes[9],
            clear: bytes[10],
            clear_color: bytes[11],
            full_screen_blocks: bytes[12],
            per_row_changes: bytes[13],
            set_anim_slowdown: bytes[14],
        };
        Ok(table)
    }

    /// Register a new opcode and return its byte.
    ///
    /// # Errors
    /// `OpcodeSpaceExhausted` once all 255 opcode bytes are allocated.
    pub fn add(&mut self, name: &str) -> Result<u8, PackError> {
        if self.next_free >= MAX_OPCODES {
            return Err(PackError::OpcodeSpaceExhausted {
                count: self.next_free,
            });
        }
        let op = self.next_free as u8;
        self.next_free += 1;
        self.names[usize::from(op)] = name.to_string();
        self.by_name.insert(name.to_string(), op);
        Ok(op)
    }

    #[inline(always)]
    #[must_use]
    pub fn fixed(&self) -> FixedOps {
        self.fixed
    }

    /// Symbolic name of an opcode byte (`ERROR` for unallocated entries).
    #[inline]
    #[must_use]
    pub fn name_of(&self, op: u8) -> &str {
        &self.names[usize::from(op)]
    }

    #[must_use]
    pub fn byte_of(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }

    /// True when `op` was allocated (whether or not it survived the freeze).
    #[inline(always)]
    #[must_use]
    pub fn is_allocated(&self, op: u8) -> bool {
        usize::from(op) < self.next_free
    }

    /// Nombre d'opcodes vivants.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.next_free
    }

    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_free == 0
    }

    /// Gèle la table : toute entrée absente de `used` retombe sur la
    /// sentinelle `ERROR` avant l'émission de la table compagnon.
    pub fn freeze(&mut self, used: &[bool; 256]) {
        for (op, name) in self.names.iter_mut().enumerate() {
            if !used[op] && name != ERROR_NAME {
                self.by_name.remove(name);
                *name = ERROR_NAME.to_string();
            }
        }
    }

    /// Table compagnon `octet -> nom symbolique` pour les entrées allouées.
    #[must_use]
    pub fn entries(&self) -> Vec<(u8, String)> {
        (0..self.next_free)
            .map(|op| (op as u8, self.names[op].clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_core_is_allocated_in_declared_order() {
        let table = OpcodeTable::with_fixed_ops().expect("15 ops fit");
        for (i, name) in FIXED_NAMES.iter().enumerate() {
            assert_eq!(table.name_of(i as u8), *name);
            assert_eq!(table.byte_of(name), Some(i as u8));
        }
        let fixed = table.fixed();
        assert_eq!(fixed.error, 0);
        assert_eq!(fixed.set_border, 1);
        assert_eq!(fixed.frame_end, 3);
        assert_eq!(fixed.restart, 5);
        assert_eq!(fixed.set_anim_slowdown, 14);
        assert_eq!(table.len(), 15);
    }

    #[test]
    fn space_is_bounded_at_255() {
        let mut table = OpcodeTable::with_fixed_ops().expect("15 ops fit");
        for i in table.len()..MAX_OPCODES {
            table.add(&format!("FILL_RLE{i}_64")).expect("room left");
        }
        assert_eq!(table.len(), MAX_OPCODES);
        assert!(matches!(
            table.add("ONE_TOO_MANY"),
            Err(PackError::OpcodeSpaceExhausted { count: 255 })
        ));
        // Byte 255 is never a valid opcode.
        assert!(!table.is_allocated(255));
        assert_eq!(table.name_of(255), ERROR_NAME);
    }

    #[test]
    fn freeze_resets_unused_entries() {
        let mut table = OpcodeTable::with_fixed_ops().expect("15 ops fit");
        let fill = table.add("FILL9").expect("room left");

        let mut used = [false; 256];
        used[usize::from(table.fixed().frame_end)] = true;
        used[usize::from(table.fixed().restart)] = true;
        table.freeze(&used);

        assert_eq!(table.name_of(table.fixed().frame_end), "FRAME_END");
        assert_eq!(table.name_of(fill), ERROR_NAME);
        assert_eq!(table.name_of(table.fixed().set_border), ERROR_NAME);
        assert_eq!(table.byte_of("FILL9"), None);
        // The byte itself stays allocated; only its meaning is dropped.
        assert!(table.is_allocated(fill));
    }
}
