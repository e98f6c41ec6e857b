//! Les deux codecs run-length du packer.
//!
//! Le codec de bloc émet des paires `(count, value)` avec `count` dans
//! `[1, 64]` et sans marqueur de fin : l'appelant encadre la charge utile.
//! La variante plein écran réserve l'octet 255 comme marqueur de fin et
//! plafonne donc ses runs à 254. Les deux coexistent volontairement.

use pp_core::PackError;

/// Longueur maximale d'un run du codec de bloc.
pub const MAX_RUN: usize = 64;
/// Marqueur de fin de la variante plein écran.
pub const FULL_SCREEN_END_MARKER: u8 = 255;
/// Longueur maximale d'un run plein écran (255 est le marqueur).
pub const MAX_FULL_SCREEN_RUN: usize = 254;

/// Run-length encode `data` into `(count, value)` pairs, runs capped at 64.
///
/// A run longer than 64 is split into consecutive pairs of the same value.
///
/// # Example
/// ```
/// use pp_pack::rle::encode;
/// assert_eq!(encode(&[5, 5, 5, 9]), vec![3, 5, 1, 9]);
/// assert_eq!(encode(&[]), vec![]);
/// ```
#[must_use]
pub fn encode(data: &[u8]) -> Vec<u8> {
    let Some((&first, rest)) = data.split_first() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut count = 1usize;
    let mut current = first;

    for &value in rest {
        if value == current && count < MAX_RUN {
            count += 1;
        } else {
            out.push(count as u8);
            out.push(current);
            count = 1;
            current = value;
        }
    }

    out.push(count as u8);
    out.push(current);
    out
}

/// Inverse of [`encode`].
///
/// # Errors
/// `MalformedRle` when the payload has an odd number of bytes.
///
/// # Example
/// ```
/// use pp_pack::rle::decode;
/// assert_eq!(decode(&[3, 5, 1, 9]).unwrap(), vec![5, 5, 5, 9]);
/// assert!(decode(&[3]).is_err());
/// ```
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>, PackError> {
    if encoded.len() % 2 != 0 {
        return Err(PackError::MalformedRle { len: encoded.len() });
    }

    let mut out = Vec::new();
    for pair in encoded.chunks_exact(2) {
        let count = usize::from(pair[0]);
        let value = pair[1];
        out.extend(std::iter::repeat_n(value, count));
    }
    Ok(out)
}

/// Full-screen run-length body: `(count, value)` pairs with `count <= 254`,
/// terminated by [`FULL_SCREEN_END_MARKER`].
///
/// # Example
/// ```
/// use pp_pack::rle::encode_full_screen;
/// let body = encode_full_screen(&[7; 3]);
/// assert_eq!(body, vec![3, 7, 255]);
/// ```
#[must_use]
pub fn encode_full_screen(data: &[u8]) -> Vec<u8> {
    let Some((&first, rest)) = data.split_first() else {
        return vec![FULL_SCREEN_END_MARKER];
    };

    let mut out = Vec::new();
    let mut count = 1usize;
    let mut current = first;

    for &value in rest {
        if value == current && count < MAX_FULL_SCREEN_RUN {
            count += 1;
        } else {
            out.push(count as u8);
            out.push(current);
            count = 1;
            current = value;
        }
    }

    out.push(count as u8);
    out.push(current);
    out.push(FULL_SCREEN_END_MARKER);
    out
}
