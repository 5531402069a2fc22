//! Compact identifier decoding
//!
//! Manifests store asset identifiers in a packed form: two raw characters
//! followed by twenty base64 characters, each pair of which carries three
//! hexadecimal nibbles. Decoding expands that back to the canonical
//! 36-character `8-4-4-4-12` form.
//!
//! Decoding is a pure function. Every call builds its output in a local
//! buffer, so it can run from any number of tasks or threads at once.

/// Length of a packed identifier (without any `@` suffix)
pub const COMPACT_LEN: usize = 22;

/// Length of the already-canonical short identifier form
pub const SHORT_LEN: usize = 9;

/// Length of a canonical identifier
pub const CANONICAL_LEN: usize = 36;

const BASE64_KEYS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Marks a byte outside the base64 alphabet
const INVALID: u8 = 64;

/// Byte -> 6-bit value lookup, `INVALID` for everything outside the alphabet (including `=`)
static BASE64_VALUES: [u8; 128] = build_base64_values();

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Non-hyphen positions of the canonical form, in fill order
static DIGIT_POSITIONS: [usize; CANONICAL_LEN - HYPHEN_POSITIONS.len()] = build_digit_positions();

const fn build_base64_values() -> [u8; 128] {
    let mut values = [INVALID; 128];
    let mut i = 0;
    while i < BASE64_KEYS.len() {
        values[BASE64_KEYS[i] as usize] = i as u8;
        i += 1;
    }
    values
}

const fn build_digit_positions() -> [usize; CANONICAL_LEN - HYPHEN_POSITIONS.len()] {
    let mut positions = [0; CANONICAL_LEN - HYPHEN_POSITIONS.len()];
    let mut pos = 0;
    let mut out = 0;
    while pos < CANONICAL_LEN {
        let is_hyphen = pos == HYPHEN_POSITIONS[0]
            || pos == HYPHEN_POSITIONS[1]
            || pos == HYPHEN_POSITIONS[2]
            || pos == HYPHEN_POSITIONS[3];
        if !is_hyphen {
            positions[out] = pos;
            out += 1;
        }
        pos += 1;
    }
    positions
}

fn base64_value(byte: u8) -> u8 {
    BASE64_VALUES
        .get(byte as usize)
        .copied()
        .unwrap_or(INVALID)
}

/// Decode a compact identifier into its canonical form
///
/// Anything after an `@` is carried over verbatim. Inputs whose identifier
/// part is not exactly 22 characters (the 9-character short form included)
/// are returned unchanged, as are packed inputs containing bytes outside the
/// base64 alphabet.
///
/// ```
/// use bundle_dl::decoder::decode_uuid;
///
/// assert_eq!(
///     decode_uuid("fcmR3XADNLgJ1ByKhqcC5Z"),
///     "fc991dd7-0033-4b80-9d41-c8a86a702e59"
/// );
/// assert_eq!(decode_uuid("0e95a9f8d"), "0e95a9f8d");
/// ```
pub fn decode_uuid(compact: &str) -> String {
    let (id, suffix) = match compact.find('@') {
        Some(at) => compact.split_at(at),
        None => (compact, ""),
    };

    if id.len() == SHORT_LEN {
        return compact.to_string();
    }

    match expand(id.as_bytes()) {
        Some(canonical) => {
            let mut out = String::with_capacity(CANONICAL_LEN + suffix.len());
            // expand() only emits ASCII
            out.extend(canonical.iter().map(|&b| b as char));
            out.push_str(suffix);
            out
        }
        None => compact.to_string(),
    }
}

/// Expand a 22-byte packed identifier into the 36-byte canonical form
fn expand(packed: &[u8]) -> Option<[u8; CANONICAL_LEN]> {
    if packed.len() != COMPACT_LEN || !packed.is_ascii() {
        return None;
    }

    let mut out = [b'-'; CANONICAL_LEN];
    out[DIGIT_POSITIONS[0]] = packed[0];
    out[DIGIT_POSITIONS[1]] = packed[1];

    let mut slot = 2;
    for pair in packed[2..].chunks_exact(2) {
        let lhs = base64_value(pair[0]);
        let rhs = base64_value(pair[1]);
        if lhs == INVALID || rhs == INVALID {
            return None;
        }

        let nibbles = [lhs >> 2, ((lhs & 0b11) << 2) | (rhs >> 4), rhs & 0xF];
        for nibble in nibbles {
            out[DIGIT_POSITIONS[slot]] = HEX_CHARS[nibble as usize];
            slot += 1;
        }
    }

    Some(out)
}
