//! Hex helpers and the additive frame checksum.
//!
//! The device calls its checksum a "CRC" but it is a plain 8-bit wrapping sum
//! over every byte in front of it.

use std::fmt::Write;

/// Renders one byte as two lowercase hex characters.
pub fn byte_to_hex(byte: u8) -> String {
    format!("{byte:02x}")
}

/// Renders a byte sequence as concatenated lowercase hex.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Decodes a hex string pair by pair.
///
/// A pair that is not valid hex decodes to `0x00`, a trailing odd character is
/// decoded on its own.
pub fn hex_to_bytes(hex: &str) -> Vec<u8> {
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .unwrap_or(0)
        })
        .collect()
}

/// Strict variant of [`hex_to_bytes`] for hex typed by a user.
///
/// Returns `None` unless the input is an even number of hex digits.
pub fn parse_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(hex_to_bytes(hex))
}

/// Wrapping sum of all bytes, `0` for an empty slice.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// True when the last byte is the checksum of everything before it.
pub fn verify_checksum(bytes: &[u8]) -> bool {
    match bytes.split_last() {
        Some((last, body)) => checksum(body) == *last,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_to_hex_is_lowercase_and_padded() {
        assert_eq!(byte_to_hex(0x00), "00");
        assert_eq!(byte_to_hex(0x0a), "0a");
        assert_eq!(byte_to_hex(0xA5), "a5");
    }

    #[test]
    fn hex_round_trip() {
        let bytes = [0xa5, 0x40, 0x90, 0x08, 0x00, 0xff, 0x7d];
        assert_eq!(hex_to_bytes(&bytes_to_hex(&bytes)), bytes);
        assert!(hex_to_bytes("").is_empty());
    }

    #[test]
    fn every_byte_round_trips() {
        for byte in 0..=u8::MAX {
            assert_eq!(hex_to_bytes(&byte_to_hex(byte)), vec![byte]);
            assert_eq!(hex_to_bytes(&bytes_to_hex(&[byte])), vec![byte]);
        }
    }

    #[test]
    fn sequences_of_any_length_round_trip() {
        // Deterministic pseudo random content, lengths 0 to 63
        let mut state: u32 = 0x2545_f491;
        for len in 0..64 {
            let bytes: Vec<u8> = (0..len)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    state as u8
                })
                .collect();
            let hex = bytes_to_hex(&bytes);
            assert_eq!(hex.len(), 2 * len);
            assert_eq!(hex_to_bytes(&hex), bytes);
            assert_eq!(parse_hex(&hex), Some(bytes));
        }
    }

    #[test]
    fn strict_parse_rejects_malformed_hex() {
        assert_eq!(parse_hex("D901"), Some(vec![0xd9, 0x01]));
        assert_eq!(parse_hex(""), Some(Vec::new()));
        assert_eq!(parse_hex("g0"), None);
        assert_eq!(parse_hex("abc"), None);
        assert_eq!(parse_hex("+1"), None);
        assert_eq!(parse_hex("0x90"), None);
    }

    #[test]
    fn malformed_hex_pairs_decode_to_zero() {
        assert_eq!(hex_to_bytes("zz01"), vec![0x00, 0x01]);
        assert_eq!(hex_to_bytes("D9"), vec![0xd9]);
        assert_eq!(hex_to_bytes("abc"), vec![0xab, 0x0c]);
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x01, 0x02]), 0x03);
        assert_eq!(checksum(&[0xff, 0x02]), 0x01);
        // Status request from the Daly UART documentation
        assert_eq!(
            checksum(&[0xa5, 0x40, 0x94, 0x08, 0, 0, 0, 0, 0, 0, 0, 0]),
            0x81
        );
    }

    #[test]
    fn verify_checksum_accepts_appended_sum() {
        let mut frame = vec![0xa5, 0x01, 0x90, 0x08, 0x01, 0x09, 0x00, 0x00, 0x75, 0x30];
        frame.push(checksum(&frame));
        assert!(verify_checksum(&frame));
        assert!(!verify_checksum(&[]));
    }

    #[test]
    fn single_bit_flip_breaks_checksum() {
        let body = [0xa5, 0x01, 0x95, 0x08, 0x01, 0x0c, 0xe4, 0x0c, 0xe5, 0x0c, 0xe6, 0x00];
        let mut frame = body.to_vec();
        frame.push(checksum(&body));
        for index in 0..body.len() {
            for bit in 0..8 {
                let mut corrupted = frame.clone();
                corrupted[index] ^= 1 << bit;
                assert!(
                    !verify_checksum(&corrupted),
                    "flip of bit {bit} in byte {index} went unnoticed"
                );
            }
        }
    }
}
