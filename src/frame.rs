//! The 13 byte frame shared by requests and replies:
//!
//! ```text
//! | 0xA5 | address | command | 0x08 | payload (8 bytes) | checksum |
//! ```

use crate::codec::{checksum, verify_checksum};

pub const FRAME_LENGTH: usize = 13;
pub const PAYLOAD_LENGTH: usize = 8;
const START_BYTE: u8 = 0xa5;
const DATA_LENGTH: u8 = 0x08;
const PAYLOAD_OFFSET: usize = 4;
const COMMAND_OFFSET: usize = 2;

/// Sequence byte the device puts into padding frames of multi-frame replies.
pub const INVALID_SEQUENCE: u8 = 0xff;

/// Builds a request frame, `extra` is left-justified into the zero padded payload.
pub fn encode_request(address: u8, command: u8, extra: &[u8]) -> [u8; FRAME_LENGTH] {
    let mut tx_buffer = [0; FRAME_LENGTH];
    tx_buffer[0] = START_BYTE;
    tx_buffer[1] = address;
    tx_buffer[COMMAND_OFFSET] = command;
    tx_buffer[3] = DATA_LENGTH;
    if extra.len() > PAYLOAD_LENGTH {
        log::warn!(
            "Extra payload truncated - length={} maximum={}",
            extra.len(),
            PAYLOAD_LENGTH
        );
    }
    let n = extra.len().min(PAYLOAD_LENGTH);
    tx_buffer[PAYLOAD_OFFSET..PAYLOAD_OFFSET + n].copy_from_slice(&extra[..n]);
    tx_buffer[FRAME_LENGTH - 1] = checksum(&tx_buffer[..FRAME_LENGTH - 1]);
    tx_buffer
}

/// Validated payload region of a reply frame.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Payload([u8; PAYLOAD_LENGTH]);

impl Payload {
    pub fn new(bytes: [u8; PAYLOAD_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The leading echo byte, which numbers the frames of multi-frame replies.
    pub fn sequence(&self) -> u8 {
        self.0[0]
    }

    pub fn bytes(&self) -> &[u8; PAYLOAD_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Payload({:02X?})", self.0)
    }
}

/// Why a received buffer was not accepted as a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Invalid frame size - required={required} received={received}")]
    Length { required: usize, received: usize },
    #[error("Command mismatch - expected={expected:02X} received={received:02X}")]
    CommandMismatch { expected: u8, received: u8 },
    #[error("Invalid checksum - calculated={calculated:02X} received={received:02X}")]
    Checksum { calculated: u8, received: u8 },
}

/// Checks command id and checksum of a reply and extracts its payload.
pub fn validate_response(rx_buffer: &[u8], expected_command: u8) -> Result<Payload, Rejection> {
    if rx_buffer.len() < FRAME_LENGTH {
        return Err(Rejection::Length {
            required: FRAME_LENGTH,
            received: rx_buffer.len(),
        });
    }
    let frame = &rx_buffer[..FRAME_LENGTH];
    if frame[COMMAND_OFFSET] != expected_command {
        return Err(Rejection::CommandMismatch {
            expected: expected_command,
            received: frame[COMMAND_OFFSET],
        });
    }
    if !verify_checksum(frame) {
        return Err(Rejection::Checksum {
            calculated: checksum(&frame[..FRAME_LENGTH - 1]),
            received: frame[FRAME_LENGTH - 1],
        });
    }
    let mut payload = [0; PAYLOAD_LENGTH];
    payload.copy_from_slice(&frame[PAYLOAD_OFFSET..FRAME_LENGTH - 1]);
    Ok(Payload(payload))
}

#[cfg(test)]
pub(crate) fn encode_response(address: u8, command: u8, payload: [u8; PAYLOAD_LENGTH]) -> Vec<u8> {
    encode_request(address, command, &payload).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soc_request_layout() {
        let frame = encode_request(0x40, 0x90, &[]);
        let sum = frame[..12].iter().fold(0u8, |s, b| s.wrapping_add(*b));
        assert_eq!(
            frame,
            [0xa5, 0x40, 0x90, 0x08, 0, 0, 0, 0, 0, 0, 0, 0, sum]
        );
        assert_eq!(sum, 0x7d);
    }

    #[test]
    fn extra_payload_is_left_justified() {
        let frame = encode_request(0x40, 0xda, &[0x01]);
        assert_eq!(&frame[4..12], &[0x01, 0, 0, 0, 0, 0, 0, 0]);
        assert!(verify_checksum(&frame));
    }

    #[test]
    fn oversized_extra_is_truncated() {
        let frame = encode_request(0x40, 0x21, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(&frame[4..12], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(verify_checksum(&frame));
    }

    #[test]
    fn accepts_valid_reply() {
        let reply = encode_response(0x01, 0x94, [0x10, 0x04, 0x01, 0x00, 0x02, 0x00, 0x2a, 0x00]);
        let payload = validate_response(&reply, 0x94).unwrap();
        assert_eq!(payload.bytes(), &[0x10, 0x04, 0x01, 0x00, 0x02, 0x00, 0x2a, 0x00]);
        assert_eq!(payload.sequence(), 0x10);
    }

    #[test]
    fn rejects_other_command() {
        let reply = encode_response(0x01, 0x91, [0; PAYLOAD_LENGTH]);
        assert_eq!(
            validate_response(&reply, 0x90),
            Err(Rejection::CommandMismatch {
                expected: 0x90,
                received: 0x91
            })
        );
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut reply = encode_response(0x01, 0x90, [0; PAYLOAD_LENGTH]);
        reply[12] = reply[12].wrapping_add(1);
        assert!(matches!(
            validate_response(&reply, 0x90),
            Err(Rejection::Checksum { .. })
        ));
    }

    #[test]
    fn rejects_short_buffer() {
        assert_eq!(
            validate_response(&[0xa5, 0x01, 0x90], 0x90),
            Err(Rejection::Length {
                required: FRAME_LENGTH,
                received: 3
            })
        );
    }
}
