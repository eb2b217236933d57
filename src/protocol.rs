//! Wire packet format
//!
//! Every packet is self-describing: the full header rides on every message,
//! so a receiver can join mid-stream with no session handshake. Layout is
//! little-endian with no implicit padding:
//!
//! ```text
//! u32 payload_len | u32 sample_rate | u16 frame_index | u8 channels | u8 reserved
//! payload_len bytes of compressed audio
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::PacketError;

/// Serialized header size in bytes
pub const HEADER_LEN: usize = 12;

/// Fixed-layout packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Compressed payload length in bytes
    pub payload_len: u32,
    /// Capture-side sample rate; informational, see [`crate::codec::operating_rate`]
    pub sample_rate: u32,
    /// Increments by one per encoded frame, wrapping mod 65536
    pub frame_index: u16,
    /// Channel count of the encoded stream
    pub channels: u8,
    pub reserved: u8,
}

/// Serialize a header and payload into one wire message.
pub fn serialize(header: &PacketHeader, payload: &[u8]) -> Bytes {
    debug_assert_eq!(header.payload_len as usize, payload.len());

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u32_le(header.payload_len);
    buf.put_u32_le(header.sample_rate);
    buf.put_u16_le(header.frame_index);
    buf.put_u8(header.channels);
    buf.put_u8(header.reserved);
    buf.put_slice(payload);
    buf.freeze()
}

/// Split a wire message into its header and payload.
///
/// Fails when fewer than [`HEADER_LEN`] bytes are present or the declared
/// payload length exceeds what remains; both mean the framing is corrupt.
pub fn deserialize(message: &[u8]) -> Result<(PacketHeader, &[u8]), PacketError> {
    if message.len() < HEADER_LEN {
        return Err(PacketError::TruncatedHeader {
            expected: HEADER_LEN,
            actual: message.len(),
        });
    }

    let mut cursor = message;
    let header = PacketHeader {
        payload_len: cursor.get_u32_le(),
        sample_rate: cursor.get_u32_le(),
        frame_index: cursor.get_u16_le(),
        channels: cursor.get_u8(),
        reserved: cursor.get_u8(),
    };

    let rest = &message[HEADER_LEN..];
    if header.payload_len as usize > rest.len() {
        return Err(PacketError::PayloadOutOfBounds {
            declared: header.payload_len as usize,
            available: rest.len(),
        });
    }

    Ok((header, &rest[..header.payload_len as usize]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> PacketHeader {
        PacketHeader {
            payload_len: 5,
            sample_rate: 48000,
            frame_index: 417,
            channels: 2,
            reserved: 0,
        }
    }

    #[test]
    fn test_round_trip_law() {
        let payload = [0xde, 0xad, 0xbe, 0xef, 0x01];
        let wire = serialize(&header(), &payload);

        let (parsed, body) = deserialize(&wire).unwrap();
        assert_eq!(parsed, header());
        assert_eq!(body, payload);
    }

    #[test]
    fn test_exact_little_endian_layout() {
        let wire = serialize(&header(), &[1, 2, 3, 4, 5]);
        #[rustfmt::skip]
        let expected = [
            5, 0, 0, 0,             // payload_len
            0x80, 0xbb, 0, 0,       // 48000
            0xa1, 0x01,             // 417
            2,                      // channels
            0,                      // reserved
            1, 2, 3, 4, 5,
        ];
        assert_eq!(&wire[..], &expected[..]);
    }

    #[test]
    fn test_truncated_header_rejected() {
        let err = deserialize(&[0u8; HEADER_LEN - 1]).unwrap_err();
        assert!(matches!(err, PacketError::TruncatedHeader { actual: 11, .. }));
    }

    #[test]
    fn test_payload_overrun_rejected() {
        let mut header = header();
        header.payload_len = 100;
        let mut wire = BytesMut::new();
        wire.put_u32_le(header.payload_len);
        wire.put_u32_le(header.sample_rate);
        wire.put_u16_le(header.frame_index);
        wire.put_u8(header.channels);
        wire.put_u8(header.reserved);
        wire.put_slice(&[0u8; 10]);

        let err = deserialize(&wire).unwrap_err();
        assert!(matches!(
            err,
            PacketError::PayloadOutOfBounds {
                declared: 100,
                available: 10
            }
        ));
    }

    #[test]
    fn test_empty_payload_is_valid() {
        let header = PacketHeader {
            payload_len: 0,
            sample_rate: 24000,
            frame_index: 0,
            channels: 1,
            reserved: 0,
        };
        let wire = serialize(&header, &[]);
        assert_eq!(wire.len(), HEADER_LEN);
        let (parsed, body) = deserialize(&wire).unwrap();
        assert_eq!(parsed, header);
        assert!(body.is_empty());
    }
}
