//! Wire framing for the demultiplexed session transport (spec §4.A).
//!
//! Every frame carries a single header byte ahead of its (possibly
//! AEAD-sealed) body:
//!
//! ```text
//! bit:     7 6 5 4 3 2 1 0
//!          [T][ reserved  ]
//! ```
//!
//! The top 2 bits select the [`ProtocolType`]; the remaining 6 bits are
//! reserved and must round-trip as zero.

use crate::error::{NegError, Result};

/// Which sub-protocol a frame's body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolType {
    /// Meta-negotiation frame (protocol proposals, evaluations, code-gen
    /// coordination).
    Meta = 0b00,
    /// Application frame, dispatched per the agreed protocol document.
    Application = 0b01,
    /// Free-form natural-language frame.
    Natural = 0b10,
    /// Verification/heartbeat frame (PING/PONG).
    Verification = 0b11,
}

impl ProtocolType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => ProtocolType::Meta,
            0b01 => ProtocolType::Application,
            0b10 => ProtocolType::Natural,
            _ => ProtocolType::Verification,
        }
    }

    fn as_bits(self) -> u8 {
        self as u8
    }
}

/// The 1-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    protocol_type: ProtocolType,
}

impl Header {
    /// Build a header for the given protocol type.
    pub fn new(protocol_type: ProtocolType) -> Self {
        Self { protocol_type }
    }

    /// Which sub-protocol this frame belongs to.
    pub fn protocol_type(self) -> ProtocolType {
        self.protocol_type
    }

    /// Encode to the single wire byte: type in the top 2 bits, reserved
    /// bits zeroed.
    pub fn encode(self) -> u8 {
        self.protocol_type.as_bits() << 6
    }

    /// Decode the wire byte. The reserved low 6 bits are ignored on
    /// decode (forward-compatible with future flags) but are zeroed by
    /// `encode`, so a round-trip through `encode`/`decode` is always
    /// exact.
    pub fn decode(byte: u8) -> Self {
        Self {
            protocol_type: ProtocolType::from_bits(byte >> 6),
        }
    }
}

/// Split an incoming buffer into its header byte and body.
pub fn split_frame(buf: &[u8]) -> Result<(Header, &[u8])> {
    let (first, rest) = buf
        .split_first()
        .ok_or_else(|| NegError::InvalidFrame("empty frame".to_string()))?;
    Ok((Header::decode(*first), rest))
}

/// Prepend a header byte to a body, producing a complete wire frame.
pub fn join_frame(header: Header, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + body.len());
    frame.push(header.encode());
    frame.extend_from_slice(body);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn header_roundtrip_known_types() {
        for pt in [
            ProtocolType::Meta,
            ProtocolType::Application,
            ProtocolType::Natural,
            ProtocolType::Verification,
        ] {
            let header = Header::new(pt);
            let decoded = Header::decode(header.encode());
            assert_eq!(decoded.protocol_type(), pt);
        }
    }

    #[test]
    fn reserved_bits_are_zeroed_on_encode() {
        let header = Header::new(ProtocolType::Application);
        assert_eq!(header.encode() & 0b0011_1111, 0);
    }

    #[test]
    fn split_frame_rejects_empty_buffer() {
        assert!(split_frame(&[]).is_err());
    }

    #[test]
    fn split_join_roundtrip() {
        let header = Header::new(ProtocolType::Natural);
        let body = b"hello";
        let frame = join_frame(header, body);
        let (decoded_header, decoded_body) = split_frame(&frame).unwrap();
        assert_eq!(decoded_header, header);
        assert_eq!(decoded_body, body);
    }

    proptest! {
        #[test]
        fn header_roundtrip_any_byte(byte in any::<u8>()) {
            let header = Header::decode(byte);
            let re_encoded = header.encode();
            let re_decoded = Header::decode(re_encoded);
            prop_assert_eq!(header.protocol_type(), re_decoded.protocol_type());
        }
    }
}
