//! Protocol error taxonomy.
//!
//! Frame-level errors (`ShortHeader`, `BadLength`, `Truncated`,
//! `BadCompression`, `Decompress`, `DecryptState`) are fatal to a session:
//! once the byte stream desynchronizes there is no way to find the next frame
//! boundary. Packet-level errors (`BadPacket`, `UnexpectedEof`,
//! `UnknownProperty`) are scoped to one logical packet and are skippable.

use thiserror::Error;

/// Convenience alias used throughout the protocol crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced by the wire codec layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Frame header shorter than the fixed prefix.
    #[error("frame header too short: expected {expected} bytes, got {actual}")]
    ShortHeader {
        /// Bytes required for the prefix.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Frame length field was zero (a frame always carries the compression
    /// byte).
    #[error("frame length field is zero")]
    BadLength,

    /// Frame body shorter than the length field declared.
    #[error("frame truncated: declared {declared} bytes, got {actual}")]
    Truncated {
        /// Byte count the length field declared.
        declared: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// Compression type byte is none of 0x02 / 0x04 / 0x06.
    #[error("unknown compression type byte {0:#04x}")]
    BadCompression(u8),

    /// The decompressor reported corrupt input.
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// Cipher state became inconsistent with the frame stream.
    #[error("cipher state inconsistent: {0}")]
    DecryptState(String),

    /// A logical packet body did not match its registered layout.
    #[error("malformed packet: {0}")]
    BadPacket(String),

    /// A field reader ran off the end of the packet body.
    #[error("unexpected end of packet while reading {0}")]
    UnexpectedEof(&'static str),

    /// A value does not fit the wire encoding it was asked to use.
    #[error("value out of range for {what}: {value}")]
    OutOfRange {
        /// Field being encoded.
        what: &'static str,
        /// Offending value.
        value: u64,
    },

    /// Property id with no registered layout and no skip fallback.
    ///
    /// Non-fatal: the caller drops the remainder of the property stream and
    /// keeps the session.
    #[error("unknown property id {0}")]
    UnknownProperty(u8),

    /// A `GLEVNW01` level file failed to parse.
    #[error("malformed level file: {0}")]
    BadLevel(String),

    /// A `.gmap` manifest failed to parse.
    #[error("malformed gmap manifest: {0}")]
    BadGmap(String),
}

impl ProtocolError {
    /// Whether this error must terminate the session.
    ///
    /// Frame-level failures poison the byte stream; everything else is scoped
    /// to a single logical packet and can be skipped.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ShortHeader { .. }
                | Self::BadLength
                | Self::Truncated { .. }
                | Self::BadCompression(_)
                | Self::Decompress(_)
                | Self::DecryptState(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_are_fatal() {
        assert!(ProtocolError::BadLength.is_fatal());
        assert!(ProtocolError::BadCompression(0x55).is_fatal());
        assert!(ProtocolError::Decompress("truncated stream".into()).is_fatal());
    }

    #[test]
    fn packet_errors_are_skippable() {
        assert!(!ProtocolError::BadPacket("short body".into()).is_fatal());
        assert!(!ProtocolError::UnknownProperty(77).is_fatal());
        assert!(!ProtocolError::UnexpectedEof("gshort").is_fatal());
    }
}
