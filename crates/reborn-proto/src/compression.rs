//! Per-frame compression selection and codecs.
//!
//! The sender chooses: payloads of 55 bytes or fewer go uncompressed,
//! anything larger is zlib. Bzip2 shows up from older servers and is accepted
//! on decode only.

use std::io::{Read, Write};

use crate::errors::{ProtocolError, Result};

/// Raw payload size above which the sender switches to zlib.
pub const COMPRESSION_THRESHOLD: usize = 55;

/// Frame compression type, as carried in the byte after the length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionType {
    /// Payload is raw.
    Uncompressed = 0x02,
    /// Payload is a zlib stream.
    Zlib = 0x04,
    /// Payload is a bzip2 stream (decode only).
    Bzip2 = 0x06,
}

impl CompressionType {
    /// Wire value of this compression type.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse the compression byte of a frame.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x02 => Ok(Self::Uncompressed),
            0x04 => Ok(Self::Zlib),
            0x06 => Ok(Self::Bzip2),
            other => Err(ProtocolError::BadCompression(other)),
        }
    }

    /// Cipher word budget for a frame of this type.
    #[must_use]
    pub const fn cipher_limit(self) -> u32 {
        match self {
            Self::Uncompressed => 12,
            Self::Zlib | Self::Bzip2 => 4,
        }
    }

    /// Compression the sender picks for a raw payload of `len` bytes.
    #[must_use]
    pub fn for_payload(len: usize) -> Self {
        if len <= COMPRESSION_THRESHOLD { Self::Uncompressed } else { Self::Zlib }
    }
}

/// Compress a raw payload. Only the encodings the sender produces are
/// supported; asking for bzip2 is a caller bug and reported as such.
pub fn compress(compression: CompressionType, data: &[u8]) -> Result<Vec<u8>> {
    match compression {
        CompressionType::Uncompressed => Ok(data.to_vec()),
        CompressionType::Zlib => {
            let mut encoder =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .and_then(|()| encoder.finish())
                .map_err(|e| ProtocolError::Decompress(format!("zlib encode: {e}")))
        },
        CompressionType::Bzip2 => Err(ProtocolError::BadCompression(CompressionType::Bzip2.as_u8())),
    }
}

/// Decompress a frame payload according to its compression byte.
pub fn decompress(compression: CompressionType, data: &[u8]) -> Result<Vec<u8>> {
    match compression {
        CompressionType::Uncompressed => Ok(data.to_vec()),
        CompressionType::Zlib => {
            let mut out = Vec::new();
            flate2::read::ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| ProtocolError::Decompress(format!("zlib: {e}")))?;
            Ok(out)
        },
        CompressionType::Bzip2 => {
            let mut out = Vec::new();
            bzip2::read::BzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| ProtocolError::Decompress(format!("bzip2: {e}")))?;
            Ok(out)
        },
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn threshold_selects_zlib() {
        assert_eq!(CompressionType::for_payload(0), CompressionType::Uncompressed);
        assert_eq!(CompressionType::for_payload(55), CompressionType::Uncompressed);
        assert_eq!(CompressionType::for_payload(56), CompressionType::Zlib);
    }

    #[test]
    fn reject_unknown_compression_byte() {
        assert_eq!(CompressionType::from_u8(0x03), Err(ProtocolError::BadCompression(0x03)));
    }

    #[test]
    fn corrupt_zlib_reports_decompress() {
        let result = decompress(CompressionType::Zlib, &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(matches!(result, Err(ProtocolError::Decompress(_))));
    }

    #[test]
    fn bzip2_is_decode_only() {
        assert_eq!(
            compress(CompressionType::Bzip2, b"x"),
            Err(ProtocolError::BadCompression(0x06))
        );
    }

    proptest! {
        #[test]
        fn zlib_round_trip(data in prop::collection::vec(any::<u8>(), 0..2048)) {
            let packed = compress(CompressionType::Zlib, &data).unwrap();
            prop_assert_eq!(decompress(CompressionType::Zlib, &packed).unwrap(), data);
        }

        #[test]
        fn uncompressed_round_trip(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let packed = compress(CompressionType::Uncompressed, &data).unwrap();
            prop_assert_eq!(decompress(CompressionType::Uncompressed, &packed).unwrap(), data);
        }
    }
}
