//! TCP frame codec and logical-packet batch splitting.
//!
//! Wire layout per frame:
//!
//! ```text
//! [length: u16 big-endian][compression: u8][encrypted payload: length - 1 bytes]
//! ```
//!
//! The decrypted, decompressed payload is a batch of logical packets of the
//! shape `[id + 32][body]`, separated by `\n`. The one wrinkle is the
//! raw-data preamble (packet id 100): it announces that the next N bytes of
//! the logical stream form a single packet that is carved positionally, not
//! split on newlines; board data and file contents travel this way. The
//! carve state persists across frames, so [`BatchSplitter`] is stateful and
//! owned per direction.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    cipher::Gen5Cipher,
    codecs::PacketReader,
    compression::{self, CompressionType},
    errors::{ProtocolError, Result},
};

/// Packet id of the raw-data preamble.
const RAW_DATA_ID: u8 = 100;

/// Upper bound accepted from a raw-data preamble. Larger announcements are
/// treated as malformed and ignored rather than buffered.
const MAX_RAW_CHUNK: usize = 8 * 1024 * 1024;

/// One direction of the frame codec: cipher state plus compression policy.
///
/// A session owns two, send and receive, seeded with the same key.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    cipher: Gen5Cipher,
}

impl FrameCodec {
    /// Create a codec seeded with the connection key.
    #[must_use]
    pub fn new(key: u8) -> Self {
        Self { cipher: Gen5Cipher::new(key) }
    }

    /// Encode one frame from an inner packet batch.
    ///
    /// Picks the compression type from the raw length (§ uncompressed up to
    /// 55 bytes, zlib beyond), compresses, encrypts, and prepends the
    /// compression byte and the 2-byte length.
    pub fn encode(&mut self, inner: &[u8]) -> Result<Vec<u8>> {
        let compression = CompressionType::for_payload(inner.len());
        let mut payload = compression::compress(compression, inner)?;

        let declared = payload.len() + 1;
        if declared > usize::from(u16::MAX) {
            return Err(ProtocolError::OutOfRange {
                what: "frame length",
                value: declared as u64,
            });
        }

        self.cipher.apply_frame(compression, &mut payload);

        let mut frame = Vec::with_capacity(2 + declared);
        frame.put_u16(declared as u16);
        frame.put_u8(compression.as_u8());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a frame body (everything after the 2-byte length prefix).
    ///
    /// `body` must be exactly the declared length: one compression byte plus
    /// the encrypted payload. Returns the decompressed inner batch.
    pub fn decode_body(&mut self, body: &[u8]) -> Result<Vec<u8>> {
        let (&compression_byte, encrypted) = body.split_first().ok_or(ProtocolError::BadLength)?;
        let compression = CompressionType::from_u8(compression_byte)?;

        let mut payload = encrypted.to_vec();
        self.cipher.apply_frame(compression, &mut payload);

        compression::decompress(compression, &payload)
    }

    /// Decode one frame from the front of `wire`.
    ///
    /// Returns the inner batch and the number of bytes consumed. Errors if
    /// the buffer does not hold a complete frame; streaming callers should
    /// first check completeness with [`frame_len`].
    pub fn decode(&mut self, wire: &[u8]) -> Result<(Vec<u8>, usize)> {
        let declared = frame_len(wire)?
            .ok_or(ProtocolError::ShortHeader { expected: 2, actual: wire.len() })?;
        let total = 2 + declared;
        if wire.len() < total {
            return Err(ProtocolError::Truncated { declared, actual: wire.len() - 2 });
        }
        let inner = self.decode_body(&wire[2..total])?;
        Ok((inner, total))
    }
}

/// Read the declared body length of the frame at the front of `wire`.
///
/// `Ok(None)` when fewer than two bytes are buffered yet.
pub fn frame_len(wire: &[u8]) -> Result<Option<usize>> {
    let Some(prefix) = wire.get(..2) else {
        return Ok(None);
    };
    let declared = usize::from(u16::from_be_bytes([prefix[0], prefix[1]]));
    if declared == 0 {
        return Err(ProtocolError::BadLength);
    }
    Ok(Some(declared))
}

/// One logical packet as cut from a batch: decoded id and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// Packet id (wire byte minus 32).
    pub id: u8,
    /// Body bytes, excluding the id byte and the newline separator.
    pub body: Bytes,
}

/// Stateful splitter turning decompressed frame payloads into logical
/// packets.
#[derive(Debug, Default)]
pub struct BatchSplitter {
    pending_raw: usize,
    raw_buf: BytesMut,
}

impl BatchSplitter {
    /// Fresh splitter with no carve state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Split one decompressed frame payload into logical packets.
    ///
    /// Raw-data preambles switch the splitter into positional mode for the
    /// announced byte count; the mode survives across calls when a carve
    /// spans frames.
    pub fn split(&mut self, inner: &[u8]) -> Vec<RawPacket> {
        let mut out = Vec::new();
        let mut rest = inner;

        loop {
            if self.pending_raw > 0 {
                let take = self.pending_raw.min(rest.len());
                self.raw_buf.extend_from_slice(&rest[..take]);
                rest = &rest[take..];
                self.pending_raw -= take;

                if self.pending_raw > 0 {
                    break; // chunk continues in the next frame
                }

                let chunk = self.raw_buf.split().freeze();
                if let Some(&id_byte) = chunk.first() {
                    out.push(RawPacket { id: id_byte.wrapping_sub(32), body: chunk.slice(1..) });
                }
                // Servers newline-terminate the carved packet like any other.
                if rest.first() == Some(&b'\n') {
                    rest = &rest[1..];
                }
            }

            if rest.is_empty() {
                break;
            }

            let (segment, tail) = match rest.iter().position(|&b| b == b'\n') {
                Some(pos) => (&rest[..pos], &rest[pos + 1..]),
                None => (rest, &rest[rest.len()..]),
            };
            rest = tail;

            let Some((&id_byte, body)) = segment.split_first() else {
                continue; // empty segment between consecutive newlines
            };
            let id = id_byte.wrapping_sub(32);

            if id == RAW_DATA_ID {
                let announced = PacketReader::new(body).gint_var().unwrap_or(0) as usize;
                if announced > 0 && announced <= MAX_RAW_CHUNK {
                    self.pending_raw = announced;
                    self.raw_buf.clear();
                    self.raw_buf.reserve(announced);
                }
            }

            out.push(RawPacket { id, body: Bytes::copy_from_slice(body) });
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::codecs::write_gint5;

    fn pair(key: u8) -> (FrameCodec, FrameCodec) {
        (FrameCodec::new(key), FrameCodec::new(key))
    }

    #[test]
    fn short_payload_stays_uncompressed() {
        let (mut tx, _) = pair(0x42);
        let frame = tx.encode(b"small").unwrap();
        assert_eq!(frame[2], CompressionType::Uncompressed.as_u8());
        assert_eq!(u16::from_be_bytes([frame[0], frame[1]]) as usize, frame.len() - 2);
    }

    #[test]
    fn long_payload_selects_zlib() {
        let (mut tx, _) = pair(0x42);
        let frame = tx.encode(&[b'x'; 200]).unwrap();
        assert_eq!(frame[2], CompressionType::Zlib.as_u8());
    }

    #[test]
    fn reject_zero_length() {
        let (_, mut rx) = pair(0);
        assert_eq!(rx.decode(&[0, 0, 0x02]), Err(ProtocolError::BadLength));
    }

    #[test]
    fn reject_truncated_frame() {
        let (_, mut rx) = pair(0);
        let result = rx.decode(&[0, 10, 0x02, 1, 2]);
        assert_eq!(result, Err(ProtocolError::Truncated { declared: 10, actual: 3 }));
    }

    #[test]
    fn reject_bad_compression_byte() {
        let (_, mut rx) = pair(0);
        let result = rx.decode(&[0, 2, 0x07, 0]);
        assert!(matches!(result, Err(ProtocolError::BadCompression(0x07))));
    }

    #[test]
    fn split_plain_batch() {
        let mut splitter = BatchSplitter::new();
        let packets = splitter.split(b"\x39sig\n\x4ahello\n");
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0], RawPacket { id: 25, body: Bytes::from_static(b"sig") });
        assert_eq!(packets[1], RawPacket { id: 42, body: Bytes::from_static(b"hello") });
    }

    #[test]
    fn split_skips_empty_segments_and_accepts_missing_trailer() {
        let mut splitter = BatchSplitter::new();
        let packets = splitter.split(b"\n\n\x39a");
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].id, 25);
    }

    #[test]
    fn raw_preamble_carves_positionally() {
        // rawdata announcing a 10-byte chunk: board-style packet whose body
        // contains a raw newline.
        let mut batch = vec![100 + 32];
        write_gint5(&mut batch, 10);
        batch.push(b'\n');
        batch.push(101 + 32);
        batch.extend_from_slice(b"ab\ncd\xFF\xFE12");
        batch.push(b'\n');
        batch.extend_from_slice(b"\x39after\n");

        let mut splitter = BatchSplitter::new();
        let packets = splitter.split(&batch);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].id, 100);
        assert_eq!(packets[1].id, 101);
        assert_eq!(packets[1].body.as_ref(), b"ab\ncd\xFF\xFE12");
        assert_eq!(packets[2].id, 25);
    }

    #[test]
    fn raw_chunk_spans_frames() {
        let mut first = vec![100 + 32];
        write_gint5(&mut first, 9);
        first.push(b'\n');
        first.push(101 + 32);
        first.extend_from_slice(b"1234"); // 5 of 9 bytes

        let mut splitter = BatchSplitter::new();
        let packets = splitter.split(&first);
        assert_eq!(packets.len(), 1); // only the preamble so far
        assert_eq!(packets[0].id, 100);

        let packets = splitter.split(b"5678\n\x39tail\n");
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].id, 101);
        assert_eq!(packets[0].body.as_ref(), b"12345678");
        assert_eq!(packets[1].id, 25);
    }

    proptest! {
        #[test]
        fn frame_round_trip(
            key in any::<u8>(),
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..300), 1..6),
        ) {
            let (mut tx, mut rx) = pair(key);
            for payload in &payloads {
                let frame = tx.encode(payload).unwrap();
                let (inner, consumed) = rx.decode(&frame).unwrap();
                prop_assert_eq!(consumed, frame.len());
                prop_assert_eq!(&inner, payload);
            }
        }

        #[test]
        fn frame_round_trip_concatenated(
            key in any::<u8>(),
            a in prop::collection::vec(any::<u8>(), 1..200),
            b in prop::collection::vec(any::<u8>(), 1..200),
        ) {
            // Two frames back to back in one buffer, as a socket would
            // deliver them.
            let (mut tx, mut rx) = pair(key);
            let mut wire = tx.encode(&a).unwrap();
            wire.extend(tx.encode(&b).unwrap());

            let (first, used) = rx.decode(&wire).unwrap();
            let (second, _) = rx.decode(&wire[used..]).unwrap();
            prop_assert_eq!(first, a);
            prop_assert_eq!(second, b);
        }
    }
}
