//! ENCRYPT_GEN_5 partial stream cipher.
//!
//! The keystream comes from a linear congruential generator: every fourth
//! byte, while the per-frame `limit` is positive, the 32-bit iterator advances
//! by `it = it * 0x8088405 + key` and its little-endian bytes are XORed into
//! the payload. Once the limit is exhausted the iterator freezes but the XOR
//! keeps running with the last value for the rest of the frame.
//!
//! The iterator carries over between frames of the same direction; only the
//! limit is reset per frame (12 words uncompressed, 4 compressed). Encryption
//! and decryption are the same operation.

use crate::compression::CompressionType;

/// Initial iterator value, shared by both directions.
pub const ITERATOR_SEED: u32 = 0x04A8_0B38;

/// LCG multiplier.
pub const MULTIPLIER: u32 = 0x0808_8405;

/// One direction of the GEN-5 cipher.
///
/// A session keeps two independent instances, send and receive, seeded with
/// the same key and [`ITERATOR_SEED`] at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gen5Cipher {
    key: u8,
    iterator: u32,
    limit: u32,
}

impl Gen5Cipher {
    /// Create a cipher for a fresh connection.
    #[must_use]
    pub fn new(key: u8) -> Self {
        Self { key, iterator: ITERATOR_SEED, limit: 0 }
    }

    /// Encryption key this direction was seeded with.
    #[must_use]
    pub fn key(&self) -> u8 {
        self.key
    }

    /// Reset the word limit for a new frame.
    ///
    /// The iterator is deliberately left alone: its value is the carried
    /// cross-frame state.
    pub fn start_frame(&mut self, compression: CompressionType) {
        self.limit = compression.cipher_limit();
    }

    /// XOR the keystream over `buf` in place.
    ///
    /// Works for both directions; applying twice with identical starting
    /// state is the identity.
    pub fn apply(&mut self, buf: &mut [u8]) {
        let mut word = self.iterator.to_le_bytes();

        for (i, byte) in buf.iter_mut().enumerate() {
            if i % 4 == 0 && self.limit > 0 {
                self.iterator =
                    self.iterator.wrapping_mul(MULTIPLIER).wrapping_add(u32::from(self.key));
                self.limit -= 1;
                word = self.iterator.to_le_bytes();
            }

            // NOTE: no break when the limit hits zero. Historical clients
            // stopped XORing here and misdecrypted everything past 12 (or 4)
            // words; the remainder of the frame must keep XORing with the
            // frozen iterator.
            *byte ^= word[i % 4];
        }
    }

    /// Convenience: `start_frame` followed by `apply`.
    pub fn apply_frame(&mut self, compression: CompressionType, buf: &mut [u8]) {
        self.start_frame(compression);
        self.apply(buf);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    /// Reference keystream: the raw LCG words, unbounded.
    fn lcg_words(key: u8, count: usize) -> Vec<u32> {
        let mut it = ITERATOR_SEED;
        (0..count)
            .map(|_| {
                it = it.wrapping_mul(MULTIPLIER).wrapping_add(u32::from(key));
                it
            })
            .collect()
    }

    #[test]
    fn keystream_matches_lcg_within_limit() {
        // Key 0, compressed limit (4 words), all-zero payload: the output is
        // exactly the little-endian bytes of the first four iterator values.
        let mut cipher = Gen5Cipher::new(0);
        let mut buf = [0u8; 16];
        cipher.apply_frame(CompressionType::Zlib, &mut buf);

        let words = lcg_words(0, 4);
        for (i, word) in words.iter().enumerate() {
            assert_eq!(&buf[i * 4..i * 4 + 4], &word.to_le_bytes());
        }
    }

    #[test]
    fn xor_continues_after_limit() {
        let mut cipher = Gen5Cipher::new(0);
        let mut buf = [0u8; 24];
        cipher.apply_frame(CompressionType::Zlib, &mut buf);

        // Bytes 16..24 keep XORing with the frozen fourth word.
        let last = lcg_words(0, 4)[3].to_le_bytes();
        assert_eq!(&buf[16..20], &last);
        assert_eq!(&buf[20..24], &last);
    }

    #[test]
    fn uncompressed_frames_mix_twelve_words() {
        let mut cipher = Gen5Cipher::new(7);
        let mut buf = [0u8; 64];
        cipher.apply_frame(CompressionType::Uncompressed, &mut buf);

        let words = lcg_words(7, 12);
        // Word 12 covers bytes 44..48; bytes 48.. reuse it.
        assert_eq!(&buf[44..48], &words[11].to_le_bytes());
        assert_eq!(&buf[48..52], &words[11].to_le_bytes());
        // And word 5 covers bytes 16..20.
        assert_eq!(&buf[16..20], &words[4].to_le_bytes());
    }

    #[test]
    fn iterator_carries_across_frames() {
        let mut one = Gen5Cipher::new(3);
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        one.apply_frame(CompressionType::Zlib, &mut a);
        one.apply_frame(CompressionType::Zlib, &mut b);

        // A cipher that saw one 32-byte frame of the same total word count
        // produces the same stream: 4 + 4 words == 8 words.
        let mut other = Gen5Cipher::new(3);
        let mut ab = [0u8; 32];
        other.start_frame(CompressionType::Zlib);
        other.apply(&mut ab[..16]);
        other.start_frame(CompressionType::Zlib);
        other.apply(&mut ab[16..]);
        assert_eq!(&ab[..16], &a);
        assert_eq!(&ab[16..], &b);
    }

    proptest! {
        #[test]
        fn xor_involution(key in any::<u8>(), payload in prop::collection::vec(any::<u8>(), 0..512)) {
            let mut sender = Gen5Cipher::new(key);
            let mut receiver = Gen5Cipher::new(key);

            let mut buf = payload.clone();
            sender.apply_frame(CompressionType::Zlib, &mut buf);
            receiver.apply_frame(CompressionType::Zlib, &mut buf);
            prop_assert_eq!(buf, payload);
        }

        #[test]
        fn involution_across_many_frames(
            key in any::<u8>(),
            frames in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..128), 1..8),
        ) {
            let mut sender = Gen5Cipher::new(key);
            let mut receiver = Gen5Cipher::new(key);

            for frame in &frames {
                let mut buf = frame.clone();
                sender.apply_frame(CompressionType::Uncompressed, &mut buf);
                receiver.apply_frame(CompressionType::Uncompressed, &mut buf);
                prop_assert_eq!(&buf, frame);
            }
        }
    }
}
