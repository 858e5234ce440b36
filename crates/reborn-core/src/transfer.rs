//! Large-file transfer reassembly.
//!
//! A large transfer is bracketed by `largefilestart` / `largefileend` and
//! streamed as `file` packets (often inside raw-data carves). Transfers are
//! keyed by file name; a duplicate start for an in-progress name resets its
//! progress. Small files arrive as a single `file` packet with no bracket and
//! complete immediately.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

/// In-progress transfer state.
#[derive(Debug, Default)]
struct Transfer {
    expected: Option<u64>,
    data: BytesMut,
}

/// All pending transfers of a session.
#[derive(Debug, Default)]
pub struct FileTransfers {
    pending: HashMap<String, Transfer>,
}

/// What became of a completed file chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The chunk was appended to a pending transfer.
    Buffered,
    /// No transfer was pending; the chunk is a complete small file.
    Complete(Bytes),
}

impl FileTransfers {
    /// No pending transfers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a transfer is pending for a name.
    #[must_use]
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    /// Number of pending transfers.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Begin (or restart) a transfer.
    pub fn start(&mut self, name: &str) {
        self.pending.insert(name.to_string(), Transfer::default());
    }

    /// Record the announced total size for a pending transfer.
    pub fn set_size(&mut self, name: &str, size: u64) {
        if let Some(transfer) = self.pending.get_mut(name) {
            transfer.expected = Some(size);
            transfer.data.reserve(size.min(64 * 1024 * 1024) as usize);
        }
    }

    /// Feed a `file` packet's content.
    ///
    /// Buffered into the pending transfer when one exists for the name;
    /// otherwise the data is a complete single-shot file.
    pub fn chunk(&mut self, name: &str, data: &[u8]) -> ChunkOutcome {
        match self.pending.get_mut(name) {
            Some(transfer) => {
                transfer.data.extend_from_slice(data);
                ChunkOutcome::Buffered
            },
            None => ChunkOutcome::Complete(Bytes::copy_from_slice(data)),
        }
    }

    /// Finish a transfer, returning the assembled bytes and whether the
    /// announced size (if any) matched.
    pub fn finish(&mut self, name: &str) -> Option<(Bytes, bool)> {
        let transfer = self.pending.remove(name)?;
        let complete =
            transfer.expected.is_none_or(|expected| expected == transfer.data.len() as u64);
        Some((transfer.data.freeze(), complete))
    }

    /// Abort a transfer (peer failure), dropping any buffered data.
    pub fn abort(&mut self, name: &str) -> bool {
        self.pending.remove(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_file_completes_without_bracket() {
        let mut transfers = FileTransfers::new();
        let outcome = transfers.chunk("tiny.png", b"bytes");
        assert_eq!(outcome, ChunkOutcome::Complete(Bytes::from_static(b"bytes")));
        assert_eq!(transfers.pending_count(), 0);
    }

    #[test]
    fn bracketed_transfer_reassembles() {
        let mut transfers = FileTransfers::new();
        transfers.start("big.nw");
        transfers.set_size("big.nw", 8);

        assert_eq!(transfers.chunk("big.nw", b"GLEV"), ChunkOutcome::Buffered);
        assert_eq!(transfers.chunk("big.nw", b"NW01"), ChunkOutcome::Buffered);

        let (data, complete) = transfers.finish("big.nw").unwrap();
        assert_eq!(data.as_ref(), b"GLEVNW01");
        assert!(complete);
        assert!(!transfers.is_pending("big.nw"));
    }

    #[test]
    fn size_mismatch_is_reported() {
        let mut transfers = FileTransfers::new();
        transfers.start("big.nw");
        transfers.set_size("big.nw", 100);
        transfers.chunk("big.nw", b"short");

        let (_, complete) = transfers.finish("big.nw").unwrap();
        assert!(!complete);
    }

    #[test]
    fn duplicate_start_resets_progress() {
        let mut transfers = FileTransfers::new();
        transfers.start("a.nw");
        transfers.chunk("a.nw", b"stale");
        transfers.start("a.nw");
        transfers.chunk("a.nw", b"fresh");

        let (data, _) = transfers.finish("a.nw").unwrap();
        assert_eq!(data.as_ref(), b"fresh");
    }

    #[test]
    fn abort_discards_state() {
        let mut transfers = FileTransfers::new();
        transfers.start("a.nw");
        transfers.chunk("a.nw", b"partial");
        assert!(transfers.abort("a.nw"));
        assert!(!transfers.abort("a.nw"));
        assert!(transfers.finish("a.nw").is_none());
    }
}
