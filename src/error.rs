use thiserror::Error;

/// Errors surfaced by the persistent log.
///
/// Recoverable tail-garbage conditions (§4.4) are handled silently inside the
/// recovery scanner and never reach a caller as an `Error`; everything here is
/// either a fatal interior-corruption finding or an environmental failure.
#[derive(Debug, Error)]
pub enum Error {
    /// An OS-level I/O failure, propagated unchanged.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The SHA-1 digest stored in an entry header does not match the bytes
    /// that follow it. The entry lies at or before `write_offset`, so this is
    /// interior corruption, not crash-time tail garbage.
    #[error("entry hash mismatch at offset {offset}")]
    HashMismatch { offset: u64 },

    /// A trailer's CRC32 does not cover its own bytes correctly, and the
    /// trailer is inside the retained prefix (not tail garbage being scanned
    /// during recovery).
    #[error("trailer checksum mismatch at offset {offset}")]
    ChecksumMismatch { offset: u64 },

    /// An entry header's fixed fields could not be interpreted (e.g. an
    /// out-of-range `kind` byte).
    #[error("malformed entry header at offset {offset}: {reason}")]
    MalformedHeader { offset: u64, reason: &'static str },

    /// A read inside the retained prefix hit end-of-file before filling the
    /// expected frame.
    #[error("unexpected end of file while reading entry at offset {offset}")]
    UnexpectedEof { offset: u64 },

    /// The file header names a format version this build does not understand.
    #[error("unsupported log file version {0}")]
    UnsupportedVersion(u8),

    /// `check_and_append` was called with a first entry whose index does not
    /// equal the declared `start_index`.
    #[error("check_and_append: first entry index {got} does not match start_index {expected}")]
    InvalidStartIndex { expected: u64, got: u64 },

    /// An operation was attempted after `stop()` released the log's file
    /// handles (§4.1, §5: file handles are scoped to actor lifetime).
    #[error("operation attempted on a stopped log")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
