//! Error types for archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when working with ZIP-compatible archives, along with a
//! convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Handle
//! errors with pattern matching or the `?` operator:
//!
//! ```rust,no_run
//! use ziplus::{Archive, MemorySource, OpenOptions, Result};
//!
//! fn list_entries(bytes: Vec<u8>) -> Result<()> {
//!     let archive = Archive::open(MemorySource::new(bytes), OpenOptions::read_only())?;
//!     for entry in archive.index().iter() {
//!         println!("{}: {} bytes", entry.name_lossy(), entry.uncompressed_size);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Typical cause |
//! |----------|----------|---------------|
//! | I/O | [`Io`][Error::Io] | File system operations |
//! | Bounds | [`OutOfBounds`][Error::OutOfBounds] | Cursor range violation |
//! | Format | [`MalformedRecord`][Error::MalformedRecord], [`TrailerNotFound`][Error::TrailerNotFound] | Invalid archive data |
//! | Codec | [`CorruptStream`][Error::CorruptStream], [`SizeMismatch`][Error::SizeMismatch], [`UnsupportedCodec`][Error::UnsupportedCodec] | Per-entry decode failure |
//! | Integrity | [`Integrity`][Error::Integrity] | Checksum/size mismatch in strict mode |
//! | Session | [`StaleHandle`][Error::StaleHandle], [`EntryNotFound`][Error::EntryNotFound], [`ReadOnly`][Error::ReadOnly] | Lifecycle misuse |

use std::io;

use crate::verify::VerifyStatus;

/// The main error type for archive operations.
///
/// Each variant carries enough context to diagnose the failure without
/// re-reading the archive. Parser- and codec-level errors are fatal only to
/// the operation that raised them; they never invalidate an already-built
/// index, and a failed mutation leaves the previous clean trailer intact.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on the backing byte source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A positioned read or write exceeded the source's known extent.
    ///
    /// Fatal to the calling operation only; the session stays usable.
    #[error("out of bounds: offset {offset:#x} + {len} exceeds extent {extent:#x}")]
    OutOfBounds {
        /// Requested start offset.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Known extent of the backing source.
        extent: u64,
    },

    /// A record's fixed-size fields are inconsistent with the bytes available.
    ///
    /// Recoverable at the index level: trailer parsing falls back to a
    /// linear header scan when a central record is malformed.
    #[error("malformed record at offset {offset:#x}: {reason}")]
    MalformedRecord {
        /// The byte offset where the inconsistency was detected.
        offset: u64,
        /// A description of the inconsistency.
        reason: String,
    },

    /// No valid trailer signature was found within the bounded search window.
    ///
    /// Triggers the scan-fallback path during `open`; only fatal when the
    /// fallback also recovers nothing.
    #[error("no trailer signature within the final {window} bytes")]
    TrailerNotFound {
        /// Size of the trailing window that was searched.
        window: u64,
    },

    /// Compressed payload data is malformed and cannot be decoded.
    ///
    /// Fatal to that single entry's read; the index is unaffected.
    #[error("corrupt compressed stream: {reason}")]
    CorruptStream {
        /// A description of the decode failure.
        reason: String,
    },

    /// The decoded length disagrees with the declared uncompressed size.
    ///
    /// Checked at end of stream, not eagerly.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Declared uncompressed size.
        expected: u64,
        /// Actual decoded length.
        actual: u64,
    },

    /// Strict-mode integrity failure for one entry.
    ///
    /// In the default (non-strict) policy the same condition is reported as
    /// a [`VerifyStatus`] alongside the decoded bytes instead.
    #[error("integrity check failed for '{name}': {status}")]
    Integrity {
        /// Entry name (lossy UTF-8).
        name: String,
        /// What mismatched.
        status: VerifyStatus,
    },

    /// The stored codec identifier has no registered implementation.
    ///
    /// Unknown identifiers never silently pass bytes through.
    #[error("unsupported codec id {codec_id}")]
    UnsupportedCodec {
        /// The numeric codec identifier from the entry record.
        codec_id: u16,
    },

    /// An entry handle outlived a mutation of its archive.
    ///
    /// Handles snapshot the index generation at creation; any use against a
    /// newer generation fails here rather than dereferencing stale state.
    #[error("stale entry handle: generation {handle}, archive is at {current}")]
    StaleHandle {
        /// Generation the handle was created against.
        handle: u64,
        /// Current index generation.
        current: u64,
    },

    /// No entry with the given name exists in the index.
    #[error("entry not found: '{name}'")]
    EntryNotFound {
        /// The requested name (lossy UTF-8).
        name: String,
    },

    /// A mutating operation was attempted on a read-only session.
    #[error("archive was opened read-only")]
    ReadOnly,
}

/// A specialized `Result` type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps an I/O error produced inside a decoder back to the codec-level
    /// taxonomy: decode failures become [`Error::CorruptStream`], everything
    /// else stays [`Error::Io`].
    pub(crate) fn from_decode_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof => Error::CorruptStream {
                reason: e.to_string(),
            },
            _ => Error::Io(e),
        }
    }
}
