//! # ziplus
//!
//! A pure-Rust engine for an extended ZIP-family archive container.
//!
//! This crate provides random-access reading, streaming appends, logical
//! deletes, and integrity verification over a single-file archive. Payloads
//! are compressed per entry through a pluggable codec layer and checksummed
//! with CRC-32; sizes beyond 32 bits are carried in an extra-field extension
//! so large entries round-trip exactly.
//!
//! ## Quick Start
//!
//! ### Reading an Archive
//!
//! ```rust,no_run
//! use ziplus::{Archive, FileSource, OpenOptions, Result};
//!
//! fn main() -> Result<()> {
//!     let source = FileSource::open_path("bundle.zip")?;
//!     let archive = Archive::open(source, OpenOptions::read_only())?;
//!
//!     for entry in archive.index().iter() {
//!         println!("{}: {} bytes", entry.name_lossy(), entry.uncompressed_size);
//!     }
//!
//!     let (bytes, status) = archive.read_verified("notes.txt")?;
//!     assert!(status.is_ok());
//!     println!("read {} bytes", bytes.len());
//!     Ok(())
//! }
//! ```
//!
//! ### Creating an Archive
//!
//! ```rust
//! use ziplus::{Archive, MemorySource, OpenOptions, Result, codec};
//!
//! fn main() -> Result<()> {
//!     let archive = Archive::open(MemorySource::empty(), OpenOptions::read_write())?;
//!     archive.append("hello.txt", &mut &b"Hello, World!"[..], codec::codec_id::STORE)?;
//!     let source = archive.close()?;
//!     assert!(!source.as_bytes().is_empty());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate compression |
//! | `zstd` | No | Zstandard compression |
//!
//! The Store codec (no compression) is always available.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. Integrity checking is non-fatal by
//! default: reads report a [`VerifyStatus`] alongside the bytes, and
//! [`OpenOptions::strict`] upgrades mismatches to [`Error::Integrity`].
//!
//! ## Durability
//!
//! Mutations are staged in memory and committed by [`Archive::flush`],
//! which writes the new trailer body before its signature so a crash
//! mid-commit leaves the archive recoverable by the linear-scan fallback
//! built into [`Archive::open`].
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

/// Default buffer size for read operations (8 KiB).
pub(crate) const READ_BUFFER_SIZE: usize = 8192;

pub mod checksum;
pub mod codec;
pub mod cursor;
pub mod error;
pub mod format;
pub mod index;
pub mod session;
pub mod timestamp;
pub mod verify;

pub use error::{Error, Result};
pub use timestamp::Timestamp;

// Re-export the session API at crate root for convenience
pub use session::{Archive, EntryHandle, EntryStream, OpenMode, OpenOptions};

// Re-export the byte-source abstraction
pub use cursor::{ByteSource, FileSource, MemorySource};

// Re-export record and index types surfaced by the session API
pub use format::record::{EntryRecord, ExtraField};
pub use format::trailer::Trailer;
pub use index::{Index, RecoveryReport};

// Re-export verification types
pub use verify::{StreamVerifier, VerifyStatus};

// Re-export the codec dispatch surface
pub use codec::{CodecRegistry, Decoder, Encoder};
