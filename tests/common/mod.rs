//! Shared test utilities for integration tests.
//!
//! Archive creation helpers are consolidated here to avoid duplication.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use ziplus::codec::codec_id;
use ziplus::{Archive, MemorySource, OpenOptions};

/// Creates an in-memory archive holding the given entries, all Stored,
/// flushed and closed, and returns the raw bytes.
pub fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    build_archive_with(entries, codec_id::STORE)
}

/// Creates an in-memory archive with every entry appended through `codec`.
pub fn build_archive_with(entries: &[(&str, &[u8])], codec: u16) -> Vec<u8> {
    let archive = Archive::open(MemorySource::empty(), OpenOptions::read_write())
        .expect("failed to create test archive");
    for (name, data) in entries {
        archive
            .append(name, &mut &data[..], codec)
            .expect("failed to append test entry");
    }
    archive
        .close()
        .expect("failed to close test archive")
        .into_bytes()
}

/// Reopens `bytes` read-only and asserts every entry decodes and verifies
/// back to its original payload.
pub fn verify_archive_contents(bytes: &[u8], entries: &[(&str, &[u8])]) {
    let archive = Archive::open(MemorySource::new(bytes.to_vec()), OpenOptions::read_only())
        .expect("failed to reopen test archive");
    assert_eq!(archive.len(), entries.len());
    for (name, data) in entries {
        let (read, status) = archive
            .read_verified(name)
            .unwrap_or_else(|e| panic!("failed to read '{name}': {e}"));
        assert!(status.is_ok(), "entry '{name}' failed verification: {status}");
        assert_eq!(&read, data, "payload mismatch for '{name}'");
    }
}

/// Offset of the trailer (end-of-central-directory record) within `bytes`,
/// assuming no trailing comment.
pub fn trailer_offset(bytes: &[u8]) -> usize {
    assert!(bytes.len() >= 22, "archive too short to hold a trailer");
    bytes.len() - 22
}
