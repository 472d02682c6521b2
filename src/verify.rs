//! Integrity verification for entry payloads.
//!
//! [`StreamVerifier`] recomputes the CRC-32 and byte count of a payload as
//! it streams, both while appending (to finalize the record's checksum and
//! size fields) and while reading back (to flag corruption). Verification
//! is non-fatal by default: a caller reading a mismatched entry still
//! receives the decoded bytes plus the mismatch flag. Strict mode converts
//! a mismatch into [`Error::Integrity`](crate::Error::Integrity).

use crate::checksum::{Checksum, Crc32};

/// Outcome of verifying one entry payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    /// Checksum and size both match the record.
    Ok,
    /// Recomputed CRC-32 disagrees with the stored checksum.
    ChecksumMismatch {
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum recomputed from the payload.
        actual: u32,
    },
    /// Decoded byte count disagrees with the stored uncompressed size.
    SizeMismatch {
        /// Size stored in the record.
        expected: u64,
        /// Decoded byte count.
        actual: u64,
    },
}

impl VerifyStatus {
    /// Returns whether the payload verified clean.
    pub fn is_ok(&self) -> bool {
        matches!(self, VerifyStatus::Ok)
    }
}

impl std::fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyStatus::Ok => write!(f, "ok"),
            VerifyStatus::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected:#010x}, got {actual:#010x}")
            }
            VerifyStatus::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected} bytes, got {actual}")
            }
        }
    }
}

/// Streaming CRC-32 and size accumulator.
#[derive(Debug, Clone, Default)]
pub struct StreamVerifier {
    crc: Crc32,
    bytes: u64,
}

impl StreamVerifier {
    /// Creates a fresh verifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of uncompressed payload.
    pub fn update(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.bytes += data.len() as u64;
    }

    /// Returns the byte count accumulated so far.
    pub fn bytes_seen(&self) -> u64 {
        self.bytes
    }

    /// Returns the CRC-32 accumulated so far.
    pub fn crc32(&self) -> u32 {
        self.crc.finalize()
    }

    /// Compares the accumulated state against the record's stored fields.
    ///
    /// Size is checked before checksum: a short or long stream makes the
    /// checksum comparison meaningless.
    pub fn finish(&self, expected_crc: u32, expected_size: u64) -> VerifyStatus {
        if self.bytes != expected_size {
            return VerifyStatus::SizeMismatch {
                expected: expected_size,
                actual: self.bytes,
            };
        }
        let actual = self.crc.finalize();
        if actual != expected_crc {
            return VerifyStatus::ChecksumMismatch {
                expected: expected_crc,
                actual,
            };
        }
        VerifyStatus::Ok
    }
}
