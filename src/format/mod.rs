//! On-disk layout of the ZIP-compatible container.
//!
//! The container is the established ZIP layout: per-entry local headers
//! immediately preceding their payloads, a central-directory-style run of
//! entry records near the end, and a fixed trailer locating that run. The
//! trailer is found via a bounded reverse signature scan, never an unbounded
//! one.

pub mod reader;
pub mod record;
pub mod trailer;

/// Signature of a local file header (`PK\x03\x04`).
pub const LOCAL_HEADER_SIG: u32 = 0x0403_4B50;

/// Signature of a central directory record (`PK\x01\x02`).
pub const CENTRAL_HEADER_SIG: u32 = 0x0201_4B50;

/// Signature of the end-of-archive trailer (`PK\x05\x06`).
pub const TRAILER_SIG: u32 = 0x0605_4B50;

/// Fixed portion of a local header, before name and extra bytes.
pub const LOCAL_HEADER_FIXED_LEN: u64 = 30;

/// Fixed portion of a central directory record.
pub const CENTRAL_HEADER_FIXED_LEN: u64 = 46;

/// Fixed portion of the trailer, before the comment bytes.
pub const TRAILER_FIXED_LEN: u64 = 22;

/// The trailer signature must appear within this many trailing bytes.
///
/// Bounding the search guarantees `open` terminates on huge inputs even
/// when no trailer exists.
pub const TRAILER_SEARCH_WINDOW: u64 = 64 * 1024;

/// Extra-field id of the 64-bit size extension block.
pub const EXTRA_ID_LARGE_SIZES: u16 = 0x0001;

/// Marker stored in a 32-bit size/offset field when the real value lives in
/// the 64-bit extension block.
pub const U32_SATURATED: u32 = 0xFFFF_FFFF;

/// Version-needed field written into encoded headers.
pub const VERSION_NEEDED: u16 = 45;
