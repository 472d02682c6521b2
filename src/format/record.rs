//! Entry records and the local-header codec.
//!
//! An [`EntryRecord`] is the in-memory form of one archive entry: its
//! byte-exact name, declared sizes, checksum, codec id, timestamp, and the
//! opaque extra-metadata block. The same record type is produced by the
//! local-header parser, the central-directory parser, and `append`.
//!
//! Decoding and encoding are exact inverses. Extra fields with ids this
//! crate does not interpret are preserved byte-for-byte on round-trip;
//! downstream tools may depend on them. The one interpreted id is
//! [`EXTRA_ID_LARGE_SIZES`], the 64-bit size extension block, which is
//! folded into the record on decode and synthesized on encode.

use std::io::Cursor;

use crate::cursor::ByteSource;
use crate::timestamp::Timestamp;
use crate::{Error, Result};

use super::reader::{read_bytes, read_u16_le, read_u32_le, read_u64_le};
use super::{EXTRA_ID_LARGE_SIZES, LOCAL_HEADER_FIXED_LEN, LOCAL_HEADER_SIG, U32_SATURATED, VERSION_NEEDED};

/// One field of the extra-metadata block: an id/length/value triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraField {
    /// Field identifier.
    pub id: u16,
    /// Raw field payload.
    pub data: Vec<u8>,
}

/// In-memory record for one archive entry.
///
/// `compressed_size` and `crc32` are authoritative only once `finalized` is
/// set, which happens when the payload has been fully written or fully
/// verified. Until then they hold placeholder zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Entry name, byte-exact and never normalized.
    pub name: Vec<u8>,
    /// Uncompressed payload size.
    pub uncompressed_size: u64,
    /// Compressed payload size as stored.
    pub compressed_size: u64,
    /// CRC-32 of the uncompressed payload.
    pub crc32: u32,
    /// Numeric codec identifier (ZIP method-id space).
    pub codec: u16,
    /// Modification timestamp.
    pub timestamp: Timestamp,
    /// Extra-metadata fields, uninterpreted ids preserved verbatim.
    pub extra: Vec<ExtraField>,
    /// Per-entry comment (central record only; empty for local headers).
    pub comment: Vec<u8>,
    /// Offset of this entry's local header within the backing source.
    pub local_offset: u64,
    /// Offset of the first payload byte.
    pub payload_offset: u64,
    /// Whether sizes and checksum are authoritative.
    pub finalized: bool,
}

impl EntryRecord {
    /// Creates a pending record for an entry about to be appended.
    pub fn pending(name: Vec<u8>, codec: u16, timestamp: Timestamp, local_offset: u64) -> Self {
        Self {
            name,
            uncompressed_size: 0,
            compressed_size: 0,
            crc32: 0,
            codec,
            timestamp,
            extra: Vec::new(),
            comment: Vec::new(),
            local_offset,
            payload_offset: 0,
            finalized: false,
        }
    }

    /// Returns the entry name decoded as UTF-8, lossily.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Offset one past the last payload byte.
    pub fn payload_end(&self) -> u64 {
        self.payload_offset + self.compressed_size
    }
}

/// Parses an extra-metadata block into its id/length/value triples.
pub fn parse_extra_block(bytes: &[u8], block_offset: u64) -> Result<Vec<ExtraField>> {
    let mut fields = Vec::new();
    let mut cursor = Cursor::new(bytes);
    while (cursor.position() as usize) < bytes.len() {
        let remaining = bytes.len() - cursor.position() as usize;
        if remaining < 4 {
            return Err(Error::MalformedRecord {
                offset: block_offset + cursor.position(),
                reason: format!("dangling {remaining} bytes in extra block"),
            });
        }
        let id = read_u16_le(&mut cursor)?;
        let len = read_u16_le(&mut cursor)? as usize;
        if bytes.len() - (cursor.position() as usize) < len {
            return Err(Error::MalformedRecord {
                offset: block_offset + cursor.position(),
                reason: format!("extra field {id:#06x} declares {len} bytes beyond block end"),
            });
        }
        let data = read_bytes(&mut cursor, len)?;
        fields.push(ExtraField { id, data });
    }
    Ok(fields)
}

/// Encodes extra fields back to their wire form.
pub fn encode_extra_block(fields: &[ExtraField]) -> Vec<u8> {
    let mut out = Vec::new();
    for field in fields {
        out.extend_from_slice(&field.id.to_le_bytes());
        out.extend_from_slice(&(field.data.len() as u16).to_le_bytes());
        out.extend_from_slice(&field.data);
    }
    out
}

/// Splits off the 64-bit size extension from a parsed extra block and
/// applies it to saturated 32-bit size fields.
///
/// Returns the remaining (preserved) fields. The extension is consumed here
/// and regenerated on encode, so it never duplicates on round-trip.
fn fold_large_sizes(
    fields: Vec<ExtraField>,
    raw_uncompressed: u32,
    raw_compressed: u32,
    header_offset: u64,
) -> Result<(u64, u64, Vec<ExtraField>)> {
    let mut uncompressed = raw_uncompressed as u64;
    let mut compressed = raw_compressed as u64;
    let mut preserved = Vec::with_capacity(fields.len());

    let mut extension_seen = false;
    for field in fields {
        if field.id != EXTRA_ID_LARGE_SIZES {
            preserved.push(field);
            continue;
        }
        extension_seen = true;
        if field.data.len() < 16 {
            return Err(Error::MalformedRecord {
                offset: header_offset,
                reason: format!(
                    "size extension holds {} bytes, need 16",
                    field.data.len()
                ),
            });
        }
        let mut cursor = Cursor::new(field.data.as_slice());
        let ext_uncompressed = read_u64_le(&mut cursor)?;
        let ext_compressed = read_u64_le(&mut cursor)?;
        if raw_uncompressed == U32_SATURATED {
            uncompressed = ext_uncompressed;
        }
        if raw_compressed == U32_SATURATED {
            compressed = ext_compressed;
        }
    }

    if (raw_uncompressed == U32_SATURATED || raw_compressed == U32_SATURATED) && !extension_seen {
        return Err(Error::MalformedRecord {
            offset: header_offset,
            reason: "saturated size field without a 64-bit extension".into(),
        });
    }

    Ok((uncompressed, compressed, preserved))
}

/// Saturates a 64-bit value into a 32-bit wire field.
pub(crate) fn saturate_u32(value: u64) -> u32 {
    if value >= U32_SATURATED as u64 {
        U32_SATURATED
    } else {
        value as u32
    }
}

/// Decodes the local header at `offset` into an [`EntryRecord`].
///
/// The record's `payload_offset` points at the first payload byte. Fails
/// with [`Error::MalformedRecord`] when the header is truncated, carries a
/// wrong signature, or declares lengths inconsistent with the bytes
/// available in the source.
pub fn parse_local_header<S: ByteSource>(source: &mut S, offset: u64) -> Result<EntryRecord> {
    let mut fixed = [0u8; LOCAL_HEADER_FIXED_LEN as usize];
    source.read_at(offset, &mut fixed).map_err(|e| truncated(e, offset, "local header"))?;

    let mut cursor = Cursor::new(fixed.as_slice());
    let sig = read_u32_le(&mut cursor)?;
    if sig != LOCAL_HEADER_SIG {
        return Err(Error::MalformedRecord {
            offset,
            reason: format!("bad local header signature {sig:#010x}"),
        });
    }
    let _version = read_u16_le(&mut cursor)?;
    let _flags = read_u16_le(&mut cursor)?;
    let codec = read_u16_le(&mut cursor)?;
    let dos_time = read_u16_le(&mut cursor)?;
    let dos_date = read_u16_le(&mut cursor)?;
    let crc32 = read_u32_le(&mut cursor)?;
    let raw_compressed = read_u32_le(&mut cursor)?;
    let raw_uncompressed = read_u32_le(&mut cursor)?;
    let name_len = read_u16_le(&mut cursor)? as u64;
    let extra_len = read_u16_le(&mut cursor)? as u64;

    let mut variable = vec![0u8; (name_len + extra_len) as usize];
    source
        .read_at(offset + LOCAL_HEADER_FIXED_LEN, &mut variable)
        .map_err(|e| truncated(e, offset, "local header name/extra"))?;
    let name = variable[..name_len as usize].to_vec();
    let extra_offset = offset + LOCAL_HEADER_FIXED_LEN + name_len;
    let fields = parse_extra_block(&variable[name_len as usize..], extra_offset)?;

    let (uncompressed_size, compressed_size, extra) =
        fold_large_sizes(fields, raw_uncompressed, raw_compressed, offset)?;

    let payload_offset = offset + LOCAL_HEADER_FIXED_LEN + name_len + extra_len;
    if payload_offset.checked_add(compressed_size).is_none() {
        return Err(Error::MalformedRecord {
            offset,
            reason: format!(
                "compressed size {compressed_size} overflows the addressable range"
            ),
        });
    }

    Ok(EntryRecord {
        name,
        uncompressed_size,
        compressed_size,
        crc32,
        codec,
        timestamp: Timestamp::from_dos(dos_date, dos_time),
        extra,
        comment: Vec::new(),
        local_offset: offset,
        payload_offset,
        finalized: true,
    })
}

/// Encodes a record as a local header.
///
/// The 64-bit size extension is always reserved, even for small entries, so
/// that the placeholder written before streaming and the finalized header
/// written after it have identical length and the seek-back patch never
/// needs to grow the header. With `placeholder` set, size and checksum
/// fields are written as zeros. Fails with [`Error::MalformedRecord`] when
/// the name or the extra block exceeds its 16-bit length field.
pub fn encode_local_header(record: &EntryRecord, placeholder: bool) -> Result<Vec<u8>> {
    let (crc, compressed, uncompressed) = if placeholder {
        (0, 0, 0)
    } else {
        (record.crc32, record.compressed_size, record.uncompressed_size)
    };

    let mut extension = Vec::with_capacity(16);
    extension.extend_from_slice(&uncompressed.to_le_bytes());
    extension.extend_from_slice(&compressed.to_le_bytes());
    let mut extra_fields = vec![ExtraField {
        id: EXTRA_ID_LARGE_SIZES,
        data: extension,
    }];
    extra_fields.extend(record.extra.iter().cloned());
    let extra = encode_extra_block(&extra_fields);

    if record.name.len() > u16::MAX as usize || extra.len() > u16::MAX as usize {
        return Err(Error::MalformedRecord {
            offset: record.local_offset,
            reason: "name or extra block exceeds 16-bit length field".into(),
        });
    }

    let mut out = Vec::with_capacity(LOCAL_HEADER_FIXED_LEN as usize + record.name.len() + extra.len());
    out.extend_from_slice(&LOCAL_HEADER_SIG.to_le_bytes());
    out.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&record.codec.to_le_bytes());
    out.extend_from_slice(&record.timestamp.dos_time.to_le_bytes());
    out.extend_from_slice(&record.timestamp.dos_date.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&saturate_u32(compressed).to_le_bytes());
    out.extend_from_slice(&saturate_u32(uncompressed).to_le_bytes());
    out.extend_from_slice(&(record.name.len() as u16).to_le_bytes());
    out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
    out.extend_from_slice(&record.name);
    out.extend_from_slice(&extra);
    Ok(out)
}

fn truncated(e: Error, offset: u64, what: &str) -> Error {
    match e {
        Error::OutOfBounds { .. } => Error::MalformedRecord {
            offset,
            reason: format!("truncated {what}"),
        },
        other => other,
    }
}
