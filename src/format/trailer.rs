//! Central directory records and the end-of-archive trailer.
//!
//! The trailer is the summary structure written once per archive state: the
//! entry count, the size of the central-record run, and the offset of its
//! first record. It is located by scanning backwards for its signature
//! within a fixed trailing window so that opening a huge non-archive input
//! terminates quickly.

use std::io::Cursor;

use crate::cursor::ByteSource;
use crate::timestamp::Timestamp;
use crate::{Error, Result};

use super::reader::{read_bytes, read_u16_le, read_u32_le, read_u64_le};
use super::record::{EntryRecord, ExtraField, encode_extra_block, parse_extra_block, saturate_u32};
use super::{
    CENTRAL_HEADER_FIXED_LEN, CENTRAL_HEADER_SIG, EXTRA_ID_LARGE_SIZES, TRAILER_FIXED_LEN,
    TRAILER_SEARCH_WINDOW, TRAILER_SIG, U32_SATURATED, VERSION_NEEDED,
};

/// Parsed end-of-archive trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    /// Number of entries the central directory claims to hold.
    pub entry_count: u64,
    /// Total size of the central-record run in bytes.
    pub cd_size: u64,
    /// Offset of the first central record.
    pub cd_offset: u64,
    /// Archive comment bytes.
    pub comment: Vec<u8>,
}

/// Locates and parses the trailer within the final bounded search window.
///
/// Returns the trailer and its absolute offset. The last signature whose
/// declared comment length lands exactly on the end of the source wins;
/// anything else fails with [`Error::TrailerNotFound`].
pub fn find_trailer<S: ByteSource>(source: &mut S) -> Result<(Trailer, u64)> {
    let extent = source.extent();
    let window = extent.min(TRAILER_SEARCH_WINDOW);
    if window < TRAILER_FIXED_LEN {
        return Err(Error::TrailerNotFound { window });
    }

    let window_start = extent - window;
    let mut tail = vec![0u8; window as usize];
    source.read_at(window_start, &mut tail)?;

    let sig = TRAILER_SIG.to_le_bytes();
    let last_candidate = tail.len() - TRAILER_FIXED_LEN as usize;
    for pos in (0..=last_candidate).rev() {
        if tail[pos..pos + 4] != sig {
            continue;
        }
        let comment_len =
            u16::from_le_bytes([tail[pos + 20], tail[pos + 21]]) as u64;
        let offset = window_start + pos as u64;
        if offset + TRAILER_FIXED_LEN + comment_len != extent {
            // False positive or stale trailer not at the end of the source.
            continue;
        }
        let trailer = parse_trailer(&tail[pos..], offset)?;
        return Ok((trailer, offset));
    }

    Err(Error::TrailerNotFound { window })
}

/// Parses a trailer from bytes known to start with its signature.
fn parse_trailer(bytes: &[u8], offset: u64) -> Result<Trailer> {
    let mut cursor = Cursor::new(bytes);
    let sig = read_u32_le(&mut cursor)?;
    debug_assert_eq!(sig, TRAILER_SIG);
    let _disk = read_u16_le(&mut cursor)?;
    let _cd_disk = read_u16_le(&mut cursor)?;
    let _count_disk = read_u16_le(&mut cursor)?;
    let entry_count = read_u16_le(&mut cursor)? as u64;
    let cd_size = read_u32_le(&mut cursor)? as u64;
    let cd_offset = read_u32_le(&mut cursor)? as u64;
    let comment_len = read_u16_le(&mut cursor)? as usize;
    let comment = read_bytes(&mut cursor, comment_len).map_err(|_| Error::MalformedRecord {
        offset,
        reason: "trailer comment extends past end of source".into(),
    })?;

    Ok(Trailer {
        entry_count,
        cd_size,
        cd_offset,
        comment,
    })
}

/// Encodes the trailer.
///
/// The 32-bit trailer fields bound this implementation: archives whose
/// central directory starts beyond 4 GiB, or which hold more than 65535
/// entries, fail here rather than writing a wrong offset.
pub fn encode_trailer(trailer: &Trailer) -> Result<Vec<u8>> {
    if trailer.entry_count > u16::MAX as u64 {
        return Err(Error::MalformedRecord {
            offset: trailer.cd_offset,
            reason: format!("entry count {} exceeds trailer capacity", trailer.entry_count),
        });
    }
    if trailer.cd_size > u32::MAX as u64 || trailer.cd_offset >= U32_SATURATED as u64 {
        return Err(Error::MalformedRecord {
            offset: trailer.cd_offset,
            reason: "central directory beyond 32-bit trailer range".into(),
        });
    }

    let mut out = Vec::with_capacity(TRAILER_FIXED_LEN as usize + trailer.comment.len());
    out.extend_from_slice(&TRAILER_SIG.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number
    out.extend_from_slice(&0u16.to_le_bytes()); // central directory disk
    out.extend_from_slice(&(trailer.entry_count as u16).to_le_bytes());
    out.extend_from_slice(&(trailer.entry_count as u16).to_le_bytes());
    out.extend_from_slice(&(trailer.cd_size as u32).to_le_bytes());
    out.extend_from_slice(&(trailer.cd_offset as u32).to_le_bytes());
    out.extend_from_slice(&(trailer.comment.len() as u16).to_le_bytes());
    out.extend_from_slice(&trailer.comment);
    Ok(out)
}

/// Encodes one central directory record.
pub fn encode_central_record(record: &EntryRecord) -> Result<Vec<u8>> {
    let mut extension = Vec::new();
    if record.uncompressed_size >= U32_SATURATED as u64 {
        extension.extend_from_slice(&record.uncompressed_size.to_le_bytes());
    }
    if record.compressed_size >= U32_SATURATED as u64 {
        extension.extend_from_slice(&record.compressed_size.to_le_bytes());
    }
    if record.local_offset >= U32_SATURATED as u64 {
        extension.extend_from_slice(&record.local_offset.to_le_bytes());
    }

    let mut extra_fields = Vec::with_capacity(record.extra.len() + 1);
    if !extension.is_empty() {
        extra_fields.push(ExtraField {
            id: EXTRA_ID_LARGE_SIZES,
            data: extension,
        });
    }
    extra_fields.extend(record.extra.iter().cloned());
    let extra = encode_extra_block(&extra_fields);

    if record.name.len() > u16::MAX as usize
        || extra.len() > u16::MAX as usize
        || record.comment.len() > u16::MAX as usize
    {
        return Err(Error::MalformedRecord {
            offset: record.local_offset,
            reason: "name, extra, or comment exceeds 16-bit length field".into(),
        });
    }

    let mut out = Vec::with_capacity(
        CENTRAL_HEADER_FIXED_LEN as usize + record.name.len() + extra.len() + record.comment.len(),
    );
    out.extend_from_slice(&CENTRAL_HEADER_SIG.to_le_bytes());
    out.extend_from_slice(&VERSION_NEEDED.to_le_bytes()); // version made by
    out.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&record.codec.to_le_bytes());
    out.extend_from_slice(&record.timestamp.dos_time.to_le_bytes());
    out.extend_from_slice(&record.timestamp.dos_date.to_le_bytes());
    out.extend_from_slice(&record.crc32.to_le_bytes());
    out.extend_from_slice(&saturate_u32(record.compressed_size).to_le_bytes());
    out.extend_from_slice(&saturate_u32(record.uncompressed_size).to_le_bytes());
    out.extend_from_slice(&(record.name.len() as u16).to_le_bytes());
    out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
    out.extend_from_slice(&(record.comment.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number start
    out.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
    out.extend_from_slice(&0u32.to_le_bytes()); // external attributes
    out.extend_from_slice(&saturate_u32(record.local_offset).to_le_bytes());
    out.extend_from_slice(&record.name);
    out.extend_from_slice(&extra);
    out.extend_from_slice(&record.comment);
    Ok(out)
}

/// Decodes one central record from an in-memory central directory run.
///
/// `base_offset` is the absolute offset of `cursor`'s start, used for error
/// reporting. The record's `payload_offset` is left at zero; the index build
/// fills it in from the referenced local header.
pub fn parse_central_record(cursor: &mut Cursor<&[u8]>, base_offset: u64) -> Result<EntryRecord> {
    let record_offset = base_offset + cursor.position();
    let malformed = |reason: String| Error::MalformedRecord {
        offset: record_offset,
        reason,
    };

    let remaining = cursor.get_ref().len() as u64 - cursor.position();
    if remaining < CENTRAL_HEADER_FIXED_LEN {
        return Err(malformed(format!(
            "central record needs {CENTRAL_HEADER_FIXED_LEN} bytes, {remaining} remain"
        )));
    }

    let sig = read_u32_le(cursor)?;
    if sig != CENTRAL_HEADER_SIG {
        return Err(malformed(format!("bad central record signature {sig:#010x}")));
    }
    let _version_made = read_u16_le(cursor)?;
    let _version_needed = read_u16_le(cursor)?;
    let _flags = read_u16_le(cursor)?;
    let codec = read_u16_le(cursor)?;
    let dos_time = read_u16_le(cursor)?;
    let dos_date = read_u16_le(cursor)?;
    let crc32 = read_u32_le(cursor)?;
    let raw_compressed = read_u32_le(cursor)?;
    let raw_uncompressed = read_u32_le(cursor)?;
    let name_len = read_u16_le(cursor)? as u64;
    let extra_len = read_u16_le(cursor)? as u64;
    let comment_len = read_u16_le(cursor)? as u64;
    let _disk_start = read_u16_le(cursor)?;
    let _internal_attrs = read_u16_le(cursor)?;
    let _external_attrs = read_u32_le(cursor)?;
    let raw_offset = read_u32_le(cursor)?;

    let remaining = cursor.get_ref().len() as u64 - cursor.position();
    if remaining < name_len + extra_len + comment_len {
        return Err(malformed(format!(
            "central record declares {} variable bytes, {remaining} remain",
            name_len + extra_len + comment_len
        )));
    }

    let name = read_bytes(cursor, name_len as usize)?;
    let extra_bytes = read_bytes(cursor, extra_len as usize)?;
    let comment = read_bytes(cursor, comment_len as usize)?;

    let fields = parse_extra_block(&extra_bytes, record_offset + CENTRAL_HEADER_FIXED_LEN + name_len)?;
    let (uncompressed_size, compressed_size, local_offset, extra) = fold_central_extension(
        fields,
        raw_uncompressed,
        raw_compressed,
        raw_offset,
        record_offset,
    )?;

    Ok(EntryRecord {
        name,
        uncompressed_size,
        compressed_size,
        crc32,
        codec,
        timestamp: Timestamp::from_dos(dos_date, dos_time),
        extra,
        comment,
        local_offset,
        payload_offset: 0,
        finalized: true,
    })
}

/// Applies the 64-bit extension to saturated central-record fields.
///
/// The extension carries u64 values only for saturated fields, in the fixed
/// order: uncompressed size, compressed size, local offset.
fn fold_central_extension(
    fields: Vec<ExtraField>,
    raw_uncompressed: u32,
    raw_compressed: u32,
    raw_offset: u32,
    record_offset: u64,
) -> Result<(u64, u64, u64, Vec<ExtraField>)> {
    let mut uncompressed = raw_uncompressed as u64;
    let mut compressed = raw_compressed as u64;
    let mut local_offset = raw_offset as u64;
    let mut preserved = Vec::with_capacity(fields.len());

    let needed: usize = [raw_uncompressed, raw_compressed, raw_offset]
        .iter()
        .filter(|&&v| v == U32_SATURATED)
        .count();

    let mut extension_seen = false;
    for field in fields {
        if field.id != EXTRA_ID_LARGE_SIZES {
            preserved.push(field);
            continue;
        }
        extension_seen = true;
        if field.data.len() < needed * 8 {
            return Err(Error::MalformedRecord {
                offset: record_offset,
                reason: format!(
                    "size extension holds {} bytes, need {}",
                    field.data.len(),
                    needed * 8
                ),
            });
        }
        let mut cursor = Cursor::new(field.data.as_slice());
        if raw_uncompressed == U32_SATURATED {
            uncompressed = read_u64_le(&mut cursor)?;
        }
        if raw_compressed == U32_SATURATED {
            compressed = read_u64_le(&mut cursor)?;
        }
        if raw_offset == U32_SATURATED {
            local_offset = read_u64_le(&mut cursor)?;
        }
    }

    if needed > 0 && !extension_seen {
        return Err(Error::MalformedRecord {
            offset: record_offset,
            reason: "saturated field without a 64-bit extension".into(),
        });
    }

    Ok((uncompressed, compressed, local_offset, preserved))
}
