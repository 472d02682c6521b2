//! In-memory catalog of archive entries.
//!
//! The [`Index`] is built by reading the trailer (the O(entries) fast path)
//! or, when the trailer is missing or rejected, by walking local headers
//! from the start of the source ([`Index::build_by_scan`], the degraded-mode
//! repair path). Iteration preserves insertion order; lookup by name is
//! last-write-wins while every duplicate instance stays iterable, matching
//! legacy ZIP tooling behavior.

use std::collections::HashMap;
use std::io::Cursor;

use crate::cursor::ByteSource;
use crate::format::record::{EntryRecord, parse_local_header};
use crate::format::trailer::{Trailer, find_trailer, parse_central_record};
use crate::format::LOCAL_HEADER_SIG;
use crate::{Error, Result};

/// Outcome of a degraded-mode index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Entries recovered by the linear header scan.
    pub recovered: u64,
    /// Entry count the rejected trailer claimed, when one was readable.
    pub expected: Option<u64>,
}

impl RecoveryReport {
    /// Entries the trailer claimed but the scan could not recover.
    pub fn missing(&self) -> Option<u64> {
        self.expected.map(|e| e.saturating_sub(self.recovered))
    }
}

/// Ordered catalog of [`EntryRecord`]s keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: Vec<EntryRecord>,
    by_name: HashMap<Vec<u8>, usize>,
    generation: u64,
    expected_count: Option<u64>,
}

impl Index {
    /// Creates an empty index.
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_entries(entries: Vec<EntryRecord>, expected_count: Option<u64>) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            by_name.insert(entry.name.clone(), i);
        }
        Self {
            entries,
            by_name,
            generation: 0,
            expected_count,
        }
    }

    /// Builds the index from the trailer and central records.
    ///
    /// Each referenced local header is touched once to validate its
    /// signature and locate the payload start; offsets pointing outside the
    /// central directory's bounds fail with
    /// [`Error::MalformedRecord`].
    pub fn build_from_trailer<S: ByteSource>(source: &mut S) -> Result<(Self, Trailer)> {
        let (trailer, trailer_offset) = find_trailer(source)?;

        trailer
            .cd_offset
            .checked_add(trailer.cd_size)
            .filter(|&end| end <= trailer_offset)
            .ok_or(Error::MalformedRecord {
                offset: trailer_offset,
                reason: format!(
                    "central directory {}..{} overlaps trailer at {}",
                    trailer.cd_offset,
                    trailer.cd_offset.saturating_add(trailer.cd_size),
                    trailer_offset
                ),
            })?;

        let mut cd_bytes = vec![0u8; trailer.cd_size as usize];
        source.read_at(trailer.cd_offset, &mut cd_bytes)?;
        let mut cursor = Cursor::new(cd_bytes.as_slice());

        let mut entries = Vec::with_capacity(trailer.entry_count as usize);
        for _ in 0..trailer.entry_count {
            let mut record = parse_central_record(&mut cursor, trailer.cd_offset)?;

            if record.local_offset >= trailer.cd_offset {
                return Err(Error::MalformedRecord {
                    offset: trailer.cd_offset + cursor.position(),
                    reason: format!(
                        "local header offset {:#x} inside central directory",
                        record.local_offset
                    ),
                });
            }

            // One bounded read per entry: validates the local signature and
            // locates the payload start behind the variable-length fields.
            let local = parse_local_header(source, record.local_offset)?;
            record.payload_offset = local.payload_offset;

            // Checked: a 64-bit size extension can claim a payload that
            // wraps the address space.
            record
                .payload_offset
                .checked_add(record.compressed_size)
                .filter(|&end| end <= trailer.cd_offset)
                .ok_or(Error::MalformedRecord {
                    offset: record.local_offset,
                    reason: "payload extends into the central directory".into(),
                })?;

            entries.push(record);
        }

        if cursor.position() as usize != cd_bytes.len() {
            return Err(Error::MalformedRecord {
                offset: trailer.cd_offset + cursor.position(),
                reason: "trailing bytes after last central record".into(),
            });
        }

        let expected = Some(trailer.entry_count);
        Ok((Self::from_entries(entries, expected), trailer))
    }

    /// Builds the index by walking local headers from the start of the
    /// source, recovering every valid entry before the first corruption
    /// point.
    ///
    /// `expected_count` is the entry count a rejected trailer claimed, if
    /// one was readable; it flows into the returned [`RecoveryReport`] so
    /// callers can surface the discrepancy.
    pub fn build_by_scan<S: ByteSource>(
        source: &mut S,
        expected_count: Option<u64>,
    ) -> Result<(Self, RecoveryReport)> {
        let extent = source.extent();
        let mut entries = Vec::new();
        let mut offset = 0u64;

        loop {
            if offset + 4 > extent {
                break;
            }
            let mut sig = [0u8; 4];
            source.read_at(offset, &mut sig)?;
            if u32::from_le_bytes(sig) != LOCAL_HEADER_SIG {
                break;
            }
            let record = match parse_local_header(source, offset) {
                Ok(record) => record,
                Err(Error::MalformedRecord { .. }) => break,
                Err(e) => return Err(e),
            };
            if record.payload_end() > extent {
                // Header claims payload bytes the source does not have.
                break;
            }
            offset = record.payload_end();
            entries.push(record);
        }

        let report = RecoveryReport {
            recovered: entries.len() as u64,
            expected: expected_count,
        };
        Ok((Self::from_entries(entries, expected_count), report))
    }

    /// Returns the last-inserted entry with the given name.
    pub fn lookup(&self, name: impl AsRef<[u8]>) -> Option<&EntryRecord> {
        self.by_name
            .get(name.as_ref())
            .map(|&i| &self.entries[i])
    }

    /// Returns the position of the last-inserted entry with the given name.
    pub fn position_of(&self, name: impl AsRef<[u8]>) -> Option<usize> {
        self.by_name.get(name.as_ref()).copied()
    }

    /// Returns the entry at `position` in insertion order.
    pub fn get(&self, position: usize) -> Option<&EntryRecord> {
        self.entries.get(position)
    }

    /// Iterates entries in insertion order. Restartable by re-invoking.
    pub fn iter(&self) -> impl Iterator<Item = &EntryRecord> {
        self.entries.iter()
    }

    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index generation; bumped by every mutation of the owning session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Entry count the trailer claimed at build time, when known.
    pub fn expected_count(&self) -> Option<u64> {
        self.expected_count
    }

    /// Returns a new index with `record` appended and the generation bumped.
    pub(crate) fn with_appended(&self, record: EntryRecord) -> Self {
        let mut next = self.clone();
        next.by_name.insert(record.name.clone(), next.entries.len());
        next.entries.push(record);
        next.generation = self.generation + 1;
        next
    }

    /// Returns a new index with every record named `name` removed, plus the
    /// number removed. `None` when nothing matched.
    pub(crate) fn with_deleted(&self, name: &[u8]) -> Option<(Self, usize)> {
        if !self.by_name.contains_key(name) {
            return None;
        }
        let entries: Vec<EntryRecord> = self
            .entries
            .iter()
            .filter(|e| e.name != name)
            .cloned()
            .collect();
        let removed = self.entries.len() - entries.len();
        let mut next = Self::from_entries(entries, self.expected_count);
        next.generation = self.generation + 1;
        Some((next, removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::Timestamp;

    fn record(name: &[u8], offset: u64) -> EntryRecord {
        let mut r = EntryRecord::pending(name.to_vec(), 0, Timestamp::default(), offset);
        r.finalized = true;
        r
    }

    #[test]
    fn test_lookup_last_write_wins() {
        let index = Index::empty()
            .with_appended(record(b"a.txt", 0))
            .with_appended(record(b"b.txt", 100))
            .with_appended(record(b"a.txt", 200));

        assert_eq!(index.lookup("a.txt").unwrap().local_offset, 200);
        assert_eq!(index.len(), 3);

        let names: Vec<_> = index.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec![b"a.txt".to_vec(), b"b.txt".to_vec(), b"a.txt".to_vec()]);
    }

    #[test]
    fn test_generation_bumps() {
        let index = Index::empty();
        assert_eq!(index.generation(), 0);
        let index = index.with_appended(record(b"x", 0));
        assert_eq!(index.generation(), 1);
        let (index, removed) = index.with_deleted(b"x").unwrap();
        assert_eq!(index.generation(), 2);
        assert_eq!(removed, 1);
        assert!(index.is_empty());
    }

    #[test]
    fn test_delete_removes_all_instances() {
        let index = Index::empty()
            .with_appended(record(b"dup", 0))
            .with_appended(record(b"keep", 50))
            .with_appended(record(b"dup", 100));

        let (index, removed) = index.with_deleted(b"dup").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.len(), 1);
        assert!(index.lookup("dup").is_none());
        assert!(index.lookup("keep").is_some());
    }

    #[test]
    fn test_delete_missing_name() {
        let index = Index::empty().with_appended(record(b"only", 0));
        assert!(index.with_deleted(b"other").is_none());
    }

    #[test]
    fn test_recovery_report_missing() {
        let report = RecoveryReport {
            recovered: 2,
            expected: Some(5),
        };
        assert_eq!(report.missing(), Some(3));

        let report = RecoveryReport {
            recovered: 2,
            expected: None,
        };
        assert_eq!(report.missing(), None);
    }

    #[test]
    fn test_restartable_iteration() {
        let index = Index::empty().with_appended(record(b"a", 0));
        assert_eq!(index.iter().count(), 1);
        assert_eq!(index.iter().count(), 1);
    }
}
