//! Archive session lifecycle: open, append, delete, flush, close, compact.
//!
//! An [`Archive`] owns its backing [`ByteSource`] and the current
//! [`Index`]. Mutations (append, delete, flush) serialize on an exclusive
//! lock held for the whole operation, so payload streaming never interleaves
//! with another mutation's header rewrite. Reads snapshot the index at call
//! start: a long-running iteration never observes a concurrent append.
//!
//! On-disk state machine: a mutable session cycles `Clean -> Dirty -> Clean`
//! as the index diverges from the on-disk trailer and is flushed back.
//! [`Archive::flush`] commits atomically by writing the new trailer body
//! with a zeroed signature, truncating stale bytes, and only then writing
//! the 4 signature bytes, so a reader can never observe a half-written
//! trailer.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::READ_BUFFER_SIZE;
use crate::codec::CodecRegistry;
use crate::cursor::ByteSource;
use crate::format::record::{EntryRecord, encode_local_header};
use crate::format::trailer::{Trailer, encode_central_record, encode_trailer, find_trailer};
use crate::index::{Index, RecoveryReport};
use crate::timestamp::Timestamp;
use crate::verify::{StreamVerifier, VerifyStatus};
use crate::{Error, Result};

/// Access mode for an archive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Lookups, iteration, and payload reads only.
    ReadOnly,
    /// Reads plus append/delete/flush.
    ReadWrite,
}

/// Options controlling how an archive session is opened.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    mode: OpenMode,
    strict: bool,
    registry: CodecRegistry,
}

impl OpenOptions {
    /// Options for a read-only session.
    pub fn read_only() -> Self {
        Self {
            mode: OpenMode::ReadOnly,
            strict: false,
            registry: CodecRegistry::new(),
        }
    }

    /// Options for a mutable session.
    pub fn read_write() -> Self {
        Self {
            mode: OpenMode::ReadWrite,
            ..Self::read_only()
        }
    }

    /// Converts integrity warnings into fatal [`Error::Integrity`] errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Replaces the codec capability table for this session.
    pub fn registry(mut self, registry: CodecRegistry) -> Self {
        self.registry = registry;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Clean,
    Dirty,
}

/// A cursor into a specific entry, pinned to an index generation.
///
/// Handles never hold raw offsets; after any mutation of the owning archive
/// the generation moves on and the handle fails with
/// [`Error::StaleHandle`] instead of dereferencing rebuilt state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHandle {
    position: usize,
    generation: u64,
}

impl EntryHandle {
    /// Position of the entry in insertion order.
    pub fn position(&self) -> usize {
        self.position
    }
}

struct SourceState<S> {
    source: S,
    /// Offset where the next local header goes; the central directory and
    /// trailer are rewritten from here on flush.
    data_end: u64,
    state: SessionState,
}

struct Shared<S: ByteSource> {
    /// Exclusive-mutation lock, held across an entire append/delete/flush.
    mutation: Mutex<()>,
    /// Short-lived per-chunk I/O lock over the backing source.
    io: Mutex<SourceState<S>>,
    index: RwLock<Arc<Index>>,
    registry: CodecRegistry,
    strict: bool,
    read_only: bool,
    comment: Vec<u8>,
}

impl<S: ByteSource> Shared<S> {
    fn lock_io(&self) -> MutexGuard<'_, SourceState<S>> {
        self.io.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_mutation(&self) -> MutexGuard<'_, ()> {
        self.mutation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn index_snapshot(&self) -> Arc<Index> {
        self.index
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// A handle over one open archive.
///
/// See the [module documentation](self) for the lifecycle and concurrency
/// model.
pub struct Archive<S: ByteSource> {
    shared: Arc<Shared<S>>,
    recovery: Option<RecoveryReport>,
}

impl<S: ByteSource + 'static> Archive<S> {
    /// Opens an archive session over `source`.
    ///
    /// The index is built trailer-first. When the trailer is missing or its
    /// central records are malformed, `open` falls back to a linear header
    /// scan; a successful recovery is surfaced as a `log::warn!` plus a
    /// [`RecoveryReport`] (see [`recovery_report`](Self::recovery_report)),
    /// not an error. A mutable session recovered this way starts dirty so
    /// the next flush writes a valid trailer again.
    ///
    /// Opening an empty source read-write creates a new archive; read-only
    /// it fails with [`Error::TrailerNotFound`].
    pub fn open(mut source: S, options: OpenOptions) -> Result<Self> {
        let read_only = options.mode == OpenMode::ReadOnly;
        let extent = source.extent();

        if extent == 0 {
            if read_only {
                return Err(Error::TrailerNotFound { window: 0 });
            }
            return Ok(Self::from_parts(
                source,
                Index::empty(),
                0,
                SessionState::Dirty,
                options,
                None,
                Vec::new(),
            ));
        }

        match Index::build_from_trailer(&mut source) {
            Ok((index, trailer)) => {
                let data_end = trailer.cd_offset;
                Ok(Self::from_parts(
                    source,
                    index,
                    data_end,
                    SessionState::Clean,
                    options,
                    None,
                    trailer.comment,
                ))
            }
            Err(e @ (Error::TrailerNotFound { .. } | Error::MalformedRecord { .. })) => {
                // The trailer may still be readable even though its central
                // records were rejected; its count sizes the recovery report.
                let expected = find_trailer(&mut source).ok().map(|(t, _)| t.entry_count);
                let (index, report) = Index::build_by_scan(&mut source, expected)?;
                if index.is_empty() {
                    return Err(e);
                }
                log::warn!(
                    "trailer rejected ({e}); scan fallback recovered {} entries (trailer claimed {:?})",
                    report.recovered,
                    report.expected,
                );
                let data_end = index.iter().map(EntryRecord::payload_end).max().unwrap_or(0);
                let state = if read_only {
                    SessionState::Clean
                } else {
                    SessionState::Dirty
                };
                Ok(Self::from_parts(
                    source,
                    index,
                    data_end,
                    state,
                    options,
                    Some(report),
                    Vec::new(),
                ))
            }
            Err(e) => Err(e),
        }
    }

    fn from_parts(
        source: S,
        index: Index,
        data_end: u64,
        state: SessionState,
        options: OpenOptions,
        recovery: Option<RecoveryReport>,
        comment: Vec<u8>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                mutation: Mutex::new(()),
                io: Mutex::new(SourceState {
                    source,
                    data_end,
                    state,
                }),
                index: RwLock::new(Arc::new(index)),
                registry: options.registry,
                strict: options.strict,
                read_only: options.mode == OpenMode::ReadOnly,
                comment,
            }),
            recovery,
        }
    }

    /// Returns a snapshot of the current index.
    ///
    /// The snapshot is immutable; mutations publish a new index rather than
    /// touching one that readers may be iterating.
    pub fn index(&self) -> Arc<Index> {
        self.shared.index_snapshot()
    }

    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.index().len()
    }

    /// Returns whether the archive holds no entries.
    pub fn is_empty(&self) -> bool {
        self.index().is_empty()
    }

    /// The degraded-mode recovery report, when `open` fell back to a scan.
    pub fn recovery_report(&self) -> Option<RecoveryReport> {
        self.recovery
    }

    /// Returns whether the index has diverged from the on-disk trailer.
    pub fn is_dirty(&self) -> bool {
        self.shared.lock_io().state == SessionState::Dirty
    }

    /// Resolves a name to a handle on its last-inserted entry.
    pub fn entry_handle(&self, name: impl AsRef<[u8]>) -> Result<EntryHandle> {
        let index = self.index();
        let position = index
            .position_of(name.as_ref())
            .ok_or_else(|| Error::EntryNotFound {
                name: String::from_utf8_lossy(name.as_ref()).into_owned(),
            })?;
        Ok(EntryHandle {
            position,
            generation: index.generation(),
        })
    }

    /// Opens a streaming, verifying reader over one entry's payload.
    ///
    /// The payload region is validated against the source extent up front,
    /// so a truncated container fails fast with [`Error::OutOfBounds`]
    /// instead of hanging. Dropping the stream mid-read has no side effects.
    pub fn open_entry(&self, handle: &EntryHandle) -> Result<EntryStream> {
        let index = self.index();
        if handle.generation != index.generation() {
            return Err(Error::StaleHandle {
                handle: handle.generation,
                current: index.generation(),
            });
        }
        let record = index.get(handle.position).ok_or(Error::StaleHandle {
            handle: handle.generation,
            current: index.generation(),
        })?;
        self.stream_record(record, false)
    }

    fn stream_record(&self, record: &EntryRecord, report_only: bool) -> Result<EntryStream> {
        let extent = self.shared.lock_io().source.extent();
        if record.payload_end() > extent {
            return Err(Error::OutOfBounds {
                offset: record.payload_offset,
                len: record.compressed_size,
                extent,
            });
        }

        let section = SectionReader {
            shared: Arc::clone(&self.shared),
            pos: record.payload_offset,
            end: record.payload_end(),
        };
        let decoder = self.shared.registry.new_decoder(
            record.codec,
            Box::new(section),
            record.uncompressed_size,
        )?;

        Ok(EntryStream {
            decoder,
            verifier: StreamVerifier::new(),
            expected_crc: record.crc32,
            expected_size: record.uncompressed_size,
            name: record.name_lossy(),
            strict: self.shared.strict,
            report_only,
            status: None,
        })
    }

    /// Reads and verifies one entry's payload into memory.
    ///
    /// Returns the decoded bytes together with the verification outcome. A
    /// checksum mismatch is non-fatal here unless the session is strict; a
    /// decoded-length disagreement is always fatal (the container is lying
    /// about the payload, so the bytes have no authoritative size).
    pub fn read_verified(&self, name: impl AsRef<[u8]>) -> Result<(Vec<u8>, VerifyStatus)> {
        let handle = self.entry_handle(name)?;
        let mut stream = self.open_entry(&handle)?;
        let mut out = Vec::new();
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            let n = stream.read_chunk(&mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        let status = stream.status().unwrap_or(VerifyStatus::Ok);
        Ok((out, status))
    }

    /// Reads one entry's payload, discarding the verification flag.
    ///
    /// Mismatches are logged at warn level (strict sessions fail instead).
    pub fn read(&self, name: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let (bytes, status) = self.read_verified(name.as_ref())?;
        if !status.is_ok() {
            log::warn!(
                "entry '{}' failed verification: {status}",
                String::from_utf8_lossy(name.as_ref()),
            );
        }
        Ok(bytes)
    }

    /// Re-reads one entry and reports its integrity without strict gating.
    ///
    /// Both mismatch kinds come back as a [`VerifyStatus`]; only undecodable
    /// payloads (I/O or [`Error::CorruptStream`]) fail.
    pub fn verify_entry(&self, name: impl AsRef<[u8]>) -> Result<VerifyStatus> {
        let name = name.as_ref();
        let index = self.index();
        let record = index.lookup(name).ok_or_else(|| Error::EntryNotFound {
            name: String::from_utf8_lossy(name).into_owned(),
        })?;
        let mut stream = self.stream_record(record, true)?;
        let mut buf = [0u8; READ_BUFFER_SIZE];
        while stream.read_chunk(&mut buf)? != 0 {}
        Ok(stream.status().unwrap_or(VerifyStatus::Ok))
    }

    /// Appends a new entry, streaming `payload` through the codec and the
    /// integrity verifier simultaneously.
    ///
    /// The local header is written first with placeholder sizes, the payload
    /// is streamed behind it, and the header is rewritten once the final
    /// sizes and checksum are known, so the whole payload is never held in
    /// memory. Marks the session dirty.
    ///
    /// # Cancellation hazard
    ///
    /// Abandoning an append mid-stream (an error from `payload`, or a panic)
    /// leaves orphaned, unindexed bytes behind the last flushed state. The
    /// session is already marked dirty by then, so the next flush or close
    /// rewrites the trailer over the region and reclaims it.
    pub fn append<R: Read>(
        &self,
        name: impl AsRef<[u8]>,
        payload: &mut R,
        codec: u16,
    ) -> Result<EntryRecord> {
        self.ensure_writable()?;
        let name = name.as_ref();
        if name.is_empty() || name.len() > u16::MAX as usize {
            return Err(Error::MalformedRecord {
                offset: 0,
                reason: format!("entry name of {} bytes is not encodable", name.len()),
            });
        }
        if !self.shared.registry.supports(codec) {
            return Err(Error::UnsupportedCodec { codec_id: codec });
        }

        let _mutation = self.shared.lock_mutation();

        // Step 1: placeholder header at the current data end. The placeholder
        // overwrites the on-disk central directory, so the session goes dirty
        // before the payload stream can fail.
        let mut record = EntryRecord::pending(name.to_vec(), codec, Timestamp::now(), 0);
        let payload_offset;
        {
            let mut io = self.shared.lock_io();
            record.local_offset = io.data_end;
            let header = encode_local_header(&record, true)?;
            io.source.write_at(record.local_offset, &header)?;
            io.state = SessionState::Dirty;
            payload_offset = record.local_offset + header.len() as u64;
        }
        record.payload_offset = payload_offset;

        // Step 2: stream the payload through encoder and verifier.
        let written = Arc::new(AtomicU64::new(0));
        let sink = SectionWriter {
            shared: Arc::clone(&self.shared),
            offset: payload_offset,
            written: Arc::clone(&written),
        };
        let mut encoder = self.shared.registry.new_encoder(codec, Box::new(sink))?;
        let mut verifier = StreamVerifier::new();
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            let n = payload.read(&mut buf)?;
            if n == 0 {
                break;
            }
            verifier.update(&buf[..n]);
            encoder.write_all(&buf[..n])?;
        }
        encoder.finish()?;

        // Step 3: finalize sizes and checksum, rewrite the header in place.
        record.crc32 = verifier.crc32();
        record.uncompressed_size = verifier.bytes_seen();
        record.compressed_size = written.load(Ordering::Acquire);
        record.finalized = true;
        {
            let mut io = self.shared.lock_io();
            let header = encode_local_header(&record, false)?;
            io.source.write_at(record.local_offset, &header)?;
            io.data_end = record.payload_end();
        }

        self.publish(|index| index.with_appended(record.clone()));
        Ok(record)
    }

    /// Logically removes every entry named `name` from the index.
    ///
    /// Payload bytes are not reclaimed; they become orphaned space that
    /// [`compact`](Self::compact) drops. Returns how many records were
    /// removed. Marks the session dirty.
    pub fn delete(&self, name: impl AsRef<[u8]>) -> Result<usize> {
        self.ensure_writable()?;
        let name = name.as_ref();
        let _mutation = self.shared.lock_mutation();

        let (next, removed) = self
            .shared
            .index_snapshot()
            .with_deleted(name)
            .ok_or_else(|| Error::EntryNotFound {
                name: String::from_utf8_lossy(name).into_owned(),
            })?;

        {
            let mut io = self.shared.lock_io();
            io.state = SessionState::Dirty;
        }
        self.replace_index(next);
        Ok(removed)
    }

    /// Rewrites the trailer from the current index and marks the session
    /// clean.
    ///
    /// Commit protocol: central records and the trailer body are written
    /// with a zeroed trailer signature, stale bytes past the new end are
    /// truncated, and the signature is written last. Repeating `flush` with
    /// no intervening mutation rewrites byte-identical bytes.
    pub fn flush(&self) -> Result<()> {
        if self.shared.read_only {
            return Ok(());
        }
        let _mutation = self.shared.lock_mutation();
        self.write_trailer_locked()
    }

    fn write_trailer_locked(&self) -> Result<()> {
        let index = self.shared.index_snapshot();
        let mut io = self.shared.lock_io();

        let cd_offset = io.data_end;
        let mut cd = Vec::new();
        for entry in index.iter() {
            cd.extend(encode_central_record(entry)?);
        }
        let trailer = Trailer {
            entry_count: index.len() as u64,
            cd_size: cd.len() as u64,
            cd_offset,
            comment: self.shared.comment.clone(),
        };
        let trailer_bytes = encode_trailer(&trailer)?;
        let trailer_offset = cd_offset + cd.len() as u64;

        io.source.write_at(cd_offset, &cd)?;
        let mut body = trailer_bytes.clone();
        body[..4].fill(0);
        io.source.write_at(trailer_offset, &body)?;
        io.source
            .set_extent(trailer_offset + trailer_bytes.len() as u64)?;
        // Commit: the signature goes in only once the body is durable.
        io.source.write_at(trailer_offset, &trailer_bytes[..4])?;

        io.state = SessionState::Clean;
        Ok(())
    }

    /// Flushes any pending trailer rewrite and releases the backing source.
    ///
    /// Fails if entry streams opened from this archive are still alive.
    pub fn close(self) -> Result<S> {
        if !self.shared.read_only && self.is_dirty() {
            self.flush()?;
        }
        let shared = Arc::try_unwrap(self.shared).map_err(|_| {
            Error::Io(io::Error::other(
                "archive is still borrowed by open entry streams",
            ))
        })?;
        Ok(shared
            .io
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .source)
    }

    /// Rebuilds the archive into `target`, dropping logically-deleted
    /// entries and duplicate-name shadows. Never in-place.
    ///
    /// Surviving payloads are copied raw, without recompression; their
    /// records (checksums, timestamps, preserved extra fields) carry over
    /// verbatim. Returns the new, already-flushed handle.
    pub fn compact<T: ByteSource + 'static>(&self, target: T) -> Result<Archive<T>> {
        if target.extent() != 0 {
            return Err(Error::MalformedRecord {
                offset: 0,
                reason: "compaction target is not empty".into(),
            });
        }
        let index = self.index();
        let out = Archive::open(
            target,
            OpenOptions::read_write()
                .strict(self.shared.strict)
                .registry(self.shared.registry.clone()),
        )?;

        for (position, record) in index.iter().enumerate() {
            // Keep only the last instance of each name.
            if index.position_of(&record.name) != Some(position) {
                continue;
            }
            out.append_raw(record, self)?;
        }
        out.flush()?;
        Ok(out)
    }

    /// Appends an already-finalized record by copying its compressed payload
    /// verbatim from `origin`.
    fn append_raw<O: ByteSource + 'static>(
        &self,
        record: &EntryRecord,
        origin: &Archive<O>,
    ) -> Result<()> {
        let _mutation = self.shared.lock_mutation();

        let mut moved = record.clone();
        {
            let mut io = self.shared.lock_io();
            moved.local_offset = io.data_end;
            let header = encode_local_header(&moved, false)?;
            io.source.write_at(moved.local_offset, &header)?;
            moved.payload_offset = moved.local_offset + header.len() as u64;
        }

        let mut remaining = record.compressed_size;
        let mut src_pos = record.payload_offset;
        let mut dst_pos = moved.payload_offset;
        let mut buf = [0u8; READ_BUFFER_SIZE];
        while remaining > 0 {
            let n = (remaining as usize).min(buf.len());
            origin.shared.lock_io().source.read_at(src_pos, &mut buf[..n])?;
            self.shared.lock_io().source.write_at(dst_pos, &buf[..n])?;
            src_pos += n as u64;
            dst_pos += n as u64;
            remaining -= n as u64;
        }

        {
            let mut io = self.shared.lock_io();
            io.data_end = moved.payload_end();
            io.state = SessionState::Dirty;
        }
        self.publish(|index| index.with_appended(moved.clone()));
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.shared.read_only {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    fn publish(&self, next: impl FnOnce(&Index) -> Index) {
        let mut guard = self
            .shared
            .index
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(next(&guard));
    }

    fn replace_index(&self, index: Index) {
        self.publish(|_| index);
    }
}

impl<S: ByteSource> std::fmt::Debug for Archive<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.shared.index_snapshot().len())
            .field("read_only", &self.shared.read_only)
            .finish_non_exhaustive()
    }
}

/// Bounded reader over one payload region of the backing source.
struct SectionReader<S: ByteSource> {
    shared: Arc<Shared<S>>,
    pos: u64,
    end: u64,
}

impl<S: ByteSource> Read for SectionReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = (self.end - self.pos) as usize;
        let n = remaining.min(buf.len());
        if n == 0 {
            return Ok(0);
        }
        self.shared
            .lock_io()
            .source
            .read_at(self.pos, &mut buf[..n])
            .map_err(io::Error::other)?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// Appending writer over the backing source, used by `append`'s encoder.
struct SectionWriter<S: ByteSource> {
    shared: Arc<Shared<S>>,
    offset: u64,
    written: Arc<AtomicU64>,
}

impl<S: ByteSource> Write for SectionWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let at = self.offset + self.written.load(Ordering::Acquire);
        self.shared
            .lock_io()
            .source
            .write_at(at, buf)
            .map_err(io::Error::other)?;
        self.written.fetch_add(buf.len() as u64, Ordering::Release);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A streaming, verifying reader over one entry's decoded payload.
///
/// Implements [`Read`]; once the stream reaches its end,
/// [`status`](Self::status) reports the verification outcome. Dropping the
/// stream early has no side effects.
pub struct EntryStream {
    decoder: Box<dyn crate::codec::Decoder>,
    verifier: StreamVerifier,
    expected_crc: u32,
    expected_size: u64,
    name: String,
    strict: bool,
    report_only: bool,
    status: Option<VerifyStatus>,
}

impl EntryStream {
    /// Verification outcome, available once the stream has been fully read.
    pub fn status(&self) -> Option<VerifyStatus> {
        self.status
    }

    /// Reads the next decoded chunk.
    ///
    /// At end of stream the accumulated checksum and size are compared
    /// against the record: a size disagreement fails with
    /// [`Error::SizeMismatch`], a checksum disagreement fails with
    /// [`Error::Integrity`] in strict mode and is otherwise reported
    /// through [`status`](Self::status).
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.status.is_some() {
            return Ok(0);
        }
        let n = self.decoder.read(buf).map_err(map_stream_err)?;
        if n > 0 {
            self.verifier.update(&buf[..n]);
            return Ok(n);
        }

        let status = self.verifier.finish(self.expected_crc, self.expected_size);
        self.status = Some(status);
        match status {
            VerifyStatus::Ok => Ok(0),
            VerifyStatus::SizeMismatch { expected, actual } if !self.report_only => {
                Err(Error::SizeMismatch { expected, actual })
            }
            VerifyStatus::ChecksumMismatch { .. } if self.strict && !self.report_only => {
                Err(Error::Integrity {
                    name: self.name.clone(),
                    status,
                })
            }
            _ => {
                if !self.report_only {
                    log::warn!("entry '{}' failed verification: {status}", self.name);
                }
                Ok(0)
            }
        }
    }
}

impl Read for EntryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(buf).map_err(io::Error::other)
    }
}

/// Maps an I/O error surfacing from the decode pipeline back into the crate
/// taxonomy, unwrapping errors that originated here.
fn map_stream_err(e: io::Error) -> Error {
    match e.downcast::<Error>() {
        Ok(inner) => inner,
        Err(e) => Error::from_decode_io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::codec_id;
    use crate::cursor::MemorySource;

    fn new_archive() -> Archive<MemorySource> {
        Archive::open(MemorySource::empty(), OpenOptions::read_write()).unwrap()
    }

    #[test]
    fn test_new_archive_starts_dirty_and_empty() {
        let archive = new_archive();
        assert!(archive.is_empty());
        assert!(archive.is_dirty());
    }

    #[test]
    fn test_append_then_read() {
        let archive = new_archive();
        let record = archive
            .append("hello.txt", &mut &b"hello world"[..], codec_id::STORE)
            .unwrap();
        assert!(record.finalized);
        assert_eq!(record.uncompressed_size, 11);
        assert_eq!(record.compressed_size, 11);

        let (bytes, status) = archive.read_verified("hello.txt").unwrap();
        assert_eq!(bytes, b"hello world");
        assert!(status.is_ok());
    }

    #[test]
    fn test_close_reopen() {
        let archive = new_archive();
        archive
            .append("a.txt", &mut &b"payload"[..], codec_id::STORE)
            .unwrap();
        let source = archive.close().unwrap();

        let reopened = Archive::open(source, OpenOptions::read_only()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.read("a.txt").unwrap(), b"payload");
        assert!(reopened.recovery_report().is_none());
    }

    #[test]
    fn test_read_only_rejects_mutation() {
        let archive = new_archive();
        archive
            .append("a.txt", &mut &b"x"[..], codec_id::STORE)
            .unwrap();
        let source = archive.close().unwrap();

        let archive = Archive::open(source, OpenOptions::read_only()).unwrap();
        assert!(matches!(
            archive.append("b.txt", &mut &b"y"[..], codec_id::STORE),
            Err(Error::ReadOnly)
        ));
        assert!(matches!(archive.delete("a.txt"), Err(Error::ReadOnly)));
    }

    #[test]
    fn test_open_empty_read_only_fails() {
        assert!(matches!(
            Archive::open(MemorySource::empty(), OpenOptions::read_only()),
            Err(Error::TrailerNotFound { .. })
        ));
    }

    #[test]
    fn test_stale_handle_after_append() {
        let archive = new_archive();
        archive
            .append("a.txt", &mut &b"one"[..], codec_id::STORE)
            .unwrap();
        let handle = archive.entry_handle("a.txt").unwrap();

        archive
            .append("b.txt", &mut &b"two"[..], codec_id::STORE)
            .unwrap();
        assert!(matches!(
            archive.open_entry(&handle),
            Err(Error::StaleHandle { .. })
        ));
    }

    #[test]
    fn test_unknown_codec_rejected_before_write() {
        let archive = new_archive();
        let before = archive.is_dirty();
        assert!(matches!(
            archive.append("x", &mut &b"data"[..], 0x4242),
            Err(Error::UnsupportedCodec { codec_id: 0x4242 })
        ));
        assert_eq!(archive.is_dirty(), before);
        assert!(archive.is_empty());
    }

    #[test]
    fn test_delete_marks_dirty_and_removes() {
        let archive = new_archive();
        archive
            .append("a.txt", &mut &b"one"[..], codec_id::STORE)
            .unwrap();
        archive.flush().unwrap();
        assert!(!archive.is_dirty());

        assert_eq!(archive.delete("a.txt").unwrap(), 1);
        assert!(archive.is_dirty());
        assert!(archive.index().lookup("a.txt").is_none());
        assert!(matches!(
            archive.delete("a.txt"),
            Err(Error::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let archive = new_archive();
        assert!(matches!(
            archive.append("", &mut &b""[..], codec_id::STORE),
            Err(Error::MalformedRecord { .. })
        ));
    }
}
