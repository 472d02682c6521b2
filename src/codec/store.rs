//! Store codec (no compression).

use std::io::{self, Read, Write};

use super::{Decoder, Encoder, codec_id};

/// A decoder that passes data through unchanged, bounded by the declared
/// payload size.
pub struct StoreDecoder<R> {
    inner: R,
    remaining: u64,
    id: u16,
}

impl<R: Read + Send> StoreDecoder<R> {
    /// Creates a new store decoder over `size` bytes of payload.
    pub fn new(inner: R, size: u64) -> Self {
        Self::with_id(inner, size, codec_id::STORE)
    }

    /// Same, reporting a caller-chosen codec id (for registry extensions
    /// that reuse the pass-through transform).
    pub fn with_id(inner: R, size: u64, id: u16) -> Self {
        Self {
            inner,
            remaining: size,
            id,
        }
    }
}

impl<R: Read + Send> Read for StoreDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max_read = (self.remaining as usize).min(buf.len());
        let n = self.inner.read(&mut buf[..max_read])?;
        self.remaining = self.remaining.saturating_sub(n as u64);
        Ok(n)
    }
}

impl<R: Read + Send> Decoder for StoreDecoder<R> {
    fn codec_id(&self) -> u16 {
        self.id
    }
}

/// An encoder that passes data through unchanged.
pub struct StoreEncoder<W> {
    inner: W,
    id: u16,
}

impl<W: Write + Send> StoreEncoder<W> {
    /// Creates a new store encoder.
    pub fn new(inner: W) -> Self {
        Self::with_id(inner, codec_id::STORE)
    }

    /// Same, reporting a caller-chosen codec id.
    pub fn with_id(inner: W, id: u16) -> Self {
        Self { inner, id }
    }
}

impl<W: Write + Send> Write for StoreEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> Encoder for StoreEncoder<W> {
    fn codec_id(&self) -> u16 {
        self.id
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_store_full_read() {
        let data = b"Hello, World!";
        let mut decoder = StoreDecoder::new(Cursor::new(data.to_vec()), data.len() as u64);
        let mut output = Vec::new();
        decoder.read_to_end(&mut output).unwrap();
        assert_eq!(output, data);
    }

    #[test]
    fn test_store_bounded_read() {
        let data = b"Hello, World!";
        let mut decoder = StoreDecoder::new(Cursor::new(data.to_vec()), 5);
        let mut output = Vec::new();
        decoder.read_to_end(&mut output).unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_store_empty() {
        let mut decoder = StoreDecoder::new(Cursor::new(Vec::<u8>::new()), 0);
        let mut output = Vec::new();
        decoder.read_to_end(&mut output).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_store_encoder_passthrough() {
        let mut out = Vec::new();
        {
            let mut encoder = StoreEncoder::new(Cursor::new(&mut out));
            encoder.write_all(b"verbatim").unwrap();
            Box::new(encoder).finish().unwrap();
        }
        assert_eq!(out, b"verbatim");
    }

    #[test]
    fn test_store_codec_id() {
        let decoder = StoreDecoder::new(Cursor::new(Vec::<u8>::new()), 0);
        assert_eq!(decoder.codec_id(), codec_id::STORE);
    }
}
