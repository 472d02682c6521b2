//! Zstandard codec implementation.

use std::io::{self, Read, Write};

use super::{Decoder, Encoder, codec_id};

/// Zstandard decoder.
pub struct ZstdDecoder<R: io::BufRead> {
    inner: zstd::stream::read::Decoder<'static, R>,
}

impl<R: io::BufRead + Send> ZstdDecoder<R> {
    /// Creates a new Zstandard decoder.
    pub fn new(input: R) -> io::Result<Self> {
        Ok(Self {
            inner: zstd::stream::read::Decoder::with_buffer(input)?,
        })
    }
}

impl<R: io::BufRead + Send> Read for ZstdDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: io::BufRead + Send> Decoder for ZstdDecoder<R> {
    fn codec_id(&self) -> u16 {
        codec_id::ZSTD
    }
}

/// Zstandard encoder options.
#[derive(Debug, Clone)]
pub struct ZstdEncoderOptions {
    /// Compression level (1-22, default 3).
    pub level: i32,
}

impl Default for ZstdEncoderOptions {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdEncoderOptions {
    /// Creates options with the given compression level.
    pub fn with_level(level: i32) -> Self {
        Self {
            level: level.clamp(1, 22),
        }
    }
}

/// Zstandard encoder.
pub struct ZstdEncoder<W: Write> {
    inner: zstd::stream::write::Encoder<'static, W>,
}

impl<W: Write + Send> ZstdEncoder<W> {
    /// Creates a new Zstandard encoder.
    pub fn new(output: W, options: &ZstdEncoderOptions) -> io::Result<Self> {
        Ok(Self {
            inner: zstd::stream::write::Encoder::new(output, options.level)?,
        })
    }
}

impl<W: Write + Send> Write for ZstdEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> Encoder for ZstdEncoder<W> {
    fn codec_id(&self) -> u16 {
        codec_id::ZSTD
    }

    fn finish(self: Box<Self>) -> io::Result<()> {
        self.inner.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    #[test]
    fn test_zstd_roundtrip() {
        let data = b"Zstandard round-trip payload, repeated: abcabcabcabc";

        let mut compressed = Vec::new();
        {
            let mut encoder =
                ZstdEncoder::new(Cursor::new(&mut compressed), &ZstdEncoderOptions::default())
                    .unwrap();
            encoder.write_all(data).unwrap();
            Box::new(encoder).finish().unwrap();
        }

        let mut decoder = ZstdDecoder::new(BufReader::new(Cursor::new(&compressed))).unwrap();
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_zstd_options_clamped() {
        assert_eq!(ZstdEncoderOptions::with_level(0).level, 1);
        assert_eq!(ZstdEncoderOptions::with_level(40).level, 22);
    }
}
