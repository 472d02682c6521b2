//! Compression codec infrastructure.
//!
//! This module provides the abstraction layer for payload compression:
//! streaming [`Decoder`]/[`Encoder`] traits, the numeric codec identifiers
//! stored in entry records, and the [`CodecRegistry`] that dispatches an
//! identifier to an implementation.
//!
//! Dispatch is a fixed capability table over the built-in codecs, extensible
//! by registering additional identifiers at process start. An identifier
//! with no registered implementation fails with
//! [`Error::UnsupportedCodec`](crate::Error::UnsupportedCodec); bytes are
//! never silently passed through.

pub mod store;

#[cfg(feature = "deflate")]
pub mod deflate;

#[cfg(feature = "zstd")]
pub mod zstd;

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::{Error, Result};

pub use store::{StoreDecoder, StoreEncoder};

#[cfg(feature = "deflate")]
pub use deflate::{DeflateDecoder, DeflateEncoder, DeflateEncoderOptions};

#[cfg(feature = "zstd")]
pub use self::zstd::{ZstdDecoder, ZstdEncoder, ZstdEncoderOptions};

/// A decoder that reads compressed data and produces uncompressed output.
///
/// Decoders are single-pass and finite; restart by building a fresh one.
pub trait Decoder: Read + Send {
    /// Returns the codec identifier for this decoder.
    fn codec_id(&self) -> u16;
}

/// An encoder that takes uncompressed data and produces compressed output.
pub trait Encoder: Write + Send {
    /// Returns the codec identifier for this encoder.
    fn codec_id(&self) -> u16;

    /// Finishes encoding and flushes any remaining data.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Codec identifiers, using the ZIP method-id space.
pub mod codec_id {
    /// Stored (no compression).
    pub const STORE: u16 = 0;
    /// Deflate compression.
    pub const DEFLATE: u16 = 8;
    /// Zstandard compression.
    pub const ZSTD: u16 = 93;

    /// Returns a human-readable name for a codec identifier.
    pub fn name(id: u16) -> &'static str {
        match id {
            STORE => "Store",
            DEFLATE => "Deflate",
            ZSTD => "Zstandard",
            _ => "Unknown",
        }
    }
}

/// Boxed input handed to a decoder factory.
pub type DecoderInput = Box<dyn Read + Send>;
/// Boxed output handed to an encoder factory.
pub type EncoderOutput = Box<dyn Write + Send>;

/// Factory building a decoder over compressed input.
///
/// The second argument is the declared uncompressed size, which bounded
/// decoders (such as Store) use to stop at the payload edge.
pub type DecoderFactory = dyn Fn(DecoderInput, u64) -> io::Result<Box<dyn Decoder>> + Send + Sync;

/// Factory building an encoder over a compressed-output sink.
pub type EncoderFactory = dyn Fn(EncoderOutput) -> io::Result<Box<dyn Encoder>> + Send + Sync;

/// Dispatch table from codec identifier to implementation.
///
/// The built-in identifiers ([`codec_id::STORE`], and [`codec_id::DEFLATE`]
/// / [`codec_id::ZSTD`] when their features are enabled) are always present.
/// Additional identifiers can be registered before the registry is handed to
/// a session:
///
/// ```rust
/// use ziplus::codec::CodecRegistry;
///
/// let registry = CodecRegistry::new();
/// assert!(registry.supports(ziplus::codec::codec_id::STORE));
/// assert!(!registry.supports(0x4242));
/// ```
#[derive(Clone, Default)]
pub struct CodecRegistry {
    custom: HashMap<u16, CustomCodec>,
}

#[derive(Clone)]
struct CustomCodec {
    decoder: Arc<DecoderFactory>,
    encoder: Arc<EncoderFactory>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("custom_ids", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CodecRegistry {
    /// Creates a registry with the built-in capability table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom codec under `id`, replacing any previous
    /// registration (including a built-in).
    pub fn register(
        &mut self,
        id: u16,
        decoder: Arc<DecoderFactory>,
        encoder: Arc<EncoderFactory>,
    ) {
        self.custom.insert(id, CustomCodec { decoder, encoder });
    }

    /// Returns whether `id` has an implementation.
    pub fn supports(&self, id: u16) -> bool {
        if self.custom.contains_key(&id) {
            return true;
        }
        match id {
            codec_id::STORE => true,
            #[cfg(feature = "deflate")]
            codec_id::DEFLATE => true,
            #[cfg(feature = "zstd")]
            codec_id::ZSTD => true,
            _ => false,
        }
    }

    /// Builds a decoder for `id` over the given compressed input.
    pub fn new_decoder(
        &self,
        id: u16,
        input: DecoderInput,
        uncompressed_size: u64,
    ) -> Result<Box<dyn Decoder>> {
        if let Some(custom) = self.custom.get(&id) {
            return (custom.decoder)(input, uncompressed_size).map_err(Error::from_decode_io);
        }
        match id {
            codec_id::STORE => Ok(Box::new(StoreDecoder::new(input, uncompressed_size))),

            #[cfg(feature = "deflate")]
            codec_id::DEFLATE => Ok(Box::new(DeflateDecoder::new(io::BufReader::new(input)))),

            #[cfg(feature = "zstd")]
            codec_id::ZSTD => Ok(Box::new(ZstdDecoder::new(io::BufReader::new(input))?)),

            _ => Err(Error::UnsupportedCodec { codec_id: id }),
        }
    }

    /// Builds an encoder for `id` over the given compressed-output sink.
    pub fn new_encoder(&self, id: u16, output: EncoderOutput) -> Result<Box<dyn Encoder>> {
        if let Some(custom) = self.custom.get(&id) {
            return (custom.encoder)(output).map_err(Error::Io);
        }
        match id {
            codec_id::STORE => Ok(Box::new(StoreEncoder::new(output))),

            #[cfg(feature = "deflate")]
            codec_id::DEFLATE => Ok(Box::new(DeflateEncoder::new(
                output,
                &DeflateEncoderOptions::default(),
            ))),

            #[cfg(feature = "zstd")]
            codec_id::ZSTD => Ok(Box::new(ZstdEncoder::new(
                output,
                &ZstdEncoderOptions::default(),
            )?)),

            _ => Err(Error::UnsupportedCodec { codec_id: id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_store_always_supported() {
        let registry = CodecRegistry::new();
        assert!(registry.supports(codec_id::STORE));
    }

    #[test]
    fn test_unknown_codec_rejected() {
        let registry = CodecRegistry::new();
        assert!(matches!(
            registry.new_decoder(0x4242, Box::new(io::empty()), 0),
            Err(Error::UnsupportedCodec { codec_id: 0x4242 })
        ));
        assert!(matches!(
            registry.new_encoder(0x4242, Box::new(io::sink())),
            Err(Error::UnsupportedCodec { codec_id: 0x4242 })
        ));
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(codec_id::name(codec_id::STORE), "Store");
        assert_eq!(codec_id::name(codec_id::DEFLATE), "Deflate");
        assert_eq!(codec_id::name(0x4242), "Unknown");
    }

    #[test]
    fn test_register_custom_codec() {
        // A "custom" codec that is just Store under a private id.
        let mut registry = CodecRegistry::new();
        registry.register(
            0x4242,
            Arc::new(|input, size| {
                Ok(Box::new(StoreDecoder::with_id(input, size, 0x4242)) as Box<dyn Decoder>)
            }),
            Arc::new(|output| {
                Ok(Box::new(StoreEncoder::with_id(output, 0x4242)) as Box<dyn Encoder>)
            }),
        );
        assert!(registry.supports(0x4242));

        // The encoder sink must be 'static, so collect output through a
        // shared buffer.
        #[derive(Clone, Default)]
        struct SharedSink(Arc<std::sync::Mutex<Vec<u8>>>);
        impl Write for SharedSink {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let sink = SharedSink::default();
        let mut encoder = registry
            .new_encoder(0x4242, Box::new(sink.clone()))
            .unwrap();
        encoder.write_all(b"payload").unwrap();
        encoder.finish().unwrap();
        let compressed = sink.0.lock().unwrap().clone();
        assert_eq!(compressed, b"payload");

        let input: DecoderInput = Box::new(io::Cursor::new(compressed));
        let mut decoder = registry.new_decoder(0x4242, input, 7).unwrap();
        assert_eq!(decoder.codec_id(), 0x4242);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"payload");
    }
}
