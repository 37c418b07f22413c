use std::io::{ErrorKind, Read};
use std::sync::Arc;

use bytes::{Buf, BytesMut};

use crate::codec::{FrameConfig, FrameDecoder};
use crate::crc::Checksum;
use crate::error::{FrameError, Result};
use crate::packet::Packet;

const READ_CHUNK_SIZE: usize = 256;

/// Reads complete packets from any `Read` stream.
///
/// Handles partial reads and resynchronization internally; callers always
/// get complete, validated packets.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    decoder: FrameDecoder,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self::with_decoder(inner, FrameDecoder::new(config.max_payload_size))
    }

    /// Create a frame reader that checks CRCs with `checksum`.
    pub fn with_checksum(inner: T, config: FrameConfig, checksum: Arc<dyn Checksum>) -> Self {
        Self::with_decoder(
            inner,
            FrameDecoder::with_checksum(config.max_payload_size, checksum),
        )
    }

    fn with_decoder(inner: T, decoder: FrameDecoder) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            decoder,
        }
    }

    /// Read the next complete packet (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached and
    /// `Err(FrameError::FrameTooLarge)` when a frame overran the decoder; the
    /// reader stays usable after the latter.
    pub fn read_packet(&mut self) -> Result<Packet> {
        loop {
            while self.buf.has_remaining() {
                if let Some(packet) = self.decoder.feed(self.buf.get_u8())? {
                    return Ok(packet);
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
