use std::io::{ErrorKind, Write};
use std::sync::Arc;

use crate::buffer::FrameBuffer;
use crate::codec::{encode_frame, max_frame_size, FrameConfig};
use crate::crc::{Checksum, Crc8};
use crate::error::{FrameError, Result};
use crate::packet::Packet;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: FrameBuffer,
    config: FrameConfig,
    checksum: Arc<dyn Checksum>,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self::with_checksum(inner, config, Arc::new(Crc8))
    }

    /// Create a frame writer that appends CRCs computed by `checksum`.
    pub fn with_checksum(inner: T, config: FrameConfig, checksum: Arc<dyn Checksum>) -> Self {
        Self {
            inner,
            buf: FrameBuffer::new(max_frame_size(config.max_payload_size, true)),
            config,
            checksum,
        }
    }

    /// Encode and send a packet, with a CRC if the configuration asks for one.
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        self.send_with_crc(packet, self.config.use_crc)
    }

    /// Encode and send a packet, choosing CRC presence explicitly.
    pub fn send_with_crc(&mut self, packet: &Packet, use_crc: bool) -> Result<()> {
        if packet.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: packet.payload.len(),
                max: self.config.max_payload_size,
            });
        }

        let checksum = use_crc.then_some(self.checksum.as_ref());
        encode_frame(packet, checksum, &mut self.buf)?;
        write_all(&mut self.inner, self.buf.as_slice())?;
        self.flush()
    }

    /// Write an already encoded frame.
    pub fn write_raw(&mut self, frame: &[u8]) -> Result<()> {
        write_all(&mut self.inner, frame)?;
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn write_all<T: Write>(inner: &mut T, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}
