//! `tokio_util::codec` adapter for async byte streams.

use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::buffer::FrameBuffer;
use crate::codec::{encode_frame, max_frame_size, FrameConfig, FrameDecoder};
use crate::crc::{Checksum, Crc8};
use crate::error::{FrameError, Result};
use crate::packet::Packet;

/// Frames packets over an `AsyncRead + AsyncWrite` via `FramedRead`/`FramedWrite`.
#[derive(Debug)]
pub struct LinkCodec {
    decoder: FrameDecoder,
    scratch: FrameBuffer,
    config: FrameConfig,
    checksum: Arc<dyn Checksum>,
}

impl LinkCodec {
    /// Codec with the default CRC-8 check.
    pub fn new(config: FrameConfig) -> Self {
        Self::with_checksum(config, Arc::new(Crc8))
    }

    /// Codec with an explicit check algorithm.
    pub fn with_checksum(config: FrameConfig, checksum: Arc<dyn Checksum>) -> Self {
        Self {
            decoder: FrameDecoder::with_checksum(config.max_payload_size, Arc::clone(&checksum)),
            scratch: FrameBuffer::new(max_frame_size(config.max_payload_size, true)),
            config,
            checksum,
        }
    }
}

impl Default for LinkCodec {
    fn default() -> Self {
        Self::new(FrameConfig::default())
    }
}

impl Decoder for LinkCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        while src.has_remaining() {
            if let Some(packet) = self.decoder.feed(src.get_u8())? {
                return Ok(Some(packet));
            }
        }
        Ok(None)
    }
}

impl Encoder<Packet> for LinkCodec {
    type Error = FrameError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        if packet.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: packet.payload.len(),
                max: self.config.max_payload_size,
            });
        }
        let checksum = self.config.use_crc.then_some(self.checksum.as_ref());
        encode_frame(&packet, checksum, &mut self.scratch)?;
        dst.reserve(self.scratch.len());
        dst.put_slice(self.scratch.as_slice());
        Ok(())
    }
}
