//! Self-delimiting, byte-stuffed framing for UART-class links.
//!
//! Every packet travels as:
//! - a HEAD control byte tagging sender byte order and CRC presence
//! - a folded length byte and a raw command byte (service, subfunction, status)
//! - the payload (and optional CRC) with windowed escaping of control-looking bytes
//! - a TAIL control byte that must agree with the HEAD
//!
//! Decoding happens one byte at a time so it can sit behind a UART interrupt.

pub mod bits;
pub mod buffer;
pub mod codec;
pub mod crc;
pub mod error;
#[cfg(feature = "async")]
pub mod framed;
pub mod packet;
pub mod reader;
pub mod writer;

pub use buffer::FrameBuffer;
pub use codec::{
    encode_frame, encode_parts, encode_to_bytes, max_frame_size, FrameConfig, FrameDecoder,
    DEFAULT_MAX_PAYLOAD, OVERHEAD,
};
pub use crc::{Checksum, Crc8};
pub use error::{FrameError, Result};
#[cfg(feature = "async")]
pub use framed::LinkCodec;
pub use packet::{
    native_byte_order, read_u32, write_u32, ByteOrder, Command, Packet, ServiceId, Status,
    Subfunction, SERVICE_COUNT,
};
pub use reader::FrameReader;
pub use writer::FrameWriter;
