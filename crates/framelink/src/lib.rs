//! Self-delimiting request/response framing for UART-class links.
//!
//! framelink turns service requests into byte-stuffed frames that survive a
//! boundary-less serial stream, and answers them through a two-phase
//! "announce length, then pull bytes" handshake.
//!
//! # Crate Structure
//!
//! - [`frame`]: wire codec, packet model, CRC and stream adapters
//! - [`endpoint`]: event stack, state machine driver, service dispatch

/// Re-export frame types.
pub mod frame {
    pub use framelink_frame::*;
}

/// Re-export endpoint types.
pub mod endpoint {
    pub use framelink_endpoint::*;
}

pub use framelink_endpoint::{native_byte_order, Endpoint, EndpointConfig, EndpointError};
pub use framelink_frame::{ByteOrder, FrameError, Packet, ServiceId, Status, Subfunction};
