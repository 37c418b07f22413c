use framelink_frame::{FrameError, ServiceId, Subfunction};

use crate::event::Event;

/// Errors that can occur in endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Event stack error.
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// The byte intake channel is full; the byte was dropped.
    #[error("byte intake full")]
    IntakeFull,

    /// The endpoint owning the intake channel is gone.
    #[error("byte intake disconnected")]
    IntakeDisconnected,

    /// No response frame is waiting to be pulled.
    #[error("no response held for retrieval")]
    NoHeldResponse,

    /// Configuration values out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while loading configuration.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the event stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// Every usable slot is taken; the event was not stored.
    #[error("event stack full ({capacity} slots), dropped {event:?}")]
    StackFull { event: Event, capacity: usize },

    /// A stack needs its sentinel slot plus at least one usable slot.
    #[error("event stack capacity must be at least 2, got {0}")]
    CapacityTooSmall(usize),
}

/// Why a service handler refused a request.
///
/// Every variant turns into a NegativeResponse; none is a local fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// No handler is registered under this id.
    #[error("service {0} is not populated")]
    Unpopulated(ServiceId),

    /// The handler does not implement this subfunction.
    #[error("subfunction {0} not supported")]
    UnsupportedSubfunction(Subfunction),

    /// The request payload is shorter than the handler needs.
    #[error("request payload too short ({len} bytes, need {need})")]
    ShortRequest { len: usize, need: usize },

    /// The memory accessor has no readable bytes at this address.
    #[error("address {0:#010x} is not readable")]
    Unmapped(u32),

    /// The handler tried to write more than the response buffer holds.
    #[error("response exceeds {capacity} bytes")]
    ResponseTooLarge { capacity: usize },
}

pub type Result<T> = std::result::Result<T, EndpointError>;
