/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A write would run past the end of a fixed-capacity frame buffer.
    #[error("frame exceeds buffer capacity of {capacity} bytes")]
    FrameTooLarge { capacity: usize },

    /// Service ids are limited to 0..=7.
    #[error("invalid service id {0} (expected 0..=7)")]
    InvalidService(u8),

    /// Subfunctions are limited to 0..=3.
    #[error("invalid subfunction {0} (expected 0..=3)")]
    InvalidSubfunction(u8),

    /// The command byte has its reserved bit set.
    #[error("invalid command byte {0:#04x}")]
    InvalidCommand(u8),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
