use std::path::Path;

use framelink_frame::{native_byte_order, ByteOrder, DEFAULT_MAX_PAYLOAD};
use serde::{Deserialize, Serialize};

use crate::error::{EndpointError, Result};

/// Largest payload the length byte can describe.
pub const MAX_PAYLOAD_LIMIT: usize = 127;

/// Tunables for an [`Endpoint`](crate::Endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Maximum payload size in bytes (1..=127).
    pub max_payload_size: usize,
    /// Event stack slots, including the idle sentinel (at least 2).
    pub event_stack_capacity: usize,
    /// Reference byte order for responses and address reconciliation.
    pub byte_order: ByteOrder,
    /// Bytes the intake channel buffers before reporting full.
    pub intake_capacity: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            event_stack_capacity: 8,
            byte_order: native_byte_order(),
            intake_capacity: 256,
        }
    }
}

impl EndpointConfig {
    /// Check every field is in range.
    pub fn validate(&self) -> Result<()> {
        if self.max_payload_size == 0 || self.max_payload_size > MAX_PAYLOAD_LIMIT {
            return Err(EndpointError::InvalidConfig(format!(
                "max_payload_size must be 1..={MAX_PAYLOAD_LIMIT}, got {}",
                self.max_payload_size
            )));
        }
        if self.event_stack_capacity < 2 {
            return Err(EndpointError::InvalidConfig(format!(
                "event_stack_capacity must be at least 2, got {}",
                self.event_stack_capacity
            )));
        }
        if self.intake_capacity == 0 {
            return Err(EndpointError::InvalidConfig(
                "intake_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
