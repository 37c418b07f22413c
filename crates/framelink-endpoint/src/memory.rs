//! Reference read-memory service (service id 0).

use bytes::Bytes;
use framelink_frame::{read_u32, ByteOrder, Packet};
use tracing::debug;

use crate::error::ServiceError;
use crate::service::{ResponsePayload, Service};

/// Subfunction reading a 4-byte word.
pub const READ_WORD: u8 = 1;
/// Subfunction reading a single byte.
pub const READ_BYTE: u8 = 2;

const ADDRESS_LEN: usize = 4;

/// Checked access to the memory a read request may target.
pub trait MemoryAccessor: Send {
    /// Bytes readable from `address` to the end of its region, if mapped.
    fn resolve(&self, address: u32) -> Option<&[u8]>;
}

/// A contiguous block of bytes mapped at `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    base: u32,
    bytes: Bytes,
}

impl MemoryImage {
    pub fn new(base: u32, bytes: impl Into<Bytes>) -> Self {
        Self {
            base,
            bytes: bytes.into(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl MemoryAccessor for MemoryImage {
    fn resolve(&self, address: u32) -> Option<&[u8]> {
        let offset = usize::try_from(address.checked_sub(self.base)?).ok()?;
        self.bytes.get(offset..)
    }
}

/// Serves subfunction 1 (read word) and 2 (read byte).
///
/// The first four request bytes hold the address in the sender's declared
/// byte order; they are reconciled against `reference` before lookup.
#[derive(Debug)]
pub struct ReadMemoryService<M> {
    memory: M,
    reference: ByteOrder,
}

impl<M: MemoryAccessor> ReadMemoryService<M> {
    pub fn new(memory: M, reference: ByteOrder) -> Self {
        Self { memory, reference }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }
}

impl<M: MemoryAccessor> Service for ReadMemoryService<M> {
    fn handle(
        &mut self,
        request: &Packet,
        response: &mut ResponsePayload,
    ) -> Result<(), ServiceError> {
        let width = match request.subfunction.get() {
            READ_WORD => 4,
            READ_BYTE => 1,
            _ => return Err(ServiceError::UnsupportedSubfunction(request.subfunction)),
        };

        let address: [u8; ADDRESS_LEN] = request
            .payload
            .get(..ADDRESS_LEN)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(ServiceError::ShortRequest {
                len: request.payload.len(),
                need: ADDRESS_LEN,
            })?;
        let address = read_u32(address, request.byte_order, self.reference);

        let bytes = self
            .memory
            .resolve(address)
            .and_then(|region| region.get(..width))
            .ok_or(ServiceError::Unmapped(address))?;

        debug!(address, width, "read memory");
        response.extend_from_slice(bytes)
    }
}
