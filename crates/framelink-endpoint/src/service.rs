use std::fmt;

use framelink_frame::{FrameBuffer, Packet, ServiceId, SERVICE_COUNT};

use crate::error::ServiceError;

/// A handler bound to one service id.
///
/// Returning `Ok` produces a PositiveResponse carrying whatever was written
/// to `response`; an error produces a NegativeResponse with an empty payload.
pub trait Service: Send {
    fn handle(&mut self, request: &Packet, response: &mut ResponsePayload)
        -> Result<(), ServiceError>;
}

impl<F> Service for F
where
    F: FnMut(&Packet, &mut ResponsePayload) -> Result<(), ServiceError> + Send,
{
    fn handle(
        &mut self,
        request: &Packet,
        response: &mut ResponsePayload,
    ) -> Result<(), ServiceError> {
        self(request, response)
    }
}

/// Placeholder for unpopulated table entries. Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullService;

impl Service for NullService {
    fn handle(&mut self, request: &Packet, _: &mut ResponsePayload) -> Result<(), ServiceError> {
        Err(ServiceError::Unpopulated(request.service))
    }
}

/// Response payload area handed to a service.
///
/// Allocated once with the endpoint's payload limit and reused for every
/// request; it never shares storage with the inbound frame.
#[derive(Debug)]
pub struct ResponsePayload {
    buf: FrameBuffer,
}

impl ResponsePayload {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: FrameBuffer::new(capacity),
        }
    }

    /// Append one byte.
    pub fn push(&mut self, byte: u8) -> Result<(), ServiceError> {
        self.buf.push(byte).map_err(|_| self.too_large())
    }

    /// Append a slice. Nothing is written if it does not fit.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), ServiceError> {
        self.buf.extend_from_slice(bytes).map_err(|_| self.too_large())
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_slice()
    }

    fn too_large(&self) -> ServiceError {
        ServiceError::ResponseTooLarge {
            capacity: self.buf.capacity(),
        }
    }
}

/// Eight handler slots indexed by [`ServiceId`].
#[derive(Default)]
pub struct ServiceTable {
    entries: [Option<Box<dyn Service>>; SERVICE_COUNT],
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` under `id`, returning the handler it replaces.
    pub fn insert(
        &mut self,
        id: ServiceId,
        service: impl Service + 'static,
    ) -> Option<Box<dyn Service>> {
        self.entries[id.index()].replace(Box::new(service))
    }

    /// Builder form of [`ServiceTable::insert`].
    pub fn with(mut self, id: ServiceId, service: impl Service + 'static) -> Self {
        self.insert(id, service);
        self
    }

    pub fn remove(&mut self, id: ServiceId) -> Option<Box<dyn Service>> {
        self.entries[id.index()].take()
    }

    pub fn is_populated(&self, id: ServiceId) -> bool {
        self.entries[id.index()].is_some()
    }

    /// Run the handler for `request.service`, or [`NullService`] if none.
    pub fn handle(
        &mut self,
        request: &Packet,
        response: &mut ResponsePayload,
    ) -> Result<(), ServiceError> {
        match self.entries[request.service.index()].as_mut() {
            Some(service) => service.handle(request, response),
            None => NullService.handle(request, response),
        }
    }
}

impl fmt::Debug for ServiceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let populated: Vec<u8> = ServiceId::all()
            .filter(|id| self.is_populated(*id))
            .map(ServiceId::get)
            .collect();
        f.debug_struct("ServiceTable")
            .field("populated", &populated)
            .finish()
    }
}
