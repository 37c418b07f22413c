use std::fmt;
use std::sync::Arc;

use framelink_frame::bits::MAX_LENGTH;
use framelink_frame::{
    encode_parts, max_frame_size, ByteOrder, Checksum, Command, Crc8, FrameBuffer, FrameError,
    Packet, Status,
};
use tracing::{debug, trace};

use crate::error::Result;
use crate::host::{ByteRequester, LogOnly, ResponseConsumer};
use crate::service::{ResponsePayload, ServiceTable};

/// Routes decoded packets through the request/response lifecycle.
///
/// A Request is answered in two phases: the full response frame is built
/// and held, and a short Pending frame announcing its wire length is queued
/// for transmission. The peer then pulls the held frame with
/// [`Dispatcher::read_response`].
///
/// Both frames live in buffers sized at construction and rewritten in place
/// for every request.
pub struct Dispatcher {
    table: ServiceTable,
    response: ResponsePayload,
    send: FrameBuffer,
    held: bool,
    cursor: usize,
    wait: FrameBuffer,
    wait_queued: bool,
    reference: ByteOrder,
    checksum: Arc<dyn Checksum>,
    requester: Box<dyn ByteRequester>,
    consumer: Box<dyn ResponseConsumer>,
}

impl Dispatcher {
    /// Create a dispatcher whose responses carry at most `max_payload` bytes
    /// and are tagged with `reference` byte order.
    pub fn new(max_payload: usize, reference: ByteOrder) -> Self {
        let max_payload = max_payload.min(usize::from(MAX_LENGTH));
        Self {
            table: ServiceTable::new(),
            response: ResponsePayload::new(max_payload),
            send: FrameBuffer::new(max_frame_size(max_payload, true)),
            held: false,
            cursor: 0,
            // a Pending frame carries one length byte and never a CRC
            wait: FrameBuffer::new(max_frame_size(1, false)),
            wait_queued: false,
            reference,
            checksum: Arc::new(Crc8),
            requester: Box::new(LogOnly),
            consumer: Box::new(LogOnly),
        }
    }

    pub fn table(&self) -> &ServiceTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut ServiceTable {
        &mut self.table
    }

    pub fn set_requester(&mut self, requester: impl ByteRequester + 'static) {
        self.requester = Box::new(requester);
    }

    pub fn set_consumer(&mut self, consumer: impl ResponseConsumer + 'static) {
        self.consumer = Box::new(consumer);
    }

    pub fn set_checksum(&mut self, checksum: Arc<dyn Checksum>) {
        self.checksum = checksum;
    }

    /// Byte order stamped on outgoing responses and used to reconcile
    /// incoming multi-byte fields.
    pub fn reference(&self) -> ByteOrder {
        self.reference
    }

    /// Act on one decoded packet. `crc` tells whether its frame carried a CRC.
    pub fn handle(&mut self, packet: &Packet, crc: bool) -> Result<()> {
        match packet.status {
            Status::Request => self.respond(packet, crc),
            Status::Pending => {
                match packet.payload.first() {
                    Some(&count) => self.requester.request_bytes(count),
                    None => trace!(service = packet.service.get(), "empty pending packet"),
                }
                Ok(())
            }
            Status::PositiveResponse | Status::NegativeResponse => {
                self.consumer.on_response(
                    packet.service,
                    packet.subfunction,
                    &packet.payload,
                    packet.status == Status::PositiveResponse,
                );
                Ok(())
            }
        }
    }

    fn respond(&mut self, request: &Packet, crc: bool) -> Result<()> {
        self.response.clear();
        let status = match self.table.handle(request, &mut self.response) {
            Ok(()) => Status::PositiveResponse,
            Err(err) => {
                debug!(service = request.service.get(), error = %err, "request refused");
                self.response.clear();
                Status::NegativeResponse
            }
        };

        if self.held {
            debug!("replacing unread response");
        }
        self.held = false;
        self.cursor = 0;
        self.wait_queued = false;

        let reply = Command {
            service: request.service,
            subfunction: request.subfunction,
            status,
        };
        let checksum = crc.then_some(self.checksum.as_ref());
        encode_parts(
            reply,
            self.reference,
            self.response.as_slice(),
            checksum,
            &mut self.send,
        )?;

        let wire_len = u8::try_from(self.send.len()).map_err(|_| FrameError::FrameTooLarge {
            capacity: usize::from(u8::MAX),
        })?;
        let pending = Command {
            status: Status::Pending,
            ..reply
        };
        encode_parts(pending, self.reference, &[wire_len], None, &mut self.wait)?;

        self.held = true;
        self.wait_queued = true;
        debug!(
            service = request.service.get(),
            status = status.as_str(),
            wire_len,
            "response held"
        );
        Ok(())
    }

    /// The Pending frame waiting to be transmitted, if any. Each frame is
    /// handed out once.
    pub fn take_outbound(&mut self) -> Option<&[u8]> {
        if !std::mem::take(&mut self.wait_queued) {
            return None;
        }
        Some(self.wait.as_slice())
    }

    /// Pull up to `count` bytes of the held response frame.
    ///
    /// The frame is released once its last byte has been read. Returns `None`
    /// when no response is held.
    pub fn read_response(&mut self, count: usize) -> Option<&[u8]> {
        if !self.held {
            return None;
        }
        let start = self.cursor;
        let end = self.send.len().min(start.saturating_add(count));
        self.cursor = end;
        if end == self.send.len() {
            self.held = false;
            self.cursor = 0;
        }
        self.send.as_slice().get(start..end)
    }

    /// Bytes of the held response not yet pulled.
    pub fn held_remaining(&self) -> usize {
        if self.held {
            self.send.len() - self.cursor
        } else {
            0
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("table", &self.table)
            .field("reference", &self.reference)
            .field("held_remaining", &self.held_remaining())
            .field("outbound", &self.wait_queued)
            .finish()
    }
}
