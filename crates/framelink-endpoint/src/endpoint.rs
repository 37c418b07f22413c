use std::fmt::{self, Debug};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use framelink_frame::{
    encode_parts, max_frame_size, Checksum, Command, Crc8, FrameBuffer, FrameDecoder, FrameError,
    Packet, ServiceId, Status, Subfunction,
};
use tracing::{debug, warn};

use crate::config::EndpointConfig;
use crate::dispatch::Dispatcher;
use crate::driver::{Driver, StateTable};
use crate::error::{EndpointError, Result};
use crate::event::{Event, EventStack, Push};
use crate::host::{ByteRequester, ResponseConsumer};
use crate::intake::ByteIntake;
use crate::service::{Service, ServiceTable};

/// One side of a framelink link.
///
/// Owns the decoder, the inbound packet slot, the event stack, the state
/// machine driver and the dispatcher. Received bytes only raise events;
/// dispatch happens when the owner calls [`Endpoint::run_pending_work`].
///
/// Outgoing frames are encoded into buffers allocated in [`Endpoint::new`]
/// and handed out as borrowed slices.
pub struct Endpoint<S, T> {
    config: EndpointConfig,
    decoder: FrameDecoder,
    request: FrameBuffer,
    inbound: Option<(Packet, bool)>,
    events: EventStack,
    driver: Driver<S, T>,
    dispatcher: Dispatcher,
    checksum: Arc<dyn Checksum>,
    intake_tx: Option<ByteIntake>,
    intake_rx: Option<Receiver<u8>>,
}

impl<S, T> Endpoint<S, T>
where
    S: Copy + PartialEq + Debug,
    T: StateTable<S>,
{
    /// Validate `config`, build every component and run the initial state's
    /// `Entry` action.
    pub fn new(config: EndpointConfig, initial: S, table: T) -> Result<Self> {
        config.validate()?;
        let checksum: Arc<dyn Checksum> = Arc::new(Crc8);
        let mut driver = Driver::new(initial, table);
        driver.start();
        Ok(Self {
            decoder: FrameDecoder::with_checksum(config.max_payload_size, Arc::clone(&checksum)),
            request: FrameBuffer::new(max_frame_size(config.max_payload_size, true)),
            inbound: None,
            events: EventStack::new(config.event_stack_capacity)?,
            driver,
            dispatcher: Dispatcher::new(config.max_payload_size, config.byte_order),
            checksum,
            intake_tx: None,
            intake_rx: None,
            config,
        })
    }

    /// Register a service handler.
    pub fn with_service(mut self, id: ServiceId, service: impl Service + 'static) -> Self {
        self.dispatcher.table_mut().insert(id, service);
        self
    }

    /// Set the collaborator notified when a peer announces a pending response.
    pub fn with_requester(mut self, requester: impl ByteRequester + 'static) -> Self {
        self.dispatcher.set_requester(requester);
        self
    }

    /// Set the collaborator receiving terminal responses.
    pub fn with_consumer(mut self, consumer: impl ResponseConsumer + 'static) -> Self {
        self.dispatcher.set_consumer(consumer);
        self
    }

    /// Replace the CRC algorithm for both directions.
    pub fn with_checksum(mut self, checksum: Arc<dyn Checksum>) -> Self {
        self.decoder =
            FrameDecoder::with_checksum(self.config.max_payload_size, Arc::clone(&checksum));
        self.dispatcher.set_checksum(Arc::clone(&checksum));
        self.checksum = checksum;
        self
    }

    pub fn services_mut(&mut self) -> &mut ServiceTable {
        self.dispatcher.table_mut()
    }

    /// Feed one received byte.
    ///
    /// A completed packet is stored and `RequestReceived` is raised; nothing
    /// is dispatched here. Errors report an oversized frame or a full event
    /// stack.
    pub fn receive_byte(&mut self, byte: u8) -> Result<()> {
        match self.decoder.feed(byte) {
            Ok(Some(packet)) => self.accept(packet),
            Ok(None) => Ok(()),
            Err(err) => {
                warn!(error = %err, "inbound frame discarded");
                Err(err.into())
            }
        }
    }

    /// Feed a run of bytes. Every byte is consumed; the first error is
    /// returned afterwards.
    pub fn receive_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut first = None;
        for &byte in bytes {
            if let Err(err) = self.receive_byte(byte) {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn accept(&mut self, packet: Packet) -> Result<()> {
        debug!(
            service = packet.service.get(),
            subfunction = packet.subfunction.get(),
            status = packet.status.as_str(),
            "packet received"
        );
        // a packet is only parked once an event exists to dispatch it
        self.raise(Event::RequestReceived)?;
        if self.inbound.is_some() {
            debug!("unprocessed inbound packet overwritten");
        }
        self.inbound = Some((packet, self.decoder.last_had_crc()));
        Ok(())
    }

    fn raise(&mut self, event: Event) -> Result<Push> {
        self.events.push(event).map_err(|err| {
            warn!(error = %err, "event dropped");
            EndpointError::from(err)
        })
    }

    /// Encode a Request frame tagged with this endpoint's byte order.
    ///
    /// The frame is written into the endpoint's request buffer, which the
    /// next call overwrites.
    pub fn build_request(
        &mut self,
        service: u8,
        subfunction: u8,
        payload: &[u8],
        use_crc: bool,
    ) -> Result<&[u8]> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            }
            .into());
        }
        let command = Command {
            service: ServiceId::new(service)?,
            subfunction: Subfunction::new(subfunction)?,
            status: Status::Request,
        };
        let checksum = use_crc.then_some(self.checksum.as_ref());
        encode_parts(
            command,
            self.config.byte_order,
            payload,
            checksum,
            &mut self.request,
        )?;
        Ok(self.request.as_slice())
    }

    /// Process queued intake bytes, then drain the event stack through the
    /// driver. Returns the number of events applied.
    ///
    /// Events are drained after every packet completed from the intake so a
    /// later packet in the same batch cannot overwrite an undispatched one.
    pub fn run_pending_work(&mut self) -> Result<usize> {
        let mut applied = 0usize;
        let mut first = None;

        if let Some(rx) = self.intake_rx.take() {
            for byte in rx.try_iter().take(self.config.intake_capacity) {
                if let Err(err) = self.receive_byte(byte) {
                    first.get_or_insert(err);
                }
                if self.inbound.is_some() {
                    match self.drain_events() {
                        Ok(n) => applied += n,
                        Err(err) => {
                            first.get_or_insert(err);
                        }
                    }
                }
            }
            self.intake_rx = Some(rx);
        }

        match self.drain_events() {
            Ok(n) => applied += n,
            Err(err) => {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(applied), Err)
    }

    fn drain_events(&mut self) -> Result<usize> {
        let Self {
            driver,
            events,
            inbound,
            dispatcher,
            ..
        } = self;
        driver.drain(events, |event| match event {
            Event::RequestReceived => match inbound.take() {
                Some((packet, crc)) => dispatcher.handle(&packet, crc),
                None => Ok(()),
            },
            Event::TxConfirmation | Event::Idle => Ok(()),
        })
    }

    /// Signal that the transport finished sending the last outbound frame.
    pub fn transmit_complete(&mut self) -> Result<Push> {
        self.raise(Event::TxConfirmation)
    }

    /// The Pending frame queued by the last request, if not yet taken.
    pub fn take_outbound(&mut self) -> Option<&[u8]> {
        self.dispatcher.take_outbound()
    }

    /// Pull up to `count` bytes of the held response frame.
    pub fn read_response(&mut self, count: usize) -> Result<&[u8]> {
        self.dispatcher
            .read_response(count)
            .ok_or(EndpointError::NoHeldResponse)
    }

    /// Producer handle for an asynchronous byte source.
    ///
    /// The channel is created on first use with `intake_capacity` slots;
    /// later calls return clones of the same producer.
    pub fn intake(&mut self) -> ByteIntake {
        if let Some(tx) = &self.intake_tx {
            return tx.clone();
        }
        let (tx, rx) = ByteIntake::channel(self.config.intake_capacity);
        self.intake_tx = Some(tx.clone());
        self.intake_rx = Some(rx);
        tx
    }

    /// Current state of the driver.
    pub fn state(&self) -> S {
        self.driver.current()
    }

    pub fn events(&self) -> &EventStack {
        &self.events
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn state_table(&self) -> &T {
        self.driver.table()
    }
}

impl<S: Debug, T> fmt::Debug for Endpoint<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("config", &self.config)
            .field("events", &self.events)
            .field("inbound", &self.inbound.is_some())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
