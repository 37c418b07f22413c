//! Event-driven framelink endpoint.
//!
//! Bytes arriving from the transport are decoded one at a time. Each
//! complete packet raises an event on a bounded stack. A host-supplied
//! state table consumes the stack via [`Endpoint::run_pending_work`],
//! which is also where requests are dispatched to the service table and
//! answered with the Pending handshake.

pub mod config;
pub mod dispatch;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod host;
pub mod intake;
pub mod memory;
pub mod service;

pub use config::{EndpointConfig, MAX_PAYLOAD_LIMIT};
pub use dispatch::Dispatcher;
pub use driver::{Action, Driver, StateTable};
pub use endpoint::Endpoint;
pub use error::{EndpointError, EventError, Result, ServiceError};
pub use event::{Event, EventStack, Push};
pub use framelink_frame::native_byte_order;
pub use host::{ByteRequester, LogOnly, ResponseConsumer};
pub use intake::ByteIntake;
pub use memory::{MemoryAccessor, MemoryImage, ReadMemoryService, READ_BYTE, READ_WORD};
pub use service::{NullService, ResponsePayload, Service, ServiceTable};
