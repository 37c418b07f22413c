//! Two endpoints joined back to back: one reads memory from the other.
//!
//! Run with:
//!   cargo run --example loopback
//!
//! The requester announces a read, the responder answers with a Pending
//! frame, and the requester pulls the held response in small chunks.

use std::sync::mpsc;

use framelink::endpoint::{Action, Event, MemoryImage, ReadMemoryService};
use framelink::frame::write_u32;
use framelink::{native_byte_order, Endpoint, EndpointConfig, ServiceId, Subfunction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Idle,
    Busy,
}

fn table(state: Link, action: Action, event: Event) -> Link {
    match (action, event) {
        (Action::During, Event::RequestReceived) => Link::Busy,
        (Action::During, Event::TxConfirmation) => Link::Idle,
        _ => state,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EndpointConfig::default();
    let memory = MemoryImage::new(0x0800_0000, b"framelink".to_vec());

    let mut responder = Endpoint::new(config, Link::Idle, table)?.with_service(
        ServiceId::READ_MEMORY,
        ReadMemoryService::new(memory, config.byte_order),
    );

    let (pull_tx, pull_rx) = mpsc::channel();
    let (done_tx, done_rx) = mpsc::channel();
    let mut requester = Endpoint::new(config, Link::Idle, table)?
        .with_requester(move |count: u8| {
            let _ = pull_tx.send(count);
        })
        .with_consumer(
            move |service: ServiceId, _: Subfunction, payload: &[u8], ok: bool| {
                let _ = done_tx.send((service, payload.to_vec(), ok));
            },
        );

    let address = write_u32(0x0800_0005, native_byte_order(), config.byte_order);
    let request = requester.build_request(0, 1, &address, true)?;
    eprintln!("request: {request:02X?}");

    responder.receive_bytes(request)?;
    responder.run_pending_work()?;

    if let Some(wait) = responder.take_outbound() {
        eprintln!("pending: {wait:02X?}");
        requester.receive_bytes(wait)?;
        requester.run_pending_work()?;
    }

    let announced = pull_rx.recv()?;
    let mut pulled = 0usize;
    while pulled < usize::from(announced) {
        let chunk = responder.read_response(3)?;
        pulled += chunk.len();
        requester.receive_bytes(chunk)?;
    }
    responder.transmit_complete()?;
    responder.run_pending_work()?;
    requester.run_pending_work()?;

    let (service, payload, ok) = done_rx.recv()?;
    eprintln!(
        "service {service} answered {} with {:?}",
        if ok { "positive" } else { "negative" },
        String::from_utf8_lossy(&payload)
    );
    Ok(())
}
