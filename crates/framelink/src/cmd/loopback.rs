use std::fs;
use std::sync::mpsc;

use framelink_endpoint::{
    Action, Endpoint, EndpointConfig, Event, MemoryImage, ReadMemoryService, MAX_PAYLOAD_LIMIT,
};
use framelink_frame::{write_u32, ByteOrder, ServiceId, Subfunction};
use tracing::{debug, info};

use crate::cmd::{parse_u32, LoopbackArgs};
use crate::exit::{endpoint_error, io_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_loopback, to_hex, LoopbackReport, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Listening,
    Responding,
}

fn link_table(state: LinkState, action: Action, event: Event) -> LinkState {
    match (state, action, event) {
        (_, Action::Entry, _) => {
            debug!(?state, "entering");
            state
        }
        (LinkState::Listening, Action::During, Event::RequestReceived) => LinkState::Responding,
        (LinkState::Responding, Action::During, Event::TxConfirmation) => LinkState::Listening,
        _ => state,
    }
}

type LinkTable = fn(LinkState, Action, Event) -> LinkState;

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk == 0 {
        return Err(CliError::new(USAGE, "--chunk must be at least 1"));
    }
    let base = parse_u32(&args.base)?;
    let address = parse_u32(&args.address)?;
    let image = fs::read(&args.image)
        .map_err(|err| io_error(&format!("failed reading {}", args.image.display()), err))?;
    let config = match &args.config {
        Some(path) => EndpointConfig::from_path(path)
            .map_err(|err| endpoint_error(&format!("failed loading {}", path.display()), err))?,
        None => EndpointConfig::default(),
    };
    let requester_order = if args.big_endian {
        ByteOrder::Big
    } else {
        config.byte_order
    };

    let (pull_tx, pull_rx) = mpsc::channel::<u8>();
    let (response_tx, response_rx) = mpsc::channel::<(Vec<u8>, bool)>();

    let service = ReadMemoryService::new(MemoryImage::new(base, image), config.byte_order);
    let mut responder = Endpoint::new(config, LinkState::Listening, link_table as LinkTable)
        .map_err(|err| endpoint_error("responder setup failed", err))?
        .with_service(ServiceId::READ_MEMORY, service);

    let requester_config = EndpointConfig {
        byte_order: requester_order,
        max_payload_size: MAX_PAYLOAD_LIMIT,
        ..config
    };
    let mut requester =
        Endpoint::new(requester_config, LinkState::Listening, link_table as LinkTable)
            .map_err(|err| endpoint_error("requester setup failed", err))?
            .with_requester(move |count: u8| {
                let _ = pull_tx.send(count);
            })
            .with_consumer(
                move |_: ServiceId, _: Subfunction, payload: &[u8], success: bool| {
                    let _ = response_tx.send((payload.to_vec(), success));
                },
            );

    // request: requester -> responder, delivered through the responder's intake
    let payload = write_u32(address, requester_order, config.byte_order);
    let request = requester
        .build_request(ServiceId::READ_MEMORY.get(), args.subfunction, &payload, args.crc)
        .map_err(|err| endpoint_error("building request failed", err))?;
    let request_size = request.len();
    responder
        .intake()
        .receive_bytes(request)
        .map_err(|err| endpoint_error("responder intake", err))?;
    responder
        .run_pending_work()
        .map_err(|err| endpoint_error("responder dispatch failed", err))?;

    // pending: responder -> requester
    let wait = responder
        .take_outbound()
        .ok_or_else(|| CliError::new(FAILURE, "responder queued no pending frame"))?;
    requester
        .receive_bytes(wait)
        .map_err(|err| endpoint_error("requester receive failed", err))?;
    requester
        .run_pending_work()
        .map_err(|err| endpoint_error("requester dispatch failed", err))?;
    let announced = pull_rx
        .try_recv()
        .map_err(|_| CliError::new(FAILURE, "requester saw no pending announcement"))?;
    info!(announced, "pending response announced");

    // pull: the requester reads exactly the announced number of bytes
    let mut remaining = usize::from(announced);
    while remaining > 0 {
        let chunk = responder
            .read_response(args.chunk.min(remaining))
            .map_err(|err| endpoint_error("pulling response failed", err))?;
        remaining -= chunk.len();
        requester
            .receive_bytes(chunk)
            .map_err(|err| endpoint_error("requester receive failed", err))?;
    }
    responder
        .transmit_complete()
        .map_err(|err| endpoint_error("responder tx confirmation", err))?;
    responder
        .run_pending_work()
        .map_err(|err| endpoint_error("responder dispatch failed", err))?;
    requester
        .run_pending_work()
        .map_err(|err| endpoint_error("requester dispatch failed", err))?;

    let (bytes, success) = response_rx
        .try_recv()
        .map_err(|_| CliError::new(FAILURE, "no response decoded"))?;

    let report = LoopbackReport {
        address: format!("{address:#010x}"),
        subfunction: args.subfunction,
        success,
        announced_size: announced,
        request_size,
        payload: to_hex(&bytes),
        responder_state: format!("{:?}", responder.state()),
    };
    print_loopback(&report, &bytes, format);
    Ok(if success { SUCCESS } else { FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_follows_request_and_confirmation() {
        let state = link_table(LinkState::Listening, Action::During, Event::RequestReceived);
        assert_eq!(state, LinkState::Responding);
        let state = link_table(state, Action::During, Event::RequestReceived);
        assert_eq!(state, LinkState::Responding);
        let state = link_table(state, Action::During, Event::TxConfirmation);
        assert_eq!(state, LinkState::Listening);
        assert_eq!(
            link_table(LinkState::Responding, Action::Entry, Event::Idle),
            LinkState::Responding
        );
    }
}
