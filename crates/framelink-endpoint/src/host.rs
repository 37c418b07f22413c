//! Host-side collaborators invoked by the dispatcher.

use framelink_frame::{ServiceId, Subfunction};
use tracing::debug;

/// Reacts to a peer's Pending announcement by pulling `count` bytes of the
/// held response (for example by sending a read request over the transport).
pub trait ByteRequester: Send {
    fn request_bytes(&mut self, count: u8);
}

impl<F> ByteRequester for F
where
    F: FnMut(u8) + Send,
{
    fn request_bytes(&mut self, count: u8) {
        self(count)
    }
}

/// Receives terminal responses.
pub trait ResponseConsumer: Send {
    fn on_response(
        &mut self,
        service: ServiceId,
        subfunction: Subfunction,
        payload: &[u8],
        success: bool,
    );
}

impl<F> ResponseConsumer for F
where
    F: FnMut(ServiceId, Subfunction, &[u8], bool) + Send,
{
    fn on_response(
        &mut self,
        service: ServiceId,
        subfunction: Subfunction,
        payload: &[u8],
        success: bool,
    ) {
        self(service, subfunction, payload, success)
    }
}

/// Default collaborator: logs and otherwise ignores what it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnly;

impl ByteRequester for LogOnly {
    fn request_bytes(&mut self, count: u8) {
        debug!(count, "peer announced pending response");
    }
}

impl ResponseConsumer for LogOnly {
    fn on_response(
        &mut self,
        service: ServiceId,
        subfunction: Subfunction,
        payload: &[u8],
        success: bool,
    ) {
        debug!(
            service = service.get(),
            subfunction = subfunction.get(),
            len = payload.len(),
            success,
            "response received"
        );
    }
}
