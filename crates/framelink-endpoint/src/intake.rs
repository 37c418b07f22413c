use std::sync::mpsc::{Receiver, SyncSender, TrySendError};

use crate::error::{EndpointError, Result};

/// Producer half of the byte intake channel.
///
/// Hand this to the context that receives bytes asynchronously (a UART
/// callback, a reader thread). It never blocks: bytes are queued and decoded
/// later by the endpoint's `run_pending_work`.
#[derive(Debug, Clone)]
pub struct ByteIntake {
    tx: SyncSender<u8>,
}

impl ByteIntake {
    pub(crate) fn channel(capacity: usize) -> (Self, Receiver<u8>) {
        let (tx, rx) = std::sync::mpsc::sync_channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue one byte. A full channel drops the byte and reports it.
    pub fn receive_byte(&self, byte: u8) -> Result<()> {
        self.tx.try_send(byte).map_err(|err| match err {
            TrySendError::Full(_) => EndpointError::IntakeFull,
            TrySendError::Disconnected(_) => EndpointError::IntakeDisconnected,
        })
    }

    /// Queue a run of bytes, stopping at the first one that does not fit.
    pub fn receive_bytes(&self, bytes: &[u8]) -> Result<()> {
        bytes.iter().try_for_each(|&byte| self.receive_byte(byte))
    }
}
