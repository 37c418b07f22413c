use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// A fixed-capacity byte region with a current length.
///
/// The backing storage is allocated once and rewritten in place; the
/// capacity never grows and every write is checked against it. Views handed
/// out by [`FrameBuffer::split_frozen`] share that storage, and
/// [`FrameBuffer::clear`] takes it back once they have all been dropped.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    data: BytesMut,
    capacity: usize,
}

impl FrameBuffer {
    /// Create an empty buffer able to hold `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one byte.
    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.data.len() >= self.capacity {
            return Err(FrameError::FrameTooLarge {
                capacity: self.capacity,
            });
        }
        self.data.put_u8(byte);
        Ok(())
    }

    /// Append a slice, all or nothing.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<()> {
        if self.remaining() < bytes.len() {
            return Err(FrameError::FrameTooLarge {
                capacity: self.capacity,
            });
        }
        self.data.put_slice(bytes);
        Ok(())
    }

    /// Mutable access to an already written byte.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut u8> {
        self.data.get_mut(index)
    }

    /// Reset the length to zero, keeping the allocation.
    ///
    /// Storage lent out through [`FrameBuffer::split_frozen`] is reclaimed
    /// here when no view of it is alive; otherwise a fresh region is set up.
    pub fn clear(&mut self) {
        self.data.clear();
        self.data.reserve(self.capacity);
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fixed capacity chosen at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes that can still be written.
    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// The written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Detach the written bytes and return `len` of them starting at `start`
    /// as a read-only view over the same storage. The buffer is left empty.
    pub fn split_frozen(&mut self, start: usize, len: usize) -> Bytes {
        let mut taken = self.data.split();
        let end = start.saturating_add(len).min(taken.len());
        taken.truncate(end);
        taken.advance(start.min(end));
        taken.freeze()
    }

    /// Turn the written bytes into [`Bytes`] without copying.
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }
}

impl AsRef<[u8]> for FrameBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
