use crate::error::EventError;

/// Signals raised by byte intake and transmit completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Event {
    /// Nothing pending. Returned by [`EventStack::pop`] on an empty stack.
    #[default]
    Idle,
    /// A complete, valid frame was decoded and is waiting to be dispatched.
    RequestReceived,
    /// The transport finished sending the last outbound frame.
    TxConfirmation,
}

/// Outcome of [`EventStack::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Stored,
    /// Equal to the current top; collapsed.
    Duplicate,
    /// `Idle` is the empty-stack sentinel and is never stored.
    Ignored,
}

/// Bounded LIFO of pending events.
///
/// Slot 0 permanently holds the `Idle` sentinel, so a stack of capacity C
/// keeps at most C - 1 live events. Only an event equal to the current top
/// is collapsed; the same event further down is stored again.
#[derive(Debug, Clone)]
pub struct EventStack {
    slots: Box<[Event]>,
    len: usize,
}

impl EventStack {
    /// Create a stack with `capacity` slots, one of which is the sentinel.
    pub fn new(capacity: usize) -> Result<Self, EventError> {
        if capacity < 2 {
            return Err(EventError::CapacityTooSmall(capacity));
        }
        Ok(Self {
            slots: vec![Event::Idle; capacity].into_boxed_slice(),
            len: 0,
        })
    }

    /// Store `event` unless the stack is full or `event` equals the top.
    pub fn push(&mut self, event: Event) -> Result<Push, EventError> {
        if event == Event::Idle {
            return Ok(Push::Ignored);
        }
        if self.is_full() {
            return Err(EventError::StackFull {
                event,
                capacity: self.slots.len(),
            });
        }
        if self.slots[self.len] == event {
            return Ok(Push::Duplicate);
        }
        self.len += 1;
        self.slots[self.len] = event;
        Ok(Push::Stored)
    }

    /// Remove and return the top event, or `Idle` when empty.
    pub fn pop(&mut self) -> Event {
        if self.len == 0 {
            return Event::Idle;
        }
        let event = self.slots[self.len];
        self.len -= 1;
        event
    }

    /// The top event without removing it (`Idle` when empty).
    pub fn peek(&self) -> Event {
        self.slots[self.len]
    }

    /// Number of live events.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len() - 1
    }

    /// Total slots, including the sentinel.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
