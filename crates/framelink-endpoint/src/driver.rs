use std::convert::Infallible;
use std::fmt::Debug;

use tracing::debug;

use crate::event::{Event, EventStack};

/// Which part of a state's behavior the table is asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Entry,
    During,
    Exit,
}

/// Externally supplied transition table.
///
/// Any `FnMut(S, Action, Event) -> S` closure is a table. For `Entry` and
/// `Exit` the returned state is ignored.
pub trait StateTable<S> {
    fn transition(&mut self, state: S, action: Action, event: Event) -> S;
}

impl<S, F> StateTable<S> for F
where
    F: FnMut(S, Action, Event) -> S,
{
    fn transition(&mut self, state: S, action: Action, event: Event) -> S {
        self(state, action, event)
    }
}

/// Feeds events to the table and tracks the current state.
#[derive(Debug)]
pub struct Driver<S, T> {
    current: S,
    table: T,
    started: bool,
}

impl<S, T> Driver<S, T>
where
    S: Copy + PartialEq + Debug,
    T: StateTable<S>,
{
    /// Create a driver sitting in `initial`. No action runs until [`Driver::start`].
    pub fn new(initial: S, table: T) -> Self {
        Self {
            current: initial,
            table,
            started: false,
        }
    }

    /// Run the initial state's `Entry` action once.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.table.transition(self.current, Action::Entry, Event::Idle);
    }

    /// The active state.
    pub fn current(&self) -> S {
        self.current
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut T {
        &mut self.table
    }

    /// Apply one event and adopt the state the table returns.
    pub fn step(&mut self, event: Event) -> S {
        let next = self.table.transition(self.current, Action::During, event);
        if next != self.current {
            debug!(from = ?self.current, to = ?next, ?event, "state change");
            self.table.transition(self.current, Action::Exit, event);
            self.table.transition(next, Action::Entry, event);
            self.current = next;
        }
        self.current
    }

    /// Pop events until the stack yields `Idle`, running `on_event` before
    /// each transition. Returns the number of events applied.
    ///
    /// An error from `on_event` stops the drain after that event's
    /// transition; later events stay on the stack.
    pub fn drain<E>(
        &mut self,
        stack: &mut EventStack,
        mut on_event: impl FnMut(Event) -> Result<(), E>,
    ) -> Result<usize, E> {
        let mut applied = 0usize;
        loop {
            let event = stack.pop();
            if event == Event::Idle {
                return Ok(applied);
            }
            let outcome = on_event(event);
            self.step(event);
            applied += 1;
            outcome?;
        }
    }

    /// [`Driver::drain`] without a hook.
    pub fn run(&mut self, stack: &mut EventStack) -> usize {
        match self.drain(stack, |_| Ok::<(), Infallible>(())) {
            Ok(applied) => applied,
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Link {
        Listening,
        Responding,
    }

    fn table(state: Link, action: Action, event: Event) -> Link {
        match (state, action, event) {
            (Link::Listening, Action::During, Event::RequestReceived) => Link::Responding,
            (Link::Responding, Action::During, Event::TxConfirmation) => Link::Listening,
            _ => state,
        }
    }

    #[test]
    fn drains_to_exhaustion() {
        let mut stack = EventStack::new(8).unwrap();
        stack.push(Event::TxConfirmation).unwrap();
        stack.push(Event::RequestReceived).unwrap();

        let mut driver = Driver::new(Link::Listening, table);
        assert_eq!(driver.run(&mut stack), 2);
        assert_eq!(driver.current(), Link::Listening);
        assert!(stack.is_empty());
        assert_eq!(driver.run(&mut stack), 0);
    }

    #[test]
    fn adopts_returned_state() {
        let mut driver = Driver::new(Link::Listening, table);
        assert_eq!(driver.step(Event::RequestReceived), Link::Responding);
        assert_eq!(driver.step(Event::RequestReceived), Link::Responding);
        assert_eq!(driver.step(Event::TxConfirmation), Link::Listening);
    }

    #[test]
    fn entry_and_exit_run_on_change_only() {
        let mut calls = Vec::new();
        let recording = |state: Link, action: Action, event: Event| {
            calls.push((state, action));
            table(state, action, event)
        };
        let mut driver = Driver::new(Link::Listening, recording);
        driver.start();
        driver.start();
        driver.step(Event::TxConfirmation);
        driver.step(Event::RequestReceived);
        drop(driver);

        assert_eq!(
            calls,
            vec![
                (Link::Listening, Action::Entry),
                (Link::Listening, Action::During),
                (Link::Listening, Action::During),
                (Link::Listening, Action::Exit),
                (Link::Responding, Action::Entry),
            ]
        );
    }

    #[test]
    fn hook_runs_before_transition_and_errors_stop_drain() {
        let mut stack = EventStack::new(8).unwrap();
        stack.push(Event::RequestReceived).unwrap();
        stack.push(Event::TxConfirmation).unwrap();

        let mut seen = Vec::new();
        let mut driver = Driver::new(Link::Responding, table);
        let result = driver.drain(&mut stack, |event| {
            seen.push(event);
            if event == Event::TxConfirmation {
                Err("boom")
            } else {
                Ok(())
            }
        });

        assert_eq!(result, Err("boom"));
        assert_eq!(seen, vec![Event::TxConfirmation]);
        assert_eq!(driver.current(), Link::Listening);
        assert_eq!(stack.len(), 1);
    }
}
