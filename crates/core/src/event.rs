// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types flowing through a vertex's mailbox (spec.md §3 "Event", §4.2).

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// The six event kinds a vertex mailbox ever receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Start,
    Pause,
    Exit,
    Poke,
    BackPoke,
    Event,
}

crate::simple_display! {
    EventKind {
        Start => "start",
        Pause => "pause",
        Exit => "exit",
        Poke => "poke",
        BackPoke => "back_poke",
        Event => "event",
    }
}

/// Opaque event payload. The engine never inspects it; it exists so a
/// `Poke` can carry the upstream's change marker ("no-change" vs
/// "changed") without coupling the mailbox to a concrete resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Payload {
    #[default]
    None,
    Changed,
    NoChange,
}

/// A handshake handle letting a sender block until the recipient has fully
/// processed an event (spec.md §4.2: "the sender's ACKWait returns then").
///
/// Not `Clone`/`Serialize` — it only makes sense inside one process, so it
/// is carried alongside a wire-serializable [`Event`] rather than inside it.
#[derive(Debug)]
pub struct Responder {
    tx: Option<oneshot::Sender<()>>,
}

impl Responder {
    pub fn new() -> (Self, Acknowledger) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, Acknowledger { rx })
    }

    /// No-op responder for events nobody needs to wait on (e.g. watcher
    /// pokes).
    pub fn none() -> Self {
        Self { tx: None }
    }

    /// Signal that this event has been fully processed, including any
    /// applied side effects. Idempotent: a second call is a no-op.
    pub fn ack(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// The sender's half of a [`Responder`] handshake.
pub struct Acknowledger {
    rx: oneshot::Receiver<()>,
}

impl Acknowledger {
    /// Block until the corresponding `Responder::ack` has been called, or
    /// the responder was dropped without acking (vertex exited early).
    pub async fn ack_wait(self) {
        let _ = self.rx.await;
    }
}

/// An event posted to a vertex's mailbox (spec.md §3).
#[derive(Debug)]
pub struct Event {
    pub kind: EventKind,
    pub responder: Responder,
    pub payload: Payload,
    /// Whether processing this event should reset the vertex's convergence
    /// timer. `Start`/`Pause`/`Exit`/`BackPoke` are pure control signals
    /// (`false`); external-world watcher events and "changed" pokes are
    /// real activity (`true`).
    pub activity: bool,
}

impl Event {
    pub fn new(kind: EventKind, activity: bool) -> (Self, Acknowledger) {
        let (responder, ack) = Responder::new();
        (
            Self { kind, responder, payload: Payload::None, activity },
            ack,
        )
    }

    /// Construct a fire-and-forget event with no one waiting on its
    /// acknowledgement.
    pub fn fire(kind: EventKind, activity: bool) -> Self {
        Self { kind, responder: Responder::none(), payload: Payload::None, activity }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::Start => "start",
            EventKind::Pause => "pause",
            EventKind::Exit => "exit",
            EventKind::Poke => "poke",
            EventKind::BackPoke => "back_poke",
            EventKind::Event => "event",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
