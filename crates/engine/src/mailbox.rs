// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event mailbox: delivers events one at a time to a vertex's process loop
//! (spec.md §4.2).

use cvg_core::event::{Acknowledger, Event, EventKind, Payload};

const MAILBOX_CAPACITY: usize = 16;

/// The write half. Cheap to clone — every edge, the watcher task, and the
/// executor all hold one pointing at the same vertex.
#[derive(Clone)]
pub struct MailboxTx {
    tx: tokio::sync::mpsc::Sender<Event>,
}

impl MailboxTx {
    /// Post an event without waiting for it to be processed.
    pub async fn post(&self, event: Event) {
        // A full mailbox only happens under pathological backpressure;
        // waiting here (rather than dropping) preserves "at least one
        // apply per predecessor change" (spec.md §4.3).
        let _ = self.tx.send(event).await;
    }

    /// Post an event and block until its `Responder` has been acked.
    pub async fn post_and_wait(&self, kind: EventKind, activity: bool) {
        let (event, ack) = Event::new(kind, activity);
        self.post(event).await;
        ack_or_closed(ack).await;
    }

    pub async fn poke(&self, payload: Payload) {
        let event = Event::fire(EventKind::Poke, payload == Payload::Changed).with_payload(payload);
        self.post(event).await;
    }

    pub async fn back_poke(&self) {
        self.post(Event::fire(EventKind::BackPoke, false)).await;
    }
}

async fn ack_or_closed(ack: Acknowledger) {
    ack.ack_wait().await;
}

/// The read half, owned exclusively by one vertex's process task
/// (spec.md §4.2: "delivers events one at a time").
pub struct MailboxRx {
    rx: tokio::sync::mpsc::Receiver<Event>,
}

impl MailboxRx {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

pub fn mailbox() -> (MailboxTx, MailboxRx) {
    let (tx, rx) = tokio::sync::mpsc::channel(MAILBOX_CAPACITY);
    (MailboxTx { tx }, MailboxRx { rx })
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
