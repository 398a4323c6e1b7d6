//! Session queues between the workers and the caller.
//!
//! Uses `crossbeam-channel` bounded queues. The receive worker owns both
//! senders; dropping it disconnects the queues, which is how a waiting
//! `call` learns the session is gone.
//!
//! ```text
//!                     Response ┌───────────────┐
//! ┌────────────────┐ ─────────▶│ call() waiter │
//! │ Receive worker │           └───────────────┘
//! │ (Router)       │  Event    ┌───────────────┐
//! └────────────────┘ ─────────▶│ Dispatcher    │
//!                              └───────────────┘
//! ```

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::warn;

use crate::config::EngineConfig;
use crate::protocol::Message;

/// Sending half held by the receive worker.
pub(crate) struct Router {
    pub responses: Sender<Message>,
    pub events: Sender<Message>,
}

/// Receiving halves held by the session.
pub(crate) struct Inbox {
    pub responses: Receiver<Message>,
    pub events: Receiver<Message>,
}

/// Build the response and event queues for one session.
pub(crate) fn session_queues(config: &EngineConfig) -> (Router, Inbox) {
    let (resp_tx, resp_rx) = crossbeam_channel::bounded(config.response_queue_depth);
    let (evt_tx, evt_rx) = crossbeam_channel::bounded(config.event_queue_depth);
    (
        Router {
            responses: resp_tx,
            events: evt_tx,
        },
        Inbox {
            responses: resp_rx,
            events: evt_rx,
        },
    )
}

/// Enqueue without blocking. A full queue drops `item`.
///
/// Returns false when the item was not queued.
pub(crate) fn offer<T>(tx: &Sender<T>, item: T, queue: &str) -> bool {
    match tx.try_send(item) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("rx: {} queue full, dropping frame", queue);
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}
