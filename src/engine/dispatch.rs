//! Event dispatch worker and application handlers.
//!
//! Device events are delivered on the `smcp-dispatch` thread, one at a
//! time and in arrival order. Every event is first traced to the debug
//! handler, then routed by op:
//!
//! | Event op    | Handler                                    |
//! |-------------|--------------------------------------------|
//! | `DISCOVERY` | `discovery(status, Option<DiscoveryRecord>)` |
//! | `DEBUG`     | `debug(text)`                              |
//! | `ERROR`     | `error(status, payload)`                   |
//!
//! Other event ops are only traced. A panicking handler is caught and
//! logged; the worker keeps running.
//!
//! The handler lock is never held while a callback runs. The worker checks
//! the handlers out, delivers, and checks them back in unless
//! [`HandlerCell::replace`] ran in between, so a handler may itself call
//! `Engine::set_handlers`.

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::error::FrameError;
use crate::protocol::{DiscoveryRecord, Message, Op, Status};

use super::channels::offer;

pub type DiscoveryHandler = Box<dyn FnMut(Status, Option<DiscoveryRecord>) + Send>;
pub type DebugHandler = Box<dyn FnMut(&str) + Send>;
pub type ErrorHandler = Box<dyn FnMut(Status, &[u8]) + Send>;

/// Application callbacks for device events. Unset handlers are no-ops.
#[derive(Default)]
pub struct Handlers {
    pub discovery: Option<DiscoveryHandler>,
    pub debug: Option<DebugHandler>,
    pub error: Option<ErrorHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_discovery(
        mut self,
        f: impl FnMut(Status, Option<DiscoveryRecord>) + Send + 'static,
    ) -> Self {
        self.discovery = Some(Box::new(f));
        self
    }

    pub fn on_debug(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.debug = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(Status, &[u8]) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

/// Discovery handler that forwards parsed records into a bounded channel.
///
/// Events without a record are not forwarded. When the receiver lags the
/// newest record is dropped.
pub fn discovery_channel(capacity: usize) -> (DiscoveryHandler, Receiver<DiscoveryRecord>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let handler: DiscoveryHandler = Box::new(move |_status, record| {
        if let Some(record) = record {
            offer(&tx, record, "discovery");
        }
    });
    (handler, rx)
}

struct Slot {
    handlers: Handlers,
    generation: u64,
}

/// Shared home of the application handlers.
pub(crate) struct HandlerCell {
    slot: Mutex<Slot>,
}

impl HandlerCell {
    pub(crate) fn new(handlers: Handlers) -> Self {
        Self {
            slot: Mutex::new(Slot {
                handlers,
                generation: 0,
            }),
        }
    }

    /// Install `handlers`. A dispatch in progress keeps the set it checked
    /// out and drops it afterwards.
    pub(crate) fn replace(&self, handlers: Handlers) {
        let mut slot = self.slot.lock();
        slot.handlers = handlers;
        slot.generation = slot.generation.wrapping_add(1);
    }

    fn checkout(&self) -> (Handlers, u64) {
        let mut slot = self.slot.lock();
        (mem::take(&mut slot.handlers), slot.generation)
    }

    fn checkin(&self, handlers: Handlers, generation: u64) {
        let mut slot = self.slot.lock();
        if slot.generation == generation {
            slot.handlers = handlers;
        }
    }
}

/// Run `f` with unwinding contained.
fn guarded(what: &str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!("dispatch: {} handler panicked", what);
    }
}

/// Deliver one event to the handlers in `cell`.
pub(crate) fn dispatch_event(cell: &HandlerCell, event: &Message) {
    let (mut handlers, generation) = cell.checkout();
    deliver(&mut handlers, event);
    cell.checkin(handlers, generation);
}

fn deliver(handlers: &mut Handlers, event: &Message) {
    let Message::Event {
        op,
        status,
        payload,
    } = event
    else {
        warn!("dispatch: ignoring non-event {}", event.kind());
        return;
    };

    if let Some(debug) = handlers.debug.as_mut() {
        let trace = event.to_string();
        guarded("debug", || debug(&trace));
    }

    match op {
        Op::Discovery => {
            if let Some(discovery) = handlers.discovery.as_mut() {
                let record = if *status == Status::Success {
                    DiscoveryRecord::parse(payload)
                        .map_err(|e| warn!("dispatch: dropped record: {}", FrameError::from(e)))
                        .ok()
                } else {
                    None
                };
                guarded("discovery", || discovery(*status, record));
            }
        }
        Op::Debug => {
            if let Some(debug) = handlers.debug.as_mut() {
                let text = String::from_utf8_lossy(payload);
                guarded("debug", || debug(&text));
            }
        }
        Op::Error => {
            if let Some(on_error) = handlers.error.as_mut() {
                guarded("error", || on_error(*status, payload));
            }
        }
        other => debug!("dispatch: no handler for {} event", other),
    }
}

/// Start the dispatch worker for a session.
pub(crate) fn spawn_dispatcher(
    events: Receiver<Message>,
    running: Arc<AtomicBool>,
    poll: Duration,
    handlers: Arc<HandlerCell>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("smcp-dispatch".into())
        .spawn(move || {
            debug!("dispatch: worker started");
            while running.load(Ordering::Acquire) {
                match events.recv_timeout(poll) {
                    Ok(event) => dispatch_event(&handlers, &event),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("dispatch: worker exited");
        })
}

// ── Tests ────────────────────────────────────────────────────
