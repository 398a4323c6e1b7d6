//! Session engine: request/response correlation over a report link.
//!
//! **Caller-driven**: the engine owns one session at a time and exposes a
//! blocking [`Engine::call`]. Two workers run while the session is open:
//!
//! 1. **Receive** (`smcp-rx`): reads reports, reassembles and decodes
//!    frames, and routes responses and events into separate bounded queues.
//! 2. **Dispatch** (`smcp-dispatch`): drains the event queue into the
//!    application [`Handlers`].
//!
//! ```text
//!   caller ──call()──▶ encode ─▶ FragmentStream::send ─▶ Transport
//!      ▲                                                    │
//!      │ response queue   ┌─────────┐   Transport::read     │
//!      └──────────────────│ smcp-rx │◀──────────────────────┘
//!                         └────┬────┘
//!                              │ event queue
//!                         ┌────▼──────────┐
//!                         │ smcp-dispatch │──▶ Handlers
//!                         └───────────────┘
//! ```
//!
//! Timeouts and desyncs are not errors: `call` returns a synthesized
//! response carrying `TIMED_OUT` or `FAILURE`.

mod channels;
mod dispatch;
mod io_task;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::{Error, Result, TransportError};
use crate::link::{ConnectionToken, Connector, FragmentStream, handshake};
use crate::protocol::{Message, Status, codec};

use dispatch::HandlerCell;
pub use dispatch::{DebugHandler, DiscoveryHandler, ErrorHandler, Handlers, discovery_channel};

/// Live state of one open session.
struct Session {
    address: String,
    stream: FragmentStream,
    running: Arc<AtomicBool>,
    responses: Receiver<Message>,
    workers: Vec<JoinHandle<()>>,
}

impl Session {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop both workers, then release the transport.
    fn shutdown(self) {
        self.running.store(false, Ordering::Release);
        let me = thread::current().id();
        for worker in self.workers {
            // A handler closing the engine runs on the dispatch worker.
            if worker.thread().id() == me {
                continue;
            }
            let name = worker.thread().name().unwrap_or("worker").to_owned();
            if worker.join().is_err() {
                error!("engine: {} panicked", name);
            }
        }
        self.stream.transport().close();
    }
}

/// Clears the in-flight flag when a call returns.
struct CallGuard<'a>(&'a AtomicBool);

impl<'a> CallGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::CallInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Host-side SMCP session engine.
pub struct Engine {
    connector: Arc<dyn Connector>,
    config: EngineConfig,
    handlers: Arc<HandlerCell>,
    session: Mutex<Option<Session>>,
    last_address: Mutex<Option<String>>,
    in_call: AtomicBool,
}

impl Engine {
    /// Build an engine; the configuration is validated first.
    pub fn new(connector: Arc<dyn Connector>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            connector,
            config,
            handlers: Arc::new(HandlerCell::new(Handlers::default())),
            session: Mutex::new(None),
            last_address: Mutex::new(None),
            in_call: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the event handlers. Takes effect for the next event and
    /// survives close and reopen. May be called from inside a handler.
    pub fn set_handlers(&self, handlers: Handlers) {
        self.handlers.replace(handlers);
    }

    /// Addresses of attached controllers, optionally filtered to one.
    pub fn ports(&self, filter: Option<&str>) -> Result<Vec<String>> {
        Ok(self.connector.enumerate(filter)?)
    }

    /// Connect to `address`, run the handshake and start the workers.
    pub fn open(&self, address: &str) -> Result<()> {
        let mut slot = self.session.lock();
        if slot.as_ref().is_some_and(Session::is_running) {
            return Err(Error::AlreadyOpen);
        }
        if let Some(dead) = slot.take() {
            debug!("engine: reaping stopped session on {}", dead.address);
            dead.shutdown();
        }

        let transport = self.connector.connect(address)?;
        let token = match handshake::perform(&*transport, self.config.handshake_timeout()) {
            Ok(token) => token,
            Err(e) => {
                transport.close();
                return Err(e);
            }
        };

        let stream = FragmentStream::new(transport, token);
        let running = Arc::new(AtomicBool::new(true));
        let (router, inbox) = channels::session_queues(&self.config);

        let mut session = Session {
            address: address.to_owned(),
            stream: stream.clone(),
            running: running.clone(),
            responses: inbox.responses,
            workers: Vec::with_capacity(2),
        };

        let spawned = io_task::spawn_receiver(stream, running.clone(), self.config.read_poll(), router)
            .and_then(|rx| {
                session.workers.push(rx);
                dispatch::spawn_dispatcher(
                    inbox.events,
                    running,
                    self.config.event_poll(),
                    self.handlers.clone(),
                )
            });
        match spawned {
            Ok(dispatcher) => session.workers.push(dispatcher),
            Err(e) => {
                session.shutdown();
                return Err(TransportError::Io(e).into());
            }
        }

        info!("engine: session open on {} (token {})", address, token);
        *slot = Some(session);
        *self.last_address.lock() = Some(address.to_owned());
        Ok(())
    }

    /// Stop the workers and close the transport. Idempotent.
    pub fn close(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            let address = session.address.clone();
            session.shutdown();
            info!("engine: session on {} closed", address);
        }
    }

    /// True while the session is open and its receive worker is healthy.
    pub fn is_connected(&self) -> bool {
        self.session.lock().as_ref().is_some_and(Session::is_running)
    }

    /// Address of the open session.
    pub fn address(&self) -> Option<String> {
        self.session.lock().as_ref().map(|s| s.address.clone())
    }

    /// Address most recently opened, kept across close.
    pub fn last_address(&self) -> Option<String> {
        self.last_address.lock().clone()
    }

    pub fn token(&self) -> Option<ConnectionToken> {
        self.session.lock().as_ref().map(|s| s.stream.token())
    }

    /// Send `request` and wait for the response with the same op.
    ///
    /// Returns a synthesized `TIMED_OUT` response when nothing matching
    /// arrives within the call timeout, or `FAILURE` if only responses for
    /// other ops arrived.
    ///
    /// A response for another op does not end the wait, so both outcomes
    /// take the full `call_timeout_ms` (20 s by default) to return.
    pub fn call(&self, request: Message) -> Result<Message> {
        let _guard = CallGuard::acquire(&self.in_call)?;

        let (stream, responses, running) = {
            let slot = self.session.lock();
            let session = slot
                .as_ref()
                .filter(|s| s.is_running())
                .ok_or(Error::NotConnected)?;
            (
                session.stream.clone(),
                session.responses.clone(),
                session.running.clone(),
            )
        };

        let stale = responses.try_iter().count();
        if stale > 0 {
            debug!("engine: discarded {} stale responses", stale);
        }

        let op = request.op();
        trace!("tx: {}", request);
        if let Err(e) = stream.send(&codec::encode(&request)) {
            if matches!(e, Error::Transport(_)) {
                error!("engine: write failed, session stopped: {}", e);
                running.store(false, Ordering::Release);
            }
            return Err(e);
        }

        let deadline = Instant::now() + self.config.call_timeout();
        let mut desynced = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match responses.recv_timeout(remaining) {
                Ok(response) if response.op() == op => return Ok(response),
                Ok(response) => {
                    warn!("engine: desync, waiting for {} but got {}", op, response.op());
                    desynced = true;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Err(Error::SessionClosed),
            }
        }

        let status = if desynced {
            Status::Failure
        } else {
            Status::TimedOut
        };
        warn!("engine: {} call ended with {}", op, status);
        Ok(Message::response(op, status, Vec::new()))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Tests ────────────────────────────────────────────────────
