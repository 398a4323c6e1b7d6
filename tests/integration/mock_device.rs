//! Simulated SMCP controller for integration tests.
//!
//! `SimDevice` is a [`Connector`]: every `connect` spawns a device thread
//! on the far end of an in-memory link. The thread answers the handshake,
//! reassembles commands, logs them, and runs a test-supplied script that
//! returns the actions to take (respond, emit events, stall, reset).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use smcp::error::TransportError;
use smcp::link::memory::{self, MemoryTransport};
use smcp::link::{ConnectionToken, Connector, FragmentStream, LinkParams, Transport};
use smcp::protocol::codec;
use smcp::{Engine, EngineConfig, FirmwareConfig, Message, Op, Status};

pub const SERIAL: &str = "SIM-0001";

const POLL: Duration = Duration::from_millis(2);

// ── Script actions ────────────────────────────────────────────

#[allow(dead_code)]
pub enum Action {
    /// Send a message back.
    Send(Message),
    /// Send pre-encoded frame bytes.
    Raw(Vec<u8>),
    /// Stall the device before the next action.
    Sleep(Duration),
    /// Drop the link and vanish from enumeration for a while.
    Reset(Duration),
    /// Drop the link and stay enumerable.
    Disconnect,
}

#[allow(dead_code)]
pub fn reply(cmd: &Message, status: Status, payload: impl Into<Vec<u8>>) -> Action {
    Action::Send(Message::response(cmd.op(), status, payload))
}

#[allow(dead_code)]
pub fn event(op: Op, status: Status, payload: impl Into<Vec<u8>>) -> Action {
    Action::Send(Message::event(op, status, payload))
}

pub type Script = Box<dyn FnMut(&Message) -> Vec<Action> + Send>;

// ── SimDevice ─────────────────────────────────────────────────

struct Shared {
    script: Mutex<Script>,
    log: Mutex<Vec<Message>>,
    present: AtomicBool,
    connects: AtomicUsize,
}

#[derive(Clone)]
pub struct SimDevice {
    shared: Arc<Shared>,
}

#[allow(dead_code)]
impl SimDevice {
    pub fn new(script: impl FnMut(&Message) -> Vec<Action> + Send + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(Box::new(script)),
                log: Mutex::new(Vec::new()),
                present: AtomicBool::new(true),
                connects: AtomicUsize::new(0),
            }),
        }
    }

    /// Answers every command with an empty `SUCCESS` response.
    pub fn acking() -> Self {
        Self::new(|cmd| vec![reply(cmd, Status::Success, Vec::new())])
    }

    /// Every command received so far, in order.
    pub fn commands(&self) -> Vec<Message> {
        self.shared.log.lock().clone()
    }

    pub fn last_command(&self) -> Option<Message> {
        self.shared.log.lock().last().cloned()
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::Acquire)
    }

    pub fn set_present(&self, present: bool) {
        self.shared.present.store(present, Ordering::Release);
    }
}

impl Connector for SimDevice {
    fn connect(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError> {
        if address != SERIAL || !self.shared.present.load(Ordering::Acquire) {
            return Err(TransportError::NotFound(address.to_owned()));
        }
        let n = self.shared.connects.fetch_add(1, Ordering::AcqRel) + 1;
        let token = [0x5A, 0xA5, 0x00, n as u8];

        let (host, device) = memory::pair(LinkParams::HID);
        let shared = self.shared.clone();
        thread::spawn(move || device_main(device, token, &shared));
        Ok(Arc::new(host))
    }

    fn enumerate(&self, filter: Option<&str>) -> Result<Vec<String>, TransportError> {
        let present = self.shared.present.load(Ordering::Acquire);
        let matches = filter.is_none_or(|f| f == SERIAL);
        Ok(if present && matches {
            vec![SERIAL.to_owned()]
        } else {
            Vec::new()
        })
    }
}

fn device_main(device: MemoryTransport, token: [u8; 4], shared: &Arc<Shared>) {
    let device: Arc<dyn Transport> = Arc::new(device);

    let init = loop {
        match device.read(POLL) {
            Ok(report) if report.is_empty() => {}
            Ok(report) => break report,
            Err(_) => return,
        }
    };
    if init.len() < 15 {
        return;
    }
    let mut answer = init[..15].to_vec();
    answer.extend_from_slice(&token);
    answer.resize(64, 0);
    if device.write(&answer).is_err() {
        return;
    }

    let stream = FragmentStream::new(device.clone(), ConnectionToken(token));
    let running = AtomicBool::new(true);
    let _ = stream.receive_loop(&running, POLL, |frame| {
        let Ok(cmd) = codec::decode(&frame) else {
            return;
        };
        shared.log.lock().push(cmd.clone());
        let actions = {
            let mut guard = shared.script.lock();
            let script: &mut Script = &mut guard;
            script(&cmd)
        };

        for action in actions {
            match action {
                Action::Send(msg) => {
                    let _ = stream.send(&codec::encode(&msg));
                }
                Action::Raw(bytes) => {
                    let _ = stream.send(&bytes);
                }
                Action::Sleep(d) => thread::sleep(d),
                Action::Reset(away) => {
                    shared.present.store(false, Ordering::Release);
                    device.close();
                    running.store(false, Ordering::Release);
                    let shared = shared.clone();
                    thread::spawn(move || {
                        thread::sleep(away);
                        shared.present.store(true, Ordering::Release);
                    });
                    return;
                }
                Action::Disconnect => {
                    device.close();
                    running.store(false, Ordering::Release);
                    return;
                }
            }
        }
    });
}

// ── Engine helpers ────────────────────────────────────────────

pub fn quick_config() -> EngineConfig {
    EngineConfig {
        call_timeout_ms: 500,
        read_poll_ms: 2,
        event_poll_ms: 5,
        handshake_timeout_ms: 500,
        firmware: FirmwareConfig {
            reset_settle_ms: 10,
            reconnect_poll_ms: 10,
            reconnect_retries: 100,
        },
        ..EngineConfig::default()
    }
}

#[allow(dead_code)]
pub fn engine_for(sim: &SimDevice, config: EngineConfig) -> Engine {
    Engine::new(Arc::new(sim.clone()), config).unwrap()
}

/// Engine with the quick config, already open on the simulator.
#[allow(dead_code)]
pub fn open_engine(sim: &SimDevice) -> Engine {
    let engine = engine_for(sim, quick_config());
    engine.open(SERIAL).unwrap();
    engine
}

/// Poll `cond` for up to two seconds.
#[allow(dead_code)]
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
