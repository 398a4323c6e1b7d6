//! Engine behaviour against the simulated controller: correlation,
//! timeouts, event routing, and session lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use smcp::protocol::codec;
use smcp::{Error, Handlers, Message, Op, Status, TransportError, discovery_channel};

use super::mock_device::{
    Action, SERIAL, SimDevice, engine_for, event, open_engine, quick_config, reply, wait_until,
};

const CARD: [u8; 12] = [
    0x03, 0x10, 0x02, 0x00, 0x07, 0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
];

// ── Correlation ───────────────────────────────────────────────

#[test]
fn call_returns_device_response() {
    let sim = SimDevice::new(|cmd| vec![reply(cmd, Status::Success, vec![0xAB])]);
    let engine = open_engine(&sim);

    let request = Message::command(Op::SetGpio, 3, 1, Vec::new());
    let response = engine.call(request.clone()).unwrap();

    assert_eq!(response, Message::response(Op::SetGpio, Status::Success, vec![0xAB]));
    assert_eq!(sim.commands(), vec![request]);
}

#[test]
fn large_payloads_cross_fragment_boundaries() {
    let sim = SimDevice::new(|cmd| vec![reply(cmd, Status::Success, cmd.payload().to_vec())]);
    let engine = open_engine(&sim);

    let apdu: Vec<u8> = (0..700u32).map(|i| (i % 251) as u8).collect();
    let response = engine
        .call(Message::command(Op::ApduTransfer, 0, 0, apdu.clone()))
        .unwrap();
    assert_eq!(response.payload(), &apdu[..]);
}

#[test]
fn late_response_does_not_answer_next_call() {
    let sim = SimDevice::new(|cmd| match cmd.op() {
        Op::Info => vec![
            Action::Sleep(Duration::from_millis(350)),
            reply(cmd, Status::Success, b"late".to_vec()),
        ],
        _ => vec![reply(cmd, Status::Success, Vec::new())],
    });
    let mut config = quick_config();
    config.call_timeout_ms = 250;
    let engine = engine_for(&sim, config);
    engine.open(SERIAL).unwrap();

    let first = engine.call(Message::bare_command(Op::Info)).unwrap();
    assert_eq!(first.status(), Some(Status::TimedOut));
    assert_eq!(first.op(), Op::Info);

    let second = engine.call(Message::command(Op::Led, 1, 0, Vec::new())).unwrap();
    assert_eq!(second.op(), Op::Led);
    assert_eq!(second.status(), Some(Status::Success));
}

#[test]
fn wrong_op_response_yields_failure() {
    let sim = SimDevice::new(|_| {
        vec![Action::Send(Message::response(
            Op::Buzzer,
            Status::Success,
            Vec::new(),
        ))]
    });
    let mut config = quick_config();
    config.call_timeout_ms = 150;
    let engine = engine_for(&sim, config);
    engine.open(SERIAL).unwrap();

    let response = engine.call(Message::bare_command(Op::Info)).unwrap();
    assert_eq!(response, Message::response(Op::Info, Status::Failure, Vec::new()));
}

#[test]
fn malformed_frames_are_skipped() {
    let sim = SimDevice::new(|cmd| {
        let mut corrupt = codec::encode(&Message::response(cmd.op(), Status::Success, vec![1]));
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        vec![
            Action::Raw(corrupt),
            Action::Raw(vec![0x02, 0xD9, 0x7E, 0x00, 0, 0, 0, 0, 0x00]),
            reply(cmd, Status::Success, vec![2]),
        ]
    });
    let engine = open_engine(&sim);
    let response = engine.call(Message::bare_command(Op::Info)).unwrap();
    assert_eq!(response.payload(), &[2]);
}

// ── Events ────────────────────────────────────────────────────

#[test]
fn events_do_not_disturb_the_pending_call() {
    let sim = SimDevice::new(|cmd| {
        vec![
            event(Op::Debug, Status::Success, b"scan".to_vec()),
            reply(cmd, Status::Success, Vec::new()),
            event(Op::Discovery, Status::Success, CARD.to_vec()),
        ]
    });
    let engine = open_engine(&sim);

    let texts = Arc::new(Mutex::new(Vec::new()));
    let (discovery, cards) = discovery_channel(4);
    let sink = texts.clone();
    let mut handlers = Handlers::new().on_debug(move |t| sink.lock().push(t.to_owned()));
    handlers.discovery = Some(discovery);
    engine.set_handlers(handlers);

    let response = engine
        .call(Message::command(Op::Discovery, 0xF0, 1, Vec::new()))
        .unwrap();
    assert_eq!(response.kind(), smcp::Kind::Response);
    assert_eq!(response.status(), Some(Status::Success));

    let card = cards.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(card.uid_hex(), "04112233445566");

    assert!(wait_until(|| texts.lock().iter().any(|t| t == "scan")));
    assert!(
        texts
            .lock()
            .iter()
            .any(|t| t.starts_with("[EVT][NFC][DISCOVERY][SUCCESS]"))
    );
}

#[test]
fn error_events_reach_the_error_handler() {
    let sim = SimDevice::new(|cmd| {
        vec![
            reply(cmd, Status::Success, Vec::new()),
            event(Op::Error, Status::LostRemoteDevice, vec![0x01, 0x02]),
        ]
    });
    let engine = open_engine(&sim);
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    engine.set_handlers(
        Handlers::new().on_error(move |status, payload| *sink.lock() = Some((status, payload.to_vec()))),
    );

    engine.call(Message::bare_command(Op::Info)).unwrap();
    assert!(wait_until(|| seen.lock().is_some()));
    assert_eq!(
        seen.lock().clone(),
        Some((Status::LostRemoteDevice, vec![0x01, 0x02]))
    );
}

#[test]
fn handlers_survive_reopen() {
    let sim = SimDevice::new(|cmd| {
        vec![
            reply(cmd, Status::Success, Vec::new()),
            event(Op::Debug, Status::Success, b"hello".to_vec()),
        ]
    });
    let engine = engine_for(&sim, quick_config());
    let texts = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = texts.clone();
    engine.set_handlers(Handlers::new().on_debug(move |t| sink.lock().push(t.to_owned())));

    engine.open(SERIAL).unwrap();
    engine.close();
    engine.open(SERIAL).unwrap();
    engine.call(Message::bare_command(Op::Info)).unwrap();

    assert!(wait_until(|| texts.lock().iter().any(|t| t == "hello")));
    assert_eq!(sim.connects(), 2);
}

#[test]
fn handler_replacing_handlers_does_not_block_close() {
    let sim = SimDevice::new(|cmd| {
        vec![
            reply(cmd, Status::Success, Vec::new()),
            event(Op::Debug, Status::Success, b"once".to_vec()),
        ]
    });
    let engine = Arc::new(open_engine(&sim));

    let fired = Arc::new(AtomicUsize::new(0));
    let count = fired.clone();
    let weak = Arc::downgrade(&engine);
    engine.set_handlers(Handlers::new().on_debug(move |text| {
        if text == "once" {
            count.fetch_add(1, Ordering::SeqCst);
            if let Some(engine) = weak.upgrade() {
                engine.set_handlers(Handlers::new());
            }
        }
    }));

    engine.call(Message::bare_command(Op::Info)).unwrap();
    assert!(wait_until(|| fired.load(Ordering::SeqCst) == 1));

    // The replacement set is empty, so a second event goes nowhere.
    engine.call(Message::bare_command(Op::Info)).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let closer = {
        let engine = engine.clone();
        thread::spawn(move || {
            engine.close();
            let _ = done_tx.send(());
        })
    };
    assert!(
        done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
        "close() did not return"
    );
    closer.join().unwrap();
    assert!(!engine.is_connected());
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn unknown_address_fails_to_open() {
    let sim = SimDevice::acking();
    let engine = engine_for(&sim, quick_config());
    assert!(matches!(
        engine.open("nope"),
        Err(Error::Transport(TransportError::NotFound(_)))
    ));
    assert!(!engine.is_connected());
}

#[test]
fn ports_reflect_enumeration() {
    let sim = SimDevice::acking();
    let engine = engine_for(&sim, quick_config());
    assert_eq!(engine.ports(None).unwrap(), vec![SERIAL.to_owned()]);
    assert!(engine.ports(Some("other")).unwrap().is_empty());
    sim.set_present(false);
    assert!(engine.ports(None).unwrap().is_empty());
}

#[test]
fn device_disconnect_stops_the_session() {
    let sim = SimDevice::new(|cmd| match cmd.op() {
        Op::Led => vec![Action::Disconnect],
        _ => vec![reply(cmd, Status::Success, Vec::new())],
    });
    let engine = open_engine(&sim);

    assert!(matches!(
        engine.call(Message::command(Op::Led, 0, 0, Vec::new())),
        Err(Error::SessionClosed)
    ));
    assert!(wait_until(|| !engine.is_connected()));
    assert!(matches!(
        engine.call(Message::bare_command(Op::Info)),
        Err(Error::NotConnected)
    ));

    engine.open(SERIAL).unwrap();
    let response = engine.call(Message::bare_command(Op::Info)).unwrap();
    assert_eq!(response.status(), Some(Status::Success));
    assert_eq!(sim.connects(), 2);
}

#[test]
fn close_during_call_returns_session_closed() {
    let sim = SimDevice::new(|cmd| {
        vec![
            Action::Sleep(Duration::from_millis(400)),
            reply(cmd, Status::Success, Vec::new()),
        ]
    });
    let engine = Arc::new(open_engine(&sim));

    let caller = {
        let engine = engine.clone();
        thread::spawn(move || engine.call(Message::bare_command(Op::Info)))
    };
    thread::sleep(Duration::from_millis(50));
    engine.close();

    assert!(matches!(caller.join().unwrap(), Err(Error::SessionClosed)));
    assert!(!engine.is_connected());
}

#[test]
fn close_is_idempotent() {
    let sim = SimDevice::acking();
    let engine = open_engine(&sim);
    engine.close();
    engine.close();
    assert_eq!(engine.address(), None);
    assert_eq!(engine.last_address().as_deref(), Some(SERIAL));
}

#[test]
fn second_open_is_rejected() {
    let sim = SimDevice::acking();
    let engine = open_engine(&sim);
    assert!(matches!(engine.open(SERIAL), Err(Error::AlreadyOpen)));
    assert_eq!(sim.connects(), 1);
}
