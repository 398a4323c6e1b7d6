//! Receive worker: transport reports in, routed messages out.
//!
//! Runs on a dedicated `std::thread` for the lifetime of a session:
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────┐
//!  │  smcp-rx thread                                      │
//!  │                                                      │
//!  │  Transport::read(poll) ─▶ Reassembler ─▶ decode ─┬─▶ responses
//!  │                                                  └─▶ events
//!  └──────────────────────────────────────────────────────┘
//! ```
//!
//! Decode failures drop the frame. A transport failure ends the worker and
//! clears the session's running flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, trace, warn};

use crate::link::FragmentStream;
use crate::protocol::{Kind, codec};

use super::channels::{Router, offer};

impl Router {
    /// Decode one reassembled frame and queue it by kind.
    pub(crate) fn route(&self, frame: &[u8]) {
        let msg = match codec::decode(frame) {
            Ok(msg) => msg,
            Err(e) if e.is_unknown_selector() => {
                warn!("rx: unknown selector, frame dropped: {}", e);
                return;
            }
            Err(e) => {
                warn!("rx: malformed frame dropped: {}", e);
                return;
            }
        };
        trace!("rx: {}", msg);

        match msg.kind() {
            Kind::Response => {
                offer(&self.responses, msg, "response");
            }
            Kind::Event => {
                offer(&self.events, msg, "event");
            }
            Kind::Command => debug!("rx: unexpected command {} from device, dropped", msg.op()),
        }
    }
}

/// Start the receive worker for a session.
pub(crate) fn spawn_receiver(
    stream: FragmentStream,
    running: Arc<AtomicBool>,
    poll: Duration,
    router: Router,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("smcp-rx".into())
        .spawn(move || {
            debug!("rx: worker started");
            let result = stream.receive_loop(&running, poll, |frame| router.route(&frame));
            if let Err(e) = result {
                error!("rx: transport failure, session stopped: {}", e);
                running.store(false, Ordering::Release);
            }
            info!("rx: worker exited");
            // `router` drops here and disconnects both queues.
        })
}
