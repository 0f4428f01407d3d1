//! Connected client sessions
//!
//! A session owns the bounded outbound queue drained by the socket writer,
//! the latest merged input, and the last snapshot successfully queued to the
//! client (the delta base). Lock order is world first, then session.

use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::game::input::InputState;
use crate::game::ship::NEVER;
use crate::game::snapshot::ClientSnapshot;
use crate::ws::protocol::InputMsg;

/// Outbound frames buffered per client
pub const OUTBOUND_CAPACITY: usize = 64;
/// How long a broadcast waits for queue space before dropping a frame
pub const SEND_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("outbound queue full")]
    Full,
    #[error("session closed")]
    Closed,
}

/// Mutable per-session state
#[derive(Debug)]
pub struct SessionState {
    pub input: InputState,
    pub last_seen: Instant,
    /// Server seconds of the last installed module
    pub last_upgrade: f64,
    pub last_snapshot: Option<Arc<ClientSnapshot>>,
}

/// One connected client
#[derive(Debug)]
pub struct Session {
    pub id: u32,
    outbound: mpsc::Sender<Bytes>,
    state: RwLock<SessionState>,
    closed: AtomicBool,
    /// Held while a broadcast task is writing to this session
    in_flight: tokio::sync::Mutex<()>,
}

impl Session {
    /// Create a session and the receiving half its writer drains
    pub fn new(id: u32) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let session = Arc::new(Self {
            id,
            outbound: tx,
            state: RwLock::new(SessionState {
                input: InputState::default(),
                last_seen: Instant::now(),
                last_upgrade: NEVER,
                last_snapshot: None,
            }),
            closed: AtomicBool::new(false),
            in_flight: tokio::sync::Mutex::new(()),
        });
        (session, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.outbound.is_closed()
    }

    /// Stop accepting frames. The connection handler aborts the writer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Non-blocking enqueue
    pub fn try_send(&self, frame: Bytes) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Enqueue, waiting at most [`SEND_TIMEOUT`] for queue space
    pub async fn send(&self, frame: Bytes) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        self.outbound
            .send_timeout(frame, SEND_TIMEOUT)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => SendError::Full,
                mpsc::error::SendTimeoutError::Closed(_) => SendError::Closed,
            })
    }

    /// Try to become the only broadcast writer for this session
    pub fn begin_broadcast(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        self.in_flight.try_lock().ok()
    }

    pub fn merge_input(&self, msg: &InputMsg) {
        let mut state = self.state.write();
        state.input.merge(msg);
        state.last_seen = Instant::now();
    }

    /// Take this tick's input, clearing one-shots
    pub fn take_input(&self) -> InputState {
        self.state.write().input.take()
    }

    pub fn touch(&self) {
        self.state.write().last_seen = Instant::now();
    }

    pub fn last_seen(&self) -> Instant {
        self.state.read().last_seen
    }

    pub fn last_upgrade(&self) -> f64 {
        self.state.read().last_upgrade
    }

    pub fn set_last_upgrade(&self, at: f64) {
        self.state.write().last_upgrade = at;
    }

    pub fn last_snapshot(&self) -> Option<Arc<ClientSnapshot>> {
        self.state.read().last_snapshot.clone()
    }

    pub fn set_last_snapshot(&self, snapshot: Arc<ClientSnapshot>) {
        self.state.write().last_snapshot = Some(snapshot);
    }

    /// Forget the delta base so the next snapshot is full
    pub fn reset_snapshot(&self) {
        self.state.write().last_snapshot = None;
    }
}
