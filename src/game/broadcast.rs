//! Per-session snapshot fan-out
//!
//! Each tick hands the broadcaster one shared [`WorldView`]. One short-lived
//! task per session filters it, diffs against the session's last snapshot,
//! encodes and enqueues. None of this touches the world lock.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::session::{SendError, Session};
use crate::ws::codec::Codec;
use crate::ws::protocol::ServerMsg;

use super::snapshot::{SnapshotStats, WorldView};

/// Everything produced by one tick for delivery
pub struct BroadcastJob {
    pub view: Arc<WorldView>,
    /// Sessions and the position of their ship, if any
    pub targets: Vec<(Arc<Session>, Option<(f32, f32)>)>,
    /// Queued per-session messages, sent ahead of the snapshot
    pub events: HashMap<u32, Vec<ServerMsg>>,
}

/// Result of one session's delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent { bytes: usize, full: bool },
    /// Queue stayed full past the send deadline
    Dropped,
    /// The previous tick's delivery is still running
    Skipped,
    Closed,
}

#[derive(Clone)]
pub struct Broadcaster {
    codec: Arc<dyn Codec>,
    stats: Arc<SnapshotStats>,
}

impl Broadcaster {
    pub fn new(codec: Arc<dyn Codec>, stats: Arc<SnapshotStats>) -> Self {
        Self { codec, stats }
    }

    /// Launch one delivery task per target session
    pub fn dispatch(&self, job: BroadcastJob) {
        let BroadcastJob {
            view,
            targets,
            mut events,
        } = job;

        for (session, viewer) in targets {
            let events = events.remove(&session.id).unwrap_or_default();
            let view = view.clone();
            let this = self.clone();
            tokio::spawn(async move {
                this.deliver(&session, &view, viewer, events).await;
            });
        }
    }

    /// Send queued events, then this tick's full or delta snapshot. The
    /// session's delta base only advances when the snapshot was enqueued.
    pub async fn deliver(
        &self,
        session: &Session,
        view: &WorldView,
        viewer: Option<(f32, f32)>,
        events: Vec<ServerMsg>,
    ) -> Delivery {
        let Some(_gate) = session.begin_broadcast() else {
            for event in &events {
                if let Ok(frame) = self.codec.encode(event) {
                    let _ = session.try_send(frame);
                }
            }
            self.stats.record_dropped();
            debug!(session_id = session.id, "Previous snapshot still in flight, skipping");
            return Delivery::Skipped;
        };

        for event in &events {
            let frame = match self.codec.encode(event) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(session_id = session.id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            match session.send(frame).await {
                Ok(()) => {}
                Err(SendError::Closed) => return Delivery::Closed,
                Err(SendError::Full) => {
                    debug!(session_id = session.id, "Dropped event for slow client");
                }
            }
        }

        let snapshot = view.for_client(viewer);
        let base = session.last_snapshot();
        let full = base.is_none();
        let msg = snapshot.message(base.as_deref());

        let frame = match self.codec.encode(&msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = session.id, error = %e, "Failed to encode snapshot");
                return Delivery::Dropped;
            }
        };
        let bytes = frame.len();

        match session.send(frame).await {
            Ok(()) => {
                session.set_last_snapshot(Arc::new(snapshot));
                self.stats.record_sent(bytes, full);
                Delivery::Sent { bytes, full }
            }
            Err(SendError::Full) => {
                self.stats.record_dropped();
                debug!(session_id = session.id, "Dropped snapshot for slow client");
                Delivery::Dropped
            }
            Err(SendError::Closed) => Delivery::Closed,
        }
    }
}
