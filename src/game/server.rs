//! Game server: the world mutex, the tick scheduler and the input router

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::session::Session;
use crate::util::time::{
    secs_to_millis, server_secs, uptime_secs, SIMULATION_TPS, TICK_DURATION_MICROS,
};
use crate::ws::codec::Codec;
use crate::ws::protocol::{InputMsg, ServerMsg};

use super::broadcast::{BroadcastJob, Broadcaster};
use super::snapshot::SnapshotStats;
use super::world::{AttachError, World};

/// Server tuning taken from configuration
#[derive(Debug, Clone, Copy)]
pub struct ServerSettings {
    pub max_players: usize,
    pub bot_count: usize,
    pub seed: u64,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub tick: u64,
    pub players: usize,
    pub bots: usize,
    pub items: usize,
    pub projectiles: usize,
    pub snapshots_sent: u64,
    pub full_snapshots_sent: u64,
    pub snapshots_dropped: u64,
    pub snapshot_bytes: u64,
}

/// Owns the world and drives it
pub struct GameServer {
    world: Mutex<World>,
    broadcaster: Broadcaster,
    codec: Arc<dyn Codec>,
    stats: Arc<SnapshotStats>,
    stop: AtomicBool,
    settings: ServerSettings,
}

impl GameServer {
    pub fn new(settings: ServerSettings, codec: Arc<dyn Codec>) -> Arc<Self> {
        let stats = SnapshotStats::new();
        Arc::new(Self {
            world: Mutex::new(World::new(settings.max_players, settings.seed)),
            broadcaster: Broadcaster::new(codec.clone(), stats.clone()),
            codec,
            stats,
            stop: AtomicBool::new(false),
            settings,
        })
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Spawn the configured bot fleet (once)
    pub fn spawn_bots(&self) {
        self.world
            .lock()
            .spawn_bots(self.settings.bot_count, server_secs());
    }

    pub fn attach(
        &self,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<(Arc<Session>, mpsc::Receiver<Bytes>), AttachError> {
        self.world.lock().attach(name, color, server_secs())
    }

    pub fn detach(&self, session_id: u32) {
        self.world.lock().detach(session_id);
    }

    /// Route one decoded envelope. Profile and start requests take effect
    /// now; everything else waits for the next tick.
    pub fn handle_input(&self, session: &Session, msg: InputMsg) {
        match msg.kind.as_str() {
            "profile" => {
                debug!(session_id = session.id, "Profile update");
                self.world
                    .lock()
                    .update_profile(session.id, msg.name.as_deref(), msg.color.as_deref());
            }
            "startGame" => {
                debug!(session_id = session.id, "Start game");
                self.world
                    .lock()
                    .start_game(session.id, msg.name.as_deref(), msg.color.as_deref());
            }
            _ => session.merge_input(&msg),
        }
    }

    /// Run one tick at `now` and collect what must be broadcast
    pub fn step(&self, now: f64) -> BroadcastJob {
        let mut world = self.world.lock();
        world.tick(now);

        let view = Arc::new(world.view(secs_to_millis(now)));
        let targets = world
            .sessions
            .values()
            .map(|s| {
                let viewer = world.players.get(&s.id).map(|p| (p.x, p.y));
                (s.clone(), viewer)
            })
            .collect();

        let mut events: HashMap<u32, Vec<ServerMsg>> = HashMap::new();
        for (id, msg) in world.take_outbox() {
            events.entry(id).or_default().push(msg);
        }

        BroadcastJob {
            view,
            targets,
            events,
        }
    }

    /// Fixed-rate tick scheduler. Returns once [`GameServer::stop`] is called.
    pub async fn run(self: Arc<Self>) {
        info!(tps = SIMULATION_TPS, "Tick scheduler started");

        let mut ticker = interval(Duration::from_micros(TICK_DURATION_MICROS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.is_stopped() {
            ticker.tick().await;
            let job = self.step(server_secs());
            self.broadcaster.dispatch(job);
        }

        info!("Tick scheduler stopped");
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn health(&self) -> HealthReport {
        let world = self.world.lock();
        HealthReport {
            status: "ok",
            uptime_secs: uptime_secs(),
            tick: world.tick,
            players: world.human_count(),
            bots: world.bot_count(),
            items: world.items.len(),
            projectiles: world.projectiles.len(),
            snapshots_sent: self.stats.snapshots(),
            full_snapshots_sent: self.stats.full_snapshots(),
            snapshots_dropped: self.stats.dropped(),
            snapshot_bytes: self.stats.bytes(),
        }
    }
}
