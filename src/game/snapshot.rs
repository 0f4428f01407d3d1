//! Snapshot building and delta compression

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::util::math::dist_sq;
use crate::util::time::secs_to_millis;
use crate::ws::protocol::{
    BulletSnapshot, CannonSnapshot, DebugInfo, DeltaSnapshot, FullSnapshot, ItemSnapshot,
    ModuleSnapshot, PlayerDelta, PlayerSnapshot, ServerMsg, ShipSnapshot, TurretSnapshot,
};

use super::constants::{BASE_SHIP_TURN_SPEED, BULLET_VISIBLE_RANGE, MAX_VISIBLE_BULLETS};
use super::items::Item;
use super::player::Player;
use super::ship::{Cannon, Module, ShipConfig, Slot, Turret};
use super::weapons::{cannon_dps, turret_dps, Projectile};

/// Applies a field-wise macro to every delta-eligible player field
macro_rules! player_fields {
    ($m:ident!($($args:tt)*)) => {
        $m!($($args)*;
            name, color, is_bot, x, y, vx, vy, angle, health, max_health, state,
            level, experience, coins, score, upgrade_points, stats, autofire,
            killed_by, killed_by_name, score_at_death, survival_seconds,
            respawn_ready_at, ship, debug)
    };
}

macro_rules! diff_fields {
    ($prev:ident, $next:ident, $delta:ident; $($field:ident),+) => {
        $(
            if $prev.$field != $next.$field {
                $delta.$field = Some($next.$field.clone());
            }
        )+
    };
}

macro_rules! fill_fields {
    ($src:ident, $delta:ident; $($field:ident),+) => {
        $( $delta.$field = Some($src.$field.clone()); )+
    };
}

#[cfg(test)]
macro_rules! apply_fields {
    ($target:ident, $delta:ident; $($field:ident),+) => {
        $(
            if let Some(v) = &$delta.$field {
                $target.$field = v.clone();
            }
        )+
    };
}

#[cfg(test)]
macro_rules! build_from_delta {
    ($delta:ident; $($field:ident),+) => {
        PlayerSnapshot {
            id: $delta.id,
            $( $field: $delta.$field.clone()?, )+
        }
    };
}

fn cannon_snapshot(cannon: &Cannon) -> CannonSnapshot {
    CannonSnapshot {
        x: cannon.x,
        y: cannon.y,
        angle: cannon.angle,
        kind: cannon.kind,
        recoil: secs_to_millis(cannon.recoil_time),
    }
}

fn turret_snapshot(turret: &Turret) -> TurretSnapshot {
    TurretSnapshot {
        x: turret.x,
        y: turret.y,
        angle: turret.angle,
        kind: turret.kind,
        cannons: turret.cannons.iter().map(cannon_snapshot).collect(),
        recoil: secs_to_millis(turret.last_fire),
    }
}

fn module_snapshot(module: &Module) -> ModuleSnapshot {
    ModuleSnapshot {
        name: module.name().to_string(),
        count: module.count,
        cannons: module.cannons.iter().map(cannon_snapshot).collect(),
        turrets: module.turrets.iter().map(turret_snapshot).collect(),
    }
}

pub fn ship_snapshot(ship: &ShipConfig) -> ShipSnapshot {
    ShipSnapshot {
        length: ship.length,
        width: ship.width,
        side: ship.side.as_ref().map(module_snapshot),
        top: ship.top.as_ref().map(module_snapshot),
        front: ship.front.as_ref().map(module_snapshot),
        rear: ship.rear.as_ref().map(module_snapshot),
    }
}

/// DPS breakdown and effective speeds for the debug overlay
pub fn debug_info(player: &Player) -> DebugInfo {
    let mods = &player.modifiers;
    let slot_dps = |slot: Slot| {
        player.ship.slot(slot).map_or(0.0, |m| {
            let turrets: f32 = m.turrets.iter().map(|t| turret_dps(t, mods)).sum();
            cannon_dps(&m.cannons, mods) + turrets
        })
    };
    let side_dps = slot_dps(Slot::Side);
    let top_dps = slot_dps(Slot::Top);
    let front_dps = slot_dps(Slot::Front);
    let rear_dps = slot_dps(Slot::Rear);

    DebugInfo {
        side_dps,
        top_dps,
        front_dps,
        rear_dps,
        total_dps: side_dps + top_dps + front_dps + rear_dps,
        max_speed: player.max_speed(),
        turn_speed: BASE_SHIP_TURN_SPEED * mods.turn_speed,
        reload_multiplier: mods.reload,
        regen_per_second: mods.regen,
    }
}

pub fn player_snapshot(player: &Player) -> PlayerSnapshot {
    PlayerSnapshot {
        id: player.id,
        name: player.name.clone(),
        color: player.color.clone(),
        is_bot: player.is_bot,
        x: player.x,
        y: player.y,
        vx: player.vx,
        vy: player.vy,
        angle: player.angle,
        health: player.health,
        max_health: player.max_health,
        state: player.state,
        level: player.level,
        experience: player.experience,
        coins: player.coins,
        score: player.score,
        upgrade_points: player.upgrade_points,
        stats: player
            .stats
            .iter()
            .map(|(stat, level)| (stat.name().to_string(), level))
            .collect(),
        autofire: player.autofire,
        killed_by: player.killed_by,
        killed_by_name: player.killed_by_name.clone(),
        score_at_death: player.score_at_death,
        survival_seconds: player.survival_seconds as f32,
        respawn_ready_at: secs_to_millis(player.respawn_ready_at),
        ship: ship_snapshot(&player.ship),
        debug: debug_info(player),
    }
}

pub fn item_snapshot(item: &Item) -> ItemSnapshot {
    ItemSnapshot {
        id: item.id,
        x: item.x,
        y: item.y,
        kind: item.kind,
        coins: item.coins,
        xp: item.xp,
    }
}

pub fn bullet_snapshot(bullet: &Projectile) -> BulletSnapshot {
    BulletSnapshot {
        id: bullet.id,
        owner_id: bullet.owner_id,
        x: bullet.x,
        y: bullet.y,
        vx: bullet.vx,
        vy: bullet.vy,
        radius: bullet.radius,
        created_at: secs_to_millis(bullet.created_at),
    }
}

/// Serializable copy of the world taken at the end of a tick, shared by all
/// per-session broadcast tasks.
#[derive(Debug, Clone, Default)]
pub struct WorldView {
    pub time: u64,
    pub players: Vec<PlayerSnapshot>,
    pub items: Vec<ItemSnapshot>,
    pub bullets: Vec<BulletSnapshot>,
}

impl WorldView {
    pub fn capture<'a>(
        time: u64,
        players: impl Iterator<Item = &'a Player>,
        items: impl Iterator<Item = &'a Item>,
        bullets: impl Iterator<Item = &'a Projectile>,
    ) -> Self {
        let mut players: Vec<PlayerSnapshot> = players.map(player_snapshot).collect();
        players.sort_by_key(|p| p.id);
        Self {
            time,
            players,
            items: items.map(item_snapshot).collect(),
            bullets: bullets.map(bullet_snapshot).collect(),
        }
    }

    /// The snapshot a given client should see
    pub fn for_client(&self, viewer: Option<(f32, f32)>) -> ClientSnapshot {
        let bullets = match viewer {
            Some((vx, vy)) => {
                let range_sq = BULLET_VISIBLE_RANGE * BULLET_VISIBLE_RANGE;
                let mut visible: Vec<(f32, &BulletSnapshot)> = self
                    .bullets
                    .iter()
                    .map(|b| (dist_sq(vx, vy, b.x, b.y), b))
                    .filter(|(d, _)| *d <= range_sq)
                    .collect();
                visible.sort_by(|a, b| a.0.total_cmp(&b.0));
                visible
                    .into_iter()
                    .take(MAX_VISIBLE_BULLETS)
                    .map(|(_, b)| (b.id, b.clone()))
                    .collect()
            }
            None => BTreeMap::new(),
        };

        ClientSnapshot {
            time: self.time,
            players: self.players.iter().map(|p| (p.id, p.clone())).collect(),
            items: self.items.iter().map(|i| (i.id, i.clone())).collect(),
            bullets,
        }
    }
}

/// What one client has been sent (or reconstructed)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientSnapshot {
    pub time: u64,
    pub players: BTreeMap<u32, PlayerSnapshot>,
    pub items: BTreeMap<u32, ItemSnapshot>,
    pub bullets: BTreeMap<u32, BulletSnapshot>,
}

impl ClientSnapshot {
    pub fn to_full(&self) -> FullSnapshot {
        FullSnapshot {
            time: self.time,
            players: self.players.values().cloned().collect(),
            items: self.items.values().cloned().collect(),
            bullets: self.bullets.values().cloned().collect(),
        }
    }

    /// Changes from `prev` to `self`
    pub fn diff(&self, prev: &ClientSnapshot) -> DeltaSnapshot {
        let players = self
            .players
            .values()
            .filter_map(|next| match prev.players.get(&next.id) {
                Some(before) => diff_player(before, next),
                None => Some(full_player_delta(next)),
            })
            .collect();

        DeltaSnapshot {
            time: self.time,
            players,
            removed_players: removed_ids(&prev.players, &self.players),
            added_items: added(&prev.items, &self.items),
            removed_items: removed_ids(&prev.items, &self.items),
            added_bullets: added(&prev.bullets, &self.bullets),
            removed_bullets: removed_ids(&prev.bullets, &self.bullets),
        }
    }

    /// Apply a delta the way a client would. Returns false if the delta
    /// introduced a player without all fields present.
    #[cfg(test)]
    pub fn apply(&mut self, delta: &DeltaSnapshot) -> bool {
        let mut complete = true;
        self.time = delta.time;

        for id in &delta.removed_players {
            self.players.remove(id);
        }
        for d in &delta.players {
            match self.players.get_mut(&d.id) {
                Some(p) => apply_player_delta(p, d),
                None => match player_from_delta(d) {
                    Some(p) => {
                        self.players.insert(p.id, p);
                    }
                    None => complete = false,
                },
            }
        }

        for id in &delta.removed_items {
            self.items.remove(id);
        }
        for item in &delta.added_items {
            self.items.insert(item.id, item.clone());
        }

        for id in &delta.removed_bullets {
            self.bullets.remove(id);
        }
        for bullet in &delta.added_bullets {
            self.bullets.insert(bullet.id, bullet.clone());
        }
        complete
    }

    /// Full snapshot when there is no base, delta otherwise
    pub fn message(&self, prev: Option<&ClientSnapshot>) -> ServerMsg {
        match prev {
            Some(prev) => ServerMsg::DeltaSnapshot(self.diff(prev)),
            None => ServerMsg::Snapshot(self.to_full()),
        }
    }
}

fn added<T: Clone>(prev: &BTreeMap<u32, T>, next: &BTreeMap<u32, T>) -> Vec<T> {
    next.iter()
        .filter(|(id, _)| !prev.contains_key(id))
        .map(|(_, v)| v.clone())
        .collect()
}

fn removed_ids<T, U>(prev: &BTreeMap<u32, T>, next: &BTreeMap<u32, U>) -> Vec<u32> {
    prev.keys().filter(|id| !next.contains_key(id)).copied().collect()
}

/// Field-level delta, or `None` when nothing changed
pub fn diff_player(prev: &PlayerSnapshot, next: &PlayerSnapshot) -> Option<PlayerDelta> {
    let mut delta = PlayerDelta {
        id: next.id,
        ..Default::default()
    };
    player_fields!(diff_fields!(prev, next, delta));

    let empty = PlayerDelta {
        id: next.id,
        ..Default::default()
    };
    (delta != empty).then_some(delta)
}

/// Delta carrying every field, for players new to this client
pub fn full_player_delta(player: &PlayerSnapshot) -> PlayerDelta {
    let mut delta = PlayerDelta {
        id: player.id,
        ..Default::default()
    };
    player_fields!(fill_fields!(player, delta));
    delta
}

#[cfg(test)]
fn apply_player_delta(target: &mut PlayerSnapshot, delta: &PlayerDelta) {
    player_fields!(apply_fields!(target, delta));
}

#[cfg(test)]
fn player_from_delta(delta: &PlayerDelta) -> Option<PlayerSnapshot> {
    Some(player_fields!(build_from_delta!(delta)))
}

/// Lock-free broadcast counters
#[derive(Debug, Default)]
pub struct SnapshotStats {
    snapshots: AtomicU64,
    full_snapshots: AtomicU64,
    bytes: AtomicU64,
    dropped: AtomicU64,
}

impl SnapshotStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_sent(&self, bytes: usize, full: bool) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        if full {
            self.full_snapshots.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }

    pub fn full_snapshots(&self) -> u64 {
        self.full_snapshots.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
