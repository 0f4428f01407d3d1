//! World store and the strictly ordered simulation tick

use bytes::Bytes;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::session::Session;
use crate::util::math::dist_sq;
use crate::util::sanitize::{sanitize_color, sanitize_name};
use crate::util::time::{secs_to_millis, tick_delta};
use crate::ws::protocol::{GameEvent, ServerMsg, UpgradeOption};

use super::bot::{bot_spawn_points, equip_bot, Bot};
use super::combat::{CombatSystem, DamageCause, KillReport};
use super::constants::{
    BASE_COLLISION_DAMAGE, BOT_SPAWN_OFFSET, BULLET_HIT_PREFILTER, BULLET_LIFETIME,
    CLEANUP_INTERVAL_TICKS, COLLISION_COOLDOWN, DEFAULT_PLAYER_COLOR, ITEM_RADIUS,
    ITEM_SPAWN_PER_TICK, MAX_ITEMS, MAX_ITEMS_HARD_CAP, MAX_PROJECTILES, PROJECTILE_GRACE,
    RAM_CONE, RAM_DAMAGE, WORLD_HEIGHT, WORLD_WIDTH,
};
use super::input::{apply_actions, apply_module_choice};
use super::items::{Item, ItemSpawner};
use super::physics::{MovementKeys, PhysicsSystem};
use super::player::Player;
use super::ship::{Aabb, ModuleKind, Slot, NEVER};
use super::snapshot::{ship_snapshot, WorldView};
use super::upgrades::available_modules;
use super::weapons::{aim_turrets, fire_weapons, BulletSpawn, Projectile};

/// Keeps random spawns away from the world edge
const SPAWN_MARGIN: f32 = 200.0;

const BOT_COLORS: [&str; 4] = ["#C0392B", "#8E44AD", "#D35400", "#16A085"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachError {
    #[error("server is full ({max} players)")]
    ServerFull { max: usize },
}

/// Pending damage from one ship touching another
struct ContactHit {
    victim: u32,
    attacker: u32,
    damage: i32,
    cause: DamageCause,
}

/// All authoritative game state. Guarded by a single mutex in the server.
pub struct World {
    pub players: HashMap<u32, Player>,
    pub bots: BTreeMap<u32, Bot>,
    pub items: BTreeMap<u32, Item>,
    pub projectiles: BTreeMap<u32, Projectile>,
    pub sessions: HashMap<u32, Arc<Session>>,
    pub tick: u64,
    pub bots_spawned: bool,
    max_players: usize,
    next_player_id: u32,
    next_item_id: u32,
    next_projectile_id: u32,
    rng: ChaCha8Rng,
    /// Per-session messages delivered ahead of the next snapshot
    outbox: Vec<(u32, ServerMsg)>,
}

impl World {
    pub fn new(max_players: usize, seed: u64) -> Self {
        Self {
            players: HashMap::new(),
            bots: BTreeMap::new(),
            items: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            sessions: HashMap::new(),
            tick: 0,
            bots_spawned: false,
            max_players,
            next_player_id: 1,
            next_item_id: 1,
            next_projectile_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
            outbox: Vec::new(),
        }
    }

    pub fn human_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_bot).count()
    }

    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }

    fn alloc_player_id(&mut self) -> u32 {
        let id = self.next_player_id;
        self.next_player_id = self.next_player_id.wrapping_add(1).max(1);
        id
    }

    fn random_spawn(&mut self) -> (f32, f32) {
        (
            self.rng.gen_range(SPAWN_MARGIN..WORLD_WIDTH - SPAWN_MARGIN),
            self.rng.gen_range(SPAWN_MARGIN..WORLD_HEIGHT - SPAWN_MARGIN),
        )
    }

    /// Register a new human session and its ship
    pub fn attach(
        &mut self,
        name: Option<&str>,
        color: Option<&str>,
        now: f64,
    ) -> Result<(Arc<Session>, mpsc::Receiver<Bytes>), AttachError> {
        if self.human_count() >= self.max_players {
            return Err(AttachError::ServerFull {
                max: self.max_players,
            });
        }

        let id = self.alloc_player_id();
        let (x, y) = self.random_spawn();
        let name = name
            .and_then(sanitize_name)
            .unwrap_or_else(|| format!("Sailor {id}"));
        let color = color
            .and_then(sanitize_color)
            .unwrap_or_else(|| DEFAULT_PLAYER_COLOR.to_string());

        let player = Player::new(id, name, color, x, y, now);
        let (session, rx) = Session::new(id);

        self.outbox.push((
            id,
            ServerMsg::Welcome {
                player_id: id,
                server_time: secs_to_millis(now),
            },
        ));
        self.outbox.push((id, upgrades_message(&player)));
        self.players.insert(id, player);
        self.sessions.insert(id, session.clone());

        info!(player_id = id, humans = self.human_count(), "Player attached");
        Ok((session, rx))
    }

    /// Remove a session and its ship. Returns whether it was present.
    pub fn detach(&mut self, id: u32) -> bool {
        let session = self.sessions.remove(&id);
        if let Some(session) = &session {
            session.close();
        }
        self.players.remove(&id);
        self.outbox.retain(|(target, _)| *target != id);
        if session.is_some() {
            info!(player_id = id, humans = self.human_count(), "Player detached");
        }
        session.is_some()
    }

    /// Apply a sanitized name and color; invalid values are ignored
    pub fn update_profile(&mut self, id: u32, name: Option<&str>, color: Option<&str>) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if let Some(name) = name.and_then(sanitize_name) {
            player.name = name;
        }
        if let Some(color) = color.and_then(sanitize_color) {
            player.color = color;
        }
    }

    /// Profile update plus a respawn request and a fresh upgrade list. The
    /// client rebuilds its scene, so its next snapshot is full.
    pub fn start_game(&mut self, id: u32, name: Option<&str>, color: Option<&str>) {
        self.update_profile(id, name, color);
        if let Some(session) = self.sessions.get(&id) {
            session.reset_snapshot();
        }
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if !player.is_alive() {
            player.wants_respawn = true;
        }
        let msg = upgrades_message(player);
        self.outbox.push((id, msg));
    }

    /// Spawn the bot fleet. Only the first call has any effect.
    pub fn spawn_bots(&mut self, count: usize, now: f64) {
        if self.bots_spawned {
            return;
        }
        self.bots_spawned = true;

        let spawns = bot_spawn_points(count, BOT_SPAWN_OFFSET);
        for (n, (x, y, orbit)) in spawns.into_iter().enumerate() {
            let id = self.alloc_player_id();
            let color = BOT_COLORS[n % BOT_COLORS.len()].to_string();
            let mut player = Player::new(id, format!("Bot {}", n + 1), color, x, y, now);
            player.is_bot = true;
            equip_bot(&mut player);
            self.players.insert(id, player);
            self.bots.insert(id, Bot::new(id, x, y, orbit));
        }
        info!(count, "Bots spawned");
    }

    /// Messages queued for sessions since the last call
    pub fn take_outbox(&mut self) -> Vec<(u32, ServerMsg)> {
        std::mem::take(&mut self.outbox)
    }

    /// Serializable copy of the world for the broadcaster
    pub fn view(&self, time: u64) -> WorldView {
        WorldView::capture(
            time,
            self.players.values(),
            self.items.values(),
            self.projectiles.values(),
        )
    }

    /// Advance the simulation one tick at server time `now`
    pub fn tick(&mut self, now: f64) {
        self.tick += 1;
        let dt = tick_delta();
        let points_before: HashMap<u32, u32> = self
            .sessions
            .keys()
            .filter_map(|id| self.players.get(id).map(|p| (*id, p.upgrade_points)))
            .collect();

        self.update_humans(now, dt);
        self.update_bots(now, dt);
        self.respawn_pass(now);
        self.update_projectiles(now, dt);
        self.collect_items();
        self.spawn_items();
        self.resolve_collisions(now);

        if self.tick % CLEANUP_INTERVAL_TICKS == 0 {
            self.cleanup(now);
        }

        for (id, before) in points_before {
            if let Some(player) = self.players.get(&id) {
                if player.upgrade_points != before {
                    self.outbox.push((id, upgrades_message(player)));
                }
            }
        }
    }

    fn sorted_player_ids(&self, filter: impl Fn(&Player) -> bool) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .players
            .values()
            .filter(|p| filter(p))
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Movement, aiming, regen and firing for a living ship
    fn advance_player(
        player: &mut Player,
        keys: MovementKeys,
        manual_fire: bool,
        now: f64,
        dt: f32,
    ) -> Vec<BulletSpawn> {
        if !player.is_alive() {
            return Vec::new();
        }
        PhysicsSystem::update_ship(player, keys, dt);
        aim_turrets(player);
        CombatSystem::regenerate(player, now);
        fire_weapons(player, manual_fire, now)
    }

    fn register_projectiles(&mut self, spawns: Vec<BulletSpawn>, now: f64) {
        for spawn in spawns {
            let id = self.next_projectile_id;
            self.next_projectile_id = self.next_projectile_id.wrapping_add(1);
            self.projectiles.insert(
                id,
                Projectile {
                    id,
                    owner_id: spawn.owner_id,
                    x: spawn.x,
                    y: spawn.y,
                    vx: spawn.vx,
                    vy: spawn.vy,
                    created_at: now,
                    radius: spawn.radius,
                    damage: spawn.damage,
                },
            );
        }
    }

    /// Phase 1: humans, with the latest input from their session
    fn update_humans(&mut self, now: f64, dt: f32) {
        for id in self.sorted_player_ids(|p| !p.is_bot) {
            let session = self.sessions.get(&id).cloned();
            let input = session
                .as_ref()
                .map(|s| s.take_input())
                .unwrap_or_default();

            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            if let Some((mx, my)) = input.mouse {
                player.mouse_x = mx;
                player.mouse_y = my;
            }
            if input.respawn {
                player.wants_respawn = true;
            }

            apply_actions(player, &input.actions, now);

            if let Some((slot, name)) = &input.module_choice {
                let mut last_upgrade = session.as_ref().map_or(NEVER, |s| s.last_upgrade());
                if apply_module_choice(player, *slot, name, &mut last_upgrade, now) {
                    if let Some(session) = &session {
                        session.set_last_upgrade(last_upgrade);
                    }
                    self.outbox.push((id, upgrades_message(player)));
                }
            }

            let spawns = Self::advance_player(player, input.keys, input.manual_fire, now, dt);
            self.register_projectiles(spawns, now);
        }
    }

    /// Phase 2: bots decide, then run through the same update path
    fn update_bots(&mut self, now: f64, dt: f32) {
        let ids: Vec<u32> = self.bots.keys().copied().collect();
        for id in ids {
            let Some(me) = self.players.get(&id) else {
                continue;
            };
            if !me.is_alive() {
                continue;
            }
            let Some(bot) = self.bots.get_mut(&id) else {
                continue;
            };
            let input = bot.think(me, &self.players, now);

            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            player.autofire = input.autofire;
            player.mouse_x = input.mouse_x;
            player.mouse_y = input.mouse_y;

            let spawns = Self::advance_player(player, input.keys, false, now, dt);
            self.register_projectiles(spawns, now);
        }
    }

    /// Phase 3: bots come back on their own, humans when they ask
    fn respawn_pass(&mut self, now: f64) {
        for id in self.sorted_player_ids(|p| !p.is_alive() || p.wants_respawn) {
            let Some((ready, requested)) = self.players.get(&id).map(|p| {
                (!p.is_alive() && now >= p.respawn_ready_at, p.wants_respawn)
            }) else {
                continue;
            };

            if let Some(bot) = self.bots.get_mut(&id) {
                if !ready {
                    continue;
                }
                let (gx, gy) = (bot.guard_x, bot.guard_y);
                bot.reset();
                if let Some(player) = self.players.get_mut(&id) {
                    player.reset_to_baseline(gx, gy, now);
                    equip_bot(player);
                }
                debug!(player_id = id, "Bot respawned");
                continue;
            }

            if ready && requested {
                let (x, y) = self.random_spawn();
                let Some(player) = self.players.get_mut(&id) else {
                    continue;
                };
                CombatSystem::respawn_human(player, x, y, now);
                let reset = ServerMsg::ResetShipConfig {
                    ship: ship_snapshot(&player.ship),
                };
                let upgrades = upgrades_message(player);
                self.outbox.push((id, reset));
                self.outbox.push((id, upgrades));
                info!(player_id = id, "Player respawned");
            } else if let Some(player) = self.players.get_mut(&id) {
                player.wants_respawn = false;
            }
        }
    }

    fn bullet_touches(bullet: &Projectile, player: &Player) -> bool {
        let reach = BULLET_HIT_PREFILTER + player.ship.length / 2.0;
        if dist_sq(bullet.x, bullet.y, player.x, player.y) > reach * reach {
            return false;
        }
        PhysicsSystem::bullet_hits_box(bullet, &player.bounding_box())
    }

    /// Phase 4: integrate, cull, then resolve hits one bullet at a time
    fn update_projectiles(&mut self, now: f64, dt: f32) {
        self.projectiles.retain(|_, bullet| {
            bullet.integrate(dt);
            bullet.age(now) <= BULLET_LIFETIME && !PhysicsSystem::bullet_out_of_bounds(bullet)
        });

        let targets = self.sorted_player_ids(|_| true);
        let bullet_ids: Vec<u32> = self.projectiles.keys().copied().collect();
        for bullet_id in bullet_ids {
            let Some(bullet) = self.projectiles.get(&bullet_id) else {
                continue;
            };
            let victim = targets.iter().copied().find(|vid| {
                self.players.get(vid).is_some_and(|p| {
                    p.id != bullet.owner_id && p.is_alive() && Self::bullet_touches(bullet, p)
                })
            });
            let Some(victim) = victim else {
                continue;
            };

            let (owner, damage) = (bullet.owner_id, bullet.damage.max(1));
            self.projectiles.remove(&bullet_id);
            if let Some(report) = CombatSystem::apply_damage(
                &mut self.players,
                victim,
                Some(owner),
                damage,
                DamageCause::Bullet,
                now,
            ) {
                self.on_kill(report);
            }
        }
    }

    fn item_touches(aabb: &Aabb, item: &Item) -> bool {
        let (cx, cy) = aabb.closest_point(item.x, item.y);
        dist_sq(cx, cy, item.x, item.y) <= ITEM_RADIUS * ITEM_RADIUS
    }

    /// Phase 5a: pickups
    fn collect_items(&mut self) {
        for id in self.sorted_player_ids(Player::is_alive) {
            let Some(player) = self.players.get(&id) else {
                continue;
            };
            let aabb = player.bounding_box();
            let picked: Vec<u32> = self
                .items
                .values()
                .filter(|item| Self::item_touches(&aabb, item))
                .map(|item| item.id)
                .collect();

            for item_id in picked {
                let (Some(item), Some(player)) =
                    (self.items.remove(&item_id), self.players.get_mut(&id))
                else {
                    continue;
                };
                player.coins += item.coins;
                player.grant_xp(item.xp);
            }
        }
    }

    /// Phase 5b: top the item population back up
    fn spawn_items(&mut self) {
        let count = ItemSpawner::spawn_count(self.items.len(), MAX_ITEMS, ITEM_SPAWN_PER_TICK);
        for _ in 0..count {
            let id = self.next_item_id;
            self.next_item_id = self.next_item_id.wrapping_add(1);
            let item = ItemSpawner::roll(&mut self.rng, id);
            self.items.insert(id, item);
        }
    }

    fn contact_damage(attacker: &mut Player, victim: &Player, now: f64, out: &mut Vec<ContactHit>) {
        if now - attacker.last_collision_damage < COLLISION_COOLDOWN {
            return;
        }
        attacker.last_collision_damage = now;

        let damage = (BASE_COLLISION_DAMAGE + attacker.modifiers.body_damage).floor() as i32;
        out.push(ContactHit {
            victim: victim.id,
            attacker: attacker.id,
            damage: damage.max(1),
            cause: DamageCause::Collision,
        });

        let has_ram = attacker
            .ship
            .slot(Slot::Front)
            .is_some_and(|m| m.kind == ModuleKind::Ram);
        if has_ram && PhysicsSystem::is_facing(attacker, victim, RAM_CONE) {
            out.push(ContactHit {
                victim: victim.id,
                attacker: attacker.id,
                damage: RAM_DAMAGE as i32,
                cause: DamageCause::Ram,
            });
        }
    }

    /// Phase 6: pairwise separation, contact damage and rams
    fn resolve_collisions(&mut self, now: f64) {
        let ids = self.sorted_player_ids(Player::is_alive);
        let mut hits = Vec::new();

        for (i, &a_id) in ids.iter().enumerate() {
            for &b_id in &ids[i + 1..] {
                let overlapping = match (self.players.get(&a_id), self.players.get(&b_id)) {
                    (Some(a), Some(b)) => {
                        a.is_alive() && b.is_alive() && a.bounding_box().overlaps(&b.bounding_box())
                    }
                    _ => false,
                };
                if !overlapping {
                    continue;
                }

                let Some(mut a) = self.players.remove(&a_id) else {
                    continue;
                };
                let Some(mut b) = self.players.remove(&b_id) else {
                    self.players.insert(a_id, a);
                    continue;
                };

                PhysicsSystem::resolve_ship_collision(&mut a, &mut b, &mut self.rng);
                Self::contact_damage(&mut a, &b, now, &mut hits);
                Self::contact_damage(&mut b, &a, now, &mut hits);

                self.players.insert(a_id, a);
                self.players.insert(b_id, b);

                for hit in hits.drain(..) {
                    if let Some(report) = CombatSystem::apply_damage(
                        &mut self.players,
                        hit.victim,
                        Some(hit.attacker),
                        hit.damage,
                        hit.cause,
                        now,
                    ) {
                        self.on_kill(report);
                    }
                }
            }
        }
    }

    fn on_kill(&mut self, report: KillReport) {
        info!(
            victim_id = report.victim_id,
            killer_id = report.killer_id.unwrap_or(0),
            cause = ?report.cause,
            "Ship sunk"
        );

        let Some(killer_id) = report.killer_id else {
            return;
        };
        if report.killer_is_bot
            || killer_id == report.victim_id
            || !self.sessions.contains_key(&killer_id)
        {
            return;
        }
        self.outbox.push((
            killer_id,
            ServerMsg::GameEvent {
                event: GameEvent::PlayerSunk {
                    killer_id,
                    victim_id: report.victim_id,
                    victim_name: report.victim_name,
                    cause: report.cause,
                    xp_reward: report.xp_reward,
                    coin_reward: report.coin_reward,
                },
            },
        ));
    }

    /// Periodic population caps; oldest entries go first
    fn cleanup(&mut self, now: f64) {
        let before = (self.projectiles.len(), self.items.len());
        self.projectiles
            .retain(|_, b| b.age(now) <= BULLET_LIFETIME + PROJECTILE_GRACE);
        while self.projectiles.len() > MAX_PROJECTILES {
            self.projectiles.pop_first();
        }
        while self.items.len() > MAX_ITEMS_HARD_CAP {
            self.items.pop_first();
        }
        debug!(
            tick = self.tick,
            projectiles_removed = before.0 - self.projectiles.len(),
            items_removed = before.1 - self.items.len(),
            "Cleanup pass"
        );
    }
}

/// Per-slot module options and the remaining points
pub fn upgrades_message(player: &Player) -> ServerMsg {
    let upgrades = Slot::ALL
        .iter()
        .map(|slot| {
            let options = available_modules(&player.ship, *slot)
                .into_iter()
                .map(|key| UpgradeOption {
                    name: key.kind.name().to_string(),
                    label: key.kind.label().to_string(),
                    count: key.count,
                })
                .collect();
            (slot.as_str().to_string(), options)
        })
        .collect();
    ServerMsg::AvailableUpgrades {
        upgrades,
        upgrade_points: player.upgrade_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::{BOT_COUNT, PLAYER_SIZE, RESPAWN_DELAY};
    use crate::game::player::LifeState;
    use crate::game::upgrades::StatType;
    use crate::ws::protocol::{ActionMsg, InputMsg};

    fn world() -> World {
        World::new(4, 42)
    }

    fn place(world: &mut World, id: u32, x: f32, y: f32) {
        let player = Player::new(id, format!("P{id}"), "#FFFFFF".into(), x, y, 0.0);
        world.players.insert(id, player);
        world.next_player_id = world.next_player_id.max(id + 1);
    }

    #[test]
    fn test_solo_shot_hits_stationary_victim() {
        let mut w = world();
        place(&mut w, 1, 1000.0, 1000.0);
        place(&mut w, 2, 1000.0, 1050.0);
        w.players.get_mut(&1).unwrap().autofire = true;
        w.players.get_mut(&2).unwrap().modifiers.regen = 0.0;

        w.tick(10.0);
        assert_eq!(w.players[&2].health, 94);
        w.tick(10.5);
        assert_eq!(w.players[&2].health, 94);
        w.tick(11.0);
        assert_eq!(w.players[&2].health, 88);
        // Only the port-side bullets remain in flight
        assert!(w.projectiles.values().all(|b| b.vy < 0.0));
        assert_eq!(w.projectiles.len(), 2);
    }

    #[test]
    fn test_bullet_skips_owner() {
        let mut w = world();
        place(&mut w, 1, 1000.0, 1000.0);
        w.players.get_mut(&1).unwrap().autofire = true;
        w.tick(1.0);
        w.tick(1.1);
        assert_eq!(w.players[&1].health, 100);
    }

    #[test]
    fn test_attach_sends_welcome_and_upgrades() {
        let mut w = world();
        let (session, _rx) = w.attach(Some("  Ahab "), Some("ff0000"), 1.0).unwrap();
        let player = &w.players[&session.id];
        assert_eq!(player.name, "Ahab");
        assert_eq!(player.color, "#FF0000");

        let outbox = w.take_outbox();
        assert!(matches!(
            outbox[0].1,
            ServerMsg::Welcome { player_id, .. } if player_id == session.id
        ));
        assert!(matches!(outbox[1].1, ServerMsg::AvailableUpgrades { .. }));
    }

    #[test]
    fn test_start_game_forces_full_snapshot() {
        let mut w = world();
        let (session, _rx) = w.attach(None, None, 0.0).unwrap();
        let snapshot = w.view(0).for_client(None);
        session.set_last_snapshot(Arc::new(snapshot));
        w.take_outbox();

        w.start_game(session.id, Some("Nemo"), None);
        assert!(session.last_snapshot().is_none());
        assert_eq!(w.players[&session.id].name, "Nemo");
        assert!(matches!(w.take_outbox()[0].1, ServerMsg::AvailableUpgrades { .. }));
    }

    #[test]
    fn test_attach_rejects_when_full() {
        let mut w = World::new(1, 1);
        w.spawn_bots(BOT_COUNT, 0.0);
        let _first = w.attach(None, None, 0.0).unwrap();
        assert_eq!(
            w.attach(None, None, 0.0).unwrap_err(),
            AttachError::ServerFull { max: 1 }
        );
    }

    #[test]
    fn test_detach_removes_player_and_session() {
        let mut w = world();
        let (session, _rx) = w.attach(None, None, 0.0).unwrap();
        assert!(w.detach(session.id));
        assert!(!w.players.contains_key(&session.id));
        assert!(session.is_closed());
        assert!(!w.detach(session.id));
    }

    #[test]
    fn test_bots_spawn_once() {
        let mut w = world();
        w.spawn_bots(BOT_COUNT, 0.0);
        w.spawn_bots(BOT_COUNT, 0.0);
        assert_eq!(w.bot_count(), BOT_COUNT);
        assert_eq!(w.players.values().filter(|p| p.is_bot).count(), BOT_COUNT);
        assert!(w.players.values().all(|p| p.max_health == 190));
    }

    #[test]
    fn test_bot_pursues_human() {
        let mut w = world();
        w.spawn_bots(1, 0.0);
        let bot_id = *w.bots.keys().next().unwrap();
        let (gx, gy) = (w.bots[&bot_id].guard_x, w.bots[&bot_id].guard_y);
        place(&mut w, 50, gx, gy + 200.0);

        w.tick(0.0);
        let bot = &w.bots[&bot_id];
        assert_eq!(bot.target_id, 50);
        assert!(bot.input.keys.up);
        assert!(bot.input.autofire);
        assert!(w.players[&bot_id].autofire);
    }

    #[test]
    fn test_bot_closes_distance() {
        let mut w = world();
        w.spawn_bots(1, 0.0);
        let bot_id = *w.bots.keys().next().unwrap();
        let (gx, gy) = (w.bots[&bot_id].guard_x, w.bots[&bot_id].guard_y);
        place(&mut w, 50, gx + 400.0, gy);

        let gap = |w: &World| {
            let (bot, target) = (&w.players[&bot_id], &w.players[&50]);
            dist_sq(bot.x, bot.y, target.x, target.y).sqrt()
        };
        let start = gap(&w);
        for i in 0..8 {
            w.tick(i as f64 / 30.0);
        }
        assert_eq!(w.bots[&bot_id].target_id, 50);
        assert!(gap(&w) < start - 10.0);
    }

    #[test]
    fn test_stat_upgrade_dedup_across_ticks() {
        let mut w = world();
        let (session, _rx) = w.attach(None, None, 0.0).unwrap();
        w.players.get_mut(&session.id).unwrap().coins = 100;

        let msg = InputMsg {
            actions: vec![ActionMsg {
                kind: "statUpgrade".into(),
                sequence: 7,
                data: Some("moveSpeed".into()),
            }],
            ..Default::default()
        };
        session.merge_input(&msg);
        w.tick(1.0);
        session.merge_input(&msg);
        w.tick(2.0);

        let player = &w.players[&session.id];
        assert_eq!(player.stats.get(StatType::MoveSpeed), 1);
        assert_eq!(player.coins, 90);
    }

    #[test]
    fn test_human_respawn_requires_request_and_delay() {
        let mut w = world();
        let (session, _rx) = w.attach(None, None, 0.0).unwrap();
        let id = session.id;
        {
            let p = w.players.get_mut(&id).unwrap();
            p.experience = 400;
            p.state = LifeState::Dead;
            p.health = 0;
            p.respawn_ready_at = 5.0;
        }

        session.merge_input(&InputMsg {
            respawn: true,
            ..Default::default()
        });
        w.tick(4.0);
        assert!(!w.players[&id].is_alive());

        // No request, no respawn
        w.tick(6.0);
        assert!(!w.players[&id].is_alive());

        w.take_outbox();
        session.merge_input(&InputMsg {
            respawn: true,
            ..Default::default()
        });
        w.tick(6.1);
        let p = &w.players[&id];
        assert!(p.is_alive());
        assert_eq!(p.experience, 200);
        assert_eq!(p.level, 1);

        let outbox = w.take_outbox();
        assert!(outbox
            .iter()
            .any(|(to, m)| *to == id && matches!(m, ServerMsg::ResetShipConfig { .. })));
        assert!(outbox
            .iter()
            .any(|(to, m)| *to == id && matches!(m, ServerMsg::AvailableUpgrades { .. })));
    }

    #[test]
    fn test_bot_respawns_at_guard() {
        let mut w = world();
        w.spawn_bots(1, 0.0);
        let bot_id = *w.bots.keys().next().unwrap();
        {
            let p = w.players.get_mut(&bot_id).unwrap();
            p.state = LifeState::Dead;
            p.health = 0;
            p.respawn_ready_at = 1.0 + RESPAWN_DELAY;
            p.x = 10.0;
        }
        w.tick(2.0);
        assert!(!w.players[&bot_id].is_alive());
        w.tick(1.0 + RESPAWN_DELAY);
        let p = &w.players[&bot_id];
        assert!(p.is_alive());
        assert!(p.is_bot);
        assert_eq!(p.max_health, 190);
        assert_eq!(p.health, p.max_health);
    }

    #[test]
    fn test_kill_event_sent_to_human_killer() {
        let mut w = world();
        let (session, _rx) = w.attach(None, None, 0.0).unwrap();
        let killer = session.id;
        {
            let p = w.players.get_mut(&killer).unwrap();
            p.x = 1000.0;
            p.y = 1000.0;
            p.angle = 0.0;
            p.autofire = true;
        }
        place(&mut w, 90, 1000.0, 1050.0);
        {
            let victim = w.players.get_mut(&90).unwrap();
            victim.health = 3;
            victim.experience = 1200;
            victim.coins = 900;
            victim.modifiers.regen = 0.0;
        }
        w.take_outbox();

        w.tick(10.0);
        assert_eq!(w.players[&90].state, LifeState::Dead);
        assert_eq!(w.players[&killer].experience, 600);

        let outbox = w.take_outbox();
        let sunk = outbox.iter().find_map(|(to, m)| match m {
            ServerMsg::GameEvent {
                event: GameEvent::PlayerSunk { victim_id, .. },
            } if *to == killer => Some(*victim_id),
            _ => None,
        });
        assert_eq!(sunk, Some(90));
        // Leveling from the kill produced an upgrade notification
        assert!(outbox
            .iter()
            .any(|(to, m)| *to == killer && matches!(m, ServerMsg::AvailableUpgrades { .. })));
    }

    #[test]
    fn test_collision_separates_and_damages() {
        let mut w = world();
        place(&mut w, 1, 1000.0, 1000.0);
        place(&mut w, 2, 1030.0, 1000.0);
        w.tick(1.0);

        let (a, b) = (&w.players[&1], &w.players[&2]);
        assert!(a.bounding_box().max_x <= b.bounding_box().min_x + 1e-3);
        assert_eq!(a.health, 95);
        assert_eq!(b.health, 95);

        // Cooldown keeps a second contact from hurting again right away
        w.players.get_mut(&2).unwrap().x = 1030.0;
        w.tick(1.2);
        assert_eq!(w.players[&1].health, 95);
    }

    #[test]
    fn test_ram_adds_damage_when_facing() {
        let mut w = world();
        place(&mut w, 1, 1000.0, 1000.0);
        place(&mut w, 2, 1030.0, 1000.0);
        {
            let p = w.players.get_mut(&1).unwrap();
            p.upgrade_points = 1;
            p.upgrade_module(Slot::Front, "ram").unwrap();
        }
        w.tick(1.0);
        assert_eq!(w.players[&2].health, 100 - 5 - RAM_DAMAGE as i32);
        assert_eq!(w.players[&1].health, 95);
    }

    #[test]
    fn test_items_spawn_and_get_collected() {
        let mut w = world();
        w.tick(0.0);
        assert_eq!(w.items.len(), ITEM_SPAWN_PER_TICK);

        place(&mut w, 1, 2000.0, 2000.0);
        let item_id = 10_000;
        w.items.insert(
            item_id,
            Item {
                id: item_id,
                x: 2000.0,
                y: 2000.0,
                kind: crate::game::items::ItemType::Blue,
                coins: 100,
                xp: 150,
            },
        );
        w.tick(0.1);
        let p = &w.players[&1];
        assert!(!w.items.contains_key(&item_id));
        assert_eq!(p.coins, 100);
        assert_eq!(p.level, 2);
        assert_eq!(p.score, 150);
    }

    #[test]
    fn test_item_population_capped() {
        let mut w = world();
        for i in 0..400 {
            w.tick(i as f64 / 30.0);
        }
        assert_eq!(w.items.len(), MAX_ITEMS);
    }

    #[test]
    fn test_cleanup_caps_projectiles_oldest_first() {
        let mut w = world();
        let spawns: Vec<BulletSpawn> = (0..MAX_PROJECTILES + 50)
            .map(|_| BulletSpawn {
                owner_id: 99,
                x: 2500.0,
                y: 2500.0,
                vx: 0.0,
                vy: 0.0,
                radius: 5.0,
                damage: 6,
            })
            .collect();
        w.register_projectiles(spawns, 100.0);
        w.cleanup(100.0);
        assert_eq!(w.projectiles.len(), MAX_PROJECTILES);
        assert_eq!(*w.projectiles.keys().next().unwrap(), 51);
    }

    #[test]
    fn test_expired_projectiles_culled() {
        let mut w = world();
        w.register_projectiles(
            vec![BulletSpawn {
                owner_id: 99,
                x: 2500.0,
                y: 2500.0,
                vx: 0.0,
                vy: 0.0,
                radius: 5.0,
                damage: 6,
            }],
            0.0,
        );
        w.tick(1.0);
        assert_eq!(w.projectiles.len(), 1);
        w.tick(BULLET_LIFETIME + 0.1);
        assert!(w.projectiles.is_empty());
    }

    #[test]
    fn test_invariants_hold_over_a_busy_session() {
        let mut w = world();
        w.spawn_bots(BOT_COUNT, 0.0);
        place(&mut w, 100, 2500.0, 2700.0);
        place(&mut w, 101, 2600.0, 2500.0);
        for id in [100, 101] {
            w.players.get_mut(&id).unwrap().autofire = true;
        }

        for i in 0..600 {
            w.tick(i as f64 / 30.0);
            for p in w.players.values() {
                assert!(p.health >= 0 && p.health <= p.max_health);
                if p.state == LifeState::Dead {
                    assert_eq!(p.health, 0);
                } else {
                    let half = PLAYER_SIZE / 2.0;
                    assert!((half..=WORLD_WIDTH - half).contains(&p.x));
                    assert!((half..=WORLD_HEIGHT - half).contains(&p.y));
                }
            }
            assert!(w.items.len() <= MAX_ITEMS);
        }
    }

    #[test]
    fn test_view_is_sorted_by_player_id() {
        let mut w = world();
        place(&mut w, 3, 100.0, 100.0);
        place(&mut w, 1, 200.0, 200.0);
        let view = w.view(7);
        assert_eq!(view.time, 7);
        let ids: Vec<u32> = view.players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
