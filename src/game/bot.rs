//! Bot controller - synthesizes input for NPC ships
//!
//! Bots guard a territory around a fixed center. Every decision interval
//! they pick the nearest eligible human inside their aggro disc; every tick
//! they steer towards, around or away from that target (or patrol the guard
//! ring when idle) and emit the same movement keys a human client would.

use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::util::math::{angle_to, dist_sq, normalize_angle};

use super::constants::{
    BOT_AGGRO_RADIUS, BOT_DECISION_INTERVAL, BOT_DISTANCE_SLACK, BOT_GUARD_RADIUS,
    BOT_PREFERRED_DISTANCE, BOT_TARGET_DISTANCE, BOT_TURN_DEADZONE, BOT_TURN_RESPONSE,
    BOT_TURN_SMOOTHING, PLAYER_SIZE, WORLD_HEIGHT, WORLD_WIDTH,
};
use super::physics::MovementKeys;
use super::player::Player;
use super::ship::{ModuleKey, ModuleKind, Slot};
use super::upgrades::{install_module, StatType};

/// Synthetic input for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BotInput {
    pub keys: MovementKeys,
    pub autofire: bool,
    pub mouse_x: f32,
    pub mouse_y: f32,
}

/// Control block for one bot
#[derive(Debug, Clone)]
pub struct Bot {
    pub player_id: u32,
    pub input: BotInput,
    pub guard_x: f32,
    pub guard_y: f32,
    pub guard_radius: f32,
    pub aggro_radius: f32,
    pub target_distance: f32,
    pub preferred_distance: f32,
    pub next_decision: f64,
    /// Targeted player id, 0 when idle
    pub target_id: u32,
    /// Orbit direction, -1 or +1
    pub orbit: f32,
    pub turn_intent: f32,
    pub desired_angle: f32,
}

impl Bot {
    pub fn new(player_id: u32, guard_x: f32, guard_y: f32, orbit: f32) -> Self {
        Self {
            player_id,
            input: BotInput {
                mouse_x: guard_x,
                mouse_y: guard_y,
                ..Default::default()
            },
            guard_x,
            guard_y,
            guard_radius: BOT_GUARD_RADIUS,
            aggro_radius: BOT_AGGRO_RADIUS,
            target_distance: BOT_TARGET_DISTANCE,
            preferred_distance: BOT_PREFERRED_DISTANCE,
            next_decision: 0.0,
            target_id: 0,
            orbit: if orbit < 0.0 { -1.0 } else { 1.0 },
            turn_intent: 0.0,
            desired_angle: 0.0,
        }
    }

    /// Whether a player stands where this bot may engage it
    pub fn in_allowed_zone(&self, p: &Player) -> bool {
        let half = PLAYER_SIZE / 2.0;
        let inside_world = p.x >= half
            && p.x <= WORLD_WIDTH - half
            && p.y >= half
            && p.y <= WORLD_HEIGHT - half;
        inside_world
            && dist_sq(self.guard_x, self.guard_y, p.x, p.y)
                <= self.aggro_radius * self.aggro_radius
    }

    fn is_candidate(&self, me: &Player, p: &Player) -> bool {
        p.id != me.id && p.is_alive() && !p.is_bot && self.in_allowed_zone(p)
    }

    /// Nearest eligible human within engagement distance
    pub fn select_target(&self, me: &Player, players: &HashMap<u32, Player>) -> u32 {
        let max_sq = self.target_distance * self.target_distance;
        players
            .values()
            .filter(|p| self.is_candidate(me, p))
            .map(|p| (p.id, dist_sq(me.x, me.y, p.x, p.y)))
            .filter(|(_, d)| *d <= max_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
            .unwrap_or(0)
    }

    /// Plan this tick's input
    pub fn think(&mut self, me: &Player, players: &HashMap<u32, Player>, now: f64) -> BotInput {
        if now >= self.next_decision {
            self.target_id = self.select_target(me, players);
            self.next_decision = now + BOT_DECISION_INTERVAL;
        } else if self.target_id != 0 {
            let still_valid = players
                .get(&self.target_id)
                .is_some_and(|p| self.is_candidate(me, p));
            if !still_valid {
                self.target_id = 0;
            }
        }

        let target = players.get(&self.target_id).filter(|_| self.target_id != 0);

        let mut input = BotInput {
            keys: MovementKeys {
                up: true,
                ..Default::default()
            },
            ..Default::default()
        };

        self.desired_angle = match target {
            Some(t) => {
                input.autofire = true;
                input.mouse_x = t.x;
                input.mouse_y = t.y;

                let alpha = angle_to(me.x, me.y, t.x, t.y);
                let dist = dist_sq(me.x, me.y, t.x, t.y).sqrt();
                if dist > self.preferred_distance + BOT_DISTANCE_SLACK {
                    alpha
                } else if dist < self.preferred_distance - BOT_DISTANCE_SLACK {
                    alpha + self.orbit * 3.0 * FRAC_PI_4
                } else {
                    alpha + self.orbit * FRAC_PI_2
                }
            }
            None => {
                input.mouse_x = self.guard_x;
                input.mouse_y = self.guard_y;

                let dist = dist_sq(self.guard_x, self.guard_y, me.x, me.y).sqrt();
                let from_center = angle_to(self.guard_x, self.guard_y, me.x, me.y);
                if dist > self.guard_radius {
                    angle_to(me.x, me.y, self.guard_x, self.guard_y)
                } else if dist < self.guard_radius * 0.5 {
                    from_center + self.orbit * FRAC_PI_4
                } else {
                    from_center + self.orbit * FRAC_PI_2
                }
            }
        };
        self.desired_angle = normalize_angle(self.desired_angle);

        let error = normalize_angle(self.desired_angle - me.angle);
        let raw = (error / BOT_TURN_RESPONSE).clamp(-1.0, 1.0);
        self.turn_intent += BOT_TURN_SMOOTHING * (raw - self.turn_intent);
        if self.turn_intent > BOT_TURN_DEADZONE {
            input.keys.right = true;
        } else if self.turn_intent < -BOT_TURN_DEADZONE {
            input.keys.left = true;
        }

        self.input = input;
        input
    }

    /// Clear targeting state after a respawn
    pub fn reset(&mut self) {
        self.target_id = 0;
        self.turn_intent = 0.0;
        self.next_decision = 0.0;
        self.input = BotInput {
            mouse_x: self.guard_x,
            mouse_y: self.guard_y,
            ..Default::default()
        };
    }
}

/// Standard bot loadout and forced stat levels
pub fn equip_bot(player: &mut Player) {
    let hull = 3;
    install_module(&mut player.ship, Slot::Side, ModuleKey::new(ModuleKind::BasicSide, 2), hull);
    install_module(&mut player.ship, Slot::Top, ModuleKey::new(ModuleKind::BasicTurret, 1), hull);
    for (stat, level) in [
        (StatType::HullStrength, hull),
        (StatType::CannonReload, 3),
        (StatType::CannonDamage, 2),
        (StatType::MoveSpeed, 2),
    ] {
        player.force_stat(stat, level);
    }
    player.refresh_modifiers();
    player.health = player.max_health;
}

/// Fixed spawn points around the world center, one per bot
pub fn bot_spawn_points(count: usize, offset: f32) -> Vec<(f32, f32, f32)> {
    let (cx, cy) = (WORLD_WIDTH / 2.0, WORLD_HEIGHT / 2.0);
    (0..count)
        .map(|i| {
            let angle = i as f32 * std::f32::consts::TAU / count.max(1) as f32;
            let orbit = if i % 2 == 0 { 1.0 } else { -1.0 };
            (cx + angle.cos() * offset, cy + angle.sin() * offset, orbit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn human(id: u32, x: f32, y: f32) -> Player {
        Player::new(id, format!("H{id}"), "#FFFFFF".into(), x, y, 0.0)
    }

    fn bot_player(id: u32, x: f32, y: f32) -> Player {
        let mut p = human(id, x, y);
        p.is_bot = true;
        p
    }

    #[test]
    fn test_targets_nearest_human() {
        let me = bot_player(1, 2500.0, 2500.0);
        let bot = Bot::new(1, 2500.0, 2500.0, 1.0);
        let mut players = HashMap::new();
        players.insert(1, me.clone());
        players.insert(2, human(2, 2500.0, 2900.0));
        players.insert(3, human(3, 2700.0, 2500.0));
        assert_eq!(bot.select_target(&me, &players), 3);
    }

    #[test]
    fn test_ignores_bots_dead_and_far_players() {
        let me = bot_player(1, 2500.0, 2500.0);
        let bot = Bot::new(1, 2500.0, 2500.0, 1.0);
        let mut players = HashMap::new();
        players.insert(1, me.clone());
        players.insert(2, bot_player(2, 2550.0, 2500.0));
        let mut dead = human(3, 2520.0, 2500.0);
        dead.state = crate::game::player::LifeState::Dead;
        players.insert(3, dead);
        players.insert(4, human(4, 3600.0, 2500.0));
        assert_eq!(bot.select_target(&me, &players), 0);
    }

    #[test]
    fn test_target_must_be_inside_aggro_disc() {
        // The bot has wandered to the disc edge; a close human outside the disc is ignored
        let me = bot_player(1, 3450.0, 2500.0);
        let bot = Bot::new(1, 2500.0, 2500.0, 1.0);
        let mut players = HashMap::new();
        players.insert(1, me.clone());
        players.insert(2, human(2, 3600.0, 2500.0));
        assert_eq!(bot.select_target(&me, &players), 0);
    }

    #[test]
    fn test_pursuit_heading() {
        let me = bot_player(1, 2500.0, 2500.0);
        let mut bot = Bot::new(1, 2500.0, 2500.0, 1.0);
        bot.guard_radius = 100.0;
        bot.aggro_radius = 1000.0;
        let mut players = HashMap::new();
        players.insert(1, me.clone());
        players.insert(2, human(2, 2500.0, 2700.0));

        let input = bot.think(&me, &players, 0.0);
        assert_eq!(bot.target_id, 2);
        assert!(input.autofire);
        assert!(input.keys.up);
        assert!(input.keys.right);
        assert!((bot.desired_angle - FRAC_PI_2).abs() < 1e-5);
        assert_eq!((input.mouse_x, input.mouse_y), (2500.0, 2700.0));
    }

    #[test]
    fn test_close_target_reverse_orbit() {
        let me = bot_player(1, 2500.0, 2500.0);
        let mut bot = Bot::new(1, 2500.0, 2500.0, 1.0);
        let mut players = HashMap::new();
        players.insert(1, me.clone());
        players.insert(2, human(2, 2600.0, 2500.0));
        bot.think(&me, &players, 0.0);
        assert!((bot.desired_angle - 3.0 * FRAC_PI_4).abs() < 1e-5);
    }

    #[test]
    fn test_decision_interval_holds_target() {
        let me = bot_player(1, 2500.0, 2500.0);
        let mut bot = Bot::new(1, 2500.0, 2500.0, 1.0);
        let mut players = HashMap::new();
        players.insert(1, me.clone());
        players.insert(2, human(2, 2500.0, 2700.0));
        bot.think(&me, &players, 0.0);
        assert_eq!(bot.target_id, 2);

        // A nearer human appears but the bot does not re-plan before the deadline
        players.insert(3, human(3, 2550.0, 2500.0));
        bot.think(&me, &players, 0.1);
        assert_eq!(bot.target_id, 2);
        bot.think(&me, &players, 0.25);
        assert_eq!(bot.target_id, 3);
    }

    #[test]
    fn test_idle_returns_to_guard() {
        let me = bot_player(1, 3200.0, 2500.0);
        let mut bot = Bot::new(1, 2500.0, 2500.0, 1.0);
        let mut players = HashMap::new();
        players.insert(1, me.clone());
        let input = bot.think(&me, &players, 0.0);
        assert!(!input.autofire);
        assert!((bot.desired_angle.abs() - std::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn test_turn_deadzone() {
        let mut me = bot_player(1, 2500.0, 2500.0);
        me.angle = FRAC_PI_2;
        let mut bot = Bot::new(1, 2500.0, 2500.0, 1.0);
        let mut players = HashMap::new();
        players.insert(1, me.clone());
        players.insert(2, human(2, 2500.0, 2700.0));
        let input = bot.think(&me, &players, 0.0);
        assert!(!input.keys.left && !input.keys.right);
    }

    #[test]
    fn test_spawn_points_alternate_orbit() {
        let points = bot_spawn_points(3, 300.0);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].2, 1.0);
        assert_eq!(points[1].2, -1.0);
        assert_eq!(points[2].2, 1.0);
    }

    #[test]
    fn test_equip_bot_loadout() {
        let mut p = bot_player(1, 2500.0, 2500.0);
        equip_bot(&mut p);
        assert_eq!(p.ship.side_cannons_per_side(), 2);
        assert_eq!(p.ship.turret_count(), 1);
        assert_eq!(p.stats.get(StatType::HullStrength), 3);
        assert_eq!(p.health, p.max_health);
        assert_eq!(p.max_health, 190);
    }
}
