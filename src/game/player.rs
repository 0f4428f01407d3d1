//! Player entity (humans and bots share it)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::constants::{
    HEALTH_PER_HULL_LEVEL, MAX_LEVEL, PLAYER_SIZE, WORLD_HEIGHT, WORLD_WIDTH,
};
use super::ship::{Aabb, ShipConfig, Slot, NEVER};
use super::upgrades::{
    apply_module, compute_modifiers, default_ship_config, StatLevels, StatModifiers,
    StatType, StatUpgradeError, UpgradeError,
};

/// Vitality state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifeState {
    Alive,
    Dead,
}

/// Rate-limited one-shot action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    StatUpgrade,
    ToggleAutofire,
}

/// Cumulative experience needed to reach `level`
pub fn xp_for_level(level: u32) -> u64 {
    let n = level as u64;
    50 * n * n.saturating_sub(1)
}

/// Authoritative player state
#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub color: String,
    pub is_bot: bool,

    // Kinematics
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,
    pub angular_velocity: f32,

    // Vitality
    pub health: i32,
    pub max_health: i32,
    pub state: LifeState,
    pub respawn_ready_at: f64,

    // Progression
    pub experience: u64,
    pub level: u32,
    pub coins: u64,
    pub score: u64,
    pub upgrade_points: u32,
    pub stats: StatLevels,

    // Combat bookkeeping
    pub last_collision_damage: f64,
    pub last_regen: f64,
    pub spawn_time: f64,
    pub death_time: f64,
    pub killed_by: u32,
    pub killed_by_name: String,
    pub score_at_death: u64,
    pub survival_seconds: f64,

    pub ship: ShipConfig,
    pub modifiers: StatModifiers,

    pub action_cooldowns: HashMap<ActionKind, f64>,
    pub last_processed_action: u64,
    pub autofire: bool,

    /// Latest aim point in world coordinates
    pub mouse_x: f32,
    pub mouse_y: f32,
    /// Respawn requested by the client, consumed by the respawn pass
    pub wants_respawn: bool,
}

impl Player {
    pub fn new(id: u32, name: String, color: String, x: f32, y: f32, now: f64) -> Self {
        let ship = default_ship_config();
        let stats = StatLevels::default();
        let modifiers = compute_modifiers(&stats, &ship);
        Self {
            id,
            name,
            color,
            is_bot: false,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            angle: 0.0,
            angular_velocity: 0.0,
            health: modifiers.max_health,
            max_health: modifiers.max_health,
            state: LifeState::Alive,
            respawn_ready_at: 0.0,
            experience: 0,
            level: 1,
            coins: 0,
            score: 0,
            upgrade_points: 0,
            stats,
            last_collision_damage: NEVER,
            last_regen: now,
            spawn_time: now,
            death_time: NEVER,
            killed_by: 0,
            killed_by_name: String::new(),
            score_at_death: 0,
            survival_seconds: 0.0,
            ship,
            modifiers,
            action_cooldowns: HashMap::new(),
            last_processed_action: 0,
            autofire: false,
            mouse_x: x,
            mouse_y: y,
            wants_respawn: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state == LifeState::Alive
    }

    /// Recompute modifiers after stats or modules changed
    pub fn refresh_modifiers(&mut self) {
        self.modifiers = compute_modifiers(&self.stats, &self.ship);
        self.max_health = self.modifiers.max_health;
        self.health = self.health.min(self.max_health);
    }

    pub fn max_speed(&self) -> f32 {
        super::constants::BASE_SHIP_MAX_SPEED * self.modifiers.move_speed.max(0.1)
    }

    pub fn bounding_box(&self) -> Aabb {
        self.ship.bounding_box(self.x, self.y, self.angle)
    }

    /// Keep the ship center inside the playable area
    pub fn clamp_to_world(&mut self) {
        let half = PLAYER_SIZE / 2.0;
        self.x = self.x.clamp(half, WORLD_WIDTH - half);
        self.y = self.y.clamp(half, WORLD_HEIGHT - half);
    }

    /// Add experience and score, leveling up as thresholds are crossed.
    /// Returns the number of levels gained.
    pub fn grant_xp(&mut self, amount: u64) -> u32 {
        self.experience += amount;
        self.score += amount;
        let mut gained = 0;
        while self.level < MAX_LEVEL && self.experience >= xp_for_level(self.level + 1) {
            self.level += 1;
            self.upgrade_points += 1;
            gained += 1;
        }
        gained
    }

    /// Whether an action of `kind` is outside its cooldown; records `now` if so
    pub fn try_action(&mut self, kind: ActionKind, cooldown: f64, now: f64) -> bool {
        let last = self.action_cooldowns.get(&kind).copied().unwrap_or(NEVER);
        if now - last < cooldown {
            return false;
        }
        self.action_cooldowns.insert(kind, now);
        true
    }

    /// Spend coins on one level of `stat`
    pub fn buy_stat(&mut self, stat: StatType) -> Result<u32, StatUpgradeError> {
        let cost = self.stats.check_upgrade(stat, self.coins)?;
        self.coins -= cost;
        self.force_stat(stat, self.stats.get(stat) + 1);
        Ok(self.stats.get(stat))
    }

    /// Set a stat level directly (bots, respawn), keeping hull side effects
    pub fn force_stat(&mut self, stat: StatType, level: u32) {
        let before = self.stats.get(stat);
        self.stats.set(stat, level);
        if stat == StatType::HullStrength {
            let added = self.stats.get(stat).saturating_sub(before) as i32;
            self.ship.calculate_dimensions(self.stats.get(stat));
            self.ship.update_upgrade_positions();
            self.refresh_modifiers();
            self.health = (self.health + HEALTH_PER_HULL_LEVEL * added).min(self.max_health);
        } else {
            self.refresh_modifiers();
        }
    }

    /// Spend a module point to move a slot along its upgrade tree
    pub fn upgrade_module(&mut self, slot: Slot, name: &str) -> Result<(), UpgradeError> {
        if self.upgrade_points == 0 {
            return Err(UpgradeError::NoPoints);
        }
        let hull = self.stats.get(StatType::HullStrength);
        apply_module(&mut self.ship, slot, name, hull)?;
        self.upgrade_points -= 1;
        self.refresh_modifiers();
        Ok(())
    }

    /// Baseline reset used by respawn. Identity is kept; the caller decides
    /// what progression to carry over.
    pub fn reset_to_baseline(&mut self, x: f32, y: f32, now: f64) {
        let fresh = Player::new(self.id, self.name.clone(), self.color.clone(), x, y, now);
        let is_bot = self.is_bot;
        *self = Player { is_bot, ..fresh };
    }
}
