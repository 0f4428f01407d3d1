//! Gameplay and wire constants

/// World edge length (the arena is square)
pub const WORLD_WIDTH: f32 = 5000.0;
pub const WORLD_HEIGHT: f32 = 5000.0;

/// Human session cap
pub const MAX_PLAYERS: usize = 32;
/// Item population target for the spawner
pub const MAX_ITEMS: usize = 300;
/// Items spawned per tick at most
pub const ITEM_SPAWN_PER_TICK: usize = 2;
/// Items keep this far from the world edge
pub const ITEM_EDGE_MARGIN: f32 = 100.0;
/// Pickup radius of an item disc
pub const ITEM_RADIUS: f32 = 10.0;

/// Nominal ship size, also the bounds margin
pub const PLAYER_SIZE: f32 = 50.0;
/// Hull length with no modules
pub const BASE_SHIP_LENGTH: f32 = PLAYER_SIZE;
/// Hull width with no modules
pub const BASE_SHIP_WIDTH: f32 = PLAYER_SIZE * 0.8;
/// Barrel length used to space side cannons
pub const GUN_LENGTH: f32 = 20.0;
/// Side cannon spacing along the hull
pub const CANNON_SPACING: f32 = GUN_LENGTH * 0.75;
/// Turret spacing along the center line
pub const TURRET_SPACING: f32 = PLAYER_SIZE * 0.7;

/// Movement (units/s, multiplied by the move-speed modifier)
pub const BASE_SHIP_MAX_SPEED: f32 = 180.0;
/// Velocity multiplier applied every tick
pub const SHIP_DECELERATION: f32 = 0.96;
/// Extra drag applied while braking
pub const SHIP_BRAKE: f32 = 0.85;
/// Turn rate in radians per second at full speed for a base-length hull
pub const BASE_SHIP_TURN_SPEED: f32 = 2.4;

/// Projectiles
pub const BULLET_SPEED: f32 = 420.0;
pub const BULLET_DAMAGE: f32 = 6.0;
pub const BULLET_SIZE: f32 = 10.0;
pub const BULLET_LIFETIME: f64 = 3.0;
/// Bullets further than this out of the world are culled
pub const BULLET_BOUNDS_MARGIN: f32 = 100.0;
/// Broad-phase distance for bullet-ship tests, extended by half the hull length
pub const BULLET_HIT_PREFILTER: f32 = 100.0;
/// Bullets sent to a client are limited to this radius around its ship
pub const BULLET_VISIBLE_RANGE: f32 = 1500.0;
/// Bullets per client snapshot
pub const MAX_VISIBLE_BULLETS: usize = 200;

/// Ship-ship contact
pub const BASE_COLLISION_DAMAGE: f32 = 5.0;
pub const COLLISION_COOLDOWN: f64 = 0.5;
pub const COLLISION_RESTITUTION: f32 = 0.5;
pub const RAM_DAMAGE: f32 = 20.0;
pub const RAM_CONE: f32 = std::f32::consts::FRAC_PI_4;

/// Vitality
pub const BASE_MAX_HEALTH: i32 = 100;
pub const HEALTH_PER_HULL_LEVEL: i32 = 30;
pub const RESPAWN_DELAY: f64 = 3.0;

/// Progression
pub const MAX_LEVEL: u32 = 45;
pub const STAT_MAX_LEVEL: u32 = 15;
pub const STAT_TOTAL_CAP: u32 = 75;
pub const KILL_XP_MIN: u64 = 100;
pub const KILL_COINS_MIN: u64 = 200;
pub const KILL_COINS_MAX: u64 = 2000;

/// Action cooldowns (seconds)
pub const STAT_UPGRADE_COOLDOWN: f64 = 0.1;
pub const AUTOFIRE_TOGGLE_COOLDOWN: f64 = 0.4;
pub const MODULE_UPGRADE_COOLDOWN: f64 = 0.2;

/// Housekeeping
pub const CLEANUP_INTERVAL_TICKS: u64 = 300;
pub const PROJECTILE_GRACE: f64 = 1.0;
pub const MAX_PROJECTILES: usize = 800;
pub const MAX_ITEMS_HARD_CAP: usize = 400;

/// Bots
pub const BOT_COUNT: usize = 3;
pub const BOT_DECISION_INTERVAL: f64 = 0.25;
pub const BOT_GUARD_RADIUS: f32 = 400.0;
pub const BOT_AGGRO_RADIUS: f32 = 1000.0;
pub const BOT_TARGET_DISTANCE: f32 = 800.0;
pub const BOT_PREFERRED_DISTANCE: f32 = 150.0;
pub const BOT_DISTANCE_SLACK: f32 = 30.0;
pub const BOT_TURN_RESPONSE: f32 = std::f32::consts::FRAC_PI_2;
pub const BOT_TURN_SMOOTHING: f32 = 0.18;
pub const BOT_TURN_DEADZONE: f32 = 0.1;
/// Bot spawn ring offset from world center
pub const BOT_SPAWN_OFFSET: f32 = 300.0;

pub const DEFAULT_PLAYER_COLOR: &str = "#3A7BD5";
