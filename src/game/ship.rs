//! Ship model: module slots, cannons, turrets, hull geometry

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

use crate::util::math::rotate;

use super::constants::{
    BASE_SHIP_LENGTH, BASE_SHIP_WIDTH, CANNON_SPACING, TURRET_SPACING,
};

/// Timestamp meaning "never happened"
pub const NEVER: f64 = f64::NEG_INFINITY;

/// The four module slots of a ship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slot {
    Side,
    Top,
    Front,
    Rear,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Side, Slot::Top, Slot::Front, Slot::Rear];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Side => "side",
            Slot::Top => "top",
            Slot::Front => "front",
            Slot::Rear => "rear",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "side" => Some(Slot::Side),
            "top" => Some(Slot::Top),
            "front" => Some(Slot::Front),
            "rear" => Some(Slot::Rear),
            _ => None,
        }
    }
}

/// Cannon presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeaponType {
    Basic,
    Scatter,
    Turret,
    MachineGun,
    Chase,
    Big,
    RowingOar,
}

/// Per-cannon firing stats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CannonStats {
    /// Seconds between shots before the player's reload modifier
    pub reload: f64,
    pub speed_mod: f32,
    pub damage_mod: f32,
    pub bullet_count: u32,
    /// Total fan angle for multi-bullet shots
    pub spread: f32,
    /// Bullet size multiplier
    pub size: f32,
}

impl WeaponType {
    pub fn stats(self) -> CannonStats {
        match self {
            WeaponType::Basic => CannonStats {
                reload: 1.0,
                speed_mod: 1.0,
                damage_mod: 1.0,
                bullet_count: 1,
                spread: 0.0,
                size: 1.0,
            },
            WeaponType::Scatter => CannonStats {
                reload: 1.5,
                speed_mod: 0.9,
                damage_mod: 0.6,
                bullet_count: 3,
                spread: 0.5,
                size: 0.8,
            },
            WeaponType::Turret => CannonStats {
                reload: 1.5,
                speed_mod: 1.0,
                damage_mod: 1.0,
                bullet_count: 1,
                spread: 0.0,
                size: 1.0,
            },
            WeaponType::MachineGun => CannonStats {
                reload: 0.3,
                speed_mod: 0.7,
                damage_mod: 0.3,
                bullet_count: 1,
                spread: 0.0,
                size: 0.6,
            },
            WeaponType::Chase => CannonStats {
                reload: 1.0,
                speed_mod: 1.2,
                damage_mod: 0.7,
                bullet_count: 1,
                spread: 0.0,
                size: 0.9,
            },
            WeaponType::Big => CannonStats {
                reload: 2.0,
                speed_mod: 1.0,
                damage_mod: 5.0,
                bullet_count: 1,
                spread: 0.0,
                size: 2.0,
            },
            WeaponType::RowingOar => CannonStats {
                reload: 0.0,
                speed_mod: 0.0,
                damage_mod: 0.0,
                bullet_count: 0,
                spread: 0.0,
                size: 0.0,
            },
        }
    }

    /// Oars are modelled as cannons so the layout code can place them, but never fire
    pub fn fires(self) -> bool {
        !matches!(self, WeaponType::RowingOar)
    }
}

/// A cannon mounted on the hull or on a turret
#[derive(Debug, Clone, PartialEq)]
pub struct Cannon {
    /// Position relative to its mount (ship or turret)
    pub x: f32,
    pub y: f32,
    /// Firing angle relative to its mount
    pub angle: f32,
    pub kind: WeaponType,
    pub stats: CannonStats,
    pub last_fire: f64,
    pub recoil_time: f64,
}

impl Cannon {
    pub fn new(kind: WeaponType) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            kind,
            stats: kind.stats(),
            last_fire: NEVER,
            recoil_time: NEVER,
        }
    }
}

/// A rotating mount holding one or more cannons
#[derive(Debug, Clone, PartialEq)]
pub struct Turret {
    /// Position relative to the ship center
    pub x: f32,
    pub y: f32,
    /// World-space aim angle
    pub angle: f32,
    pub cannons: Vec<Cannon>,
    pub kind: WeaponType,
    /// Turret-level reload clock, shared by alternating barrels
    pub last_fire: f64,
    /// Next barrel to fire for alternating turrets
    pub cursor: usize,
}

impl Turret {
    pub fn new(kind: WeaponType, barrels: usize) -> Self {
        let barrels = barrels.max(1);
        let cannons = (0..barrels)
            .map(|i| {
                let mut cannon = Cannon::new(kind);
                cannon.y = (i as f32 - (barrels as f32 - 1.0) / 2.0) * 6.0;
                cannon
            })
            .collect();
        Self {
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            cannons,
            kind,
            last_fire: NEVER,
            cursor: 0,
        }
    }

    /// Alternating turrets share one reload and fire one barrel at a time
    pub fn is_alternating(&self) -> bool {
        self.cannons.len() > 1
    }
}

/// Additive stat effect of a module, scaled by its count
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatEffect {
    pub speed: f32,
    pub turn_rate: f32,
    pub width_mult: f32,
}

impl StatEffect {
    pub const NONE: StatEffect = StatEffect {
        speed: 0.0,
        turn_rate: 0.0,
        width_mult: 1.0,
    };
}

/// Module templates, identified by kind and count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleKind {
    None,
    BasicSide,
    Scatter,
    Rowing,
    MachineGun,
    BasicTurret,
    BigTurret,
    Ram,
    ChaseCannons,
    Rudder,
}

impl ModuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModuleKind::None => "none",
            ModuleKind::BasicSide => "basicSide",
            ModuleKind::Scatter => "scatter",
            ModuleKind::Rowing => "rowing",
            ModuleKind::MachineGun => "machineGun",
            ModuleKind::BasicTurret => "basicTurret",
            ModuleKind::BigTurret => "bigTurret",
            ModuleKind::Ram => "ram",
            ModuleKind::ChaseCannons => "chaseCannons",
            ModuleKind::Rudder => "rudder",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModuleKind::None => "None",
            ModuleKind::BasicSide => "Basic Cannons",
            ModuleKind::Scatter => "Scatter Cannons",
            ModuleKind::Rowing => "Rowing Oars",
            ModuleKind::MachineGun => "Machine Gun",
            ModuleKind::BasicTurret => "Turret",
            ModuleKind::BigTurret => "Big Turret",
            ModuleKind::Ram => "Ram",
            ModuleKind::ChaseCannons => "Chase Cannons",
            ModuleKind::Rudder => "Rudder",
        }
    }
}

/// Identifies a node of an upgrade tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    pub kind: ModuleKind,
    pub count: u32,
}

impl ModuleKey {
    pub const fn new(kind: ModuleKind, count: u32) -> Self {
        Self { kind, count }
    }
}

/// A module placed in a slot. Slots hold fresh copies of immutable templates.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub kind: ModuleKind,
    pub count: u32,
    pub effect: StatEffect,
    /// Hull-mounted cannons (side or front)
    pub cannons: Vec<Cannon>,
    pub turrets: Vec<Turret>,
    /// Successors in the upgrade tree
    pub next: Vec<ModuleKey>,
}

impl Module {
    pub fn key(&self) -> ModuleKey {
        ModuleKey::new(self.kind, self.count)
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == ModuleKind::None
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Closest point of the box to `(x, y)`
    pub fn closest_point(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(self.min_x, self.max_x), y.clamp(self.min_y, self.max_y))
    }
}

/// Ship configuration: four slots plus derived hull dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct ShipConfig {
    pub side: Option<Module>,
    pub top: Option<Module>,
    pub front: Option<Module>,
    pub rear: Option<Module>,
    pub length: f32,
    pub width: f32,
}

impl ShipConfig {
    /// An empty hull with base dimensions
    pub fn empty() -> Self {
        Self {
            side: None,
            top: None,
            front: None,
            rear: None,
            length: BASE_SHIP_LENGTH,
            width: BASE_SHIP_WIDTH,
        }
    }

    pub fn slot(&self, slot: Slot) -> Option<&Module> {
        match slot {
            Slot::Side => self.side.as_ref(),
            Slot::Top => self.top.as_ref(),
            Slot::Front => self.front.as_ref(),
            Slot::Rear => self.rear.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut Option<Module> {
        match slot {
            Slot::Side => &mut self.side,
            Slot::Top => &mut self.top,
            Slot::Front => &mut self.front,
            Slot::Rear => &mut self.rear,
        }
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        [&self.side, &self.top, &self.front, &self.rear]
            .into_iter()
            .filter_map(|m| m.as_ref())
    }

    pub fn modules_mut(&mut self) -> impl Iterator<Item = &mut Module> {
        [&mut self.side, &mut self.top, &mut self.front, &mut self.rear]
            .into_iter()
            .filter_map(|m| m.as_mut())
    }

    /// Number of side cannons on each flank
    pub fn side_cannons_per_side(&self) -> usize {
        self.side.as_ref().map(|m| m.cannons.len() / 2).unwrap_or(0)
    }

    pub fn turret_count(&self) -> usize {
        self.modules().map(|m| m.turrets.len()).sum()
    }

    /// Recompute hull length and width from the installed modules.
    ///
    /// Width is only ever widened relative to its base, and each hull strength
    /// level adds 1%.
    pub fn calculate_dimensions(&mut self, hull_level: u32) {
        let per_side = self.side_cannons_per_side();
        let side_length = if per_side > 0 {
            BASE_SHIP_LENGTH + (per_side as f32 - 1.0) * CANNON_SPACING
        } else {
            BASE_SHIP_LENGTH
        };

        let turrets = self.turret_count();
        let turret_length = if turrets > 0 {
            BASE_SHIP_LENGTH + (turrets as f32 - 1.0) * TURRET_SPACING
        } else {
            BASE_SHIP_LENGTH
        };

        self.length = side_length.max(turret_length).max(BASE_SHIP_LENGTH);

        let width_mult = self
            .modules()
            .map(|m| m.effect.width_mult)
            .fold(1.0f32, f32::max);
        let hull_widen = 1.0 + 0.01 * hull_level as f32;
        self.width = (BASE_SHIP_WIDTH * width_mult * hull_widen).max(BASE_SHIP_WIDTH);
    }

    /// Lay out every module's cannons and turrets in ship-local coordinates
    pub fn update_upgrade_positions(&mut self) {
        let half_width = self.width / 2.0;
        let half_length = self.length / 2.0;

        if let Some(side) = self.side.as_mut() {
            let per_side = side.cannons.len() / 2;
            let center = (per_side as f32 - 1.0) / 2.0;
            for (i, cannon) in side.cannons.iter_mut().enumerate() {
                let index = (i / 2) as f32;
                cannon.x = (index - center) * CANNON_SPACING;
                // Even indices sit on the left (negative y), odd on the right
                if i % 2 == 0 {
                    cannon.y = -half_width;
                    cannon.angle = -FRAC_PI_2;
                } else {
                    cannon.y = half_width;
                    cannon.angle = FRAC_PI_2;
                }
            }
        }

        if let Some(top) = self.top.as_mut() {
            let n = top.turrets.len();
            let center = (n as f32 - 1.0) / 2.0;
            for (i, turret) in top.turrets.iter_mut().enumerate() {
                turret.x = if n == 1 {
                    0.0
                } else {
                    (i as f32 - center) * TURRET_SPACING
                };
                turret.y = 0.0;
            }
        }

        if let Some(front) = self.front.as_mut() {
            for (i, cannon) in front.cannons.iter_mut().enumerate() {
                cannon.x = half_length;
                cannon.y = if i % 2 == 0 {
                    -half_width / 2.0
                } else {
                    half_width / 2.0
                };
                cannon.angle = 0.0;
            }
        }

        if let Some(rear) = self.rear.as_mut() {
            for cannon in rear.cannons.iter_mut() {
                cannon.x = -half_length;
                cannon.y = 0.0;
                cannon.angle = std::f32::consts::PI;
            }
        }
    }

    /// The four hull corners in world space
    pub fn corners(&self, x: f32, y: f32, angle: f32) -> [(f32, f32); 4] {
        let hl = self.length / 2.0;
        let hw = self.width / 2.0;
        [(hl, hw), (hl, -hw), (-hl, -hw), (-hl, hw)].map(|(cx, cy)| {
            let (rx, ry) = rotate(cx, cy, angle);
            (x + rx, y + ry)
        })
    }

    /// Axis-aligned box around the rotated hull; the collision primitive
    pub fn bounding_box(&self, x: f32, y: f32, angle: f32) -> Aabb {
        let corners = self.corners(x, y, angle);
        let mut aabb = Aabb {
            min_x: f32::MAX,
            min_y: f32::MAX,
            max_x: f32::MIN,
            max_y: f32::MIN,
        };
        for (cx, cy) in corners {
            aabb.min_x = aabb.min_x.min(cx);
            aabb.min_y = aabb.min_y.min(cy);
            aabb.max_x = aabb.max_x.max(cx);
            aabb.max_y = aabb.max_y.max(cy);
        }
        aabb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::upgrades::{default_ship_config, module_template};

    #[test]
    fn test_base_dimensions() {
        let mut ship = ShipConfig::empty();
        ship.calculate_dimensions(0);
        assert_eq!(ship.length, BASE_SHIP_LENGTH);
        assert_eq!(ship.width, BASE_SHIP_WIDTH);
    }

    #[test]
    fn test_side_cannons_lengthen_hull() {
        let mut ship = ShipConfig::empty();
        ship.side = Some(module_template(Slot::Side, ModuleKey::new(ModuleKind::BasicSide, 4)));
        ship.calculate_dimensions(0);
        assert_eq!(ship.length, BASE_SHIP_LENGTH + 3.0 * CANNON_SPACING);
        assert_eq!(ship.side_cannons_per_side(), 4);
        assert_eq!(ship.side.as_ref().unwrap().cannons.len() % 2, 0);
    }

    #[test]
    fn test_turrets_lengthen_hull() {
        let mut ship = ShipConfig::empty();
        ship.top = Some(module_template(Slot::Top, ModuleKey::new(ModuleKind::BasicTurret, 3)));
        ship.calculate_dimensions(0);
        assert_eq!(ship.length, BASE_SHIP_LENGTH + 2.0 * TURRET_SPACING);
    }

    #[test]
    fn test_hull_level_widens() {
        let mut ship = ShipConfig::empty();
        ship.calculate_dimensions(10);
        assert!((ship.width - BASE_SHIP_WIDTH * 1.1).abs() < 1e-4);
    }

    #[test]
    fn test_side_cannons_mirrored() {
        let mut ship = default_ship_config();
        ship.side = Some(module_template(Slot::Side, ModuleKey::new(ModuleKind::BasicSide, 3)));
        ship.calculate_dimensions(0);
        ship.update_upgrade_positions();
        let cannons = &ship.side.as_ref().unwrap().cannons;
        for pair in cannons.chunks(2) {
            assert_eq!(pair[0].x, pair[1].x);
            assert_eq!(pair[0].y, -pair[1].y);
            assert_eq!(pair[0].angle, -FRAC_PI_2);
            assert_eq!(pair[1].angle, FRAC_PI_2);
        }
    }

    #[test]
    fn test_single_turret_centered() {
        let mut ship = ShipConfig::empty();
        ship.top = Some(module_template(Slot::Top, ModuleKey::new(ModuleKind::BasicTurret, 1)));
        ship.calculate_dimensions(0);
        ship.update_upgrade_positions();
        let turret = &ship.top.as_ref().unwrap().turrets[0];
        assert_eq!((turret.x, turret.y), (0.0, 0.0));
    }

    #[test]
    fn test_bounding_box_rotation() {
        let ship = ShipConfig::empty();
        let aabb = ship.bounding_box(100.0, 100.0, 0.0);
        assert!((aabb.max_x - aabb.min_x - ship.length).abs() < 1e-4);
        assert!((aabb.max_y - aabb.min_y - ship.width).abs() < 1e-4);

        let rotated = ship.bounding_box(100.0, 100.0, FRAC_PI_2);
        assert!((rotated.max_x - rotated.min_x - ship.width).abs() < 1e-3);
        assert!((rotated.max_y - rotated.min_y - ship.length).abs() < 1e-3);
    }
}
