//! Upgrade trees and the stat-upgrade economy
//!
//! Each slot has a directed acyclic graph of module templates. A module's
//! `next` list names the nodes reachable from it; an empty slot offers the
//! children of the slot's root. Stat upgrades are bought with coins and
//! compose additively into [`StatModifiers`].

use serde::{Deserialize, Serialize};

use super::constants::{
    BASE_MAX_HEALTH, HEALTH_PER_HULL_LEVEL, STAT_MAX_LEVEL, STAT_TOTAL_CAP,
};
use super::ship::{
    Cannon, Module, ModuleKey, ModuleKind, ShipConfig, Slot, StatEffect, Turret, WeaponType,
};

/// Module application errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpgradeError {
    #[error("Module {0} is not available for this slot")]
    NotAvailable(String),

    #[error("No module upgrade points left")]
    NoPoints,
}

/// Stat upgrade errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatUpgradeError {
    #[error("Stat is already at max level")]
    Maxed,

    #[error("Total upgrade cap reached")]
    TotalCapReached,

    #[error("Not enough coins: need {needed}, have {have}")]
    InsufficientCoins { needed: u64, have: u64 },
}

/// Root node of a slot's upgrade tree
pub fn root(slot: Slot) -> ModuleKey {
    match slot {
        Slot::Side => ModuleKey::new(ModuleKind::BasicSide, 1),
        Slot::Top | Slot::Front | Slot::Rear => ModuleKey::new(ModuleKind::None, 0),
    }
}

/// Successors of a node in the slot's tree
pub fn next_for(slot: Slot, key: ModuleKey) -> Vec<ModuleKey> {
    use ModuleKind::*;
    let k = ModuleKey::new;
    match (slot, key.kind, key.count) {
        (Slot::Side, BasicSide, 1) => vec![k(BasicSide, 2), k(Scatter, 1), k(Rowing, 1)],
        (Slot::Side, BasicSide, 2) => vec![k(BasicSide, 3)],
        (Slot::Side, BasicSide, 3) => vec![k(BasicSide, 4)],
        (Slot::Side, Rowing, 1) => vec![k(Rowing, 2)],
        (Slot::Side, Rowing, 2) => vec![k(Rowing, 3)],

        (Slot::Top, None, _) => vec![k(MachineGun, 1), k(BasicTurret, 1)],
        (Slot::Top, MachineGun, 1) => vec![k(MachineGun, 2)],
        (Slot::Top, BasicTurret, 1) => vec![k(BigTurret, 1), k(BasicTurret, 2)],
        (Slot::Top, BigTurret, 1) => vec![k(BigTurret, 2)],
        (Slot::Top, BasicTurret, 2) => vec![k(BasicTurret, 3)],

        (Slot::Front, None, _) => vec![k(Ram, 1), k(ChaseCannons, 1)],
        (Slot::Rear, None, _) => vec![k(Rudder, 1)],

        _ => Vec::new(),
    }
}

fn cannon_pairs(kind: WeaponType, pairs: u32) -> Vec<Cannon> {
    (0..pairs * 2).map(|_| Cannon::new(kind)).collect()
}

/// Build a fresh copy of a module template
pub fn module_template(slot: Slot, key: ModuleKey) -> Module {
    use ModuleKind::*;
    let count = key.count;

    let (effect, cannons, turrets) = match key.kind {
        None => (StatEffect::NONE, Vec::new(), Vec::new()),
        BasicSide => (
            StatEffect {
                speed: -0.01,
                turn_rate: 0.0,
                width_mult: 1.0,
            },
            cannon_pairs(WeaponType::Basic, count),
            Vec::new(),
        ),
        Scatter => (
            StatEffect {
                speed: -0.02,
                turn_rate: 0.0,
                width_mult: 1.1,
            },
            cannon_pairs(WeaponType::Scatter, 2),
            Vec::new(),
        ),
        Rowing => {
            let mut cannons = cannon_pairs(WeaponType::Basic, 1);
            cannons.extend(cannon_pairs(WeaponType::RowingOar, count));
            (
                StatEffect {
                    speed: 0.06,
                    turn_rate: 0.02,
                    width_mult: 1.0,
                },
                cannons,
                Vec::new(),
            )
        }
        MachineGun => (
            StatEffect {
                speed: -0.01,
                turn_rate: 0.0,
                width_mult: 1.0,
            },
            Vec::new(),
            vec![Turret::new(WeaponType::MachineGun, count as usize + 1)],
        ),
        BasicTurret => (
            StatEffect {
                speed: -0.01,
                turn_rate: 0.0,
                width_mult: 1.0,
            },
            Vec::new(),
            (0..count).map(|_| Turret::new(WeaponType::Turret, 1)).collect(),
        ),
        BigTurret => (
            StatEffect {
                speed: -0.03,
                turn_rate: -0.02,
                width_mult: 1.1,
            },
            Vec::new(),
            (0..count).map(|_| Turret::new(WeaponType::Big, 1)).collect(),
        ),
        Ram => (
            StatEffect {
                speed: 0.0,
                turn_rate: -0.01,
                width_mult: 1.0,
            },
            Vec::new(),
            Vec::new(),
        ),
        ChaseCannons => (
            StatEffect::NONE,
            vec![Cannon::new(WeaponType::Chase), Cannon::new(WeaponType::Chase)],
            Vec::new(),
        ),
        Rudder => (
            StatEffect {
                speed: 0.0,
                turn_rate: 0.15,
                width_mult: 1.0,
            },
            Vec::new(),
            Vec::new(),
        ),
    };

    Module {
        kind: key.kind,
        count,
        effect,
        cannons,
        turrets,
        next: next_for(slot, key),
    }
}

/// The starting loadout: basic side cannons and empty top/front/rear
pub fn default_ship_config() -> ShipConfig {
    let mut ship = ShipConfig::empty();
    ship.side = Some(module_template(Slot::Side, root(Slot::Side)));
    ship.calculate_dimensions(0);
    ship.update_upgrade_positions();
    ship
}

/// Modules that may be applied to `slot` right now
pub fn available_modules(ship: &ShipConfig, slot: Slot) -> Vec<ModuleKey> {
    match ship.slot(slot) {
        Some(module) if !module.is_placeholder() => module.next.clone(),
        _ => next_for(slot, root(slot)),
    }
}

/// Put a template into a slot without checking the tree, then re-layout
pub fn install_module(ship: &mut ShipConfig, slot: Slot, key: ModuleKey, hull_level: u32) {
    if key.kind == ModuleKind::None {
        remove_module(ship, slot, hull_level);
        return;
    }
    *ship.slot_mut(slot) = Some(module_template(slot, key));
    ship.calculate_dimensions(hull_level);
    ship.update_upgrade_positions();
}

/// Replace the module in `slot` with the available successor named `name`
pub fn apply_module(
    ship: &mut ShipConfig,
    slot: Slot,
    name: &str,
    hull_level: u32,
) -> Result<ModuleKey, UpgradeError> {
    let key = available_modules(ship, slot)
        .into_iter()
        .find(|k| k.kind.name() == name)
        .ok_or_else(|| UpgradeError::NotAvailable(name.to_string()))?;
    install_module(ship, slot, key, hull_level);
    Ok(key)
}

/// Empty a slot and re-layout the hull
pub fn remove_module(ship: &mut ShipConfig, slot: Slot, hull_level: u32) {
    *ship.slot_mut(slot) = None;
    ship.calculate_dimensions(hull_level);
    ship.update_upgrade_positions();
}

/// The eight purchasable stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatType {
    HullStrength,
    AutoRepair,
    CannonReload,
    MoveSpeed,
    TurnSpeed,
    CannonDamage,
    CannonRange,
    RamDamage,
}

impl StatType {
    pub const ALL: [StatType; 8] = [
        StatType::HullStrength,
        StatType::AutoRepair,
        StatType::CannonReload,
        StatType::MoveSpeed,
        StatType::TurnSpeed,
        StatType::CannonDamage,
        StatType::CannonRange,
        StatType::RamDamage,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            StatType::HullStrength => "hullStrength",
            StatType::AutoRepair => "autoRepair",
            StatType::CannonReload => "cannonReload",
            StatType::MoveSpeed => "moveSpeed",
            StatType::TurnSpeed => "turnSpeed",
            StatType::CannonDamage => "cannonDamage",
            StatType::CannonRange => "cannonRange",
            StatType::RamDamage => "ramDamage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stat| stat.name() == s)
    }
}

/// Per-stat upgrade levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatLevels([u32; 8]);

impl StatLevels {
    pub fn get(&self, stat: StatType) -> u32 {
        self.0[stat.index()]
    }

    pub fn set(&mut self, stat: StatType, level: u32) {
        self.0[stat.index()] = level.min(STAT_MAX_LEVEL);
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatType, u32)> + '_ {
        StatType::ALL.into_iter().map(|s| (s, self.get(s)))
    }

    /// Coin cost of the next level of `stat`
    pub fn cost(&self, stat: StatType) -> u64 {
        10 * (self.get(stat) as u64 + 1)
    }

    /// Validate a purchase and return its cost without applying it
    pub fn check_upgrade(&self, stat: StatType, coins: u64) -> Result<u64, StatUpgradeError> {
        if self.get(stat) >= STAT_MAX_LEVEL {
            return Err(StatUpgradeError::Maxed);
        }
        if self.total() >= STAT_TOTAL_CAP {
            return Err(StatUpgradeError::TotalCapReached);
        }
        let needed = self.cost(stat);
        if coins < needed {
            return Err(StatUpgradeError::InsufficientCoins { needed, have: coins });
        }
        Ok(needed)
    }
}

/// Derived multipliers from stat levels and installed modules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatModifiers {
    pub move_speed: f32,
    pub turn_speed: f32,
    pub reload: f32,
    pub bullet_speed: f32,
    pub bullet_damage: f32,
    /// Health regenerated per second
    pub regen: f32,
    pub max_health: i32,
    pub body_damage: f32,
}

impl Default for StatModifiers {
    fn default() -> Self {
        compute_modifiers(&StatLevels::default(), &ShipConfig::empty())
    }
}

/// Compose stat levels and module effects into modifiers
pub fn compute_modifiers(levels: &StatLevels, ship: &ShipConfig) -> StatModifiers {
    let lvl = |s: StatType| levels.get(s) as f32;
    let hull = lvl(StatType::HullStrength);
    let ram = lvl(StatType::RamDamage);

    let (module_speed, module_turn) = ship.modules().fold((0.0f32, 0.0f32), |(s, t), m| {
        (
            s + m.effect.speed * m.count as f32,
            t + m.effect.turn_rate * m.count as f32,
        )
    });

    StatModifiers {
        move_speed: 1.0 - 0.01 * hull - 0.01 * ram + 0.02 * lvl(StatType::MoveSpeed) + module_speed,
        turn_speed: 1.0 + 0.02 * lvl(StatType::TurnSpeed) - 0.01 * ram + module_turn,
        reload: 1.0 - 0.03 * lvl(StatType::CannonReload),
        bullet_speed: 1.0 + 0.05 * lvl(StatType::CannonRange),
        bullet_damage: 1.0 + 0.08 * lvl(StatType::CannonDamage),
        regen: 1.0 + 0.6 * lvl(StatType::AutoRepair),
        max_health: BASE_MAX_HEALTH
            + HEALTH_PER_HULL_LEVEL * levels.get(StatType::HullStrength) as i32,
        body_damage: 0.5 * ram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(keys: &[ModuleKey]) -> Vec<&'static str> {
        keys.iter().map(|k| k.kind.name()).collect()
    }

    #[test]
    fn test_default_side_offers_children() {
        let ship = default_ship_config();
        assert_eq!(
            names(&available_modules(&ship, Slot::Side)),
            vec!["basicSide", "scatter", "rowing"]
        );
    }

    #[test]
    fn test_empty_top_offers_root_children() {
        let ship = default_ship_config();
        assert_eq!(
            names(&available_modules(&ship, Slot::Top)),
            vec!["machineGun", "basicTurret"]
        );
        assert_eq!(names(&available_modules(&ship, Slot::Front)), vec!["ram", "chaseCannons"]);
        assert_eq!(names(&available_modules(&ship, Slot::Rear)), vec!["rudder"]);
    }

    #[test]
    fn test_apply_walks_tree() {
        let mut ship = default_ship_config();
        apply_module(&mut ship, Slot::Top, "basicTurret", 0).unwrap();
        assert_eq!(
            names(&available_modules(&ship, Slot::Top)),
            vec!["bigTurret", "basicTurret"]
        );
        let key = apply_module(&mut ship, Slot::Top, "basicTurret", 0).unwrap();
        assert_eq!(key, ModuleKey::new(ModuleKind::BasicTurret, 2));
        assert_eq!(ship.turret_count(), 2);
    }

    #[test]
    fn test_apply_rejects_unavailable() {
        let mut ship = default_ship_config();
        let before = ship.clone();
        let err = apply_module(&mut ship, Slot::Top, "bigTurret", 0).unwrap_err();
        assert_eq!(err, UpgradeError::NotAvailable("bigTurret".to_string()));
        assert_eq!(ship, before);
    }

    #[test]
    fn test_leaf_has_no_successors() {
        let mut ship = default_ship_config();
        apply_module(&mut ship, Slot::Side, "scatter", 0).unwrap();
        assert!(available_modules(&ship, Slot::Side).is_empty());
    }

    #[test]
    fn test_apply_remove_reapply_idempotent() {
        let mut ship = default_ship_config();
        apply_module(&mut ship, Slot::Front, "chaseCannons", 0).unwrap();
        let first = ship.clone();
        remove_module(&mut ship, Slot::Front, 0);
        assert!(ship.front.is_none());
        apply_module(&mut ship, Slot::Front, "chaseCannons", 0).unwrap();
        assert_eq!(ship.length, first.length);
        assert_eq!(ship.width, first.width);
        assert_eq!(ship, first);
    }

    #[test]
    fn test_stat_costs_and_caps() {
        let mut levels = StatLevels::default();
        assert_eq!(levels.cost(StatType::MoveSpeed), 10);
        assert_eq!(levels.check_upgrade(StatType::MoveSpeed, 10), Ok(10));
        assert_eq!(
            levels.check_upgrade(StatType::MoveSpeed, 9),
            Err(StatUpgradeError::InsufficientCoins { needed: 10, have: 9 })
        );

        levels.set(StatType::MoveSpeed, 15);
        assert_eq!(
            levels.check_upgrade(StatType::MoveSpeed, 10_000),
            Err(StatUpgradeError::Maxed)
        );

        for stat in [
            StatType::HullStrength,
            StatType::AutoRepair,
            StatType::CannonReload,
            StatType::TurnSpeed,
        ] {
            levels.set(stat, 15);
        }
        assert_eq!(levels.total(), 75);
        assert_eq!(
            levels.check_upgrade(StatType::CannonDamage, 10_000),
            Err(StatUpgradeError::TotalCapReached)
        );
    }

    #[test]
    fn test_modifier_formulas() {
        let mut levels = StatLevels::default();
        levels.set(StatType::HullStrength, 2);
        levels.set(StatType::RamDamage, 4);
        levels.set(StatType::MoveSpeed, 5);
        levels.set(StatType::CannonReload, 10);
        levels.set(StatType::AutoRepair, 5);

        let mods = compute_modifiers(&levels, &ShipConfig::empty());
        assert!((mods.move_speed - (1.0 - 0.02 - 0.04 + 0.10)).abs() < 1e-5);
        assert!((mods.turn_speed - (1.0 - 0.04)).abs() < 1e-5);
        assert!((mods.reload - 0.7).abs() < 1e-5);
        assert!((mods.regen - 4.0).abs() < 1e-5);
        assert_eq!(mods.max_health, 160);
        assert!((mods.body_damage - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_module_effects_scale_with_count() {
        let mut ship = ShipConfig::empty();
        install_module(&mut ship, Slot::Side, ModuleKey::new(ModuleKind::Rowing, 3), 0);
        install_module(&mut ship, Slot::Rear, ModuleKey::new(ModuleKind::Rudder, 1), 0);
        let mods = compute_modifiers(&StatLevels::default(), &ship);
        assert!((mods.move_speed - 1.18).abs() < 1e-5);
        assert!((mods.turn_speed - (1.0 + 0.06 + 0.15)).abs() < 1e-5);
    }

    #[test]
    fn test_stat_names_roundtrip() {
        for stat in StatType::ALL {
            assert_eq!(StatType::parse(stat.name()), Some(stat));
        }
        assert_eq!(StatType::parse("warpDrive"), None);
    }
}
