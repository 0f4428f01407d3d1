//! Item spawner - weighted random pickups up to a population cap

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::constants::{ITEM_EDGE_MARGIN, WORLD_HEIGHT, WORLD_WIDTH};

/// Closed set of pickup types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    Gray,
    Yellow,
    Orange,
    Blue,
}

impl ItemType {
    pub const ALL: [ItemType; 4] = [
        ItemType::Gray,
        ItemType::Yellow,
        ItemType::Orange,
        ItemType::Blue,
    ];

    /// Relative spawn weight
    pub fn weight(self) -> u32 {
        match self {
            ItemType::Gray => 60,
            ItemType::Yellow => 25,
            ItemType::Orange => 10,
            ItemType::Blue => 5,
        }
    }

    /// (coins, xp) granted on pickup
    pub fn rewards(self) -> (u64, u64) {
        match self {
            ItemType::Gray => (5, 10),
            ItemType::Yellow => (15, 25),
            ItemType::Orange => (40, 60),
            ItemType::Blue => (100, 150),
        }
    }

    /// Pick a type by weight from a roll in `0..total_weight()`
    pub fn from_roll(mut roll: u32) -> ItemType {
        for kind in Self::ALL {
            if roll < kind.weight() {
                return kind;
            }
            roll -= kind.weight();
        }
        ItemType::Gray
    }

    pub fn total_weight() -> u32 {
        Self::ALL.iter().map(|k| k.weight()).sum()
    }
}

/// A pickup lying in the world
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub kind: ItemType,
    pub coins: u64,
    pub xp: u64,
}

/// Item spawning rules
pub struct ItemSpawner;

impl ItemSpawner {
    /// Roll a new item (id assigned by the caller)
    pub fn roll<R: Rng>(rng: &mut R, id: u32) -> Item {
        let kind = ItemType::from_roll(rng.gen_range(0..ItemType::total_weight()));
        let (coins, xp) = kind.rewards();
        Item {
            id,
            x: rng.gen_range(ITEM_EDGE_MARGIN..WORLD_WIDTH - ITEM_EDGE_MARGIN),
            y: rng.gen_range(ITEM_EDGE_MARGIN..WORLD_HEIGHT - ITEM_EDGE_MARGIN),
            kind,
            coins,
            xp,
        }
    }

    /// How many items to add this tick
    pub fn spawn_count(current: usize, cap: usize, per_tick: usize) -> usize {
        cap.saturating_sub(current).min(per_tick)
    }
}
