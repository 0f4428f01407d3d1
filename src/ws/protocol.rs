//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::game::combat::DamageCause;
use crate::game::items::ItemType;
use crate::game::player::LifeState;
use crate::game::ship::WeaponType;

/// The single client envelope. `type` selects specialized handling:
/// `"profile"` and `"startGame"` are handled on receipt, anything else is
/// movement and actions merged into the session's live input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct InputMsg {
    #[serde(rename = "type")]
    pub kind: String,

    /// Continuous movement keys
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,

    /// Aim point in world coordinates
    pub mouse_x: Option<f32>,
    pub mouse_y: Option<f32>,

    /// One-shot actions, deduplicated by sequence
    pub actions: Vec<ActionMsg>,

    /// Legacy module selection flag, paired with `upgrade_choice`
    pub select_upgrade: bool,
    pub upgrade_choice: Option<UpgradeChoice>,

    /// One-shot manual fire edge
    pub fire: bool,
    /// Respawn request (honored once the respawn delay has passed)
    pub respawn: bool,

    /// Profile fields for `"profile"` and `"startGame"`
    pub name: Option<String>,
    pub color: Option<String>,
}

/// A sequenced one-shot action
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionMsg {
    #[serde(rename = "type")]
    pub kind: String,
    pub sequence: u64,
    pub data: Option<String>,
}

/// Module pick from the available-upgrades list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UpgradeChoice {
    pub slot: String,
    pub name: String,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Sent once after attach
    #[serde(rename_all = "camelCase")]
    Welcome { player_id: u32, server_time: u64 },

    /// Full world state for this client
    Snapshot(FullSnapshot),

    /// Changes since the client's previous snapshot
    DeltaSnapshot(DeltaSnapshot),

    /// Per-slot module options and remaining points
    #[serde(rename_all = "camelCase")]
    AvailableUpgrades {
        upgrades: BTreeMap<String, Vec<UpgradeOption>>,
        upgrade_points: u32,
    },

    /// Discrete gameplay event
    GameEvent { event: GameEvent },

    /// The client's ship was rebuilt from scratch (respawn)
    ResetShipConfig { ship: ShipSnapshot },
}

/// Discrete gameplay events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "eventType", rename_all = "camelCase")]
pub enum GameEvent {
    #[serde(rename_all = "camelCase")]
    PlayerSunk {
        killer_id: u32,
        victim_id: u32,
        victim_name: String,
        cause: DamageCause,
        xp_reward: u64,
        coin_reward: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeOption {
    pub name: String,
    pub label: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FullSnapshot {
    /// Server monotonic milliseconds
    pub time: u64,
    pub players: Vec<PlayerSnapshot>,
    pub items: Vec<ItemSnapshot>,
    pub bullets: Vec<BulletSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeltaSnapshot {
    pub time: u64,
    pub players: Vec<PlayerDelta>,
    pub removed_players: Vec<u32>,
    pub added_items: Vec<ItemSnapshot>,
    pub removed_items: Vec<u32>,
    pub added_bullets: Vec<BulletSnapshot>,
    pub removed_bullets: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CannonSnapshot {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub kind: WeaponType,
    /// Last recoil in server milliseconds, 0 if never fired
    pub recoil: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurretSnapshot {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub kind: WeaponType,
    pub cannons: Vec<CannonSnapshot>,
    pub recoil: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSnapshot {
    pub name: String,
    pub count: u32,
    pub cannons: Vec<CannonSnapshot>,
    pub turrets: Vec<TurretSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShipSnapshot {
    pub length: f32,
    pub width: f32,
    pub side: Option<ModuleSnapshot>,
    pub top: Option<ModuleSnapshot>,
    pub front: Option<ModuleSnapshot>,
    pub rear: Option<ModuleSnapshot>,
}

/// Derived numbers shown in the client's debug overlay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub side_dps: f32,
    pub top_dps: f32,
    pub front_dps: f32,
    pub rear_dps: f32,
    pub total_dps: f32,
    pub max_speed: f32,
    pub turn_speed: f32,
    pub reload_multiplier: f32,
    pub regen_per_second: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: u32,
    pub name: String,
    pub color: String,
    pub is_bot: bool,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,
    pub health: i32,
    pub max_health: i32,
    pub state: LifeState,
    pub level: u32,
    pub experience: u64,
    pub coins: u64,
    pub score: u64,
    pub upgrade_points: u32,
    pub stats: BTreeMap<String, u32>,
    pub autofire: bool,
    pub killed_by: u32,
    pub killed_by_name: String,
    pub score_at_death: u64,
    pub survival_seconds: f32,
    pub respawn_ready_at: u64,
    pub ship: ShipSnapshot,
    pub debug: DebugInfo,
}

/// Field-level player delta; absent fields are unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDelta {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_bot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vx: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vy: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_health: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<LifeState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coins: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_points: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BTreeMap<String, u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autofire: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killed_by: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killed_by_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_at_death: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub survival_seconds: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respawn_ready_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship: Option<ShipSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub kind: ItemType,
    pub coins: u64,
    pub xp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulletSnapshot {
    pub id: u32,
    pub owner_id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    /// Server milliseconds at creation, for client-side extrapolation
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_defaults_for_missing_fields() {
        let msg: InputMsg = serde_json::from_str(r#"{"up":true,"mouseX":12.5}"#).unwrap();
        assert!(msg.up);
        assert!(!msg.down);
        assert_eq!(msg.kind, "");
        assert_eq!(msg.mouse_x, Some(12.5));
        assert!(msg.actions.is_empty());
    }

    #[test]
    fn test_input_actions_parse() {
        let msg: InputMsg = serde_json::from_str(
            r#"{"type":"input","actions":[{"type":"statUpgrade","sequence":7,"data":"moveSpeed"}]}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, "input");
        assert_eq!(msg.actions[0].kind, "statUpgrade");
        assert_eq!(msg.actions[0].sequence, 7);
        assert_eq!(msg.actions[0].data.as_deref(), Some("moveSpeed"));
    }

    #[test]
    fn test_server_msg_tagging() {
        let json = serde_json::to_value(ServerMsg::Welcome {
            player_id: 3,
            server_time: 99,
        })
        .unwrap();
        assert_eq!(json["type"], "welcome");
        assert_eq!(json["playerId"], 3);
    }

    #[test]
    fn test_player_delta_omits_unchanged_fields() {
        let delta = PlayerDelta {
            id: 4,
            x: Some(1.0),
            ..Default::default()
        };
        let json = serde_json::to_value(&delta).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("x"));
    }
}
