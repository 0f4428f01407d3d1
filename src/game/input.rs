//! Per-session input state and one-shot action processing

use tracing::debug;

use crate::ws::protocol::InputMsg;

use super::constants::{AUTOFIRE_TOGGLE_COOLDOWN, MODULE_UPGRADE_COOLDOWN, STAT_UPGRADE_COOLDOWN};
use super::physics::MovementKeys;
use super::player::{ActionKind, Player};
use super::ship::Slot;
use super::upgrades::StatType;

/// Sequenced one-shot action types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionType {
    StatUpgrade(Option<StatType>),
    ToggleAutofire,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionType,
    pub sequence: u64,
}

impl Action {
    fn from_msg(kind: &str, sequence: u64, data: Option<&str>) -> Self {
        let kind = match kind {
            "statUpgrade" => ActionType::StatUpgrade(data.and_then(StatType::parse)),
            "toggleAutofire" => ActionType::ToggleAutofire,
            other => ActionType::Unknown(other.to_string()),
        };
        Self { kind, sequence }
    }
}

/// Latest client input. Keys and aim are continuous; everything else is a
/// one-shot consumed by the next tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub keys: MovementKeys,
    pub mouse: Option<(f32, f32)>,
    pub actions: Vec<Action>,
    pub manual_fire: bool,
    pub respawn: bool,
    pub module_choice: Option<(Slot, String)>,
}

impl InputState {
    /// Fold a client envelope into the live state
    pub fn merge(&mut self, msg: &InputMsg) {
        self.keys = MovementKeys {
            up: msg.up,
            down: msg.down,
            left: msg.left,
            right: msg.right,
        };

        if let (Some(x), Some(y)) = (msg.mouse_x, msg.mouse_y) {
            if x.is_finite() && y.is_finite() {
                self.mouse = Some((x, y));
            }
        }

        self.actions.extend(
            msg.actions
                .iter()
                .map(|a| Action::from_msg(&a.kind, a.sequence, a.data.as_deref())),
        );

        self.manual_fire |= msg.fire;
        self.respawn |= msg.respawn;

        if msg.select_upgrade {
            if let Some(choice) = &msg.upgrade_choice {
                match Slot::parse(&choice.slot) {
                    Some(slot) => self.module_choice = Some((slot, choice.name.clone())),
                    None => debug!(slot = %choice.slot, "Ignoring upgrade for unknown slot"),
                }
            }
        }
    }

    /// Snapshot for this tick. One-shots are cleared; keys and aim persist.
    pub fn take(&mut self) -> InputState {
        let taken = self.clone();
        self.actions.clear();
        self.manual_fire = false;
        self.respawn = false;
        self.module_choice = None;
        taken
    }
}

/// Apply sequenced actions in order. Each sequence number is processed at
/// most once; suppressed or unknown actions still consume their sequence.
/// Returns how many actions took effect.
pub fn apply_actions(player: &mut Player, actions: &[Action], now: f64) -> usize {
    let mut ordered: Vec<&Action> = actions.iter().collect();
    ordered.sort_by_key(|a| a.sequence);

    let mut applied = 0;
    for action in ordered {
        if action.sequence <= player.last_processed_action {
            continue;
        }
        player.last_processed_action = action.sequence;

        if !player.is_alive() {
            continue;
        }

        match &action.kind {
            ActionType::StatUpgrade(Some(stat)) => {
                if !player.try_action(ActionKind::StatUpgrade, STAT_UPGRADE_COOLDOWN, now) {
                    continue;
                }
                match player.buy_stat(*stat) {
                    Ok(level) => {
                        debug!(player_id = player.id, stat = stat.name(), level, "Stat upgraded");
                        applied += 1;
                    }
                    Err(e) => debug!(player_id = player.id, error = %e, "Stat upgrade rejected"),
                }
            }
            ActionType::StatUpgrade(None) => {
                debug!(player_id = player.id, "Stat upgrade without a known stat");
            }
            ActionType::ToggleAutofire => {
                if player.try_action(ActionKind::ToggleAutofire, AUTOFIRE_TOGGLE_COOLDOWN, now) {
                    player.autofire = !player.autofire;
                    applied += 1;
                }
            }
            ActionType::Unknown(kind) => {
                debug!(player_id = player.id, kind = %kind, "Ignoring unknown action");
            }
        }
    }
    applied
}

/// Apply a module pick, gated by the per-session upgrade cooldown.
/// `last_upgrade` is updated only when the module was installed.
pub fn apply_module_choice(
    player: &mut Player,
    slot: Slot,
    name: &str,
    last_upgrade: &mut f64,
    now: f64,
) -> bool {
    if !player.is_alive() || now - *last_upgrade < MODULE_UPGRADE_COOLDOWN {
        return false;
    }
    match player.upgrade_module(slot, name) {
        Ok(()) => {
            *last_upgrade = now;
            debug!(player_id = player.id, slot = slot.as_str(), module = name, "Module installed");
            true
        }
        Err(e) => {
            debug!(player_id = player.id, error = %e, "Module upgrade rejected");
            false
        }
    }
}
