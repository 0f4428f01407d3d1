//! Combat system - damage, kill rewards, regeneration, respawn

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::constants::{KILL_COINS_MAX, KILL_COINS_MIN, KILL_XP_MIN, RESPAWN_DELAY};
use super::player::{LifeState, Player};

/// What dealt the damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DamageCause {
    Bullet,
    Collision,
    Ram,
}

/// Outcome of a lethal hit
#[derive(Debug, Clone, PartialEq)]
pub struct KillReport {
    pub killer_id: Option<u32>,
    pub killer_is_bot: bool,
    pub victim_id: u32,
    pub victim_name: String,
    pub cause: DamageCause,
    pub xp_reward: u64,
    pub coin_reward: u64,
}

/// Combat system for managing damage and respawn
pub struct CombatSystem;

impl CombatSystem {
    /// Experience and coins awarded for sinking a ship
    pub fn kill_rewards(victim_xp: u64, victim_coins: u64) -> (u64, u64) {
        let xp = (victim_xp / 2).max(KILL_XP_MIN);
        let coins = (victim_coins / 2).clamp(KILL_COINS_MIN, KILL_COINS_MAX);
        (xp, coins)
    }

    /// Apply damage to `victim_id`. Non-positive damage and non-alive targets
    /// are ignored. Returns a report when the hit was lethal.
    pub fn apply_damage(
        players: &mut HashMap<u32, Player>,
        victim_id: u32,
        attacker_id: Option<u32>,
        damage: i32,
        cause: DamageCause,
        now: f64,
    ) -> Option<KillReport> {
        if damage <= 0 {
            return None;
        }

        let attacker_name = attacker_id
            .and_then(|id| players.get(&id))
            .map(|p| p.name.clone())
            .unwrap_or_default();

        let victim = players.get_mut(&victim_id)?;
        if !victim.is_alive() {
            return None;
        }

        victim.health -= damage;
        if victim.health > 0 {
            return None;
        }

        victim.health = 0;
        victim.state = LifeState::Dead;
        victim.respawn_ready_at = now + RESPAWN_DELAY;
        victim.death_time = now;
        victim.score_at_death = victim.score;
        victim.survival_seconds = (now - victim.spawn_time).max(0.0);
        victim.killed_by = attacker_id.unwrap_or(0);
        victim.killed_by_name = attacker_name;
        victim.vx = 0.0;
        victim.vy = 0.0;
        victim.angular_velocity = 0.0;
        victim.wants_respawn = false;

        let (xp, coins) = Self::kill_rewards(victim.experience, victim.coins);
        let victim_name = victim.name.clone();

        let mut report = KillReport {
            killer_id: attacker_id,
            killer_is_bot: false,
            victim_id,
            victim_name,
            cause,
            xp_reward: 0,
            coin_reward: 0,
        };

        if let Some(killer) = attacker_id
            .filter(|id| *id != victim_id)
            .and_then(|id| players.get_mut(&id))
        {
            killer.grant_xp(xp);
            killer.coins += coins;
            report.killer_is_bot = killer.is_bot;
            report.xp_reward = xp;
            report.coin_reward = coins;
        }

        Some(report)
    }

    /// Regenerate whole hit points for the time elapsed since the last regen
    pub fn regenerate(player: &mut Player, now: f64) {
        if !player.is_alive() {
            player.last_regen = now;
            return;
        }
        if player.health >= player.max_health {
            player.last_regen = now;
            return;
        }

        let rate = player.modifiers.regen as f64;
        if rate <= 0.0 {
            player.last_regen = now;
            return;
        }
        let healed = ((now - player.last_regen) * rate).floor();
        if healed >= 1.0 {
            player.health = (player.health + healed as i32).min(player.max_health);
            player.last_regen += healed / rate;
        }
    }

    /// Bring a human back with identity and half of their progression
    pub fn respawn_human(player: &mut Player, x: f32, y: f32, now: f64) {
        let experience = player.experience / 2;
        let coins = player.coins / 2;
        let score = player.score / 2;
        let last_action = player.last_processed_action;

        player.reset_to_baseline(x, y, now);
        player.experience = experience;
        player.coins = coins;
        player.score = score;
        player.last_processed_action = last_action;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> HashMap<u32, Player> {
        let mut map = HashMap::new();
        map.insert(1, Player::new(1, "Killer".into(), "#FF0000".into(), 1000.0, 1000.0, 0.0));
        map.insert(2, Player::new(2, "Victim".into(), "#00FF00".into(), 1000.0, 1050.0, 0.0));
        map
    }

    #[test]
    fn test_reward_formula() {
        assert_eq!(CombatSystem::kill_rewards(1200, 900), (600, 450));
        assert_eq!(CombatSystem::kill_rewards(0, 0), (100, 200));
        assert_eq!(CombatSystem::kill_rewards(0, 10_000), (100, 2000));
    }

    #[test]
    fn test_non_lethal_damage() {
        let mut map = players();
        let report = CombatSystem::apply_damage(&mut map, 2, Some(1), 6, DamageCause::Bullet, 1.0);
        assert!(report.is_none());
        assert_eq!(map[&2].health, 94);
    }

    #[test]
    fn test_zero_damage_ignored() {
        let mut map = players();
        CombatSystem::apply_damage(&mut map, 2, Some(1), 0, DamageCause::Bullet, 1.0);
        CombatSystem::apply_damage(&mut map, 2, Some(1), -5, DamageCause::Bullet, 1.0);
        assert_eq!(map[&2].health, 100);
    }

    #[test]
    fn test_kill_reward_scenario() {
        let mut map = players();
        {
            let victim = map.get_mut(&2).unwrap();
            victim.experience = 1200;
            victim.coins = 900;
            victim.score = 800;
            victim.health = 5;
        }

        let report =
            CombatSystem::apply_damage(&mut map, 2, Some(1), 6, DamageCause::Bullet, 42.0).unwrap();
        assert_eq!(report.xp_reward, 600);
        assert_eq!(report.coin_reward, 450);

        let killer = &map[&1];
        assert_eq!(killer.experience, 600);
        assert_eq!(killer.coins, 450);
        assert_eq!(killer.score, 600);

        let victim = &map[&2];
        assert_eq!(victim.state, LifeState::Dead);
        assert_eq!(victim.health, 0);
        assert_eq!(victim.name, "Victim");
        assert_eq!(victim.killed_by, 1);
        assert_eq!(victim.killed_by_name, "Killer");
        assert_eq!(victim.score_at_death, 800);
        assert_eq!(victim.respawn_ready_at, 42.0 + RESPAWN_DELAY);
        assert_eq!(victim.survival_seconds, 42.0);
    }

    #[test]
    fn test_dead_target_ignored() {
        let mut map = players();
        map.get_mut(&2).unwrap().health = 1;
        let first = CombatSystem::apply_damage(&mut map, 2, Some(1), 5, DamageCause::Ram, 1.0);
        let second = CombatSystem::apply_damage(&mut map, 2, Some(1), 5, DamageCause::Ram, 1.1);
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(map[&1].experience, 100);
    }

    #[test]
    fn test_regen_accumulates() {
        let mut p = Player::new(1, "R".into(), "#FFFFFF".into(), 0.0, 0.0, 0.0);
        p.health = 50;
        p.last_regen = 0.0;
        CombatSystem::regenerate(&mut p, 0.5);
        assert_eq!(p.health, 50);
        CombatSystem::regenerate(&mut p, 1.0);
        assert_eq!(p.health, 51);
        CombatSystem::regenerate(&mut p, 3.5);
        assert_eq!(p.health, 53);
    }

    #[test]
    fn test_respawn_keeps_identity_and_half_progress() {
        let mut p = Player::new(9, "Sailor".into(), "#123456".into(), 100.0, 100.0, 0.0);
        p.experience = 1000;
        p.coins = 301;
        p.score = 1000;
        p.level = 5;
        p.autofire = true;
        p.last_processed_action = 12;
        p.state = LifeState::Dead;
        p.health = 0;

        CombatSystem::respawn_human(&mut p, 2000.0, 2000.0, 10.0);
        assert_eq!(p.id, 9);
        assert_eq!(p.name, "Sailor");
        assert_eq!(p.color, "#123456");
        assert_eq!(p.experience, 500);
        assert_eq!(p.coins, 150);
        assert_eq!(p.score, 500);
        assert_eq!(p.level, 1);
        assert!(!p.autofire);
        assert_eq!(p.health, 100);
        assert!(p.is_alive());
        assert_eq!(p.last_processed_action, 12);
        assert_eq!((p.x, p.y), (2000.0, 2000.0));
    }
}
