//! Weapon system - cannon and turret firing, projectile emission

use crate::util::math::{angle_to, rotate};

use super::constants::{BULLET_DAMAGE, BULLET_SIZE, BULLET_SPEED};
use super::player::Player;
use super::ship::{Cannon, Turret};
use super::upgrades::StatModifiers;

/// Active projectile in the world
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u32,
    pub owner_id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub created_at: f64,
    pub radius: f32,
    pub damage: i32,
}

impl Projectile {
    /// Advance by `dt` seconds
    pub fn integrate(&mut self, dt: f32) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.created_at
    }
}

/// A bullet emitted this tick, registered in the world table by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct BulletSpawn {
    pub owner_id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub damage: i32,
}

/// Ship pose and modifiers captured before borrowing the ship mutably
#[derive(Debug, Clone, Copy)]
struct Shooter {
    id: u32,
    x: f32,
    y: f32,
    angle: f32,
    mods: StatModifiers,
}

impl Shooter {
    fn of(player: &Player) -> Self {
        Self {
            id: player.id,
            x: player.x,
            y: player.y,
            angle: player.angle,
            mods: player.modifiers,
        }
    }
}

/// Whether `cannon` has reloaded for a shooter with `reload_mul`
pub fn can_fire(last_fire: f64, reload: f64, reload_mul: f32, now: f64) -> bool {
    now - last_fire >= reload * reload_mul as f64
}

/// Emit the bullets of one shot from a world position and firing angle
fn emit(
    cannon: &Cannon,
    shooter: &Shooter,
    world_x: f32,
    world_y: f32,
    target_angle: f32,
    out: &mut Vec<BulletSpawn>,
) -> usize {
    let stats = cannon.stats;
    let n = stats.bullet_count;
    let speed = BULLET_SPEED * stats.speed_mod * shooter.mods.bullet_speed;
    let damage = (BULLET_DAMAGE * stats.damage_mod * shooter.mods.bullet_damage).floor() as i32;
    let radius = BULLET_SIZE * stats.size / 2.0;

    for i in 0..n {
        let angle = if n > 1 {
            target_angle + stats.spread * (i as f32 / (n as f32 - 1.0) - 0.5)
        } else {
            target_angle
        };
        out.push(BulletSpawn {
            owner_id: shooter.id,
            x: world_x,
            y: world_y,
            vx: angle.cos() * speed,
            vy: angle.sin() * speed,
            radius,
            damage,
        });
    }
    n as usize
}

/// Fire a hull-mounted cannon if reloaded. Returns bullets emitted.
fn fire_hull_cannon(
    cannon: &mut Cannon,
    shooter: &Shooter,
    now: f64,
    out: &mut Vec<BulletSpawn>,
) -> usize {
    if !cannon.kind.fires() {
        return 0;
    }
    if !can_fire(cannon.last_fire, cannon.stats.reload, shooter.mods.reload, now) {
        return 0;
    }

    let (ox, oy) = rotate(cannon.x, cannon.y, shooter.angle);
    let emitted = emit(
        cannon,
        shooter,
        shooter.x + ox,
        shooter.y + oy,
        shooter.angle + cannon.angle,
        out,
    );
    if emitted > 0 {
        cannon.last_fire = now;
        cannon.recoil_time = now;
    }
    emitted
}

fn barrel_world_position(turret: &Turret, cannon: &Cannon, shooter: &Shooter) -> (f32, f32) {
    let (tx, ty) = rotate(turret.x, turret.y, shooter.angle);
    let (bx, by) = rotate(cannon.x, cannon.y, turret.angle);
    (shooter.x + tx + bx, shooter.y + ty + by)
}

/// Fire a turret. Standard turrets fire every reloaded barrel at once;
/// alternating turrets fire one barrel per shared reload. Returns whether
/// any bullet left the turret.
fn fire_turret(
    turret: &mut Turret,
    shooter: &Shooter,
    now: f64,
    out: &mut Vec<BulletSpawn>,
) -> bool {
    if turret.cannons.is_empty() || !turret.kind.fires() {
        return false;
    }

    if turret.is_alternating() {
        let reload = turret.cannons[0].stats.reload;
        if !can_fire(turret.last_fire, reload, shooter.mods.reload, now) {
            return false;
        }
        let index = turret.cursor % turret.cannons.len();
        let (wx, wy) = barrel_world_position(turret, &turret.cannons[index], shooter);
        let angle = turret.angle + turret.cannons[index].angle;
        let emitted = emit(&turret.cannons[index], shooter, wx, wy, angle, out);
        if emitted == 0 {
            return false;
        }
        turret.last_fire = now;
        turret.cursor = (index + 1) % turret.cannons.len();
        let cannon = &mut turret.cannons[index];
        cannon.last_fire = now;
        cannon.recoil_time = now;
        return true;
    }

    let mut fired = false;
    for i in 0..turret.cannons.len() {
        let cannon = &turret.cannons[i];
        if !cannon.kind.fires()
            || !can_fire(cannon.last_fire, cannon.stats.reload, shooter.mods.reload, now)
        {
            continue;
        }
        let (wx, wy) = barrel_world_position(turret, cannon, shooter);
        let angle = turret.angle + cannon.angle;
        if emit(cannon, shooter, wx, wy, angle, out) > 0 {
            let cannon = &mut turret.cannons[i];
            cannon.last_fire = now;
            cannon.recoil_time = now;
            fired = true;
        }
    }
    if fired {
        turret.last_fire = now;
    }
    fired
}

/// Snap every turret to the player's aim point
pub fn aim_turrets(player: &mut Player) {
    let (px, py, angle) = (player.x, player.y, player.angle);
    let (mx, my) = (player.mouse_x, player.mouse_y);
    for module in player.ship.modules_mut() {
        for turret in module.turrets.iter_mut() {
            let (ox, oy) = rotate(turret.x, turret.y, angle);
            turret.angle = angle_to(px + ox, py + oy, mx, my);
        }
    }
}

/// Fire every weapon that may fire this tick.
///
/// Dead players never fire. Without autofire, a one-shot manual trigger is
/// required.
pub fn fire_weapons(player: &mut Player, manual_fire: bool, now: f64) -> Vec<BulletSpawn> {
    let mut out = Vec::new();
    if !player.is_alive() || !(player.autofire || manual_fire) {
        return out;
    }

    let shooter = Shooter::of(player);
    for module in player.ship.modules_mut() {
        for cannon in module.cannons.iter_mut() {
            fire_hull_cannon(cannon, &shooter, now, &mut out);
        }
        for turret in module.turrets.iter_mut() {
            fire_turret(turret, &shooter, now, &mut out);
        }
    }
    out
}

/// Damage per second of a cannon list, used for debug info
pub fn cannon_dps(cannons: &[Cannon], mods: &StatModifiers) -> f32 {
    cannons
        .iter()
        .filter(|c| c.kind.fires())
        .map(|c| {
            let damage = (BULLET_DAMAGE * c.stats.damage_mod * mods.bullet_damage)
                .floor()
                .max(1.0);
            let reload = (c.stats.reload as f32 * mods.reload).max(0.01);
            damage * c.stats.bullet_count as f32 / reload
        })
        .sum()
}

/// Damage per second of a turret, accounting for alternating barrels
pub fn turret_dps(turret: &Turret, mods: &StatModifiers) -> f32 {
    if turret.is_alternating() {
        cannon_dps(&turret.cannons[..1], mods)
    } else {
        cannon_dps(&turret.cannons, mods)
    }
}
