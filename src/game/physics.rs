//! Ship physics, movement constraints and collision geometry

use rand::Rng;

use crate::util::math::normalize_angle;

use super::constants::{
    BASE_SHIP_LENGTH, BASE_SHIP_TURN_SPEED, BULLET_BOUNDS_MARGIN, COLLISION_RESTITUTION,
    SHIP_BRAKE, SHIP_DECELERATION, WORLD_HEIGHT, WORLD_WIDTH,
};
use super::player::Player;
use super::ship::Aabb;
use super::weapons::Projectile;

/// Continuous movement keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Physics system for updating ship positions and velocities
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one ship by `dt` seconds.
    ///
    /// Forward thrust snaps velocity to max speed along the heading; drag then
    /// applies every tick. Turning scales with current speed and inversely
    /// with hull length, so long or slow ships turn slower.
    pub fn update_ship(player: &mut Player, keys: MovementKeys, dt: f32) {
        let max_speed = player.max_speed();
        let speed = (player.vx * player.vx + player.vy * player.vy).sqrt();

        let turn_dir = match (keys.left, keys.right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        let length_factor = BASE_SHIP_LENGTH / player.ship.length.max(1.0);
        let speed_factor = if max_speed > 0.0 {
            (speed / max_speed).min(1.0)
        } else {
            0.0
        };
        let turn_rate = BASE_SHIP_TURN_SPEED
            * player.modifiers.turn_speed.max(0.1)
            * speed_factor
            * length_factor;
        player.angular_velocity = turn_dir * turn_rate;
        player.angle = normalize_angle(player.angle + player.angular_velocity * dt);

        if keys.up {
            player.vx = player.angle.cos() * max_speed;
            player.vy = player.angle.sin() * max_speed;
        }

        // Apply drag
        player.vx *= SHIP_DECELERATION;
        player.vy *= SHIP_DECELERATION;
        if keys.down {
            player.vx *= SHIP_BRAKE;
            player.vy *= SHIP_BRAKE;
        }

        // Clamp to max speed
        let speed = (player.vx * player.vx + player.vy * player.vy).sqrt();
        if speed > max_speed {
            let scale = max_speed / speed;
            player.vx *= scale;
            player.vy *= scale;
        }

        player.x += player.vx * dt;
        player.y += player.vy * dt;
        player.clamp_to_world();
    }

    /// Separate two overlapping ships along the axis of least penetration and
    /// apply an inelastic impulse on that axis. Returns whether they touched.
    pub fn resolve_ship_collision<R: Rng>(a: &mut Player, b: &mut Player, rng: &mut R) -> bool {
        let box_a = a.bounding_box();
        let box_b = b.bounding_box();
        if !box_a.overlaps(&box_b) {
            return false;
        }

        let overlap_x = box_a.max_x.min(box_b.max_x) - box_a.min_x.max(box_b.min_x);
        let overlap_y = box_a.max_y.min(box_b.max_y) - box_a.min_y.max(box_b.min_y);

        let random_sign = |rng: &mut R| if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

        if overlap_x < overlap_y {
            let dx = b.x - a.x;
            let dir = if dx == 0.0 { random_sign(rng) } else { dx.signum() };
            let push = overlap_x / 2.0;
            a.x -= dir * push;
            b.x += dir * push;

            // Relative velocity along the normal; negative means closing
            let closing = (b.vx - a.vx) * dir;
            if closing < 0.0 {
                let j = -(1.0 + COLLISION_RESTITUTION) * closing / 2.0;
                a.vx -= j * dir;
                b.vx += j * dir;
            }
        } else {
            let dy = b.y - a.y;
            let dir = if dy == 0.0 { random_sign(rng) } else { dy.signum() };
            let push = overlap_y / 2.0;
            a.y -= dir * push;
            b.y += dir * push;

            let closing = (b.vy - a.vy) * dir;
            if closing < 0.0 {
                let j = -(1.0 + COLLISION_RESTITUTION) * closing / 2.0;
                a.vy -= j * dir;
                b.vy += j * dir;
            }
        }

        // A ship pinned against a wall hands its share of the push to the other
        let (pushed_a, pushed_b) = ((a.x, a.y), (b.x, b.y));
        a.clamp_to_world();
        b.clamp_to_world();
        let lost_a = (a.x - pushed_a.0, a.y - pushed_a.1);
        let lost_b = (b.x - pushed_b.0, b.y - pushed_b.1);
        if lost_a != (0.0, 0.0) || lost_b != (0.0, 0.0) {
            a.x += lost_b.0;
            a.y += lost_b.1;
            b.x += lost_a.0;
            b.y += lost_a.1;
            a.clamp_to_world();
            b.clamp_to_world();
        }
        true
    }

    /// Disc-vs-box narrow phase for bullets
    pub fn bullet_hits_box(bullet: &Projectile, aabb: &Aabb) -> bool {
        let (cx, cy) = aabb.closest_point(bullet.x, bullet.y);
        let dx = bullet.x - cx;
        let dy = bullet.y - cy;
        dx * dx + dy * dy <= bullet.radius * bullet.radius
    }

    /// Whether a bullet has left the extended world rectangle
    pub fn bullet_out_of_bounds(bullet: &Projectile) -> bool {
        bullet.x < -BULLET_BOUNDS_MARGIN
            || bullet.y < -BULLET_BOUNDS_MARGIN
            || bullet.x > WORLD_WIDTH + BULLET_BOUNDS_MARGIN
            || bullet.y > WORLD_HEIGHT + BULLET_BOUNDS_MARGIN
    }

    /// Whether `attacker` faces `victim` within `cone` radians
    pub fn is_facing(attacker: &Player, victim: &Player, cone: f32) -> bool {
        let to_victim = (victim.y - attacker.y).atan2(victim.x - attacker.x);
        normalize_angle(to_victim - attacker.angle).abs() <= cone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::PLAYER_SIZE;
    use crate::util::time::tick_delta;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ship(id: u32, x: f32, y: f32) -> Player {
        Player::new(id, format!("P{id}"), "#FFFFFF".into(), x, y, 0.0)
    }

    #[test]
    fn test_forward_sets_velocity() {
        let mut p = ship(1, 1000.0, 1000.0);
        let keys = MovementKeys {
            up: true,
            ..Default::default()
        };
        PhysicsSystem::update_ship(&mut p, keys, tick_delta());
        let expected = p.max_speed() * SHIP_DECELERATION;
        assert!((p.vx - expected).abs() < 1e-3);
        assert!(p.vy.abs() < 1e-3);
        assert!(p.x > 1000.0);
    }

    #[test]
    fn test_drag_decays_velocity() {
        let mut p = ship(1, 1000.0, 1000.0);
        p.vx = 100.0;
        PhysicsSystem::update_ship(&mut p, MovementKeys::default(), tick_delta());
        assert!((p.vx - 100.0 * SHIP_DECELERATION).abs() < 1e-3);
    }

    #[test]
    fn test_stationary_ship_cannot_turn() {
        let mut p = ship(1, 1000.0, 1000.0);
        let keys = MovementKeys {
            right: true,
            ..Default::default()
        };
        PhysicsSystem::update_ship(&mut p, keys, tick_delta());
        assert_eq!(p.angle, 0.0);
    }

    #[test]
    fn test_moving_ship_turns_right() {
        let mut p = ship(1, 1000.0, 1000.0);
        p.vx = p.max_speed();
        let keys = MovementKeys {
            up: true,
            right: true,
            ..Default::default()
        };
        PhysicsSystem::update_ship(&mut p, keys, tick_delta());
        assert!(p.angle > 0.0);
    }

    #[test]
    fn test_world_bounds_respected() {
        let mut p = ship(1, 30.0, 30.0);
        p.angle = std::f32::consts::PI;
        let keys = MovementKeys {
            up: true,
            ..Default::default()
        };
        for _ in 0..60 {
            PhysicsSystem::update_ship(&mut p, keys, tick_delta());
            assert!(p.x >= PLAYER_SIZE / 2.0);
        }
    }

    #[test]
    fn test_collision_separates_on_small_axis() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut a = ship(1, 1000.0, 1000.0);
        let mut b = ship(2, 1040.0, 1005.0);
        a.vx = 50.0;
        b.vx = -50.0;
        assert!(PhysicsSystem::resolve_ship_collision(&mut a, &mut b, &mut rng));

        let (ba, bb) = (a.bounding_box(), b.bounding_box());
        assert!(ba.max_x <= bb.min_x + 1e-3);
        // Closing velocities were reflected with restitution 0.5
        assert!((a.vx - -25.0).abs() < 1e-3);
        assert!((b.vx - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_collision_against_wall_pushes_other_ship() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut a = ship(1, PLAYER_SIZE / 2.0, 1000.0);
        let mut b = ship(2, 50.0, 1000.0);
        assert!(PhysicsSystem::resolve_ship_collision(&mut a, &mut b, &mut rng));

        let (ba, bb) = (a.bounding_box(), b.bounding_box());
        assert_eq!(a.x, PLAYER_SIZE / 2.0);
        assert!(ba.max_x <= bb.min_x + 1e-3);
    }

    #[test]
    fn test_collision_coincident_centers() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut a = ship(1, 1000.0, 1000.0);
        let mut b = ship(2, 1000.0, 1000.0);
        assert!(PhysicsSystem::resolve_ship_collision(&mut a, &mut b, &mut rng));
        assert!(a.x != b.x || a.y != b.y);
    }

    #[test]
    fn test_separating_ships_keep_velocity() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut a = ship(1, 1000.0, 1000.0);
        let mut b = ship(2, 1040.0, 1000.0);
        a.vx = -10.0;
        b.vx = 10.0;
        PhysicsSystem::resolve_ship_collision(&mut a, &mut b, &mut rng);
        assert_eq!(a.vx, -10.0);
        assert_eq!(b.vx, 10.0);
    }

    #[test]
    fn test_facing_cone() {
        let a = ship(1, 1000.0, 1000.0);
        let ahead = ship(2, 1100.0, 1020.0);
        let beside = ship(3, 1000.0, 1100.0);
        assert!(PhysicsSystem::is_facing(&a, &ahead, std::f32::consts::FRAC_PI_4));
        assert!(!PhysicsSystem::is_facing(&a, &beside, std::f32::consts::FRAC_PI_4));
    }
}
