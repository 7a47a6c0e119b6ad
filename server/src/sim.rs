//! Fixed-timestep simulation of player movement against the terrain
//!
//! [`step`] advances the whole world by exactly one tick of [`TICK_DT`]
//! seconds. The driver calls it from a fixed-rate timer and never passes
//! elapsed wall-clock time in, so the trajectory a given input sequence
//! produces is identical from run to run regardless of scheduling jitter.
//!
//! Integration is semi-implicit Euler with the order: consume the pending
//! jump, accumulate forces, integrate position with the previous tick's
//! velocity, resolve terrain contact, then integrate and clamp velocity.
//! Ground contact is resolved between the position and velocity updates so
//! that landing can cancel the gravity accumulated in the same tick, which
//! is what keeps `grounded` equivalent to `vy == 0`.

use crate::terrain::OccupancyGrid;
use crate::world::World;
use log::debug;
use shared::{
    PlayerState, AIR_ACCEL, FRICTION, GRAVITY, GROUNDED_ACCEL, JUMP_IMPULSE, MAX_VX, MIN_VX,
    RESPAWN_Y, TERMINAL_VY, TICK_DT,
};

/// Advances every player by one fixed tick.
pub fn step(world: &mut World, grid: &OccupancyGrid) {
    world.tick = world.tick.wrapping_add(1);

    for player in world.players_mut() {
        step_player(player, grid);
    }

    if world.tick % 100 == 0 && !world.is_empty() {
        debug!("Tick {}: {} players", world.tick, world.len());
    }
}

/// One tick of one player.
fn step_player(player: &mut PlayerState, grid: &OccupancyGrid) {
    // A pending jump is consumed exactly once. Only a grounded player gets
    // the impulse; a press made in the air is discarded, never banked for
    // the landing.
    if player.jump_pending {
        if player.grounded {
            player.vy = JUMP_IMPULSE;
            player.grounded = false;
        }
        player.jump_pending = false;
    }

    if player.axis != 0 {
        player.facing = player.axis;
    }

    // Forces under unit mass. Friction only acts while grounded; gravity
    // only while airborne.
    let ax;
    let mut ay;
    if player.grounded {
        ax = player.axis as f32 * GROUNDED_ACCEL - sign(player.vx) * FRICTION;
        ay = 0.0;
    } else {
        ax = player.axis as f32 * AIR_ACCEL;
        ay = GRAVITY;
    }

    // Position moves on the previous tick's velocity.
    player.x += player.vx * TICK_DT;
    player.y += player.vy * TICK_DT;

    // Fallen out of the world: replace the whole record with a fresh spawn
    // and skip the rest of the tick.
    if player.y > RESPAWN_Y {
        *player = PlayerState::spawn();
        return;
    }

    // Terrain contact. Only a player moving down or holding still can land;
    // a rising player passes through so a jump is not cancelled on frame
    // one. Landing zeroes the vertical motion accumulated this tick. A
    // grounded player whose supporting cell is gone starts falling next
    // tick. A fully buried column reports no surface and is treated as no
    // contact at all.
    if player.vy >= 0.0 {
        if let Some(surface_y) = grid.surface_above(player.x, player.y) {
            player.y = surface_y;
            player.vy = 0.0;
            ay = 0.0;
            player.grounded = true;
        } else if player.grounded && !grid.is_solid(player.x, player.y + 1.0) {
            player.grounded = false;
        }
    }

    // Velocity integration and clamps. Horizontal speed snaps to zero below
    // MIN_VX, which is one tick's worth of friction, so friction brings a
    // player to rest instead of oscillating around it.
    player.vx += ax * TICK_DT;
    if player.vx.abs() < MIN_VX {
        player.vx = 0.0;
    } else if player.vx.abs() > MAX_VX {
        player.vx = sign(player.vx) * MAX_VX;
    }

    player.vy += ay * TICK_DT;
    if player.vy > TERMINAL_VY {
        player.vy = TERMINAL_VY;
    }
}

/// Sign with `sign(0) == 0`. `f32::signum` returns 1.0 for zero, which
/// would apply friction to a player standing still.
fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{InputIntent, SPAWN_X, SPAWN_Y};

    /// 800x600 level, solid ground from row 550 down.
    fn flat_grid() -> OccupancyGrid {
        OccupancyGrid::from_fn(800, 600, |_, row| row >= 550)
    }

    /// World with one player standing on the flat ground.
    fn world_with_grounded_player() -> World {
        let mut world = World::new();
        world.add_player(1);
        let player = world.players_mut().next().unwrap();
        player.x = 400.0;
        player.y = 549.0;
        player.vx = 0.0;
        player.vy = 0.0;
        player.grounded = true;
        world
    }

    fn player(world: &World) -> PlayerState {
        *world.player(1).unwrap()
    }

    fn press(world: &mut World, up: bool, left: bool, right: bool) {
        world.apply_intent(
            1,
            &InputIntent {
                up,
                down: false,
                left,
                right,
            },
        );
    }

    #[test]
    fn test_sign_of_zero_is_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(3.5), 1.0);
        assert_eq!(sign(-0.1), -1.0);
        // The standard signum would break the rest state.
        assert_eq!(0.0f32.signum(), 1.0);
    }

    #[test]
    fn test_step_advances_tick_on_empty_world() {
        let grid = flat_grid();
        let mut world = World::new();
        step(&mut world, &grid);
        step(&mut world, &grid);
        assert_eq!(world.tick, 2);
    }

    #[test]
    fn test_falling_player_lands_on_surface() {
        // Directly above ground starting at row 550, moving down at 100:
        // one tick carries the player into the solid row and contact snaps
        // them onto the surface with vertical motion cancelled.
        let grid = flat_grid();
        let mut world = world_with_grounded_player();
        {
            let p = world.players_mut().next().unwrap();
            p.grounded = false;
            p.vy = 100.0;
        }

        step(&mut world, &grid);

        let p = player(&world);
        assert_eq!(p.y, 549.0);
        assert_eq!(p.vy, 0.0);
        assert!(p.grounded);
    }

    #[test]
    fn test_rest_state_is_idempotent() {
        let grid = flat_grid();
        let mut world = world_with_grounded_player();

        for _ in 0..100 {
            step(&mut world, &grid);
            let p = player(&world);
            assert_eq!(p.x, 400.0);
            assert_eq!(p.y, 549.0);
            assert_eq!(p.vx, 0.0);
            assert_eq!(p.vy, 0.0);
            assert!(p.grounded);
        }
    }

    #[test]
    fn test_grounded_always_means_zero_vy() {
        let grid = flat_grid();
        let mut world = world_with_grounded_player();

        for tick in 0..300 {
            // Re-press jump periodically and wiggle the axis to cover the
            // launch, flight, landing and walking phases.
            if tick % 75 == 0 {
                press(&mut world, true, false, true);
            }
            if tick % 40 == 0 {
                press(&mut world, false, true, false);
            }
            step(&mut world, &grid);

            let p = player(&world);
            assert!(!p.grounded || p.vy == 0.0, "tick {}: grounded with vy {}", tick, p.vy);
        }
    }

    #[test]
    fn test_walk_accelerates_to_speed_cap() {
        let grid = flat_grid();
        let mut world = world_with_grounded_player();
        press(&mut world, false, false, true);

        for _ in 0..40 {
            step(&mut world, &grid);
            let p = player(&world);
            assert!(p.vx == 0.0 || (MIN_VX..=MAX_VX).contains(&p.vx.abs()));
        }

        let p = player(&world);
        assert_eq!(p.vx, MAX_VX);
        assert_eq!(p.facing, 1);
        assert!(p.x > 400.0);
        assert!(p.grounded);
    }

    #[test]
    fn test_friction_stops_a_released_runner() {
        let grid = flat_grid();
        let mut world = world_with_grounded_player();
        {
            let p = world.players_mut().next().unwrap();
            p.vx = MAX_VX;
        }

        for _ in 0..40 {
            step(&mut world, &grid);
        }

        let p = player(&world);
        assert_eq!(p.vx, 0.0);

        // Once stopped the position holds exactly.
        let x_at_rest = p.x;
        for _ in 0..20 {
            step(&mut world, &grid);
        }
        assert_eq!(player(&world).x, x_at_rest);
    }

    #[test]
    fn test_sub_threshold_speed_snaps_to_zero() {
        let grid = flat_grid();
        let mut world = world_with_grounded_player();
        {
            let p = world.players_mut().next().unwrap();
            p.vx = MIN_VX - 1.0;
        }

        step(&mut world, &grid);
        assert_eq!(player(&world).vx, 0.0);
    }

    #[test]
    fn test_air_control_is_weaker_than_ground() {
        let grid = flat_grid();

        let mut grounded = world_with_grounded_player();
        press(&mut grounded, false, false, true);
        step(&mut grounded, &grid);
        assert_approx_eq!(player(&grounded).vx, GROUNDED_ACCEL * TICK_DT, 1e-3);

        let mut airborne = world_with_grounded_player();
        {
            let p = airborne.players_mut().next().unwrap();
            p.grounded = false;
            p.y = 300.0;
        }
        press(&mut airborne, false, false, true);
        step(&mut airborne, &grid);
        assert_approx_eq!(player(&airborne).vx, AIR_ACCEL * TICK_DT, 1e-3);
    }

    #[test]
    fn test_jump_round_trip_returns_to_surface() {
        let grid = flat_grid();
        let mut world = world_with_grounded_player();
        press(&mut world, true, false, false);

        step(&mut world, &grid);
        let p = player(&world);
        assert!(!p.grounded);
        assert!(!p.jump_pending);
        assert_eq!(p.vy, JUMP_IMPULSE + GRAVITY * TICK_DT);
        assert!(p.y < 549.0);

        let mut min_y = p.y;
        let mut ticks_to_land = None;
        for tick in 2..120 {
            step(&mut world, &grid);
            let p = player(&world);
            min_y = min_y.min(p.y);
            // Exactly one impulse: vy never exceeds the launch speed.
            assert!(p.vy >= JUMP_IMPULSE);
            if p.grounded {
                ticks_to_land = Some(tick);
                break;
            }
        }

        let ticks = ticks_to_land.expect("jump never landed");
        assert!((55..=70).contains(&ticks), "landed after {} ticks", ticks);
        assert!(min_y < 460.0, "apex only reached {}", min_y);

        let p = player(&world);
        assert_eq!(p.y, 549.0);
        assert_eq!(p.vy, 0.0);

        // No second impulse without a new press.
        for _ in 0..20 {
            step(&mut world, &grid);
            assert!(player(&world).grounded);
        }
    }

    #[test]
    fn test_airborne_press_is_discarded() {
        let grid = flat_grid();
        let mut world = world_with_grounded_player();
        {
            let p = world.players_mut().next().unwrap();
            p.grounded = false;
            p.y = 400.0;
        }
        press(&mut world, true, false, false);

        step(&mut world, &grid);
        let p = player(&world);
        assert!(!p.jump_pending);
        assert_approx_eq!(p.vy, GRAVITY * TICK_DT, 1e-3);

        // The press must not fire on landing either.
        for _ in 0..120 {
            step(&mut world, &grid);
            assert!(player(&world).vy >= 0.0);
            if player(&world).grounded {
                break;
            }
        }
        let p = player(&world);
        assert!(p.grounded);
        assert_eq!(p.y, 549.0);
        assert_eq!(p.vy, 0.0);
    }

    #[test]
    fn test_fall_is_capped_at_terminal_velocity() {
        // All-open grid: nothing to land on.
        let grid = OccupancyGrid::from_fn(10, 10, |_, _| false);
        let mut world = World::new();
        world.add_player(1);
        {
            let p = world.players_mut().next().unwrap();
            p.y = 0.0;
        }

        for _ in 0..60 {
            step(&mut world, &grid);
            assert!(player(&world).vy <= TERMINAL_VY);
        }
        assert_eq!(player(&world).vy, TERMINAL_VY);
    }

    #[test]
    fn test_fall_past_threshold_respawns() {
        let grid = OccupancyGrid::from_fn(10, 10, |_, _| false);
        let mut world = World::new();
        world.add_player(1);
        {
            let p = world.players_mut().next().unwrap();
            p.x = 5.0;
            p.y = RESPAWN_Y - 2.0;
            p.vy = TERMINAL_VY;
            p.vx = 50.0;
            p.facing = -1;
        }

        step(&mut world, &grid);

        // The whole record is replaced, not just the position.
        assert_eq!(player(&world), PlayerState::spawn());
        assert_eq!(player(&world).x, SPAWN_X);
        assert_eq!(player(&world).y, SPAWN_Y);
    }

    #[test]
    fn test_walking_off_a_ledge_starts_a_fall() {
        // Ground only under the left half of the map.
        let grid = OccupancyGrid::from_fn(800, 600, |col, row| row >= 550 && col < 400);
        let mut world = world_with_grounded_player();
        {
            let p = world.players_mut().next().unwrap();
            p.x = 395.0;
        }
        press(&mut world, false, false, true);

        let mut left_ground = false;
        for _ in 0..100 {
            step(&mut world, &grid);
            if !player(&world).grounded {
                left_ground = true;
            }
        }

        assert!(left_ground);
        let p = player(&world);
        assert!(!p.grounded);
        assert!(p.x > 400.0);
        assert!(p.y > 560.0, "player did not fall, y = {}", p.y);
    }

    #[test]
    fn test_buried_column_gives_no_footing() {
        let grid = OccupancyGrid::from_fn(10, 10, |_, _| true);
        let mut world = World::new();
        world.add_player(1);
        {
            let p = world.players_mut().next().unwrap();
            p.x = 5.0;
            p.y = 5.0;
        }

        for _ in 0..50 {
            step(&mut world, &grid);
            assert!(!player(&world).grounded);
        }
        // Without a surface the player just keeps accelerating downward.
        assert!(player(&world).vy > 0.0);
        assert!(player(&world).y > 5.0);
    }

    #[test]
    fn test_facing_keeps_last_direction() {
        let grid = flat_grid();
        let mut world = world_with_grounded_player();

        press(&mut world, false, true, false);
        step(&mut world, &grid);
        assert_eq!(player(&world).facing, -1);

        press(&mut world, false, false, false);
        for _ in 0..10 {
            step(&mut world, &grid);
        }
        assert_eq!(player(&world).facing, -1);

        press(&mut world, false, false, true);
        step(&mut world, &grid);
        assert_eq!(player(&world).facing, 1);
    }

    #[test]
    fn test_rising_player_passes_through_surface_level() {
        // A player moving upward through the row they would rest at must
        // not be captured by the ground on the way up.
        let grid = flat_grid();
        let mut world = world_with_grounded_player();
        press(&mut world, true, false, false);

        for _ in 0..5 {
            step(&mut world, &grid);
            let p = player(&world);
            assert!(!p.grounded);
            assert!(p.vy < 0.0);
        }
    }
}
