//! Per-sub-step actor simulation
//!
//! Ability state is a set of concurrent flags and time-decayed counters on the
//! [`Actor`] (grounded, dashing, wall contact, coyote, buffers, locks). One
//! call to [`step`] advances all of them by exactly one fixed increment:
//!
//! 1. decay timers and buffers
//! 2. wall-bounce, which overrides everything else this step
//! 3. dash start / dash progress, or run curve + gravity + walls + jumps
//! 4. axis-separated movement and collision
//! 5. landing bookkeeping and entity contacts

use std::f32::consts::FRAC_1_SQRT_2;

use glam::Vec2;

use super::collision::{
    clamp_to_bounds, land_on_platforms, resolve_x, resolve_y, touching_wall, wall_bounce_side,
};
use super::interact;
use super::state::{ActiveDash, Actor, GameEvent, World};
use super::tick::FrameInput;
use crate::consts::*;
use crate::sign;

/// Dash timers within this of zero count as expired (absorbs f32 drift over 10 steps)
const DASH_END_EPSILON: f32 = 1e-5;

/// Advance the actor by one fixed sub-step
pub fn step(
    actor: &mut Actor,
    world: &mut World,
    input: &FrameInput,
    dt: f32,
    events: &mut Vec<GameEvent>,
) {
    let dir = f32::from(input.direction.signum());

    update_timers(actor, dt);

    if !try_wall_bounce(actor, world, events) {
        if actor.dash_buffer > 0.0 && actor.can_dash && !actor.is_dashing() {
            start_dash(actor, dir, events);
        }

        if actor.is_dashing() {
            advance_dash(actor, dt);
        } else {
            run(actor, dir, dt);
            actor.vel.y = (actor.vel.y + GRAVITY * dt).min(MAX_FALL_SPEED);
            walls_and_jumps(actor, world, dir, events);
            apply_jump_cut(actor, input.jump_held);
        }
    }

    let was_grounded = actor.grounded;
    move_and_collide(actor, world, dt);

    if actor.grounded && !actor.is_dashing() {
        actor.can_dash = true;
        if !was_grounded {
            events.push(GameEvent::Land);
        }
    }

    interact::resolve_contacts(actor, world, dir, events);
}

fn update_timers(actor: &mut Actor, dt: f32) {
    if actor.grounded {
        actor.coyote = COYOTE_TIME;
    } else {
        actor.coyote = (actor.coyote - dt).max(0.0);
    }

    actor.jump_buffer = (actor.jump_buffer - dt).max(0.0);
    actor.dash_buffer = (actor.dash_buffer - dt).max(0.0);
    actor.wall_jump_lock = (actor.wall_jump_lock - dt).max(0.0);
    actor.spring_lock = (actor.spring_lock - dt).max(0.0);

    // The bounce window stays open for the whole of a straight-up dash
    match actor.dash {
        Some(dash) if dash.is_vertical() => actor.wall_bounce = WALL_BOUNCE_WINDOW,
        _ => actor.wall_bounce = (actor.wall_bounce - dt).max(0.0),
    }
}

/// Super wall-jump out of a straight-up dash. Cancels the dash if one is running.
fn try_wall_bounce(actor: &mut Actor, world: &World, events: &mut Vec<GameEvent>) -> bool {
    if actor.jump_buffer <= 0.0 || actor.wall_bounce <= 0.0 {
        return false;
    }
    let Some(side) = wall_bounce_side(actor, &world.solids) else {
        return false;
    };

    actor.jump_buffer = 0.0;
    actor.wall_bounce = 0.0;
    actor.dash = None;
    actor.vel = Vec2::new(-side * WALL_JUMP_X, WALL_BOUNCE_Y);
    actor.facing = -side;
    actor.wall_jump_lock = WALL_BOUNCE_LOCK;
    actor.move_timer = 0.0;
    actor.jump_cut_armed = false;

    log::debug!("wall bounce off side {side}");
    events.push(GameEvent::WallBounce);
    true
}

/// Snap into a dash. Diagonal when horizontal input is held, else straight up.
///
/// Callers check availability; this always consumes the charge.
pub(crate) fn start_dash(actor: &mut Actor, dir: f32, events: &mut Vec<GameEvent>) {
    let dash_dir = if dir != 0.0 {
        Vec2::new(dir * FRAC_1_SQRT_2, -FRAC_1_SQRT_2)
    } else {
        Vec2::new(0.0, -1.0)
    };

    actor.can_dash = false;
    actor.dash = Some(ActiveDash {
        remaining: DASH_TIME,
        dir: dash_dir,
    });
    actor.vel = dash_dir * DASH_SPEED;
    if dir != 0.0 {
        actor.facing = dir;
    }

    actor.dash_buffer = 0.0;
    actor.jump_buffer = 0.0;
    actor.coyote = 0.0;
    actor.grounded = false;
    actor.move_timer = 0.0;
    actor.spring_lock = 0.0;
    actor.jump_cut_armed = false;
    if dash_dir.x == 0.0 {
        actor.wall_bounce = WALL_BOUNCE_WINDOW;
    }

    events.push(GameEvent::Dash { dir: dash_dir });
}

/// Hold dash velocity until the timer runs out, then cut it in half
fn advance_dash(actor: &mut Actor, dt: f32) {
    let Some(dash) = actor.dash.as_mut() else {
        return;
    };

    dash.remaining -= dt;
    if dash.remaining > DASH_END_EPSILON {
        actor.vel = dash.dir * DASH_SPEED;
        return;
    }

    actor.dash = None;
    actor.vel *= 0.5;
    if !actor.grounded {
        actor.vel.x = actor.vel.x.clamp(-DASH_EXIT_MAX_VX, DASH_EXIT_MAX_VX);
        actor.vel.y = actor.vel.y.max(-DASH_EXIT_MAX_RISE);
    }
}

/// Horizontal run curve: quadratic ease-in while held, exponential friction when released
fn run(actor: &mut Actor, dir: f32, dt: f32) {
    let mut input_x = if actor.wall_jump_lock > 0.0 { 0.0 } else { dir };
    if input_x != 0.0 {
        actor.facing = input_x;
    }

    // A side spring owns the horizontal axis until its lock expires
    if actor.spring_lock > 0.0 && input_x != 0.0 && sign(actor.vel.x) == -input_x {
        input_x = 0.0;
    }

    if input_x != 0.0 {
        actor.spring_lock = 0.0;

        if actor.vel.x != 0.0 && sign(actor.vel.x) != input_x {
            // Reversal brakes hard and restarts the curve
            actor.move_timer = 0.0;
            actor.vel.x = 0.0;
        } else if actor.move_timer == 0.0 && actor.vel.x.abs() > 0.0 {
            // Already moving this way: pick the curve up at the current speed
            let t = (actor.vel.x.abs() / MAX_SPEED).min(1.0).sqrt();
            actor.move_timer = t * ACCEL_TIME;
        }

        actor.move_timer += dt;
        let t = (actor.move_timer / ACCEL_TIME).min(1.0);
        let target = MAX_SPEED * t * t * input_x;

        if actor.vel.x.abs() <= MAX_SPEED {
            actor.vel.x = target;
        } else {
            // Overspeed bleeds off slowly while pushing along it
            actor.vel.x += (target - actor.vel.x) * (1.0 - OVERSPEED_DECAY.powf(dt));
        }
    } else {
        actor.move_timer = 0.0;
        if actor.spring_lock > 0.0 {
            actor.vel.x *= SPRING_DRAG.powf(dt * 60.0);
        } else {
            let decel_time = if actor.wall_jump_lock > 0.0 {
                WALL_JUMP_DECEL_TIME
            } else {
                DECEL_TIME
            };
            actor.vel.x *= 0.001f32.powf(dt / decel_time);
        }
        if actor.vel.x.abs() < STOP_SPEED {
            actor.vel.x = 0.0;
        }
    }
}

fn walls_and_jumps(actor: &mut Actor, world: &World, dir: f32, events: &mut Vec<GameEvent>) {
    actor.on_wall = if touching_wall(actor, &world.solids, WALL_PROBE) {
        1
    } else if touching_wall(actor, &world.solids, -WALL_PROBE) {
        -1
    } else {
        0
    };

    actor.wall_sliding = !actor.grounded
        && actor.on_wall != 0
        && actor.vel.y > 0.0
        && dir == f32::from(actor.on_wall);
    if actor.wall_sliding {
        actor.vel.y = actor.vel.y.min(WALL_SLIDE_SPEED);
    }

    if actor.jump_buffer <= 0.0 {
        return;
    }

    if actor.grounded || actor.coyote > 0.0 {
        actor.vel.y = JUMP_FORCE;
        actor.jump_buffer = 0.0;
        actor.coyote = 0.0;
        actor.grounded = false;
        actor.jump_cut_armed = true;
        events.push(GameEvent::Jump);
    } else if actor.on_wall != 0 {
        let side = f32::from(actor.on_wall);
        actor.vel = Vec2::new(-side * WALL_JUMP_X, WALL_JUMP_Y);
        actor.facing = -side;
        // Holding into the wall (or nothing) locks steering so the escape arc survives
        actor.wall_jump_lock = if dir == side || dir == 0.0 {
            WALL_JUMP_LOCK
        } else {
            0.0
        };
        actor.jump_buffer = 0.0;
        actor.move_timer = 0.0;
        actor.wall_sliding = false;
        actor.jump_cut_armed = true;
        events.push(GameEvent::WallJump);
    }
}

/// Releasing jump while still rising cuts the arc, once per jump
fn apply_jump_cut(actor: &mut Actor, jump_held: bool) {
    if !actor.jump_cut_armed {
        return;
    }
    if actor.vel.y >= 0.0 {
        actor.jump_cut_armed = false;
    } else if !jump_held {
        actor.vel.y *= JUMP_CUT;
        actor.jump_cut_armed = false;
    }
}

/// Move along x then y, resolving each axis
fn move_and_collide(actor: &mut Actor, world: &World, dt: f32) {
    actor.pos.x += actor.vel.x * dt;
    resolve_x(actor, &world.solids);
    clamp_to_bounds(actor);

    actor.pos.y += actor.vel.y * dt;
    actor.grounded = false;
    actor.ground_id = None;

    if !actor.is_dashing() && actor.vel.y > 0.0 && land_on_platforms(actor, &world.platforms) {
        actor.grounded = true;
    }

    let contact = resolve_y(actor, &world.solids);
    if contact.grounded {
        actor.grounded = true;
        actor.ground_id = contact.ground_id;
    }
    // Nothing left to cut after a head hit
    if contact.bonked {
        actor.jump_cut_armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::geom::{Rect, intersects};
    use proptest::prelude::*;

    fn flat_world() -> World {
        let mut world = World::new();
        world.add_solid(Rect::new(-50.0, GROUND_Y, 580.0, 48.0));
        world
    }

    fn idle() -> FrameInput {
        FrameInput::default()
    }

    fn run_steps(actor: &mut Actor, world: &mut World, input: &FrameInput, steps: usize) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..steps {
            step(actor, world, input, PHYSICS_STEP, &mut events);
        }
        events
    }

    #[test]
    fn test_standing_stays_grounded() {
        let mut world = flat_world();
        let mut actor = Actor::standing_at(240.0, GROUND_Y);
        run_steps(&mut actor, &mut world, &idle(), 50);
        assert!(actor.grounded);
        assert_eq!(actor.bottom(), GROUND_Y);
        assert_eq!(actor.vel, Vec2::ZERO);
    }

    #[test]
    fn test_dash_straight_up_then_half_speed() {
        let mut world = flat_world();
        let mut actor = Actor::standing_at(240.0, GROUND_Y);
        actor.buffer_input(false, true);

        let mut events = Vec::new();
        step(&mut actor, &mut world, &idle(), PHYSICS_STEP, &mut events);
        assert_eq!(actor.vel, Vec2::new(0.0, -DASH_SPEED));
        assert!(!actor.can_dash);
        assert!(events.contains(&GameEvent::Dash { dir: Vec2::new(0.0, -1.0) }));

        // Nine more steps complete the 0.1 s dash
        run_steps(&mut actor, &mut world, &idle(), 9);
        assert!(!actor.is_dashing());
        assert_eq!(actor.vel.y, -DASH_SPEED * 0.5);
        assert_eq!(actor.vel.x, 0.0);
    }

    #[test]
    fn test_diagonal_dash_exit_caps() {
        let mut world = flat_world();
        let mut actor = Actor::standing_at(100.0, GROUND_Y);
        actor.buffer_input(false, true);
        let right = FrameInput { direction: 1, ..idle() };
        run_steps(&mut actor, &mut world, &right, 10);
        assert!(!actor.is_dashing());
        assert!(actor.vel.x <= DASH_EXIT_MAX_VX);
        assert!(actor.vel.y >= -DASH_EXIT_MAX_RISE);
        assert!((actor.vel.x - DASH_SPEED * FRAC_1_SQRT_2 * 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_dash_refused_while_unavailable() {
        let mut world = flat_world();
        let mut actor = Actor::new(Vec2::new(200.0, -200.0));
        actor.can_dash = false;
        actor.buffer_input(false, true);
        let events = run_steps(&mut actor, &mut world, &idle(), 1);
        assert!(!actor.is_dashing());
        assert!(!events.iter().any(|e| matches!(e, GameEvent::Dash { .. })));
    }

    #[test]
    fn test_dash_refused_while_dashing() {
        let mut world = flat_world();
        let mut actor = Actor::new(Vec2::new(200.0, -400.0));
        actor.buffer_input(false, true);
        let mut events = run_steps(&mut actor, &mut world, &idle(), 3);
        // Pretend a refill happened mid-dash; a new press must not restart it
        actor.can_dash = true;
        actor.buffer_input(false, true);
        events.extend(run_steps(&mut actor, &mut world, &idle(), 1));
        let dashes = events.iter().filter(|e| matches!(e, GameEvent::Dash { .. })).count();
        assert_eq!(dashes, 1);
    }

    #[test]
    fn test_landing_restores_dash() {
        let mut world = flat_world();
        let mut actor = Actor::new(Vec2::new(200.0, GROUND_Y - 60.0));
        actor.can_dash = false;
        let events = run_steps(&mut actor, &mut world, &idle(), 40);
        assert!(actor.grounded);
        assert!(actor.can_dash);
        assert_eq!(events.iter().filter(|e| **e == GameEvent::Land).count(), 1);
    }

    #[test]
    fn test_buffered_jump_fires_on_landing() {
        let mut world = flat_world();
        // Feet 3px above the ground: lands within the buffer window
        let mut actor = Actor::new(Vec2::new(200.0, GROUND_Y - ACTOR_SIZE - 3.0));
        actor.vel.y = 300.0;
        actor.buffer_input(true, false);
        let held = FrameInput { jump_held: true, ..idle() };
        let events = run_steps(&mut actor, &mut world, &held, 3);
        assert!(events.contains(&GameEvent::Jump));
        assert!(actor.vel.y < 0.0);
    }

    #[test]
    fn test_coyote_jump_after_leaving_ledge() {
        let mut world = World::new();
        world.add_solid(Rect::new(0.0, GROUND_Y, 100.0, 48.0));
        let mut actor = Actor::standing_at(100.0, GROUND_Y);
        actor.pos.x = 101.0;
        run_steps(&mut actor, &mut world, &idle(), 3);
        assert!(!actor.grounded);

        actor.buffer_input(true, false);
        let held = FrameInput { jump_held: true, ..idle() };
        let events = run_steps(&mut actor, &mut world, &held, 1);
        assert!(events.contains(&GameEvent::Jump));
    }

    #[test]
    fn test_jump_cut_on_release() {
        let mut world = flat_world();
        let mut actor = Actor::standing_at(240.0, GROUND_Y);
        actor.buffer_input(true, false);
        let held = FrameInput { jump_held: true, ..idle() };
        run_steps(&mut actor, &mut world, &held, 2);
        let rising = actor.vel.y;
        run_steps(&mut actor, &mut world, &idle(), 1);
        let expected = (rising + GRAVITY * PHYSICS_STEP) * JUMP_CUT;
        assert!((actor.vel.y - expected).abs() < 1e-3);
        assert!(!actor.jump_cut_armed);
    }

    #[test]
    fn test_ceiling_hit_disarms_jump_cut() {
        let mut world = flat_world();
        world.add_solid(Rect::new(0.0, 90.0, VIEW_WIDTH, 24.0));
        let mut actor = Actor::standing_at(240.0, GROUND_Y);
        actor.buffer_input(true, false);
        let held = FrameInput { jump_held: true, ..idle() };

        run_steps(&mut actor, &mut world, &held, 1);
        assert!(actor.jump_cut_armed);
        run_steps(&mut actor, &mut world, &held, 1);
        assert_eq!(actor.pos.y, 114.0);
        assert_eq!(actor.vel.y, 0.0);
        assert!(!actor.jump_cut_armed);
    }

    #[test]
    fn test_run_curve_reaches_max_speed() {
        let mut world = flat_world();
        let mut actor = Actor::standing_at(100.0, GROUND_Y);
        let right = FrameInput { direction: 1, ..idle() };
        run_steps(&mut actor, &mut world, &right, 5);
        assert!(actor.vel.x > 0.0 && actor.vel.x < MAX_SPEED);
        run_steps(&mut actor, &mut world, &right, 10);
        assert_eq!(actor.vel.x, MAX_SPEED);
    }

    #[test]
    fn test_reversal_restarts_curve() {
        let mut world = flat_world();
        let mut actor = Actor::standing_at(200.0, GROUND_Y);
        actor.vel.x = MAX_SPEED;
        let left = FrameInput { direction: -1, ..idle() };
        run_steps(&mut actor, &mut world, &left, 1);
        let t = PHYSICS_STEP / ACCEL_TIME;
        assert!((actor.vel.x + MAX_SPEED * t * t).abs() < 1e-3);
    }

    #[test]
    fn test_friction_stops_actor() {
        let mut world = flat_world();
        let mut actor = Actor::standing_at(200.0, GROUND_Y);
        actor.vel.x = MAX_SPEED;
        run_steps(&mut actor, &mut world, &idle(), 20);
        assert_eq!(actor.vel.x, 0.0);
    }

    #[test]
    fn test_overspeed_decays_slowly_when_pushing_along() {
        let mut world = flat_world();
        let mut actor = Actor::new(Vec2::new(100.0, -400.0));
        actor.vel.x = 700.0;
        let right = FrameInput { direction: 1, ..idle() };
        run_steps(&mut actor, &mut world, &right, 5);
        assert!(actor.vel.x > 600.0, "vx = {}", actor.vel.x);
    }

    fn wall_world() -> World {
        let mut world = flat_world();
        // Tall wall on the right
        world.add_solid(Rect::new(300.0, -400.0, 48.0, 500.0));
        world
    }

    #[test]
    fn test_wall_slide_caps_fall_speed() {
        let mut world = wall_world();
        let mut actor = Actor::new(Vec2::new(300.0 - ACTOR_SIZE, -200.0));
        actor.vel.y = 600.0;
        let right = FrameInput { direction: 1, ..idle() };
        run_steps(&mut actor, &mut world, &right, 2);
        assert!(actor.wall_sliding);
        assert!(actor.vel.y <= WALL_SLIDE_SPEED);
    }

    #[test]
    fn test_wall_jump_launches_away() {
        let mut world = wall_world();
        let mut actor = Actor::new(Vec2::new(300.0 - ACTOR_SIZE, -200.0));
        actor.vel.y = 100.0;
        actor.buffer_input(true, false);
        let right = FrameInput { direction: 1, jump_held: true, ..idle() };
        let events = run_steps(&mut actor, &mut world, &right, 1);
        assert!(events.contains(&GameEvent::WallJump));
        assert!(actor.vel.x < 0.0);
        assert!(actor.vel.y < 0.0);
        assert_eq!(actor.facing, -1.0);
        assert!(actor.wall_jump_lock > 0.0);
    }

    #[test]
    fn test_wall_bounce_after_vertical_dash() {
        let mut world = wall_world();
        let mut actor = Actor::new(Vec2::new(300.0 - ACTOR_SIZE - 6.0, -100.0));
        actor.buffer_input(false, true);
        run_steps(&mut actor, &mut world, &idle(), 3);
        assert!(actor.is_dashing());

        actor.buffer_input(true, false);
        let events = run_steps(&mut actor, &mut world, &FrameInput { jump_held: true, ..idle() }, 1);
        assert!(events.contains(&GameEvent::WallBounce));
        assert!(!actor.is_dashing(), "bounce cancels the dash");
        assert_eq!(actor.vel.x, -WALL_JUMP_X);
    }

    #[test]
    fn test_no_wall_bounce_after_diagonal_dash() {
        let mut world = wall_world();
        let mut actor = Actor::new(Vec2::new(300.0 - ACTOR_SIZE - 30.0, -100.0));
        actor.buffer_input(false, true);
        let right = FrameInput { direction: 1, ..idle() };
        run_steps(&mut actor, &mut world, &right, 3);
        assert!(actor.is_dashing());

        actor.buffer_input(true, false);
        let events = run_steps(&mut actor, &mut world, &FrameInput { direction: 1, jump_held: true, ..idle() }, 1);
        assert!(!events.contains(&GameEvent::WallBounce));
    }

    #[test]
    fn test_wall_bounce_window_closes() {
        let mut world = wall_world();
        let mut actor = Actor::new(Vec2::new(300.0 - ACTOR_SIZE - 6.0, -100.0));
        actor.buffer_input(false, true);
        // Dash (10 steps) plus well past the grace window
        run_steps(&mut actor, &mut world, &idle(), 25);
        assert_eq!(actor.wall_bounce, 0.0);

        actor.buffer_input(true, false);
        let events = run_steps(&mut actor, &mut world, &idle(), 1);
        assert!(!events.contains(&GameEvent::WallBounce));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Running, jumping, dashing and falling through a tile layout never
        /// leaves the actor embedded in a solid at the end of a step
        #[test]
        fn prop_never_ends_step_inside_solid(
            cells in proptest::collection::vec((0i32..20, 2i32..10), 0..24),
            start_x in 0.0f32..456.0,
            start_y in -48.0f32..200.0,
            vx in -600.0f32..600.0,
            vy in -1050.0f32..MAX_FALL_SPEED,
            direction in -1i8..=1,
            jump in any::<bool>(),
            dash in any::<bool>(),
            jump_held in any::<bool>(),
        ) {
            let mut world = World::new();
            world.add_solid(Rect::new(0.0, 10.0 * TILE_SIZE, VIEW_WIDTH, TILE_SIZE));
            for (col, row) in cells {
                world.add_solid(Rect::new(
                    col as f32 * TILE_SIZE,
                    row as f32 * TILE_SIZE,
                    TILE_SIZE,
                    TILE_SIZE,
                ));
            }

            let mut actor = Actor::new(Vec2::new(start_x, start_y));
            actor.vel = Vec2::new(vx, vy);
            prop_assume!(!world.solids.iter().any(|s| intersects(&actor.rect(), &s.rect, 0.0)));

            let input = FrameInput { direction, jump_held, ..idle() };
            let mut events = Vec::new();
            for i in 0..120 {
                if i % 40 == 0 {
                    actor.buffer_input(jump, dash);
                }
                step(&mut actor, &mut world, &input, PHYSICS_STEP, &mut events);

                for s in world.solids.iter().filter(|s| s.is_collidable()) {
                    let depth = actor.rect().overlap_depth(&s.rect);
                    prop_assert!(
                        depth <= HEAD_MARGIN + 1e-3,
                        "step {i}: {depth} into {:?} at {:?} moving {:?}", s.rect, actor.pos, actor.vel
                    );
                }
            }
        }
    }
}
