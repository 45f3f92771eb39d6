//! Entity interactions and world timers
//!
//! Contacts are checked after movement has been resolved for the sub-step.
//! World timers (crystal respawn, spring animation, crumbling terrain) run
//! once per sub-step independently of the actor.

use glam::Vec2;

use super::geom::{Rect, intersects};
use super::physics;
use super::state::{Actor, BerryState, Crumble, GameEvent, SpringDir, World};
use crate::consts::*;

/// Idle berry bob amplitude in pixels
const BOB_AMPLITUDE: f32 = 3.0;
/// Idle berry bob speed in radians per second
const BOB_SPEED: f32 = 3.0;
/// Riders count as resting on a falling solid within this distance of its top
const RIDE_TOLERANCE: f32 = 0.5;

/// Apply every contact between the actor and the world's entities
pub fn resolve_contacts(actor: &mut Actor, world: &mut World, dir: f32, events: &mut Vec<GameEvent>) {
    collect_crystal(actor, world, dir, events);
    collect_berries(actor, world, events);
    touch_springs(actor, world, events);
    arm_crumbling(actor, world, events);
}

/// A crystal is only consumed when it changes something: dash spent, or a dash waiting.
///
/// A buffered dash fires in the same sub-step as the pickup.
fn collect_crystal(actor: &mut Actor, world: &mut World, dir: f32, events: &mut Vec<GameEvent>) {
    let body = actor.rect();
    let Some(crystal) = world
        .crystals
        .iter_mut()
        .find(|c| c.is_available() && intersects(&body, &c.rect, 0.0))
    else {
        return;
    };

    if actor.can_dash && actor.dash_buffer <= 0.0 {
        return;
    }

    actor.can_dash = true;
    crystal.respawn = CRYSTAL_RESPAWN_TIME;
    events.push(GameEvent::CrystalRefill {
        pos: crystal.rect.center(),
    });

    if actor.dash_buffer > 0.0 && !actor.is_dashing() {
        physics::start_dash(actor, dir, events);
    }
}

fn collect_berries(actor: &mut Actor, world: &mut World, events: &mut Vec<GameEvent>) {
    let body = actor.rect();
    for berry in world.berries.iter_mut() {
        if berry.state != BerryState::Idle || !intersects(&body, &berry.rect, 0.0) {
            continue;
        }
        berry.state = BerryState::Following { settle: 0.0 };
        actor.following.push_back(berry.id);
        events.push(GameEvent::BerryFollow {
            following: actor.following.len(),
        });
    }
}

/// Springs override velocity and give the dash back
fn touch_springs(actor: &mut Actor, world: &mut World, events: &mut Vec<GameEvent>) {
    let body = actor.rect();
    for spring in world.springs.iter_mut() {
        if !intersects(&body, &spring.trigger_rect(), 0.0) {
            continue;
        }

        let fresh = spring.anim <= 0.0;
        spring.anim = SPRING_ANIM_TIME;

        actor.can_dash = true;
        actor.dash = None;
        actor.jump_cut_armed = false;
        actor.grounded = false;
        actor.coyote = 0.0;
        actor.move_timer = 0.0;

        match spring.dir {
            SpringDir::Up => {
                actor.pos.x = spring.rect.x;
                actor.vel.y = SPRING_SPEED_Y;
            }
            SpringDir::Left | SpringDir::Right => {
                let side = if spring.dir == SpringDir::Left { -1.0 } else { 1.0 };
                actor.pos.y = spring.rect.y;
                actor.vel = Vec2::new(side * SPRING_SPEED_X, SPRING_SIDE_LIFT);
                actor.facing = side;
                actor.spring_lock = SPRING_LOCK_TIME;
            }
        }

        if fresh {
            events.push(GameEvent::SpringLaunch {
                dir: spring.dir,
                pos: spring.rect.center(),
            });
        }
    }
}

/// Landing on idle crumbling terrain starts it shaking
fn arm_crumbling(actor: &Actor, world: &mut World, events: &mut Vec<GameEvent>) {
    if !actor.grounded {
        return;
    }
    let Some(id) = actor.ground_id else {
        return;
    };
    if let Some(solid) = world.solids.iter_mut().find(|s| s.id == id)
        && solid.crumble == Some(Crumble::Idle)
    {
        solid.crumble = Some(Crumble::Shaking {
            timer: CRUMBLE_SHAKE_TIME,
        });
        events.push(GameEvent::CrumbleStart {
            pos: solid.rect.center(),
        });
    }
}

/// Advance actor-independent world timers by one sub-step
pub fn advance_world(world: &mut World, dt: f32, events: &mut Vec<GameEvent>) {
    for crystal in world.crystals.iter_mut() {
        if crystal.respawn > 0.0 {
            crystal.respawn -= dt;
            if crystal.respawn <= 0.0 {
                crystal.respawn = 0.0;
                events.push(GameEvent::CrystalRespawn {
                    pos: crystal.rect.center(),
                });
            }
        }
    }

    for spring in world.springs.iter_mut() {
        spring.anim = (spring.anim - dt).max(0.0);
    }

    advance_crumbling(world, dt, events);
}

/// Crumble state machine: Armed -> Shaking -> Falling.
///
/// A solid breaking loose arms its idle crumbling neighbours with a short
/// delay, so a connected run goes down as a chain. Arming anything that is
/// not idle is a no-op.
fn advance_crumbling(world: &mut World, dt: f32, events: &mut Vec<GameEvent>) {
    let mut broke: Vec<Rect> = Vec::new();
    let mut moved: Vec<(Rect, f32)> = Vec::new();

    for solid in world.solids.iter_mut() {
        let Some(state) = solid.crumble else {
            continue;
        };

        let next = match state {
            Crumble::Idle => Crumble::Idle,
            Crumble::Armed { delay } => {
                let delay = delay - dt;
                if delay <= 0.0 {
                    events.push(GameEvent::CrumbleStart {
                        pos: solid.rect.center(),
                    });
                    Crumble::Shaking {
                        timer: CRUMBLE_SHAKE_TIME,
                    }
                } else {
                    Crumble::Armed { delay }
                }
            }
            Crumble::Shaking { timer } => {
                let timer = timer - dt;
                if timer <= 0.0 {
                    broke.push(solid.rect);
                    events.push(GameEvent::CrumbleFall {
                        pos: solid.rect.center(),
                    });
                    Crumble::Falling { vy: 0.0 }
                } else {
                    Crumble::Shaking { timer }
                }
            }
            Crumble::Falling { vy } => {
                let vy = (vy + GRAVITY * dt).min(MAX_FALL_SPEED);
                let dy = vy * dt;
                moved.push((solid.rect, dy));
                solid.rect.y += dy;
                Crumble::Falling { vy }
            }
        };
        solid.crumble = Some(next);
    }

    // Chain reaction
    for rect in &broke {
        for solid in world.solids.iter_mut() {
            if solid.crumble == Some(Crumble::Idle) && intersects(rect, &solid.rect, 1.0) {
                solid.crumble = Some(Crumble::Armed {
                    delay: CRUMBLE_CHAIN_DELAY,
                });
            }
        }
    }

    // Springs ride whatever they were resting on
    for (rect, dy) in &moved {
        for spring in world.springs.iter_mut() {
            if rests_on(&spring.rect, rect) {
                spring.rect.y += dy;
            }
        }
    }
}

fn rests_on(rider: &Rect, support: &Rect) -> bool {
    (rider.bottom() - support.top()).abs() <= RIDE_TOLERANCE && rider.overlaps_x(support)
}

/// Move trailing berries and cash in the front one once the actor has settled.
///
/// Only the front berry's settle timer runs, and only while grounded; any
/// airborne sub-step resets it and the streak.
pub fn update_followers(
    actor: &mut Actor,
    world: &mut World,
    dt: f32,
    streak: &mut u32,
    events: &mut Vec<GameEvent>,
) {
    if !actor.grounded {
        *streak = 0;
    }

    if let Some(&front) = actor.following.front() {
        match world.berry_mut(front) {
            Some(berry) => {
                if let BerryState::Following { settle } = berry.state {
                    let settle = if actor.grounded { settle + dt } else { 0.0 };
                    if settle >= SETTLE_TIME {
                        berry.state = BerryState::Collected;
                        let pos = berry.rect.center();
                        actor.following.pop_front();
                        actor.berries += 1;
                        *streak += 1;
                        events.push(GameEvent::BerryCollect {
                            streak: *streak,
                            pos,
                        });
                    } else {
                        berry.state = BerryState::Following { settle };
                    }
                }
            }
            None => {
                actor.following.pop_front();
            }
        }
    }

    // Trail behind the actor along its recent path
    let max_step = DASH_SPEED * dt;
    let half = actor.size / 2.0 - Vec2::splat(BERRY_SIZE / 2.0);
    for (i, id) in actor.following.iter().enumerate() {
        let sample = actor
            .history
            .get((i + 1) * FOLLOW_DELAY)
            .or(actor.history.back())
            .copied()
            .unwrap_or(actor.pos);
        let target = sample + half;

        if let Some(berry) = world.berries.iter_mut().find(|b| b.id == *id) {
            let current = Vec2::new(berry.rect.x, berry.rect.y);
            let step = (target - current).clamp_length_max(max_step);
            berry.rect.x += step.x;
            berry.rect.y += step.y;
        }
    }
}

/// Idle berries bob around their rest height
pub fn bob_idle_berries(world: &mut World, elapsed: f32) {
    for berry in world.berries.iter_mut().filter(|b| b.state == BerryState::Idle) {
        let phase = elapsed * BOB_SPEED + berry.id as f32;
        berry.rect.y = berry.base_y + phase.sin() * BOB_AMPLITUDE;
    }
}
