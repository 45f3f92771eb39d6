//! Session controller and fixed timestep loop
//!
//! The host calls [`Session::update`] once per display frame with the measured
//! delta and the sampled input. The delta is clamped, reduced by any pending
//! hit-stop, and consumed in fixed sub-steps. Generation, culling, cosmetic
//! effects and score reporting run once per frame after the sub-steps.

use std::f32::consts::TAU;

use glam::Vec2;
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::camera::Camera;
use super::generator::LevelGenerator;
use super::geom::{Rect, intersects};
use super::interact;
use super::physics;
use super::state::{Actor, GameEvent, GamePhase, Particle, ParticleKind, Ripple, World};
use crate::consts::*;
use crate::{GameMode, Records, Settings, height_units};

/// Accumulator slack so f32 drift doesn't drop a sub-step
const STEP_EPSILON: f32 = 1e-5;
/// Chunks generated before the first frame
const INITIAL_CHUNKS: usize = 10;
/// Stream offset separating the cosmetic RNG from terrain generation
const FX_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

/// Input sampled once per frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    /// -1 left, 0 none, 1 right
    pub direction: i8,
    /// Jump went down this frame
    pub jump_pressed: bool,
    /// Dash went down this frame
    pub dash_pressed: bool,
    /// Jump is being held
    pub jump_held: bool,
}

/// One run of the game, from spawn to death or completion
pub struct Session {
    settings: Settings,
    records: Records,
    seed: u64,
    runs: u64,

    phase: GamePhase,
    actor: Actor,
    world: World,
    camera: Camera,
    generator: LevelGenerator,
    rng: Pcg32,
    fx_rng: Pcg32,

    accumulator: f32,
    hit_stop: f32,
    elapsed: f32,
    base_y: f32,
    /// Best height going into this run
    previous_best: u32,
    last_milestone: u32,
    record_announced: bool,
    settle_streak: u32,
    score_dirty: bool,
    events: Vec<GameEvent>,
}

impl Session {
    /// Create a session and start its first run
    pub fn new(settings: Settings, records: Records, seed: u64) -> Self {
        let mut session = Self {
            camera: Camera::new(0.0, settings.view_height),
            generator: LevelGenerator::new(GROUND_Y, VIEW_WIDTH / 2.0, settings.goal()),
            settings,
            records,
            seed,
            runs: 0,
            phase: GamePhase::Playing,
            actor: Actor::standing_at(VIEW_WIDTH / 2.0, GROUND_Y),
            world: World::new(),
            rng: Pcg32::seed_from_u64(seed),
            fx_rng: Pcg32::seed_from_u64(seed ^ FX_STREAM),
            accumulator: 0.0,
            hit_stop: 0.0,
            elapsed: 0.0,
            base_y: 0.0,
            previous_best: 0,
            last_milestone: 0,
            record_announced: false,
            settle_streak: 0,
            score_dirty: false,
            events: Vec::new(),
        };
        session.start_run();
        session
    }

    /// Reset everything for a fresh run. Records carry over.
    pub fn start_run(&mut self) {
        let seed = self.seed.wrapping_add(self.runs);
        self.runs += 1;
        self.rng = Pcg32::seed_from_u64(seed);
        self.fx_rng = Pcg32::seed_from_u64(seed ^ FX_STREAM);

        self.world = World::new();
        self.world.add_solid(Rect::new(-50.0, GROUND_Y, VIEW_WIDTH + 100.0, 48.0));
        self.actor = Actor::standing_at(VIEW_WIDTH / 2.0, GROUND_Y);
        self.base_y = self.actor.pos.y;
        self.camera = Camera::new(self.actor.pos.y, self.settings.view_height);
        self.generator = LevelGenerator::new(GROUND_Y, VIEW_WIDTH / 2.0, self.settings.goal());

        self.phase = GamePhase::Playing;
        self.accumulator = 0.0;
        self.hit_stop = 0.0;
        self.elapsed = 0.0;
        self.previous_best = self.records.best_height;
        self.last_milestone = 0;
        self.record_announced = false;
        self.settle_streak = 0;
        self.score_dirty = true;
        self.events.clear();

        for _ in 0..INITIAL_CHUNKS {
            if self.generator.generate(&mut self.world, &mut self.rng).is_none() {
                break;
            }
        }
        self.ensure_generated();

        info!(
            "Run {} started ({}, seed {seed}, best height {})",
            self.runs,
            self.settings.mode.as_str(),
            self.previous_best
        );
    }

    /// Advance by one display frame. Returns the events raised during it.
    pub fn update(&mut self, frame_dt: f32, input: &FrameInput) -> Vec<GameEvent> {
        if self.phase != GamePhase::Playing {
            return std::mem::take(&mut self.events);
        }

        let frame_dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };

        // Hit-stop swallows wall-clock time before the simulation sees it
        let mut dt = frame_dt;
        if self.hit_stop > 0.0 {
            let frozen = self.hit_stop.min(dt);
            self.hit_stop -= frozen;
            dt -= frozen;
        }

        self.actor.buffer_input(input.jump_pressed, input.dash_pressed);

        self.accumulator += dt;
        let mut substeps = 0;
        while self.accumulator + STEP_EPSILON >= PHYSICS_STEP && substeps < MAX_SUBSTEPS {
            self.accumulator -= PHYSICS_STEP;
            substeps += 1;
            self.substep(input);
            if self.phase != GamePhase::Playing {
                break;
            }
        }
        if substeps == MAX_SUBSTEPS || self.phase != GamePhase::Playing {
            self.accumulator = 0.0;
        }
        self.accumulator = self.accumulator.max(0.0);

        self.ensure_generated();
        self.world.cull_below(self.camera.bottom() + CULL_MARGIN);
        self.update_effects(frame_dt);

        if self.score_dirty && self.phase == GamePhase::Playing {
            self.score_dirty = false;
            self.events.push(GameEvent::ScoreUpdate {
                height: self.actor.highest,
                berries: self.actor.berries,
                is_record: self.previous_best > 0 && self.actor.highest > self.previous_best,
                elapsed: self.elapsed,
                pending_berries: self.actor.following.len(),
                speed: self.actor.vel.length(),
            });
        }

        std::mem::take(&mut self.events)
    }

    fn substep(&mut self, input: &FrameInput) {
        let mark = self.events.len();

        physics::step(&mut self.actor, &mut self.world, input, PHYSICS_STEP, &mut self.events);
        interact::advance_world(&mut self.world, PHYSICS_STEP, &mut self.events);
        interact::update_followers(
            &mut self.actor,
            &mut self.world,
            PHYSICS_STEP,
            &mut self.settle_streak,
            &mut self.events,
        );
        interact::bob_idle_berries(&mut self.world, self.elapsed);
        self.actor.record_history();

        let target = Camera::target_for(self.actor.pos.y, self.camera.view_height);
        self.camera.follow(target, PHYSICS_STEP);
        self.elapsed += PHYSICS_STEP;

        self.react(mark);
        self.track_height();

        if self.actor.pos.y > self.camera.bottom() + DEATH_MARGIN {
            self.die();
        } else if self.reached_goal() {
            self.complete();
        }
    }

    /// Feedback for events raised since `mark`
    fn react(&mut self, mark: usize) {
        let raised: Vec<GameEvent> = self.events[mark..].to_vec();
        for event in raised {
            match event {
                GameEvent::Dash { .. } => {
                    self.freeze(HIT_STOP_DASH);
                    let at = self.actor.center();
                    self.burst(at, ParticleKind::Dust, 8, 120.0);
                }
                GameEvent::CrystalRefill { pos } => {
                    self.freeze(HIT_STOP_CRYSTAL);
                    self.burst(pos, ParticleKind::Crystal, 12, 160.0);
                    self.ripple(pos);
                }
                GameEvent::SpringLaunch { pos, .. } => {
                    self.burst(pos, ParticleKind::Spring, 10, 140.0);
                }
                GameEvent::BerryCollect { pos, .. } => {
                    self.burst(pos, ParticleKind::Berry, 10, 120.0);
                    self.ripple(pos);
                    self.score_dirty = true;
                }
                GameEvent::BerryFollow { .. } => self.score_dirty = true,
                GameEvent::Land | GameEvent::Jump | GameEvent::WallJump | GameEvent::WallBounce => {
                    let feet = Vec2::new(self.actor.center().x, self.actor.bottom());
                    self.burst(feet, ParticleKind::Dust, 4, 60.0);
                }
                _ => {}
            }
        }
    }

    fn freeze(&mut self, seconds: f32) {
        if self.settings.hit_stop {
            self.hit_stop = self.hit_stop.max(seconds);
        }
    }

    /// Height bookkeeping: best this run, one-shot record notice, milestones
    fn track_height(&mut self) {
        let height = height_units(self.base_y, self.actor.pos.y);
        if height <= self.actor.highest {
            return;
        }
        self.actor.highest = height;
        self.score_dirty = true;

        if !self.record_announced && self.previous_best > 0 && height > self.previous_best {
            self.record_announced = true;
            info!("New record: {height} (was {})", self.previous_best);
            self.events.push(GameEvent::NewRecord { height });
        }

        while self.last_milestone + MILESTONE_INTERVAL <= height {
            self.last_milestone += MILESTONE_INTERVAL;
            info!("Milestone {}", self.last_milestone);
            self.events.push(GameEvent::Milestone {
                height: self.last_milestone,
            });
        }
    }

    fn reached_goal(&self) -> bool {
        let Some(goal) = &self.world.goal else {
            return false;
        };
        let body = self.actor.rect();
        intersects(&body, &goal.flag, 0.0)
            || (self.actor.grounded
                && (self.actor.bottom() - goal.platform.top()).abs() < 0.5
                && body.overlaps_x(&goal.platform))
    }

    /// Terminal: fell below the view. Fires once.
    fn die(&mut self) {
        if self.phase != GamePhase::Playing {
            return;
        }
        self.phase = GamePhase::Dead;

        let height = self.actor.highest;
        let is_new_record = match self.settings.mode {
            GameMode::Endless => self.records.submit_height(height),
            GameMode::TimeAttack => false,
        };
        let at = self.actor.center();
        self.burst(at, ParticleKind::Death, 24, 220.0);

        info!(
            "Game over at height {height} with {} berries after {:.1}s",
            self.actor.berries, self.elapsed
        );
        self.events.push(GameEvent::GameOver {
            height,
            berries: self.actor.berries,
            is_new_record,
            elapsed: self.elapsed,
        });
    }

    /// Terminal: touched the finish. Fires once.
    fn complete(&mut self) {
        if self.phase != GamePhase::Playing {
            return;
        }
        self.phase = GamePhase::Complete;

        let is_new_record = self.records.submit_time(self.elapsed);
        info!("Level complete in {:.2}s", self.elapsed);
        self.events.push(GameEvent::LevelComplete {
            elapsed: self.elapsed,
            is_new_record,
        });
    }

    /// Keep terrain generated above the view's top edge
    fn ensure_generated(&mut self) {
        while !self.generator.is_finished()
            && self.generator.spawn_y() > self.camera.y - GENERATION_LOOKAHEAD
        {
            match self.generator.generate(&mut self.world, &mut self.rng) {
                Some(report) => debug!("generated {:?} up to {}", report.kind, report.spawn_y),
                None => break,
            }
        }
    }

    fn burst(&mut self, pos: Vec2, kind: ParticleKind, count: usize, speed: f32) {
        let cap = self.settings.particle_cap();
        for _ in 0..count {
            if self.world.particles.len() >= cap {
                break;
            }
            let angle = self.fx_rng.random_range(0.0..TAU);
            let speed = speed * self.fx_rng.random_range(0.4..1.0);
            self.world.particles.push(Particle {
                pos,
                vel: Vec2::from_angle(angle) * speed,
                kind,
                life: 1.0,
                size: self.fx_rng.random_range(2.0..5.0),
            });
        }
    }

    fn ripple(&mut self, pos: Vec2) {
        if self.settings.particles {
            self.world.ripples.push(Ripple {
                pos,
                radius: 4.0,
                alpha: 1.0,
            });
        }
    }

    fn update_effects(&mut self, dt: f32) {
        for p in self.world.particles.iter_mut() {
            p.vel.y += GRAVITY * 0.25 * dt;
            p.pos += p.vel * dt;
            p.life -= dt * 2.0;
        }
        self.world.particles.retain(|p| p.life > 0.0);

        for r in self.world.ripples.iter_mut() {
            r.radius += 120.0 * dt;
            r.alpha -= 2.5 * dt;
        }
        self.world.ripples.retain(|r| r.alpha > 0.0);
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn generator(&self) -> &LevelGenerator {
        &self.generator
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Seconds of simulated time this run
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Current height in height units
    pub fn height(&self) -> u32 {
        height_units(self.base_y, self.actor.pos.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> Settings {
        Settings {
            hit_stop: false,
            ..Settings::default()
        }
    }

    fn session() -> Session {
        Session::new(quiet(), Records::new(), 1234)
    }

    const IDLE: FrameInput = FrameInput {
        direction: 0,
        jump_pressed: false,
        dash_pressed: false,
        jump_held: false,
    };

    #[test]
    fn test_start_state() {
        let s = session();
        assert_eq!(s.phase(), GamePhase::Playing);
        assert!(s.actor().grounded);
        assert!(s.actor().can_dash);
        assert_eq!(s.height(), 0);
        assert!(s.generator().chunks() >= INITIAL_CHUNKS as u32);
        assert!(s.generator().spawn_y() <= s.camera().y - GENERATION_LOOKAHEAD);
    }

    #[test]
    fn test_fixed_substeps() {
        let mut s = session();
        s.update(0.035, &IDLE);
        assert!((s.elapsed() - 0.03).abs() < 1e-4);
        s.update(0.005, &IDLE);
        assert!((s.elapsed() - 0.04).abs() < 1e-4);
    }

    #[test]
    fn test_frame_delta_is_capped() {
        let mut s = session();
        s.update(5.0, &IDLE);
        assert!((s.elapsed() - MAX_FRAME_DT).abs() < 1e-4);
        s.update(f32::NAN, &IDLE);
        assert!((s.elapsed() - MAX_FRAME_DT).abs() < 1e-4);
    }

    #[test]
    fn test_hit_stop_freezes_time() {
        let mut s = Session::new(Settings::default(), Records::new(), 1);
        let dash = FrameInput { dash_pressed: true, ..IDLE };
        s.update(0.01, &dash);
        assert!(s.actor().is_dashing());
        let before = s.elapsed();
        s.update(0.03, &IDLE);
        assert!((s.elapsed() - before).abs() < 1e-6, "frozen by the dash hit-stop");
        s.update(0.03, &IDLE);
        assert!(s.elapsed() > before);
    }

    #[test]
    fn test_score_update_reported() {
        let mut s = session();
        let events = s.update(1.0 / 60.0, &IDLE);
        assert!(events.iter().any(|e| matches!(e, GameEvent::ScoreUpdate { height: 0, .. })));
    }

    #[test]
    fn test_death_fires_once() {
        let mut s = session();
        // Drop the floor and let the actor fall out of view
        s.world.solids.clear();
        s.world.platforms.clear();
        let mut game_overs = 0;
        for _ in 0..300 {
            let events = s.update(1.0 / 60.0, &IDLE);
            game_overs += events
                .iter()
                .filter(|e| matches!(e, GameEvent::GameOver { .. }))
                .count();
        }
        assert_eq!(game_overs, 1);
        assert_eq!(s.phase(), GamePhase::Dead);

        // Terminal until restarted
        let elapsed = s.elapsed();
        s.update(1.0 / 60.0, &IDLE);
        assert_eq!(s.elapsed(), elapsed);

        s.start_run();
        assert_eq!(s.phase(), GamePhase::Playing);
        assert_eq!(s.elapsed(), 0.0);
    }

    #[test]
    fn test_milestone_fires_once_per_threshold() {
        let mut s = session();
        s.actor.pos.y = s.base_y - (MILESTONE_INTERVAL as f32 + 3.0) * PIXELS_PER_UNIT;
        s.track_height();
        s.track_height();
        s.actor.pos.y -= 5.0 * PIXELS_PER_UNIT;
        s.track_height();
        let milestones: Vec<_> = s
            .events
            .iter()
            .filter_map(|e| match e {
                GameEvent::Milestone { height } => Some(*height),
                _ => None,
            })
            .collect();
        assert_eq!(milestones, vec![MILESTONE_INTERVAL]);

        // Skipping two thresholds at once reports both
        s.actor.pos.y = s.base_y - (3.0 * MILESTONE_INTERVAL as f32) * PIXELS_PER_UNIT;
        s.track_height();
        let count = s
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::Milestone { .. }))
            .count();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_new_record_announced_once() {
        let records = Records {
            best_height: 20,
            best_time: None,
        };
        let mut s = Session::new(quiet(), records, 5);
        s.actor.pos.y = s.base_y - 25.0 * PIXELS_PER_UNIT;
        s.track_height();
        s.actor.pos.y -= 10.0 * PIXELS_PER_UNIT;
        s.track_height();
        let count = s
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::NewRecord { .. }))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_record_submitted_on_death() {
        let mut s = session();
        s.actor.highest = 42;
        s.die();
        s.die();
        assert_eq!(s.records().best_height, 42);
        let over: Vec<_> = s
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::GameOver { is_new_record: true, height: 42, .. }))
            .collect();
        assert_eq!(over.len(), 1);
    }

    #[test]
    fn test_culling_bounds_entities() {
        let mut s = session();
        let limit = s.camera().bottom() + CULL_MARGIN;
        s.world.add_solid(Rect::new(0.0, limit + 500.0, 24.0, 24.0));
        s.update(1.0 / 60.0, &IDLE);
        assert!(s.world().solids.iter().all(|solid| solid.rect.y < limit));
    }

    #[test]
    fn test_same_seed_same_run() {
        let a = session();
        let b = session();
        let rects = |s: &Session| s.world().solids.iter().map(|x| x.rect).collect::<Vec<_>>();
        assert_eq!(rects(&a), rects(&b));
    }

    #[test]
    fn test_time_attack_completes_on_goal() {
        let settings = Settings {
            goal_height: 30,
            ..Settings::for_mode(GameMode::TimeAttack)
        };
        let mut s = Session::new(Settings { hit_stop: false, ..settings }, Records::new(), 8);
        assert!(s.generator().is_finished());
        let flag = s.world().goal.as_ref().map(|g| g.flag).expect("goal generated");

        // Drop the actor onto the flag
        s.actor.pos = Vec2::new(flag.x, flag.y);
        s.camera.y = flag.y - 200.0;
        let events = s.update(1.0 / 60.0, &IDLE);
        assert_eq!(s.phase(), GamePhase::Complete);
        let completes = events
            .iter()
            .filter(|e| matches!(e, GameEvent::LevelComplete { is_new_record: true, .. }))
            .count();
        assert_eq!(completes, 1);
        assert!(s.records().best_time.is_some());
        assert!(s.update(1.0 / 60.0, &IDLE).is_empty());
    }
}
