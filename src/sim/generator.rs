//! Procedural level generation
//!
//! The generator extends the world upward one chunk per call. It keeps a
//! cursor (`spawn_y`, the top of the last foothold, only ever decreasing) and
//! the x of that foothold, and places each new foothold within the actor's
//! reach of the previous one:
//!
//! - vertical gaps come from a difficulty-scaled range, capped by what the
//!   actor can cover in its current mobility state
//! - horizontal offsets are bounded by a difficulty-scaled lateral reach,
//!   with a periodic side switch; wide offsets get a crystal or a small
//!   island at the midpoint
//! - every solid keeps a free band beneath it tall enough for the actor
//!
//! Decorations (springs, berries, outcrops) that can't be placed cleanly are
//! skipped; terrain generation itself never fails.

use glam::Vec2;
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::geom::{Rect, intersects};
use super::presets::{self, PRESETS};
use super::state::{Goal, SpringDir, World};
use crate::consts::*;
use crate::height_units;

/// Climb in pixels covered by the tutorial band
const TUTORIAL_CLIMB: f32 = 1200.0;
/// Climb over which difficulty ramps from 0 to 1 past the tutorial
const DIFFICULTY_RAMP: f32 = 20000.0;

const TUTORIAL_LATERAL: f32 = 96.0;
const MIN_LATERAL: f32 = 144.0;
const MAX_LATERAL: f32 = 250.0;
/// Lateral offsets beyond this get a bridging aid
const BRIDGE_THRESHOLD: f32 = 160.0;

/// Free band kept beneath every solid (two actor heights)
const CLEARANCE: f32 = 48.0;

const SPRING_GAP_MIN: f32 = 200.0;
const SPRING_GAP_MAX: f32 = 250.0;

const CRYSTAL_STONE_CHANCE: f64 = 0.1;
/// Stepping-stone crystals keep this far from any terrain
const CRYSTAL_STONE_MARGIN: f32 = 60.0;
const PLATFORM_CHANCE: f64 = 0.25;
const BERRY_CHANCE: f64 = 0.24;
const PLATFORM_BERRY_CHANCE: f64 = 0.2;
const UP_SPRING_CHANCE: f64 = 0.15;
const SIDE_SPRING_CHANCE: f64 = 0.15;

/// Minimum distance between two pickups
const PICKUP_SEPARATION: f32 = 24.0;
/// Minimum distance between a pickup and terrain
const PICKUP_TERRAIN_PAD: f32 = 4.0;

/// Every n-th chunk prefers the opposite half of the playfield
const SIDE_SWITCH_PERIOD: u32 = 6;

const GOAL_GAP: f32 = 72.0;
const FLAG_HEIGHT: f32 = 48.0;

const COLUMNS: i32 = (VIEW_WIDTH / TILE_SIZE) as i32;

fn column_center(col: i32) -> f32 {
    col as f32 * TILE_SIZE + TILE_SIZE / 2.0
}

/// Horizontal distance from `x` to the nearest point of `rect`'s span
fn lateral_to(x: f32, rect: &Rect) -> f32 {
    if x < rect.left() {
        rect.left() - x
    } else if x > rect.right() {
        x - rect.right()
    } else {
        0.0
    }
}

/// How the actor arrives at the next chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Momentum {
    #[default]
    Normal,
    /// Previous chunk was a floating crystal: mid-air with a fresh dash
    Crystal,
    /// Previous chunk had an upward spring
    SpringUp,
}

impl Momentum {
    /// Largest vertical gap the actor can cover from this state
    pub fn reach_cap(self) -> f32 {
        match self {
            Momentum::Normal => 9.0 * TILE_SIZE,
            Momentum::Crystal => 5.0 * TILE_SIZE,
            Momentum::SpringUp => 11.0 * TILE_SIZE,
        }
    }
}

/// Generation parameters at a given climb
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Difficulty {
    pub tutorial: bool,
    /// 0 at the end of the tutorial, saturating at 1
    pub factor: f32,
    /// Vertical gap range in tiles
    pub min_gap: u32,
    pub max_gap: u32,
    pub max_lateral: f32,
    pub preset_chance: f64,
    pub crumble_chance: f64,
    /// Standard block size limits in tiles
    pub max_block_w: u32,
    pub max_block_h: u32,
}

impl Difficulty {
    pub fn at(climbed: f32) -> Self {
        if climbed < TUTORIAL_CLIMB {
            return Self {
                tutorial: true,
                factor: 0.0,
                min_gap: 3,
                max_gap: 5,
                max_lateral: TUTORIAL_LATERAL,
                preset_chance: 0.0,
                crumble_chance: 0.0,
                max_block_w: 5,
                max_block_h: 6,
            };
        }

        let f = ((climbed - TUTORIAL_CLIMB) / DIFFICULTY_RAMP).clamp(0.0, 1.0);
        let steps = (3.0 * f).floor() as u32;
        Self {
            tutorial: false,
            factor: f,
            min_gap: 4 + (2.0 * f).floor() as u32,
            max_gap: (7 + steps).min(9),
            max_lateral: MIN_LATERAL + (MAX_LATERAL - MIN_LATERAL) * f,
            preset_chance: f64::from(0.15 + 0.2 * f),
            crumble_chance: f64::from(0.25 * f),
            max_block_w: 5u32.saturating_sub(steps).max(2),
            max_block_h: 6u32.saturating_sub(steps).max(2),
        }
    }
}

/// What a chunk turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Standard,
    Platform,
    Crumbling,
    CrystalStone,
    Preset(&'static str),
    Goal,
}

/// Summary of one `generate` call
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkReport {
    pub kind: ChunkKind,
    /// Vertical gap from the previous foothold to this chunk's entry
    pub rise: f32,
    /// Horizontal distance from the previous foothold x to the entry foothold
    pub lateral: f32,
    /// A midpoint aid was placed
    pub bridged: bool,
    /// Mobility state the actor arrives in
    pub momentum: Momentum,
    /// Cursor after the chunk
    pub spawn_y: f32,
}

/// Upward-extending terrain generator
#[derive(Debug, Clone)]
pub struct LevelGenerator {
    spawn_y: f32,
    last_x: f32,
    base_y: f32,
    momentum: Momentum,
    chunks: u32,
    goal_height: Option<u32>,
    finished: bool,
}

impl LevelGenerator {
    /// Start above a foothold whose top is `base_y`, centred on `start_x`.
    ///
    /// With a goal height (in height units) the generator emits a finish line
    /// once the cursor has climbed that far and then stops.
    pub fn new(base_y: f32, start_x: f32, goal_height: Option<u32>) -> Self {
        Self {
            spawn_y: base_y,
            last_x: start_x,
            base_y,
            momentum: Momentum::Normal,
            chunks: 0,
            goal_height,
            finished: false,
        }
    }

    pub fn spawn_y(&self) -> f32 {
        self.spawn_y
    }

    pub fn last_x(&self) -> f32 {
        self.last_x
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn chunks(&self) -> u32 {
        self.chunks
    }

    /// Pixels climbed by the cursor
    pub fn climbed(&self) -> f32 {
        self.base_y - self.spawn_y
    }

    /// Emit the next chunk into `world`. Returns `None` once the goal is placed.
    pub fn generate<R: Rng + ?Sized>(&mut self, world: &mut World, rng: &mut R) -> Option<ChunkReport> {
        if self.finished {
            return None;
        }

        if self
            .goal_height
            .is_some_and(|goal| height_units(self.base_y, self.spawn_y) >= goal)
        {
            return Some(self.place_goal(world));
        }

        let diff = Difficulty::at(self.climbed());
        let momentum = std::mem::take(&mut self.momentum);
        self.chunks += 1;
        let gap = self.roll_gap(&diff, momentum, rng);

        if momentum == Momentum::Normal && !diff.tutorial {
            if rng.random_bool(CRYSTAL_STONE_CHANCE) {
                if let Some(report) = self.place_crystal_stone(world, &diff, gap, rng) {
                    return Some(report);
                }
            } else if rng.random_bool(diff.preset_chance)
                && let Some(report) = self.place_preset(world, &diff, gap, rng)
            {
                return Some(report);
            }
        }

        Some(self.place_standard(world, &diff, momentum, gap, rng))
    }

    fn roll_gap<R: Rng + ?Sized>(&self, diff: &Difficulty, momentum: Momentum, rng: &mut R) -> f32 {
        match momentum {
            Momentum::SpringUp => rng.random_range(SPRING_GAP_MIN..=SPRING_GAP_MAX).round(),
            Momentum::Crystal => rng.random_range(3..=5u32) as f32 * TILE_SIZE,
            Momentum::Normal => rng.random_range(diff.min_gap..=diff.max_gap) as f32 * TILE_SIZE,
        }
    }

    /// Lateral reach from the current mobility state
    fn lateral_limit(diff: &Difficulty, momentum: Momentum) -> f32 {
        match momentum {
            Momentum::Normal => diff.max_lateral,
            Momentum::Crystal => TUTORIAL_LATERAL,
            Momentum::SpringUp => diff.max_lateral.min(BRIDGE_THRESHOLD),
        }
    }

    /// Pick a tile column whose centre is within `max_dist` of the last foothold
    fn reachable_column<R: Rng + ?Sized>(&self, max_dist: f32, rng: &mut R) -> i32 {
        let lo = ((self.last_x - max_dist - TILE_SIZE / 2.0) / TILE_SIZE).ceil() as i32;
        let hi = ((self.last_x + max_dist - TILE_SIZE / 2.0) / TILE_SIZE).floor() as i32;
        let (lo, hi) = (lo.max(0), hi.min(COLUMNS - 1));
        if lo > hi {
            return ((self.last_x / TILE_SIZE) as i32).clamp(0, COLUMNS - 1);
        }

        // Periodically force the other half of the screen when it is in reach
        let (mut lo, mut hi) = (lo, hi);
        if self.chunks % SIDE_SWITCH_PERIOD == 0 {
            let (half_lo, half_hi) = if self.last_x >= VIEW_WIDTH / 2.0 {
                (0, COLUMNS / 2 - 1)
            } else {
                (COLUMNS / 2, COLUMNS - 1)
            };
            if lo.max(half_lo) <= hi.min(half_hi) {
                lo = lo.max(half_lo);
                hi = hi.min(half_hi);
            }
        }
        rng.random_range(lo..=hi)
    }

    /// Leftmost column of a `w`-tile body that covers column `col`
    fn left_column<R: Rng + ?Sized>(col: i32, w: u32, rng: &mut R) -> i32 {
        let w = w as i32;
        let lo = (col - w + 1).max(0);
        let hi = col.min(COLUMNS - w);
        rng.random_range(lo..=hi.max(lo))
    }

    /// No terrain or spring intersects `rect`, nor any of `extra`
    fn is_clear(world: &World, rect: &Rect, extra: &[Rect]) -> bool {
        !world.solids.iter().any(|s| intersects(rect, &s.rect, 0.0))
            && !world.platforms.iter().any(|p| intersects(rect, &p.rect, 0.0))
            && !world.springs.iter().any(|s| intersects(rect, &s.rect, 0.0))
            && !extra.iter().any(|e| intersects(rect, e, 0.0))
    }

    /// A pickup must sit in the playfield, clear of terrain and other pickups
    fn pickup_fits(world: &World, rect: &Rect, extra: &[Rect]) -> bool {
        rect.left() >= 0.0
            && rect.right() <= VIEW_WIDTH
            && !world.solid_overlaps(rect, PICKUP_TERRAIN_PAD)
            && !world
                .platforms
                .iter()
                .any(|p| intersects(rect, &p.rect, PICKUP_TERRAIN_PAD))
            && !world.springs.iter().any(|s| intersects(rect, &s.rect, PICKUP_TERRAIN_PAD))
            && !world.pickup_overlaps(rect, PICKUP_SEPARATION)
            && !extra.iter().any(|e| intersects(rect, e, PICKUP_TERRAIN_PAD))
    }

    fn body_rect(kind: ChunkKind, left: i32, w: u32, h: u32, top: f32) -> Rect {
        let x = left as f32 * TILE_SIZE;
        let width = w as f32 * TILE_SIZE;
        match kind {
            ChunkKind::Platform => Rect::new(x, top, width, PLATFORM_THICKNESS),
            _ => Rect::new(x, top, width, h as f32 * TILE_SIZE),
        }
    }

    /// Find a gap and height that leave the clearance band under the body free.
    ///
    /// Pads the gap a tile at a time up to the reach cap, then shrinks the
    /// body. At the cap with a one-tile body the band is always clear.
    #[allow(clippy::too_many_arguments)]
    fn fit_body(
        &self,
        world: &World,
        kind: ChunkKind,
        left: i32,
        w: u32,
        mut h: u32,
        mut gap: f32,
        cap: f32,
    ) -> (Rect, f32) {
        loop {
            let body_limit = ((gap - CLEARANCE) / TILE_SIZE).floor().max(1.0) as u32;
            h = h.min(body_limit).max(1);
            let rect = Self::body_rect(kind, left, w, h, self.spawn_y - gap);

            if Self::is_clear(world, &rect.extended_down(CLEARANCE), &[]) {
                return (rect, gap);
            }
            if gap + TILE_SIZE <= cap {
                gap += TILE_SIZE;
            } else if h > 1 {
                h -= 1;
            } else {
                return (rect, gap);
            }
        }
    }

    fn place_standard<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        diff: &Difficulty,
        momentum: Momentum,
        gap: f32,
        rng: &mut R,
    ) -> ChunkReport {
        let cap = momentum.reach_cap();
        let gap = gap.min(cap);

        let kind = if !diff.tutorial && rng.random_bool(PLATFORM_CHANCE) {
            ChunkKind::Platform
        } else if rng.random_bool(diff.crumble_chance) {
            ChunkKind::Crumbling
        } else {
            ChunkKind::Standard
        };
        let w = match kind {
            ChunkKind::Platform => rng.random_range(3..=5u32),
            _ => rng.random_range(2..=diff.max_block_w),
        };
        let h = match kind {
            ChunkKind::Standard => rng.random_range(1..=diff.max_block_h),
            _ => 1,
        };

        let col = self.reachable_column(Self::lateral_limit(diff, momentum), rng);
        let left = Self::left_column(col, w, rng);
        let (mut rect, mut gap) = self.fit_body(world, kind, left, w, h, gap, cap);

        let mut bridged = false;
        if lateral_to(self.last_x, &rect) > BRIDGE_THRESHOLD {
            bridged = self.place_bridge(world, &rect, gap);
            if !bridged {
                debug!("no room for a bridge, pulling chunk {} closer", self.chunks);
                let col = self.reachable_column(BRIDGE_THRESHOLD, rng);
                let left = Self::left_column(col, w, rng);
                (rect, gap) = self.fit_body(world, kind, left, w, h, gap, cap);
            }
        }

        let lateral = lateral_to(self.last_x, &rect);
        let mut next = Momentum::Normal;
        match kind {
            ChunkKind::Standard => {
                world.add_solid(rect);
                next = self.decorate_block(world, &rect, rng);
            }
            ChunkKind::Crumbling => {
                for i in 0..w {
                    let tile = Rect::new(rect.x + i as f32 * TILE_SIZE, rect.y, TILE_SIZE, TILE_SIZE);
                    world.add_crumbling(tile);
                }
            }
            ChunkKind::Platform => {
                world.add_platform(rect);
                if rng.random_bool(PLATFORM_BERRY_CHANCE) {
                    let berry = Rect::new(
                        rect.center_x() - BERRY_SIZE / 2.0,
                        rect.y - BERRY_SIZE - 6.0,
                        BERRY_SIZE,
                        BERRY_SIZE,
                    );
                    if Self::pickup_fits(world, &berry, &[]) {
                        world.add_berry(berry);
                    }
                }
            }
            _ => {}
        }

        self.spawn_y = rect.y;
        self.last_x = rect.center_x();
        self.momentum = next;

        debug!(
            "chunk {}: {:?} {}x{} at ({}, {}) rise {} lateral {:.0}{}",
            self.chunks,
            kind,
            w,
            h,
            rect.x,
            rect.y,
            gap,
            lateral,
            if bridged { " bridged" } else { "" }
        );

        ChunkReport {
            kind,
            rise: gap,
            lateral,
            bridged,
            momentum,
            spawn_y: self.spawn_y,
        }
    }

    /// Midpoint aid for a wide lateral gap: a crystal when the gap is too
    /// tight for a block, else a two-tile island with clearance above and below
    fn place_bridge(&self, world: &mut World, target: &Rect, gap: f32) -> bool {
        let mid_x = (self.last_x + target.center_x()) / 2.0;
        let mid_y = self.spawn_y - gap / 2.0;

        if gap < 5.0 * TILE_SIZE {
            let crystal = Rect::new(
                mid_x - CRYSTAL_SIZE / 2.0,
                mid_y - CRYSTAL_SIZE / 2.0,
                CRYSTAL_SIZE,
                CRYSTAL_SIZE,
            );
            if Self::pickup_fits(world, &crystal, &[*target]) {
                world.add_crystal(crystal);
                return true;
            }
            return false;
        }

        let col = ((mid_x / TILE_SIZE).round() as i32 - 1).clamp(0, COLUMNS - 2);
        let island = Rect::new(col as f32 * TILE_SIZE, mid_y.round(), TILE_SIZE * 2.0, TILE_SIZE);
        let band = island.extended_up(CLEARANCE).extended_down(CLEARANCE);
        if Self::is_clear(world, &band, &[target.extended_down(CLEARANCE)])
            && !world.pickup_overlaps(&island, PICKUP_TERRAIN_PAD)
        {
            world.add_solid(island);
            return true;
        }
        false
    }

    /// Outcrops, a berry and possibly a spring around a fresh standard block.
    /// Returns the momentum the next chunk starts from.
    fn decorate_block<R: Rng + ?Sized>(&self, world: &mut World, block: &Rect, rng: &mut R) -> Momentum {
        let rows = (block.h / TILE_SIZE) as u32;
        let cols = (block.w / TILE_SIZE) as u32;

        // L-shaped outcrops hanging off the sides
        for _ in 0..rng.random_range(0..=2u32) {
            let x = if rng.random_bool(0.5) {
                block.right()
            } else {
                block.left() - TILE_SIZE
            };
            let row = rng.random_range(0..rows.max(1));
            let outcrop = Rect::new(x, block.y + row as f32 * TILE_SIZE, TILE_SIZE, TILE_SIZE);
            if outcrop.left() < 0.0
                || outcrop.right() > VIEW_WIDTH
                || !Self::is_clear(world, &outcrop.extended_down(CLEARANCE), &[])
                || world.pickup_overlaps(&outcrop, PICKUP_TERRAIN_PAD)
            {
                debug!("skipped outcrop at ({}, {})", outcrop.x, outcrop.y);
                continue;
            }
            world.add_solid(outcrop);
        }

        let mut momentum = Momentum::Normal;
        if rng.random_bool(UP_SPRING_CHANCE) {
            let col = rng.random_range(0..cols.max(1));
            let spring = Rect::new(block.x + col as f32 * TILE_SIZE, block.y - TILE_SIZE, TILE_SIZE, TILE_SIZE);
            if Self::spring_fits(world, &spring, SpringDir::Up) {
                world.add_spring(spring, SpringDir::Up);
                momentum = Momentum::SpringUp;
            } else {
                debug!("skipped up spring at ({}, {})", spring.x, spring.y);
            }
        } else if rng.random_bool(SIDE_SPRING_CHANCE) {
            let (x, dir) = if rng.random_bool(0.5) {
                (block.right(), SpringDir::Right)
            } else {
                (block.left() - TILE_SIZE, SpringDir::Left)
            };
            let spring = Rect::new(x, block.y, TILE_SIZE, TILE_SIZE);
            if Self::spring_fits(world, &spring, dir) {
                world.add_spring(spring, dir);
            } else {
                debug!("skipped {:?} spring at ({}, {})", dir, spring.x, spring.y);
            }
        }

        if rng.random_bool(BERRY_CHANCE) {
            let x = if rng.random_bool(0.5) {
                block.right() + 6.0
            } else {
                block.left() - 6.0 - BERRY_SIZE
            };
            let berry = Rect::new(x, block.y - BERRY_SIZE, BERRY_SIZE, BERRY_SIZE);
            if Self::pickup_fits(world, &berry, &[]) {
                world.add_berry(berry);
            } else {
                debug!("skipped berry at ({}, {})", berry.x, berry.y);
            }
        }

        momentum
    }

    /// The spring cell and its launch path must be free and inside the playfield
    fn spring_fits(world: &World, spring: &Rect, dir: SpringDir) -> bool {
        if spring.left() < 0.0 || spring.right() > VIEW_WIDTH {
            return false;
        }
        if !Self::is_clear(world, spring, &[]) || world.pickup_overlaps(spring, PICKUP_TERRAIN_PAD) {
            return false;
        }
        let path = match dir {
            SpringDir::Up => spring.translated(Vec2::new(0.0, -TILE_SIZE)),
            SpringDir::Left => Rect::new(spring.x - TILE_SIZE * 2.0, spring.y, TILE_SIZE * 2.0, TILE_SIZE),
            SpringDir::Right => Rect::new(spring.right(), spring.y, TILE_SIZE * 2.0, TILE_SIZE),
        };
        !world.solid_overlaps(&path, 0.0)
    }

    fn place_crystal_stone<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        diff: &Difficulty,
        gap: f32,
        rng: &mut R,
    ) -> Option<ChunkReport> {
        let col = self.reachable_column(diff.max_lateral.min(BRIDGE_THRESHOLD), rng);
        let top = self.spawn_y - gap;
        let inset = (TILE_SIZE - CRYSTAL_SIZE) / 2.0;
        let rect = Rect::new(col as f32 * TILE_SIZE + inset, top + inset, CRYSTAL_SIZE, CRYSTAL_SIZE);

        let margin = rect.inflated(CRYSTAL_STONE_MARGIN);
        if !Self::is_clear(world, &margin, &[]) || world.pickup_overlaps(&rect, PICKUP_SEPARATION) {
            debug!("crystal stone blocked at ({}, {})", rect.x, rect.y);
            return None;
        }

        world.add_crystal(rect);
        let lateral = (column_center(col) - self.last_x).abs();
        self.spawn_y = top;
        self.last_x = column_center(col);
        self.momentum = Momentum::Crystal;

        debug!("chunk {}: crystal stone at ({}, {})", self.chunks, rect.x, rect.y);
        Some(ChunkReport {
            kind: ChunkKind::CrystalStone,
            rise: gap,
            lateral,
            bridged: false,
            momentum: Momentum::Normal,
            spawn_y: self.spawn_y,
        })
    }

    fn place_preset<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        diff: &Difficulty,
        gap: f32,
        rng: &mut R,
    ) -> Option<ChunkReport> {
        let preset = &PRESETS[rng.random_range(0..PRESETS.len())];
        let chunk = presets::parse(preset, rng.random_bool(0.5));

        // Line the entry foothold up with a reachable column
        let limit = diff.max_lateral.min(BRIDGE_THRESHOLD);
        let col = self.reachable_column(limit, rng);
        let entry_col = (chunk.entry_center_x / TILE_SIZE) as i32;
        let origin_col = (col - entry_col).clamp(0, COLUMNS - chunk.cols as i32);
        let origin = Vec2::new(
            origin_col as f32 * TILE_SIZE,
            self.spawn_y - gap - (chunk.rows as f32 - 1.0) * TILE_SIZE,
        );

        let entry_x = origin.x + chunk.entry_center_x;
        let lateral = (entry_x - self.last_x).abs();
        if lateral > limit {
            debug!("preset {} out of reach ({lateral:.0})", preset.name);
            return None;
        }

        let footprint = Rect::new(origin.x, origin.y, chunk.width(), chunk.height()).extended_down(CLEARANCE);
        if !Self::is_clear(world, &footprint, &[]) || world.pickup_overlaps(&footprint, 0.0) {
            debug!("preset {} blocked at ({}, {})", preset.name, origin.x, origin.y);
            return None;
        }

        for r in &chunk.solids {
            world.add_solid(r.translated(origin));
        }
        for r in &chunk.crumbling {
            world.add_crumbling(r.translated(origin));
        }
        for r in &chunk.platforms {
            world.add_platform(r.translated(origin));
        }
        for (r, dir) in &chunk.springs {
            world.add_spring(r.translated(origin), *dir);
        }
        for r in &chunk.crystals {
            world.add_crystal(r.translated(origin));
        }
        for r in &chunk.berries {
            world.add_berry(r.translated(origin));
        }

        self.spawn_y = origin.y + chunk.top_row as f32 * TILE_SIZE;
        self.last_x = origin.x + chunk.top_center_x;
        self.momentum = if chunk.exits_by_spring() {
            Momentum::SpringUp
        } else {
            Momentum::Normal
        };

        debug!(
            "chunk {}: preset {} at ({}, {}) rise {}",
            self.chunks, preset.name, origin.x, origin.y, gap
        );
        Some(ChunkReport {
            kind: ChunkKind::Preset(preset.name),
            rise: gap,
            lateral,
            bridged: false,
            momentum: Momentum::Normal,
            spawn_y: self.spawn_y,
        })
    }

    /// Full-width finish platform with a flag; generation stops afterwards
    fn place_goal(&mut self, world: &mut World) -> ChunkReport {
        let y = self.spawn_y - GOAL_GAP;
        let platform = Rect::new(0.0, y, VIEW_WIDTH, PLATFORM_THICKNESS);
        let flag = Rect::new(VIEW_WIDTH / 2.0 - TILE_SIZE / 2.0, y - FLAG_HEIGHT, TILE_SIZE, FLAG_HEIGHT);
        world.add_platform(platform);
        world.goal = Some(Goal { platform, flag });

        let lateral = lateral_to(self.last_x, &platform);
        self.spawn_y = y;
        self.finished = true;
        info!(
            "goal placed at height {} after {} chunks",
            height_units(self.base_y, y),
            self.chunks
        );

        ChunkReport {
            kind: ChunkKind::Goal,
            rise: GOAL_GAP,
            lateral,
            bridged: false,
            momentum: self.momentum,
            spawn_y: y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn fresh(goal: Option<u32>) -> (LevelGenerator, World) {
        let mut world = World::new();
        world.add_solid(Rect::new(-50.0, GROUND_Y, 580.0, 48.0));
        (LevelGenerator::new(GROUND_Y, VIEW_WIDTH / 2.0, goal), world)
    }

    #[test]
    fn test_difficulty_curve() {
        let start = Difficulty::at(0.0);
        assert!(start.tutorial);
        assert_eq!((start.min_gap, start.max_gap), (3, 5));
        assert_eq!(start.preset_chance, 0.0);

        let early = Difficulty::at(TUTORIAL_CLIMB);
        assert!(!early.tutorial);
        assert_eq!(early.factor, 0.0);
        assert_eq!((early.min_gap, early.max_gap), (4, 7));
        assert_eq!(early.max_lateral, MIN_LATERAL);

        let late = Difficulty::at(1.0e6);
        assert_eq!(late.factor, 1.0);
        assert_eq!((late.min_gap, late.max_gap), (6, 9));
        assert_eq!(late.max_lateral, MAX_LATERAL);
        assert_eq!((late.max_block_w, late.max_block_h), (2, 3));
        assert!(late.max_gap as f32 * TILE_SIZE <= Momentum::Normal.reach_cap());
    }

    #[test]
    fn test_tutorial_chunks_are_gentle() {
        let (mut generator, mut world) = fresh(None);
        let mut rng = Pcg32::seed_from_u64(7);
        while generator.climbed() < TUTORIAL_CLIMB - 5.0 * TILE_SIZE {
            let report = generator.generate(&mut world, &mut rng).expect("endless");
            assert!(report.rise <= 5.0 * TILE_SIZE + 1e-3 || report.momentum != Momentum::Normal);
            assert!(report.lateral <= TUTORIAL_LATERAL);
            assert!(!matches!(report.kind, ChunkKind::Preset(_) | ChunkKind::Crumbling));
        }
    }

    #[test]
    fn test_same_seed_same_terrain() {
        let build = || {
            let (mut generator, mut world) = fresh(None);
            let mut rng = Pcg32::seed_from_u64(42);
            for _ in 0..60 {
                generator.generate(&mut world, &mut rng);
            }
            world.solids.iter().map(|s| s.rect).collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_goal_stops_generation() {
        let (mut generator, mut world) = fresh(Some(60));
        let mut rng = Pcg32::seed_from_u64(3);
        let mut last = None;
        for _ in 0..100 {
            match generator.generate(&mut world, &mut rng) {
                Some(report) => last = Some(report),
                None => break,
            }
        }
        let last = last.expect("generated something");
        assert_eq!(last.kind, ChunkKind::Goal);
        assert!(generator.is_finished());
        assert!(generator.generate(&mut world, &mut rng).is_none());

        let goal = world.goal.as_ref().expect("goal placed");
        assert_eq!(goal.platform.w, VIEW_WIDTH);
        assert!(height_units(GROUND_Y, goal.platform.y) >= 60);
        assert_eq!(goal.flag.bottom(), goal.platform.top());
    }

    #[test]
    fn test_side_switch_lands_on_other_half() {
        let (mut generator, _) = fresh(None);
        let mut rng = Pcg32::seed_from_u64(9);
        generator.last_x = 60.0;
        generator.chunks = SIDE_SWITCH_PERIOD;
        for _ in 0..20 {
            let col = generator.reachable_column(VIEW_WIDTH, &mut rng);
            assert!(column_center(col) > VIEW_WIDTH / 2.0);
        }
    }

    #[test]
    fn test_reachable_column_stays_in_reach() {
        let (mut generator, _) = fresh(None);
        let mut rng = Pcg32::seed_from_u64(4);
        for (i, last_x) in [12.0, 100.0, 240.0, 333.0, 468.0].into_iter().enumerate() {
            generator.last_x = last_x;
            generator.chunks = i as u32 + 1;
            for _ in 0..30 {
                let col = generator.reachable_column(96.0, &mut rng);
                assert!((0..COLUMNS).contains(&col));
                assert!((column_center(col) - last_x).abs() <= 96.0, "col {col} from {last_x}");
            }
        }
        // Nothing in reach falls back to the column under the foothold
        generator.last_x = 250.0;
        assert_eq!(generator.reachable_column(1.0, &mut rng), 10);
    }

    #[test]
    fn test_spring_fits_needs_launch_room() {
        let mut world = World::new();
        world.add_solid(Rect::new(0.0, 0.0, 48.0, 24.0));
        let spring = Rect::new(0.0, 48.0, TILE_SIZE, TILE_SIZE);
        // A solid two cells up is fine; directly above blocks the launch
        assert!(LevelGenerator::spring_fits(&world, &spring, SpringDir::Up));
        let blocked = Rect::new(0.0, 24.0, TILE_SIZE, TILE_SIZE);
        assert!(!LevelGenerator::spring_fits(&world, &blocked, SpringDir::Up));
        // Off the left edge
        let outside = Rect::new(-24.0, 100.0, TILE_SIZE, TILE_SIZE);
        assert!(!LevelGenerator::spring_fits(&world, &outside, SpringDir::Left));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// Every chunk is within reach of the previous foothold and the cursor only climbs
        #[test]
        fn prop_chunks_within_reach(seed in any::<u64>()) {
            let (mut generator, mut world) = fresh(None);
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut prev_y = generator.spawn_y();

            for _ in 0..120 {
                let diff = Difficulty::at(generator.climbed());
                let report = generator.generate(&mut world, &mut rng).expect("endless");
                prop_assert!(report.spawn_y < prev_y, "cursor must climb");
                prop_assert!(report.rise >= 3.0 * TILE_SIZE - 1e-3);
                prop_assert!(
                    report.rise <= report.momentum.reach_cap() + 1e-3,
                    "rise {} over cap for {:?}", report.rise, report.momentum
                );
                prop_assert!(
                    report.lateral <= diff.max_lateral + 1e-3
                        && (report.bridged || report.lateral <= BRIDGE_THRESHOLD + 1e-3),
                    "lateral {} (bridged {})", report.lateral, report.bridged
                );
                prev_y = report.spawn_y;
            }

            for s in &world.solids {
                prop_assert!(s.rect.top() >= generator.spawn_y() - 1e-3);
                prop_assert!(s.rect.left() >= -50.0 && s.rect.right() <= VIEW_WIDTH + 50.0);
            }
        }

        /// Pickups never overlap terrain, and stacked solids leave room for the actor
        #[test]
        fn prop_spacing_contracts(seed in any::<u64>()) {
            let (mut generator, mut world) = fresh(None);
            let mut rng = Pcg32::seed_from_u64(seed);
            for _ in 0..120 {
                generator.generate(&mut world, &mut rng);
            }

            let pickups: Vec<Rect> = world
                .crystals
                .iter()
                .map(|c| c.rect)
                .chain(world.berries.iter().map(|b| b.rect))
                .collect();
            for p in &pickups {
                prop_assert!(!world.solid_overlaps(p, 0.0), "pickup {:?} overlaps a solid", p);
            }

            for a in &world.solids {
                for b in &world.solids {
                    if a.id == b.id || !a.rect.overlaps_x(&b.rect) || b.rect.top() >= a.rect.top() {
                        continue;
                    }
                    // b sits above a
                    let space = a.rect.top() - b.rect.bottom();
                    prop_assert!(
                        space.abs() < 1e-3 || space >= ACTOR_SIZE,
                        "{:?} above {:?} leaves {}", b.rect, a.rect, space
                    );
                }
            }
        }
    }
}
