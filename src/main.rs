//! Summit Dash headless driver
//!
//! Runs the autopilot through a few sessions at a fixed 60 Hz frame rate and
//! logs what happens. Usage: `summit-dash [settings.json] [seed]`.
//! Set `RUST_LOG=debug` to see chunk generation.

use summit_dash::sim::{Autopilot, GameEvent, GamePhase, Session};
use summit_dash::{Records, Settings};

const FRAME_DT: f32 = 1.0 / 60.0;
/// Ten minutes of simulated play per run
const MAX_FRAMES: u32 = 60 * 60 * 10;
const MAX_RUNS: u32 = 3;

fn main() {
    env_logger::init();
    log::info!("Summit Dash (headless) starting...");

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => Settings::load_or_default(path),
        None => Settings::default(),
    };
    let seed = match args.next().map(|s| s.parse::<u64>()) {
        Some(Ok(seed)) => seed,
        Some(Err(e)) => {
            log::warn!("Invalid seed ({e}); using 0");
            0
        }
        None => 0,
    };

    let mut session = Session::new(settings, Records::new(), seed);
    let mut pilot = Autopilot::new();

    for run in 1..=MAX_RUNS {
        let mut frames = 0;
        while session.phase() == GamePhase::Playing && frames < MAX_FRAMES {
            let input = pilot.drive(session.actor(), session.world());
            for event in session.update(FRAME_DT, &input) {
                report(&event);
            }
            frames += 1;
        }

        if session.phase() == GamePhase::Playing {
            log::info!("Run {run} stopped after {frames} frames at height {}", session.height());
        }
        log::debug!(
            "Run {run}: {} chunks generated, {} entities live",
            session.generator().chunks(),
            session.world().entity_count()
        );
        if run < MAX_RUNS {
            session.start_run();
            pilot = Autopilot::new();
        }
    }

    let records = session.records();
    match records.to_json() {
        Ok(json) => println!("{json}"),
        Err(e) => log::error!("Failed to serialize records: {e}"),
    }
}

fn report(event: &GameEvent) {
    match event {
        GameEvent::BerryCollect { streak, .. } => log::debug!("Berry collected (streak {streak})"),
        GameEvent::SpringLaunch { dir, .. } => log::debug!("Spring launch {dir:?}"),
        GameEvent::CrumbleFall { pos } => log::debug!("Crumble fell at {pos}"),
        GameEvent::GameOver {
            height,
            berries,
            is_new_record,
            elapsed,
        } => {
            let tag = if *is_new_record { " (new record)" } else { "" };
            println!("Game over: height {height}, {berries} berries, {elapsed:.1}s{tag}");
        }
        GameEvent::LevelComplete {
            elapsed,
            is_new_record,
        } => {
            let tag = if *is_new_record { " (new record)" } else { "" };
            println!("Level complete in {elapsed:.2}s{tag}");
        }
        _ => {}
    }
}
