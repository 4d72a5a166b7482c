mod logging;

use anyhow::Context;
use clap::Parser;
use helpers::general::mean;
use racesim::core::handle_race::{handle_race, CancelToken, RaceOutcome};
use racesim::core::network::{RandomSampler, TimedSampler};
use racesim::core::race::race_rng;
use racesim::core::race_handle::RaceHandle;
use racesim::interfaces::result_sink::{Leaderboard, ResultSink};
use racesim::interfaces::session_store::{InMemorySessionStore, SessionStore};
use racesim::interfaces::snapshot_interface::RaceSnapshot;
use racesim::pre::read_sim_pars::{read_sim_pars, SimPars};
use racesim::pre::sim_opts::SimOpts;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{info, warn, Level};

/// Session id under which the live race is kept in the session store.
const LIVE_SESSION_ID: &str = "live";

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();
    logging::init_logging(if sim_opts.debug {
        Level::DEBUG
    } else {
        sim_opts.log_level
    })?;

    // get simulation parameters
    let mut sim_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        info!("Reading simulation parameters from {}", parfile_path.display());
        read_sim_pars(parfile_path)?
    } else {
        info!("No parameter file given, using the default two-competitor race");
        SimPars::default()
    };
    if sim_opts.seed.is_some() {
        sim_pars.seed = sim_opts.seed;
    }
    sim_pars.validate()?;

    info!(
        competitors = sim_pars.competitors.len(),
        tick_interval_ms = sim_pars.race_pars.tick_interval_ms,
        seed = ?sim_pars.seed,
        "Simulating race"
    );

    // EXECUTION -----------------------------------------------------------------------------------
    let mut leaderboard = Leaderboard::default();

    if !sim_opts.live {
        run_batch(&sim_pars, &sim_opts, &mut leaderboard)?;
    } else {
        run_live(&sim_pars, &sim_opts, &mut leaderboard)?;
    }

    for standing in leaderboard.standings() {
        println!(
            "STANDINGS: {:>12} {:5} pts ({} wins, {} losses)",
            standing.id, standing.points, standing.wins, standing.losses
        );
    }

    Ok(())
}

/// run_batch simulates the requested number of races in parallel without real-time pacing.
fn run_batch(
    sim_pars: &SimPars,
    sim_opts: &SimOpts,
    leaderboard: &mut Leaderboard,
) -> anyhow::Result<()> {
    let t_start = Instant::now();
    let store = InMemorySessionStore::new();

    (0..sim_opts.no_sim_runs)
        .into_par_iter()
        .try_for_each(|run| -> anyhow::Result<()> {
            // every run gets its own seed so that batch results are reproducible as a whole
            let seed = sim_pars.seed.map(|s| s.wrapping_add(run as u64));
            let mut sampler = RandomSampler::new(&sim_pars.sampler_pars, race_rng(seed, 1))?;
            let outcome = handle_race(
                sim_pars,
                race_rng(seed, 0),
                &mut sampler,
                None,
                1.0,
                &CancelToken::new(),
            )
            .context(format!("Simulation run {} failed!", run))?;
            store.put(&format!("run-{}", run), outcome);
            Ok(())
        })?;

    info!(
        runs = sim_opts.no_sim_runs,
        "Execution time: {}ms",
        t_start.elapsed().as_millis()
    );

    let mut racetimes = Vec::with_capacity(store.len());
    let mut no_disconnects = 0;

    for run in 0..sim_opts.no_sim_runs {
        match store.get(&format!("run-{}", run)) {
            Some(RaceOutcome::Finished(result)) => {
                leaderboard.report(&result)?;
                racetimes.push(result.elapsed_time_s);
                if sim_opts.no_sim_runs == 1 {
                    result.print_summary();
                    if let Some(path) = &sim_opts.output {
                        result.write_progress_csv(path)?;
                        info!("Position trace written to {}", path.display());
                    }
                }
            }
            Some(RaceOutcome::Disconnected(report)) => {
                no_disconnects += 1;
                if sim_opts.no_sim_runs == 1 {
                    report.print_summary();
                }
            }
            Some(RaceOutcome::Cancelled) | None => warn!(run, "No outcome available"),
        }
    }

    if sim_opts.no_sim_runs > 1 {
        println!(
            "RESULT: {} races, {} finished, {} lost the connection",
            sim_opts.no_sim_runs,
            racetimes.len(),
            no_disconnects
        );
        if let Some(mean_racetime) = mean(&racetimes) {
            println!("RESULT: mean race time {:.2}s", mean_racetime);
        }
        if sim_opts.output.is_some() {
            warn!("Position traces are only written for single runs");
        }
    }

    Ok(())
}

/// run_live simulates one race in real time on a separate thread and prints its snapshots.
fn run_live(
    sim_pars: &SimPars,
    sim_opts: &SimOpts,
    leaderboard: &mut Leaderboard,
) -> anyhow::Result<()> {
    info!("Starting live race...");

    let store: InMemorySessionStore<RaceSnapshot> = InMemorySessionStore::new();
    let sampler = TimedSampler::spawn(
        RandomSampler::new(&sim_pars.sampler_pars, race_rng(sim_pars.seed, 1))?,
        sim_pars.sampler_pars.sample_timeout(),
    )?;

    // channel between the race driver and the presentation layer
    let (tx, rx) = flume::unbounded();
    let handle = RaceHandle::spawn(
        sim_pars.to_owned(),
        race_rng(sim_pars.seed, 0),
        sampler,
        tx,
        sim_opts.realtime_factor,
    )?;

    for snapshot in rx.iter() {
        print_snapshot(&snapshot);
        store.put(LIVE_SESSION_ID, snapshot);
    }

    match handle.join()? {
        RaceOutcome::Finished(result) => {
            result.print_summary();
            leaderboard.report(&result)?;
            if let Some(path) = &sim_opts.output {
                result.write_progress_csv(path)?;
                info!("Position trace written to {}", path.display());
            }
        }
        RaceOutcome::Disconnected(report) => {
            report.print_summary();
            println!("RESULT: Race lost its connection, start a new session to retry");
        }
        RaceOutcome::Cancelled => warn!("Race was cancelled"),
    }

    store.delete(LIVE_SESSION_ID);
    Ok(())
}

fn print_snapshot(snapshot: &RaceSnapshot) {
    let mut line = format!("{:6.1}s {:<14}", snapshot.racetime_s, format!("{:?}", snapshot.phase));
    for c in snapshot.competitor_states.iter() {
        line.push_str(&format!(
            " | {} {:5.1}% {:5.1}{}{}",
            c.id,
            c.position,
            c.speed,
            if c.hit_obstacle { " HIT" } else { "" },
            if c.turbo { " TURBO" } else { "" }
        ));
    }
    println!("{}", line);
}
