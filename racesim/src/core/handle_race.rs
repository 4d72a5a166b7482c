use crate::core::network::NetworkSampler;
use crate::core::race::{Race, RacePhase};
use crate::interfaces::snapshot_interface::{RaceSnapshot, MAX_SNAPSHOT_FREQUENCY};
use crate::post::race_result::{DisconnectReport, RaceResult};
use crate::pre::read_sim_pars::SimPars;
use anyhow::Context;
use flume::Sender;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest uninterrupted sleep of the real-time loop, bounds the reaction time to cancellation.
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq)]
pub enum RaceOutcome {
    Finished(RaceResult),
    Disconnected(DisconnectReport),
    Cancelled,
}

/// CancelToken is shared between a race driver and whoever may abort the race.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// handle_race creates and simulates a race on the basis of the inserted parameters, and returns
/// the outcome for post-processing.
///
/// Without a sender the race is simulated as fast as possible. With a sender it runs in real
/// time (scaled by `realtime_factor`) and snapshots are sent to the presentation layer, the
/// terminal snapshot is always sent. Steps never overlap: a step that overruns its period
/// causes the missed deadlines to be skipped.
pub fn handle_race<S: NetworkSampler + ?Sized>(
    sim_pars: &SimPars,
    rng: ChaCha8Rng,
    sampler: &mut S,
    tx: Option<&Sender<RaceSnapshot>>,
    realtime_factor: f64,
    cancel: &CancelToken,
) -> anyhow::Result<RaceOutcome> {
    if !(realtime_factor.is_finite() && realtime_factor > 0.0) {
        anyhow::bail!("Real-time factor must be positive, got {}!", realtime_factor);
    }

    let mut race = Race::new(&sim_pars.race_pars, &sim_pars.competitors, rng)
        .context("Failed to create race!")?;

    // check if sender was inserted -> in that case use real-time simulation
    if let Some(tx) = tx {
        let min_snapshot_gap = Duration::from_secs_f64(1.0 / MAX_SNAPSHOT_FREQUENCY);
        let mut t_last_snapshot = Instant::now();
        tx.send(race.snapshot())
            .context("Failed to send race snapshot!")?;

        let mut t_next = Instant::now() + race.step_interval().div_f64(realtime_factor);
        let mut t_last_update = Instant::now();

        while !race.phase.is_terminal() {
            if !sleep_until(t_next, cancel) {
                info!(racetime = race.cur_racetime, "race cancelled");
                return Ok(RaceOutcome::Cancelled);
            }

            race.simulate_timestep(sampler)
                .context("Race aborted due to an invariant violation!")?;
            debug!(phase = ?race.phase, racetime = race.cur_racetime, "step done");

            // a slow or timed out sampler shows up in the gap reported on disconnect
            let t_step_end = Instant::now();
            if race.phase == RacePhase::Disconnected {
                race.set_measured_update_gap(t_step_end - t_last_update);
            } else {
                t_last_update = t_step_end;
            }

            if race.phase.is_terminal() || t_last_snapshot.elapsed() >= min_snapshot_gap {
                tx.send(race.snapshot())
                    .context("Failed to send race snapshot!")?;
                t_last_snapshot = Instant::now();
            }

            // schedule the next step, deadlines that already passed are skipped
            let period = race.step_interval().div_f64(realtime_factor);
            t_next += period;
            let now = Instant::now();
            if t_next < now {
                let behind = now - t_next;
                let skipped = (behind.as_secs_f64() / period.as_secs_f64()).floor() as u64 + 1;
                warn!(skipped, "could not keep up with real time, skipping missed steps");
                t_next = now + period;
            }
        }
    } else {
        while !race.phase.is_terminal() {
            if cancel.is_cancelled() {
                info!(racetime = race.cur_racetime, "race cancelled");
                return Ok(RaceOutcome::Cancelled);
            }
            race.simulate_timestep(sampler)
                .context("Race aborted due to an invariant violation!")?;
            debug!(phase = ?race.phase, racetime = race.cur_racetime, "step done");
        }
    }

    get_outcome(&race)
}

fn get_outcome(race: &Race) -> anyhow::Result<RaceOutcome> {
    match race.phase {
        RacePhase::Finished { .. } => Ok(RaceOutcome::Finished(race.get_race_result()?)),
        RacePhase::Disconnected => Ok(RaceOutcome::Disconnected(race.get_disconnect_report()?)),
        ref phase => anyhow::bail!("Race stopped in unexpected phase {:?}!", phase),
    }
}

/// sleep_until sleeps in short slices until the deadline is reached. Returns false as soon as
/// the race gets cancelled.
fn sleep_until(deadline: Instant, cancel: &CancelToken) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        sleep((deadline - now).min(MAX_SLEEP_SLICE));
    }
}
