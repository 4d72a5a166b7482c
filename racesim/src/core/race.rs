use crate::core::competitor::{Competitor, CompetitorPars};
use crate::core::network::NetworkSampler;
use crate::core::obstacle::{collides_within, generate_obstacles, Obstacle, HIT_DX, HIT_DY};
use crate::core::speed::speed;
use crate::error::RaceError;
use crate::interfaces::snapshot_interface::{CompetitorState, RaceSnapshot};
use crate::post::race_result::{CompetitorResult, DisconnectReport, RaceResult};
use helpers::general::{argmax, InputValueError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// * `countdown_s` - Number of countdown steps before the race starts
/// * `countdown_interval_ms` - (ms) Duration of one countdown step
/// * `tick_interval_ms` - (ms) Duration of one race tick
/// * `normalization` - Divisor converting speed into movement per tick
/// * `hit_penalty` - Movement factor applied while hitting an obstacle
/// * `hit_dx` - Horizontal hit distance (strict)
/// * `hit_dy` - Vertical hit distance (strict)
/// * `no_obstacles` - Number of obstacles generated at race start
/// * `lanes` - Vertical track offsets, competitors are assigned to them alternately
/// * `turbo_threshold` - Speed above which a competitor is shown in turbo mode
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RacePars {
    pub countdown_s: u32,
    pub countdown_interval_ms: u64,
    pub tick_interval_ms: u64,
    pub normalization: f64,
    pub hit_penalty: f64,
    pub hit_dx: f64,
    pub hit_dy: f64,
    pub no_obstacles: u32,
    pub lanes: [f64; 2],
    pub turbo_threshold: f64,
}

impl Default for RacePars {
    fn default() -> Self {
        RacePars {
            countdown_s: 3,
            countdown_interval_ms: 1000,
            tick_interval_ms: 400,
            normalization: 12.0,
            hit_penalty: 0.3,
            hit_dx: HIT_DX,
            hit_dy: HIT_DY,
            no_obstacles: 12,
            lanes: [25.0, 65.0],
            turbo_threshold: 80.0,
        }
    }
}

impl RacePars {
    pub fn validate(&self) -> Result<(), InputValueError> {
        if self.countdown_interval_ms == 0 || self.tick_interval_ms == 0 {
            return Err(InputValueError::new("countdown and tick intervals must be positive"));
        }
        if !(self.normalization.is_finite() && self.normalization > 0.0) {
            return Err(InputValueError::new(format!(
                "normalization must be positive, got {}",
                self.normalization
            )));
        }
        if !(0.0..=1.0).contains(&self.hit_penalty) {
            return Err(InputValueError::new(format!(
                "hit_penalty must lie in [0, 1], got {}",
                self.hit_penalty
            )));
        }
        if !(self.hit_dx > 0.0 && self.hit_dy > 0.0) {
            return Err(InputValueError::new("hit distances must be positive"));
        }
        if !self.lanes.iter().all(|lane| lane.is_finite()) {
            return Err(InputValueError::new("lanes must be finite"));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    Countdown(u32),
    Active,
    Finished { winner: String },
    Disconnected,
    // an invariant was violated during a tick
    Aborted,
}

impl RacePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RacePhase::Finished { .. } | RacePhase::Disconnected | RacePhase::Aborted
        )
    }
}

/// race_rng creates the generator for one random stream of a race. Without a seed the generator
/// is seeded from the thread-local generator.
pub fn race_rng(seed: Option<u64>, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or_else(rand::random));
    rng.set_stream(stream);
    rng
}

#[derive(Debug)]
pub struct Race {
    pub pars: RacePars,
    pub phase: RacePhase,
    pub cur_racetime: f64,
    pub no_ticks: u32,
    pub obstacles: Vec<Obstacle>,
    pub competitors: Vec<Competitor>,
    pub connected: bool,
    t_last_update: f64,
    measured_update_gap: Option<Duration>,
    rng: ChaCha8Rng,
}

impl Race {
    /// Creates a race in the countdown phase. Competitors are assigned to the lanes alternately,
    /// the first competitor is the locally controlled one and wins simultaneous arrivals.
    pub fn new(
        race_pars: &RacePars,
        competitor_pars: &[CompetitorPars],
        rng: ChaCha8Rng,
    ) -> Result<Race, RaceError> {
        race_pars.validate()?;
        if competitor_pars.is_empty() {
            return Err(RaceError::NoCompetitors);
        }

        let competitors = competitor_pars
            .iter()
            .enumerate()
            .map(|(i, pars)| Competitor::new(pars, race_pars.lanes[i % 2]))
            .collect();

        let mut race = Race {
            pars: race_pars.to_owned(),
            phase: RacePhase::Countdown(race_pars.countdown_s),
            cur_racetime: 0.0,
            no_ticks: 0,
            obstacles: Vec::new(),
            competitors,
            connected: true,
            t_last_update: 0.0,
            measured_update_gap: None,
            rng,
        };

        if race_pars.countdown_s == 0 {
            race.start();
        }

        Ok(race)
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// The method simulates one step. During the countdown a step is one countdown interval,
    /// afterwards one race tick. Steps in a terminal phase do nothing.
    pub fn simulate_timestep<S: NetworkSampler + ?Sized>(
        &mut self,
        sampler: &mut S,
    ) -> Result<&RacePhase, RaceError> {
        match self.phase {
            RacePhase::Countdown(remaining) => self.handle_countdown(remaining),
            RacePhase::Active => {
                if let Err(e) = self.handle_race_tick(sampler) {
                    warn!(error = %e, "race aborted");
                    self.phase = RacePhase::Aborted;
                    return Err(e);
                }
            }
            _ => {}
        }

        Ok(&self.phase)
    }

    // ---------------------------------------------------------------------------------------------
    // RACE SIMULATOR PARTS ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn handle_countdown(&mut self, remaining: u32) {
        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.start();
        } else {
            debug!(remaining, "countdown");
            self.phase = RacePhase::Countdown(remaining);
        }
    }

    fn start(&mut self) {
        self.obstacles = generate_obstacles(self.pars.no_obstacles, self.pars.lanes, &mut self.rng);
        self.phase = RacePhase::Active;
        info!(
            competitors = self.competitors.len(),
            obstacles = self.obstacles.len(),
            "race started"
        );
    }

    fn handle_race_tick<S: NetworkSampler + ?Sized>(
        &mut self,
        sampler: &mut S,
    ) -> Result<(), RaceError> {
        // sample everybody first, a lost connection must leave all positions untouched
        let mut samples = Vec::with_capacity(self.competitors.len());
        for competitor in self.competitors.iter() {
            let sample = sampler.sample(&competitor.id)?;
            sample.validate()?;
            samples.push(sample);
        }

        if let Some(idx) = samples.iter().position(|s| !s.connected) {
            self.connected = false;
            self.phase = RacePhase::Disconnected;
            warn!(
                competitor = %self.competitors[idx].id,
                racetime = self.cur_racetime,
                "connection lost, race ends"
            );
            return Ok(());
        }

        for (competitor, sample) in self.competitors.iter_mut().zip(samples) {
            let speed = speed(&sample);

            // collisions are checked at the position reached before this tick
            let hit = collides_within(
                competitor.position,
                competitor.lane,
                &self.obstacles,
                self.pars.hit_dx,
                self.pars.hit_dy,
            );
            if hit && !competitor.hit_obstacle {
                debug!(competitor = %competitor.id, position = competitor.position, "obstacle hit");
            }
            competitor.set_hit(hit);

            let modifier = if hit { self.pars.hit_penalty } else { 1.0 };
            competitor.speed = speed;
            competitor.turbo = speed > self.pars.turbo_threshold;
            competitor.last_sample = Some(sample);
            competitor.advance(speed / self.pars.normalization * modifier);
        }

        self.no_ticks += 1;
        self.cur_racetime = self.no_ticks as f64 * self.pars.tick_interval().as_secs_f64();
        self.t_last_update = self.cur_racetime;

        if self.competitors.iter().any(|c| c.has_finished()) {
            let winner = self.leader().id.to_owned();
            info!(
                winner = %winner,
                racetime = self.cur_racetime,
                ticks = self.no_ticks,
                "race finished"
            );
            self.phase = RacePhase::Finished { winner };
        }

        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// leader returns the competitor with the highest position. Equal positions are resolved in
    /// favour of the competitor listed first.
    pub fn leader(&self) -> &Competitor {
        let positions: Vec<f64> = self.competitors.iter().map(|c| c.position).collect();
        // competitors is never empty
        let idx = argmax(&positions).unwrap_or(0);
        &self.competitors[idx]
    }

    /// Duration until the next step is due, depending on the current phase.
    pub fn step_interval(&self) -> Duration {
        match self.phase {
            RacePhase::Countdown(_) => self.pars.countdown_interval(),
            _ => self.pars.tick_interval(),
        }
    }

    pub fn get_positions(&self) -> Vec<(String, f64)> {
        self.competitors
            .iter()
            .map(|c| (c.id.to_owned(), c.position))
            .collect()
    }

    pub fn get_race_result(&self) -> Result<RaceResult, RaceError> {
        let winner_id = match &self.phase {
            RacePhase::Finished { winner } => winner.to_owned(),
            phase => return Err(RaceError::ResultUnavailable(phase.to_owned())),
        };

        Ok(RaceResult {
            winner_id,
            elapsed_time_s: self.cur_racetime,
            no_ticks: self.no_ticks,
            competitors: self
                .competitors
                .iter()
                .map(|c| CompetitorResult {
                    id: c.id.to_owned(),
                    final_position: c.position,
                    obstacle_hits: c.obstacle_hits,
                    progress: c.get_progress().to_vec(),
                })
                .collect(),
        })
    }

    /// set_measured_update_gap stores the wall-clock time that passed between the last successful
    /// step and the detection of the disconnect. It replaces the race-time estimate in the
    /// disconnect report.
    pub fn set_measured_update_gap(&mut self, gap: Duration) {
        self.measured_update_gap = Some(gap);
    }

    pub fn get_disconnect_report(&self) -> Result<DisconnectReport, RaceError> {
        if self.phase != RacePhase::Disconnected {
            return Err(RaceError::ResultUnavailable(self.phase.to_owned()));
        }

        let racetime_s = self.cur_racetime + self.pars.tick_interval().as_secs_f64();
        let time_since_update_s = match self.measured_update_gap {
            Some(gap) => gap.as_secs_f64(),
            None => racetime_s - self.t_last_update,
        };
        Ok(DisconnectReport {
            racetime_s,
            time_since_update_s,
            no_ticks: self.no_ticks,
            positions: self.get_positions(),
        })
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            phase: self.phase.to_owned(),
            racetime_s: self.cur_racetime,
            no_ticks: self.no_ticks,
            connected: self.connected,
            competitor_states: self
                .competitors
                .iter()
                .map(|c| {
                    let (ping, download, upload) = c
                        .last_sample
                        .map(|s| (s.ping, s.download, s.upload))
                        .unwrap_or((0.0, 0.0, 0.0));
                    CompetitorState {
                        id: c.id.to_owned(),
                        vehicle: c.vehicle.to_owned(),
                        lane: c.lane,
                        position: c.position,
                        speed: c.speed,
                        hit_obstacle: c.hit_obstacle,
                        turbo: c.turbo,
                        ping,
                        download,
                        upload,
                    }
                })
                .collect(),
            obstacles: self.obstacles.to_owned(),
            final_result: self.get_race_result().ok(),
            disconnect_report: self.get_disconnect_report().ok(),
        }
    }
}
