use crate::core::network::NetworkSample;
use serde::{Deserialize, Serialize};

/// Position at which a competitor has finished the race.
pub const FINISH_POSITION: f64 = 100.0;

/// * `id` - Unique competitor identifier, e.g. the player name
/// * `vehicle` - Selected vehicle (display only)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CompetitorPars {
    pub id: String,
    #[serde(default)]
    pub vehicle: Option<String>,
}

impl CompetitorPars {
    pub fn new(id: &str) -> CompetitorPars {
        CompetitorPars {
            id: id.to_owned(),
            vehicle: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Competitor {
    pub id: String,
    pub vehicle: Option<String>,
    pub lane: f64,
    pub position: f64,
    pub speed: f64,
    pub hit_obstacle: bool,
    pub obstacle_hits: u32,
    pub turbo: bool,
    pub last_sample: Option<NetworkSample>,
    progress: Vec<f64>,
}

impl Competitor {
    pub fn new(competitor_pars: &CompetitorPars, lane: f64) -> Competitor {
        Competitor {
            id: competitor_pars.id.to_owned(),
            vehicle: competitor_pars.vehicle.to_owned(),
            lane,
            position: 0.0,
            speed: 0.0,
            hit_obstacle: false,
            obstacle_hits: 0,
            turbo: false,
            last_sample: None,
            progress: vec![0.0],
        }
    }

    /// The method moves the competitor forward. Positions never decrease and are capped at the
    /// finish line.
    pub fn advance(&mut self, movement: f64) {
        self.position = (self.position + movement.max(0.0)).min(FINISH_POSITION);
        self.progress.push(self.position);
    }

    /// The method sets the hit state for the current tick and counts a new hit whenever the
    /// competitor runs into an obstacle it was not touching before.
    pub fn set_hit(&mut self, hit: bool) {
        if hit && !self.hit_obstacle {
            self.obstacle_hits += 1;
        }
        self.hit_obstacle = hit;
    }

    pub fn has_finished(&self) -> bool {
        self.position >= FINISH_POSITION
    }

    /// Position after every completed tick, starting with the grid position.
    pub fn get_progress(&self) -> &[f64] {
        &self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_clamps_at_finish() {
        let mut c = Competitor::new(&CompetitorPars::new("player"), 25.0);
        c.advance(60.0);
        c.advance(60.0);
        assert_eq!(c.position, FINISH_POSITION);
        assert!(c.has_finished());
        assert_eq!(c.get_progress(), &[0.0, 60.0, 100.0]);
    }

    #[test]
    fn advance_never_moves_backwards() {
        let mut c = Competitor::new(&CompetitorPars::new("player"), 25.0);
        c.advance(10.0);
        c.advance(-5.0);
        assert_eq!(c.position, 10.0);
    }

    #[test]
    fn hits_are_counted_on_onset_only() {
        let mut c = Competitor::new(&CompetitorPars::new("player"), 25.0);
        c.set_hit(true);
        c.set_hit(true);
        c.set_hit(false);
        c.set_hit(true);
        assert!(c.hit_obstacle);
        assert_eq!(c.obstacle_hits, 2);
    }
}
