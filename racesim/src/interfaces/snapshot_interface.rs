use crate::core::obstacle::Obstacle;
use crate::core::race::RacePhase;
use crate::post::race_result::{DisconnectReport, RaceResult};

/// Maximum number of snapshots per second sent to the presentation layer in real-time mode.
pub const MAX_SNAPSHOT_FREQUENCY: f64 = 20.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompetitorState {
    pub id: String,
    pub vehicle: Option<String>,
    pub lane: f64,
    pub position: f64,
    pub speed: f64,
    pub hit_obstacle: bool,
    pub turbo: bool,
    pub ping: f64,
    pub download: f64,
    pub upload: f64,
}

/// RaceSnapshot is everything the presentation layer needs to draw one frame of the race.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceSnapshot {
    pub phase: RacePhase,
    pub racetime_s: f64,
    pub no_ticks: u32,
    pub connected: bool,
    pub competitor_states: Vec<CompetitorState>,
    pub obstacles: Vec<Obstacle>,

    // set once the race is finished
    pub final_result: Option<RaceResult>,
    // set once the connection was lost
    pub disconnect_report: Option<DisconnectReport>,
}

impl RaceSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}
