use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// CompetitorResult holds the end state of one competitor.
/// * `progress` - Position after every tick, starting with the grid position
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompetitorResult {
    pub id: String,
    pub final_position: f64,
    pub obstacle_hits: u32,
    pub progress: Vec<f64>,
}

/// RaceResult contains all race information that is reported once a race is finished.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RaceResult {
    pub winner_id: String,
    pub elapsed_time_s: f64,
    pub no_ticks: u32,
    pub competitors: Vec<CompetitorResult>,
}

impl RaceResult {
    /// final_positions returns (competitor id, final position) pairs in grid order.
    pub fn final_positions(&self) -> Vec<(&str, f64)> {
        self.competitors
            .iter()
            .map(|c| (c.id.as_str(), c.final_position))
            .collect()
    }

    /// print_summary prints winner, race time and final positions to the console output.
    pub fn print_summary(&self) {
        println!(
            "RESULT: {} wins after {:.1}s ({} ticks)",
            self.winner_id, self.elapsed_time_s, self.no_ticks
        );
        for c in self.competitors.iter() {
            println!(
                "RESULT: {:>12} {:6.2}% ({} obstacle hits)",
                c.id, c.final_position, c.obstacle_hits
            );
        }
    }

    /// write_progress_csv writes the position trace of all competitors to a CSV file with one
    /// row per tick.
    pub fn write_progress_csv(&self, path: &Path) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_path(path)
            .context(format!("Failed to create progress file {}!", path.display()))?;

        let mut header = vec!["tick".to_owned()];
        header.extend(self.competitors.iter().map(|c| c.id.to_owned()));
        wtr.write_record(&header)?;

        let no_rows = self
            .competitors
            .iter()
            .map(|c| c.progress.len())
            .max()
            .unwrap_or(0);

        for tick in 0..no_rows {
            let mut record = vec![tick.to_string()];
            for c in self.competitors.iter() {
                let position = c.progress.get(tick).copied().unwrap_or(c.final_position);
                record.push(format!("{:.3}", position));
            }
            wtr.write_record(&record)?;
        }

        wtr.flush()
            .context(format!("Failed to write progress file {}!", path.display()))?;
        Ok(())
    }
}

/// DisconnectReport carries the diagnostic information shown when a race ends because the
/// connection was lost.
/// * `racetime_s` - (s) Race time at which the failing tick was due
/// * `time_since_update_s` - (s) Time elapsed since the last successful tick, measured on the
///   wall clock when the race ran in real time, in race time otherwise
/// * `positions` - Competitor positions at the moment of the disconnect
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DisconnectReport {
    pub racetime_s: f64,
    pub time_since_update_s: f64,
    pub no_ticks: u32,
    pub positions: Vec<(String, f64)>,
}

impl DisconnectReport {
    pub fn print_summary(&self) {
        println!(
            "RESULT: Connection lost at {:.1}s, last update {:.1}s before",
            self.racetime_s, self.time_since_update_s
        );
        for (id, position) in self.positions.iter() {
            println!("RESULT: {:>12} {:6.2}% at disconnect", id, position);
        }
    }
}
