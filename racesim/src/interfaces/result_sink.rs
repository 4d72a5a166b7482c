use crate::post::race_result::RaceResult;
use helpers::general::{argsort, SortOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ResultSink receives the result of every finished race. Persisting it is up to the sink.
pub trait ResultSink {
    fn report(&mut self, result: &RaceResult) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub id: String,
    pub points: u32,
    pub wins: u32,
    pub losses: u32,
}

/// Leaderboard is an in-memory result sink awarding points per race.
/// * `win_points` - Points for the winner of a race
/// * `loss_points` - Points for every other competitor of a race
#[derive(Debug, Clone)]
pub struct Leaderboard {
    win_points: u32,
    loss_points: u32,
    standings: HashMap<String, Standing>,
}

impl Default for Leaderboard {
    fn default() -> Self {
        Leaderboard::new(100, 10)
    }
}

impl Leaderboard {
    pub fn new(win_points: u32, loss_points: u32) -> Leaderboard {
        Leaderboard {
            win_points,
            loss_points,
            standings: HashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Standing> {
        self.standings.get(id)
    }

    /// standings returns all entries sorted by points (descending), ties by id.
    pub fn standings(&self) -> Vec<Standing> {
        let mut by_id: Vec<&Standing> = self.standings.values().collect();
        by_id.sort_by(|a, b| a.id.cmp(&b.id));
        let points: Vec<u32> = by_id.iter().map(|s| s.points).collect();

        // argsort is stable, equal points stay in id order
        argsort(&points, SortOrder::Descending)
            .into_iter()
            .map(|idx| by_id[idx].to_owned())
            .collect()
    }
}

impl ResultSink for Leaderboard {
    fn report(&mut self, result: &RaceResult) -> anyhow::Result<()> {
        if !result.competitors.iter().any(|c| c.id == result.winner_id) {
            anyhow::bail!("Winner {} did not take part in the race!", result.winner_id);
        }

        for competitor in result.competitors.iter() {
            let standing = self
                .standings
                .entry(competitor.id.to_owned())
                .or_insert_with(|| Standing {
                    id: competitor.id.to_owned(),
                    ..Standing::default()
                });
            if competitor.id == result.winner_id {
                standing.points += self.win_points;
                standing.wins += 1;
            } else {
                standing.points += self.loss_points;
                standing.losses += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::race_result::CompetitorResult;

    fn result(winner: &str) -> RaceResult {
        RaceResult {
            winner_id: winner.to_owned(),
            elapsed_time_s: 5.2,
            no_ticks: 13,
            competitors: ["player", "opponent"]
                .iter()
                .map(|id| CompetitorResult {
                    id: id.to_string(),
                    final_position: if *id == winner { 100.0 } else { 60.0 },
                    obstacle_hits: 0,
                    progress: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn points_wins_and_losses_are_accumulated() {
        let mut board = Leaderboard::default();
        board.report(&result("player")).unwrap();
        board.report(&result("player")).unwrap();
        board.report(&result("opponent")).unwrap();

        let standings = board.standings();
        assert_eq!(standings[0].id, "player");
        assert_eq!(standings[0].points, 210);
        assert_eq!((standings[0].wins, standings[0].losses), (2, 1));
        assert_eq!(board.get("opponent").unwrap().points, 120);
    }

    #[test]
    fn unknown_winner_is_rejected() {
        let mut board = Leaderboard::default();
        assert!(board.report(&result("ghost")).is_err());
        assert!(board.standings().is_empty());
    }

    #[test]
    fn standings_with_equal_points_are_ordered_by_id() {
        let mut board = Leaderboard::new(100, 100);
        board.report(&result("player")).unwrap();
        board.report(&result("opponent")).unwrap();
        let mut three_way = result("zed");
        three_way.competitors.push(CompetitorResult {
            id: "zed".to_owned(),
            final_position: 100.0,
            obstacle_hits: 0,
            progress: Vec::new(),
        });
        board.report(&three_way).unwrap();

        let ids: Vec<String> = board.standings().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["opponent", "player", "zed"]);
        assert_eq!(board.get("zed").unwrap().points, 100);
    }
}
