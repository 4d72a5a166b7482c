use rand::Rng;
use serde::{Deserialize, Serialize};

/// Horizontal range [low, high) in which obstacles are placed (track percentage).
pub const OBSTACLE_X_RANGE: [f64; 2] = [10.0, 90.0];
/// Default horizontal hit distance.
pub const HIT_DX: f64 = 8.0;
/// Default vertical hit distance.
pub const HIT_DY: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleKind {
    Cone,
    Barrier,
    Oil,
    Pothole,
}

impl ObstacleKind {
    pub const ALL: [ObstacleKind; 4] = [
        ObstacleKind::Cone,
        ObstacleKind::Barrier,
        ObstacleKind::Oil,
        ObstacleKind::Pothole,
    ];
}

/// * `id` - Index of the obstacle within its field
/// * `x` - Horizontal track position (percentage)
/// * `y` - Lane the obstacle sits in
/// * `kind` - Visual kind, no influence on the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub kind: ObstacleKind,
}

/// generate_obstacles creates the obstacle field of a race. Positions are uniform within
/// OBSTACLE_X_RANGE, lanes and kinds are picked uniformly.
pub fn generate_obstacles<R: Rng + ?Sized>(
    no_obstacles: u32,
    lanes: [f64; 2],
    rng: &mut R,
) -> Vec<Obstacle> {
    (0..no_obstacles)
        .map(|id| Obstacle {
            id,
            x: rng.gen_range(OBSTACLE_X_RANGE[0]..OBSTACLE_X_RANGE[1]),
            y: if rng.gen_bool(0.5) { lanes[0] } else { lanes[1] },
            kind: ObstacleKind::ALL[rng.gen_range(0..ObstacleKind::ALL.len())],
        })
        .collect()
}

/// collides checks the default hit box around every obstacle.
pub fn collides(position: f64, lane: f64, obstacles: &[Obstacle]) -> bool {
    collides_within(position, lane, obstacles, HIT_DX, HIT_DY)
}

/// collides_within returns true if some obstacle is closer than dx horizontally and closer than
/// dy vertically (both strict).
pub fn collides_within(position: f64, lane: f64, obstacles: &[Obstacle], dx: f64, dy: f64) -> bool {
    obstacles
        .iter()
        .any(|obstacle| (position - obstacle.x).abs() < dx && (lane - obstacle.y).abs() < dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn obstacle_at(x: f64, y: f64) -> Obstacle {
        Obstacle {
            id: 0,
            x,
            y,
            kind: ObstacleKind::Cone,
        }
    }

    #[test]
    fn generated_field_respects_ranges() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let obstacles = generate_obstacles(500, [25.0, 65.0], &mut rng);

        assert_eq!(obstacles.len(), 500);
        for (i, o) in obstacles.iter().enumerate() {
            assert_eq!(o.id, i as u32);
            assert!(o.x >= 10.0 && o.x < 90.0);
            assert!(o.y == 25.0 || o.y == 65.0);
        }
        assert!(obstacles.iter().any(|o| o.y == 25.0));
        assert!(obstacles.iter().any(|o| o.y == 65.0));
        for kind in ObstacleKind::ALL {
            assert!(obstacles.iter().any(|o| o.kind == kind));
        }
    }

    #[test]
    fn generation_is_reproducible_for_a_seed() {
        let a = generate_obstacles(12, [25.0, 65.0], &mut ChaCha8Rng::seed_from_u64(9));
        let b = generate_obstacles(12, [25.0, 65.0], &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn thresholds_are_strict() {
        let obstacles = [obstacle_at(50.0, 25.0)];

        assert!(collides(50.0, 25.0, &obstacles));
        assert!(collides(42.5, 25.0, &obstacles));
        assert!(collides(57.9, 39.9, &obstacles));
        assert!(!collides(42.0, 25.0, &obstacles));
        assert!(!collides(58.0, 25.0, &obstacles));
        assert!(!collides(50.0, 40.0, &obstacles));
        assert!(!collides(50.0, 65.0, &obstacles));
    }

    #[test]
    fn needs_both_thresholds_on_the_same_obstacle() {
        // one obstacle close in x only, the other close in y only
        let obstacles = [obstacle_at(50.0, 65.0), obstacle_at(20.0, 25.0)];
        assert!(!collides(50.0, 25.0, &obstacles));
    }

    #[test]
    fn empty_field_never_collides() {
        assert!(!collides(50.0, 25.0, &[]));
    }
}
