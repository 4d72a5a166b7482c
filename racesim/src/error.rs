use crate::core::race::RacePhase;
use helpers::general::InputValueError;
use thiserror::Error;

/// RaceError covers the invariant violations a race can run into. A lost connection is not an
/// error, it ends the race in the `Disconnected` phase.
#[derive(Debug, Error)]
pub enum RaceError {
    #[error("invalid network sample: {field} = {value}")]
    InvalidSample { field: &'static str, value: f64 },

    #[error("no network sample available for competitor {0}")]
    NoSample(String),

    #[error(transparent)]
    InvalidParameter(#[from] InputValueError),

    #[error("a race needs at least one competitor")]
    NoCompetitors,

    #[error("race result is not available in phase {0:?}")]
    ResultUnavailable(RacePhase),
}
