/// Error types for contest validation, audit parameters, round execution,
/// the numeric kernel and the round-size solver.
///
/// Every validation failure is returned synchronously at the operation
/// boundary and never mutates audit state.
use thiserror::Error;

/// Rejections raised while building a [`Contest`](crate::Contest) or
/// reducing it to a candidate pair.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContestError {
    #[error("contest must have at least one ballot")]
    NoBallots,
    #[error("contest has no candidates")]
    EmptyTally,
    #[error("contest has no reported winners")]
    NoWinners,
    #[error("reported tallies sum to {total}, exceeding the {ballots} contest ballots")]
    TallyExceedsBallots { total: u64, ballots: u64 },
    #[error("reported winner \"{0}\" is not a candidate")]
    UnknownWinner(String),
    #[error("reported winner \"{0}\" has no reported votes")]
    WinnerWithoutVotes(String),
    #[error("reported winner \"{winner}\" does not strictly beat \"{loser}\"")]
    Tied { winner: String, loser: String },
    #[error("reported winner \"{0}\" does not hold a majority of the ballots")]
    NoMajority(String),
    #[error("\"{0}\" is not a reported winner of this contest")]
    NotAWinner(String),
    #[error("\"{0}\" is not a reported loser of this contest")]
    NotALoser(String),
}

/// Rejections raised by [`Audit::execute_round`](crate::Audit::execute_round).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error("round size {size} does not exceed the previous round size {previous}")]
    NotMonotone { size: u64, previous: u64 },
    #[error("round size {size} exceeds the maximum sample size {max}")]
    ExceedsMaxSample { size: u64, max: u64 },
    #[error("cumulative ballot counts regressed below a previous round")]
    CountsRegressed,
    #[error("new winner and loser ballots exceed the {delta} ballots drawn this round")]
    DrawExceedsDelta { delta: u64 },
    #[error("audit is already complete")]
    AuditComplete,
    #[error("audit has no rounds yet")]
    NotStarted,
}

/// Failures of the log-space probability kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NumericError {
    #[error("probability tails underflowed past representable range")]
    Underflow,
}

/// Outcomes of the round-size solver that carry no usable sample size.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SolverError {
    #[error("no sample size up to {max} attains the target stopping probability (best achievable {best:.6})")]
    Unattainable { max: u64, best: f64 },
    #[error("stopping probability could not be evaluated anywhere in the bracket")]
    Indeterminate,
}

/// Umbrella error for audit construction and per-round operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuditError {
    #[error("risk limit must be strictly between 0 and 1, got {0}")]
    InvalidAlpha(f64),
    #[error("max fraction to draw must be in (0, 1], got {0}")]
    InvalidMaxFraction(f64),
    #[error("athena delta must be non-negative, got {0}")]
    InvalidDelta(f64),
    #[error("target stopping probability must be strictly between 0 and 1, got {0}")]
    InvalidTarget(f64),
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error(transparent)]
    Numeric(#[from] NumericError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}
