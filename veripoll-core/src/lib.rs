/// veripoll-core: Pure-computation risk-limiting audit engines.
///
/// Contest tallies → round-by-round risk measures → stop/continue decisions
/// and round-size recommendations. No IO, no prompts, no filesystem — just
/// math. Bring your own ballot drawing.
///
/// An audit fixes a reported winner/loser pair and an engine (BRLA,
/// Minerva, Athena or BRAVO), then consumes rounds of cumulative sample
/// observations. Each round yields the engine's risk measure, the smallest
/// winner count that would have stopped the round, and the stop/continue
/// decision at the configured risk limit.
///
/// # Quick start
///
/// ```rust
/// use std::collections::BTreeMap;
/// use veripoll_core::{Audit, Contest, ContestType, Engine};
///
/// let mut tally = BTreeMap::new();
/// tally.insert("Alice".to_string(), 700u64);
/// tally.insert("Bob".to_string(), 300u64);
/// let contest = Contest::new(1000, tally, vec!["Alice".to_string()], ContestType::Plurality)
///     .expect("valid contest");
/// let pair = contest.pairwise("Alice", "Bob").expect("valid pair");
///
/// let mut audit = Audit::new(pair, Engine::Minerva, 0.1, 0.5).expect("valid params");
/// let decision = audit.execute_round(100, 70, 30).expect("valid round");
/// assert!(decision.stopped);
/// ```

pub mod audit;
pub mod contest;
pub mod dist;
pub mod engine;
pub mod error;
pub mod posterior;
pub mod solver;

// Re-export primary public API at crate root.
pub use audit::{Audit, AuditState, Decision, Round, RoundDecision, StoppingReason};
pub use contest::{Contest, ContestType, PairwiseContest, UndervotePolicy};
pub use engine::Engine;
pub use error::{AuditError, ContestError, NumericError, RoundError, SolverError};
pub use solver::next_round_size;
