/// The audit state machine: a transcript of rounds, the active engine, and
/// the stop/continue lifecycle.
///
/// An `Audit` exclusively owns its transcript and memo tables; the pairwise
/// contest it runs on is fixed at construction. Rounds are supplied as
/// running totals and validated before any state changes, so a rejected
/// round leaves the audit exactly as it was.
use std::collections::BTreeMap;

use crate::contest::PairwiseContest;
use crate::engine::Engine;
use crate::error::{AuditError, RoundError};
use crate::solver;

/// Lifecycle of an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditState {
    NotStarted,
    InProgress,
    /// The risk limit was met.
    CompleteStopped,
    /// The maximum sample was drawn without meeting the risk limit.
    CompleteExhausted,
    /// The auditors chose to stop early and escalate.
    CompleteForced,
}

/// Why a complete audit stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoppingReason {
    None,
    RiskMet,
    Forced,
    ExceededMax,
}

/// Stop-or-continue outcome of a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RoundDecision {
    Stop,
    Continue,
}

/// One executed round. Immutable once appended to the transcript.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Round {
    /// 1-based round index.
    pub round: u32,
    /// Cumulative sample size.
    pub size: u64,
    /// Cumulative ballots observed for the reported winner.
    pub winner_ballots: u64,
    /// Cumulative ballots observed for the reported loser.
    pub loser_ballots: u64,
    /// Smallest winner count that would have stopped this round, if any.
    pub kmin: Option<u64>,
    /// Engine risk measure for this round.
    pub risk: f64,
    pub decision: RoundDecision,
}

/// What `execute_round` hands back to the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub stopped: bool,
    pub risk: f64,
    pub kmin: Option<u64>,
}

/// A round-by-round risk-limiting audit over one candidate pair.
#[derive(Debug, Clone)]
pub struct Audit {
    pair: PairwiseContest,
    engine: Engine,
    alpha: f64,
    max_fraction: f64,
    max_sample: u64,
    transcript: Vec<Round>,
    state: AuditState,
    reason: StoppingReason,
    current_risk: f64,
    /// kmin per pairwise sample size; at most `max_sample` entries, dropped
    /// with the audit.
    kmin_memo: BTreeMap<u64, Option<u64>>,
}

impl Audit {
    /// Create an audit with the given engine and parameters.
    pub fn new(
        pair: PairwiseContest,
        engine: Engine,
        alpha: f64,
        max_fraction: f64,
    ) -> Result<Self, AuditError> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(AuditError::InvalidAlpha(alpha));
        }
        if !(max_fraction > 0.0 && max_fraction <= 1.0) {
            return Err(AuditError::InvalidMaxFraction(max_fraction));
        }
        if let Engine::Athena { delta } = engine {
            if !(delta >= 0.0) {
                return Err(AuditError::InvalidDelta(delta));
            }
        }
        // The pairwise statistics cannot draw more than the pool holds.
        let max_sample =
            (((max_fraction * pair.ballots() as f64) + 1e-9).floor() as u64).min(pair.pool());
        Ok(Audit {
            pair,
            engine,
            alpha,
            max_fraction,
            max_sample,
            transcript: Vec::new(),
            state: AuditState::NotStarted,
            reason: StoppingReason::None,
            current_risk: 1.0,
            kmin_memo: BTreeMap::new(),
        })
    }

    pub fn pair(&self) -> &PairwiseContest {
        &self.pair
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn max_fraction(&self) -> f64 {
        self.max_fraction
    }

    /// Largest cumulative sample the audit may draw.
    pub fn max_sample_size(&self) -> u64 {
        self.max_sample
    }

    /// Smallest round size with any stopping count, if one exists within
    /// the draw limit.
    pub fn min_sample_size(&self) -> Option<u64> {
        self.engine.min_sample_size(&self.pair, self.alpha, self.max_sample)
    }

    pub fn state(&self) -> AuditState {
        self.state
    }

    pub fn stopping_reason(&self) -> StoppingReason {
        self.reason
    }

    pub fn is_complete(&self) -> bool {
        !matches!(self.state, AuditState::NotStarted | AuditState::InProgress)
    }

    /// Risk measure after the latest round; 1.0 before any round.
    pub fn current_risk(&self) -> f64 {
        self.current_risk
    }

    pub fn transcript(&self) -> &[Round] {
        &self.transcript
    }

    /// Cumulative pairwise sample observed so far (winner + loser ballots).
    pub fn pair_sample(&self) -> u64 {
        self.transcript
            .last()
            .map_or(0, |r| r.winner_ballots + r.loser_ballots)
    }

    /// Execute one round of observations, all given as running totals.
    ///
    /// `size` is the cumulative number of ballots drawn; `winner_ballots`
    /// and `loser_ballots` are the cumulative counts for the audited pair.
    /// Ballots in the draw for other candidates are inert: the engine
    /// statistics run on the pairwise totals.
    pub fn execute_round(
        &mut self,
        size: u64,
        winner_ballots: u64,
        loser_ballots: u64,
    ) -> Result<Decision, AuditError> {
        if self.is_complete() {
            return Err(RoundError::AuditComplete.into());
        }
        let (prev_size, prev_w, prev_l) = self
            .transcript
            .last()
            .map_or((0, 0, 0), |r| (r.size, r.winner_ballots, r.loser_ballots));
        if size <= prev_size {
            return Err(RoundError::NotMonotone { size, previous: prev_size }.into());
        }
        if size > self.max_sample {
            return Err(RoundError::ExceedsMaxSample { size, max: self.max_sample }.into());
        }
        if winner_ballots < prev_w || loser_ballots < prev_l {
            return Err(RoundError::CountsRegressed.into());
        }
        let delta = size - prev_size;
        if (winner_ballots - prev_w) + (loser_ballots - prev_l) > delta {
            return Err(RoundError::DrawExceedsDelta { delta }.into());
        }

        let sample = winner_ballots + loser_ballots;
        let risk = self.engine.p_value(&self.pair, sample, winner_ballots)?;
        let kmin = self.kmin_cached(sample);
        // The kmin encodes every stopping condition, so the decision is a
        // single comparison even for rules with more than a tail test.
        let stopped = kmin.is_some_and(|km| winner_ballots >= km);

        self.current_risk = risk;
        self.transcript.push(Round {
            round: self.transcript.len() as u32 + 1,
            size,
            winner_ballots,
            loser_ballots,
            kmin,
            risk,
            decision: if stopped { RoundDecision::Stop } else { RoundDecision::Continue },
        });
        if stopped {
            self.state = AuditState::CompleteStopped;
            self.reason = StoppingReason::RiskMet;
        } else if size == self.max_sample {
            self.state = AuditState::CompleteExhausted;
            self.reason = StoppingReason::ExceededMax;
        } else {
            self.state = AuditState::InProgress;
        }
        Ok(Decision { stopped, risk, kmin })
    }

    /// Abandon the audit and escalate. Only valid while rounds are in
    /// progress; the transcript keeps its rounds and the forced state is
    /// reflected in the stopping reason.
    pub fn force_stop(&mut self) -> Result<(), AuditError> {
        match self.state {
            AuditState::InProgress => {
                self.state = AuditState::CompleteForced;
                self.reason = StoppingReason::Forced;
                Ok(())
            }
            AuditState::NotStarted => Err(RoundError::NotStarted.into()),
            _ => Err(RoundError::AuditComplete.into()),
        }
    }

    /// Recommend the smallest next round size whose stopping probability
    /// reaches `target`, assuming the reported tallies are true.
    pub fn next_sample_size(&mut self, target: f64) -> Result<u64, AuditError> {
        if !(target > 0.0 && target < 1.0) {
            return Err(AuditError::InvalidTarget(target));
        }
        if self.is_complete() {
            return Err(RoundError::AuditComplete.into());
        }
        let lo = self.pair_sample() + 1;
        let hi = self.max_sample;
        let engine = self.engine;
        let alpha = self.alpha;
        let pair = self.pair.clone();
        let memo = &mut self.kmin_memo;
        let sprob = |n: u64| {
            let kmin = *memo.entry(n).or_insert_with(|| engine.kmin(&pair, alpha, n));
            Ok(engine.stopping_prob_given(&pair, n, kmin))
        };
        solver::next_round_size(sprob, lo, hi, target).map_err(AuditError::from)
    }

    fn kmin_cached(&mut self, sample: u64) -> Option<u64> {
        let Audit { engine, alpha, pair, kmin_memo, .. } = self;
        *kmin_memo
            .entry(sample)
            .or_insert_with(|| engine.kmin(pair, *alpha, sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contest::{Contest, ContestType};
    use crate::error::SolverError;
    use std::collections::BTreeMap;

    fn two_way(
        ballots: u64,
        a: u64,
        b: u64,
        kind: ContestType,
    ) -> PairwiseContest {
        let mut tally = BTreeMap::new();
        tally.insert("A".to_string(), a);
        tally.insert("B".to_string(), b);
        let contest = Contest::new(ballots, tally, vec!["A".to_string()], kind).unwrap();
        contest.pairwise("A", "B").unwrap()
    }

    fn audit(pair: PairwiseContest, engine: Engine, alpha: f64, f: f64) -> Audit {
        Audit::new(pair, engine, alpha, f).unwrap()
    }

    #[test]
    fn test_parameter_validation() {
        let pair = two_way(1000, 700, 300, ContestType::Plurality);
        assert_eq!(
            Audit::new(pair.clone(), Engine::Brla, 0.0, 0.2).unwrap_err(),
            AuditError::InvalidAlpha(0.0)
        );
        assert_eq!(
            Audit::new(pair.clone(), Engine::Brla, 1.0, 0.2).unwrap_err(),
            AuditError::InvalidAlpha(1.0)
        );
        assert_eq!(
            Audit::new(pair.clone(), Engine::Brla, 0.1, 0.0).unwrap_err(),
            AuditError::InvalidMaxFraction(0.0)
        );
        assert_eq!(
            Audit::new(pair.clone(), Engine::Athena { delta: -1.0 }, 0.1, 0.2).unwrap_err(),
            AuditError::InvalidDelta(-1.0)
        );
        assert!(Audit::new(pair, Engine::Athena { delta: 1.0 }, 0.1, 0.2).is_ok());
    }

    #[test]
    fn test_max_sample_size() {
        let pair = two_way(1000, 700, 300, ContestType::Plurality);
        let a = audit(pair, Engine::Brla, 0.1, 0.2);
        assert_eq!(a.max_sample_size(), 200);
    }

    #[test]
    fn test_brla_confirms_landslide_in_one_round() {
        // 70/30 contest of 1000 ballots: 175 winner ballots in a 200-ballot
        // round meet a 10% risk limit immediately.
        let pair = two_way(1000, 700, 300, ContestType::Plurality);
        let mut a = audit(pair, Engine::Brla, 0.1, 0.2);
        let d = a.execute_round(200, 175, 25).unwrap();
        assert!(d.stopped);
        assert!(d.risk < 0.1);
        assert_eq!(a.state(), AuditState::CompleteStopped);
        assert_eq!(a.stopping_reason(), StoppingReason::RiskMet);
    }

    #[test]
    fn test_minerva_solver_and_round() {
        // 60/40 majority contest of 100000 ballots, 10% risk limit: a 70%
        // stopping probability prices the first round at 111 draws, and a
        // proportional 100-ballot sample already stops.
        let pair = two_way(100_000, 60_000, 40_000, ContestType::Majority);
        let mut a = audit(pair, Engine::Minerva, 0.1, 0.1);
        assert_eq!(a.next_sample_size(0.7).unwrap(), 111);
        let d = a.execute_round(100, 60, 40).unwrap();
        assert!(d.stopped);
        assert_eq!(a.state(), AuditState::CompleteStopped);
    }

    #[test]
    fn test_athena_two_round_audit() {
        // 75/25 majority contest: 31 of 50 fails the pointwise condition,
        // 70 of 100 stops.
        let pair = two_way(100_000, 75_000, 25_000, ContestType::Majority);
        let mut a = audit(pair, Engine::Athena { delta: 1.0 }, 0.1, 0.1);
        let d1 = a.execute_round(50, 31, 19).unwrap();
        assert!(!d1.stopped);
        assert_eq!(a.state(), AuditState::InProgress);
        let d2 = a.execute_round(100, 70, 30).unwrap();
        assert!(d2.stopped);
        assert_eq!(a.state(), AuditState::CompleteStopped);
    }

    #[test]
    fn test_exhaustion_at_max_sample() {
        // A 1% margin cannot be certified within 5% of the ballots when the
        // sample mirrors the reported split.
        let pair = two_way(1000, 505, 495, ContestType::Plurality);
        let mut a = audit(pair, Engine::Brla, 0.05, 0.05);
        assert_eq!(a.max_sample_size(), 50);
        let d = a.execute_round(50, 25, 25).unwrap();
        assert!(!d.stopped);
        assert_eq!(a.state(), AuditState::CompleteExhausted);
        assert_eq!(a.stopping_reason(), StoppingReason::ExceededMax);
    }

    #[test]
    fn test_bravo_risk_monotone_under_reported_share() {
        // Ten rounds tracking the reported 60/40 split: the likelihood
        // ratio keeps growing, so the reported risk never rises.
        let pair = two_way(10_000, 6_000, 4_000, ContestType::Plurality);
        let mut a = audit(pair, Engine::Bravo, 0.1, 0.5);
        let mut prev_risk = f64::INFINITY;
        for i in 1..=10u64 {
            let n = 100 * i;
            let d = a.execute_round(n, 60 * i, 40 * i).unwrap();
            assert!(d.risk <= prev_risk + 1e-12, "risk rose at round {i}");
            prev_risk = d.risk;
            if a.is_complete() {
                break;
            }
        }
        assert!(a.is_complete());
        assert_eq!(a.state(), AuditState::CompleteStopped);
    }

    #[test]
    fn test_round_validation_leaves_state_untouched() {
        let pair = two_way(1000, 700, 300, ContestType::Plurality);
        let mut a = audit(pair, Engine::Minerva, 0.1, 0.2);
        a.execute_round(50, 20, 30).unwrap();
        let before = a.transcript().to_vec();

        // Shrinking round size.
        assert_eq!(
            a.execute_round(50, 30, 20).unwrap_err(),
            AuditError::Round(RoundError::NotMonotone { size: 50, previous: 50 })
        );
        // Beyond the draw limit.
        assert_eq!(
            a.execute_round(300, 200, 100).unwrap_err(),
            AuditError::Round(RoundError::ExceedsMaxSample { size: 300, max: 200 })
        );
        // Cumulative counts cannot shrink.
        assert_eq!(
            a.execute_round(80, 10, 30).unwrap_err(),
            AuditError::Round(RoundError::CountsRegressed)
        );
        // More new pair ballots than ballots drawn.
        assert_eq!(
            a.execute_round(60, 40, 35).unwrap_err(),
            AuditError::Round(RoundError::DrawExceedsDelta { delta: 10 })
        );

        assert_eq!(a.transcript(), &before[..]);
        assert_eq!(a.state(), AuditState::InProgress);
    }

    #[test]
    fn test_no_rounds_after_completion() {
        let pair = two_way(1000, 700, 300, ContestType::Plurality);
        let mut a = audit(pair, Engine::Brla, 0.1, 0.2);
        a.execute_round(200, 175, 25).unwrap();
        assert_eq!(
            a.execute_round(201, 176, 25).unwrap_err(),
            AuditError::Round(RoundError::AuditComplete)
        );
        assert_eq!(a.state(), AuditState::CompleteStopped);
    }

    #[test]
    fn test_force_stop_lifecycle() {
        let pair = two_way(1000, 700, 300, ContestType::Plurality);
        let mut a = audit(pair.clone(), Engine::Minerva, 0.1, 0.2);
        assert_eq!(
            a.force_stop().unwrap_err(),
            AuditError::Round(RoundError::NotStarted)
        );
        a.execute_round(20, 8, 12).unwrap();
        a.force_stop().unwrap();
        assert_eq!(a.state(), AuditState::CompleteForced);
        assert_eq!(a.stopping_reason(), StoppingReason::Forced);
        assert_eq!(
            a.force_stop().unwrap_err(),
            AuditError::Round(RoundError::AuditComplete)
        );
        assert_eq!(
            a.execute_round(40, 20, 20).unwrap_err(),
            AuditError::Round(RoundError::AuditComplete)
        );
    }

    #[test]
    fn test_transcript_records_rounds_in_order() {
        let pair = two_way(100_000, 60_000, 40_000, ContestType::Majority);
        let mut a = audit(pair, Engine::Minerva, 0.1, 0.1);
        a.execute_round(30, 16, 14).unwrap();
        a.execute_round(80, 45, 35).unwrap();
        let t = a.transcript();
        assert_eq!(t.len(), 2);
        assert_eq!((t[0].round, t[0].size), (1, 30));
        assert_eq!((t[1].round, t[1].size), (2, 80));
        assert!(t[0].size < t[1].size);
        assert_eq!(t[1].winner_ballots, 45);
    }

    #[test]
    fn test_next_sample_size_unattainable() {
        // Tiny margin, tight limit, almost no room to draw.
        let pair = two_way(1000, 505, 495, ContestType::Plurality);
        let mut a = audit(pair, Engine::Minerva, 0.01, 0.05);
        match a.next_sample_size(0.9).unwrap_err() {
            AuditError::Solver(SolverError::Unattainable { max, best }) => {
                assert_eq!(max, 50);
                assert!(best < 0.9);
            }
            other => panic!("expected unattainable, got {other:?}"),
        }
    }

    #[test]
    fn test_next_sample_size_rejects_bad_target() {
        let pair = two_way(1000, 700, 300, ContestType::Plurality);
        let mut a = audit(pair, Engine::Minerva, 0.1, 0.2);
        assert_eq!(
            a.next_sample_size(0.0).unwrap_err(),
            AuditError::InvalidTarget(0.0)
        );
        assert_eq!(
            a.next_sample_size(1.0).unwrap_err(),
            AuditError::InvalidTarget(1.0)
        );
    }

    #[test]
    fn test_next_sample_size_reuses_memo_across_calls() {
        let pair = two_way(100_000, 60_000, 40_000, ContestType::Majority);
        let mut a = audit(pair, Engine::Minerva, 0.1, 0.1);
        let n1 = a.next_sample_size(0.7).unwrap();
        let cached = a.kmin_memo.len();
        assert!(cached > 0);
        let n2 = a.next_sample_size(0.7).unwrap();
        assert_eq!(n1, n2);
        // A repeat query hits the memo instead of growing it.
        assert_eq!(a.kmin_memo.len(), cached);
        assert!(a.kmin_memo.len() <= a.max_sample_size() as usize);
    }

    #[test]
    fn test_recommendation_starts_above_previous_round() {
        let pair = two_way(100_000, 60_000, 40_000, ContestType::Majority);
        let mut a = audit(pair, Engine::Minerva, 0.1, 0.1);
        a.execute_round(100, 55, 45).unwrap();
        let n = a.next_sample_size(0.7).unwrap();
        assert!(n > 100, "recommended {n}");
    }
}
