/// Contest data and the pairwise reduction the audit engines run on.
///
/// A `Contest` holds the reported results of a single race. The engines
/// never see it directly: they operate on a `PairwiseContest`, the
/// winner-versus-loser projection fixing the ballot pool and the reported
/// winner share.
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ContestError;

/// Vote variation used in the contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ContestType {
    Plurality,
    Majority,
}

/// How plurality pairs treat ballots cast for neither member of the pair
/// (including undervotes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndervotePolicy {
    /// Ballots outside the pair are inert: the pool is winner + loser votes.
    #[default]
    Exclude,
    /// Ballots outside the pair count against the winner: the pool is the
    /// full contest and the loser absorbs everything the winner did not get.
    CountForLoser,
}

/// Reported results of a single contest.
#[derive(Debug, Clone)]
pub struct Contest {
    ballots: u64,
    tally: BTreeMap<String, u64>,
    winners: Vec<String>,
    contest_type: ContestType,
}

impl Contest {
    /// Validate and build a contest from reported data.
    pub fn new(
        ballots: u64,
        tally: BTreeMap<String, u64>,
        winners: Vec<String>,
        contest_type: ContestType,
    ) -> Result<Self, ContestError> {
        if ballots == 0 {
            return Err(ContestError::NoBallots);
        }
        if tally.is_empty() {
            return Err(ContestError::EmptyTally);
        }
        if winners.is_empty() {
            return Err(ContestError::NoWinners);
        }
        let total: u64 = tally.values().sum();
        if total > ballots {
            return Err(ContestError::TallyExceedsBallots { total, ballots });
        }
        for w in &winners {
            let votes = *tally
                .get(w)
                .ok_or_else(|| ContestError::UnknownWinner(w.clone()))?;
            if votes == 0 {
                return Err(ContestError::WinnerWithoutVotes(w.clone()));
            }
            match contest_type {
                ContestType::Plurality => {
                    for (c, &v) in &tally {
                        if !winners.contains(c) && votes <= v {
                            return Err(ContestError::Tied {
                                winner: w.clone(),
                                loser: c.clone(),
                            });
                        }
                    }
                }
                ContestType::Majority => {
                    if 2 * votes <= ballots {
                        return Err(ContestError::NoMajority(w.clone()));
                    }
                }
            }
        }
        Ok(Contest {
            ballots,
            tally,
            winners,
            contest_type,
        })
    }

    pub fn ballots(&self) -> u64 {
        self.ballots
    }

    pub fn tally(&self) -> &BTreeMap<String, u64> {
        &self.tally
    }

    pub fn winners(&self) -> &[String] {
        &self.winners
    }

    pub fn contest_type(&self) -> ContestType {
        self.contest_type
    }

    /// The highest-tallied candidate that is not a reported winner: the
    /// default opponent for a pairwise reduction.
    pub fn best_loser(&self, winner: &str) -> Option<&str> {
        self.tally
            .iter()
            .filter(|(c, _)| c.as_str() != winner && !self.winners.contains(*c))
            .max_by_key(|(_, &v)| v)
            .map(|(c, _)| c.as_str())
    }

    /// Reduce the contest to a reported winner versus a reported loser,
    /// excluding undervotes from plurality pools.
    pub fn pairwise(&self, winner: &str, loser: &str) -> Result<PairwiseContest, ContestError> {
        self.pairwise_with_policy(winner, loser, UndervotePolicy::default())
    }

    /// Pairwise reduction with an explicit undervote policy.
    pub fn pairwise_with_policy(
        &self,
        winner: &str,
        loser: &str,
        policy: UndervotePolicy,
    ) -> Result<PairwiseContest, ContestError> {
        if !self.winners.iter().any(|w| w == winner) {
            return Err(ContestError::NotAWinner(winner.to_string()));
        }
        if self.winners.iter().any(|w| w == loser) || !self.tally.contains_key(loser) {
            return Err(ContestError::NotALoser(loser.to_string()));
        }
        let winner_ballots = self.tally[winner];
        let (loser_ballots, pool) = match (self.contest_type, policy) {
            // A majority loser pool absorbs every other tally plus undervotes.
            (ContestType::Majority, _) | (ContestType::Plurality, UndervotePolicy::CountForLoser) => {
                (self.ballots - winner_ballots, self.ballots)
            }
            (ContestType::Plurality, UndervotePolicy::Exclude) => {
                let lv = self.tally[loser];
                (lv, winner_ballots + lv)
            }
        };
        if winner_ballots <= loser_ballots {
            return Err(ContestError::Tied {
                winner: winner.to_string(),
                loser: loser.to_string(),
            });
        }
        Ok(PairwiseContest {
            winner: winner.to_string(),
            loser: loser.to_string(),
            winner_ballots,
            loser_ballots,
            pool,
            ballots: self.ballots,
            contest_type: self.contest_type,
        })
    }
}

impl fmt::Display for Contest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Contest ({:?}), {} ballots", self.contest_type, self.ballots)?;
        for (c, v) in &self.tally {
            let mark = if self.winners.iter().any(|w| w == c) {
                " (reported winner)"
            } else {
                ""
            };
            writeln!(f, "  {c}: {v}{mark}")?;
        }
        Ok(())
    }
}

/// One reported winner against one reported loser, with the ballot pool the
/// engines draw from.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairwiseContest {
    winner: String,
    loser: String,
    winner_ballots: u64,
    loser_ballots: u64,
    pool: u64,
    ballots: u64,
    contest_type: ContestType,
}

impl PairwiseContest {
    pub fn winner(&self) -> &str {
        &self.winner
    }

    pub fn loser(&self) -> &str {
        &self.loser
    }

    pub fn winner_ballots(&self) -> u64 {
        self.winner_ballots
    }

    pub fn loser_ballots(&self) -> u64 {
        self.loser_ballots
    }

    /// Size of the ballot pool the pair is audited over.
    pub fn pool(&self) -> u64 {
        self.pool
    }

    /// Total ballots cast in the underlying contest.
    pub fn ballots(&self) -> u64 {
        self.ballots
    }

    pub fn contest_type(&self) -> ContestType {
        self.contest_type
    }

    /// Reported winner share of the pool.
    pub fn winner_prop(&self) -> f64 {
        self.winner_ballots as f64 / self.pool as f64
    }

    /// Share of the pool a tied winner would hold. Uses the floor of half
    /// the pool, so it sits just under 1/2 when the pool is odd.
    pub fn tied_prop(&self) -> f64 {
        (self.pool / 2) as f64 / self.pool as f64
    }

    /// Reported pairwise margin relative to the full contest.
    pub fn margin(&self) -> f64 {
        (self.winner_ballots - self.loser_ballots) as f64 / self.ballots as f64
    }
}
