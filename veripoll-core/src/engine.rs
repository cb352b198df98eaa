/// Audit engines: the statistical stopping rules.
///
/// Each engine supplies the same three-function contract the state machine
/// and solver build on: a per-round risk measure, the smallest stopping
/// count for a round size, and the probability a round of a given size
/// stops when the reported tallies are true. The engines are tagged
/// variants dispatched statically; no trait objects.
use crate::contest::{ContestType, PairwiseContest};
use crate::dist::{binom_ln_pmf, binom_ln_sf, binom_sf, hypergeom_sf};
use crate::error::NumericError;
use crate::posterior::{beta_tail_risk, pool_posterior_risk};

/// The available stopping rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Engine {
    /// Bayesian audit without replacement: risk is the posterior
    /// probability that the reported winner actually lost.
    Brla,
    /// Ratio of the tied-world binomial tail to the reported-world tail.
    Minerva,
    /// Minerva's tail ratio with an additional pointwise likelihood
    /// condition scaled by `delta`.
    Athena { delta: f64 },
    /// Sequential likelihood-ratio test against the tied share.
    Bravo,
}

impl Engine {
    /// The wire tag used by drivers and transcripts.
    pub fn tag(&self) -> &'static str {
        match self {
            Engine::Brla => "brla",
            Engine::Minerva => "minerva",
            Engine::Athena { .. } => "athena",
            Engine::Bravo => "bravo",
        }
    }

    /// Whether the engine models draws with replacement.
    pub fn with_replacement(&self) -> bool {
        !matches!(self, Engine::Brla)
    }

    /// Risk measure after a cumulative pairwise sample of `sample` ballots
    /// containing `winner_sample` for the reported winner.
    pub fn p_value(
        &self,
        pair: &PairwiseContest,
        sample: u64,
        winner_sample: u64,
    ) -> Result<f64, NumericError> {
        let (n, k) = (sample, winner_sample);
        match *self {
            Engine::Brla => match pair.contest_type() {
                ContestType::Majority => Ok(beta_tail_risk(k, n - k)),
                ContestType::Plurality => pool_posterior_risk(pair.pool(), n, k),
            },
            Engine::Minerva | Engine::Athena { .. } => tail_ratio(pair, n, k),
            Engine::Bravo => {
                let lambda = log_likelihood_ratio(pair, n, k);
                Ok((-lambda).exp().min(1.0))
            }
        }
    }

    /// Smallest winner count that stops a round of the given cumulative
    /// size, or `None` when no count up to the sample suffices.
    pub fn kmin(&self, pair: &PairwiseContest, alpha: f64, sample: u64) -> Option<u64> {
        let n = sample;
        if n == 0 {
            return None;
        }
        if let Engine::Bravo = self {
            return bravo_kmin(pair, alpha, n);
        }
        if !self.stops_at(pair, alpha, n, n) {
            return None;
        }
        // The stop predicate is monotone in k; bisect for the boundary.
        let mut lo = n / 2;
        let mut hi = n;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.stops_at(pair, alpha, n, mid) {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Some(lo)
    }

    /// Probability that a fresh round of the given size reaches its
    /// stopping count, assuming the reported tallies are true.
    pub fn stopping_prob(
        &self,
        pair: &PairwiseContest,
        alpha: f64,
        sample: u64,
    ) -> Result<f64, NumericError> {
        let kmin = self.kmin(pair, alpha, sample);
        Ok(self.stopping_prob_given(pair, sample, kmin))
    }

    /// Stopping probability for an already-computed kmin, so callers with a
    /// kmin memo skip the search.
    pub(crate) fn stopping_prob_given(
        &self,
        pair: &PairwiseContest,
        sample: u64,
        kmin: Option<u64>,
    ) -> f64 {
        match kmin {
            None => 0.0,
            Some(km) => {
                if self.with_replacement() {
                    binom_sf(km, sample, pair.winner_prop())
                } else {
                    hypergeom_sf(km, pair.pool(), pair.winner_ballots(), sample)
                }
            }
        }
    }

    /// Smallest round size with any stopping count at all, bounded by
    /// `max_sample`. Existence is monotone in the round size for these
    /// rules, so a doubling probe plus bisection finds the boundary.
    pub fn min_sample_size(
        &self,
        pair: &PairwiseContest,
        alpha: f64,
        max_sample: u64,
    ) -> Option<u64> {
        let mut probe = 1u64;
        let mut last_fail = 0u64;
        let first_ok = loop {
            if probe > max_sample {
                return None;
            }
            if self.kmin(pair, alpha, probe).is_some() {
                break probe;
            }
            last_fail = probe;
            if probe == max_sample {
                return None;
            }
            probe = probe.saturating_mul(2).min(max_sample);
        };
        let mut lo = last_fail + 1;
        let mut hi = first_ok;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.kmin(pair, alpha, mid).is_some() {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Some(hi)
    }

    /// Whether observing `k` winner ballots in a cumulative sample of `n`
    /// satisfies every stopping condition of the engine.
    fn stops_at(&self, pair: &PairwiseContest, alpha: f64, n: u64, k: u64) -> bool {
        match *self {
            Engine::Athena { delta } => {
                let tail_ok = tail_ratio(pair, n, k).is_ok_and(|p| p <= alpha);
                tail_ok && point_condition(pair, n, k, delta)
            }
            _ => self.p_value(pair, n, k).is_ok_and(|p| p <= alpha),
        }
    }
}

/// Minerva's risk measure: the ratio of the tied-share binomial upper tail
/// to the reported-share upper tail, evaluated as a log-space difference.
/// Never exceeds 1 because the reported distribution stochastically
/// dominates the tied one.
fn tail_ratio(pair: &PairwiseContest, n: u64, k: u64) -> Result<f64, NumericError> {
    let ln_null = binom_ln_sf(k, n, pair.tied_prop());
    let ln_reported = binom_ln_sf(k, n, pair.winner_prop());
    if ln_reported == f64::NEG_INFINITY {
        return Err(NumericError::Underflow);
    }
    Ok((ln_null - ln_reported).exp().clamp(0.0, 1.0))
}

/// Athena's pointwise condition: the tied-share pmf at k must not exceed
/// `delta` times the reported-share pmf.
fn point_condition(pair: &PairwiseContest, n: u64, k: u64, delta: f64) -> bool {
    let ln_null = binom_ln_pmf(k, n, pair.tied_prop());
    let ln_reported = binom_ln_pmf(k, n, pair.winner_prop());
    if ln_reported == f64::NEG_INFINITY {
        return ln_null == f64::NEG_INFINITY;
    }
    ln_null <= delta.ln() + ln_reported
}

/// Running log-likelihood ratio of the reported share against an even
/// split, over the cumulative sample.
fn log_likelihood_ratio(pair: &PairwiseContest, n: u64, k: u64) -> f64 {
    let p = pair.winner_prop();
    let win = (2.0 * p).ln();
    let lose = (2.0 * (1.0 - p)).ln();
    k as f64 * win + (n - k) as f64 * lose
}

/// Closed-form stopping count for the sequential test: the smallest k with
/// `k ln(p/(1-p)) >= ln(1/alpha) - n ln(2(1-p))`.
fn bravo_kmin(pair: &PairwiseContest, alpha: f64, n: u64) -> Option<u64> {
    let p = pair.winner_prop();
    let numer = (1.0 / alpha).ln() - n as f64 * (2.0 * (1.0 - p)).ln();
    let denom = (p / (1.0 - p)).ln();
    let k = (numer / denom).ceil();
    if !k.is_finite() || k > n as f64 {
        None
    } else {
        Some(k.max(0.0) as u64)
    }
}
