/// Posterior tail kernel for the Bayesian audit.
///
/// Under a uniform prior on the true winner share, observing `kw` winner and
/// `kl` loser ballots makes the share posterior Beta(kw+1, kl+1); the audit's
/// risk is the posterior mass on outcomes where the reported winner actually
/// lost. Two formulations are provided: the Beta upper tail at 1/2 for
/// majority pairs, and the finite-pool enumeration over every possible true
/// winner-ballot count for plurality pairs sampled without replacement.
use crate::dist::{hypergeom_ln_pmf, ln_gamma, log_add_exp, LN_TAIL_CUTOFF};
use crate::error::NumericError;

/// Log of the Beta function: ln B(a, b).
fn ln_beta_fn(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Regularized incomplete beta function I_x(a, b) via Lentz's modified
/// continued fraction.
pub(crate) fn regularized_ibeta(x: f64, a: f64, b: f64) -> f64 {
    const EPS: f64 = 1e-15;
    const TINY: f64 = 1e-30;
    const MAX_ITER: usize = 300;

    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // Symmetry relation for faster convergence on the far side.
    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_ibeta(1.0 - x, b, a);
    }

    let ln_prefactor = a * x.ln() + b * (1.0 - x).ln() - ln_beta_fn(a, b) - a.ln();
    let prefactor = ln_prefactor.exp();

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0_f64;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m_f64 = m as f64;
        let m2 = 2.0 * m_f64;

        let aa = m_f64 * (b - m_f64) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -((a + m_f64) * (qab + m_f64) * x) / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }

    (prefactor * h).clamp(0.0, 1.0)
}

/// Posterior probability that the true winner share is at most 1/2, given
/// `winner_sample` winner and `loser_sample` loser ballots under a uniform
/// prior: I_{1/2}(kw+1, kl+1).
pub fn beta_tail_risk(winner_sample: u64, loser_sample: u64) -> f64 {
    regularized_ibeta(0.5, winner_sample as f64 + 1.0, loser_sample as f64 + 1.0)
}

/// Finite-pool posterior risk for a draw without replacement.
///
/// The prior over the true winner-ballot count in a pool of `pool` ballots
/// puts mass 1/2 on the tie count `pool/2` and spreads the remaining 1/2
/// uniformly over every count above it. The likelihood of the observation is
/// Hypergeometric(pool, count, sample) at `winner_sample`, and the risk is
/// the normalized posterior mass on counts at or below the tie.
///
/// Runs in O(pool) using the incremental likelihood-ratio update in log
/// space, stopping once the summand has decayed past relevance.
pub fn pool_posterior_risk(pool: u64, sample: u64, winner_sample: u64) -> Result<f64, NumericError> {
    assert!(sample <= pool, "sample {sample} exceeds pool {pool}");
    assert!(winner_sample <= sample, "winner ballots {winner_sample} exceed sample {sample}");

    let n = sample;
    let k = winner_sample;
    let tie = pool / 2;
    let alternatives = pool - tie;

    let ln_num = 0.5f64.ln() + hypergeom_ln_pmf(k, pool, tie, n);

    // Counts with nonzero likelihood: k <= count <= pool - (n - k).
    let start = (tie + 1).max(k);
    let stop = pool - (n - k);
    let mut ln_alt = f64::NEG_INFINITY;
    if start <= stop {
        let peak = if n > 0 {
            pool as f64 * k as f64 / n as f64
        } else {
            pool as f64
        };
        let mut ln_term = hypergeom_ln_pmf(k, pool, start, n);
        ln_alt = ln_term;
        let mut x = start;
        while x < stop {
            // L(x+1)/L(x) = (x+1)/(x+1-k) * (pool-x-(n-k))/(pool-x)
            ln_term += ((x + 1) as f64).ln() - ((x + 1 - k) as f64).ln()
                + ((pool - x - (n - k)) as f64).ln()
                - ((pool - x) as f64).ln();
            ln_alt = log_add_exp(ln_alt, ln_term);
            x += 1;
            if x as f64 > peak && ln_term - ln_alt < LN_TAIL_CUTOFF {
                break;
            }
        }
    }

    let ln_denom = log_add_exp(ln_num, (0.5 / alternatives as f64).ln() + ln_alt);
    if ln_denom == f64::NEG_INFINITY {
        return Err(NumericError::Underflow);
    }
    Ok((ln_num - ln_denom).exp().clamp(0.0, 1.0))
}
