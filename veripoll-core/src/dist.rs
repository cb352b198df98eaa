/// Binomial and hypergeometric tail kernel.
///
/// All routines work in log space: probabilities are carried as natural
/// logarithms and only exponentiated at the boundary, which keeps the tail
/// ratios used by the engines finite far past the point where direct
/// products underflow. Survival functions are inclusive upper tails,
/// `sf(k) = P(X >= k)`.
///
/// The summations use the incremental log-pmf recurrence
/// `ln pmf(k+1) = ln pmf(k) + ln((n-k)/(k+1)) + ln(p/(1-p))` (and its
/// hypergeometric analogue) feeding a constant-size streaming log-sum-exp
/// accumulator, so a tail evaluation allocates nothing.
use std::f64::consts::PI;

/// Relative term size (in nats) below which a tail summation may stop once
/// it has passed the distribution's mode: ln(1e-300).
pub(crate) const LN_TAIL_CUTOFF: f64 = -690.775527898213705;

/// Log-gamma via the Lanczos approximation (g = 7, 9 coefficients), with
/// the reflection formula below 0.5.
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        let ln_sin = (PI * x).sin().abs().ln();
        PI.ln() - ln_sin - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut ag = COEFFS[0];
        for (i, &c) in COEFFS[1..].iter().enumerate() {
            ag += c / (x + i as f64 + 1.0);
        }
        let t = x + 7.5;
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + ag.ln()
    }
}

/// Log of the binomial coefficient C(n, k).
pub fn ln_choose(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_gamma(n as f64 + 1.0) - ln_gamma(k as f64 + 1.0) - ln_gamma((n - k) as f64 + 1.0)
}

/// `ln(exp(a) + exp(b))` without leaving log space.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Log-pmf of Binomial(n, p) at k.
pub fn binom_ln_pmf(k: u64, n: u64, p: f64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    if p <= 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    if p >= 1.0 {
        return if k == n { 0.0 } else { f64::NEG_INFINITY };
    }
    ln_choose(n, k) + k as f64 * p.ln() + (n - k) as f64 * (1.0 - p).ln()
}

/// Pmf of Binomial(n, p) at k.
pub fn binom_pmf(k: u64, n: u64, p: f64) -> f64 {
    binom_ln_pmf(k, n, p).exp().clamp(0.0, 1.0)
}

/// Log of the inclusive upper tail `P(X >= k)` for X ~ Binomial(n, p).
pub fn binom_ln_sf(k: u64, n: u64, p: f64) -> f64 {
    if k == 0 {
        return 0.0;
    }
    if k > n {
        return f64::NEG_INFINITY;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return 0.0;
    }

    let ln_odds = (p / (1.0 - p)).ln();
    let mode = (n + 1) as f64 * p;
    let mut ln_term = binom_ln_pmf(k, n, p);
    let mut ln_sum = ln_term;
    for j in k..n {
        ln_term += ((n - j) as f64).ln() - ((j + 1) as f64).ln() + ln_odds;
        ln_sum = log_add_exp(ln_sum, ln_term);
        if (j + 1) as f64 > mode && ln_term - ln_sum < LN_TAIL_CUTOFF {
            break;
        }
    }
    ln_sum.min(0.0)
}

/// Inclusive upper tail `P(X >= k)` for X ~ Binomial(n, p), clamped to [0, 1].
pub fn binom_sf(k: u64, n: u64, p: f64) -> f64 {
    binom_ln_sf(k, n, p).exp().clamp(0.0, 1.0)
}

/// Log-pmf of Hypergeometric(pop, succ, draws) at k: the chance of k
/// successes when drawing `draws` without replacement from a population of
/// `pop` containing `succ` successes.
pub fn hypergeom_ln_pmf(k: u64, pop: u64, succ: u64, draws: u64) -> f64 {
    if succ > pop || draws > pop {
        return f64::NEG_INFINITY;
    }
    if k > succ || k > draws {
        return f64::NEG_INFINITY;
    }
    if draws - k > pop - succ {
        return f64::NEG_INFINITY;
    }
    ln_choose(succ, k) + ln_choose(pop - succ, draws - k) - ln_choose(pop, draws)
}

/// Pmf of Hypergeometric(pop, succ, draws) at k.
pub fn hypergeom_pmf(k: u64, pop: u64, succ: u64, draws: u64) -> f64 {
    hypergeom_ln_pmf(k, pop, succ, draws).exp().clamp(0.0, 1.0)
}

/// Log of the inclusive upper tail `P(X >= k)` for
/// X ~ Hypergeometric(pop, succ, draws).
pub fn hypergeom_ln_sf(k: u64, pop: u64, succ: u64, draws: u64) -> f64 {
    if succ > pop || draws > pop {
        return f64::NEG_INFINITY;
    }
    let hi = succ.min(draws);
    let lo = (draws + succ).saturating_sub(pop);
    if k <= lo {
        return 0.0;
    }
    if k > hi {
        return f64::NEG_INFINITY;
    }

    let mean = draws as f64 * succ as f64 / pop as f64;
    let mut ln_term = hypergeom_ln_pmf(k, pop, succ, draws);
    let mut ln_sum = ln_term;
    for j in k..hi {
        // pmf(j+1)/pmf(j) = (succ-j)(draws-j) / ((j+1)(pop-succ-draws+j+1))
        let failures_left = (pop - succ) - (draws - j - 1);
        ln_term += ((succ - j) as f64).ln() + ((draws - j) as f64).ln()
            - ((j + 1) as f64).ln()
            - (failures_left as f64).ln();
        ln_sum = log_add_exp(ln_sum, ln_term);
        if (j + 1) as f64 > mean && ln_term - ln_sum < LN_TAIL_CUTOFF {
            break;
        }
    }
    ln_sum.min(0.0)
}

/// Inclusive upper tail for Hypergeometric(pop, succ, draws), clamped to [0, 1].
pub fn hypergeom_sf(k: u64, pop: u64, succ: u64, draws: u64) -> f64 {
    hypergeom_ln_sf(k, pop, succ, draws).exp().clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ln_gamma_known_values() {
        assert!(ln_gamma(1.0).abs() < 1e-12);
        assert!(ln_gamma(2.0).abs() < 1e-12);
        assert!((ln_gamma(5.0) - 24.0f64.ln()).abs() < 1e-10);
        assert!((ln_gamma(11.0) - 3628800.0f64.ln()).abs() < 1e-9);
        // Gamma(1/2) = sqrt(pi)
        assert!((ln_gamma(0.5) - 0.5 * PI.ln()).abs() < 1e-10);
    }

    #[test]
    fn test_ln_choose() {
        assert!((ln_choose(10, 3) - 120.0f64.ln()).abs() < 1e-10);
        assert!((ln_choose(50, 25) - 1.2641060643775244e14f64.ln()).abs() < 1e-8);
        assert_eq!(ln_choose(3, 5), f64::NEG_INFINITY);
        assert!(ln_choose(5, 0).abs() < 1e-12);
    }

    #[test]
    fn test_log_add_exp() {
        let s = log_add_exp(0.0f64.ln(), 1.0f64.ln());
        assert!((s.exp() - 1.0).abs() < 1e-12);
        let s = log_add_exp(0.3f64.ln(), 0.2f64.ln());
        assert!((s.exp() - 0.5).abs() < 1e-12);
        assert_eq!(log_add_exp(f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
        // Wildly different magnitudes keep the larger term intact
        let s = log_add_exp(-1000.0, 0.0);
        assert!(s.abs() < 1e-12);
    }

    #[test]
    fn test_binom_pmf_known_value() {
        // C(10,5) / 2^10 = 252/1024
        assert!((binom_pmf(5, 10, 0.5) - 0.24609375).abs() < 1e-12);
        assert!((binom_pmf(0, 4, 0.5) - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn test_binom_pmf_sums_to_one() {
        for &(n, p) in &[(50u64, 0.3), (100, 0.5), (73, 0.91)] {
            let total: f64 = (0..=n).map(|k| binom_pmf(k, n, p)).sum();
            assert!((total - 1.0).abs() < 1e-9, "sum={total} for n={n}, p={p}");
        }
    }

    #[test]
    fn test_binom_sf_matches_pmf_differences() {
        let (n, p) = (60u64, 0.6);
        for k in 0..n {
            let diff = binom_sf(k, n, p) - binom_sf(k + 1, n, p);
            assert!(
                (diff - binom_pmf(k, n, p)).abs() < 1e-9,
                "sf({k}) - sf({}) != pmf({k})",
                k + 1
            );
        }
    }

    #[test]
    fn test_binom_sf_bounds_and_monotone() {
        let (n, p) = (200u64, 0.55);
        assert_eq!(binom_sf(0, n, p), 1.0);
        assert_eq!(binom_sf(n + 1, n, p), 0.0);
        let mut prev = 1.0;
        for k in 0..=n {
            let s = binom_sf(k, n, p);
            assert!((0.0..=1.0).contains(&s));
            assert!(s <= prev + 1e-12, "sf not monotone at k={k}");
            prev = s;
        }
    }

    #[test]
    fn test_binom_sf_degenerate_p() {
        assert_eq!(binom_sf(1, 10, 0.0), 0.0);
        assert_eq!(binom_sf(0, 10, 0.0), 1.0);
        assert_eq!(binom_sf(10, 10, 1.0), 1.0);
        assert_eq!(binom_sf(11, 10, 1.0), 0.0);
    }

    #[test]
    fn test_binom_ln_sf_deep_tail_stays_finite() {
        // A 60% tail of a fair million-ballot draw: far below f64 range in
        // linear space, but a perfectly usable log probability.
        let ln_s = binom_ln_sf(600_000, 1_000_000, 0.5);
        assert!(ln_s.is_finite());
        assert!(ln_s < -10_000.0, "ln_sf={ln_s}");
        assert_eq!(binom_sf(600_000, 1_000_000, 0.5), 0.0);
    }

    #[test]
    fn test_hypergeom_pmf_known_value() {
        // C(3,0) * C(7,4) / C(10,4) = 35/210 = 1/6
        assert!((hypergeom_pmf(0, 10, 3, 4) - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_hypergeom_pmf_sums_to_one() {
        for &(pop, succ, draws) in &[(100u64, 30u64, 20u64), (1000, 333, 100), (20, 7, 5)] {
            let total: f64 = (0..=draws.min(succ))
                .map(|k| hypergeom_pmf(k, pop, succ, draws))
                .sum();
            assert!(
                (total - 1.0).abs() < 1e-9,
                "sum={total} for pop={pop}, succ={succ}, draws={draws}"
            );
        }
    }

    #[test]
    fn test_hypergeom_pmf_symmetry() {
        // Hyper(pop, succ, draws) at k equals Hyper(pop, draws, succ) at k.
        for k in 0..=7u64 {
            let a = hypergeom_pmf(k, 40, 12, 7);
            let b = hypergeom_pmf(k, 40, 7, 12);
            assert!((a - b).abs() < 1e-12, "asymmetry at k={k}");
        }
    }

    #[test]
    fn test_hypergeom_sf_matches_pmf_differences() {
        let (pop, succ, draws) = (500u64, 200u64, 60u64);
        for k in 0..draws.min(succ) {
            let diff = hypergeom_sf(k, pop, succ, draws) - hypergeom_sf(k + 1, pop, succ, draws);
            assert!(
                (diff - hypergeom_pmf(k, pop, succ, draws)).abs() < 1e-9,
                "mismatch at k={k}"
            );
        }
    }

    #[test]
    fn test_hypergeom_sf_support_edges() {
        // Full draw pins the count to succ.
        assert_eq!(hypergeom_sf(3, 10, 3, 10), 1.0);
        assert_eq!(hypergeom_sf(4, 10, 3, 10), 0.0);
        // Forced successes: drawing 9 of 10 with 5 successes leaves at
        // least 4 in the sample.
        assert_eq!(hypergeom_sf(4, 10, 5, 9), 1.0);
    }

    #[test]
    fn test_hypergeom_lopsided_population() {
        // succ and pop-succ differ by orders of magnitude.
        let s = hypergeom_sf(1, 10_000_000, 10, 1000);
        assert!(s > 0.0 && s < 1.0);
        let total: f64 = (0..=10u64).map(|k| hypergeom_pmf(k, 10_000_000, 10, 1000)).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
