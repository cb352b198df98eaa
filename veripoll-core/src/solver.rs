/// Round-size solver: inverts an engine's stopping-probability function to
/// find a round size that reaches a target probability.
///
/// The search brackets with exponentially growing upper bounds from a fixed
/// probe start, then binary-searches inside the bracket and resolves the
/// final adjacent pair, so a given (engine, contest, target) always yields
/// the same recommendation. The stopping probability is treated as
/// non-decreasing in the round size under the reported-truth assumption;
/// the small sawtooth the stopping counts induce is absorbed by the
/// deterministic trajectory.
use crate::error::{NumericError, SolverError};

/// First upper bound probed when the caller's limit allows it.
const PROBE_START: u64 = 10_000;

/// Hard ceiling on bracket growth.
const PROBE_LIMIT: u64 = 10_000_000;

/// Find a round size in `[lo, hi]` whose stopping probability reaches
/// `target`.
///
/// `sprob(n)` evaluates the stopping probability of a prospective round of
/// size `n`; a point that fails numerically is treated as unable to stop
/// and the bracket keeps widening. Returns
/// [`SolverError::Unattainable`] with the best probability seen when the
/// bracket is exhausted, and [`SolverError::Indeterminate`] when no point
/// could be evaluated at all.
pub fn next_round_size<F>(
    mut sprob: F,
    lo: u64,
    hi: u64,
    target: f64,
) -> Result<u64, SolverError>
where
    F: FnMut(u64) -> Result<f64, NumericError>,
{
    if lo > hi || hi == 0 {
        return Err(SolverError::Unattainable { max: hi, best: 0.0 });
    }
    let lo = lo.max(1);

    let mut best = 0.0_f64;
    let mut evaluated = false;
    let mut eval = |n: u64| -> f64 {
        match sprob(n) {
            Ok(p) => {
                evaluated = true;
                if p > best {
                    best = p;
                }
                p
            }
            Err(_) => 0.0,
        }
    };

    let mut upper = {
        let mut u = PROBE_START;
        while u <= lo {
            u = u.saturating_mul(2);
        }
        u.min(hi)
    };
    let mut first = true;
    loop {
        let left = if first { lo } else { (upper / 2).max(lo) };
        if let Some(n) = bisect(&mut eval, left, upper, target) {
            return Ok(n);
        }
        if upper >= hi || upper >= PROBE_LIMIT {
            break;
        }
        upper = upper.saturating_mul(2).min(hi);
        first = false;
    }
    if !evaluated {
        return Err(SolverError::Indeterminate);
    }
    Err(SolverError::Unattainable { max: hi, best })
}

/// Binary search for a round size in `[left, right]` meeting the target,
/// resolving the final adjacent pair explicitly.
fn bisect(eval: &mut impl FnMut(u64) -> f64, left: u64, right: u64, target: f64) -> Option<u64> {
    if left > right {
        return None;
    }
    let (mut left, mut right) = (left, right);
    loop {
        let mid = left + (right - left) / 2;
        if right - left <= 1 {
            if eval(mid) >= target {
                return Some(mid);
            }
            if mid + 1 <= right && eval(mid + 1) >= target {
                return Some(mid + 1);
            }
            return None;
        }
        if eval(mid) >= target {
            right = mid;
        } else {
            left = mid;
        }
    }
}
