//! ADX trend-exhaustion predicate.
//!
//! The trail only surrenders a touched stop when the trend is actually
//! dying: the most recent ADX below a threshold *and* strictly declining
//! over the last `k` steps. Ties count as not-declining.

/// True iff the last `k + 1` values of `history` are strictly decreasing
/// and the final one is below `threshold`. `history` must not include the
/// current bar. Shorter histories return false (the filter blocks the
/// exit rather than guessing).
pub fn trend_exhausted(history: &[f64], threshold: f64, k: usize) -> bool {
    let n = history.len();
    if n < k + 1 {
        return false;
    }
    let tail = &history[n - (k + 1)..];
    if tail[k] >= threshold {
        return false;
    }
    tail.windows(2).all(|w| w[1] < w[0])
}
