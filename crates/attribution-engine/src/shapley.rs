//! Exact Shapley values by coalition enumeration.
//!
//! For each feature coalition, the decision function is evaluated on a
//! blended input that takes coalition members from the actual input and the
//! rest from the baseline. The resulting per-feature values sum to
//! `f(input) − f(baseline)`.

/// Compute exact Shapley values for `input` against `baseline` under the
/// decision function `f`, laid out in the model's trained ordering.
///
/// Returns `None` when the function declines to evaluate (no continuous
/// output) or when input and baseline disagree in length. Cost is
/// `O(2^n)` evaluations; callers bound `n`.
pub fn shapley_values<F>(f: F, input: &[f64], baseline: &[f64]) -> Option<Vec<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let n = input.len();
    if n == 0 || baseline.len() != n {
        return None;
    }

    // Evaluate every coalition once; bit i of the mask selects input[i].
    let mut coalition_value = Vec::with_capacity(1usize << n);
    let mut blended = vec![0.0; n];
    for mask in 0..(1usize << n) {
        for i in 0..n {
            blended[i] = if mask & (1 << i) != 0 {
                input[i]
            } else {
                baseline[i]
            };
        }
        coalition_value.push(f(&blended)?);
    }

    let factorial: Vec<f64> = (0..=n)
        .scan(1.0, |acc, k| {
            if k > 0 {
                *acc *= k as f64;
            }
            Some(*acc)
        })
        .collect();

    let mut values = vec![0.0; n];
    for (i, value) in values.iter_mut().enumerate() {
        let bit = 1usize << i;
        for mask in 0..(1usize << n) {
            if mask & bit != 0 {
                continue;
            }
            let size = mask.count_ones() as usize;
            let weight = factorial[size] * factorial[n - size - 1] / factorial[n];
            *value += weight * (coalition_value[mask | bit] - coalition_value[mask]);
        }
    }

    Some(values)
}
