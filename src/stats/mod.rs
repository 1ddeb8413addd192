//! Summary statistics over samples collected from the posterior.
//!
//! All functions work on the observed sample only; none of them estimate
//! properties of the underlying distribution.

pub mod contour;

pub use contour::{ContourPath, hpd_contours};

/// Arithmetic mean; `NaN` for an empty sample.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median; the average of both middle values for even sample sizes.
///
/// # Example
/// ```
/// use cladewick::stats::median;
///
/// assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
/// assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
/// assert_eq!(median(&[]), None);
/// ```
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Highest posterior density interval containing `mass` of the sample.
///
/// Sorts the sample and slides a window of `round(mass * n)` values over
/// it, returning the narrowest window. On ties the lowest window wins.
///
/// # Returns
/// `None` if the sample is empty or the window would hold no value.
///
/// # Example
/// ```
/// use cladewick::stats::hpd_interval;
///
/// let heights = [1.0, 2.0, 2.0, 3.0, 100.0];
/// assert_eq!(hpd_interval(&heights, 0.8), Some((1.0, 3.0)));
/// ```
pub fn hpd_interval(values: &[f64], mass: f64) -> Option<(f64, f64)> {
    let n = values.len();
    let diff = (mass * n as f64).round() as usize;
    if n == 0 || diff == 0 {
        return None;
    }
    let diff = diff.min(n);
    let sorted = sorted(values);

    let mut best = 0;
    let mut min_range = f64::INFINITY;
    for i in 0..=(n - diff) {
        let range = (sorted[i + diff - 1] - sorted[i]).abs();
        if range < min_range {
            min_range = range;
            best = i;
        }
    }
    Some((sorted[best], sorted[best + diff - 1]))
}

/// `(min, max)` of the sample.
pub fn range(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Fraction of values below zero.
pub fn negative_probability(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|&&v| v < 0.0).count() as f64 / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); 0 for fewer than two values.
pub fn standard_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Empirical quantile with linear interpolation (R type 7).
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let h = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}
