use crate::models::round1;

/// Ecosystem-local percentile for every score in a batch.
///
/// A package's percentile is the share of the batch scoring at or below
/// it, times 100, rounded to one decimal. Equal scores share a
/// percentile. The result is aligned with the input order.
pub fn percentile_ranks(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;

    scores
        .iter()
        .map(|score| {
            let at_or_below = sorted.partition_point(|other| other <= score);
            round1(at_or_below as f64 / n * 100.0)
        })
        .collect()
}
