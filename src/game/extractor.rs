use std::ops::Range;

use ndarray::prelude::*;

/// Reads the mixed strategy held at `labels` of a value vector over the whole label universe.
///
/// The weights are normalized to sum to one. A support that is entirely zero falls back to the
/// uniform distribution over `labels`.
pub fn extract_strategy(values: &Array1<f64>, labels: Range<usize>) -> Array1<f64> {
    let weights = values.slice(s![labels]).to_owned();
    let total = weights.sum();
    if total == 0. {
        let len = weights.len();
        return Array1::from_elem(len, 1. / len as f64);
    }
    weights / total
}
