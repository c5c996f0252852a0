//! Change score between consecutive grids

use crate::IntensityGrid;

/// Mean absolute luma difference between `current` and `previous`.
///
/// Returns 0 when there is no previous grid or when the dimensions differ
/// (the region was resized). In both cases the caller keeps `current` as the
/// new baseline.
pub fn change_score(current: &IntensityGrid, previous: Option<&IntensityGrid>) -> f64 {
    let previous = match previous {
        Some(p) if p.dimensions() == current.dimensions() => p,
        _ => return 0.0,
    };
    if current.is_empty() {
        return 0.0;
    }

    let total: u64 = current
        .iter()
        .zip(previous.iter())
        .map(|(&a, &b)| a.abs_diff(b) as u64)
        .sum();

    total as f64 / current.len() as f64
}
