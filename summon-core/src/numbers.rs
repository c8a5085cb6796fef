//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn count_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Widen a count to u64, saturating on exotic targets.
#[must_use]
pub fn count_to_u64(value: usize) -> u64 {
    cast::<usize, u64>(value).unwrap_or(u64::MAX)
}

/// Share of `part` in `whole`, 0.0 for an empty whole.
#[must_use]
pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    count_to_f64(part) / count_to_f64(whole)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_handles_empty_whole() {
        assert!(ratio(3, 0).abs() < f64::EPSILON);
        assert!((ratio(1, 4) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn counts_widen_losslessly() {
        assert_eq!(count_to_u64(7), 7);
        assert!((count_to_f64(1 << 20) - 1_048_576.0).abs() < f64::EPSILON);
    }
}
