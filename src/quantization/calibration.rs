//! Range calibration for quantizers

use serde::{Deserialize, Serialize};

/// Running min/max over finite calibration values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationStats {
    min_val: Option<f64>,
    max_val: Option<f64>,
    sample_count: u64,
}

impl CalibrationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect a batch of values; NaN and infinities are skipped
    pub fn collect<'a, I>(&mut self, data: I)
    where
        I: IntoIterator<Item = &'a f64>,
    {
        for &value in data {
            if !value.is_finite() {
                continue;
            }
            self.min_val = Some(self.min_val.map_or(value, |m| m.min(value)));
            self.max_val = Some(self.max_val.map_or(value, |m| m.max(value)));
            self.sample_count += 1;
        }
    }

    /// `(min, max)` once at least one finite value was seen
    pub fn range(&self) -> Option<(f64, f64)> {
        match (self.min_val, self.max_val) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        }
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_batches() {
        let mut stats = CalibrationStats::new();
        stats.collect([1.0, f64::NAN, -2.0].iter());
        stats.collect([5.0].iter());
        assert_eq!(stats.range(), Some((-2.0, 5.0)));
        assert_eq!(stats.sample_count(), 3);
    }

    #[test]
    fn test_empty_has_no_range() {
        let stats = CalibrationStats::new();
        assert!(stats.range().is_none());
    }
}
