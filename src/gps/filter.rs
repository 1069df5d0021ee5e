//! # GPS Median Filter
//!
//! Smooths coordinate pairs with a per-component median over the last N fixes.
//!
//! A pair where either component is exactly zero is what the receivers report
//! without a fix, so it is ignored entirely rather than treated as a position.
//!
//! ## Usage
//!
//! ```
//! use fcb_groundlink::gps::GpsFilter;
//!
//! let mut filter = GpsFilter::new(10);
//! filter.update(0.0, 5.0); // no fix, ignored
//! assert!(!filter.has_fix());
//!
//! filter.update(42.0, -71.0);
//! assert!(filter.has_fix());
//! assert_eq!(filter.filtered(), (42.0, -71.0));
//! ```

use std::collections::VecDeque;

/// Default number of fixes kept for the median
pub const DEFAULT_HISTORY_LEN: usize = 10;

/// Position sources tracked by the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpsSource {
    /// Flight-controller board GPS
    Vehicle,
    /// Ground-station GPS
    GroundStation,
}

/// Bounded-history median filter for a single position source
#[derive(Debug, Clone)]
pub struct GpsFilter {
    history: VecDeque<(f64, f64)>,
    capacity: usize,
    has_fix: bool,
}

impl Default for GpsFilter {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl GpsFilter {
    /// Create a filter keeping at most `capacity` fixes (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            has_fix: false,
        }
    }

    /// Feed a raw coordinate pair
    pub fn update(&mut self, lat: f64, lon: f64) {
        if lat == 0.0 || lon == 0.0 {
            return;
        }

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back((lat, lon));
        self.has_fix = true;
    }

    /// Per-component median of the buffered fixes, `(0, 0)` before any fix
    pub fn filtered(&self) -> (f64, f64) {
        if self.history.is_empty() {
            return (0.0, 0.0);
        }

        let lats: Vec<f64> = self.history.iter().map(|&(lat, _)| lat).collect();
        let lons: Vec<f64> = self.history.iter().map(|&(_, lon)| lon).collect();
        (median(lats), median(lons))
    }

    /// Whether any valid fix has been received since creation or the last reset
    pub fn has_fix(&self) -> bool {
        self.has_fix
    }

    /// Number of buffered fixes
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Drop all history and the fix flag
    pub fn reset(&mut self) {
        self.history.clear();
        self.has_fix = false;
    }
}

/// Median of a non-empty sample; even-sized samples average the two middle values
fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_returns_origin() {
        let filter = GpsFilter::default();
        assert_eq!(filter.filtered(), (0.0, 0.0));
        assert!(!filter.has_fix());
        assert!(filter.is_empty());
    }

    #[test]
    fn test_zero_component_is_ignored() {
        let mut filter = GpsFilter::default();
        filter.update(0.0, 5.0);
        filter.update(5.0, 0.0);
        assert!(!filter.has_fix());
        assert_eq!(filter.len(), 0);

        filter.update(1.0, 2.0);
        filter.update(0.0, 0.0);
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.filtered(), (1.0, 2.0));
    }

    #[test]
    fn test_eviction_keeps_latest_ten() {
        let mut filter = GpsFilter::new(10);
        for i in 1..=11 {
            filter.update(i as f64, -(i as f64) * 10.0);
        }

        assert_eq!(filter.len(), 10);
        // Remaining lats are 2..=11, median = (6 + 7) / 2
        let (lat, lon) = filter.filtered();
        assert_eq!(lat, 6.5);
        assert_eq!(lon, -65.0);
    }

    #[test]
    fn test_median_rejects_single_outlier() {
        let mut filter = GpsFilter::new(5);
        for _ in 0..4 {
            filter.update(42.0, -71.0);
        }
        filter.update(89.0, 179.0);
        assert_eq!(filter.filtered(), (42.0, -71.0));
    }

    #[test]
    fn test_reset_clears_fix() {
        let mut filter = GpsFilter::default();
        filter.update(42.0, -71.0);
        filter.reset();
        assert!(!filter.has_fix());
        assert_eq!(filter.filtered(), (0.0, 0.0));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut filter = GpsFilter::new(0);
        filter.update(1.0, 1.0);
        filter.update(2.0, 2.0);
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.filtered(), (2.0, 2.0));
    }
}
