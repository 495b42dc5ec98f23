// Rolling helpfulness trend

use std::collections::VecDeque;

use super::types::Trend;

/// Half-window difference below which the trend is stable
const TREND_THRESHOLD: f64 = 0.05;

/// Rolling window of helpful (1.0) / unhelpful (0.0) ratings
pub struct HelpfulnessTrend {
    recent: VecDeque<f64>,
    window_size: usize,
}

impl HelpfulnessTrend {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            recent: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    pub fn record(&mut self, helpful: bool) {
        if self.recent.len() >= self.window_size {
            self.recent.pop_front();
        }
        self.recent.push_back(if helpful { 1.0 } else { 0.0 });
    }

    pub fn helpful_rate(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        self.recent.iter().sum::<f64>() / self.recent.len() as f64
    }

    /// Compare the older half of the window with the newer half
    pub fn trend(&self) -> Trend {
        if self.recent.len() < 4 {
            return Trend::Stable;
        }

        let mid = self.recent.len() / 2;
        let first_avg = self.recent.iter().take(mid).sum::<f64>() / mid as f64;
        let second_avg =
            self.recent.iter().skip(mid).sum::<f64>() / (self.recent.len() - mid) as f64;

        let diff = second_avg - first_avg;
        if diff > TREND_THRESHOLD {
            Trend::Improving
        } else if diff < -TREND_THRESHOLD {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_stable() {
        let trend = HelpfulnessTrend::new(10);
        assert_eq!(trend.helpful_rate(), 0.0);
        assert_eq!(trend.trend(), Trend::Stable);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut trend = HelpfulnessTrend::new(3);
        trend.record(false);
        trend.record(true);
        trend.record(true);
        trend.record(true);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend.helpful_rate(), 1.0);
    }

    #[test]
    fn test_improving_and_declining() {
        let mut trend = HelpfulnessTrend::new(10);
        for helpful in [false, false, true, false, true, true, true, true] {
            trend.record(helpful);
        }
        assert_eq!(trend.trend(), Trend::Improving);

        let mut trend = HelpfulnessTrend::new(10);
        for helpful in [true, true, true, true, false, true, false, false] {
            trend.record(helpful);
        }
        assert_eq!(trend.trend(), Trend::Declining);
    }

    #[test]
    fn test_steady_ratings_are_stable() {
        let mut trend = HelpfulnessTrend::new(10);
        for _ in 0..8 {
            trend.record(true);
        }
        assert_eq!(trend.trend(), Trend::Stable);
    }
}
