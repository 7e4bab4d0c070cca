use itertools::Itertools;

use crate::config::ForecasterKind;

/// Predicts aggregate community load from the observed history.
pub trait LoadForecaster: Send + Sync {
    /// Forecast for the next `horizon` steps. `history` is oldest first; an
    /// empty history yields an empty forecast.
    fn forecast(&self, history: &[f64], horizon: usize) -> Vec<f64>;

    fn name(&self) -> &'static str;
}

/// Repeats the most recent observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistenceForecaster;

impl LoadForecaster for PersistenceForecaster {
    fn forecast(&self, history: &[f64], horizon: usize) -> Vec<f64> {
        match history.last() {
            Some(&last) => vec![last; horizon],
            None => Vec::new(),
        }
    }

    fn name(&self) -> &'static str {
        "persistence"
    }
}

/// Least-squares line through the last `window` observations, extrapolated.
#[derive(Debug, Clone, Copy)]
pub struct LinearTrendForecaster {
    window: usize,
}

impl LinearTrendForecaster {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(2) }
    }
}

impl Default for LinearTrendForecaster {
    fn default() -> Self {
        Self::new(6)
    }
}

impl LoadForecaster for LinearTrendForecaster {
    fn forecast(&self, history: &[f64], horizon: usize) -> Vec<f64> {
        let recent = &history[history.len().saturating_sub(self.window)..];
        if recent.len() < 2 {
            return PersistenceForecaster.forecast(recent, horizon);
        }

        let n = recent.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = recent.iter().sum::<f64>() / n;
        let (sxy, sxx) = recent
            .iter()
            .enumerate()
            .map(|(i, y)| {
                let dx = i as f64 - x_mean;
                (dx * (y - y_mean), dx * dx)
            })
            .fold((0.0, 0.0), |(a, b), (c, d)| (a + c, b + d));
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

        (1..=horizon)
            .map(|k| (y_mean + slope * (n - 1.0 - x_mean + k as f64)).max(0.0))
            .collect_vec()
    }

    fn name(&self) -> &'static str {
        "linear_trend"
    }
}

pub fn forecaster_for(kind: ForecasterKind) -> Box<dyn LoadForecaster> {
    match kind {
        ForecasterKind::Persistence => Box::new(PersistenceForecaster),
        ForecasterKind::LinearTrend => Box::new(LinearTrendForecaster::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_repeats_last() {
        assert_eq!(PersistenceForecaster.forecast(&[3.0, 4.0], 3), vec![4.0; 3]);
        assert!(PersistenceForecaster.forecast(&[], 3).is_empty());
    }

    #[test]
    fn test_linear_trend_extrapolates() {
        let f = LinearTrendForecaster::new(4).forecast(&[9.0, 1.0, 2.0, 3.0, 4.0], 2);
        assert!((f[0] - 5.0).abs() < 1e-9);
        assert!((f[1] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_trend_short_history_falls_back() {
        assert_eq!(LinearTrendForecaster::default().forecast(&[7.0], 2), vec![7.0, 7.0]);
    }

    #[test]
    fn test_linear_trend_never_negative() {
        let f = LinearTrendForecaster::new(3).forecast(&[4.0, 2.0, 0.5], 3);
        assert!(f.iter().all(|v| *v >= 0.0));
    }
}
