//! Trend estimation over a period [`TimeSeries`].
//!
//! Both strategies extrapolate from the full history on every call; the
//! history itself is returned untouched alongside the predictions.

use crate::error::{Result, TrackerError};
use crate::pipeline::{Observation, TimeSeries};
use crate::util::{average, days_diff};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ForecastStrategy {
    /// Least-squares line over days since the first observed period.
    LinearTrend,
    /// Flat projection of the mean of the last `window` periods. A window
    /// of 0 is treated as 1; `Config` rejects it before it gets here.
    MovingAverage { window: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub strategy: ForecastStrategy,
    pub history: TimeSeries,
    pub predicted: Vec<Observation>,
    pub fit: Option<LinearFit>,
}

impl Forecast {
    pub fn start(&self) -> Option<Observation> {
        self.predicted.first().cloned()
    }

    pub fn predicted_total(&self) -> f64 {
        self.predicted.iter().map(|p| p.value).sum()
    }
}

/// Ordinary least squares for a single feature. Degenerate inputs (one
/// point, or all x equal) yield a flat line through the mean of `y`.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return None;
    }
    let mean_x = average(&xs[..n])?;
    let mean_y = average(&ys[..n])?;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, y) in xs.iter().zip(ys).take(n) {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x).powi(2);
    }
    let slope = if sxx.abs() < f64::EPSILON { 0.0 } else { sxy / sxx };
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Project `history` forward by `horizon` periods.
pub fn forecast(history: &TimeSeries, strategy: ForecastStrategy, horizon: usize) -> Result<Forecast> {
    let (Some(first), Some(last)) = (history.points.first(), history.points.last()) else {
        return Err(TrackerError::EmptyHistory);
    };

    let mut future = Vec::with_capacity(horizon);
    let mut period = last.period;
    for _ in 0..horizon {
        period = history.period.next(period);
        future.push(period);
    }

    let (predicted, fit) = match strategy {
        ForecastStrategy::MovingAverage { window } => {
            let values = history.values();
            let take = window.max(1).min(values.len());
            let mean = average(&values[values.len() - take..]).ok_or(TrackerError::EmptyHistory)?;
            debug!("Moving average over last {} periods: {:.3}", take, mean);
            let predicted = future
                .into_iter()
                .map(|period| Observation { period, value: mean })
                .collect();
            (predicted, None)
        }
        ForecastStrategy::LinearTrend => {
            let xs: Vec<f64> = history
                .points
                .iter()
                .map(|p| days_diff(first.period, p.period))
                .collect();
            let ys = history.values();
            let fit = fit_line(&xs, &ys).ok_or(TrackerError::EmptyHistory)?;
            debug!(
                "Linear trend fit: slope {:.4}/day, intercept {:.3}",
                fit.slope, fit.intercept
            );
            let predicted = future
                .into_iter()
                .map(|period| Observation {
                    period,
                    value: fit.predict(days_diff(first.period, period)),
                })
                .collect();
            (predicted, Some(fit))
        }
    };

    Ok(Forecast {
        strategy,
        history: history.clone(),
        predicted,
        fit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Period;
    use chrono::NaiveDate;

    fn monthly(values: &[f64]) -> TimeSeries {
        let mut period = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut points = Vec::new();
        for v in values {
            points.push(Observation { period, value: *v });
            period = Period::Month.next(period);
        }
        TimeSeries::new(Period::Month, points)
    }

    fn daily(values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| Observation {
                period: start + chrono::Duration::days(i as i64),
                value: *v,
            })
            .collect();
        TimeSeries::new(Period::Day, points)
    }

    #[test]
    fn moving_average_of_last_four() {
        let f = forecast(
            &monthly(&[10.0, 20.0, 15.0, 25.0]),
            ForecastStrategy::MovingAverage { window: 4 },
            2,
        )
        .unwrap();
        assert_eq!(f.predicted.len(), 2);
        assert!(f.predicted.iter().all(|p| p.value == 17.5));
        assert_eq!(f.predicted[0].period, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(f.predicted[1].period, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn moving_average_uses_shorter_history() {
        let f = forecast(&monthly(&[4.0, 8.0]), ForecastStrategy::MovingAverage { window: 4 }, 3).unwrap();
        assert!(f.predicted.iter().all(|p| p.value == 6.0));

        let f = forecast(
            &monthly(&[100.0, 1.0, 2.0, 3.0, 6.0]),
            ForecastStrategy::MovingAverage { window: 4 },
            1,
        )
        .unwrap();
        assert_eq!(f.predicted[0].value, 3.0);
    }

    #[test]
    fn empty_history_is_rejected() {
        let empty = TimeSeries::new(Period::Month, Vec::new());
        for strategy in [ForecastStrategy::LinearTrend, ForecastStrategy::MovingAverage { window: 4 }] {
            assert!(matches!(forecast(&empty, strategy, 4), Err(TrackerError::EmptyHistory)));
        }
    }

    #[test]
    fn constant_history_gives_flat_linear_forecast() {
        let f = forecast(&daily(&[7.0, 7.0, 7.0, 7.0]), ForecastStrategy::LinearTrend, 5).unwrap();
        let fit = f.fit.unwrap();
        assert_eq!(fit.slope, 0.0);
        assert!(f.predicted.iter().all(|p| (p.value - 7.0).abs() < 1e-9));
    }

    #[test]
    fn linear_forecast_follows_slope_sign() {
        let up = forecast(&daily(&[1.0, 3.0, 2.0, 5.0, 6.0]), ForecastStrategy::LinearTrend, 120).unwrap();
        assert_eq!(up.predicted.len(), 120);
        assert!(up.fit.unwrap().slope > 0.0);
        assert!(up.predicted.windows(2).all(|w| w[1].value > w[0].value));
        assert_eq!(up.predicted[0].period, NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());

        let down = forecast(&daily(&[9.0, 7.0, 8.0, 4.0]), ForecastStrategy::LinearTrend, 10).unwrap();
        assert!(down.fit.unwrap().slope < 0.0);
        assert!(down.predicted.windows(2).all(|w| w[1].value < w[0].value));
    }

    #[test]
    fn exact_line_is_recovered() {
        let fit = fit_line(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        let single = fit_line(&[4.0], &[9.0]).unwrap();
        assert_eq!(single, LinearFit { slope: 0.0, intercept: 9.0 });
    }

    #[test]
    fn history_is_not_mutated_and_zero_horizon_is_empty() {
        let history = monthly(&[1.0, 2.0]);
        let f = forecast(&history, ForecastStrategy::LinearTrend, 0).unwrap();
        assert!(f.predicted.is_empty());
        assert_eq!(f.history, history);
    }
}
