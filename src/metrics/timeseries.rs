use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//hourly bars in a us equity session year, 252 days of 6.5 hours
pub const HOURLY_PERIODS_PER_YEAR: f64 = 252.0 * 6.5;

//a point in the equity curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub drawdown: f64,
    pub returns: f64,
}

impl EquityPoint {
    pub fn new(timestamp: DateTime<Utc>, equity: f64, drawdown: f64, returns: f64) -> Self {
        EquityPoint {
            timestamp,
            equity,
            drawdown,
            returns,
        }
    }
}

//compounds per-period returns into an equity multiple starting at 1.0
//equity_t = (1 + r_0) * ... * (1 + r_t)
pub fn equity_values(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |equity, r| {
            *equity *= 1.0 + r;
            Some(*equity)
        })
        .collect()
}

//calculates the equity curve with drawdowns
pub fn calculate_equity_curve(timestamps: &[DateTime<Utc>], returns: &[f64]) -> Vec<EquityPoint> {
    let equity = equity_values(returns);
    let mut curve = Vec::with_capacity(equity.len());
    let mut peak = f64::NEG_INFINITY;

    for ((&timestamp, &value), &ret) in timestamps.iter().zip(equity.iter()).zip(returns.iter()) {
        //update peak
        if value > peak {
            peak = value;
        }

        //calculate drawdown
        let drawdown = if peak > 0.0 {
            (peak - value) / peak
        } else {
            0.0
        };

        curve.push(EquityPoint::new(timestamp, value, drawdown, ret));
    }

    curve
}

//calculates maximum drawdown from equity curve
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    equity_curve
        .iter()
        .map(|point| point.drawdown)
        .fold(0.0, f64::max)
}

//annualized sharpe ratio of per-period returns
//zero when the standard deviation is zero or undefined
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();
    let std_dev = returns.std_dev();

    //dispersion below the rounding noise of the mean counts as zero
    if !std_dev.is_finite() || std_dev <= mean.abs() * f64::EPSILON {
        return 0.0;
    }

    (mean / std_dev) * periods_per_year.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn hours(n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|i| DateTime::<Utc>::default() + Duration::hours(i as i64))
            .collect()
    }

    #[test]
    fn equity_starts_at_one_and_compounds() {
        let equity = equity_values(&[0.0, 0.1, -0.5]);
        assert_eq!(equity[0], 1.0);
        assert_relative_eq!(equity[1], 1.1, epsilon = 1e-12);
        assert_relative_eq!(equity[2], 0.55, epsilon = 1e-12);
    }

    #[test]
    fn zero_returns_keep_equity_flat_and_sharpe_zero() {
        let returns = vec![0.0; 10];
        let curve = calculate_equity_curve(&hours(10), &returns);

        assert_eq!(curve.last().unwrap().equity, 1.0);
        assert_eq!(max_drawdown(&curve), 0.0);
        assert_eq!(sharpe_ratio(&returns, HOURLY_PERIODS_PER_YEAR), 0.0);
    }

    #[test]
    fn short_loss_beyond_total_gives_drawdown_above_one() {
        let curve = calculate_equity_curve(&hours(3), &[0.0, -1.228, 0.0]);

        assert_relative_eq!(curve[1].equity, -0.228, epsilon = 1e-12);
        assert_relative_eq!(curve[2].drawdown, 1.228, epsilon = 1e-12);
        assert!(max_drawdown(&curve) > 1.0);
    }

    #[test]
    fn constant_returns_have_zero_sharpe() {
        let sharpe = sharpe_ratio(&[0.125, 0.125, 0.125, 0.125], HOURLY_PERIODS_PER_YEAR);
        assert_eq!(sharpe, 0.0);
        assert!(!sharpe.is_nan());
    }

    #[test]
    fn too_few_returns_have_zero_sharpe() {
        assert_eq!(sharpe_ratio(&[], 252.0), 0.0);
        assert_eq!(sharpe_ratio(&[0.05], 252.0), 0.0);
    }

    #[test]
    fn sharpe_uses_sample_std_and_annualizes() {
        //mean 0.01, sample std 0.01
        let sharpe = sharpe_ratio(&[0.0, 0.01, 0.02], 252.0);
        assert_relative_eq!(sharpe, 252.0_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn increasing_curve_has_no_drawdown() {
        let curve = calculate_equity_curve(&hours(4), &[0.0, 0.01, 0.02, 0.005]);
        assert_eq!(max_drawdown(&curve), 0.0);
    }

    #[test]
    fn drawdown_is_measured_from_running_peak() {
        //equity 1.0, 1.2, 0.9, 1.08
        let curve = calculate_equity_curve(&hours(4), &[0.0, 0.2, -0.25, 0.2]);

        assert_relative_eq!(curve[2].drawdown, 0.25, epsilon = 1e-12);
        assert_relative_eq!(curve[3].drawdown, 0.1, epsilon = 1e-12);
        assert_relative_eq!(max_drawdown(&curve), 0.25, epsilon = 1e-12);
    }
}
