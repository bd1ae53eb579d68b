use crate::data::PriceSeries;
use crate::error::Result;
use crate::strategy::{rolling_signals, sma, validate_params, SignalSeries, Strategy, WindowScore};
use statrs::statistics::Statistics;

//z-score mean reversion strategy
//measures the distance from the trailing mean in window standard deviations
//long when oversold, short when overbought
#[derive(Debug, Clone)]
pub struct ZScoreStrategy {
    lookback: usize,
    threshold: f64,
}

impl ZScoreStrategy {
    pub fn new(lookback: usize, threshold: f64) -> Result<Self> {
        validate_params(lookback, threshold)?;
        Ok(ZScoreStrategy {
            lookback,
            threshold,
        })
    }
}

fn score_window(window: &[f64]) -> WindowScore {
    let close = window[window.len() - 1];
    let average = sma(window).unwrap_or(0.0);

    //sample standard deviation (n - 1)
    let std_dev = window.std_dev();

    let score = if std_dev == 0.0 || !std_dev.is_finite() {
        None
    } else {
        Some((close - average) / std_dev)
    };

    WindowScore {
        indicator: average,
        score,
    }
}

impl Strategy for ZScoreStrategy {
    fn generate(&self, prices: &PriceSeries) -> Result<SignalSeries> {
        rolling_signals(prices, self.lookback, self.threshold, score_window)
    }

    fn name(&self) -> &str {
        "Z-Score Reversion"
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Signal, SignalStatus};
    use approx::assert_relative_eq;

    #[test]
    fn scores_in_standard_deviations() {
        //window [1, 2, 3]: mean 2, sample std 1, last close one std above
        let prices = PriceSeries::from_closes("T", &[1.0, 2.0, 3.0]);
        let signals = ZScoreStrategy::new(3, 0.5).unwrap().generate(&prices).unwrap();

        let last = signals.points()[2];
        assert_relative_eq!(last.score.unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(last.signal, Signal::Short);
    }

    #[test]
    fn boundary_score_holds() {
        let prices = PriceSeries::from_closes("T", &[3.0, 2.0, 1.0]);
        let signals = ZScoreStrategy::new(3, 1.0).unwrap().generate(&prices).unwrap();

        assert_relative_eq!(signals.points()[2].score.unwrap(), -1.0, epsilon = 1e-12);
        assert_eq!(signals.points()[2].signal, Signal::Hold);
    }

    #[test]
    fn flat_window_is_degenerate() {
        let prices = PriceSeries::from_closes("T", &[50.0, 50.0, 50.0, 40.0]);
        let signals = ZScoreStrategy::new(3, 1.0).unwrap().generate(&prices).unwrap();

        assert_eq!(signals.points()[2].status, SignalStatus::Degenerate);
        assert_eq!(signals.points()[3].status, SignalStatus::Ready);
        assert_eq!(signals.points()[3].signal, Signal::Long);
    }
}
