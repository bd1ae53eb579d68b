use crate::data::PriceSeries;
use crate::error::Result;
use crate::strategy::{rolling_signals, sma, validate_params, SignalSeries, Strategy, WindowScore};

//buy low, sell high against a trailing moving average
//goes long when the close sits more than threshold below the average
//goes short when it sits more than threshold above it
#[derive(Debug, Clone)]
pub struct DeviationStrategy {
    lookback: usize,
    threshold: f64,
}

impl DeviationStrategy {
    pub fn new(lookback: usize, threshold: f64) -> Result<Self> {
        validate_params(lookback, threshold)?;
        Ok(DeviationStrategy {
            lookback,
            threshold,
        })
    }
}

//percentage deviation of the last close in the window from the window mean
fn score_window(window: &[f64]) -> WindowScore {
    let close = window[window.len() - 1];
    let average = sma(window).unwrap_or(0.0);

    let score = if average == 0.0 {
        None
    } else {
        Some((close - average) / average)
    };

    WindowScore {
        indicator: average,
        score,
    }
}

impl Strategy for DeviationStrategy {
    fn generate(&self, prices: &PriceSeries) -> Result<SignalSeries> {
        rolling_signals(prices, self.lookback, self.threshold, score_window)
    }

    fn name(&self) -> &str {
        "MA Deviation"
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
    use crate::error::{BacktestError, ErrorKind};
    use crate::strategy::{Signal, SignalStatus};
    use approx::assert_relative_eq;

    #[test]
    fn hand_computed_scenario() {
        let prices = PriceSeries::from_closes("T", &[100.0, 101.0, 99.0, 95.0, 110.0]);
        let signals = DeviationStrategy::new(3, 0.02)
            .unwrap()
            .generate(&prices)
            .unwrap();

        assert_eq!(signals.values(), vec![0, 0, 0, 1, -1]);
        assert_eq!(signals.warm_up_len(), 2);

        let points = signals.points();
        assert_relative_eq!(points[2].indicator.unwrap(), 100.0);
        assert_relative_eq!(points[2].score.unwrap(), -0.01, epsilon = 1e-12);
        assert_relative_eq!(points[3].indicator.unwrap(), 295.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(points[4].score.unwrap(), (110.0 - 304.0 / 3.0) / (304.0 / 3.0), epsilon = 1e-12);
    }

    #[test]
    fn exact_threshold_deviation_holds() {
        //mean 80 puts both closes exactly 25% away from it
        let strategy = DeviationStrategy::new(2, 0.25).unwrap();

        let down = strategy.generate(&PriceSeries::from_closes("T", &[100.0, 60.0])).unwrap();
        assert_eq!(down.points()[1].score, Some(-0.25));
        assert_eq!(down.points()[1].signal, Signal::Hold);

        let up = strategy.generate(&PriceSeries::from_closes("T", &[60.0, 100.0])).unwrap();
        assert_eq!(up.points()[1].score, Some(0.25));
        assert_eq!(up.points()[1].signal, Signal::Hold);

        let tighter = DeviationStrategy::new(2, 0.24).unwrap();
        let down = tighter.generate(&PriceSeries::from_closes("T", &[100.0, 60.0])).unwrap();
        assert_eq!(down.points()[1].signal, Signal::Long);
    }

    #[test]
    fn zero_average_is_flagged_degenerate() {
        let prices = PriceSeries::from_closes("T", &[0.0, 0.0, 5.0]);
        let signals = DeviationStrategy::new(2, 0.01).unwrap().generate(&prices).unwrap();

        assert_eq!(signals.points()[1].status, SignalStatus::Degenerate);
        assert_eq!(signals.points()[1].signal, Signal::Hold);
        assert_eq!(signals.points()[2].status, SignalStatus::Ready);
        assert_eq!(signals.degenerate_indices(), vec![1]);
    }

    #[test]
    fn series_shorter_than_lookback_fails() {
        let prices = PriceSeries::from_closes("T", &[100.0, 101.0]);
        let err = DeviationStrategy::new(3, 0.01).unwrap().generate(&prices).unwrap_err();

        assert_eq!(
            err,
            BacktestError::InsufficientData {
                required: 3,
                available: 2
            }
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn series_of_exactly_lookback_signals_last_bar_only() {
        let prices = PriceSeries::from_closes("T", &[100.0, 100.0, 90.0]);
        let signals = DeviationStrategy::new(3, 0.01).unwrap().generate(&prices).unwrap();

        assert_eq!(signals.warm_up_len(), 2);
        assert_eq!(signals.values(), vec![0, 0, 1]);
    }

    #[test]
    fn constructor_validates() {
        assert!(DeviationStrategy::new(1, 0.01).is_err());
        assert!(DeviationStrategy::new(5, -0.5).is_err());
    }
}
