pub mod deviation;
pub mod zscore;

use crate::data::PriceSeries;
use crate::error::{BacktestError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

//discrete trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Short,
    Hold,
    Long,
}

impl Signal {
    //numeric form in {-1, 0, +1}
    pub fn value(self) -> i8 {
        match self {
            Signal::Short => -1,
            Signal::Hold => 0,
            Signal::Long => 1,
        }
    }

    //maps a deviation score onto a signal
    //below -threshold goes long, above +threshold goes short
    //the closed interval [-threshold, threshold] holds, nan holds
    pub fn from_score(score: f64, threshold: f64) -> Signal {
        if score < -threshold {
            Signal::Long
        } else if score > threshold {
            Signal::Short
        } else {
            Signal::Hold
        }
    }
}

//why a signal point has the value it has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStatus {
    //not enough history for a full window, held flat
    WarmUp,
    //window divisor was zero, held flat
    Degenerate,
    //computed from a full window
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub signal: Signal,
    pub status: SignalStatus,
    //moving average of the window ending at this index
    pub indicator: Option<f64>,
    //deviation score compared against the threshold
    pub score: Option<f64>,
}

impl SignalPoint {
    fn warm_up() -> Self {
        SignalPoint {
            signal: Signal::Hold,
            status: SignalStatus::WarmUp,
            indicator: None,
            score: None,
        }
    }
}

//signals index-aligned with the price series they were computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    points: Vec<SignalPoint>,
}

impl SignalSeries {
    pub fn new(points: Vec<SignalPoint>) -> Self {
        SignalSeries { points }
    }

    //builds a series of ready points from raw signals
    pub fn from_signals(signals: &[Signal]) -> Self {
        let points = signals
            .iter()
            .map(|&signal| SignalPoint {
                signal,
                status: SignalStatus::Ready,
                indicator: None,
                score: None,
            })
            .collect();
        SignalSeries { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SignalPoint] {
        &self.points
    }

    pub fn get(&self, i: usize) -> Option<&SignalPoint> {
        self.points.get(i)
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.points.iter().map(|p| p.signal).collect()
    }

    //signals as integers in {-1, 0, +1}
    pub fn values(&self) -> Vec<i8> {
        self.points.iter().map(|p| p.signal.value()).collect()
    }

    //number of leading warm-up points
    pub fn warm_up_len(&self) -> usize {
        self.points
            .iter()
            .take_while(|p| p.status == SignalStatus::WarmUp)
            .count()
    }

    //indices where the divisor vanished and hold was substituted
    pub fn degenerate_indices(&self) -> Vec<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.status == SignalStatus::Degenerate)
            .map(|(i, _)| i)
            .collect()
    }
}

//signal generator interface that all strategies must implement
//implementations are pure functions of the price series and their parameters
pub trait Strategy: Send + Sync {
    //computes one signal per price, aligned by index
    fn generate(&self, prices: &PriceSeries) -> Result<SignalSeries>;

    //returns the strategy name
    fn name(&self) -> &str;

    //window length
    fn lookback(&self) -> usize;

    //deviation threshold
    fn threshold(&self) -> f64;
}

//helper function to calculate simple moving average
pub fn sma(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().sum::<f64>() / prices.len() as f64)
}

//checks the parameters shared by the windowed strategies
pub fn validate_params(lookback: usize, threshold: f64) -> Result<()> {
    if lookback < 2 {
        return Err(BacktestError::InvalidParameter(format!(
            "lookback must be at least 2, got {}",
            lookback
        )));
    }
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(BacktestError::InvalidParameter(format!(
            "threshold must be finite and non-negative, got {}",
            threshold
        )));
    }
    Ok(())
}

//outcome of scoring one full window
pub(crate) struct WindowScore {
    pub indicator: f64,
    //none when the score divisor is zero
    pub score: Option<f64>,
}

//runs a window scorer over every full trailing window of closes
//the first lookback - 1 indices are flagged as warm-up
pub(crate) fn rolling_signals<F>(
    prices: &PriceSeries,
    lookback: usize,
    threshold: f64,
    scorer: F,
) -> Result<SignalSeries>
where
    F: Fn(&[f64]) -> WindowScore,
{
    validate_params(lookback, threshold)?;

    let closes = prices.closes();
    if closes.len() < lookback {
        return Err(BacktestError::InsufficientData {
            required: lookback,
            available: closes.len(),
        });
    }

    let mut points = Vec::with_capacity(closes.len());
    points.extend(std::iter::repeat(SignalPoint::warm_up()).take(lookback - 1));

    for window in closes.windows(lookback) {
        let scored = scorer(window);
        let point = match scored.score {
            Some(score) => SignalPoint {
                signal: Signal::from_score(score, threshold),
                status: SignalStatus::Ready,
                indicator: Some(scored.indicator),
                score: Some(score),
            },
            None => SignalPoint {
                signal: Signal::Hold,
                status: SignalStatus::Degenerate,
                indicator: Some(scored.indicator),
                score: None,
            },
        };
        points.push(point);
    }

    let series = SignalSeries::new(points);
    let degenerate = series.degenerate_indices();
    if !degenerate.is_empty() {
        debug!(
            symbol = prices.symbol(),
            count = degenerate.len(),
            first = degenerate[0],
            "zero divisor windows held flat"
        );
    }

    Ok(series)
}
