use crate::data::PriceSeries;
use crate::error::{BacktestError, Result};
use crate::portfolio::Position;
use crate::strategy::{Signal, SignalSeries};
use serde::{Deserialize, Serialize};

//positions and per-period returns, index-aligned with the price series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    positions: Vec<Position>,
    returns: Vec<f64>,
    trade_count: usize,
}

impl Simulation {
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    //positions as integers in {-1, 0, +1}
    pub fn position_values(&self) -> Vec<i8> {
        self.positions.iter().map(|p| p.value()).collect()
    }

    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    pub fn trade_count(&self) -> usize {
        self.trade_count
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

//checks every close is finite and strictly positive
pub fn validate_prices(closes: &[f64]) -> Result<()> {
    match closes
        .iter()
        .enumerate()
        .find(|&(_, &price)| !price.is_finite() || price <= 0.0)
    {
        Some((index, &price)) => Err(BacktestError::NonPositivePrice { index, price }),
        None => Ok(()),
    }
}

//applies the one-period execution lag
//the signal decided at the close of t-1 is held through period t
pub fn lag_signals(signals: &[Signal]) -> Vec<Position> {
    let mut positions = Vec::with_capacity(signals.len());
    if signals.is_empty() {
        return positions;
    }

    positions.push(Position::Flat);
    positions.extend(signals[..signals.len() - 1].iter().map(|&s| Position::from(s)));
    positions
}

//number of indices where the position differs from the previous one
pub fn count_transitions(positions: &[Position]) -> usize {
    positions.windows(2).filter(|pair| pair[0] != pair[1]).count()
}

//simulates the strategy positions implied by a signal series
pub fn simulate(signals: &SignalSeries, prices: &PriceSeries) -> Result<Simulation> {
    if signals.len() != prices.len() {
        return Err(BacktestError::LengthMismatch {
            signals: signals.len(),
            prices: prices.len(),
        });
    }

    simulate_positions(lag_signals(&signals.signals()), prices.closes())
}

//simulates holding one long unit over every period
pub fn buy_and_hold(prices: &PriceSeries) -> Result<Simulation> {
    simulate_positions(vec![Position::Long; prices.len()], prices.closes())
}

//accumulates returns for an already lagged position series
//return_t = position_t * (close_t / close_t-1 - 1), return_0 = 0
pub fn simulate_positions(positions: Vec<Position>, closes: &[f64]) -> Result<Simulation> {
    if positions.len() != closes.len() {
        return Err(BacktestError::LengthMismatch {
            signals: positions.len(),
            prices: closes.len(),
        });
    }
    validate_prices(closes)?;

    let mut returns = Vec::with_capacity(closes.len());
    if !closes.is_empty() {
        returns.push(0.0);
    }
    for (t, pair) in closes.windows(2).enumerate() {
        let price_return = pair[1] / pair[0] - 1.0;
        returns.push(positions[t + 1].exposure() * price_return);
    }

    let trade_count = count_transitions(&positions);

    Ok(Simulation {
        positions,
        returns,
        trade_count,
    })
}
