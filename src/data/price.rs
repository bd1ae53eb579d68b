use crate::error::{BacktestError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

//a single (timestamp, close) observation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        PricePoint { timestamp, close }
    }
}

//time-ordered close prices for one asset
//immutable once built, the core only ever borrows it
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    timestamps: Vec<DateTime<Utc>>,
    closes: Vec<f64>,
}

impl PriceSeries {
    //creates a series, rejecting timestamps that are not strictly increasing
    //close values are checked later by the position simulator
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self> {
        for (index, pair) in points.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(BacktestError::UnorderedTimestamps { index: index + 1 });
            }
        }

        let (timestamps, closes) = points.into_iter().map(|p| (p.timestamp, p.close)).unzip();

        Ok(PriceSeries {
            symbol: symbol.into(),
            timestamps,
            closes,
        })
    }

    //creates a series of hourly bars starting at the unix epoch
    //useful when only the close path matters
    pub fn from_closes(symbol: impl Into<String>, closes: &[f64]) -> Self {
        let origin = DateTime::<Utc>::default();
        let timestamps = (0..closes.len())
            .map(|i| origin + Duration::hours(i as i64))
            .collect();

        PriceSeries {
            symbol: symbol.into(),
            timestamps,
            closes: closes.to_vec(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    //returns the observation at index i
    pub fn get(&self, i: usize) -> Option<PricePoint> {
        Some(PricePoint::new(*self.timestamps.get(i)?, *self.closes.get(i)?))
    }

    //iterates over the observations in time order
    pub fn points(&self) -> impl Iterator<Item = PricePoint> + '_ {
        self.timestamps
            .iter()
            .zip(self.closes.iter())
            .map(|(&timestamp, &close)| PricePoint::new(timestamp, close))
    }

    pub fn first(&self) -> Option<PricePoint> {
        self.get(0)
    }

    pub fn last(&self) -> Option<PricePoint> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }
}
