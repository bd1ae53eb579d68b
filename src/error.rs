use thiserror::Error;

//classification of backtest failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    //malformed or non-positive price data, fatal to the affected cell
    Input,
    //fewer observations than the lookback window
    InsufficientData,
    //invalid lookback, threshold or grid definition
    Parameter,
    //cell skipped because the grid run was cancelled
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    #[error("Invalid price {price} at index {index}: prices must be finite and positive")]
    NonPositivePrice { index: usize, price: f64 },
    #[error("Timestamps not strictly increasing at index {index}")]
    UnorderedTimestamps { index: usize },
    #[error("Series length mismatch: {signals} signals for {prices} prices")]
    LengthMismatch { signals: usize, prices: usize },
    #[error("Insufficient data: {available} observations, lookback requires {required}")]
    InsufficientData { required: usize, available: usize },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Grid run cancelled before this cell started")]
    Cancelled,
}

impl BacktestError {
    //returns the taxonomy class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BacktestError::NonPositivePrice { .. }
            | BacktestError::UnorderedTimestamps { .. }
            | BacktestError::LengthMismatch { .. } => ErrorKind::Input,
            BacktestError::InsufficientData { .. } => ErrorKind::InsufficientData,
            BacktestError::InvalidParameter(_) => ErrorKind::Parameter,
            BacktestError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, BacktestError>;
