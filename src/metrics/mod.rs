pub mod summary;
pub mod timeseries;
pub mod trades;

pub use summary::SummaryMetrics;
pub use timeseries::{
    calculate_equity_curve, equity_values, max_drawdown, sharpe_ratio, EquityPoint,
    HOURLY_PERIODS_PER_YEAR,
};
pub use trades::{extract_segments, TradeSegment, TradeStats};
