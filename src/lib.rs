//a Rust-based intraday mean-reversion backtesting engine with parameter grid evaluation

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod portfolio;
pub mod strategy;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{GridConfiguration, GridParams, StrategyKind};
    pub use crate::data::{
        load_csv, read_csv, select_symbols, write_equity_csv, write_grid_csv, write_grid_json,
        PricePoint, PriceSeries,
    };
    pub use crate::engine::{
        buy_and_hold, simulate, BacktestConfig, BacktestEngine, BacktestResult, BenchmarkResult,
        CancelToken, CellOutcome, GridEvaluator, GridKey, GridResult, GridRow, Metric, Pivot,
        Simulation,
    };
    pub use crate::error::{BacktestError, ErrorKind};
    pub use crate::metrics::{
        calculate_equity_curve, equity_values, max_drawdown, sharpe_ratio, EquityPoint,
        SummaryMetrics, TradeSegment, TradeStats, HOURLY_PERIODS_PER_YEAR,
    };
    pub use crate::portfolio::Position;
    pub use crate::strategy::{
        deviation::DeviationStrategy, zscore::ZScoreStrategy, Signal, SignalPoint, SignalSeries,
        SignalStatus, Strategy,
    };
}
