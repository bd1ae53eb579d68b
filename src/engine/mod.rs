pub mod backtest;
pub mod grid;
pub mod simulator;

pub use backtest::{BacktestConfig, BacktestEngine, BacktestResult, BenchmarkResult};
pub use grid::{CancelToken, CellOutcome, GridEvaluator, GridKey, GridResult, GridRow, Metric, Pivot};
pub use simulator::{buy_and_hold, simulate, Simulation};
