use crate::config::GridParams;
use crate::data::PriceSeries;
use crate::engine::backtest::{BacktestConfig, BacktestEngine, BacktestResult};
use crate::error::{BacktestError, ErrorKind, Result};
use crate::metrics::SummaryMetrics;
use indexmap::IndexMap;
use prettytable::{Cell, Row, Table};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

//identifies one grid cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridKey {
    pub symbol: String,
    pub lookback: usize,
    pub threshold: f64,
}

impl GridKey {
    pub fn new(symbol: impl Into<String>, lookback: usize, threshold: f64) -> Self {
        GridKey {
            symbol: symbol.into(),
            lookback,
            threshold,
        }
    }

    //adding zero folds -0.0 into 0.0 so equal thresholds hash equally
    fn threshold_bits(&self) -> u64 {
        (self.threshold + 0.0).to_bits()
    }
}

impl PartialEq for GridKey {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
            && self.lookback == other.lookback
            && self.threshold_bits() == other.threshold_bits()
    }
}

impl Eq for GridKey {}

impl Hash for GridKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.lookback.hash(state);
        self.threshold_bits().hash(state);
    }
}

impl fmt::Display for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lookback={} tau={}", self.symbol, self.lookback, self.threshold)
    }
}

//metrics for one cell, or the error that stopped it
pub type CellOutcome = std::result::Result<SummaryMetrics, BacktestError>;

//cooperative cancellation for a grid run
//cells that have not started when it fires are recorded as cancelled
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

//metric selectable for pivots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    FinalEquity,
    SharpeRatio,
    MaxDrawdown,
    TradeCount,
}

impl Metric {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "final_equity" | "equity" => Some(Metric::FinalEquity),
            "sharpe" | "sharpe_ratio" => Some(Metric::SharpeRatio),
            "max_drawdown" | "drawdown" => Some(Metric::MaxDrawdown),
            "trades" | "trade_count" => Some(Metric::TradeCount),
            _ => None,
        }
    }

    pub fn value(self, metrics: &SummaryMetrics) -> f64 {
        match self {
            Metric::FinalEquity => metrics.final_equity,
            Metric::SharpeRatio => metrics.sharpe_ratio,
            Metric::MaxDrawdown => metrics.max_drawdown,
            Metric::TradeCount => metrics.trade_count as f64,
        }
    }
}

//one metric for one asset laid out as lookback rows by threshold columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pivot {
    pub symbol: String,
    pub metric: Metric,
    pub lookbacks: Vec<usize>,
    pub thresholds: Vec<f64>,
    //none where the cell failed or was never evaluated
    pub values: Vec<Vec<Option<f64>>>,
}

//flat, serializable view of one cell for export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridRow {
    pub symbol: String,
    pub lookback: usize,
    pub threshold: f64,
    pub status: String,
    pub error: Option<String>,
    pub final_equity: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub trade_count: Option<usize>,
    pub round_trips: Option<usize>,
    pub win_rate: Option<f64>,
    pub exposure: Option<f64>,
    pub benchmark_final_equity: Option<f64>,
}

//results of a grid run, in asset, lookback, threshold order
#[derive(Debug, Clone)]
pub struct GridResult {
    cells: IndexMap<GridKey, CellOutcome>,
    benchmarks: IndexMap<String, CellOutcome>,
}

impl GridResult {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, key: &GridKey) -> Option<&CellOutcome> {
        self.cells.get(key)
    }

    //looks up a cell by its parts
    pub fn lookup(&self, symbol: &str, lookback: usize, threshold: f64) -> Option<&CellOutcome> {
        self.cells.get(&GridKey::new(symbol, lookback, threshold))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GridKey, &CellOutcome)> {
        self.cells.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &GridKey> {
        self.cells.keys()
    }

    pub fn successes(&self) -> impl Iterator<Item = (&GridKey, &SummaryMetrics)> {
        self.cells
            .iter()
            .filter_map(|(key, outcome)| outcome.as_ref().ok().map(|m| (key, m)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&GridKey, &BacktestError)> {
        self.cells
            .iter()
            .filter_map(|(key, outcome)| outcome.as_ref().err().map(|e| (key, e)))
    }

    //buy-and-hold metrics for an asset
    pub fn benchmark(&self, symbol: &str) -> Option<&CellOutcome> {
        self.benchmarks.get(symbol)
    }

    pub fn benchmarks(&self) -> impl Iterator<Item = (&String, &CellOutcome)> {
        self.benchmarks.iter()
    }

    //lays out one metric of one asset as a lookback by threshold matrix
    pub fn pivot(&self, symbol: &str, metric: Metric) -> Pivot {
        let mut lookbacks: Vec<usize> = Vec::new();
        let mut thresholds: Vec<f64> = Vec::new();

        for key in self.cells.keys().filter(|k| k.symbol == symbol) {
            if !lookbacks.contains(&key.lookback) {
                lookbacks.push(key.lookback);
            }
            if !thresholds.contains(&key.threshold) {
                thresholds.push(key.threshold);
            }
        }

        let values = lookbacks
            .iter()
            .map(|&lookback| {
                thresholds
                    .iter()
                    .map(|&threshold| match self.lookup(symbol, lookback, threshold) {
                        Some(Ok(metrics)) => Some(metric.value(metrics)),
                        _ => None,
                    })
                    .collect()
            })
            .collect();

        Pivot {
            symbol: symbol.to_string(),
            metric,
            lookbacks,
            thresholds,
            values,
        }
    }

    //flattens the result for csv or json export
    pub fn rows(&self) -> Vec<GridRow> {
        self.cells
            .iter()
            .map(|(key, outcome)| {
                let benchmark_final_equity = match self.benchmarks.get(&key.symbol) {
                    Some(Ok(bench)) => Some(bench.final_equity),
                    _ => None,
                };
                let (status, error, metrics) = match outcome {
                    Ok(metrics) => ("ok".to_string(), None, Some(metrics)),
                    Err(err) => (error_label(err.kind()).to_string(), Some(err.to_string()), None),
                };

                GridRow {
                    symbol: key.symbol.clone(),
                    lookback: key.lookback,
                    threshold: key.threshold,
                    status,
                    error,
                    final_equity: metrics.map(|m| m.final_equity),
                    sharpe_ratio: metrics.map(|m| m.sharpe_ratio),
                    max_drawdown: metrics.map(|m| m.max_drawdown),
                    trade_count: metrics.map(|m| m.trade_count),
                    round_trips: metrics.map(|m| m.round_trips),
                    win_rate: metrics.map(|m| m.win_rate),
                    exposure: metrics.map(|m| m.exposure),
                    benchmark_final_equity,
                }
            })
            .collect()
    }

    //builds the result table
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(Row::new(
            ["Symbol", "Lookback", "Tau", "Final Equity", "Sharpe", "Max DD", "Trades", "B&H Equity"]
                .iter()
                .map(|h| Cell::new(h))
                .collect(),
        ));

        for row in self.rows() {
            let mut cells = vec![
                Cell::new(&row.symbol),
                Cell::new(&row.lookback.to_string()),
                Cell::new(&format!("{}", row.threshold)),
            ];
            match (row.final_equity, row.sharpe_ratio, row.max_drawdown, row.trade_count) {
                (Some(equity), Some(sharpe), Some(dd), Some(trades)) => {
                    cells.push(Cell::new(&format!("{:.4}", equity)));
                    cells.push(Cell::new(&format!("{:.3}", sharpe)));
                    cells.push(Cell::new(&format!("{:.2}%", dd * 100.0)));
                    cells.push(Cell::new(&trades.to_string()));
                }
                _ => {
                    let message = row.error.unwrap_or_default();
                    cells.push(Cell::new(&format!("{}: {}", row.status, message)));
                    cells.extend((0..3).map(|_| Cell::new("-")));
                }
            }
            cells.push(Cell::new(
                &row.benchmark_final_equity
                    .map(|e| format!("{:.4}", e))
                    .unwrap_or_else(|| "-".to_string()),
            ));
            table.add_row(Row::new(cells));
        }

        table
    }

    //prints the result table
    pub fn pretty_print_table(&self) {
        self.to_table().printstd();
    }
}

fn error_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Input => "input_error",
        ErrorKind::InsufficientData => "insufficient_data",
        ErrorKind::Parameter => "parameter_error",
        ErrorKind::Cancelled => "cancelled",
    }
}

//runs the backtest pipeline over asset x lookback x threshold
pub struct GridEvaluator {
    params: GridParams,
    engine: BacktestEngine,
}

impl GridEvaluator {
    //validates the grid before any cell runs
    pub fn new(params: GridParams, config: BacktestConfig) -> Result<Self> {
        params.validate()?;
        config.validate()?;

        Ok(GridEvaluator {
            params,
            engine: BacktestEngine::new(config),
        })
    }

    pub fn params(&self) -> &GridParams {
        &self.params
    }

    //evaluates every cell, a failing cell never aborts the others
    pub fn evaluate(&self, assets: &[PriceSeries]) -> GridResult {
        self.evaluate_with_cancel(assets, &CancelToken::new())
    }

    //evaluates every cell until the token fires
    //finished cells are kept, the rest are recorded as cancelled
    pub fn evaluate_with_cancel(&self, assets: &[PriceSeries], cancel: &CancelToken) -> GridResult {
        let assets = unique_assets(assets);

        let mut tasks: Vec<(&PriceSeries, usize, f64)> =
            Vec::with_capacity(assets.len() * self.params.combinations());
        for &prices in &assets {
            for &lookback in &self.params.lookbacks {
                for &threshold in &self.params.thresholds {
                    tasks.push((prices, lookback, threshold));
                }
            }
        }

        info!(
            assets = assets.len(),
            cells = tasks.len(),
            parallel = self.params.parallel,
            "starting grid evaluation"
        );

        let run = |&(prices, lookback, threshold): &(&PriceSeries, usize, f64)| {
            self.run_cell(prices, lookback, threshold, cancel)
        };

        //indexed collect keeps task order in both modes
        let outcomes: Vec<CellOutcome> = if self.params.parallel {
            tasks.par_iter().map(run).collect()
        } else {
            tasks.iter().map(run).collect()
        };

        let mut cells = IndexMap::with_capacity(tasks.len());
        for ((prices, lookback, threshold), outcome) in tasks.into_iter().zip(outcomes) {
            let key = GridKey::new(prices.symbol(), lookback, threshold);
            if let Err(err) = &outcome {
                warn!(cell = %key, error = %err, "grid cell failed");
            }
            cells.insert(key, outcome);
        }

        let benchmarks = assets
            .iter()
            .map(|prices| {
                let outcome = self.engine.benchmark(prices).map(|bench| bench.summary);
                (prices.symbol().to_string(), outcome)
            })
            .collect();

        let result = GridResult { cells, benchmarks };
        info!(
            cells = result.len(),
            failed = result.failures().count(),
            "grid evaluation complete"
        );

        result
    }

    //re-runs one cell with full equity and benchmark curves
    pub fn backtest_cell(
        &self,
        prices: &PriceSeries,
        lookback: usize,
        threshold: f64,
    ) -> Result<BacktestResult> {
        let strategy = self.params.strategy.build(lookback, threshold)?;
        self.engine.run(prices, strategy.as_ref())
    }

    fn run_cell(
        &self,
        prices: &PriceSeries,
        lookback: usize,
        threshold: f64,
        cancel: &CancelToken,
    ) -> CellOutcome {
        if cancel.is_cancelled() {
            return Err(BacktestError::Cancelled);
        }

        let strategy = self.params.strategy.build(lookback, threshold)?;
        self.engine.summarize(prices, strategy.as_ref())
    }
}

//drops later assets that repeat a symbol so keys stay unique
fn unique_assets(assets: &[PriceSeries]) -> Vec<&PriceSeries> {
    let mut seen = HashSet::new();
    assets
        .iter()
        .filter(|&prices| {
            let fresh = seen.insert(prices.symbol());
            if !fresh {
                warn!(symbol = prices.symbol(), "duplicate asset ignored");
            }
            fresh
        })
        .collect()
}
