use crate::data::PriceSeries;
use crate::engine::simulator::{buy_and_hold, simulate, Simulation};
use crate::error::{BacktestError, Result};
use crate::metrics::{calculate_equity_curve, EquityPoint, SummaryMetrics, HOURLY_PERIODS_PER_YEAR};
use crate::strategy::{SignalSeries, Strategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

//buy-and-hold run over the same prices as a strategy
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub simulation: Simulation,
    pub equity_curve: Vec<EquityPoint>,
    pub summary: SummaryMetrics,
}

//result of a backtest
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: String,
    pub lookback: usize,
    pub threshold: f64,
    pub signals: SignalSeries,
    pub simulation: Simulation,
    pub equity_curve: Vec<EquityPoint>,
    pub summary: SummaryMetrics,
    pub benchmark: BenchmarkResult,
}

impl BacktestResult {
    //strategy equity multiples, one per price
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }

    //buy-and-hold equity multiples, one per price
    pub fn benchmark_values(&self) -> Vec<f64> {
        self.benchmark.equity_curve.iter().map(|p| p.equity).collect()
    }
}

//configuration for a backtest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    //sampling periods per year used to annualize the sharpe ratio
    pub periods_per_year: f64,
    //scales the equity multiple into a balance for reporting
    pub initial_capital: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            periods_per_year: HOURLY_PERIODS_PER_YEAR,
            initial_capital: 100000.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.periods_per_year.is_finite() || self.periods_per_year <= 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "periods_per_year must be positive, got {}",
                self.periods_per_year
            )));
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        Ok(())
    }
}

//main backtest engine
//stateless between runs, one engine can be shared across threads
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    //creates a new backtest engine
    pub fn new(config: BacktestConfig) -> Self {
        BacktestEngine { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    //runs signal generation, simulation and metrics for one strategy
    pub fn run(&self, prices: &PriceSeries, strategy: &dyn Strategy) -> Result<BacktestResult> {
        let StrategyRun {
            signals,
            simulation,
            equity_curve,
            summary,
        } = self.evaluate(prices, strategy)?;
        let benchmark = self.benchmark(prices)?;

        Ok(BacktestResult {
            symbol: prices.symbol().to_string(),
            strategy: strategy.name().to_string(),
            lookback: strategy.lookback(),
            threshold: strategy.threshold(),
            signals,
            simulation,
            equity_curve,
            summary,
            benchmark,
        })
    }

    //computes only the strategy side, used per grid cell
    pub fn summarize(&self, prices: &PriceSeries, strategy: &dyn Strategy) -> Result<SummaryMetrics> {
        Ok(self.evaluate(prices, strategy)?.summary)
    }

    //runs the buy-and-hold benchmark on its own simulation
    pub fn benchmark(&self, prices: &PriceSeries) -> Result<BenchmarkResult> {
        let simulation = buy_and_hold(prices)?;
        let (equity_curve, summary) = self.measure(prices, &simulation);

        Ok(BenchmarkResult {
            simulation,
            equity_curve,
            summary,
        })
    }

    fn evaluate(&self, prices: &PriceSeries, strategy: &dyn Strategy) -> Result<StrategyRun> {
        let signals = strategy.generate(prices)?;
        let simulation = simulate(&signals, prices)?;
        let (equity_curve, summary) = self.measure(prices, &simulation);

        debug!(
            symbol = prices.symbol(),
            strategy = strategy.name(),
            lookback = strategy.lookback(),
            threshold = strategy.threshold(),
            final_equity = summary.final_equity,
            trades = summary.trade_count,
            "backtest complete"
        );

        Ok(StrategyRun {
            signals,
            simulation,
            equity_curve,
            summary,
        })
    }

    fn measure(&self, prices: &PriceSeries, simulation: &Simulation) -> (Vec<EquityPoint>, SummaryMetrics) {
        let equity_curve = calculate_equity_curve(prices.timestamps(), simulation.returns());
        let summary = SummaryMetrics::from_backtest(
            &equity_curve,
            simulation,
            self.config.periods_per_year,
            self.config.initial_capital,
        );
        (equity_curve, summary)
    }
}

struct StrategyRun {
    signals: SignalSeries,
    simulation: Simulation,
    equity_curve: Vec<EquityPoint>,
    summary: SummaryMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::deviation::DeviationStrategy;
    use approx::assert_relative_eq;

    #[test]
    fn run_pairs_strategy_with_independent_benchmark() {
        let prices = PriceSeries::from_closes("T", &[100.0, 101.0, 99.0, 95.0, 110.0]);
        let strategy = DeviationStrategy::new(3, 0.02).unwrap();
        let result = BacktestEngine::default().run(&prices, &strategy).unwrap();

        assert_eq!(result.symbol, "T");
        assert_eq!(result.lookback, 3);
        assert_eq!(result.simulation.position_values(), vec![0, 0, 0, 0, 1]);
        assert_eq!(result.benchmark.simulation.position_values(), vec![1; 5]);
        assert_eq!(result.equity_values().len(), prices.len());
        assert_relative_eq!(result.benchmark_values()[4], 1.1, epsilon = 1e-12);
    }

    #[test]
    fn summarize_matches_full_run() {
        let prices = PriceSeries::from_closes("T", &[10.0, 9.0, 11.0, 10.0, 12.0, 9.5]);
        let strategy = DeviationStrategy::new(2, 0.01).unwrap();
        let engine = BacktestEngine::default();

        let full = engine.run(&prices, &strategy).unwrap();
        let summary = engine.summarize(&prices, &strategy).unwrap();
        assert_eq!(full.summary, summary);
    }

    #[test]
    fn config_validation() {
        assert!(BacktestConfig::default().validate().is_ok());

        let bad = BacktestConfig {
            periods_per_year: 0.0,
            ..BacktestConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
