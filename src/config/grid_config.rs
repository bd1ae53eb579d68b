use crate::engine::BacktestConfig;
use crate::error::{BacktestError, Result};
use crate::strategy::{deviation::DeviationStrategy, validate_params, zscore::ZScoreStrategy, Strategy};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//signal rule evaluated on each grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "deviation")]
    Deviation,
    #[serde(rename = "zscore", alias = "z_score")]
    ZScore,
}

impl StrategyKind {
    //parse strategy kind from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deviation" | "ma_deviation" | "buy_low_sell_high" => Some(StrategyKind::Deviation),
            "zscore" | "z_score" | "mean_reversion" => Some(StrategyKind::ZScore),
            _ => None,
        }
    }

    //builds the strategy for one (lookback, threshold) pair
    pub fn build(self, lookback: usize, threshold: f64) -> Result<Box<dyn Strategy>> {
        Ok(match self {
            StrategyKind::Deviation => Box::new(DeviationStrategy::new(lookback, threshold)?),
            StrategyKind::ZScore => Box::new(ZScoreStrategy::new(lookback, threshold)?),
        })
    }
}

fn default_parallel() -> bool {
    true
}

//parameter grid evaluated for every asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    pub strategy: StrategyKind,
    pub lookbacks: Vec<usize>,
    pub thresholds: Vec<f64>,
    //run cells on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl Default for GridParams {
    fn default() -> Self {
        GridParams {
            strategy: StrategyKind::Deviation,
            lookbacks: vec![5, 10, 20, 50],
            thresholds: vec![0.001, 0.002, 0.003, 0.005, 0.01],
            parallel: true,
        }
    }
}

impl GridParams {
    pub fn new(strategy: StrategyKind, lookbacks: Vec<usize>, thresholds: Vec<f64>) -> Self {
        GridParams {
            strategy,
            lookbacks,
            thresholds,
            parallel: true,
        }
    }

    //number of (lookback, threshold) pairs per asset
    pub fn combinations(&self) -> usize {
        self.lookbacks.len() * self.thresholds.len()
    }

    //checks the grid is non-empty, in range and free of duplicate values
    pub fn validate(&self) -> Result<()> {
        if self.lookbacks.is_empty() || self.thresholds.is_empty() {
            return Err(BacktestError::InvalidParameter(
                "grid needs at least one lookback and one threshold".to_string(),
            ));
        }

        for &lookback in &self.lookbacks {
            validate_params(lookback, 0.0)?;
        }
        for &threshold in &self.thresholds {
            validate_params(2, threshold)?;
        }

        for (i, lookback) in self.lookbacks.iter().enumerate() {
            if self.lookbacks[..i].contains(lookback) {
                return Err(BacktestError::InvalidParameter(format!(
                    "duplicate lookback {}",
                    lookback
                )));
            }
        }
        for (i, threshold) in self.thresholds.iter().enumerate() {
            if self.thresholds[..i].contains(threshold) {
                return Err(BacktestError::InvalidParameter(format!(
                    "duplicate threshold {}",
                    threshold
                )));
            }
        }

        Ok(())
    }
}

//complete grid run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfiguration {
    //data
    pub data_path: PathBuf,
    //symbols to evaluate, empty means every symbol in the file
    #[serde(default)]
    pub symbols: Vec<String>,

    //grid and metrics
    pub grid: GridParams,
    #[serde(default)]
    pub backtest: BacktestConfig,

    //optional output paths
    #[serde(default)]
    pub output_results_csv: Option<PathBuf>,
    #[serde(default)]
    pub output_results_json: Option<PathBuf>,
}

impl Default for GridConfiguration {
    fn default() -> Self {
        GridConfiguration {
            data_path: PathBuf::from("equities_intraday_1h_1year.csv"),
            symbols: ["AAPL", "MSFT", "TSLA", "AMZN", "PLTR"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            grid: GridParams::default(),
            backtest: BacktestConfig::default(),
            output_results_csv: None,
            output_results_json: None,
        }
    }
}

impl GridConfiguration {
    //load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        let config: GridConfiguration = serde_json::from_str(&contents)
            .context(format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).context(format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.backtest.validate()
    }
}
