use crate::engine::{BacktestResult, GridResult, GridRow};
use crate::metrics::SummaryMetrics;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct EquityRecord {
    timestamp: DateTime<Utc>,
    close: f64,
    signal: i8,
    position: i8,
    strategy_return: f64,
    equity: f64,
    drawdown: f64,
    benchmark_return: f64,
    benchmark_equity: f64,
    benchmark_drawdown: f64,
}

#[derive(Debug, Serialize)]
struct GridExport<'a> {
    cells: Vec<GridRow>,
    benchmarks: IndexMap<&'a str, Option<&'a SummaryMetrics>>,
}

//writes one row per grid cell
pub fn write_grid_csv<P: AsRef<Path>>(result: &GridResult, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create CSV file: {:?}", path))?;

    for row in result.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

//writes grid cells and per-asset benchmarks as pretty json
pub fn write_grid_json<P: AsRef<Path>>(result: &GridResult, path: P) -> Result<()> {
    let path = path.as_ref();
    let export = GridExport {
        cells: result.rows(),
        benchmarks: result
            .benchmarks()
            .map(|(symbol, outcome)| (symbol.as_str(), outcome.as_ref().ok()))
            .collect(),
    };

    let json = serde_json::to_string_pretty(&export)?;
    std::fs::write(path, json).context(format!("Failed to write JSON file: {:?}", path))?;

    Ok(())
}

//writes strategy and benchmark equity side by side, one row per bar
pub fn write_equity_csv<P: AsRef<Path>>(
    result: &BacktestResult,
    closes: &[f64],
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create CSV file: {:?}", path))?;

    let positions = result.simulation.positions();
    let rows = result
        .equity_curve
        .iter()
        .zip(result.benchmark.equity_curve.iter())
        .zip(result.signals.points().iter())
        .zip(positions.iter().zip(closes.iter()));

    for (((point, bench), signal), (position, &close)) in rows {
        writer.serialize(EquityRecord {
            timestamp: point.timestamp,
            close,
            signal: signal.signal.value(),
            position: position.value(),
            strategy_return: point.returns,
            equity: point.equity,
            drawdown: point.drawdown,
            benchmark_return: bench.returns,
            benchmark_equity: bench.equity,
            benchmark_drawdown: bench.drawdown,
        })?;
    }
    writer.flush()?;

    Ok(())
}
