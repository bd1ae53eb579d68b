use crate::engine::simulator::Simulation;
use crate::metrics::timeseries::{max_drawdown, sharpe_ratio, EquityPoint};
use crate::metrics::trades::{extract_segments, TradeStats};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};

//summary metrics for a backtest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub final_equity: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub round_trips: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_trade_return: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub exposure: f64,
}

impl SummaryMetrics {
    //calculate summary metrics from an equity curve and the simulation behind it
    pub fn from_backtest(
        equity_curve: &[EquityPoint],
        simulation: &Simulation,
        periods_per_year: f64,
        initial_capital: f64,
    ) -> Self {
        let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(1.0);
        let total_return = final_equity - 1.0;

        //calculate cagr
        let cagr = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => {
                let duration_days = (last.timestamp - first.timestamp).num_days() as f64;
                let years = duration_days / 365.25;

                let growth = if years > 0.0 && final_equity > 0.0 {
                    final_equity.powf(1.0 / years) - 1.0
                } else {
                    0.0
                };

                //short spans can overflow the annualization
                if growth.is_finite() {
                    growth
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        let segments = extract_segments(simulation.positions(), simulation.returns());
        let trade_stats = TradeStats::from_segments(&segments);

        //exposure, fraction of periods holding a position
        let exposure = if simulation.is_empty() {
            0.0
        } else {
            let in_market = simulation.positions().iter().filter(|p| !p.is_flat()).count();
            in_market as f64 / simulation.len() as f64
        };

        SummaryMetrics {
            final_equity,
            final_balance: final_equity * initial_capital,
            total_return,
            cagr,
            sharpe_ratio: sharpe_ratio(simulation.returns(), periods_per_year),
            max_drawdown: max_drawdown(equity_curve),
            trade_count: simulation.trade_count(),
            round_trips: trade_stats.round_trips,
            winning_trades: trade_stats.winning_trades,
            losing_trades: trade_stats.losing_trades,
            win_rate: trade_stats.win_rate,
            avg_trade_return: trade_stats.avg_trade_return,
            largest_win: trade_stats.largest_win,
            largest_loss: trade_stats.largest_loss,
            exposure,
        }
    }

    //builds a metric/value table, with a benchmark column when given
    pub fn to_table(&self, benchmark: Option<&SummaryMetrics>) -> Table {
        let mut table = Table::new();

        let mut header = vec![Cell::new("Metric"), Cell::new("Strategy")];
        if benchmark.is_some() {
            header.push(Cell::new("Buy & Hold"));
        }
        table.add_row(Row::new(header));

        let rows: [(&str, fn(&SummaryMetrics) -> String); 13] = [
            ("Final Equity", |m| format!("{:.4}", m.final_equity)),
            ("Final Balance", |m| format!("${:.2}", m.final_balance)),
            ("Total Return", |m| format!("{:.2}%", m.total_return * 100.0)),
            ("CAGR", |m| format!("{:.2}%", m.cagr * 100.0)),
            ("Sharpe Ratio", |m| format!("{:.3}", m.sharpe_ratio)),
            ("Max Drawdown", |m| format!("{:.2}%", m.max_drawdown * 100.0)),
            ("Position Changes", |m| format!("{}", m.trade_count)),
            ("Round Trips", |m| format!("{}", m.round_trips)),
            ("Win Rate", |m| format!("{:.2}%", m.win_rate * 100.0)),
            ("Avg Trade Return", |m| format!("{:.3}%", m.avg_trade_return * 100.0)),
            ("Largest Win", |m| format!("{:.3}%", m.largest_win * 100.0)),
            ("Largest Loss", |m| format!("{:.3}%", m.largest_loss * 100.0)),
            ("Exposure", |m| format!("{:.2}%", m.exposure * 100.0)),
        ];

        for (label, render) in rows {
            let mut cells = vec![Cell::new(label), Cell::new(&render(self))];
            if let Some(bench) = benchmark {
                cells.push(Cell::new(&render(bench)));
            }
            table.add_row(Row::new(cells));
        }

        table
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self, benchmark: Option<&SummaryMetrics>) {
        self.to_table(benchmark).printstd();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::simulator::simulate_positions;
    use crate::metrics::timeseries::{calculate_equity_curve, HOURLY_PERIODS_PER_YEAR};
    use crate::portfolio::Position;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, Utc};

    fn days(n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|i| DateTime::<Utc>::default() + Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn flat_strategy_summary() {
        let sim = simulate_positions(vec![Position::Flat; 4], &[10.0, 11.0, 9.0, 12.0]).unwrap();
        let curve = calculate_equity_curve(&days(4), sim.returns());
        let summary = SummaryMetrics::from_backtest(&curve, &sim, HOURLY_PERIODS_PER_YEAR, 1000.0);

        assert_eq!(summary.final_equity, 1.0);
        assert_eq!(summary.final_balance, 1000.0);
        assert_eq!(summary.sharpe_ratio, 0.0);
        assert_eq!(summary.max_drawdown, 0.0);
        assert_eq!(summary.trade_count, 0);
        assert_eq!(summary.exposure, 0.0);
        assert_eq!(summary.cagr, 0.0);
    }

    #[test]
    fn exposure_and_trades_from_positions() {
        let positions = vec![Position::Flat, Position::Long, Position::Long, Position::Flat];
        let sim = simulate_positions(positions, &[10.0, 11.0, 12.1, 12.0]).unwrap();
        let curve = calculate_equity_curve(&days(4), sim.returns());
        let summary = SummaryMetrics::from_backtest(&curve, &sim, 252.0, 1.0);

        assert_eq!(summary.trade_count, 2);
        assert_eq!(summary.round_trips, 1);
        assert_eq!(summary.winning_trades, 1);
        assert_relative_eq!(summary.exposure, 0.5);
        assert_relative_eq!(summary.final_equity, 1.21, epsilon = 1e-12);
        assert_relative_eq!(summary.total_return, 0.21, epsilon = 1e-12);
        assert_relative_eq!(summary.largest_win, 0.21, epsilon = 1e-12);
        assert_eq!(summary.largest_loss, 0.0);
    }

    #[test]
    fn cagr_overflow_on_short_span_reports_zero() {
        //tenfold in one day annualizes past f64::MAX
        let sim = simulate_positions(vec![Position::Long; 2], &[10.0, 100.0]).unwrap();
        let curve = calculate_equity_curve(&days(2), sim.returns());
        let summary = SummaryMetrics::from_backtest(&curve, &sim, 252.0, 1.0);

        assert_relative_eq!(summary.final_equity, 10.0, epsilon = 1e-12);
        assert_eq!(summary.cagr, 0.0);

        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["cagr"], 0.0);
    }

    #[test]
    fn table_has_benchmark_column_when_given() {
        let sim = simulate_positions(vec![Position::Long; 2], &[1.0, 2.0]).unwrap();
        let curve = calculate_equity_curve(&days(2), sim.returns());
        let summary = SummaryMetrics::from_backtest(&curve, &sim, 252.0, 1.0);

        let table = summary.to_table(Some(&summary));
        assert_eq!(table.len(), 14);
        assert_eq!(table.get_row(0).unwrap().len(), 3);
        assert_eq!(summary.to_table(None).get_row(1).unwrap().len(), 2);
    }
}
