use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use revertible::prelude::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "revertible")]
#[command(about = "An intraday mean-reversion backtesting engine", long_about = None)]
struct Cli {
    //enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a single backtest against buy and hold
    Run {
        //path to csv data file
        #[arg(long)]
        data: PathBuf,

        //symbol to backtest (eg AAPL)
        #[arg(long)]
        symbol: String,

        //strategy type (deviation, zscore)
        #[arg(long, default_value = "deviation")]
        strategy: String,

        //moving average window in bars
        #[arg(long, default_value = "20")]
        lookback: usize,

        //deviation threshold (tau)
        #[arg(long, default_value = "0.003")]
        threshold: f64,

        //initial account balance
        #[arg(long, default_value = "100000")]
        initial_capital: f64,

        //bars per year for sharpe annualization
        #[arg(long, default_value_t = HOURLY_PERIODS_PER_YEAR)]
        periods_per_year: f64,

        //output path for equity curve csv
        #[arg(long)]
        output_equity_csv: Option<PathBuf>,
    },

    //evaluate a lookback x threshold grid over several symbols
    Grid {
        //json configuration file, flags below override its fields
        #[arg(long)]
        config: Option<PathBuf>,

        //path to csv data file
        #[arg(long)]
        data: Option<PathBuf>,

        //comma separated symbols (eg AAPL,MSFT)
        #[arg(long)]
        symbols: Option<String>,

        //strategy type (deviation, zscore)
        #[arg(long)]
        strategy: Option<String>,

        //comma separated lookbacks (eg 5,10,20)
        #[arg(long)]
        lookbacks: Option<String>,

        //comma separated thresholds (eg 0.001,0.003)
        #[arg(long)]
        thresholds: Option<String>,

        //evaluate cells on the current thread only
        #[arg(long)]
        sequential: bool,

        //print a lookback x threshold matrix of this metric per symbol
        //(final_equity, sharpe, max_drawdown, trades)
        #[arg(long)]
        pivot: Option<String>,

        //output path for results csv
        #[arg(long)]
        output_csv: Option<PathBuf>,

        //output path for results json
        #[arg(long)]
        output_json: Option<PathBuf>,
    },

    //write the default grid configuration to a json file
    InitConfig {
        #[arg(long, default_value = "grid.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            data,
            symbol,
            strategy,
            lookback,
            threshold,
            initial_capital,
            periods_per_year,
            output_equity_csv,
        } => {
            let config = BacktestConfig {
                periods_per_year,
                initial_capital,
            };
            run_backtest(data, symbol, strategy, lookback, threshold, config, output_equity_csv)?;
        }
        Commands::Grid {
            config,
            data,
            symbols,
            strategy,
            lookbacks,
            thresholds,
            sequential,
            pivot,
            output_csv,
            output_json,
        } => {
            let mut configuration = match config {
                Some(path) => GridConfiguration::from_json_file(&path)?,
                None => GridConfiguration::default(),
            };

            if let Some(data) = data {
                configuration.data_path = data;
            }
            if let Some(symbols) = symbols {
                configuration.symbols = parse_symbol_list(&symbols);
            }
            if let Some(strategy) = strategy {
                configuration.grid.strategy = parse_strategy(&strategy)?;
            }
            if let Some(lookbacks) = lookbacks {
                configuration.grid.lookbacks = parse_list(&lookbacks)?;
            }
            if let Some(thresholds) = thresholds {
                configuration.grid.thresholds = parse_list(&thresholds)?;
            }
            if sequential {
                configuration.grid.parallel = false;
            }
            if output_csv.is_some() {
                configuration.output_results_csv = output_csv;
            }
            if output_json.is_some() {
                configuration.output_results_json = output_json;
            }

            let pivot = pivot
                .map(|name| {
                    Metric::parse(&name).ok_or_else(|| anyhow::anyhow!("Unknown metric: {}", name))
                })
                .transpose()?;

            run_grid(configuration, pivot)?;
        }
        Commands::InitConfig { output } => {
            GridConfiguration::default().to_json_file(&output)?;
            println!("Default configuration written to {:?}", output);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_strategy(name: &str) -> Result<StrategyKind> {
    StrategyKind::parse(name).ok_or_else(|| anyhow::anyhow!("Unknown strategy: {}", name))
}

//parses comma separated values, rejecting any entry that does not parse
fn parse_list<T>(s: &str) -> Result<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    s.split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(|x| x.parse::<T>().context(format!("Invalid list entry '{}'", x)))
        .collect()
}

fn parse_symbol_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|sym| sym.trim().to_string())
        .filter(|sym| !sym.is_empty())
        .collect()
}

fn run_backtest(
    data_path: PathBuf,
    symbol: String,
    strategy_name: String,
    lookback: usize,
    threshold: f64,
    config: BacktestConfig,
    output_equity_csv: Option<PathBuf>,
) -> Result<()> {
    println!("Mean-Reversion Backtesting Engine");
    println!("=================================\n");

    config.validate()?;

    //load data
    let all_series =
        load_csv(&data_path).context(format!("Failed to load data from {:?}", data_path))?;
    let prices = select_symbols(&all_series, &[symbol.clone()])?.remove(0);

    match (prices.first(), prices.last()) {
        (Some(first), Some(last)) => {
            println!("Loaded {} bars for {}", prices.len(), symbol);
            println!("Date range: {} to {}\n", first.timestamp, last.timestamp);
        }
        _ => anyhow::bail!("No data found for symbol {}", symbol),
    }

    //create strategy
    let strategy = parse_strategy(&strategy_name)?.build(lookback, threshold)?;
    println!(
        "Strategy: {} (lookback={}, threshold={})",
        strategy.name(),
        lookback,
        threshold
    );
    println!("Initial capital: ${:.2}\n", config.initial_capital);

    //run backtest
    let engine = BacktestEngine::new(config);
    let result = engine.run(&prices, strategy.as_ref())?;

    let degenerate = result.signals.degenerate_indices().len();
    if degenerate > 0 {
        info!(bars = degenerate, "degenerate windows held flat");
    }

    //display results
    println!("Backtest Results");
    println!("================\n");
    result
        .summary
        .pretty_print_table(Some(&result.benchmark.summary));

    //save outputs if requested
    if let Some(equity_path) = output_equity_csv {
        write_equity_csv(&result, prices.closes(), &equity_path)?;
        println!("\nEquity curve saved to {:?}", equity_path);
    }

    Ok(())
}

fn run_grid(configuration: GridConfiguration, pivot: Option<Metric>) -> Result<()> {
    println!("Mean-Reversion Grid Evaluation");
    println!("==============================\n");

    configuration.validate()?;

    let all_series = load_csv(&configuration.data_path).context(format!(
        "Failed to load data from {:?}",
        configuration.data_path
    ))?;
    let assets = select_symbols(&all_series, &configuration.symbols)?;

    println!(
        "Symbols: {}",
        assets.iter().map(|a| a.symbol()).collect::<Vec<_>>().join(", ")
    );
    println!("Strategy: {:?}", configuration.grid.strategy);
    println!("Lookbacks: {:?}", configuration.grid.lookbacks);
    println!("Thresholds: {:?}\n", configuration.grid.thresholds);

    let evaluator = GridEvaluator::new(configuration.grid.clone(), configuration.backtest)?;
    let result = evaluator.evaluate(&assets);

    result.pretty_print_table();

    if let Some(metric) = pivot {
        for asset in &assets {
            println!("\n{} {:?}", asset.symbol(), metric);
            print_pivot(&result.pivot(asset.symbol(), metric));
        }
    }

    if let Some(path) = &configuration.output_results_csv {
        write_grid_csv(&result, path)?;
        println!("\nResults saved to {:?}", path);
    }

    if let Some(path) = &configuration.output_results_json {
        write_grid_json(&result, path)?;
        println!("Results saved to {:?}", path);
    }

    Ok(())
}

fn print_pivot(pivot: &Pivot) {
    let mut table = Table::new();

    let mut header = vec![Cell::new("lookback \\ tau")];
    header.extend(pivot.thresholds.iter().map(|t| Cell::new(&t.to_string())));
    table.add_row(Row::new(header));

    for (lookback, values) in pivot.lookbacks.iter().zip(pivot.values.iter()) {
        let mut cells = vec![Cell::new(&lookback.to_string())];
        cells.extend(values.iter().map(|v| match v {
            Some(value) => Cell::new(&format!("{:.4}", value)),
            None => Cell::new("-"),
        }));
        table.add_row(Row::new(cells));
    }

    table.printstd();
}
