use crate::data::price::{PricePoint, PriceSeries};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use indexmap::IndexMap;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Datetime", alias = "datetime", alias = "Timestamp")]
    timestamp: String,
    #[serde(alias = "Symbol", alias = "Ticker", alias = "ticker")]
    symbol: String,
    #[serde(alias = "Close")]
    close: Option<f64>,
}

//loads close prices from a csv file, one series per symbol
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<IndexMap<String, PriceSeries>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let series = read_csv(file).context(format!("Failed to load prices from {:?}", path))?;
    info!(path = %path.display(), symbols = series.len(), "loaded price data");

    Ok(series)
}

//reads close prices from any csv source
//accepts long timestamp,symbol,close rows or the ticker-grouped wide layout
//with Ticker / Price / Datetime header rows
//symbols keep the order in which they first appear
pub fn read_csv<R: Read>(source: R) -> Result<IndexMap<String, PriceSeries>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);
    let headers = reader.headers().context("Failed to read CSV header")?.clone();

    let (grouped, skipped) = match headers.get(0) {
        Some(first) if first.trim().eq_ignore_ascii_case("ticker") => {
            read_grouped(&headers, reader.records())?
        }
        _ => read_long(&headers, reader.records())?,
    };

    if skipped > 0 {
        warn!(rows = skipped, "skipped rows with an empty close");
    }

    let mut series = IndexMap::with_capacity(grouped.len());
    for (symbol, mut points) in grouped {
        //sort by timestamp to ensure chronological order
        points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let prices = PriceSeries::new(symbol.clone(), points)
            .context(format!("Invalid price series for symbol {}", symbol))?;
        series.insert(symbol, prices);
    }

    Ok(series)
}

type Grouped = (IndexMap<String, Vec<PricePoint>>, usize);

fn read_long<I>(headers: &StringRecord, records: I) -> Result<Grouped>
where
    I: Iterator<Item = csv::Result<StringRecord>>,
{
    let mut grouped: IndexMap<String, Vec<PricePoint>> = IndexMap::new();
    let mut skipped = 0usize;

    for (index, result) in records.enumerate() {
        let line = index + 2;
        let raw = result.context(format!("Failed to read CSV record at line {}", line))?;
        let record: CsvRecord = raw
            .deserialize(Some(headers))
            .context(format!("Failed to parse CSV record at line {}", line))?;

        let timestamp = parse_timestamp(&record.timestamp).context(format!(
            "Failed to parse timestamp '{}' at line {}",
            record.timestamp, line
        ))?;

        //rows without a close are gaps in the source, not prices
        let close = match record.close {
            Some(close) => close,
            None => {
                skipped += 1;
                continue;
            }
        };

        grouped
            .entry(record.symbol)
            .or_default()
            .push(PricePoint::new(timestamp, close));
    }

    Ok((grouped, skipped))
}

//first row names the ticker of each column, second row the price field
//only the Close column of each ticker is read
fn read_grouped<I>(tickers: &StringRecord, mut records: I) -> Result<Grouped>
where
    I: Iterator<Item = csv::Result<StringRecord>>,
{
    let fields = match records.next() {
        Some(row) => row.context("Failed to read CSV price header at line 2")?,
        None => bail!("Missing price header row after the ticker row"),
    };

    let close_columns: Vec<(usize, &str)> = fields
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, field)| field.trim().eq_ignore_ascii_case("close"))
        .filter_map(|(column, _)| tickers.get(column).map(|t| (column, t.trim())))
        .collect();
    if close_columns.is_empty() {
        bail!("No Close column found in the price header row");
    }

    let mut grouped: IndexMap<String, Vec<PricePoint>> = close_columns
        .iter()
        .map(|&(_, ticker)| (ticker.to_string(), Vec::new()))
        .collect();
    let mut skipped = 0usize;

    for (index, result) in records.enumerate() {
        let line = index + 3;
        let row = result.context(format!("Failed to read CSV record at line {}", line))?;
        let raw_timestamp = row.get(0).unwrap_or_default();

        let timestamp = match parse_timestamp(raw_timestamp) {
            Ok(timestamp) => timestamp,
            //index name row, eg "Datetime,,,"
            Err(_) if row.iter().skip(1).all(|field| field.trim().is_empty()) => continue,
            Err(err) => {
                return Err(err.context(format!(
                    "Failed to parse timestamp '{}' at line {}",
                    raw_timestamp, line
                )))
            }
        };

        for &(column, ticker) in &close_columns {
            let raw_close = row.get(column).map(str::trim).unwrap_or_default();
            if raw_close.is_empty() {
                skipped += 1;
                continue;
            }

            let close: f64 = raw_close.parse().context(format!(
                "Failed to parse close '{}' for {} at line {}",
                raw_close, ticker, line
            ))?;
            if let Some(points) = grouped.get_mut(ticker) {
                points.push(PricePoint::new(timestamp, close));
            }
        }
    }

    //tickers with no closes at all carry no series
    grouped.retain(|_, points| !points.is_empty());

    Ok((grouped, skipped))
}

//parses rfc3339, "YYYY-MM-DD HH:MM:SS+HH:MM" or a naive utc timestamp
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(ts.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .context(format!("Unrecognised timestamp format: '{}'", raw))?;
    Ok(naive.and_utc())
}

//picks the requested symbols in the requested order
//an empty request selects every loaded symbol
pub fn select_symbols(
    all: &IndexMap<String, PriceSeries>,
    symbols: &[String],
) -> Result<Vec<PriceSeries>> {
    if symbols.is_empty() {
        return Ok(all.values().cloned().collect());
    }

    let mut selected = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match all.get(symbol) {
            Some(series) => selected.push(series.clone()),
            None => bail!("No data found for symbol {}", symbol),
        }
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LONG_FORMAT: &str = "\
timestamp,symbol,open,close
2024-01-02T15:30:00Z,MSFT,1,371.0
2024-01-02T14:30:00Z,AAPL,1,185.5
2024-01-02T14:30:00Z,MSFT,1,370.0
2024-01-02T15:30:00Z,AAPL,1,
2024-01-02T16:30:00Z,AAPL,1,186.25
";

    #[test]
    fn groups_by_symbol_in_first_seen_order() {
        let series = read_csv(LONG_FORMAT.as_bytes()).unwrap();
        let symbols: Vec<_> = series.keys().cloned().collect();

        assert_eq!(symbols, vec!["MSFT".to_string(), "AAPL".to_string()]);
    }

    #[test]
    fn sorts_points_and_skips_empty_closes() {
        let series = read_csv(LONG_FORMAT.as_bytes()).unwrap();

        assert_eq!(series["MSFT"].closes(), &[370.0, 371.0]);
        assert_eq!(series["AAPL"].closes(), &[185.5, 186.25]);
    }

    #[test]
    fn accepts_capitalised_headers_and_offset_timestamps() {
        let data = "Datetime,Ticker,Close\n2024-01-02 14:30:00+00:00,TSLA,248.4\n2024-01-02 15:30:00+00:00,TSLA,249.0\n";
        let series = read_csv(data.as_bytes()).unwrap();

        assert_eq!(series["TSLA"].len(), 2);
        assert_eq!(
            series["TSLA"].first().unwrap().timestamp,
            parse_timestamp("2024-01-02T14:30:00Z").unwrap()
        );
    }

    const GROUPED_FORMAT: &str = "\
Ticker,AAPL,AAPL,AAPL,MSFT,MSFT,MSFT
Price,Open,Close,Volume,Open,Close,Volume
Datetime,,,,,,
2024-01-02 15:30:00+00:00,185.0,185.9,100,370.0,371.5,200
2024-01-02 14:30:00+00:00,184.0,185.5,100,369.0,370.25,200
2024-01-02 16:30:00+00:00,186.0,,100,371.0,372.0,200
";

    #[test]
    fn reads_ticker_grouped_layout() {
        let series = read_csv(GROUPED_FORMAT.as_bytes()).unwrap();
        let symbols: Vec<_> = series.keys().cloned().collect();

        assert_eq!(symbols, vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(series["AAPL"].closes(), &[185.5, 185.9]);
        assert_eq!(series["MSFT"].closes(), &[370.25, 371.5, 372.0]);
        assert_eq!(
            series["MSFT"].first().unwrap().timestamp,
            parse_timestamp("2024-01-02T14:30:00Z").unwrap()
        );
    }

    #[test]
    fn grouped_layout_with_single_close_column() {
        let data = "Ticker,AAPL,AAPL\nPrice,Open,Close\nDatetime,,\n2024-01-02 14:30:00+00:00,1,2\n";
        let series = read_csv(data.as_bytes()).unwrap();

        assert_eq!(series["AAPL"].closes(), &[2.0]);
    }

    #[test]
    fn grouped_layout_without_close_is_rejected() {
        let data = "Ticker,AAPL\nPrice,Open\nDatetime,\n2024-01-02 14:30:00+00:00,1\n";
        assert!(read_csv(data.as_bytes()).is_err());
    }

    #[test]
    fn duplicate_timestamps_are_rejected() {
        let data = "timestamp,symbol,close\n2024-01-02T14:30:00Z,X,1.0\n2024-01-02T14:30:00Z,X,2.0\n";
        let err = read_csv(data.as_bytes()).unwrap_err();

        assert!(format!("{:#}", err).contains("symbol X"));
    }

    #[test]
    fn parses_naive_timestamps_as_utc() {
        let ts = parse_timestamp("2024-03-01 10:00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn load_csv_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LONG_FORMAT.as_bytes()).unwrap();

        let series = load_csv(file.path()).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn select_symbols_preserves_request_order() {
        let all = read_csv(LONG_FORMAT.as_bytes()).unwrap();

        let picked = select_symbols(&all, &["AAPL".to_string(), "MSFT".to_string()]).unwrap();
        assert_eq!(picked[0].symbol(), "AAPL");
        assert_eq!(picked[1].symbol(), "MSFT");

        assert_eq!(select_symbols(&all, &[]).unwrap().len(), 2);
        assert!(select_symbols(&all, &["NVDA".to_string()]).is_err());
    }
}
