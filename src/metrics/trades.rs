use crate::portfolio::Position;
use serde::{Deserialize, Serialize};

//a maximal run of one non-flat position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeSegment {
    pub direction: Position,
    //first period held
    pub entry_index: usize,
    //first period no longer held, none if still open at the end
    pub exit_index: Option<usize>,
    //compounded strategy return over the held periods
    pub return_pct: f64,
}

impl TradeSegment {
    pub fn is_open(&self) -> bool {
        self.exit_index.is_none()
    }

    pub fn periods_held(&self, series_len: usize) -> usize {
        self.exit_index.unwrap_or(series_len) - self.entry_index
    }
}

//splits a position series into trade segments
//returns at an index belong to the position held at that index
pub fn extract_segments(positions: &[Position], returns: &[f64]) -> Vec<TradeSegment> {
    let mut segments = Vec::new();
    let mut current: Option<(Position, usize, f64)> = None;

    for (i, (&position, &ret)) in positions.iter().zip(returns.iter()).enumerate() {
        if let Some((held, _, growth)) = current.as_mut() {
            if *held == position {
                *growth *= 1.0 + ret;
                continue;
            }
        }

        if let Some((held, entry, growth)) = current.take() {
            segments.push(TradeSegment {
                direction: held,
                entry_index: entry,
                exit_index: Some(i),
                return_pct: growth - 1.0,
            });
        }

        if !position.is_flat() {
            current = Some((position, i, 1.0 + ret));
        }
    }

    if let Some((held, entry, growth)) = current {
        segments.push(TradeSegment {
            direction: held,
            entry_index: entry,
            exit_index: None,
            return_pct: growth - 1.0,
        });
    }

    segments
}

//win/loss statistics over trade segments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub round_trips: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_trade_return: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl TradeStats {
    pub fn from_segments(segments: &[TradeSegment]) -> Self {
        let round_trips = segments.len();
        let winning_trades = segments.iter().filter(|s| s.return_pct > 0.0).count();
        let losing_trades = segments.iter().filter(|s| s.return_pct < 0.0).count();

        //breakeven segments count in neither side
        let win_rate = winning_trades as f64 / (winning_trades + losing_trades).max(1) as f64;

        let avg_trade_return = if round_trips > 0 {
            segments.iter().map(|s| s.return_pct).sum::<f64>() / round_trips as f64
        } else {
            0.0
        };

        let largest_win = segments.iter().fold(0.0f64, |a, s| a.max(s.return_pct));
        let largest_loss = segments.iter().fold(0.0f64, |a, s| a.min(s.return_pct));

        TradeStats {
            round_trips,
            winning_trades,
            losing_trades,
            win_rate,
            avg_trade_return,
            largest_win,
            largest_loss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const F: Position = Position::Flat;
    const L: Position = Position::Long;
    const S: Position = Position::Short;

    #[test]
    fn long_then_short_is_two_round_trips() {
        let positions = [F, L, L, S, F];
        let returns = [0.0, 0.1, 0.1, -0.5, 0.0];
        let segments = extract_segments(&positions, &returns);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].direction, L);
        assert_eq!(segments[0].entry_index, 1);
        assert_eq!(segments[0].exit_index, Some(3));
        assert_relative_eq!(segments[0].return_pct, 0.21, epsilon = 1e-12);
        assert_eq!(segments[1].direction, S);
        assert_eq!(segments[1].periods_held(positions.len()), 1);
        assert_relative_eq!(segments[1].return_pct, -0.5);
    }

    #[test]
    fn open_segment_at_end_is_kept() {
        let segments = extract_segments(&[F, F, S, S], &[0.0, 0.0, 0.02, 0.0]);

        assert_eq!(segments.len(), 1);
        assert!(segments[0].is_open());
        assert_eq!(segments[0].periods_held(4), 2);
    }

    #[test]
    fn all_flat_has_no_segments() {
        let segments = extract_segments(&[F, F, F], &[0.0, 0.0, 0.0]);
        let stats = TradeStats::from_segments(&segments);

        assert!(segments.is_empty());
        assert_eq!(stats.round_trips, 0);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.avg_trade_return, 0.0);
    }

    #[test]
    fn stats_split_wins_and_losses() {
        let segments = extract_segments(&[L, S, L, F], &[0.0, 0.05, -0.02, 0.0]);
        let stats = TradeStats::from_segments(&segments);

        assert_eq!(stats.round_trips, 3);
        assert_eq!(stats.winning_trades, 1);
        assert_eq!(stats.losing_trades, 1);
        assert_relative_eq!(stats.win_rate, 0.5);
        assert_relative_eq!(stats.largest_win, 0.05, epsilon = 1e-12);
        assert_relative_eq!(stats.largest_loss, -0.02, epsilon = 1e-12);
    }
}
