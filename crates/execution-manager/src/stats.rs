use serde::{Deserialize, Serialize};

/// Running trade statistics, updated once per closed trade. A trade with
/// profit above zero counts as a win; zero or negative counts as a loss.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub trades_total: u32,
    pub wins: u32,
    pub losses: u32,
    /// Sum of winning trade profits.
    pub gross_profit: f64,
    /// Sum of losing trade magnitudes (stored positive).
    pub gross_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl PerformanceStats {
    pub fn record(&mut self, profit: f64) {
        self.trades_total += 1;
        if profit > 0.0 {
            self.wins += 1;
            self.gross_profit += profit;
            self.largest_win = self.largest_win.max(profit);
        } else {
            self.losses += 1;
            self.gross_loss += profit.abs();
            self.largest_loss = self.largest_loss.max(profit.abs());
        }
    }

    pub fn net_profit(&self) -> f64 {
        self.gross_profit - self.gross_loss
    }

    /// Percentage of trades that were wins.
    pub fn win_rate(&self) -> f64 {
        if self.trades_total == 0 {
            return 0.0;
        }
        self.wins as f64 / self.trades_total as f64 * 100.0
    }

    /// Gross profit over gross loss. Infinite when nothing has been lost.
    pub fn profit_factor(&self) -> f64 {
        if self.gross_loss == 0.0 {
            if self.gross_profit > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            self.gross_profit / self.gross_loss
        }
    }

    /// Average profit per trade.
    pub fn expectancy(&self) -> f64 {
        if self.trades_total == 0 {
            return 0.0;
        }
        self.net_profit() / self.trades_total as f64
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
