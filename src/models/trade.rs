use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeResult {
    Win,
    Loss,
    Breakeven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSession {
    London,
    NewYork,
    Asian,
    Sydney,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub user_id: String,
    pub pair: String,
    pub direction: Direction,

    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub lot_size: f64,

    pub pips: Option<f64>,
    pub profit_loss: Option<f64>,

    pub strategy_id: Option<String>,
    pub session: Option<TradeSession>,
    pub emotion: Option<String>,

    pub open_date: i64,
    pub close_date: Option<i64>,
    pub result: Option<TradeResult>,

    pub entry_chart_h1: Option<String>,
    pub entry_chart_m15: Option<String>,
    pub exit_chart_h1: Option<String>,
    pub exit_chart_m15: Option<String>,

    pub followed_plan: bool,
    pub revenge_trade: bool,
    pub over_leveraged: bool,
    pub moved_stop_loss: bool,

    pub notes: String,

    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTradeInput {
    pub user_id: String,
    pub pair: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub lot_size: f64,
    /// Broker-reported P/L overrides the derived pip value when present.
    pub profit_loss: Option<f64>,
    pub strategy_id: Option<String>,
    pub session: Option<TradeSession>,
    pub emotion: Option<String>,
    pub open_date: Option<i64>,
    pub close_date: Option<i64>,
    pub result: Option<TradeResult>,
    #[serde(default)]
    pub followed_plan: bool,
    #[serde(default)]
    pub revenge_trade: bool,
    #[serde(default)]
    pub over_leveraged: bool,
    #[serde(default)]
    pub moved_stop_loss: bool,
    #[serde(default)]
    pub notes: String,
}

/// Shallow-merge update: only provided fields are patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTradeInput {
    pub pair: Option<String>,
    pub direction: Option<Direction>,
    pub entry_price: Option<f64>,
    pub exit_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub lot_size: Option<f64>,
    pub profit_loss: Option<f64>,
    pub strategy_id: Option<String>,
    pub session: Option<TradeSession>,
    pub emotion: Option<String>,
    pub close_date: Option<i64>,
    pub result: Option<TradeResult>,
    pub entry_chart_h1: Option<String>,
    pub entry_chart_m15: Option<String>,
    pub exit_chart_h1: Option<String>,
    pub exit_chart_m15: Option<String>,
    pub followed_plan: Option<bool>,
    pub revenge_trade: Option<bool>,
    pub over_leveraged: Option<bool>,
    pub moved_stop_loss: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeFilters {
    pub user_id: Option<String>,
    /// "open" | "closed" | "all"
    pub status: Option<String>,
    pub pair: Option<String>,
    pub strategy_id: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn pair_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z]{3}/[A-Z]{3}$").unwrap())
}

/// Instrument pairs are quoted as "EUR/USD".
pub fn is_valid_pair(pair: &str) -> bool {
    pair_pattern().is_match(pair)
}

/// Pip size: JPY-quoted pairs move in hundredths, everything else in
/// ten-thousandths.
pub fn pip_size(pair: &str) -> f64 {
    if pair.ends_with("JPY") {
        0.01
    } else {
        0.0001
    }
}

/// Signed pip distance from entry to exit. BUY profits on a rising price,
/// SELL on a falling one.
pub fn compute_pips(pair: &str, direction: Direction, entry: f64, exit: f64) -> f64 {
    let raw = (exit - entry) / pip_size(pair);
    match direction {
        Direction::Buy => raw,
        Direction::Sell => -raw,
    }
}

/// Standard-lot valuation: one pip on one lot is $10.
pub fn pips_to_profit(pips: f64, lot_size: f64) -> f64 {
    pips * lot_size * 10.0
}

impl Trade {
    /// Closed iff both the close date and the result are recorded.
    pub fn is_closed(&self) -> bool {
        self.close_date.is_some() && self.result.is_some()
    }

    /// Planned risk/reward from entry, stop and target distances.
    pub fn risk_reward(&self) -> Option<f64> {
        let stop = self.stop_loss?;
        let target = self.take_profit?;
        let risk = (self.entry_price - stop).abs();
        let reward = (target - self.entry_price).abs();
        if risk > 0.0 {
            Some(reward / risk)
        } else {
            None
        }
    }

    /// Re-derives pips and profit/loss from prices. An explicitly recorded
    /// profit_loss (broker-reported) is left untouched.
    pub fn recompute_derived(&mut self, keep_explicit_pnl: bool) {
        if let Some(exit) = self.exit_price {
            let pips = compute_pips(&self.pair, self.direction, self.entry_price, exit);
            self.pips = Some(pips);
            if !keep_explicit_pnl {
                self.profit_loss = Some(pips_to_profit(pips, self.lot_size));
            }
        } else {
            self.pips = None;
            if !keep_explicit_pnl {
                self.profit_loss = None;
            }
        }
    }
}
