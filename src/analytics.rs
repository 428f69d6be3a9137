//! Aggregate statistics over a user's trades: dashboard stats, per-dimension
//! breakdowns, the equity curve, and goal progress. Everything here is a pure
//! linear scan over already-fetched trades.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Goal, GoalTargetType, Trade, TradeResult, User};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    pub total_trades: usize,
    pub open_trades: usize,
    pub closed_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    /// Percent of decided trades (wins + losses) won.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_pips: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub average_risk_reward: f64,
    /// Percent of closed trades where the plan was followed.
    pub plan_followed_rate: f64,
    pub revenge_trades: usize,
    pub over_leveraged_trades: usize,
    pub moved_stop_loss_trades: usize,
}

pub fn compute_stats(trades: &[Trade]) -> TradeStats {
    let closed: Vec<&Trade> = trades.iter().filter(|t| t.is_closed()).collect();
    let open_trades = trades.len() - closed.len();

    let wins = closed
        .iter()
        .filter(|t| t.result == Some(TradeResult::Win))
        .count();
    let losses = closed
        .iter()
        .filter(|t| t.result == Some(TradeResult::Loss))
        .count();
    let breakevens = closed
        .iter()
        .filter(|t| t.result == Some(TradeResult::Breakeven))
        .count();

    let decided = wins + losses;
    let win_rate = if decided > 0 {
        wins as f64 / decided as f64 * 100.0
    } else {
        0.0
    };

    let pnls: Vec<f64> = closed.iter().filter_map(|t| t.profit_loss).collect();
    let total_pnl: f64 = pnls.iter().sum();
    let gross_profit: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|p| **p < 0.0).sum::<f64>().abs();

    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let win_count = pnls.iter().filter(|p| **p > 0.0).count();
    let loss_count = pnls.iter().filter(|p| **p < 0.0).count();
    let average_win = if win_count > 0 { gross_profit / win_count as f64 } else { 0.0 };
    let average_loss = if loss_count > 0 { gross_loss / loss_count as f64 } else { 0.0 };
    let largest_win = pnls.iter().cloned().fold(0.0, f64::max);
    let largest_loss = pnls.iter().cloned().fold(0.0, f64::min);

    let total_pips: f64 = closed.iter().filter_map(|t| t.pips).sum();

    let rrs: Vec<f64> = trades.iter().filter_map(|t| t.risk_reward()).collect();
    let average_risk_reward = if rrs.is_empty() {
        0.0
    } else {
        rrs.iter().sum::<f64>() / rrs.len() as f64
    };

    let plan_followed_rate = if closed.is_empty() {
        0.0
    } else {
        closed.iter().filter(|t| t.followed_plan).count() as f64 / closed.len() as f64 * 100.0
    };

    TradeStats {
        total_trades: trades.len(),
        open_trades,
        closed_trades: closed.len(),
        wins,
        losses,
        breakevens,
        win_rate,
        total_pnl,
        total_pips,
        gross_profit,
        gross_loss,
        profit_factor,
        average_win,
        average_loss,
        largest_win,
        largest_loss,
        average_risk_reward,
        plan_followed_rate,
        revenge_trades: trades.iter().filter(|t| t.revenge_trade).count(),
        over_leveraged_trades: trades.iter().filter(|t| t.over_leveraged).count(),
        moved_stop_loss_trades: trades.iter().filter(|t| t.moved_stop_loss).count(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownRow {
    pub key: String,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
}

fn breakdown_by<F>(trades: &[Trade], key_of: F) -> Vec<BreakdownRow>
where
    F: Fn(&Trade) -> Option<String>,
{
    let mut rows: HashMap<String, BreakdownRow> = HashMap::new();
    for trade in trades.iter().filter(|t| t.is_closed()) {
        let Some(key) = key_of(trade) else { continue };
        let row = rows.entry(key.clone()).or_insert_with(|| BreakdownRow {
            key,
            trades: 0,
            wins: 0,
            losses: 0,
            win_rate: 0.0,
            total_pnl: 0.0,
        });
        row.trades += 1;
        match trade.result {
            Some(TradeResult::Win) => row.wins += 1,
            Some(TradeResult::Loss) => row.losses += 1,
            _ => {}
        }
        row.total_pnl += trade.profit_loss.unwrap_or(0.0);
    }

    let mut rows: Vec<BreakdownRow> = rows.into_values().collect();
    for row in &mut rows {
        let decided = row.wins + row.losses;
        if decided > 0 {
            row.win_rate = row.wins as f64 / decided as f64 * 100.0;
        }
    }
    rows.sort_by(|a, b| b.total_pnl.partial_cmp(&a.total_pnl).unwrap_or(std::cmp::Ordering::Equal));
    rows
}

pub fn breakdown_by_pair(trades: &[Trade]) -> Vec<BreakdownRow> {
    breakdown_by(trades, |t| Some(t.pair.clone()))
}

pub fn breakdown_by_strategy(trades: &[Trade]) -> Vec<BreakdownRow> {
    breakdown_by(trades, |t| t.strategy_id.clone())
}

pub fn breakdown_by_session(trades: &[Trade]) -> Vec<BreakdownRow> {
    breakdown_by(trades, |t| {
        t.session.map(|s| {
            serde_json::to_value(s)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default()
        })
    })
}

pub fn breakdown_by_emotion(trades: &[Trade]) -> Vec<BreakdownRow> {
    breakdown_by(trades, |t| t.emotion.clone())
}

/// Everything the dashboard shows at once: headline stats plus the
/// per-dimension breakdowns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub stats: TradeStats,
    pub by_pair: Vec<BreakdownRow>,
    pub by_strategy: Vec<BreakdownRow>,
    pub by_session: Vec<BreakdownRow>,
    pub by_emotion: Vec<BreakdownRow>,
}

pub fn compute_report(trades: &[Trade]) -> AnalyticsReport {
    AnalyticsReport {
        stats: compute_stats(trades),
        by_pair: breakdown_by_pair(trades),
        by_strategy: breakdown_by_strategy(trades),
        by_session: breakdown_by_session(trades),
        by_emotion: breakdown_by_emotion(trades),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityCurvePoint {
    /// "YYYY-MM-DD"
    pub date: String,
    pub daily_pnl: f64,
    pub cumulative_pnl: f64,
    /// initial balance + cumulative P/L at end of day
    pub balance: f64,
    pub trade_count: usize,
}

/// Daily buckets of closed-trade P/L, cumulative over the whole window.
pub fn equity_curve(trades: &[Trade], initial_balance: f64) -> Vec<EquityCurvePoint> {
    let mut daily: HashMap<String, (f64, usize)> = HashMap::new();
    for trade in trades.iter().filter(|t| t.is_closed()) {
        let (Some(close), Some(pnl)) = (trade.close_date, trade.profit_loss) else {
            continue;
        };
        let Some(ts) = DateTime::from_timestamp(close, 0) else {
            continue;
        };
        let date = ts.format("%Y-%m-%d").to_string();
        let entry = daily.entry(date).or_insert((0.0, 0));
        entry.0 += pnl;
        entry.1 += 1;
    }

    let mut days: Vec<(String, (f64, usize))> = daily.into_iter().collect();
    days.sort_by(|a, b| a.0.cmp(&b.0));

    let mut cumulative = 0.0;
    let mut curve = Vec::with_capacity(days.len());
    for (date, (daily_pnl, trade_count)) in days {
        cumulative += daily_pnl;
        curve.push(EquityCurvePoint {
            date,
            daily_pnl,
            cumulative_pnl: cumulative,
            balance: initial_balance + cumulative,
            trade_count,
        });
    }
    curve
}

/// Lower close-date bound for the dashboard range keywords; None means all
/// time (and on unknown keywords, which mirrors the original behavior).
pub fn range_threshold(range: Option<&str>) -> Option<i64> {
    let now = Utc::now();
    match range {
        Some("today") => now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc().timestamp()),
        Some("week") => Some(now.timestamp() - 7 * 24 * 60 * 60),
        Some("month") => Some(now.timestamp() - 30 * 24 * 60 * 60),
        Some("3months") => Some(now.timestamp() - 90 * 24 * 60 * 60),
        Some("6months") => Some(now.timestamp() - 180 * 24 * 60 * 60),
        Some("year") => Some(now.timestamp() - 365 * 24 * 60 * 60),
        _ => None,
    }
}

/// Keeps open trades and closed trades whose close date is inside the range.
pub fn filter_by_range(trades: Vec<Trade>, range: Option<&str>) -> Vec<Trade> {
    match range_threshold(range) {
        Some(threshold) => trades
            .into_iter()
            .filter(|t| !t.is_closed() || t.close_date.map_or(false, |c| c >= threshold))
            .collect(),
        None => trades,
    }
}

/// Recomputes a goal's current value from trade stats. Closed trades whose
/// close date falls in the goal window contribute; BALANCE goals track the
/// user's derived balance directly.
pub fn goal_current_value(goal: &Goal, trades: &[Trade], user: &User) -> f64 {
    let in_window: Vec<Trade> = trades
        .iter()
        .filter(|t| {
            t.is_closed()
                && t.close_date
                    .map_or(false, |c| c >= goal.start_date && c <= goal.end_date)
        })
        .cloned()
        .collect();
    let stats = compute_stats(&in_window);

    match goal.target_type {
        GoalTargetType::Profit => stats.total_pnl,
        GoalTargetType::WinRate => stats.win_rate,
        GoalTargetType::ProfitFactor => stats.profit_factor,
        GoalTargetType::RiskRewardRatio => stats.average_risk_reward,
        GoalTargetType::Balance => user.current_balance,
        GoalTargetType::Trades => stats.closed_trades as f64,
    }
}

pub fn goal_completed(goal: &Goal, current_value: f64) -> bool {
    current_value >= goal.target_value
}

/// Per-user cache of dashboard stats, invalidated by the trade-update bus so
/// widgets can poll `/api/analytics/stats` cheaply between writes.
#[derive(Default)]
pub struct StatsCache {
    entries: Mutex<HashMap<String, AnalyticsReport>>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative ranges resolve against the clock, so the cache day is part of
    /// the key: a report filled yesterday misses today and gets recomputed
    /// with a fresh threshold.
    fn key_on(user_id: &str, range: Option<&str>, day: &str) -> String {
        format!("{}:{}:{}", user_id, range.unwrap_or("all"), day)
    }

    fn key(user_id: &str, range: Option<&str>) -> String {
        Self::key_on(
            user_id,
            range,
            &Utc::now().format("%Y-%m-%d").to_string(),
        )
    }

    pub fn get(&self, user_id: &str, range: Option<&str>) -> Option<AnalyticsReport> {
        self.entries
            .lock()
            .ok()?
            .get(&Self::key(user_id, range))
            .cloned()
    }

    pub fn put(&self, user_id: &str, range: Option<&str>, report: AnalyticsReport) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(Self::key(user_id, range), report);
        }
    }

    /// Drops every cached range for the user.
    pub fn invalidate(&self, user_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|key, _| !key.starts_with(&format!("{}:", user_id)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, GoalPriority, TradeSession};

    fn closed(pnl: f64, result: TradeResult, close_date: i64) -> Trade {
        Trade {
            id: format!("TRADE-{}", close_date),
            user_id: "USER-1".to_string(),
            pair: "EUR/USD".to_string(),
            direction: Direction::Buy,
            entry_price: 1.1,
            exit_price: None,
            stop_loss: None,
            take_profit: None,
            lot_size: 1.0,
            pips: None,
            profit_loss: Some(pnl),
            strategy_id: None,
            session: Some(TradeSession::London),
            emotion: Some("calm".to_string()),
            open_date: close_date - 3600,
            close_date: Some(close_date),
            result: Some(result),
            entry_chart_h1: None,
            entry_chart_m15: None,
            exit_chart_h1: None,
            exit_chart_m15: None,
            followed_plan: true,
            revenge_trade: false,
            over_leveraged: false,
            moved_stop_loss: false,
            notes: String::new(),
            created_at: close_date,
            updated_at: close_date,
        }
    }

    #[test]
    fn stats_basics() {
        let trades = vec![
            closed(100.0, TradeResult::Win, 1_700_000_000),
            closed(-40.0, TradeResult::Loss, 1_700_086_400),
            closed(0.0, TradeResult::Breakeven, 1_700_172_800),
        ];
        let stats = compute_stats(&trades);
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.breakevens, 1);
        assert!((stats.win_rate - 50.0).abs() < 1e-6);
        assert!((stats.total_pnl - 60.0).abs() < 1e-6);
        assert!((stats.profit_factor - 2.5).abs() < 1e-6);
        assert!((stats.largest_win - 100.0).abs() < 1e-6);
        assert!((stats.largest_loss + 40.0).abs() < 1e-6);
    }

    #[test]
    fn profit_factor_edges() {
        let only_wins = vec![closed(50.0, TradeResult::Win, 1_700_000_000)];
        assert!(compute_stats(&only_wins).profit_factor.is_infinite());

        let nothing: Vec<Trade> = vec![];
        assert_eq!(compute_stats(&nothing).profit_factor, 0.0);
    }

    #[test]
    fn equity_curve_accumulates_per_day() {
        // Two trades the same day, one the next day.
        let day1 = 1_700_000_000;
        let day2 = day1 + 86_400;
        let trades = vec![
            closed(100.0, TradeResult::Win, day1),
            closed(-30.0, TradeResult::Loss, day1 + 60),
            closed(20.0, TradeResult::Win, day2),
        ];
        let curve = equity_curve(&trades, 10_000.0);
        assert_eq!(curve.len(), 2);
        assert!((curve[0].daily_pnl - 70.0).abs() < 1e-6);
        assert_eq!(curve[0].trade_count, 2);
        assert!((curve[1].cumulative_pnl - 90.0).abs() < 1e-6);
        assert!((curve[1].balance - 10_090.0).abs() < 1e-6);
    }

    #[test]
    fn breakdowns_group_and_rank() {
        let mut gbp = closed(-50.0, TradeResult::Loss, 1_700_000_000);
        gbp.pair = "GBP/USD".to_string();
        let trades = vec![
            closed(100.0, TradeResult::Win, 1_700_000_100),
            closed(30.0, TradeResult::Win, 1_700_000_200),
            gbp,
        ];
        let rows = breakdown_by_pair(&trades);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, "EUR/USD");
        assert_eq!(rows[0].wins, 2);
        assert!((rows[0].win_rate - 100.0).abs() < 1e-6);
        assert_eq!(rows[1].key, "GBP/USD");
    }

    #[test]
    fn session_breakdown_uses_wire_names() {
        let trades = vec![closed(10.0, TradeResult::Win, 1_700_000_000)];
        let rows = breakdown_by_session(&trades);
        assert_eq!(rows[0].key, "LONDON");
    }

    #[test]
    fn goal_progress_by_type() {
        let user = User {
            id: "USER-1".to_string(),
            username: "trader1".to_string(),
            password_hash: String::new(),
            initial_balance: 10_000.0,
            current_balance: 10_060.0,
            settings: Default::default(),
            created_at: 0,
            updated_at: 0,
        };
        let trades = vec![
            closed(100.0, TradeResult::Win, 1_700_000_000),
            closed(-40.0, TradeResult::Loss, 1_700_086_400),
        ];
        let mut goal = Goal {
            id: "GOAL-1".to_string(),
            user_id: user.id.clone(),
            title: "Profit".to_string(),
            target_type: GoalTargetType::Profit,
            target_value: 50.0,
            current_value: 0.0,
            start_date: 1_699_999_999,
            end_date: 1_700_100_000,
            priority: GoalPriority::Medium,
            completed: false,
            milestones: vec![],
            created_at: 0,
            updated_at: 0,
        };

        let value = goal_current_value(&goal, &trades, &user);
        assert!((value - 60.0).abs() < 1e-6);
        assert!(goal_completed(&goal, value));

        goal.target_type = GoalTargetType::Trades;
        assert!((goal_current_value(&goal, &trades, &user) - 2.0).abs() < 1e-6);

        goal.target_type = GoalTargetType::Balance;
        assert!((goal_current_value(&goal, &trades, &user) - 10_060.0).abs() < 1e-6);

        // Window excludes the losing trade
        goal.target_type = GoalTargetType::Profit;
        goal.end_date = 1_700_000_500;
        assert!((goal_current_value(&goal, &trades, &user) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn cached_reports_do_not_cross_day_boundaries() {
        let yesterday = StatsCache::key_on("USER-1", Some("today"), "2026-08-29");
        let today = StatsCache::key_on("USER-1", Some("today"), "2026-08-30");
        assert_ne!(yesterday, today);
        // All-time reports roll over too; the threshold table treats unknown
        // and absent ranges alike.
        assert_ne!(
            StatsCache::key_on("USER-1", None, "2026-08-29"),
            StatsCache::key_on("USER-1", None, "2026-08-30"),
        );
    }

    #[test]
    fn stats_cache_roundtrip_and_invalidation() {
        let cache = StatsCache::new();
        let report = compute_report(&[closed(10.0, TradeResult::Win, 1_700_000_000)]);
        cache.put("USER-1", None, report.clone());
        cache.put("USER-1", Some("week"), report);

        assert!(cache.get("USER-1", None).is_some());
        cache.invalidate("USER-1");
        assert!(cache.get("USER-1", None).is_none());
        assert!(cache.get("USER-1", Some("week")).is_none());
    }
}
