use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CreateGoalInput, CreateStrategyInput, CreateTradeInput, Goal, GoalMilestone, MilestoneInput,
    Trade, TradeFilters, TradingStrategy, UpdateGoalInput, UpdateStrategyInput, UpdateTradeInput,
    UpdateUserInput, User, UserSettings,
};
use crate::models::{compute_pips, is_valid_pair, pips_to_profit};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("username already taken: {0}")]
    UsernameTaken(String),

    #[error("validation failed: {0}")]
    Validation(String),
}

type Result<T> = std::result::Result<T, StorageError>;

fn new_id(prefix: &str) -> String {
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), Uuid::new_v4())
}

fn now() -> i64 {
    Utc::now().timestamp()
}

#[derive(Default)]
struct StorageInner {
    users: HashMap<String, User>,
    trades: HashMap<String, Trade>,
    strategies: HashMap<String, TradingStrategy>,
    goals: HashMap<String, Goal>,
}

/// In-memory datastore for users, trades, strategies and goals. Plain maps
/// behind a single mutex, O(n) scans, nothing survives a restart. Balances
/// are derived state, recomputed after every trade mutation.
pub struct MemStorage {
    inner: Mutex<StorageInner>,
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStorage {
    pub fn new() -> Self {
        MemStorage {
            inner: Mutex::new(StorageInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StorageInner> {
        // A poisoned lock means a panic mid-mutation; the maps are still
        // structurally sound, so keep serving.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    // ----- users -----

    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        initial_balance: f64,
    ) -> Result<User> {
        if username.trim().is_empty() {
            return Err(StorageError::Validation("username must not be empty".into()));
        }
        let mut inner = self.lock();
        if inner
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(username))
        {
            return Err(StorageError::UsernameTaken(username.to_string()));
        }

        let ts = now();
        let user = User {
            id: new_id("USER"),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            initial_balance,
            current_balance: initial_balance,
            settings: UserSettings::default(),
            created_at: ts,
            updated_at: ts,
        };
        inner.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Result<User> {
        self.lock()
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { entity: "user", id: id.to_string() })
    }

    pub fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.lock()
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned()
    }

    pub fn update_user(&self, id: &str, input: UpdateUserInput) -> Result<User> {
        let mut inner = self.lock();
        {
            let user = inner
                .users
                .get_mut(id)
                .ok_or_else(|| StorageError::NotFound { entity: "user", id: id.to_string() })?;

            if let Some(balance) = input.initial_balance {
                user.initial_balance = balance;
            }
            if let Some(currency) = input.currency {
                user.settings.currency = currency;
            }
            if let Some(risk) = input.risk_percent {
                user.settings.risk_percent = risk;
            }
            if let Some(pair) = input.default_pair {
                user.settings.default_pair = pair;
            }
            user.updated_at = now();
        }
        // initial_balance feeds the derived current_balance
        recompute_balance(&mut inner, id);
        Ok(inner.users[id].clone())
    }

    /// Deletes the user and, by explicit iteration, everything they own.
    pub fn delete_user(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner
            .users
            .remove(id)
            .ok_or_else(|| StorageError::NotFound { entity: "user", id: id.to_string() })?;
        inner.trades.retain(|_, t| t.user_id != id);
        inner.strategies.retain(|_, s| s.user_id != id);
        inner.goals.retain(|_, g| g.user_id != id);
        Ok(())
    }

    // ----- trades -----

    pub fn create_trade(&self, input: CreateTradeInput) -> Result<Trade> {
        if !is_valid_pair(&input.pair) {
            return Err(StorageError::Validation(format!(
                "invalid instrument pair: {}",
                input.pair
            )));
        }
        if input.lot_size <= 0.0 {
            return Err(StorageError::Validation("lot size must be positive".into()));
        }

        let mut inner = self.lock();
        if !inner.users.contains_key(&input.user_id) {
            return Err(StorageError::NotFound {
                entity: "user",
                id: input.user_id.clone(),
            });
        }

        let ts = now();
        let keep_explicit_pnl = input.profit_loss.is_some();
        let mut trade = Trade {
            id: new_id("TRADE"),
            user_id: input.user_id.clone(),
            pair: input.pair,
            direction: input.direction,
            entry_price: input.entry_price,
            exit_price: input.exit_price,
            stop_loss: input.stop_loss,
            take_profit: input.take_profit,
            lot_size: input.lot_size,
            pips: None,
            profit_loss: input.profit_loss,
            strategy_id: input.strategy_id,
            session: input.session,
            emotion: input.emotion,
            open_date: input.open_date.unwrap_or(ts),
            close_date: input.close_date,
            result: input.result,
            entry_chart_h1: None,
            entry_chart_m15: None,
            exit_chart_h1: None,
            exit_chart_m15: None,
            followed_plan: input.followed_plan,
            revenge_trade: input.revenge_trade,
            over_leveraged: input.over_leveraged,
            moved_stop_loss: input.moved_stop_loss,
            notes: input.notes,
            created_at: ts,
            updated_at: ts,
        };
        trade.recompute_derived(keep_explicit_pnl);

        let user_id = trade.user_id.clone();
        inner.trades.insert(trade.id.clone(), trade.clone());
        recompute_balance(&mut inner, &user_id);
        Ok(trade)
    }

    pub fn get_trade(&self, id: &str) -> Result<Trade> {
        self.lock()
            .trades
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { entity: "trade", id: id.to_string() })
    }

    pub fn list_trades(&self, filters: &TradeFilters) -> Vec<Trade> {
        let inner = self.lock();
        let mut trades: Vec<Trade> = inner
            .trades
            .values()
            .filter(|t| match &filters.user_id {
                Some(uid) => &t.user_id == uid,
                None => true,
            })
            .filter(|t| match filters.status.as_deref() {
                Some("open") => !t.is_closed(),
                Some("closed") => t.is_closed(),
                _ => true,
            })
            .filter(|t| match &filters.pair {
                Some(pair) => t.pair.contains(pair.as_str()),
                None => true,
            })
            .filter(|t| match &filters.strategy_id {
                Some(sid) => t.strategy_id.as_deref() == Some(sid.as_str()),
                None => true,
            })
            .filter(|t| filters.start_date.map_or(true, |s| t.open_date >= s))
            .filter(|t| filters.end_date.map_or(true, |e| t.open_date <= e))
            .cloned()
            .collect();

        trades.sort_by(|a, b| b.open_date.cmp(&a.open_date));

        if let (Some(page), Some(limit)) = (filters.page, filters.limit) {
            let page = page.max(1) as usize;
            let limit = limit as usize;
            let offset = (page - 1) * limit;
            trades = trades.into_iter().skip(offset).take(limit).collect();
        }
        trades
    }

    pub fn update_trade(&self, id: &str, input: UpdateTradeInput) -> Result<Trade> {
        let mut inner = self.lock();
        let user_id = {
            let trade = inner
                .trades
                .get_mut(id)
                .ok_or_else(|| StorageError::NotFound { entity: "trade", id: id.to_string() })?;

            if let Some(pair) = &input.pair {
                if !is_valid_pair(pair) {
                    return Err(StorageError::Validation(format!(
                        "invalid instrument pair: {}",
                        pair
                    )));
                }
            }
            if let Some(lots) = input.lot_size {
                if lots <= 0.0 {
                    return Err(StorageError::Validation("lot size must be positive".into()));
                }
            }

            let prices_touched = input.pair.is_some()
                || input.direction.is_some()
                || input.entry_price.is_some()
                || input.exit_price.is_some()
                || input.lot_size.is_some();

            if let Some(pair) = input.pair {
                trade.pair = pair;
            }
            if let Some(direction) = input.direction {
                trade.direction = direction;
            }
            if let Some(entry) = input.entry_price {
                trade.entry_price = entry;
            }
            if let Some(exit) = input.exit_price {
                trade.exit_price = Some(exit);
            }
            if let Some(stop) = input.stop_loss {
                trade.stop_loss = Some(stop);
            }
            if let Some(target) = input.take_profit {
                trade.take_profit = Some(target);
            }
            if let Some(lots) = input.lot_size {
                trade.lot_size = lots;
            }
            if let Some(strategy_id) = input.strategy_id {
                trade.strategy_id = Some(strategy_id);
            }
            if let Some(session) = input.session {
                trade.session = Some(session);
            }
            if let Some(emotion) = input.emotion {
                trade.emotion = Some(emotion);
            }
            if let Some(close_date) = input.close_date {
                trade.close_date = Some(close_date);
            }
            if let Some(result) = input.result {
                trade.result = Some(result);
            }
            if let Some(url) = input.entry_chart_h1 {
                trade.entry_chart_h1 = Some(url);
            }
            if let Some(url) = input.entry_chart_m15 {
                trade.entry_chart_m15 = Some(url);
            }
            if let Some(url) = input.exit_chart_h1 {
                trade.exit_chart_h1 = Some(url);
            }
            if let Some(url) = input.exit_chart_m15 {
                trade.exit_chart_m15 = Some(url);
            }
            if let Some(flag) = input.followed_plan {
                trade.followed_plan = flag;
            }
            if let Some(flag) = input.revenge_trade {
                trade.revenge_trade = flag;
            }
            if let Some(flag) = input.over_leveraged {
                trade.over_leveraged = flag;
            }
            if let Some(flag) = input.moved_stop_loss {
                trade.moved_stop_loss = flag;
            }
            if let Some(notes) = input.notes {
                trade.notes = notes;
            }

            // Derived fields: pips always follow the prices; profit/loss is
            // re-derived only when prices changed and no explicit override
            // came with this update.
            if let Some(exit) = trade.exit_price {
                let pips = compute_pips(&trade.pair, trade.direction, trade.entry_price, exit);
                trade.pips = Some(pips);
                if prices_touched && input.profit_loss.is_none() {
                    trade.profit_loss = Some(pips_to_profit(pips, trade.lot_size));
                }
            }
            if let Some(pnl) = input.profit_loss {
                trade.profit_loss = Some(pnl);
            }

            trade.updated_at = now();
            trade.user_id.clone()
        };

        recompute_balance(&mut inner, &user_id);
        Ok(inner.trades[id].clone())
    }

    pub fn delete_trade(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        let trade = inner
            .trades
            .remove(id)
            .ok_or_else(|| StorageError::NotFound { entity: "trade", id: id.to_string() })?;
        recompute_balance(&mut inner, &trade.user_id);
        Ok(())
    }

    pub fn trades_for_user(&self, user_id: &str) -> Vec<Trade> {
        self.lock()
            .trades
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    // ----- strategies -----

    pub fn create_strategy(&self, input: CreateStrategyInput) -> Result<TradingStrategy> {
        if input.name.trim().is_empty() {
            return Err(StorageError::Validation("strategy name must not be empty".into()));
        }
        let mut inner = self.lock();
        if !inner.users.contains_key(&input.user_id) {
            return Err(StorageError::NotFound {
                entity: "user",
                id: input.user_id.clone(),
            });
        }

        let ts = now();
        let strategy = TradingStrategy {
            id: new_id("STRAT"),
            user_id: input.user_id,
            name: input.name,
            description: input.description,
            rules: input.rules,
            entry_conditions: input.entry_conditions,
            exit_conditions: input.exit_conditions,
            timeframes: input.timeframes,
            risk_reward_ratio: input.risk_reward_ratio,
            is_default: input.is_default,
            created_at: ts,
            updated_at: ts,
        };
        inner.strategies.insert(strategy.id.clone(), strategy.clone());
        if strategy.is_default {
            clear_other_defaults(&mut inner, &strategy.user_id, &strategy.id);
        }
        Ok(strategy)
    }

    pub fn get_strategy(&self, id: &str) -> Result<TradingStrategy> {
        self.lock()
            .strategies
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { entity: "strategy", id: id.to_string() })
    }

    pub fn strategies_for_user(&self, user_id: &str) -> Vec<TradingStrategy> {
        let mut strategies: Vec<TradingStrategy> = self
            .lock()
            .strategies
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        strategies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        strategies
    }

    pub fn update_strategy(&self, id: &str, input: UpdateStrategyInput) -> Result<TradingStrategy> {
        let mut inner = self.lock();
        let (user_id, became_default) = {
            let strategy = inner
                .strategies
                .get_mut(id)
                .ok_or_else(|| StorageError::NotFound { entity: "strategy", id: id.to_string() })?;

            if let Some(name) = input.name {
                strategy.name = name;
            }
            if let Some(description) = input.description {
                strategy.description = description;
            }
            if let Some(rules) = input.rules {
                strategy.rules = rules;
            }
            if let Some(entry) = input.entry_conditions {
                strategy.entry_conditions = entry;
            }
            if let Some(exit) = input.exit_conditions {
                strategy.exit_conditions = exit;
            }
            if let Some(timeframes) = input.timeframes {
                strategy.timeframes = timeframes;
            }
            if let Some(rr) = input.risk_reward_ratio {
                strategy.risk_reward_ratio = rr;
            }
            let became_default = match input.is_default {
                Some(flag) => {
                    strategy.is_default = flag;
                    flag
                }
                None => false,
            };
            strategy.updated_at = now();
            (strategy.user_id.clone(), became_default)
        };

        if became_default {
            clear_other_defaults(&mut inner, &user_id, id);
        }
        Ok(inner.strategies[id].clone())
    }

    /// Marks the strategy as the user's default, then scans and clears the
    /// flag on every other strategy of that user (the reactive fixup).
    pub fn set_default_strategy(&self, id: &str) -> Result<TradingStrategy> {
        let mut inner = self.lock();
        let user_id = {
            let strategy = inner
                .strategies
                .get_mut(id)
                .ok_or_else(|| StorageError::NotFound { entity: "strategy", id: id.to_string() })?;
            strategy.is_default = true;
            strategy.updated_at = now();
            strategy.user_id.clone()
        };
        clear_other_defaults(&mut inner, &user_id, id);
        Ok(inner.strategies[id].clone())
    }

    /// Referenced trades keep their strategy_id; dangling references are
    /// accepted (no foreign keys here).
    pub fn delete_strategy(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner
            .strategies
            .remove(id)
            .ok_or_else(|| StorageError::NotFound { entity: "strategy", id: id.to_string() })?;
        Ok(())
    }

    // ----- goals & milestones -----

    pub fn create_goal(&self, input: CreateGoalInput) -> Result<Goal> {
        let mut inner = self.lock();
        if !inner.users.contains_key(&input.user_id) {
            return Err(StorageError::NotFound {
                entity: "user",
                id: input.user_id.clone(),
            });
        }
        if input.end_date < input.start_date {
            return Err(StorageError::Validation("goal end date precedes start date".into()));
        }

        let ts = now();
        let milestones = input
            .milestones
            .into_iter()
            .map(|m| GoalMilestone {
                id: new_id("MILESTONE"),
                title: m.title,
                target_value: m.target_value,
                completed: m.completed,
            })
            .collect();
        let goal = Goal {
            id: new_id("GOAL"),
            user_id: input.user_id,
            title: input.title,
            target_type: input.target_type,
            target_value: input.target_value,
            current_value: 0.0,
            start_date: input.start_date,
            end_date: input.end_date,
            priority: input.priority,
            completed: false,
            milestones,
            created_at: ts,
            updated_at: ts,
        };
        inner.goals.insert(goal.id.clone(), goal.clone());
        Ok(goal)
    }

    pub fn get_goal(&self, id: &str) -> Result<Goal> {
        self.lock()
            .goals
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { entity: "goal", id: id.to_string() })
    }

    pub fn goals_for_user(&self, user_id: &str) -> Vec<Goal> {
        let mut goals: Vec<Goal> = self
            .lock()
            .goals
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        goals.sort_by(|a, b| a.end_date.cmp(&b.end_date));
        goals
    }

    pub fn update_goal(&self, id: &str, input: UpdateGoalInput) -> Result<Goal> {
        let mut inner = self.lock();
        let goal = inner
            .goals
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound { entity: "goal", id: id.to_string() })?;

        // Same window check as create, against the merged dates.
        let start = input.start_date.unwrap_or(goal.start_date);
        let end = input.end_date.unwrap_or(goal.end_date);
        if end < start {
            return Err(StorageError::Validation("goal end date precedes start date".into()));
        }

        if let Some(title) = input.title {
            goal.title = title;
        }
        if let Some(target_type) = input.target_type {
            goal.target_type = target_type;
        }
        if let Some(target_value) = input.target_value {
            goal.target_value = target_value;
        }
        if let Some(start) = input.start_date {
            goal.start_date = start;
        }
        if let Some(end) = input.end_date {
            goal.end_date = end;
        }
        if let Some(priority) = input.priority {
            goal.priority = priority;
        }
        if let Some(completed) = input.completed {
            goal.completed = completed;
        }
        goal.updated_at = now();
        Ok(goal.clone())
    }

    /// Caches the on-demand progress computation back onto the goal.
    pub fn set_goal_progress(&self, id: &str, current_value: f64, completed: bool) -> Result<Goal> {
        let mut inner = self.lock();
        let goal = inner
            .goals
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound { entity: "goal", id: id.to_string() })?;
        goal.current_value = current_value;
        goal.completed = completed;
        goal.updated_at = now();
        Ok(goal.clone())
    }

    /// Removing a goal removes its milestones with it.
    pub fn delete_goal(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner
            .goals
            .remove(id)
            .ok_or_else(|| StorageError::NotFound { entity: "goal", id: id.to_string() })?;
        Ok(())
    }

    pub fn add_milestone(&self, goal_id: &str, input: MilestoneInput) -> Result<Goal> {
        let mut inner = self.lock();
        let goal = inner
            .goals
            .get_mut(goal_id)
            .ok_or_else(|| StorageError::NotFound { entity: "goal", id: goal_id.to_string() })?;
        goal.milestones.push(GoalMilestone {
            id: new_id("MILESTONE"),
            title: input.title,
            target_value: input.target_value,
            completed: input.completed,
        });
        goal.updated_at = now();
        Ok(goal.clone())
    }

    pub fn update_milestone(
        &self,
        goal_id: &str,
        milestone_id: &str,
        input: MilestoneInput,
    ) -> Result<Goal> {
        let mut inner = self.lock();
        let goal = inner
            .goals
            .get_mut(goal_id)
            .ok_or_else(|| StorageError::NotFound { entity: "goal", id: goal_id.to_string() })?;
        let milestone = goal
            .milestones
            .iter_mut()
            .find(|m| m.id == milestone_id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "milestone",
                id: milestone_id.to_string(),
            })?;
        milestone.title = input.title;
        milestone.target_value = input.target_value;
        milestone.completed = input.completed;
        goal.updated_at = now();
        Ok(goal.clone())
    }

    pub fn delete_milestone(&self, goal_id: &str, milestone_id: &str) -> Result<Goal> {
        let mut inner = self.lock();
        let goal = inner
            .goals
            .get_mut(goal_id)
            .ok_or_else(|| StorageError::NotFound { entity: "goal", id: goal_id.to_string() })?;
        let before = goal.milestones.len();
        goal.milestones.retain(|m| m.id != milestone_id);
        if goal.milestones.len() == before {
            return Err(StorageError::NotFound {
                entity: "milestone",
                id: milestone_id.to_string(),
            });
        }
        goal.updated_at = now();
        Ok(goal.clone())
    }
}

fn recompute_balance(inner: &mut StorageInner, user_id: &str) {
    let pnl: f64 = inner
        .trades
        .values()
        .filter(|t| t.user_id == user_id && t.is_closed())
        .filter_map(|t| t.profit_loss)
        .sum();
    if let Some(user) = inner.users.get_mut(user_id) {
        user.current_balance = user.initial_balance + pnl;
        user.updated_at = now();
    }
}

fn clear_other_defaults(inner: &mut StorageInner, user_id: &str, keep_id: &str) {
    let ts = now();
    for strategy in inner.strategies.values_mut() {
        if strategy.user_id == user_id && strategy.id != keep_id && strategy.is_default {
            strategy.is_default = false;
            strategy.updated_at = ts;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, GoalPriority, GoalTargetType, TradeResult};

    fn storage_with_user() -> (MemStorage, User) {
        let storage = MemStorage::new();
        let user = storage.create_user("trader1", "hash", 10_000.0).unwrap();
        (storage, user)
    }

    fn closed_trade_input(user_id: &str, pnl: f64) -> CreateTradeInput {
        CreateTradeInput {
            user_id: user_id.to_string(),
            pair: "EUR/USD".to_string(),
            direction: Direction::Buy,
            entry_price: 1.1000,
            exit_price: None,
            stop_loss: None,
            take_profit: None,
            lot_size: 1.0,
            profit_loss: Some(pnl),
            strategy_id: None,
            session: None,
            emotion: None,
            open_date: Some(1_700_000_000),
            close_date: Some(1_700_003_600),
            result: Some(if pnl >= 0.0 { TradeResult::Win } else { TradeResult::Loss }),
            followed_plan: true,
            revenge_trade: false,
            over_leveraged: false,
            moved_stop_loss: false,
            notes: String::new(),
        }
    }

    #[test]
    fn closed_trade_moves_balance() {
        let (storage, user) = storage_with_user();
        let trade = storage.create_trade(closed_trade_input(&user.id, 50.0)).unwrap();
        assert_eq!(storage.get_user(&user.id).unwrap().current_balance, 10_050.0);

        storage.delete_trade(&trade.id).unwrap();
        assert_eq!(storage.get_user(&user.id).unwrap().current_balance, 10_000.0);
    }

    #[test]
    fn open_trade_does_not_move_balance() {
        let (storage, user) = storage_with_user();
        let mut input = closed_trade_input(&user.id, 50.0);
        input.close_date = None;
        input.result = None;
        storage.create_trade(input).unwrap();
        assert_eq!(storage.get_user(&user.id).unwrap().current_balance, 10_000.0);
    }

    #[test]
    fn pnl_is_derived_when_not_supplied() {
        let (storage, user) = storage_with_user();
        let mut input = closed_trade_input(&user.id, 0.0);
        input.profit_loss = None;
        input.exit_price = Some(1.1050);
        let trade = storage.create_trade(input).unwrap();
        // 50 pips on one lot
        assert!((trade.pips.unwrap() - 50.0).abs() < 1e-6);
        assert!((trade.profit_loss.unwrap() - 500.0).abs() < 1e-6);
    }

    #[test]
    fn explicit_pnl_survives_unrelated_updates() {
        let (storage, user) = storage_with_user();
        let trade = storage.create_trade(closed_trade_input(&user.id, 75.0)).unwrap();
        let updated = storage
            .update_trade(
                &trade.id,
                UpdateTradeInput {
                    notes: Some("scaled out early".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.profit_loss, Some(75.0));
    }

    #[test]
    fn duplicate_username_rejected() {
        let storage = MemStorage::new();
        storage.create_user("trader1", "hash", 1_000.0).unwrap();
        let err = storage.create_user("Trader1", "hash", 1_000.0).unwrap_err();
        assert!(matches!(err, StorageError::UsernameTaken(_)));
    }

    #[test]
    fn invalid_pair_rejected() {
        let (storage, user) = storage_with_user();
        let mut input = closed_trade_input(&user.id, 10.0);
        input.pair = "EURUSD".to_string();
        assert!(matches!(
            storage.create_trade(input),
            Err(StorageError::Validation(_))
        ));
    }

    #[test]
    fn nonpositive_lot_size_rejected_on_update() {
        let (storage, user) = storage_with_user();
        let mut input = closed_trade_input(&user.id, 0.0);
        input.profit_loss = None;
        input.exit_price = Some(1.1050);
        let trade = storage.create_trade(input).unwrap();
        assert!((trade.profit_loss.unwrap() - 500.0).abs() < 1e-6);

        let err = storage
            .update_trade(
                &trade.id,
                UpdateTradeInput {
                    lot_size: Some(-2.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));

        // Nothing merged, nothing re-derived.
        let unchanged = storage.get_trade(&trade.id).unwrap();
        assert!((unchanged.profit_loss.unwrap() - 500.0).abs() < 1e-6);
        assert!((storage.get_user(&user.id).unwrap().current_balance - 10_500.0).abs() < 1e-6);
    }

    #[test]
    fn filters_by_status_and_pair() {
        let (storage, user) = storage_with_user();
        storage.create_trade(closed_trade_input(&user.id, 10.0)).unwrap();
        let mut open = closed_trade_input(&user.id, 0.0);
        open.pair = "GBP/JPY".to_string();
        open.close_date = None;
        open.result = None;
        storage.create_trade(open).unwrap();

        let closed = storage.list_trades(&TradeFilters {
            user_id: Some(user.id.clone()),
            status: Some("closed".to_string()),
            ..Default::default()
        });
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].pair, "EUR/USD");

        let jpy = storage.list_trades(&TradeFilters {
            user_id: Some(user.id.clone()),
            pair: Some("JPY".to_string()),
            ..Default::default()
        });
        assert_eq!(jpy.len(), 1);
        assert!(!jpy[0].is_closed());
    }

    #[test]
    fn pagination_slices_newest_first() {
        let (storage, user) = storage_with_user();
        for i in 0..5 {
            let mut input = closed_trade_input(&user.id, 1.0);
            input.open_date = Some(1_700_000_000 + i * 3600);
            storage.create_trade(input).unwrap();
        }
        let page2 = storage.list_trades(&TradeFilters {
            user_id: Some(user.id.clone()),
            page: Some(2),
            limit: Some(2),
            ..Default::default()
        });
        assert_eq!(page2.len(), 2);
        assert_eq!(page2[0].open_date, 1_700_000_000 + 2 * 3600);
    }

    #[test]
    fn single_default_strategy_per_user() {
        let (storage, user) = storage_with_user();
        let first = storage
            .create_strategy(CreateStrategyInput {
                user_id: user.id.clone(),
                name: "Breakout".to_string(),
                description: String::new(),
                rules: vec![],
                entry_conditions: vec![],
                exit_conditions: vec![],
                timeframes: vec!["1h".to_string()],
                risk_reward_ratio: 2.0,
                is_default: true,
            })
            .unwrap();
        let second = storage
            .create_strategy(CreateStrategyInput {
                user_id: user.id.clone(),
                name: "Pullback".to_string(),
                description: String::new(),
                rules: vec![],
                entry_conditions: vec![],
                exit_conditions: vec![],
                timeframes: vec![],
                risk_reward_ratio: 3.0,
                is_default: false,
            })
            .unwrap();

        storage.set_default_strategy(&second.id).unwrap();

        let strategies = storage.strategies_for_user(&user.id);
        let defaults: Vec<_> = strategies.iter().filter(|s| s.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, second.id);
        assert!(!storage.get_strategy(&first.id).unwrap().is_default);
    }

    #[test]
    fn goal_delete_takes_milestones() {
        let (storage, user) = storage_with_user();
        let goal = storage
            .create_goal(CreateGoalInput {
                user_id: user.id.clone(),
                title: "Grow account".to_string(),
                target_type: GoalTargetType::Balance,
                target_value: 12_000.0,
                start_date: 1_700_000_000,
                end_date: 1_710_000_000,
                priority: GoalPriority::High,
                milestones: vec![MilestoneInput {
                    title: "Halfway".to_string(),
                    target_value: 11_000.0,
                    completed: false,
                }],
            })
            .unwrap();
        assert_eq!(goal.milestones.len(), 1);

        storage.delete_goal(&goal.id).unwrap();
        assert!(matches!(
            storage.get_goal(&goal.id),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn goal_update_cannot_invert_window() {
        let (storage, user) = storage_with_user();
        let goal = storage
            .create_goal(CreateGoalInput {
                user_id: user.id.clone(),
                title: "Grow account".to_string(),
                target_type: GoalTargetType::Profit,
                target_value: 500.0,
                start_date: 1_700_000_000,
                end_date: 1_710_000_000,
                priority: GoalPriority::Low,
                milestones: vec![],
            })
            .unwrap();

        let err = storage
            .update_goal(
                &goal.id,
                UpdateGoalInput {
                    end_date: Some(1_600_000_000),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
        assert_eq!(storage.get_goal(&goal.id).unwrap().end_date, 1_710_000_000);

        // Moving both dates together stays valid.
        let moved = storage
            .update_goal(
                &goal.id,
                UpdateGoalInput {
                    start_date: Some(1_580_000_000),
                    end_date: Some(1_600_000_000),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(moved.start_date, 1_580_000_000);
    }

    #[test]
    fn delete_user_cascades_owned_records() {
        let (storage, user) = storage_with_user();
        let trade = storage.create_trade(closed_trade_input(&user.id, 10.0)).unwrap();
        storage.delete_user(&user.id).unwrap();
        assert!(storage.get_trade(&trade.id).is_err());
    }

    #[test]
    fn milestone_update_and_delete() {
        let (storage, user) = storage_with_user();
        let goal = storage
            .create_goal(CreateGoalInput {
                user_id: user.id.clone(),
                title: "Consistency".to_string(),
                target_type: GoalTargetType::WinRate,
                target_value: 60.0,
                start_date: 1_700_000_000,
                end_date: 1_710_000_000,
                priority: GoalPriority::Medium,
                milestones: vec![],
            })
            .unwrap();

        let goal = storage
            .add_milestone(
                &goal.id,
                MilestoneInput {
                    title: "50% win rate".to_string(),
                    target_value: 50.0,
                    completed: false,
                },
            )
            .unwrap();
        let milestone_id = goal.milestones[0].id.clone();

        let goal = storage
            .update_milestone(
                &goal.id,
                &milestone_id,
                MilestoneInput {
                    title: "50% win rate".to_string(),
                    target_value: 50.0,
                    completed: true,
                },
            )
            .unwrap();
        assert!(goal.milestones[0].completed);

        let goal = storage.delete_milestone(&goal.id, &milestone_id).unwrap();
        assert!(goal.milestones.is_empty());
    }
}
