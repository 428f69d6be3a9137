use serde::{Deserialize, Serialize};

/// One rule/entry/exit condition of a strategy. Everything beyond the label is
/// optional free-form metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyCondition {
    pub label: String,
    pub indicator: Option<String>,
    pub timeframe: Option<String>,
    pub expected_value: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingStrategy {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub rules: Vec<StrategyCondition>,
    pub entry_conditions: Vec<StrategyCondition>,
    pub exit_conditions: Vec<StrategyCondition>,
    pub timeframes: Vec<String>,
    pub risk_reward_ratio: f64,
    /// At most one per user; fixed up reactively when a new default is set.
    pub is_default: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStrategyInput {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<StrategyCondition>,
    #[serde(default)]
    pub entry_conditions: Vec<StrategyCondition>,
    #[serde(default)]
    pub exit_conditions: Vec<StrategyCondition>,
    #[serde(default)]
    pub timeframes: Vec<String>,
    #[serde(default)]
    pub risk_reward_ratio: f64,
    #[serde(default)]
    pub is_default: bool,
}

/// Condition lists replace wholesale when provided (shallow merge, no
/// per-element patching).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStrategyInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rules: Option<Vec<StrategyCondition>>,
    pub entry_conditions: Option<Vec<StrategyCondition>>,
    pub exit_conditions: Option<Vec<StrategyCondition>>,
    pub timeframes: Option<Vec<String>>,
    pub risk_reward_ratio: Option<f64>,
    pub is_default: Option<bool>,
}
