use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalTargetType {
    Profit,
    WinRate,
    ProfitFactor,
    RiskRewardRatio,
    Balance,
    Trades,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalMilestone {
    pub id: String,
    pub title: String,
    pub target_value: f64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub target_type: GoalTargetType,
    pub target_value: f64,
    /// Recomputed from trade stats on demand; the stored value is a cache of
    /// the last computation, not authoritative.
    pub current_value: f64,
    pub start_date: i64,
    pub end_date: i64,
    pub priority: GoalPriority,
    pub completed: bool,
    pub milestones: Vec<GoalMilestone>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalInput {
    pub user_id: String,
    pub title: String,
    pub target_type: GoalTargetType,
    pub target_value: f64,
    pub start_date: i64,
    pub end_date: i64,
    pub priority: GoalPriority,
    #[serde(default)]
    pub milestones: Vec<MilestoneInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalInput {
    pub title: Option<String>,
    pub target_type: Option<GoalTargetType>,
    pub target_value: Option<f64>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub priority: Option<GoalPriority>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneInput {
    pub title: String,
    pub target_value: f64,
    #[serde(default)]
    pub completed: bool,
}
