use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// Argon2 PHC string; never serialized to clients.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub initial_balance: f64,
    /// Derived: initial_balance plus the sum of closed trades' profit/loss.
    /// Recomputed on every trade create/update/delete.
    pub current_balance: f64,
    pub settings: UserSettings,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub currency: String,
    /// Percent of balance risked per trade.
    pub risk_percent: f64,
    pub default_pair: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        UserSettings {
            currency: "USD".to_string(),
            risk_percent: 1.0,
            default_pair: "EUR/USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
    pub initial_balance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    pub initial_balance: Option<f64>,
    pub currency: Option<String>,
    pub risk_percent: Option<f64>,
    pub default_pair: Option<String>,
}
