use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Bought,
    Sold,
    ClaimedFreebie,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTokenType {
    PostToken,
    CreatorToken,
}

/// One row of the backend activity feed. Produced by the backend from chain
/// events and off-chain identity data; this crate only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityItem {
    pub id: String,
    pub username: String,
    pub action: ActivityAction,
    pub token_name: String,
    pub creator_name: String,
    pub amount: u64,
    pub total_cost: f64,
    pub is_freebie: bool,
    #[serde(rename = "type")]
    pub token_type: ActivityTokenType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityResponse {
    pub data: Vec<ActivityItem>,
}
