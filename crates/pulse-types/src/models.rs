use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user as exposed through the API. The password hash never leaves the DB layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub couple_id: Option<Uuid>,
    pub boundaries: Vec<String>,
}

/// The durable 1:1 relationship between two users. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Couple {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub pairing_code: String,
    pub created_at: DateTime<Utc>,
}

/// An ephemeral mood signal. Read-only after creation; invisible once expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mood {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub user_id: Uuid,
    pub mood_type: String,
    pub intensity: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Task lifecycle: pending -> completed -> {approved | rejected},
/// or pending -> expired. Terminal states never transition again, and a
/// completed task can only be judged, never expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Approved,
    Rejected,
    Expired,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Approved, rejected and expired tasks are done for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Expired)
    }
}

/// A time-boxed assignment one partner gives the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub creator_id: Uuid,
    pub receiver_id: Uuid,
    pub title: String,
    pub description: String,
    pub reward: Option<String>,
    pub duration_minutes: i64,
    pub tokens_earned: i64,
    pub status: TaskStatus,
    pub proof_text: Option<String>,
    pub proof_photo_base64: Option<String>,
    pub approval_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Per (user, couple) token balance. `lifetime_tokens` only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub tokens: i64,
    pub lifetime_tokens: i64,
}

/// A couple-scoped redeemable item. Immutable once redeemed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub tokens_cost: i64,
    pub redeemed_by: Option<Uuid>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
