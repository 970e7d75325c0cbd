use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Mood, TokenBalance, UserProfile};

// -- JWT Claims --

/// JWT claims shared between pulse-api (REST middleware) and pulse-gateway
/// (WebSocket identify). Canonical definition lives here in pulse-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

// -- Pairing --

#[derive(Debug, Serialize)]
pub struct PairingCodeResponse {
    pub pairing_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairingLinkRequest {
    pub pairing_code: String,
}

#[derive(Debug, Serialize)]
pub struct PairingLinkResponse {
    pub couple_id: Uuid,
}

// -- Moods --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoodCreateRequest {
    pub mood_type: String,
    pub intensity: i64,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct MoodCreateResponse {
    pub mood: Mood,
    pub ai_suggestion: Option<TaskSuggestion>,
}

// -- Tasks --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskCreateRequest {
    pub title: String,
    pub description: String,
    pub reward: Option<String>,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i64,
    #[serde(default = "default_tokens_earned")]
    pub tokens_earned: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskProofRequest {
    pub proof_text: Option<String>,
    pub proof_photo_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskApprovalRequest {
    pub approved: bool,
    pub message: Option<String>,
}

// -- Rewards --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewardCreateRequest {
    pub title: String,
    pub description: String,
    pub tokens_cost: i64,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub reward_id: Uuid,
    pub balance: TokenBalance,
}

// -- AI suggestions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuggestTaskRequest {
    pub mood_type: String,
    pub intensity: i64,
    #[serde(default)]
    pub extreme_mode: bool,
}

/// A task idea returned by the AI provider, or by the static fallback table
/// when the provider is unavailable or returns something unusable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSuggestion {
    pub title: String,
    pub description: String,
    pub default_duration_minutes: i64,
}

fn default_duration_minutes() -> i64 {
    60
}

fn default_tokens_earned() -> i64 {
    5
}
