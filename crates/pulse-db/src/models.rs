//! Database row types that map directly to SQLite rows.
//! Distinct from the API models to keep the storage layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub couple_id: Option<String>,
    pub boundaries: String,
    pub created_at: String,
}

pub struct CoupleRow {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub pairing_code: String,
    pub created_at: String,
}

pub struct MoodRow {
    pub id: String,
    pub couple_id: String,
    pub user_id: String,
    pub mood_type: String,
    pub intensity: i64,
    pub expires_at: String,
    pub created_at: String,
}

pub struct TaskRow {
    pub id: String,
    pub couple_id: String,
    pub creator_id: String,
    pub receiver_id: String,
    pub title: String,
    pub description: String,
    pub reward: Option<String>,
    pub duration_minutes: i64,
    pub tokens_earned: i64,
    pub status: String,
    pub proof_text: Option<String>,
    pub proof_photo: Option<String>,
    pub approval_message: Option<String>,
    pub created_at: String,
    pub expires_at: String,
    pub completed_at: Option<String>,
    pub approved_at: Option<String>,
}

pub struct TokenRow {
    pub tokens: i64,
    pub lifetime_tokens: i64,
}

pub struct RewardRow {
    pub id: String,
    pub couple_id: String,
    pub creator_id: String,
    pub title: String,
    pub description: String,
    pub tokens_cost: i64,
    pub redeemed_by: Option<String>,
    pub redeemed_at: Option<String>,
    pub created_at: String,
}
