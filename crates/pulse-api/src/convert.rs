//! Row -> API model conversion. Rows keep SQLite's string typing; corruption
//! is logged and degraded rather than failing the whole read.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use pulse_db::models::{MoodRow, RewardRow, TaskRow, UserRow};
use pulse_types::models::{Mood, Reward, Task, TaskStatus, UserProfile};

pub(crate) fn parse_uuid(s: &str, what: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, s, e);
        Uuid::default()
    })
}

pub(crate) fn parse_ts(s: &str, what: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, s, e);
        DateTime::default()
    })
}

fn parse_opt_ts(s: &Option<String>, what: &str) -> Option<DateTime<Utc>> {
    s.as_deref().map(|s| parse_ts(s, what))
}

pub(crate) fn user_profile(row: &UserRow) -> UserProfile {
    UserProfile {
        id: parse_uuid(&row.id, "user id"),
        email: row.email.clone(),
        name: row.name.clone(),
        couple_id: row.couple_id.as_deref().map(|id| parse_uuid(id, "couple_id")),
        boundaries: boundaries(row),
    }
}

pub(crate) fn boundaries(row: &UserRow) -> Vec<String> {
    serde_json::from_str(&row.boundaries).unwrap_or_else(|e| {
        warn!("Corrupt boundaries on user '{}': {}", row.id, e);
        Vec::new()
    })
}

pub(crate) fn mood(row: &MoodRow) -> Mood {
    Mood {
        id: parse_uuid(&row.id, "mood id"),
        couple_id: parse_uuid(&row.couple_id, "couple_id"),
        user_id: parse_uuid(&row.user_id, "user_id"),
        mood_type: row.mood_type.clone(),
        intensity: row.intensity,
        expires_at: parse_ts(&row.expires_at, "expires_at"),
        created_at: parse_ts(&row.created_at, "created_at"),
    }
}

pub(crate) fn task(row: &TaskRow) -> Task {
    Task {
        id: parse_uuid(&row.id, "task id"),
        couple_id: parse_uuid(&row.couple_id, "couple_id"),
        creator_id: parse_uuid(&row.creator_id, "creator_id"),
        receiver_id: parse_uuid(&row.receiver_id, "receiver_id"),
        title: row.title.clone(),
        description: row.description.clone(),
        reward: row.reward.clone(),
        duration_minutes: row.duration_minutes,
        tokens_earned: row.tokens_earned,
        status: TaskStatus::parse(&row.status).unwrap_or_else(|| {
            warn!("Corrupt status '{}' on task '{}'", row.status, row.id);
            TaskStatus::Pending
        }),
        proof_text: row.proof_text.clone(),
        proof_photo_base64: row.proof_photo.clone(),
        approval_message: row.approval_message.clone(),
        created_at: parse_ts(&row.created_at, "created_at"),
        expires_at: parse_ts(&row.expires_at, "expires_at"),
        completed_at: parse_opt_ts(&row.completed_at, "completed_at"),
        approved_at: parse_opt_ts(&row.approved_at, "approved_at"),
    }
}

pub(crate) fn reward(row: &RewardRow) -> Reward {
    Reward {
        id: parse_uuid(&row.id, "reward id"),
        couple_id: parse_uuid(&row.couple_id, "couple_id"),
        creator_id: parse_uuid(&row.creator_id, "creator_id"),
        title: row.title.clone(),
        description: row.description.clone(),
        tokens_cost: row.tokens_cost,
        redeemed_by: row.redeemed_by.as_deref().map(|id| parse_uuid(id, "redeemed_by")),
        redeemed_at: parse_opt_ts(&row.redeemed_at, "redeemed_at"),
        created_at: parse_ts(&row.created_at, "created_at"),
    }
}
