use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Mood, Reward, Task};

/// Events pushed to the other member of a couple over the WebSocket.
///
/// Delivery is at-most-once and non-durable: a missed event is reconciled by
/// re-reading current state through the plain REST endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartnerEvent {
    /// Server confirms successful WebSocket authentication
    Ready { user_id: Uuid, name: String },

    /// Partner shared a new mood
    MoodUpdate { mood: Mood },

    /// Partner assigned a new task
    NewTask { task: Task },

    /// The receiver submitted proof; the creator should judge it
    TaskCompleted {
        task_id: Uuid,
        proof_text: Option<String>,
        proof_photo_base64: Option<String>,
    },

    /// The creator approved the proof and tokens were credited
    TaskApproved {
        task_id: Uuid,
        tokens_awarded: i64,
        new_balance: i64,
        message: Option<String>,
    },

    /// The creator rejected the proof; no tokens awarded
    TaskRejected {
        task_id: Uuid,
        tokens_awarded: i64,
        message: Option<String>,
    },

    /// A pending task ran out the clock
    TaskExpired { task_id: Uuid },

    /// The creator deleted a task before it was judged
    TaskDeleted { task_id: Uuid },

    /// Partner added a redeemable reward
    NewReward { reward: Reward },

    /// Partner spent tokens on a reward
    RewardRedeemed {
        reward_id: Uuid,
        redeemed_by: Uuid,
        new_balance: i64,
    },
}

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection with a JWT
    Identify { token: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_tags_match_contract() {
        let cases: Vec<(PartnerEvent, &str)> = vec![
            (
                PartnerEvent::TaskCompleted {
                    task_id: Uuid::nil(),
                    proof_text: None,
                    proof_photo_base64: None,
                },
                "task_completed",
            ),
            (
                PartnerEvent::TaskApproved {
                    task_id: Uuid::nil(),
                    tokens_awarded: 5,
                    new_balance: 5,
                    message: None,
                },
                "task_approved",
            ),
            (
                PartnerEvent::TaskRejected {
                    task_id: Uuid::nil(),
                    tokens_awarded: 0,
                    message: None,
                },
                "task_rejected",
            ),
            (PartnerEvent::TaskExpired { task_id: Uuid::nil() }, "task_expired"),
            (PartnerEvent::TaskDeleted { task_id: Uuid::nil() }, "task_deleted"),
            (
                PartnerEvent::RewardRedeemed {
                    reward_id: Uuid::nil(),
                    redeemed_by: Uuid::nil(),
                    new_balance: 0,
                },
                "reward_redeemed",
            ),
        ];

        for (event, tag) in cases {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], tag);
        }
    }

    #[test]
    fn identify_command_parses() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"identify","token":"abc"}"#).unwrap();
        match cmd {
            GatewayCommand::Identify { token } => assert_eq!(token, "abc"),
        }
    }
}
