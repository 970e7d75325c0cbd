use std::time::Duration;

use tracing::{info, warn};

use pulse_types::events::PartnerEvent;

use crate::auth::AppState;
use crate::convert;

/// Background task that expires overdue pending tasks.
///
/// Runs on an interval, flips everything past its `expires_at` from pending
/// to expired, and notifies each affected couple. Completed tasks are never
/// touched; once proof is in, only the creator's judgment settles them.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep_once(&state).await {
            Ok(count) => {
                if count > 0 {
                    info!("Expiry sweep: {} tasks expired", count);
                }
            }
            Err(e) => {
                warn!("Expiry sweep error: {:#}", e);
            }
        }
    }
}

pub async fn sweep_once(state: &AppState) -> anyhow::Result<usize> {
    let swept = {
        let db = state.db.clone();
        tokio::task::spawn_blocking(move || db.sweep_expired_tasks(&pulse_db::now_timestamp()))
            .await??
    };

    let count = swept.len();
    for task in &swept {
        let couple_id = convert::parse_uuid(&task.couple_id, "couple_id");
        let task_id = convert::parse_uuid(&task.id, "task id");
        state
            .registry
            .notify_couple(couple_id, PartnerEvent::TaskExpired { task_id })
            .await;
    }

    Ok(count)
}
