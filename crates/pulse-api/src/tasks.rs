use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{Duration, Utc};
use uuid::Uuid;

use pulse_db::models::TaskRow;
use pulse_db::{JudgeOutcome, ProofOutcome, timestamp};
use pulse_types::api::{Claims, TaskApprovalRequest, TaskCreateRequest, TaskProofRequest};
use pulse_types::events::PartnerEvent;
use pulse_types::models::Task;

use crate::auth::AppState;
use crate::{ApiError, blocking, convert, load_user, require_couple};

pub async fn create_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TaskCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title required"));
    }
    if req.duration_minutes <= 0 {
        return Err(ApiError::BadRequest("duration must be positive"));
    }
    if req.tokens_earned < 0 {
        return Err(ApiError::BadRequest("token reward cannot be negative"));
    }

    let user = load_user(&state, claims.sub).await?;
    let couple_id = require_couple(&user)?;

    // The receiver is whoever the creator is paired with right now.
    let receiver = {
        let db = state.db.clone();
        let cid = couple_id.clone();
        let uid = user.id.clone();
        blocking(move || db.get_partner(&cid, &uid))
            .await?
            .ok_or(ApiError::PartnerNotFound)?
    };

    let now = Utc::now();
    let row = TaskRow {
        id: Uuid::new_v4().to_string(),
        couple_id,
        creator_id: user.id,
        receiver_id: receiver.id,
        title: req.title.trim().to_string(),
        description: req.description,
        reward: req.reward,
        duration_minutes: req.duration_minutes,
        tokens_earned: req.tokens_earned,
        status: "pending".to_string(),
        proof_text: None,
        proof_photo: None,
        approval_message: None,
        created_at: timestamp(now),
        expires_at: timestamp(now + Duration::minutes(req.duration_minutes)),
        completed_at: None,
        approved_at: None,
    };
    let task = convert::task(&row);
    {
        let db = state.db.clone();
        blocking(move || db.insert_task(&row)).await?;
    }

    state
        .registry
        .notify_partner(
            task.couple_id,
            claims.sub,
            PartnerEvent::NewTask { task: task.clone() },
        )
        .await;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_tasks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let user = load_user(&state, claims.sub).await?;
    let Some(couple_id) = user.couple_id else {
        return Ok(Json(Vec::new()));
    };

    let rows = {
        let db = state.db.clone();
        blocking(move || db.list_tasks(&couple_id, 20)).await?
    };

    Ok(Json(rows.iter().map(convert::task).collect()))
}

/// pending -> completed. Only the designated receiver, only while pending,
/// only before the deadline. A late submission flips the task to expired as a
/// side effect of the failed attempt; the store decides now-vs-deadline in the
/// same transaction as the write.
pub async fn submit_proof(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TaskProofRequest>,
) -> Result<Json<Task>, ApiError> {
    if let Some(photo) = &req.proof_photo_base64 {
        if B64.decode(photo).is_err() {
            return Err(ApiError::BadRequest("proof photo is not valid base64"));
        }
    }

    let task = fetch_task(&state, task_id).await?;
    if task.receiver_id != claims.sub.to_string() {
        return Err(ApiError::Forbidden);
    }

    let outcome = {
        let db = state.db.clone();
        let tid = task.id.clone();
        let proof_text = req.proof_text.clone();
        let proof_photo = req.proof_photo_base64.clone();
        blocking(move || {
            db.submit_proof(
                &tid,
                proof_text.as_deref(),
                proof_photo.as_deref(),
                &pulse_db::now_timestamp(),
            )
        })
        .await?
    };

    let couple_id = convert::parse_uuid(&task.couple_id, "couple_id");
    match outcome {
        ProofOutcome::Completed => {}
        ProofOutcome::Expired => {
            state
                .registry
                .notify_partner(couple_id, claims.sub, PartnerEvent::TaskExpired { task_id })
                .await;
            return Err(ApiError::Expired);
        }
        ProofOutcome::WrongState => {
            return Err(ApiError::InvalidStateTransition("task is not pending"));
        }
    }

    state
        .registry
        .notify_partner(
            couple_id,
            claims.sub,
            PartnerEvent::TaskCompleted {
                task_id,
                proof_text: req.proof_text,
                proof_photo_base64: req.proof_photo_base64,
            },
        )
        .await;

    let task = fetch_task(&state, task_id).await?;
    Ok(Json(convert::task(&task)))
}

/// completed -> approved | rejected. Only the creator. Approval credits the
/// receiver's ledger; the awarded amount and resulting balance travel in the
/// notification so the partner's UI can update without a refetch.
pub async fn judge_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TaskApprovalRequest>,
) -> Result<Json<Task>, ApiError> {
    let task = fetch_task(&state, task_id).await?;
    if task.creator_id != claims.sub.to_string() {
        return Err(ApiError::Forbidden);
    }

    let outcome = {
        let db = state.db.clone();
        let tid = task.id.clone();
        let message = req.message.clone();
        let record_id = Uuid::new_v4().to_string();
        blocking(move || {
            db.judge_task(
                &tid,
                req.approved,
                message.as_deref(),
                &record_id,
                &pulse_db::now_timestamp(),
            )
        })
        .await?
    };

    let couple_id = convert::parse_uuid(&task.couple_id, "couple_id");
    match outcome {
        JudgeOutcome::Approved { new_balance } => {
            state
                .registry
                .notify_partner(
                    couple_id,
                    claims.sub,
                    PartnerEvent::TaskApproved {
                        task_id,
                        tokens_awarded: task.tokens_earned,
                        new_balance,
                        message: req.message,
                    },
                )
                .await;
        }
        JudgeOutcome::Rejected => {
            state
                .registry
                .notify_partner(
                    couple_id,
                    claims.sub,
                    PartnerEvent::TaskRejected {
                        task_id,
                        tokens_awarded: 0,
                        message: req.message,
                    },
                )
                .await;
        }
        JudgeOutcome::WrongState => {
            return Err(ApiError::InvalidStateTransition("task is not awaiting approval"));
        }
        JudgeOutcome::NotFound => return Err(ApiError::NotFound("task")),
    }

    let task = fetch_task(&state, task_id).await?;
    Ok(Json(convert::task(&task)))
}

/// Only the creator may delete, and only before the task settles.
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let task = fetch_task(&state, task_id).await?;
    if task.creator_id != claims.sub.to_string() {
        return Err(ApiError::Forbidden);
    }

    let deleted = {
        let db = state.db.clone();
        let tid = task.id.clone();
        blocking(move || db.delete_task(&tid)).await?
    };
    if !deleted {
        return Err(ApiError::InvalidStateTransition("task is already settled"));
    }

    state
        .registry
        .notify_partner(
            convert::parse_uuid(&task.couple_id, "couple_id"),
            claims.sub,
            PartnerEvent::TaskDeleted { task_id },
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_task(
    state: &AppState,
    task_id: Uuid,
) -> Result<pulse_db::models::TaskRow, ApiError> {
    let db = state.db.clone();
    let tid = task_id.to_string();
    blocking(move || db.get_task(&tid))
        .await?
        .ok_or(ApiError::NotFound("task"))
}
