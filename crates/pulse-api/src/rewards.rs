use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use pulse_db::RedeemOutcome;
use pulse_db::models::RewardRow;
use pulse_db::timestamp;
use pulse_types::api::{Claims, RedeemResponse, RewardCreateRequest};
use pulse_types::events::PartnerEvent;
use pulse_types::models::{Reward, TokenBalance};

use crate::auth::AppState;
use crate::{ApiError, blocking, convert, load_user, require_couple};

pub async fn create_reward(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RewardCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title required"));
    }
    if req.tokens_cost <= 0 {
        return Err(ApiError::BadRequest("token cost must be positive"));
    }

    let user = load_user(&state, claims.sub).await?;
    let couple_id = require_couple(&user)?;

    let row = RewardRow {
        id: Uuid::new_v4().to_string(),
        couple_id,
        creator_id: user.id,
        title: req.title.trim().to_string(),
        description: req.description,
        tokens_cost: req.tokens_cost,
        redeemed_by: None,
        redeemed_at: None,
        created_at: timestamp(Utc::now()),
    };
    let reward = convert::reward(&row);
    {
        let db = state.db.clone();
        blocking(move || db.insert_reward(&row)).await?;
    }

    state
        .registry
        .notify_partner(
            reward.couple_id,
            claims.sub,
            PartnerEvent::NewReward {
                reward: reward.clone(),
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(reward)))
}

pub async fn get_rewards(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Reward>>, ApiError> {
    let user = load_user(&state, claims.sub).await?;
    let Some(couple_id) = user.couple_id else {
        return Ok(Json(Vec::new()));
    };

    let rows = {
        let db = state.db.clone();
        blocking(move || db.list_rewards(&couple_id)).await?
    };

    Ok(Json(rows.iter().map(convert::reward).collect()))
}

/// Debit and redeemed-mark are one transaction in the store; either both
/// happen or neither does.
pub async fn redeem_reward(
    State(state): State<AppState>,
    Path(reward_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<RedeemResponse>, ApiError> {
    let user = load_user(&state, claims.sub).await?;
    let couple_id = require_couple(&user)?;

    let outcome = {
        let db = state.db.clone();
        let rid = reward_id.to_string();
        let cid = couple_id.clone();
        let uid = user.id.clone();
        blocking(move || db.redeem_reward(&rid, &cid, &uid, &pulse_db::now_timestamp())).await?
    };

    let new_balance = match outcome {
        RedeemOutcome::Redeemed { new_balance } => new_balance,
        RedeemOutcome::NotFound => return Err(ApiError::NotFound("reward")),
        RedeemOutcome::AlreadyRedeemed => return Err(ApiError::AlreadyRedeemed),
        RedeemOutcome::InsufficientTokens => return Err(ApiError::InsufficientTokens),
    };

    state
        .registry
        .notify_partner(
            convert::parse_uuid(&couple_id, "couple_id"),
            claims.sub,
            PartnerEvent::RewardRedeemed {
                reward_id,
                redeemed_by: claims.sub,
                new_balance,
            },
        )
        .await;

    let balance = {
        let db = state.db.clone();
        let uid = user.id.clone();
        blocking(move || db.token_balance(&uid, &couple_id)).await?
    };

    Ok(Json(RedeemResponse {
        reward_id,
        balance: TokenBalance {
            tokens: balance.tokens,
            lifetime_tokens: balance.lifetime_tokens,
        },
    }))
}

/// Current balance. No ledger record yet means zero, never an error; an
/// unpaired user has no couple-scoped ledger at all, same answer.
pub async fn get_tokens(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<TokenBalance>, ApiError> {
    let user = load_user(&state, claims.sub).await?;
    let Some(couple_id) = user.couple_id else {
        return Ok(Json(TokenBalance {
            tokens: 0,
            lifetime_tokens: 0,
        }));
    };

    let row = {
        let db = state.db.clone();
        let uid = user.id.clone();
        blocking(move || db.token_balance(&uid, &couple_id)).await?
    };

    Ok(Json(TokenBalance {
        tokens: row.tokens,
        lifetime_tokens: row.lifetime_tokens,
    }))
}
