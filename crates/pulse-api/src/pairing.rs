use axum::{Extension, Json, extract::State};
use uuid::Uuid;

use pulse_db::LinkOutcome;
use pulse_types::api::{Claims, PairingCodeResponse, PairingLinkRequest, PairingLinkResponse};

use crate::auth::AppState;
use crate::{ApiError, blocking, load_user};

/// The pairing code is derived from the user id rather than stored: the
/// uppercased last six characters. Free of extra state, but the code space is
/// only the tail of the id space. Kept for compatibility with existing
/// clients.
pub(crate) fn derive_code(user_id: &str) -> String {
    let start = user_id.len().saturating_sub(6);
    user_id[start..].to_uppercase()
}

pub async fn get_pairing_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<PairingCodeResponse>, ApiError> {
    let user = load_user(&state, claims.sub).await?;
    if user.couple_id.is_some() {
        return Err(ApiError::AlreadyPaired);
    }

    Ok(Json(PairingCodeResponse {
        pairing_code: derive_code(&user.id),
    }))
}

pub async fn link(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PairingLinkRequest>,
) -> Result<Json<PairingLinkResponse>, ApiError> {
    let code = req.pairing_code.trim().to_string();
    if code.is_empty() {
        return Err(ApiError::BadRequest("pairing code required"));
    }

    let couple_id = Uuid::new_v4();
    let outcome = {
        let db = state.db.clone();
        let requester = claims.sub.to_string();
        let cid = couple_id.to_string();
        blocking(move || db.link_partner(&requester, &code, &cid, &pulse_db::now_timestamp()))
            .await?
    };

    match outcome {
        LinkOutcome::Linked(couple) => {
            tracing::info!(
                "Couple {} formed: {} + {}",
                couple.id,
                couple.user1_id,
                couple.user2_id
            );
            Ok(Json(PairingLinkResponse { couple_id }))
        }
        LinkOutcome::RequesterPaired => Err(ApiError::AlreadyPaired),
        LinkOutcome::NoMatch => Err(ApiError::PartnerNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_uppercased_tail() {
        assert_eq!(derive_code("2c9e1f60-8f4f-4a4a-9d26-12c3abc123"), "ABC123");
        assert_eq!(derive_code("abc"), "ABC");
    }
}
