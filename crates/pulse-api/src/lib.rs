pub mod auth;
mod convert;
pub mod error;
pub mod middleware;
pub mod moods;
pub mod pairing;
pub mod rewards;
pub mod suggest;
pub mod sweep;
pub mod tasks;

pub use error::ApiError;

use pulse_db::models::UserRow;
use uuid::Uuid;

use crate::auth::AppState;

/// Run blocking rusqlite work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {e}")))?
        .map_err(ApiError::Internal)
}

/// The token only proves identity; the user record (couple_id, boundaries)
/// comes from the store on each request.
pub(crate) async fn load_user(state: &AppState, user_id: Uuid) -> Result<UserRow, ApiError> {
    let db = state.db.clone();
    let uid = user_id.to_string();
    let user = blocking(move || db.get_user_by_id(&uid)).await?;
    user.ok_or(ApiError::Unauthorized)
}

/// Couple-scoped operations require a paired user.
pub(crate) fn require_couple(user: &UserRow) -> Result<String, ApiError> {
    user.couple_id.clone().ok_or(ApiError::NotPaired)
}
