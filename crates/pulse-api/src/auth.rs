use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use pulse_db::Database;
use pulse_gateway::registry::PartnerRegistry;
use pulse_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};

use crate::suggest::SuggestionClient;
use crate::{ApiError, blocking, convert};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub registry: PartnerRegistry,
    pub suggestions: SuggestionClient,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if !req.email.contains('@') || req.email.len() > 254 {
        return Err(ApiError::BadRequest("invalid email address"));
    }
    if req.name.trim().is_empty() || req.name.len() > 64 {
        return Err(ApiError::BadRequest("name must be 1-64 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters"));
    }

    {
        let db = state.db.clone();
        let email = req.email.clone();
        if blocking(move || db.get_user_by_email(&email)).await?.is_some() {
            return Err(ApiError::BadRequest("email already registered"));
        }
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string();

    let user_id = Uuid::new_v4();

    let user = {
        let db = state.db.clone();
        let uid = user_id.to_string();
        blocking(move || {
            if !db.create_user(
                &uid,
                &req.email,
                req.name.trim(),
                &password_hash,
                &pulse_db::now_timestamp(),
            )? {
                return Ok(None);
            }
            let user = db
                .get_user_by_id(&uid)?
                .ok_or_else(|| anyhow::anyhow!("user vanished after insert"))?;
            Ok(Some(user))
        })
        .await?
        // A registration that lost the insert race gets the same answer as
        // one caught by the pre-check.
        .ok_or(ApiError::BadRequest("email already registered"))?
    };

    let token = create_token(&state.jwt_secret, user_id)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: convert::user_profile(&user),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = {
        let db = state.db.clone();
        let email = req.email.clone();
        blocking(move || db.get_user_by_email(&email))
            .await?
            .ok_or(ApiError::Unauthorized)?
    };

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored password hash unreadable: {e}"))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {e}", user.id))?;

    let token = create_token(&state.jwt_secret, user_id)?;

    Ok(Json(AuthResponse {
        token,
        user: convert::user_profile(&user),
    }))
}

fn create_token(secret: &str, user_id: Uuid) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
