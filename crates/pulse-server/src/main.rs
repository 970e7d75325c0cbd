use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use pulse_api::auth::{self, AppState, AppStateInner};
use pulse_api::middleware::require_auth;
use pulse_api::suggest::{self, SuggestionClient};
use pulse_api::{moods, pairing, rewards, sweep, tasks};
use pulse_gateway::connection;
use pulse_gateway::registry::PartnerRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PULSE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PULSE_DB_PATH").unwrap_or_else(|_| "pulse.db".into());
    let host = std::env::var("PULSE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PULSE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let sweep_interval_secs: u64 = std::env::var("PULSE_SWEEP_INTERVAL_SECS")
        .unwrap_or_else(|_| "60".into())
        .parse()?;
    let ai_api_key = std::env::var("PULSE_AI_API_KEY").ok();
    let ai_base_url =
        std::env::var("PULSE_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let ai_model = std::env::var("PULSE_AI_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    // Init database
    let db = Arc::new(pulse_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let registry = PartnerRegistry::new();
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        registry: registry.clone(),
        suggestions: SuggestionClient::new(ai_api_key, ai_base_url, ai_model),
    });

    // Periodic pending -> expired sweep
    tokio::spawn(sweep::run_sweep_loop(state.clone(), sweep_interval_secs));

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/pairing/code", get(pairing::get_pairing_code))
        // Legacy alias kept for older clients.
        .route("/pairing/generate", post(pairing::get_pairing_code))
        .route("/pairing/link", post(pairing::link))
        .route("/moods", post(moods::create_mood))
        .route("/moods", get(moods::get_moods))
        .route("/tasks", post(tasks::create_task))
        .route("/tasks", get(tasks::get_tasks))
        .route("/tasks/{task_id}/proof", patch(tasks::submit_proof))
        .route("/tasks/{task_id}/approval", post(tasks::judge_task))
        .route("/tasks/{task_id}", delete(tasks::delete_task))
        .route("/tokens", get(rewards::get_tokens))
        .route("/rewards", post(rewards::create_reward))
        .route("/rewards", get(rewards::get_rewards))
        .route("/rewards/{reward_id}/redeem", post(rewards::redeem_reward))
        .route("/ai/suggest-task", post(suggest::suggest_task))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(state.clone());

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Pulse server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.registry.clone(),
            state.db.clone(),
            state.jwt_secret.clone(),
        )
    })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
    }))
}
