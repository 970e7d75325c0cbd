use anyhow::{Context, anyhow};
use axum::{Extension, Json, extract::State};
use serde_json::json;
use tracing::{debug, warn};

use pulse_types::api::{Claims, SuggestTaskRequest, TaskSuggestion};

use crate::auth::AppState;
use crate::{ApiError, convert, load_user};

const SYSTEM_PROMPT: &str = "You help couples create playful, intimate connection \
through personalized tasks. Respect the stated boundaries, keep content tasteful, \
suggest realistic timeframes (15-90 minutes), and respond with valid JSON only: \
{\"title\", \"description\", \"default_duration_minutes\"}.";

/// Client for an OpenAI-compatible chat-completions provider. Strictly
/// best-effort: any failure (no key configured, transport error, non-2xx,
/// malformed or incomplete JSON) falls back to the static table and is never
/// surfaced to the caller.
#[derive(Clone)]
pub struct SuggestionClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl SuggestionClient {
    pub fn new(api_key: Option<String>, base_url: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    pub async fn suggest(
        &self,
        mood_type: &str,
        intensity: i64,
        boundaries: &[String],
        extreme_mode: bool,
    ) -> TaskSuggestion {
        match self
            .request(mood_type, intensity, boundaries, extreme_mode)
            .await
        {
            Ok(suggestion) => {
                debug!("AI suggestion generated for mood {}", mood_type);
                suggestion
            }
            Err(e) => {
                warn!("AI suggestion provider unavailable ({:#}), using fallback", e);
                fallback_suggestion(mood_type)
            }
        }
    }

    async fn request(
        &self,
        mood_type: &str,
        intensity: i64,
        boundaries: &[String],
        extreme_mode: bool,
    ) -> anyhow::Result<TaskSuggestion> {
        let api_key = self.api_key.as_deref().ok_or_else(|| anyhow!("no API key configured"))?;

        let boundaries_text = if boundaries.is_empty() {
            "No specific boundaries set".to_string()
        } else {
            boundaries.join(", ")
        };
        let prompt = format!(
            "Suggest a task for a couple.\n\
             - Current mood: {mood_type}\n\
             - Intensity level: {intensity}/5\n\
             - Boundaries to respect: {boundaries_text}\n\
             - Extreme mode: {extreme_mode}"
        );

        let body = json!({
            "model": self.model,
            "max_tokens": 500,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        });

        let response: serde_json::Value = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("provider response has no message content"))?;

        // Missing fields fail deserialization and land in the fallback.
        let suggestion: TaskSuggestion =
            serde_json::from_str(content).context("provider content is not the expected JSON")?;
        if suggestion.title.is_empty() || suggestion.default_duration_minutes <= 0 {
            return Err(anyhow!("provider suggestion is unusable"));
        }
        Ok(suggestion)
    }
}

/// Static suggestion table keyed by mood type. Deterministic, so the client
/// behaves the same every time the provider is down.
pub fn fallback_suggestion(mood_type: &str) -> TaskSuggestion {
    let (title, description, minutes) = match mood_type {
        "feeling_spicy" => (
            "Cook dinner with a twist",
            "Prepare dinner wearing only an apron and send a photo of the plated result.",
            90,
        ),
        "horny" => (
            "Send a spicy voice message",
            "Record a 30-second voice message telling your partner exactly what you want tonight.",
            30,
        ),
        "teasing" => (
            "Take a teasing photo",
            "Take a photo showing just enough to make your partner want more.",
            45,
        ),
        "playful" => (
            "Truth or dare, remote edition",
            "Send your partner three dares; they pick one and deliver proof.",
            60,
        ),
        "romantic" => (
            "Sensual massage time",
            "Set up a 10-minute massage with oils and photograph the scene you prepared.",
            60,
        ),
        _ => (
            "Plan a surprise",
            "Plan a small surprise for your partner and document the preparation.",
            60,
        ),
    };

    TaskSuggestion {
        title: title.to_string(),
        description: description.to_string(),
        default_duration_minutes: minutes,
    }
}

pub async fn suggest_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SuggestTaskRequest>,
) -> Result<Json<TaskSuggestion>, ApiError> {
    if !(1..=5).contains(&req.intensity) {
        return Err(ApiError::BadRequest("intensity must be between 1 and 5"));
    }

    let user = load_user(&state, claims.sub).await?;
    let boundaries = convert::boundaries(&user);

    let suggestion = state
        .suggestions
        .suggest(&req.mood_type, req.intensity, &boundaries, req.extreme_mode)
        .await;

    Ok(Json(suggestion))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_deterministic_per_mood() {
        let a = fallback_suggestion("feeling_spicy");
        let b = fallback_suggestion("feeling_spicy");
        assert_eq!(a.title, b.title);
        assert_ne!(a.title, fallback_suggestion("teasing").title);
    }

    #[test]
    fn unknown_mood_gets_default() {
        let s = fallback_suggestion("grumpy");
        assert!(!s.title.is_empty());
        assert!(s.default_duration_minutes > 0);
    }

    #[tokio::test]
    async fn no_api_key_falls_back() {
        let client = SuggestionClient::new(
            None,
            "http://localhost:0".to_string(),
            "gpt-4o".to_string(),
        );
        let s = client.suggest("teasing", 3, &[], false).await;
        assert_eq!(s.title, fallback_suggestion("teasing").title);
    }
}
