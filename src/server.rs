//! Sentiment serving API.
//!
//! Exposes the loaded review data and the classifier over a small JSON HTTP
//! API:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Health check (returns version) |
//! | `POST` | `/predict` | Sentiment label + cleaned text for free text |
//! | `GET`  | `/comments` | Most recent reviews for one company |
//!
//! `/predict` and `/comments` require the configured bearer token. Error
//! responses use a JSON envelope with a machine-readable code:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "company_name is required" } }
//! ```

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::Comment;
use crate::normalize::{capitalize, company_slug};
use crate::search_index::SearchIndex;
use crate::sentiment::{predict_sentiment, LexiconModel, SentimentModel};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    index: Arc<SearchIndex>,
    model: Arc<dyn SentimentModel>,
}

/// Start the serving API on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let index = SearchIndex::from_config(&config.search)?;

    let state = AppState {
        config: Arc::new(config.clone()),
        index: Arc::new(index),
        model: Arc::new(LexiconModel::default()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_health))
        .route("/predict", post(handle_predict))
        .route("/comments", get(handle_comments))
        .layer(cors)
        .with_state(state);

    println!("serving API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn forbidden(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::FORBIDDEN,
        code: "forbidden".to_string(),
        message: message.into(),
    }
}

fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error".to_string(),
        message: message.into(),
    }
}

/// Check the bearer token against the configured API token.
fn verify_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == state.config.auth.token => Ok(()),
        _ => Err(forbidden("invalid token")),
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    message: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        message: "Sentiment Analysis API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /predict ============

#[derive(Deserialize)]
struct PredictRequest {
    text: String,
    #[serde(default)]
    company_name: Option<String>,
}

#[derive(Serialize)]
struct PredictResponse {
    sentiment: String,
    cleaned_text: String,
}

async fn handle_predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    verify_token(&state, &headers)?;

    if payload.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }

    let (sentiment, cleaned_text) = predict_sentiment(
        state.model.as_ref(),
        &payload.text,
        payload.company_name.as_deref(),
    );

    Ok(Json(PredictResponse {
        sentiment: sentiment.as_str().to_string(),
        cleaned_text,
    }))
}

// ============ GET /comments ============

#[derive(Deserialize)]
struct CommentsParams {
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Serialize)]
struct CommentsResponse {
    company: String,
    count: usize,
    comments: Vec<Comment>,
}

async fn handle_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CommentsParams>,
) -> Result<Json<CommentsResponse>, AppError> {
    verify_token(&state, &headers)?;

    let company_name = params
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("company_name is required"))?;
    let limit = params.limit.unwrap_or(20);
    if !(1..=500).contains(&limit) {
        return Err(bad_request("limit must be between 1 and 500"));
    }

    // Documents store the capitalized slug as their company keyword
    let term = capitalize(&company_slug(company_name));

    let comments = state
        .index
        .recent_comments(&term, limit)
        .await
        .map_err(|e| upstream_error(format!("search index query failed: {:#}", e)))?;

    Ok(Json(CommentsResponse {
        company: company_name.to_string(),
        count: comments.len(),
        comments,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AuthConfig, DbConfig, ScrapeConfig, SearchConfig, ServerConfig, StorageConfig,
    };
    use axum::http::HeaderValue;

    fn test_state() -> AppState {
        let config = Config {
            storage: StorageConfig {
                batch_dir: "/tmp/batches".into(),
                metadata_csv: "/tmp/meta.csv".into(),
            },
            db: DbConfig {
                path: "/tmp/pipeline.sqlite".into(),
            },
            search: SearchConfig {
                url: "http://127.0.0.1:1".to_string(),
                index: "reviews".to_string(),
                username: "elastic".to_string(),
                password: "secret".to_string(),
                ca_cert: None,
                timeout_secs: 1,
            },
            scrape: ScrapeConfig {
                base_url: "https://example.com/review".to_string(),
                companies: vec!["www.amazon.fr".to_string()],
                max_pages: 1,
                languages: "fr".to_string(),
                verified_only: true,
                min_delay_ms: 0,
                max_delay_ms: 0,
                timeout_secs: 1,
            },
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
            auth: AuthConfig {
                token: "t0k3n".to_string(),
            },
        };

        AppState {
            index: Arc::new(SearchIndex::from_config(&config.search).unwrap()),
            config: Arc::new(config),
            model: Arc::new(LexiconModel::default()),
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_predict_rejects_bad_token() {
        let state = test_state();

        let result = handle_predict(
            State(state.clone()),
            bearer("wrong"),
            Json(PredictRequest {
                text: "super".to_string(),
                company_name: None,
            }),
        )
        .await;
        let err = result.err().expect("bad token must be rejected");
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let result = handle_predict(
            State(state),
            HeaderMap::new(),
            Json(PredictRequest {
                text: "super".to_string(),
                company_name: None,
            }),
        )
        .await;
        assert!(result.is_err(), "missing header must be rejected");
    }

    #[tokio::test]
    async fn test_predict_returns_label_and_cleaned_text() {
        let state = test_state();

        let Json(resp) = handle_predict(
            State(state),
            bearer("t0k3n"),
            Json(PredictRequest {
                text: "Amazon est excellent".to_string(),
                company_name: Some("Amazon".to_string()),
            }),
        )
        .await
        .expect("valid token must be accepted");

        assert_eq!(resp.sentiment, "positive");
        assert_eq!(resp.cleaned_text, "excellent");
    }

    #[tokio::test]
    async fn test_predict_empty_text_is_bad_request() {
        let state = test_state();

        let err = handle_predict(
            State(state),
            bearer("t0k3n"),
            Json(PredictRequest {
                text: "   ".to_string(),
                company_name: None,
            }),
        )
        .await
        .err()
        .expect("empty text must be rejected");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_comments_requires_company_name() {
        let state = test_state();

        let err = handle_comments(
            State(state),
            bearer("t0k3n"),
            Query(CommentsParams {
                company_name: None,
                limit: None,
            }),
        )
        .await
        .err()
        .expect("missing company_name must be rejected");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "bad_request");
    }

    #[tokio::test]
    async fn test_comments_unreachable_index_is_upstream_error() {
        let state = test_state();

        let err = handle_comments(
            State(state),
            bearer("t0k3n"),
            Query(CommentsParams {
                company_name: Some("www.amazon.fr".to_string()),
                limit: Some(5),
            }),
        )
        .await
        .err()
        .expect("unreachable index must surface as an error");
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "upstream_error");
    }
}
