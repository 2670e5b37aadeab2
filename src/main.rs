use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod aggregates;
mod ai;
mod config;
mod db;
mod models;
mod object_store;
mod oidc;
mod sessions;
mod web;

use ai::{AiClient, AiError};
use config::Config;
use db::{DBConnection, DBError};
use object_store::{ObjectStoreClient, ObjectStoreError};
use oidc::OidcClient;
use sessions::RefreshLocks;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Resource not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Service is not configured: {0}")]
    Configuration(String),

    #[error("A dependent service is unavailable, please try again later")]
    ExternalService,

    #[error("Internal server error")]
    InternalServerError,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::NotFound => "not_found",
            ApiError::Validation(_) => "validation",
            ApiError::Configuration(_) => "configuration",
            ApiError::ExternalService => "external_service",
            ApiError::InternalServerError => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: u16,
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ExternalService => StatusCode::BAD_GATEWAY,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let ApiError::Configuration(ref detail) = self {
            error!("Configuration error: {}", detail);
        }
        (
            status,
            Json(ErrorResponse {
                status: status.as_u16(),
                error: self.kind(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<DBError> for ApiError {
    fn from(err: DBError) -> Self {
        match err {
            DBError::NotFound => ApiError::NotFound,
            other => {
                error!("Database error: {:?}", other);
                ApiError::InternalServerError
            }
        }
    }
}

impl From<ObjectStoreError> for ApiError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::Config(detail) => ApiError::Configuration(detail.to_string()),
            other => {
                error!("Object storage error: {}", other);
                ApiError::ExternalService
            }
        }
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::MissingApiKey => ApiError::Configuration("AI assistant".to_string()),
            other => {
                error!("AI provider error: {}", other);
                ApiError::ExternalService
            }
        }
    }
}

/// How long a login attempt may sit between redirect and callback.
const PENDING_LOGIN_TTL_MINUTES: i64 = 10;

struct PendingLogin {
    verifier: String,
    created_at: DateTime<Utc>,
}

/// PKCE verifiers parked between the login redirect and the callback,
/// keyed by the opaque state parameter. Stale entries are pruned on insert.
#[derive(Default)]
struct PendingLogins {
    entries: Mutex<HashMap<String, PendingLogin>>,
}

impl PendingLogins {
    fn put(&self, login_state: String, verifier: String) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let cutoff = Utc::now() - Duration::minutes(PENDING_LOGIN_TTL_MINUTES);
        entries.retain(|_, login| login.created_at > cutoff);
        entries.insert(
            login_state,
            PendingLogin {
                verifier,
                created_at: Utc::now(),
            },
        );
    }

    /// Single-use: the verifier is removed on retrieval.
    fn take(&self, login_state: &str) -> Option<String> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let login = entries.remove(login_state)?;
        if login.created_at < Utc::now() - Duration::minutes(PENDING_LOGIN_TTL_MINUTES) {
            return None;
        }
        Some(login.verifier)
    }
}

pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn DBConnection + Send + Sync>,
    pub oidc: OidcClient,
    pub object_store: ObjectStoreClient,
    pub ai: AiClient,
    pub refresh_locks: RefreshLocks,
    pending_logins: PendingLogins,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<dyn DBConnection + Send + Sync>,
        oidc: OidcClient,
        object_store: ObjectStoreClient,
        ai: AiClient,
    ) -> Self {
        AppState {
            config,
            db,
            oidc,
            object_store,
            ai,
            refresh_locks: RefreshLocks::default(),
            pending_logins: PendingLogins::default(),
        }
    }

    pub fn put_pending_login(&self, login_state: String, verifier: String) {
        self.pending_logins.put(login_state, verifier);
    }

    pub fn take_pending_login(&self, login_state: &str) -> Option<String> {
        self.pending_logins.take(login_state)
    }
}

async fn log_requests(request: Request, next: Next) -> axum::response::Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = std::time::Instant::now();

    let response = next.run(request).await;

    if path.starts_with("/api") {
        info!(
            "{} {} {} in {}ms",
            method,
            path,
            response.status().as_u16(),
            started.elapsed().as_millis()
        );
    }
    response
}

fn app_router(state: Arc<AppState>) -> Router {
    let protected = web::auth::router(state.clone())
        .merge(web::dashboard::router(state.clone()))
        .merge(web::leaves::router(state.clone()))
        .merge(web::attendance::router(state.clone()))
        .merge(web::salary::router(state.clone()))
        .merge(web::documents::router(state.clone()))
        .merge(web::ai::router(state.clone()))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            sessions::require_session,
        ));

    protected
        .merge(web::auth::public_router(state))
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db = match db::setup_db(&config.database_url) {
        Ok(db) => db,
        Err(e) => {
            error!("Could not connect to the database: {}", e);
            std::process::exit(1);
        }
    };

    let oidc = match OidcClient::new(
        config.issuer_url.clone(),
        config.client_id.clone(),
        config.redirect_domains.clone(),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Could not build OIDC client: {}", e);
            std::process::exit(1);
        }
    };

    let object_store = match ObjectStoreClient::new(
        config.sidecar_endpoint.clone(),
        config.public_object_search_paths.clone(),
        config.private_object_dir.clone(),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Could not build object storage client: {}", e);
            std::process::exit(1);
        }
    };

    let ai = match AiClient::new(config.openai_base_url.clone(), config.openai_api_key.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!("Could not build AI client: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;
    let state = Arc::new(AppState::new(config, db, oidc, object_store, ai));

    let app = app_router(state);

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Could not bind port {}: {}", port, e);
            std::process::exit(1);
        }
    };
    info!("HR portal listening on port {}", port);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// `AppState` over the in-memory store, for handler tests. The store is
/// also returned directly so tests can inspect rows the handlers wrote.
#[cfg(test)]
pub(crate) fn test_app_state() -> (Arc<AppState>, Arc<db::testing::InMemoryDb>) {
    let store = Arc::new(db::testing::InMemoryDb::default());
    let config = Config {
        port: 5000,
        database_url: "postgres://localhost/hr".to_string(),
        issuer_url: "https://replit.com/oidc".to_string(),
        client_id: "client".to_string(),
        redirect_domains: vec!["app.example.com".to_string()],
        openai_api_key: None,
        openai_base_url: "https://api.openai.com/v1".to_string(),
        public_object_search_paths: Vec::new(),
        private_object_dir: None,
        sidecar_endpoint: "http://127.0.0.1:1106".to_string(),
        reviewer_emails: Vec::new(),
        upload_dir: std::path::PathBuf::from("uploads"),
    };
    let oidc = OidcClient::new(
        config.issuer_url.clone(),
        config.client_id.clone(),
        config.redirect_domains.clone(),
    )
    .unwrap();
    let object_store =
        ObjectStoreClient::new(config.sidecar_endpoint.clone(), Vec::new(), None).unwrap();
    let ai = AiClient::new(config.openai_base_url.clone(), None).unwrap();
    (
        Arc::new(AppState::new(config, store.clone(), oidc, object_store, ai)),
        store,
    )
}
