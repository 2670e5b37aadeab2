use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::sessions::SessionRow;
use crate::models::users::UserUpsert;
use crate::oidc;
use crate::sessions::{
    clear_session_cookie, cookie_value, session_cookie, session_ttl, AuthUser, SessionData,
    SESSION_COOKIE,
};
use crate::{ApiError, AppState};

/// Unauthenticated OIDC redirect flow.
pub fn public_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/login", get(login))
        .route("/api/auth/callback", get(callback))
        .route("/api/auth/logout", get(logout))
        .with_state(app_state)
}

/// Routes that sit behind the session gate.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/user", get(current_user))
        .with_state(app_state)
}

async fn login(State(state): State<Arc<AppState>>) -> Result<Redirect, ApiError> {
    let pkce = oidc::generate_pkce().map_err(|e| {
        error!("Could not generate PKCE material: {}", e);
        ApiError::InternalServerError
    })?;
    let login_state = oidc::generate_state().map_err(|e| {
        error!("Could not generate login state: {}", e);
        ApiError::InternalServerError
    })?;

    state.put_pending_login(login_state.clone(), pkce.verifier);

    let url = state
        .oidc
        .authorize_url(&login_state, &pkce.challenge)
        .map_err(|e| {
            error!("Could not build authorization URL: {}", e);
            ApiError::Configuration("identity provider redirect".to_string())
        })?;

    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(provider_error) = params.error {
        warn!("Identity provider returned error: {}", provider_error);
        return Err(ApiError::Validation(format!(
            "Authorization failed: {provider_error}"
        )));
    }

    let code = params
        .code
        .ok_or_else(|| ApiError::Validation("Missing authorization code".to_string()))?;
    let login_state = params
        .state
        .ok_or_else(|| ApiError::Validation("Missing state parameter".to_string()))?;
    let verifier = state
        .take_pending_login(&login_state)
        .ok_or_else(|| ApiError::Validation("Unknown or expired login state".to_string()))?;

    let tokens = state
        .oidc
        .exchange_code(&code, &verifier)
        .await
        .map_err(|e| {
            error!("Authorization code exchange failed: {}", e);
            ApiError::ExternalService
        })?;

    let id_token = tokens.id_token.as_deref().ok_or_else(|| {
        error!("Token response carried no id_token");
        ApiError::ExternalService
    })?;
    let claims = oidc::decode_id_token_claims(id_token).map_err(|e| {
        error!("Could not decode id_token claims: {}", e);
        ApiError::ExternalService
    })?;

    let now = Utc::now();
    let session_data = SessionData {
        claims: claims.clone(),
        access_token: tokens.access_token.clone(),
        refresh_token: tokens.refresh_token.clone(),
        expires_at: now + chrono::Duration::seconds(tokens.expires_in),
    };

    let sid = Uuid::new_v4().simple().to_string();
    let sess = serde_json::to_value(&session_data).map_err(|e| {
        error!("Could not serialize session: {}", e);
        ApiError::InternalServerError
    })?;
    state.db.put_session(&SessionRow {
        sid: sid.clone(),
        sess,
        expire: now + session_ttl(),
    })?;

    state.db.upsert_user(&UserUpsert {
        id: claims.sub.clone(),
        email: claims.email.clone(),
        first_name: claims.first_name.clone(),
        last_name: claims.last_name.clone(),
        profile_image_url: claims.profile_image_url.clone(),
        employee_id: None,
        department: None,
        designation: None,
        joining_date: None,
    })?;

    info!("User {} logged in", claims.sub);
    Ok(([(SET_COOKIE, session_cookie(&sid))], Redirect::to("/")))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    request: axum::extract::Request,
) -> impl IntoResponse {
    if let Some(sid) = cookie_value(request.headers(), SESSION_COOKIE) {
        if let Err(e) = state.db.delete_session(&sid) {
            error!("Failed to delete session on logout: {}", e);
        }
    }
    ([(SET_COOKIE, clear_session_cookie())], Redirect::to("/"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    id: String,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    profile_image_url: Option<String>,
    employee_id: Option<String>,
    department: Option<String>,
    designation: Option<String>,
    joining_date: Option<String>,
}

async fn current_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .db
        .get_user(&auth.user_id)?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        profile_image_url: user.profile_image_url,
        employee_id: user.employee_id,
        department: user.department,
        designation: user.designation,
        joining_date: user.joining_date.map(|d| d.to_string()),
    }))
}
