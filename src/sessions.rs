//! Server-side sessions and the request authentication gate.
//!
//! The gate validates the caller's session on every `/api` request and
//! transparently refreshes an expired access token with the identity
//! provider. Refreshes are serialized per session id so two concurrent
//! requests on the same expired session perform one refresh, not two.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::models::sessions::SessionRow;
use crate::oidc::{IdentityClaims, TokenSet};
use crate::{ApiError, AppState};

pub const SESSION_COOKIE: &str = "hr.sid";

/// Cookie/session-row lifetime, independent of access-token expiry.
pub fn session_ttl() -> Duration {
    Duration::days(7)
}

/// What the `sess` JSON blob holds.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SessionData {
    pub claims: IdentityClaims,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated principal handlers receive as a request extension.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
    pub claims: IdentityClaims,
}

impl From<&SessionData> for AuthUser {
    fn from(data: &SessionData) -> Self {
        AuthUser {
            user_id: data.claims.sub.clone(),
            claims: data.claims.clone(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionCheck {
    Valid,
    NeedsRefresh,
    Unrefreshable,
}

/// Decide what to do with a stored session at time `now`.
pub fn check_session(data: &SessionData, now: DateTime<Utc>) -> SessionCheck {
    if data.expires_at > now {
        SessionCheck::Valid
    } else if data.refresh_token.is_some() {
        SessionCheck::NeedsRefresh
    } else {
        SessionCheck::Unrefreshable
    }
}

/// Session state after a successful refresh: tokens and expiry replaced
/// wholesale, cached claims kept.
pub fn refreshed_session(data: &SessionData, tokens: &TokenSet, now: DateTime<Utc>) -> SessionData {
    SessionData {
        claims: data.claims.clone(),
        access_token: tokens.access_token.clone(),
        refresh_token: tokens.refresh_token.clone(),
        expires_at: now + Duration::seconds(tokens.expires_in),
    }
}

/// Per-session-id async locks serializing token refresh.
#[derive(Default)]
pub struct RefreshLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RefreshLocks {
    pub async fn acquire(&self, sid: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(sid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the entry once no other request holds it.
    pub async fn release(&self, sid: &str) {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(sid) {
            // One reference in the map, one held by the caller.
            if Arc::strong_count(lock) <= 2 {
                locks.remove(sid);
            }
        }
    }
}

/// Resolve the caller's session to an authenticated principal, refreshing
/// an expired access token when a refresh token is available. Any failure
/// on the refresh path means the caller must log in again.
pub async fn authenticate(state: &AppState, sid: &str) -> Result<AuthUser, ApiError> {
    let data = load_session(state, sid)?.ok_or(ApiError::Unauthenticated)?;

    if check_session(&data, Utc::now()) == SessionCheck::Valid {
        return Ok(AuthUser::from(&data));
    }

    let lock = state.refresh_locks.acquire(sid).await;
    let result = {
        let _guard = lock.lock().await;
        refresh_under_lock(state, sid).await
    };
    state.refresh_locks.release(sid).await;
    result
}

async fn refresh_under_lock(state: &AppState, sid: &str) -> Result<AuthUser, ApiError> {
    // Re-read: a concurrent request may have refreshed while we waited.
    let data = load_session(state, sid)?.ok_or(ApiError::Unauthenticated)?;
    let now = Utc::now();

    let refresh_token = match check_session(&data, now) {
        SessionCheck::Valid => return Ok(AuthUser::from(&data)),
        SessionCheck::Unrefreshable => {
            debug!("Session {} expired with no refresh token", sid);
            return Err(ApiError::Unauthenticated);
        }
        SessionCheck::NeedsRefresh => data
            .refresh_token
            .clone()
            .ok_or(ApiError::Unauthenticated)?,
    };

    let tokens = state.oidc.refresh(&refresh_token).await.map_err(|e| {
        warn!("Token refresh failed for session {}: {}", sid, e);
        ApiError::Unauthenticated
    })?;

    let refreshed = refreshed_session(&data, &tokens, now);
    store_session_data(state, sid, &refreshed)?;
    debug!("Refreshed access token for session {}", sid);
    Ok(AuthUser::from(&refreshed))
}

fn load_session(state: &AppState, sid: &str) -> Result<Option<SessionData>, ApiError> {
    let Some(row) = state.db.get_session(sid)? else {
        return Ok(None);
    };

    if row.expire < Utc::now() {
        if let Err(e) = state.db.delete_session(sid) {
            error!("Failed to delete expired session {}: {}", sid, e);
        }
        return Ok(None);
    }

    match serde_json::from_value::<SessionData>(row.sess) {
        Ok(data) => Ok(Some(data)),
        Err(e) => {
            warn!("Discarding undecodable session {}: {}", sid, e);
            Ok(None)
        }
    }
}

/// Rewrite the session blob, keeping the row's cookie expiry.
fn store_session_data(state: &AppState, sid: &str, data: &SessionData) -> Result<(), ApiError> {
    let existing = state
        .db
        .get_session(sid)?
        .ok_or(ApiError::Unauthenticated)?;
    let sess = serde_json::to_value(data).map_err(|e| {
        error!("Failed to serialize session data: {}", e);
        ApiError::InternalServerError
    })?;
    state.db.put_session(&SessionRow {
        sid: sid.to_string(),
        sess,
        expire: existing.expire,
    })?;
    Ok(())
}

/// Gate middleware for all authenticated routes.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let sid =
        cookie_value(request.headers(), SESSION_COOKIE).ok_or(ApiError::Unauthenticated)?;
    let auth_user = authenticate(&state, &sid).await?;
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?.to_str().ok()?;
    for pair in header.split(';') {
        if let Some((key, value)) = pair.trim().split_once('=') {
            if key == name {
                return Some(value.to_string());
            }
        }
    }
    None
}

pub fn session_cookie(sid: &str) -> String {
    format!(
        "{SESSION_COOKIE}={sid}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session_ttl().num_seconds()
    )
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn claims() -> IdentityClaims {
        IdentityClaims {
            sub: "user-1".to_string(),
            email: Some("u@example.com".to_string()),
            first_name: None,
            last_name: None,
            profile_image_url: None,
        }
    }

    fn session(expires_at: DateTime<Utc>, refresh_token: Option<&str>) -> SessionData {
        SessionData {
            claims: claims(),
            access_token: "at-old".to_string(),
            refresh_token: refresh_token.map(String::from),
            expires_at,
        }
    }

    #[test]
    fn live_session_passes_without_refresh() {
        let now = Utc::now();
        let data = session(now + Duration::minutes(5), Some("rt"));
        assert_eq!(check_session(&data, now), SessionCheck::Valid);
    }

    #[test]
    fn expired_session_without_refresh_token_is_unrefreshable() {
        let now = Utc::now();
        let data = session(now - Duration::minutes(5), None);
        assert_eq!(check_session(&data, now), SessionCheck::Unrefreshable);
    }

    #[test]
    fn expired_session_with_refresh_token_needs_refresh() {
        let now = Utc::now();
        let data = session(now - Duration::minutes(5), Some("rt"));
        assert_eq!(check_session(&data, now), SessionCheck::NeedsRefresh);
    }

    #[test]
    fn refresh_replaces_tokens_and_extends_expiry() {
        let now = Utc::now();
        let data = session(now - Duration::minutes(5), Some("rt-old"));
        let tokens = TokenSet {
            access_token: "at-new".to_string(),
            refresh_token: Some("rt-new".to_string()),
            expires_in: 3600,
            id_token: None,
        };

        let refreshed = refreshed_session(&data, &tokens, now);
        assert_eq!(refreshed.access_token, "at-new");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("rt-new"));
        assert_eq!(refreshed.expires_at, now + Duration::seconds(3600));
        assert_eq!(refreshed.claims.sub, "user-1");

        // Valid until the new expiry passes; no re-refresh before then.
        assert_eq!(check_session(&refreshed, now), SessionCheck::Valid);
        assert_eq!(
            check_session(&refreshed, now + Duration::seconds(3601)),
            SessionCheck::NeedsRefresh
        );
    }

    #[test]
    fn refresh_takes_provider_refresh_token_verbatim() {
        // A provider that omits the refresh token leaves the session
        // unrefreshable at its next expiry.
        let now = Utc::now();
        let data = session(now - Duration::minutes(5), Some("rt-old"));
        let tokens = TokenSet {
            access_token: "at-new".to_string(),
            refresh_token: None,
            expires_in: 60,
            id_token: None,
        };

        let refreshed = refreshed_session(&data, &tokens, now);
        assert_eq!(
            check_session(&refreshed, now + Duration::seconds(61)),
            SessionCheck::Unrefreshable
        );
    }

    #[test]
    fn cookie_parsing_handles_multiple_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; hr.sid=abc123; lang=en"),
        );
        assert_eq!(cookie_value(&headers, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
        assert_eq!(cookie_value(&HeaderMap::new(), SESSION_COOKIE), None);
    }

    #[tokio::test]
    async fn refresh_locks_hand_out_one_lock_per_sid() {
        let locks = RefreshLocks::default();
        let a = locks.acquire("sid-1").await;
        let b = locks.acquire("sid-1").await;
        let other = locks.acquire("sid-2").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));

        drop(b);
        drop(other);
        locks.release("sid-2").await;
        // sid-1 still held by `a`, so a fresh acquire returns the same lock.
        let c = locks.acquire("sid-1").await;
        assert!(Arc::ptr_eq(&a, &c));
    }
}
