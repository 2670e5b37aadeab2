use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::aggregates;
use crate::sessions::AuthUser;
use crate::{ApiError, AppState};

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/dashboard/stats", get(dashboard_stats))
        .with_state(app_state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse {
    leaves_used: i32,
    leaves_remaining: i32,
    attendance_rate: f64,
    pending_requests: i64,
    leave_balances: Vec<BalanceEntry>,
}

#[derive(Debug, Serialize)]
struct BalanceEntry {
    #[serde(rename = "type")]
    leave_type: Uuid,
    used: i32,
    total: i32,
    remaining: i32,
}

async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let now = Utc::now();
    let year = now.year();
    let month = now.month();

    let balances = state.db.get_leave_balances(&auth.user_id, year)?;
    let leaves = state.db.get_user_leaves(&auth.user_id)?;
    let records = state
        .db
        .get_attendance_records(&auth.user_id, month, year)?;

    let stats = aggregates::dashboard_stats(&balances, &leaves, &records);

    Ok(Json(DashboardResponse {
        leaves_used: stats.leaves_used,
        leaves_remaining: stats.leaves_remaining,
        attendance_rate: stats.attendance_rate,
        pending_requests: stats.pending_requests,
        leave_balances: stats
            .balances
            .into_iter()
            .map(|b| BalanceEntry {
                leave_type: b.leave_type_id,
                used: b.used,
                total: b.total,
                remaining: b.remaining,
            })
            .collect(),
    }))
}
