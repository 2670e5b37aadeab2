use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Extension, Form, Json, Router};
use bigdecimal::ToPrimitive;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::aggregates;
use crate::models::attendance::{AttendanceRecord, AttendanceStatus, NewAttendanceRecord};
use crate::sessions::AuthUser;
use crate::{ApiError, AppState};

const DEFAULT_ABSENCE_WINDOW_DAYS: i64 = 7;

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/attendance", get(list_attendance))
        .route("/api/attendance/absent-dates", get(absent_dates))
        .route("/api/attendance/regularize", post(regularize))
        .with_state(app_state)
}

#[derive(Debug, Deserialize)]
struct MonthQuery {
    month: Option<u32>,
    year: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceRecordResponse {
    id: Uuid,
    user_id: String,
    date: String,
    status: String,
    check_in: Option<String>,
    check_out: Option<String>,
    working_hours: Option<f64>,
}

impl From<AttendanceRecord> for AttendanceRecordResponse {
    fn from(record: AttendanceRecord) -> Self {
        AttendanceRecordResponse {
            id: record.id,
            user_id: record.user_id,
            date: record.date.to_string(),
            status: record.status,
            check_in: record.check_in.map(|t| t.to_rfc3339()),
            check_out: record.check_out.map(|t| t.to_rfc3339()),
            working_hours: record.working_hours.and_then(|h| h.to_f64()),
        }
    }
}

#[derive(Debug, Serialize)]
struct AttendanceStats {
    present: usize,
    absent: usize,
    leave: usize,
    wfh: usize,
}

#[derive(Debug, Serialize)]
struct AttendanceResponse {
    records: Vec<AttendanceRecordResponse>,
    stats: AttendanceStats,
}

async fn list_attendance(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    let now = Utc::now();
    let month = query.month.unwrap_or_else(|| now.month());
    let year = query.year.unwrap_or_else(|| now.year());
    if !(1..=12).contains(&month) {
        return Err(ApiError::Validation(format!("Invalid month: {month}")));
    }

    let records = state.db.get_attendance_records(&auth.user_id, month, year)?;
    let counts = aggregates::attendance_counts(&records);

    Ok(Json(AttendanceResponse {
        records: records
            .into_iter()
            .map(AttendanceRecordResponse::from)
            .collect(),
        stats: AttendanceStats {
            present: counts.present,
            absent: counts.absent,
            leave: counts.leave,
            wfh: counts.wfh,
        },
    }))
}

#[derive(Debug, Deserialize)]
struct AbsentQuery {
    days: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AbsentDateResponse {
    id: Uuid,
    date: String,
    status: String,
}

async fn absent_dates(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<AbsentQuery>,
) -> Result<Json<Vec<AbsentDateResponse>>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_ABSENCE_WINDOW_DAYS);
    if days < 0 {
        return Err(ApiError::Validation("days must not be negative".to_string()));
    }

    let since = (Utc::now() - Duration::days(days)).date_naive();
    let records = state.db.get_absent_dates(&auth.user_id, since)?;

    Ok(Json(
        records
            .into_iter()
            .map(|r| AbsentDateResponse {
                id: r.id,
                date: r.date.to_string(),
                status: r.status,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct RegularizeForm {
    date: NaiveDate,
    status: String,
    reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegularizedResponse {
    id: Uuid,
    user_id: String,
    date: String,
    status: String,
}

async fn regularize(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Form(form): Form<RegularizeForm>,
) -> Result<Json<RegularizedResponse>, ApiError> {
    let status = AttendanceStatus::parse(&form.status)
        .ok_or_else(|| ApiError::Validation(format!("Unknown attendance status: {}", form.status)))?;
    if form.reason.trim().is_empty() {
        return Err(ApiError::Validation("Reason is required".to_string()));
    }

    let new_record = NewAttendanceRecord {
        id: Uuid::new_v4(),
        user_id: auth.user_id.clone(),
        date: form.date,
        status: status.as_str().to_string(),
        check_in: None,
        check_out: None,
        working_hours: None,
        regularized_at: Some(Utc::now()),
        regularization_reason: Some(form.reason),
    };

    let record = state.db.create_attendance_record(&new_record)?;
    Ok(Json(RegularizedResponse {
        id: record.id,
        user_id: record.user_id,
        date: record.date.to_string(),
        status: record.status,
    }))
}
