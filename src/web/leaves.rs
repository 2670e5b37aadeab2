use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json, Router};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::aggregates::leave_day_count;
use crate::models::leaves::{Leave, LeavePatch, LeaveStatus, NewLeave};
use crate::sessions::AuthUser;
use crate::{ApiError, AppState};

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/leave-types", get(list_leave_types))
        .route("/api/leave-balances", get(list_leave_balances))
        .route("/api/leaves", post(create_leave))
        .route("/api/leaves", get(list_leaves))
        .route("/api/leaves/:id", put(update_leave))
        .route("/api/leaves/:id", delete(delete_leave))
        .with_state(app_state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaveTypeResponse {
    id: Uuid,
    name: String,
    max_days: i32,
    carry_forward: bool,
}

async fn list_leave_types(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthUser>,
) -> Result<Json<Vec<LeaveTypeResponse>>, ApiError> {
    let leave_types = state.db.get_leave_types()?;
    Ok(Json(
        leave_types
            .into_iter()
            .map(|lt| LeaveTypeResponse {
                id: lt.id,
                name: lt.name,
                max_days: lt.max_days,
                carry_forward: lt.carry_forward,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct BalanceQuery {
    year: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaveBalanceResponse {
    id: Uuid,
    user_id: String,
    leave_type_id: Uuid,
    total_days: i32,
    used_days: i32,
    year: i32,
}

async fn list_leave_balances(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<Vec<LeaveBalanceResponse>>, ApiError> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let balances = state.db.get_leave_balances(&auth.user_id, year)?;
    Ok(Json(
        balances
            .into_iter()
            .map(|b| LeaveBalanceResponse {
                id: b.id,
                user_id: b.user_id,
                leave_type_id: b.leave_type_id,
                total_days: b.total_days,
                used_days: b.used_days,
                year: b.year,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLeaveRequest {
    leave_type_id: Uuid,
    from_date: NaiveDate,
    to_date: NaiveDate,
    reason: String,
    contact_number: Option<String>,
    attachment_path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaveResponse {
    id: Uuid,
    user_id: String,
    leave_type_id: Uuid,
    from_date: String,
    to_date: String,
    days: f64,
    reason: String,
    status: String,
    contact_number: Option<String>,
    attachment_path: Option<String>,
    applied_at: String,
}

impl From<Leave> for LeaveResponse {
    fn from(leave: Leave) -> Self {
        LeaveResponse {
            id: leave.id,
            user_id: leave.user_id,
            leave_type_id: leave.leave_type_id,
            from_date: leave.from_date.to_string(),
            to_date: leave.to_date.to_string(),
            days: leave.days.to_f64().unwrap_or(0.0),
            reason: leave.reason,
            status: leave.status,
            contact_number: leave.contact_number,
            attachment_path: leave.attachment_path,
            applied_at: leave.applied_at.to_rfc3339(),
        }
    }
}

async fn create_leave(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateLeaveRequest>,
) -> Result<Json<LeaveResponse>, ApiError> {
    if body.to_date < body.from_date {
        return Err(ApiError::Validation(
            "toDate must not be before fromDate".to_string(),
        ));
    }
    if body.reason.trim().is_empty() {
        return Err(ApiError::Validation("Reason is required".to_string()));
    }

    let days = leave_day_count(body.from_date, body.to_date);
    let new_leave = NewLeave {
        id: Uuid::new_v4(),
        user_id: auth.user_id.clone(),
        leave_type_id: body.leave_type_id,
        from_date: body.from_date,
        to_date: body.to_date,
        days: BigDecimal::from(days),
        reason: body.reason,
        status: LeaveStatus::Pending.as_str().to_string(),
        contact_number: body.contact_number,
        attachment_path: body.attachment_path,
    };

    let leave = state.db.create_leave(&new_leave)?;
    info!("User {} applied for {} day(s) of leave", auth.user_id, days);
    Ok(Json(leave.into()))
}

async fn list_leaves(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<LeaveResponse>>, ApiError> {
    let leaves = state.db.get_user_leaves(&auth.user_id)?;
    Ok(Json(leaves.into_iter().map(LeaveResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateLeaveRequest {
    status: Option<String>,
    review_comments: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdatedLeaveResponse {
    id: Uuid,
    user_id: String,
    status: String,
}

async fn update_leave(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(leave_id): Path<Uuid>,
    Json(body): Json<UpdateLeaveRequest>,
) -> Result<Json<UpdatedLeaveResponse>, ApiError> {
    let leave = state.db.get_leave(leave_id)?.ok_or(ApiError::NotFound)?;

    let is_reviewer = state.config.is_reviewer(auth.claims.email.as_deref());
    // Foreign leaves are invisible to non-reviewers.
    if leave.user_id != auth.user_id && !is_reviewer {
        return Err(ApiError::NotFound);
    }

    let mut patch = LeavePatch {
        review_comments: body.review_comments,
        ..Default::default()
    };

    if let Some(status) = body.status {
        if !is_reviewer {
            return Err(ApiError::Validation(
                "Only a configured reviewer may change the leave status".to_string(),
            ));
        }
        let status = LeaveStatus::parse(&status)
            .ok_or_else(|| ApiError::Validation(format!("Unknown leave status: {status}")))?;
        patch.status = Some(status.as_str().to_string());
        patch.reviewed_at = Some(Utc::now());
        patch.reviewed_by = Some(auth.user_id.clone());
    }

    if patch.is_empty() {
        return Err(ApiError::Validation(
            "No updatable fields in request".to_string(),
        ));
    }

    let updated = state.db.update_leave(leave_id, &patch)?;
    Ok(Json(UpdatedLeaveResponse {
        id: updated.id,
        user_id: updated.user_id,
        status: updated.status,
    }))
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

async fn delete_leave(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(leave_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let leave = state.db.get_leave(leave_id)?.ok_or(ApiError::NotFound)?;
    if leave.user_id != auth.user_id {
        return Err(ApiError::NotFound);
    }
    if leave.status != LeaveStatus::Pending.as_str() {
        return Err(ApiError::Validation(
            "Only pending leave requests can be deleted".to_string(),
        ));
    }

    state.db.delete_leave(leave_id, &auth.user_id)?;
    Ok(Json(MessageResponse {
        message: "Leave deleted successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn leave_response_preserves_dates_and_day_precision() {
        let leave = Leave {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            leave_type_id: Uuid::new_v4(),
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            days: BigDecimal::from_str("5.0").unwrap(),
            reason: "family".to_string(),
            status: "pending".to_string(),
            contact_number: Some("+1-555".to_string()),
            attachment_path: None,
            applied_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            review_comments: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let response = LeaveResponse::from(leave);
        assert_eq!(response.from_date, "2024-01-01");
        assert_eq!(response.to_date, "2024-01-05");
        assert_eq!(response.days, 5.0);
        assert_eq!(response.status, "pending");
    }

    #[test]
    fn update_request_rejects_unknown_fields() {
        let err = serde_json::from_str::<UpdateLeaveRequest>(
            r#"{"status":"approved","userId":"someone-else"}"#,
        );
        assert!(err.is_err());

        let ok = serde_json::from_str::<UpdateLeaveRequest>(
            r#"{"status":"approved","reviewComments":"ok"}"#,
        )
        .unwrap();
        assert_eq!(ok.status.as_deref(), Some("approved"));
        assert_eq!(ok.review_comments.as_deref(), Some("ok"));
    }
}
