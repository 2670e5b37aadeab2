use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use bigdecimal::ToPrimitive;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::salary_slips::SalarySlip;
use crate::sessions::AuthUser;
use crate::{ApiError, AppState};

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/salary-slips", get(list_salary_slips))
        .route("/api/salary-slips/:month/:year", get(get_salary_slip))
        .with_state(app_state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SalarySlipResponse {
    id: Uuid,
    user_id: String,
    month: i32,
    year: i32,
    basic_salary: f64,
    allowances: Option<serde_json::Value>,
    deductions: Option<serde_json::Value>,
    gross_salary: f64,
    net_salary: f64,
    payment_date: Option<String>,
    file_path: Option<String>,
}

impl From<SalarySlip> for SalarySlipResponse {
    fn from(slip: SalarySlip) -> Self {
        SalarySlipResponse {
            id: slip.id,
            user_id: slip.user_id,
            month: slip.month,
            year: slip.year,
            basic_salary: slip.basic_salary.to_f64().unwrap_or(0.0),
            allowances: slip.allowances,
            deductions: slip.deductions,
            gross_salary: slip.gross_salary.to_f64().unwrap_or(0.0),
            net_salary: slip.net_salary.to_f64().unwrap_or(0.0),
            payment_date: slip.payment_date.map(|d| d.to_string()),
            file_path: slip.file_path,
        }
    }
}

async fn list_salary_slips(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<SalarySlipResponse>>, ApiError> {
    let slips = state.db.get_salary_slips(&auth.user_id)?;
    Ok(Json(slips.into_iter().map(SalarySlipResponse::from).collect()))
}

async fn get_salary_slip(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((month, year)): Path<(i32, i32)>,
) -> Result<Json<SalarySlipResponse>, ApiError> {
    if !(1..=12).contains(&month) {
        return Err(ApiError::Validation(format!("Invalid month: {month}")));
    }

    let slip = state
        .db
        .get_salary_slip(&auth.user_id, month, year)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(slip.into()))
}
