use crate::models::schema::salary_slips;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SalarySlipError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// Monthly payslip, written by payroll. Read-only from this service.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = salary_slips)]
pub struct SalarySlip {
    pub id: Uuid,
    pub user_id: String,
    pub month: i32,
    pub year: i32,
    pub basic_salary: BigDecimal,
    pub allowances: Option<serde_json::Value>,
    pub deductions: Option<serde_json::Value>,
    pub gross_salary: BigDecimal,
    pub net_salary: BigDecimal,
    pub payment_date: Option<NaiveDate>,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SalarySlip {
    pub fn list_for_user(
        conn: &mut PgConnection,
        lookup_user_id: &str,
    ) -> Result<Vec<SalarySlip>, SalarySlipError> {
        salary_slips::table
            .filter(salary_slips::user_id.eq(lookup_user_id))
            .order((salary_slips::year.desc(), salary_slips::month.desc()))
            .load::<SalarySlip>(conn)
            .map_err(SalarySlipError::DatabaseError)
    }

    pub fn find(
        conn: &mut PgConnection,
        lookup_user_id: &str,
        month: i32,
        year: i32,
    ) -> Result<Option<SalarySlip>, SalarySlipError> {
        salary_slips::table
            .filter(salary_slips::user_id.eq(lookup_user_id))
            .filter(salary_slips::month.eq(month))
            .filter(salary_slips::year.eq(year))
            .first::<SalarySlip>(conn)
            .optional()
            .map_err(SalarySlipError::DatabaseError)
    }
}
