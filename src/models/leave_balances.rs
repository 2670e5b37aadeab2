use crate::models::schema::leave_balances;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LeaveBalanceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// Per-user, per-type, per-year day grants. Maintained by an external
/// payroll process; this service only reads and aggregates them.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = leave_balances)]
pub struct LeaveBalance {
    pub id: Uuid,
    pub user_id: String,
    pub leave_type_id: Uuid,
    pub total_days: i32,
    pub used_days: i32,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveBalance {
    pub fn for_user_year(
        conn: &mut PgConnection,
        lookup_user_id: &str,
        lookup_year: i32,
    ) -> Result<Vec<LeaveBalance>, LeaveBalanceError> {
        leave_balances::table
            .filter(leave_balances::user_id.eq(lookup_user_id))
            .filter(leave_balances::year.eq(lookup_year))
            .load::<LeaveBalance>(conn)
            .map_err(LeaveBalanceError::DatabaseError)
    }
}
