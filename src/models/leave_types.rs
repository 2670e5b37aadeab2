use crate::models::schema::leave_types;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LeaveTypeError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// Reference data: the kinds of leave an employee can request.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = leave_types)]
pub struct LeaveType {
    pub id: Uuid,
    pub name: String,
    pub max_days: i32,
    pub carry_forward: bool,
    pub created_at: DateTime<Utc>,
}

impl LeaveType {
    pub fn list(conn: &mut PgConnection) -> Result<Vec<LeaveType>, LeaveTypeError> {
        leave_types::table
            .order(leave_types::name.asc())
            .load::<LeaveType>(conn)
            .map_err(LeaveTypeError::DatabaseError)
    }
}
