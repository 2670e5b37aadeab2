use crate::models::schema::leaves;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LeaveError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<LeaveStatus> {
        match s {
            "pending" => Some(LeaveStatus::Pending),
            "approved" => Some(LeaveStatus::Approved),
            "rejected" => Some(LeaveStatus::Rejected),
            _ => None,
        }
    }
}

/// A leave request. Created pending by the employee, later approved or
/// rejected by a reviewer through an allow-listed patch.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = leaves)]
pub struct Leave {
    pub id: Uuid,
    pub user_id: String,
    pub leave_type_id: Uuid,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub days: BigDecimal,
    pub reason: String,
    pub status: String,
    pub contact_number: Option<String>,
    pub attachment_path: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Leave {
    pub fn get_by_id(conn: &mut PgConnection, leave_id: Uuid) -> Result<Option<Leave>, LeaveError> {
        leaves::table
            .find(leave_id)
            .first::<Leave>(conn)
            .optional()
            .map_err(LeaveError::DatabaseError)
    }

    pub fn list_for_user(
        conn: &mut PgConnection,
        lookup_user_id: &str,
    ) -> Result<Vec<Leave>, LeaveError> {
        leaves::table
            .filter(leaves::user_id.eq(lookup_user_id))
            .order(leaves::created_at.desc())
            .load::<Leave>(conn)
            .map_err(LeaveError::DatabaseError)
    }

    pub fn update(
        conn: &mut PgConnection,
        leave_id: Uuid,
        patch: &LeavePatch,
    ) -> Result<Leave, LeaveError> {
        diesel::update(leaves::table.find(leave_id))
            .set((patch, leaves::updated_at.eq(diesel::dsl::now)))
            .get_result::<Leave>(conn)
            .map_err(LeaveError::DatabaseError)
    }

    /// Hard delete, scoped to the owner. Returns the number of rows removed.
    pub fn delete_for_user(
        conn: &mut PgConnection,
        leave_id: Uuid,
        lookup_user_id: &str,
    ) -> Result<usize, LeaveError> {
        diesel::delete(
            leaves::table
                .filter(leaves::id.eq(leave_id))
                .filter(leaves::user_id.eq(lookup_user_id)),
        )
        .execute(conn)
        .map_err(LeaveError::DatabaseError)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = leaves)]
pub struct NewLeave {
    pub id: Uuid,
    pub user_id: String,
    pub leave_type_id: Uuid,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub days: BigDecimal,
    pub reason: String,
    pub status: String,
    pub contact_number: Option<String>,
    pub attachment_path: Option<String>,
}

impl NewLeave {
    pub fn insert(&self, conn: &mut PgConnection) -> Result<Leave, LeaveError> {
        diesel::insert_into(leaves::table)
            .values(self)
            .get_result::<Leave>(conn)
            .map_err(LeaveError::DatabaseError)
    }
}

/// The only leave fields a PUT may touch. Everything else, `applied_at`
/// included, is immutable after creation.
#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = leaves)]
pub struct LeavePatch {
    pub status: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_comments: Option<String>,
}

impl LeavePatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.reviewed_at.is_none()
            && self.reviewed_by.is_none()
            && self.review_comments.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            LeaveStatus::Pending,
            LeaveStatus::Approved,
            LeaveStatus::Rejected,
        ] {
            assert_eq!(LeaveStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(LeaveStatus::parse("cancelled"), None);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(LeavePatch::default().is_empty());
        let patch = LeavePatch {
            status: Some("approved".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
