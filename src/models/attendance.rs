use crate::models::schema::attendance_records;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
    Wfh,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Leave => "leave",
            AttendanceStatus::Wfh => "wfh",
        }
    }

    pub fn parse(s: &str) -> Option<AttendanceStatus> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "leave" => Some(AttendanceStatus::Leave),
            "wfh" => Some(AttendanceStatus::Wfh),
            _ => None,
        }
    }
}

/// One attendance row per user per day, fed either by the external
/// attendance feed or by an explicit regularization request.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = attendance_records)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub user_id: String,
    pub date: NaiveDate,
    pub status: String,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub working_hours: Option<BigDecimal>,
    pub regularized_at: Option<DateTime<Utc>>,
    pub regularization_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// First day of `month` and first day of the following month, used as a
/// half-open date range for month queries.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AttendanceError> {
    let start =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(AttendanceError::InvalidMonth(month))?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(AttendanceError::InvalidMonth(month))?;
    Ok((start, end))
}

impl AttendanceRecord {
    pub fn for_month(
        conn: &mut PgConnection,
        lookup_user_id: &str,
        month: u32,
        year: i32,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let (start, end) = month_bounds(year, month)?;
        attendance_records::table
            .filter(attendance_records::user_id.eq(lookup_user_id))
            .filter(attendance_records::date.ge(start))
            .filter(attendance_records::date.lt(end))
            .order(attendance_records::date.asc())
            .load::<AttendanceRecord>(conn)
            .map_err(AttendanceError::DatabaseError)
    }

    /// Absences on or after `since`, newest first.
    pub fn absent_since(
        conn: &mut PgConnection,
        lookup_user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        attendance_records::table
            .filter(attendance_records::user_id.eq(lookup_user_id))
            .filter(attendance_records::status.eq(AttendanceStatus::Absent.as_str()))
            .filter(attendance_records::date.ge(since))
            .order(attendance_records::date.desc())
            .load::<AttendanceRecord>(conn)
            .map_err(AttendanceError::DatabaseError)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = attendance_records)]
pub struct NewAttendanceRecord {
    pub id: Uuid,
    pub user_id: String,
    pub date: NaiveDate,
    pub status: String,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub working_hours: Option<BigDecimal>,
    pub regularized_at: Option<DateTime<Utc>>,
    pub regularization_reason: Option<String>,
}

impl NewAttendanceRecord {
    pub fn insert(&self, conn: &mut PgConnection) -> Result<AttendanceRecord, AttendanceError> {
        diesel::insert_into(attendance_records::table)
            .values(self)
            .get_result::<AttendanceRecord>(conn)
            .map_err(AttendanceError::DatabaseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_are_half_open() {
        let (start, end) = month_bounds(2024, 2).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn month_bounds_wrap_december() {
        let (start, end) = month_bounds(2024, 12).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn month_bounds_reject_bad_month() {
        assert!(month_bounds(2024, 0).is_err());
        assert!(month_bounds(2024, 13).is_err());
    }
}
