//! Pure aggregation over already-fetched rows. No I/O happens here.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::attendance::{AttendanceRecord, AttendanceStatus};
use crate::models::leave_balances::LeaveBalance;
use crate::models::leaves::{Leave, LeaveStatus};

/// Inclusive day count for a leave request; both endpoints count.
/// Callers validate `to >= from` before asking.
pub fn leave_day_count(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days() + 1
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSummary {
    pub leave_type_id: Uuid,
    pub used: i32,
    pub total: i32,
    pub remaining: i32,
}

#[derive(Debug, Clone)]
pub struct DashboardStats {
    pub leaves_used: i32,
    pub leaves_remaining: i32,
    pub attendance_rate: f64,
    pub pending_requests: i64,
    pub balances: Vec<BalanceSummary>,
}

pub fn dashboard_stats(
    balances: &[LeaveBalance],
    leaves: &[Leave],
    month_records: &[AttendanceRecord],
) -> DashboardStats {
    let leaves_used = balances.iter().map(|b| b.used_days).sum();
    let leaves_remaining = balances.iter().map(|b| b.total_days - b.used_days).sum();
    let pending_requests = leaves
        .iter()
        .filter(|l| l.status == LeaveStatus::Pending.as_str())
        .count() as i64;

    DashboardStats {
        leaves_used,
        leaves_remaining,
        attendance_rate: attendance_rate(month_records),
        pending_requests,
        balances: balances
            .iter()
            .map(|b| BalanceSummary {
                leave_type_id: b.leave_type_id,
                used: b.used_days,
                total: b.total_days,
                remaining: b.total_days - b.used_days,
            })
            .collect(),
    }
}

/// Percentage of days present or working from home, one decimal place.
/// An empty month is 0.0 rather than a division error.
pub fn attendance_rate(records: &[AttendanceRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let present_or_wfh = records
        .iter()
        .filter(|r| {
            r.status == AttendanceStatus::Present.as_str()
                || r.status == AttendanceStatus::Wfh.as_str()
        })
        .count();
    round_one_decimal(present_or_wfh as f64 / records.len() as f64 * 100.0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceCounts {
    pub present: usize,
    pub absent: usize,
    pub leave: usize,
    pub wfh: usize,
}

pub fn attendance_counts(records: &[AttendanceRecord]) -> AttendanceCounts {
    let mut counts = AttendanceCounts::default();
    for record in records {
        match AttendanceStatus::parse(&record.status) {
            Some(AttendanceStatus::Present) => counts.present += 1,
            Some(AttendanceStatus::Absent) => counts.absent += 1,
            Some(AttendanceStatus::Leave) => counts.leave += 1,
            Some(AttendanceStatus::Wfh) => counts.wfh += 1,
            None => {}
        }
    }
    counts
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(status: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            date: date(2024, 6, 3),
            status: status.to_string(),
            check_in: None,
            check_out: None,
            working_hours: None,
            regularized_at: None,
            regularization_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn balance(leave_type_id: Uuid, total: i32, used: i32) -> LeaveBalance {
        LeaveBalance {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            leave_type_id,
            total_days: total,
            used_days: used,
            year: 2024,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn leave(status: &str) -> Leave {
        Leave {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            leave_type_id: Uuid::new_v4(),
            from_date: date(2024, 6, 3),
            to_date: date(2024, 6, 4),
            days: BigDecimal::from(2),
            reason: "family".to_string(),
            status: status.to_string(),
            contact_number: None,
            attachment_path: None,
            applied_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            review_comments: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn day_count_is_inclusive_of_both_endpoints() {
        assert_eq!(leave_day_count(date(2024, 1, 1), date(2024, 1, 1)), 1);
        assert_eq!(leave_day_count(date(2024, 1, 1), date(2024, 1, 5)), 5);
    }

    #[test]
    fn day_count_spans_month_boundaries() {
        assert_eq!(leave_day_count(date(2024, 2, 28), date(2024, 3, 1)), 3);
    }

    #[test]
    fn attendance_rate_of_empty_month_is_zero() {
        assert_eq!(attendance_rate(&[]), 0.0);
    }

    #[test]
    fn attendance_rate_counts_present_and_wfh() {
        let records = vec![
            record("present"),
            record("present"),
            record("present"),
            record("absent"),
            record("wfh"),
        ];
        assert_eq!(attendance_rate(&records), 80.0);
    }

    #[test]
    fn attendance_rate_rounds_to_one_decimal() {
        let records = vec![record("present"), record("absent"), record("absent")];
        // 1/3 = 33.333...
        assert_eq!(attendance_rate(&records), 33.3);
    }

    #[test]
    fn dashboard_sums_balances_and_counts_pending() {
        let type_a = Uuid::new_v4();
        let type_b = Uuid::new_v4();
        let balances = vec![balance(type_a, 20, 5), balance(type_b, 10, 2)];
        let leaves = vec![leave("pending"), leave("approved"), leave("pending")];
        let records = vec![record("present"), record("wfh"), record("absent")];

        let stats = dashboard_stats(&balances, &leaves, &records);
        assert_eq!(stats.leaves_used, 7);
        assert_eq!(stats.leaves_remaining, 23);
        assert_eq!(stats.pending_requests, 2);
        assert_eq!(stats.attendance_rate, 66.7);
        assert_eq!(
            stats.balances,
            vec![
                BalanceSummary {
                    leave_type_id: type_a,
                    used: 5,
                    total: 20,
                    remaining: 15
                },
                BalanceSummary {
                    leave_type_id: type_b,
                    used: 2,
                    total: 10,
                    remaining: 8
                },
            ]
        );
    }

    #[test]
    fn per_status_counts_ignore_unknown_statuses() {
        let records = vec![
            record("present"),
            record("leave"),
            record("wfh"),
            record("wfh"),
            record("holiday"),
        ];
        assert_eq!(
            attendance_counts(&records),
            AttendanceCounts {
                present: 1,
                absent: 0,
                leave: 1,
                wfh: 2
            }
        );
    }
}
