use std::sync::Arc;

use chrono::NaiveDate;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::ai_conversations::{AiConversation, AiConversationError, NewAiConversation};
use crate::models::attendance::{AttendanceError, AttendanceRecord, NewAttendanceRecord};
use crate::models::hr_documents::{HrDocument, HrDocumentError, NewHrDocument};
use crate::models::leave_balances::{LeaveBalance, LeaveBalanceError};
use crate::models::leave_types::{LeaveType, LeaveTypeError};
use crate::models::leaves::{Leave, LeaveError, LeavePatch, NewLeave};
use crate::models::salary_slips::{SalarySlip, SalarySlipError};
use crate::models::sessions::{SessionError, SessionRow};
use crate::models::users::{User, UserError, UserUpsert};

/// How many conversation rows the history endpoint returns at most.
pub const CONVERSATION_HISTORY_LIMIT: i64 = 50;

#[derive(Error, Debug)]
pub enum DBError {
    #[error("Record not found")]
    NotFound,
    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("User error: {0}")]
    User(#[from] UserError),
    #[error("Leave type error: {0}")]
    LeaveType(#[from] LeaveTypeError),
    #[error("Leave balance error: {0}")]
    LeaveBalance(#[from] LeaveBalanceError),
    #[error("Leave error: {0}")]
    Leave(#[from] LeaveError),
    #[error("Attendance error: {0}")]
    Attendance(#[from] AttendanceError),
    #[error("Salary slip error: {0}")]
    SalarySlip(#[from] SalarySlipError),
    #[error("HR document error: {0}")]
    HrDocument(#[from] HrDocumentError),
    #[error("AI conversation error: {0}")]
    AiConversation(#[from] AiConversationError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Typed persistence operations. Handlers only ever see this trait, so the
/// Postgres wiring stays swappable in tests.
pub trait DBConnection: Send + Sync {
    fn get_user(&self, user_id: &str) -> Result<Option<User>, DBError>;
    fn upsert_user(&self, upsert: &UserUpsert) -> Result<User, DBError>;

    fn get_leave_types(&self) -> Result<Vec<LeaveType>, DBError>;
    fn get_leave_balances(&self, user_id: &str, year: i32) -> Result<Vec<LeaveBalance>, DBError>;

    fn create_leave(&self, new_leave: &NewLeave) -> Result<Leave, DBError>;
    fn get_user_leaves(&self, user_id: &str) -> Result<Vec<Leave>, DBError>;
    fn get_leave(&self, leave_id: Uuid) -> Result<Option<Leave>, DBError>;
    fn update_leave(&self, leave_id: Uuid, patch: &LeavePatch) -> Result<Leave, DBError>;
    fn delete_leave(&self, leave_id: Uuid, user_id: &str) -> Result<(), DBError>;

    fn get_attendance_records(
        &self,
        user_id: &str,
        month: u32,
        year: i32,
    ) -> Result<Vec<AttendanceRecord>, DBError>;
    fn create_attendance_record(
        &self,
        new_record: &NewAttendanceRecord,
    ) -> Result<AttendanceRecord, DBError>;
    fn get_absent_dates(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, DBError>;

    fn get_salary_slips(&self, user_id: &str) -> Result<Vec<SalarySlip>, DBError>;
    fn get_salary_slip(
        &self,
        user_id: &str,
        month: i32,
        year: i32,
    ) -> Result<Option<SalarySlip>, DBError>;

    fn create_hr_document(&self, new_document: &NewHrDocument) -> Result<HrDocument, DBError>;
    fn get_hr_documents(&self) -> Result<Vec<HrDocument>, DBError>;
    fn soft_delete_hr_document(&self, document_id: Uuid) -> Result<(), DBError>;

    fn create_ai_conversation(
        &self,
        new_conversation: &NewAiConversation,
    ) -> Result<AiConversation, DBError>;
    fn get_user_conversations(&self, user_id: &str) -> Result<Vec<AiConversation>, DBError>;

    fn get_session(&self, sid: &str) -> Result<Option<SessionRow>, DBError>;
    fn put_session(&self, row: &SessionRow) -> Result<(), DBError>;
    fn delete_session(&self, sid: &str) -> Result<(), DBError>;
}

pub struct PostgresConnection {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl PostgresConnection {
    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, DBError> {
        Ok(self.pool.get()?)
    }
}

pub fn setup_db(database_url: &str) -> Result<Arc<dyn DBConnection + Send + Sync>, DBError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder().build(manager)?;
    info!("Database connection pool initialized");
    Ok(Arc::new(PostgresConnection { pool }))
}

impl DBConnection for PostgresConnection {
    fn get_user(&self, user_id: &str) -> Result<Option<User>, DBError> {
        Ok(User::get_by_id(&mut *self.conn()?, user_id)?)
    }

    fn upsert_user(&self, upsert: &UserUpsert) -> Result<User, DBError> {
        Ok(upsert.upsert(&mut *self.conn()?)?)
    }

    fn get_leave_types(&self) -> Result<Vec<LeaveType>, DBError> {
        Ok(LeaveType::list(&mut *self.conn()?)?)
    }

    fn get_leave_balances(&self, user_id: &str, year: i32) -> Result<Vec<LeaveBalance>, DBError> {
        Ok(LeaveBalance::for_user_year(&mut *self.conn()?, user_id, year)?)
    }

    fn create_leave(&self, new_leave: &NewLeave) -> Result<Leave, DBError> {
        Ok(new_leave.insert(&mut *self.conn()?)?)
    }

    fn get_user_leaves(&self, user_id: &str) -> Result<Vec<Leave>, DBError> {
        Ok(Leave::list_for_user(&mut *self.conn()?, user_id)?)
    }

    fn get_leave(&self, leave_id: Uuid) -> Result<Option<Leave>, DBError> {
        Ok(Leave::get_by_id(&mut *self.conn()?, leave_id)?)
    }

    fn update_leave(&self, leave_id: Uuid, patch: &LeavePatch) -> Result<Leave, DBError> {
        match Leave::update(&mut *self.conn()?, leave_id, patch) {
            Ok(leave) => Ok(leave),
            Err(LeaveError::DatabaseError(diesel::result::Error::NotFound)) => {
                Err(DBError::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete_leave(&self, leave_id: Uuid, user_id: &str) -> Result<(), DBError> {
        let deleted = Leave::delete_for_user(&mut *self.conn()?, leave_id, user_id)?;
        if deleted == 0 {
            return Err(DBError::NotFound);
        }
        Ok(())
    }

    fn get_attendance_records(
        &self,
        user_id: &str,
        month: u32,
        year: i32,
    ) -> Result<Vec<AttendanceRecord>, DBError> {
        Ok(AttendanceRecord::for_month(
            &mut *self.conn()?,
            user_id,
            month,
            year,
        )?)
    }

    fn create_attendance_record(
        &self,
        new_record: &NewAttendanceRecord,
    ) -> Result<AttendanceRecord, DBError> {
        Ok(new_record.insert(&mut *self.conn()?)?)
    }

    fn get_absent_dates(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, DBError> {
        Ok(AttendanceRecord::absent_since(
            &mut *self.conn()?,
            user_id,
            since,
        )?)
    }

    fn get_salary_slips(&self, user_id: &str) -> Result<Vec<SalarySlip>, DBError> {
        Ok(SalarySlip::list_for_user(&mut *self.conn()?, user_id)?)
    }

    fn get_salary_slip(
        &self,
        user_id: &str,
        month: i32,
        year: i32,
    ) -> Result<Option<SalarySlip>, DBError> {
        Ok(SalarySlip::find(&mut *self.conn()?, user_id, month, year)?)
    }

    fn create_hr_document(&self, new_document: &NewHrDocument) -> Result<HrDocument, DBError> {
        Ok(new_document.insert(&mut *self.conn()?)?)
    }

    fn get_hr_documents(&self) -> Result<Vec<HrDocument>, DBError> {
        Ok(HrDocument::list_active(&mut *self.conn()?)?)
    }

    fn soft_delete_hr_document(&self, document_id: Uuid) -> Result<(), DBError> {
        let updated = HrDocument::soft_delete(&mut *self.conn()?, document_id)?;
        if updated == 0 {
            return Err(DBError::NotFound);
        }
        Ok(())
    }

    fn create_ai_conversation(
        &self,
        new_conversation: &NewAiConversation,
    ) -> Result<AiConversation, DBError> {
        Ok(new_conversation.insert(&mut *self.conn()?)?)
    }

    fn get_user_conversations(&self, user_id: &str) -> Result<Vec<AiConversation>, DBError> {
        Ok(AiConversation::recent_for_user(
            &mut *self.conn()?,
            user_id,
            CONVERSATION_HISTORY_LIMIT,
        )?)
    }

    fn get_session(&self, sid: &str) -> Result<Option<SessionRow>, DBError> {
        Ok(SessionRow::get(&mut *self.conn()?, sid)?)
    }

    fn put_session(&self, row: &SessionRow) -> Result<(), DBError> {
        Ok(row.put(&mut *self.conn()?)?)
    }

    fn delete_session(&self, sid: &str) -> Result<(), DBError> {
        SessionRow::delete(&mut *self.conn()?, sid)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::attendance::month_bounds;
    use chrono::Utc;
    use std::sync::Mutex;

    /// In-memory `DBConnection` for handler tests, mirroring the row-level
    /// contracts of the Postgres implementation.
    #[derive(Default)]
    pub struct InMemoryDb {
        pub users: Mutex<Vec<User>>,
        pub leaves: Mutex<Vec<Leave>>,
        pub attendance: Mutex<Vec<AttendanceRecord>>,
        pub documents: Mutex<Vec<HrDocument>>,
        pub conversations: Mutex<Vec<AiConversation>>,
        pub sessions: Mutex<Vec<SessionRow>>,
    }

    impl DBConnection for InMemoryDb {
        fn get_user(&self, user_id: &str) -> Result<Option<User>, DBError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == user_id)
                .cloned())
        }

        fn upsert_user(&self, upsert: &UserUpsert) -> Result<User, DBError> {
            let mut users = self.users.lock().unwrap();
            let now = Utc::now();
            if let Some(user) = users.iter_mut().find(|u| u.id == upsert.id) {
                // `None` fields stay out of the changeset, as in the SQL path.
                if upsert.email.is_some() {
                    user.email = upsert.email.clone();
                }
                if upsert.first_name.is_some() {
                    user.first_name = upsert.first_name.clone();
                }
                if upsert.last_name.is_some() {
                    user.last_name = upsert.last_name.clone();
                }
                if upsert.profile_image_url.is_some() {
                    user.profile_image_url = upsert.profile_image_url.clone();
                }
                if upsert.employee_id.is_some() {
                    user.employee_id = upsert.employee_id.clone();
                }
                if upsert.department.is_some() {
                    user.department = upsert.department.clone();
                }
                if upsert.designation.is_some() {
                    user.designation = upsert.designation.clone();
                }
                if upsert.joining_date.is_some() {
                    user.joining_date = upsert.joining_date;
                }
                user.updated_at = now;
                return Ok(user.clone());
            }
            let user = User {
                id: upsert.id.clone(),
                email: upsert.email.clone(),
                first_name: upsert.first_name.clone(),
                last_name: upsert.last_name.clone(),
                profile_image_url: upsert.profile_image_url.clone(),
                employee_id: upsert.employee_id.clone(),
                department: upsert.department.clone(),
                designation: upsert.designation.clone(),
                joining_date: upsert.joining_date,
                created_at: now,
                updated_at: now,
            };
            users.push(user.clone());
            Ok(user)
        }

        fn get_leave_types(&self) -> Result<Vec<LeaveType>, DBError> {
            Ok(Vec::new())
        }

        fn get_leave_balances(&self, _user_id: &str, _year: i32) -> Result<Vec<LeaveBalance>, DBError> {
            Ok(Vec::new())
        }

        fn create_leave(&self, new_leave: &NewLeave) -> Result<Leave, DBError> {
            let now = Utc::now();
            let leave = Leave {
                id: new_leave.id,
                user_id: new_leave.user_id.clone(),
                leave_type_id: new_leave.leave_type_id,
                from_date: new_leave.from_date,
                to_date: new_leave.to_date,
                days: new_leave.days.clone(),
                reason: new_leave.reason.clone(),
                status: new_leave.status.clone(),
                contact_number: new_leave.contact_number.clone(),
                attachment_path: new_leave.attachment_path.clone(),
                applied_at: now,
                reviewed_at: None,
                reviewed_by: None,
                review_comments: None,
                created_at: now,
                updated_at: now,
            };
            self.leaves.lock().unwrap().push(leave.clone());
            Ok(leave)
        }

        fn get_user_leaves(&self, user_id: &str) -> Result<Vec<Leave>, DBError> {
            Ok(self
                .leaves
                .lock()
                .unwrap()
                .iter()
                .filter(|l| l.user_id == user_id)
                .cloned()
                .collect())
        }

        fn get_leave(&self, leave_id: Uuid) -> Result<Option<Leave>, DBError> {
            Ok(self
                .leaves
                .lock()
                .unwrap()
                .iter()
                .find(|l| l.id == leave_id)
                .cloned())
        }

        fn update_leave(&self, leave_id: Uuid, patch: &LeavePatch) -> Result<Leave, DBError> {
            let mut leaves = self.leaves.lock().unwrap();
            let leave = leaves
                .iter_mut()
                .find(|l| l.id == leave_id)
                .ok_or(DBError::NotFound)?;
            if let Some(status) = &patch.status {
                leave.status = status.clone();
            }
            if patch.reviewed_at.is_some() {
                leave.reviewed_at = patch.reviewed_at;
            }
            if patch.reviewed_by.is_some() {
                leave.reviewed_by = patch.reviewed_by.clone();
            }
            if patch.review_comments.is_some() {
                leave.review_comments = patch.review_comments.clone();
            }
            leave.updated_at = Utc::now();
            Ok(leave.clone())
        }

        fn delete_leave(&self, leave_id: Uuid, user_id: &str) -> Result<(), DBError> {
            let mut leaves = self.leaves.lock().unwrap();
            let before = leaves.len();
            leaves.retain(|l| !(l.id == leave_id && l.user_id == user_id));
            if leaves.len() == before {
                return Err(DBError::NotFound);
            }
            Ok(())
        }

        fn get_attendance_records(
            &self,
            user_id: &str,
            month: u32,
            year: i32,
        ) -> Result<Vec<AttendanceRecord>, DBError> {
            let (start, end) = month_bounds(year, month)?;
            Ok(self
                .attendance
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == user_id && r.date >= start && r.date < end)
                .cloned()
                .collect())
        }

        fn create_attendance_record(
            &self,
            new_record: &NewAttendanceRecord,
        ) -> Result<AttendanceRecord, DBError> {
            let now = Utc::now();
            let record = AttendanceRecord {
                id: new_record.id,
                user_id: new_record.user_id.clone(),
                date: new_record.date,
                status: new_record.status.clone(),
                check_in: new_record.check_in,
                check_out: new_record.check_out,
                working_hours: new_record.working_hours.clone(),
                regularized_at: new_record.regularized_at,
                regularization_reason: new_record.regularization_reason.clone(),
                created_at: now,
                updated_at: now,
            };
            self.attendance.lock().unwrap().push(record.clone());
            Ok(record)
        }

        fn get_absent_dates(
            &self,
            user_id: &str,
            since: NaiveDate,
        ) -> Result<Vec<AttendanceRecord>, DBError> {
            Ok(self
                .attendance
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == user_id && r.status == "absent" && r.date >= since)
                .cloned()
                .collect())
        }

        fn get_salary_slips(&self, _user_id: &str) -> Result<Vec<SalarySlip>, DBError> {
            Ok(Vec::new())
        }

        fn get_salary_slip(
            &self,
            _user_id: &str,
            _month: i32,
            _year: i32,
        ) -> Result<Option<SalarySlip>, DBError> {
            Ok(None)
        }

        fn create_hr_document(&self, new_document: &NewHrDocument) -> Result<HrDocument, DBError> {
            let document = HrDocument {
                id: new_document.id,
                name: new_document.name.clone(),
                category: new_document.category.clone(),
                file_path: new_document.file_path.clone(),
                file_size: new_document.file_size,
                mime_type: new_document.mime_type.clone(),
                uploaded_by: new_document.uploaded_by.clone(),
                is_active: true,
                vector_count: new_document.vector_count,
                processed_at: new_document.processed_at,
                created_at: Utc::now(),
            };
            self.documents.lock().unwrap().push(document.clone());
            Ok(document)
        }

        fn get_hr_documents(&self) -> Result<Vec<HrDocument>, DBError> {
            Ok(self
                .documents
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.is_active)
                .cloned()
                .collect())
        }

        fn soft_delete_hr_document(&self, document_id: Uuid) -> Result<(), DBError> {
            let mut documents = self.documents.lock().unwrap();
            let document = documents
                .iter_mut()
                .find(|d| d.id == document_id)
                .ok_or(DBError::NotFound)?;
            document.is_active = false;
            Ok(())
        }

        fn create_ai_conversation(
            &self,
            new_conversation: &NewAiConversation,
        ) -> Result<AiConversation, DBError> {
            let conversation = AiConversation {
                id: new_conversation.id,
                user_id: new_conversation.user_id.clone(),
                question: new_conversation.question.clone(),
                answer: new_conversation.answer.clone(),
                documents_used: new_conversation.documents_used.clone(),
                created_at: Utc::now(),
            };
            self.conversations.lock().unwrap().push(conversation.clone());
            Ok(conversation)
        }

        fn get_user_conversations(&self, user_id: &str) -> Result<Vec<AiConversation>, DBError> {
            Ok(self
                .conversations
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.user_id == user_id)
                .take(CONVERSATION_HISTORY_LIMIT as usize)
                .cloned()
                .collect())
        }

        fn get_session(&self, sid: &str) -> Result<Option<SessionRow>, DBError> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.sid == sid)
                .cloned())
        }

        fn put_session(&self, row: &SessionRow) -> Result<(), DBError> {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.retain(|s| s.sid != row.sid);
            sessions.push(row.clone());
            Ok(())
        }

        fn delete_session(&self, sid: &str) -> Result<(), DBError> {
            self.sessions.lock().unwrap().retain(|s| s.sid != sid);
            Ok(())
        }
    }
}
