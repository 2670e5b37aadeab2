use crate::models::schema::hr_documents;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum HrDocumentError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// Uploaded HR policy document. Never physically removed; deletion only
/// clears `is_active` so historical conversation citations stay resolvable.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = hr_documents)]
pub struct HrDocument {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub file_path: String,
    pub file_size: Option<i32>,
    pub mime_type: Option<String>,
    pub uploaded_by: String,
    pub is_active: bool,
    pub vector_count: i32,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl HrDocument {
    pub fn list_active(conn: &mut PgConnection) -> Result<Vec<HrDocument>, HrDocumentError> {
        hr_documents::table
            .filter(hr_documents::is_active.eq(true))
            .order(hr_documents::created_at.desc())
            .load::<HrDocument>(conn)
            .map_err(HrDocumentError::DatabaseError)
    }

    /// Soft delete. Returns the number of rows flipped.
    pub fn soft_delete(
        conn: &mut PgConnection,
        document_id: Uuid,
    ) -> Result<usize, HrDocumentError> {
        diesel::update(hr_documents::table.find(document_id))
            .set(hr_documents::is_active.eq(false))
            .execute(conn)
            .map_err(HrDocumentError::DatabaseError)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = hr_documents)]
pub struct NewHrDocument {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub file_path: String,
    pub file_size: Option<i32>,
    pub mime_type: Option<String>,
    pub uploaded_by: String,
    pub vector_count: i32,
    pub processed_at: Option<DateTime<Utc>>,
}

impl NewHrDocument {
    pub fn insert(&self, conn: &mut PgConnection) -> Result<HrDocument, HrDocumentError> {
        diesel::insert_into(hr_documents::table)
            .values(self)
            .get_result::<HrDocument>(conn)
            .map_err(HrDocumentError::DatabaseError)
    }
}
