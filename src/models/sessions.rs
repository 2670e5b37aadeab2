use crate::models::schema::sessions;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// Server-side session row. `sess` is an opaque JSON blob owned by the
/// auth gate; `expire` bounds the cookie's lifetime, independent of the
/// access token expiry stored inside the blob.
#[derive(Queryable, Insertable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = sessions)]
#[diesel(primary_key(sid))]
pub struct SessionRow {
    pub sid: String,
    pub sess: serde_json::Value,
    pub expire: DateTime<Utc>,
}

impl SessionRow {
    pub fn get(conn: &mut PgConnection, sid: &str) -> Result<Option<SessionRow>, SessionError> {
        sessions::table
            .find(sid)
            .first::<SessionRow>(conn)
            .optional()
            .map_err(SessionError::DatabaseError)
    }

    pub fn put(&self, conn: &mut PgConnection) -> Result<(), SessionError> {
        diesel::insert_into(sessions::table)
            .values(self)
            .on_conflict(sessions::sid)
            .do_update()
            .set((
                sessions::sess.eq(&self.sess),
                sessions::expire.eq(self.expire),
            ))
            .execute(conn)?;
        Ok(())
    }

    pub fn delete(conn: &mut PgConnection, sid: &str) -> Result<usize, SessionError> {
        diesel::delete(sessions::table.find(sid))
            .execute(conn)
            .map_err(SessionError::DatabaseError)
    }
}
