use crate::models::schema::users;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// An employee record. The primary key is the identity provider's subject
/// id, so the same person always maps onto the same row across logins.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub joining_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn get_by_id(conn: &mut PgConnection, user_id: &str) -> Result<Option<User>, UserError> {
        users::table
            .find(user_id)
            .first::<User>(conn)
            .optional()
            .map_err(UserError::DatabaseError)
    }
}

/// Insert-or-update payload keyed by the provider subject id. `None` fields
/// are skipped on update, so a login with a missing claim never nulls out
/// data an admin has already filled in.
#[derive(AsChangeset, Insertable, Debug, Clone)]
#[diesel(table_name = users)]
pub struct UserUpsert {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub joining_date: Option<NaiveDate>,
}

impl UserUpsert {
    pub fn upsert(&self, conn: &mut PgConnection) -> Result<User, UserError> {
        let existing = users::table
            .find(&self.id)
            .first::<User>(conn)
            .optional()?;

        match existing {
            Some(_) => diesel::update(users::table.find(&self.id))
                .set((self, users::updated_at.eq(diesel::dsl::now)))
                .get_result::<User>(conn)
                .map_err(UserError::DatabaseError),
            None => diesel::insert_into(users::table)
                .values(self)
                .get_result::<User>(conn)
                .map_err(UserError::DatabaseError),
        }
    }
}
