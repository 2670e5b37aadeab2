use crate::models::schema::ai_conversations;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AiConversationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// Append-only audit log of assistant questions and answers.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = ai_conversations)]
pub struct AiConversation {
    pub id: Uuid,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub documents_used: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl AiConversation {
    pub fn recent_for_user(
        conn: &mut PgConnection,
        lookup_user_id: &str,
        limit: i64,
    ) -> Result<Vec<AiConversation>, AiConversationError> {
        ai_conversations::table
            .filter(ai_conversations::user_id.eq(lookup_user_id))
            .order(ai_conversations::created_at.desc())
            .limit(limit)
            .load::<AiConversation>(conn)
            .map_err(AiConversationError::DatabaseError)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = ai_conversations)]
pub struct NewAiConversation {
    pub id: Uuid,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub documents_used: Option<Vec<String>>,
}

impl NewAiConversation {
    pub fn insert(&self, conn: &mut PgConnection) -> Result<AiConversation, AiConversationError> {
        diesel::insert_into(ai_conversations::table)
            .values(self)
            .get_result::<AiConversation>(conn)
            .map_err(AiConversationError::DatabaseError)
    }
}
