use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Form, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::ai::DocumentContext;
use crate::models::ai_conversations::{AiConversation, NewAiConversation};
use crate::models::hr_documents::HrDocument;
use crate::sessions::AuthUser;
use crate::{ApiError, AppState};

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ai/ask", post(ask_assistant))
        .route("/api/ai/conversations", get(list_conversations))
        .with_state(app_state)
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AskResponse {
    answer: String,
    documents_used: Vec<String>,
}

async fn ask_assistant(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Form(request): Form<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::Validation("Question is required".to_string()));
    }

    let documents = state.db.get_hr_documents()?;
    let contexts = document_contexts(documents);

    let reply = state.ai.ask(question, &contexts).await?;

    let new_conversation = NewAiConversation {
        id: Uuid::new_v4(),
        user_id: auth.user_id.clone(),
        question: question.to_string(),
        answer: reply.answer.clone(),
        documents_used: Some(reply.documents_used.clone()),
    };
    state.db.create_ai_conversation(&new_conversation)?;
    info!(
        "User {} asked the assistant ({} documents cited)",
        auth.user_id,
        reply.documents_used.len()
    );

    Ok(Json(AskResponse {
        answer: reply.answer,
        documents_used: reply.documents_used,
    }))
}

/// Only document labels are stored server-side, so the model sees a fixed
/// sentence per document rather than file contents.
fn document_contexts(documents: Vec<HrDocument>) -> Vec<DocumentContext> {
    documents
        .into_iter()
        .map(|doc| DocumentContext {
            content: format!(
                "HR Policy document: {}. Category: {}. This document contains company policies and procedures.",
                doc.name, doc.category
            ),
            name: doc.name,
            category: doc.category,
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationResponse {
    id: Uuid,
    question: String,
    answer: String,
    documents_used: Vec<String>,
    created_at: String,
}

impl From<AiConversation> for ConversationResponse {
    fn from(conversation: AiConversation) -> Self {
        ConversationResponse {
            id: conversation.id,
            question: conversation.question,
            answer: conversation.answer,
            documents_used: conversation.documents_used.unwrap_or_default(),
            created_at: conversation.created_at.to_rfc3339(),
        }
    }
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ConversationResponse>>, ApiError> {
    let conversations = state.db.get_user_conversations(&auth.user_id)?;
    Ok(Json(
        conversations
            .into_iter()
            .map(ConversationResponse::from)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn document_context_uses_the_fixed_label_sentence() {
        let document = HrDocument {
            id: Uuid::new_v4(),
            name: "Leave Policy.pdf".to_string(),
            category: "leave".to_string(),
            file_path: "uploads/leave.pdf".to_string(),
            file_size: Some(1024),
            mime_type: Some("application/pdf".to_string()),
            uploaded_by: "user-1".to_string(),
            is_active: true,
            vector_count: 3,
            processed_at: None,
            created_at: Utc::now(),
        };

        let contexts = document_contexts(vec![document]);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].name, "Leave Policy.pdf");
        assert_eq!(contexts[0].category, "leave");
        assert_eq!(
            contexts[0].content,
            "HR Policy document: Leave Policy.pdf. Category: leave. \
             This document contains company policies and procedures."
        );
    }
}
