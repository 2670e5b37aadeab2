use axum::extract::{Multipart, Path, State};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::hr_documents::{HrDocument, NewHrDocument};
use crate::sessions::AuthUser;
use crate::{ApiError, AppState};

const DEFAULT_CATEGORY: &str = "general";

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/hr-documents", get(list_documents))
        .route("/api/hr-documents/upload", post(upload_document))
        .route("/api/hr-documents/:id", delete(delete_document))
        .with_state(app_state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HrDocumentResponse {
    id: Uuid,
    name: String,
    category: String,
    file_path: String,
    file_size: Option<i32>,
    mime_type: Option<String>,
    uploaded_by: String,
    is_active: bool,
    vector_count: i32,
    created_at: String,
}

impl From<HrDocument> for HrDocumentResponse {
    fn from(doc: HrDocument) -> Self {
        HrDocumentResponse {
            id: doc.id,
            name: doc.name,
            category: doc.category,
            file_path: doc.file_path,
            file_size: doc.file_size,
            mime_type: doc.mime_type,
            uploaded_by: doc.uploaded_by,
            is_active: doc.is_active,
            vector_count: doc.vector_count,
            created_at: doc.created_at.to_rfc3339(),
        }
    }
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthUser>,
) -> Result<Json<Vec<HrDocumentResponse>>, ApiError> {
    let documents = state.db.get_hr_documents()?;
    Ok(Json(
        documents.into_iter().map(HrDocumentResponse::from).collect(),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadedDocumentResponse {
    id: Uuid,
    name: String,
    category: String,
    file_path: String,
    vector_count: i32,
}

async fn upload_document(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<UploadedDocumentResponse>, ApiError> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut category = DEFAULT_CATEGORY.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("Malformed multipart body".to_string()))?
    {
        let field_name = field.name().map(String::from);
        match field_name.as_deref() {
            Some("file") => {
                let file_name = sanitize_file_name(field.file_name().unwrap_or("document"));
                let content_type = field.content_type().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::Validation("Could not read uploaded file".to_string()))?;
                file = Some((file_name, content_type, bytes.to_vec()));
            }
            Some("category") => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::Validation("Could not read category".to_string()))?;
                if !value.trim().is_empty() {
                    category = value.trim().to_string();
                }
            }
            _ => {}
        }
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| ApiError::Validation("No file uploaded".to_string()))?;

    // Document text goes to the chunk splitter only for the stored count;
    // binary uploads degrade to an empty text and a zero count.
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let chunks = state.ai.split_document(&file_name, &text).await;

    let document_id = Uuid::new_v4();
    let file_path = store_file(&state, &auth, document_id, &file_name, content_type.as_deref(), &bytes)
        .await?;

    let new_document = NewHrDocument {
        id: document_id,
        name: file_name,
        category,
        file_path,
        file_size: stored_file_size(bytes.len()),
        mime_type: content_type,
        uploaded_by: auth.user_id.clone(),
        vector_count: chunks.len() as i32,
        processed_at: Some(Utc::now()),
    };

    let document = state.db.create_hr_document(&new_document)?;
    info!(
        "User {} uploaded document {} ({} chunks)",
        auth.user_id, document.name, document.vector_count
    );

    Ok(Json(UploadedDocumentResponse {
        id: document.id,
        name: document.name,
        category: document.category,
        file_path: document.file_path,
        vector_count: document.vector_count,
    }))
}

/// Private object storage when configured, local upload directory otherwise.
async fn store_file(
    state: &AppState,
    auth: &AuthUser,
    document_id: Uuid,
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<String, ApiError> {
    if state.object_store.is_configured_for_uploads() {
        let object_path = format!("hr-documents/{document_id}/{file_name}");
        let signed_url = state
            .object_store
            .signed_upload_url(&object_path, &auth.user_id)
            .await?;
        state
            .object_store
            .upload_signed(&signed_url, bytes.to_vec(), content_type)
            .await?;
        let private_dir = state.object_store.private_dir()?;
        return Ok(format!("{}/{object_path}", private_dir.trim_end_matches('/')));
    }

    let local_path = state
        .config
        .upload_dir
        .join(format!("{document_id}_{file_name}"));
    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| {
            error!("Could not create upload directory: {}", e);
            ApiError::InternalServerError
        })?;
    tokio::fs::write(&local_path, bytes).await.map_err(|e| {
        error!("Could not persist uploaded file: {}", e);
        ApiError::InternalServerError
    })?;
    Ok(local_path.to_string_lossy().into_owned())
}

/// `None` when the upload does not fit the column, rather than a wrapped
/// negative size.
fn stored_file_size(len: usize) -> Option<i32> {
    i32::try_from(len).ok()
}

fn sanitize_file_name(raw: &str) -> String {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .trim()
        .to_string();
    if name.is_empty() {
        "document".to_string()
    } else {
        name
    }
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthUser>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.db.soft_delete_hr_document(document_id)?;
    Ok(Json(MessageResponse {
        message: "Document deleted successfully".to_string(),
    }))
}
