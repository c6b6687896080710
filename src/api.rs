//! HTTP boundary layer: document ingestion endpoints and the chat
//! endpoint (§6). Authentication and full upload validation are assumed
//! handled by a front door this crate does not implement; this layer only
//! shapes requests/responses onto the document store, object store, and
//! agent graph.

use crate::agent::graph::AgentGraph;
use crate::agent::state::AgentState;
use crate::documents::model::Document;
use crate::documents::pipeline::DocumentPipeline;
use crate::documents::store::DocumentStore;
use crate::error::{AppError, ChatError, DocumentError};
use crate::object_store::ObjectStore;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

/// Maximum accepted upload size, per §6 (`≤10 MB`).
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state for the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    pub object_store: Arc<dyn ObjectStore>,
    pub document_store: Arc<DocumentStore>,
    pub pipeline: Arc<DocumentPipeline>,
    pub agent_graph: Arc<AgentGraph>,
    pub object_folder: String,
}

/// Wraps [`AppError`] for HTTP responses without revealing internal detail
/// (§7 "HTTP layer converts uncategorized errors into 500 with a
/// non-revealing detail").
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            AppError::Document(DocumentError::BadInput(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Document(DocumentError::NotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("document {id} not found"))
            }
            AppError::Chat(ChatError::NotFoundOrAccessDenied) => {
                (StatusCode::BAD_REQUEST, "not found or access denied".to_string())
            }
            AppError::Chat(ChatError::EmptyOwner) => {
                (StatusCode::BAD_REQUEST, "user_id is required".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            other => {
                error!(error = %other, "unhandled API error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub id: i64,
    pub filename: String,
    pub status: String,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListDocumentsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListDocumentsResponse {
    pub documents: Vec<Document>,
    pub total: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatMessageRequest {
    pub message: String,
    pub session_id: Option<Uuid>,
    pub user_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatMessageResponse {
    pub session_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// OpenAPI documentation for the document ingestion and chat endpoints.
#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        upload_document_handler,
        get_document_handler,
        list_documents_handler,
        delete_document_handler,
        post_chat_message_handler,
    ),
    components(schemas(
        ErrorResponse,
        UploadResponse,
        ListDocumentsResponse,
        ChatMessageRequest,
        ChatMessageResponse,
        HealthResponse,
        Document,
    )),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "documents", description = "Document upload and management"),
        (name = "chat", description = "Safety-gated query agent")
    ),
    info(
        title = "RAG Backend API",
        version = "0.1.0",
        description = "REST API for PDF ingestion and retrieval-augmented chat"
    )
)]
struct ApiDoc;

async fn openapi_spec_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/documents/upload", post(upload_document_handler))
        .route("/api/documents/:id", get(get_document_handler))
        .route("/api/documents/:id", delete(delete_document_handler))
        .route("/api/documents", get(list_documents_handler))
        .route("/chat/messages", post(post_chat_message_handler))
        .route("/health", get(health_handler))
        .route("/api-docs/openapi.json", get(openapi_spec_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
    })
}

/// `POST /api/documents/upload` — accepts a multipart PDF upload, writes it
/// to the object store, and triggers the ingestion pipeline synchronously
/// in-process (the event-consumer path is the asynchronous alternative for
/// object stores that emit upload notifications; this handler is the
/// synchronous front door §6 also names).
#[utoipa::path(
    post,
    path = "/api/documents/upload",
    tag = "documents",
    responses(
        (status = 201, description = "Document accepted and ingested", body = UploadResponse),
        (status = 400, description = "Invalid upload", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn upload_document_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut filename = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Document(DocumentError::BadInput(e.to_string())))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Document(DocumentError::BadInput(e.to_string())))?;
            bytes = Some(data.to_vec());
        }
    }

    let filename = filename
        .ok_or_else(|| AppError::Document(DocumentError::BadInput("missing file field".to_string())))?;
    let bytes = bytes
        .ok_or_else(|| AppError::Document(DocumentError::BadInput("empty upload".to_string())))?;

    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::Document(DocumentError::BadInput(
            "only .pdf uploads are accepted".to_string(),
        ))
        .into());
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Document(DocumentError::BadInput(format!(
            "upload exceeds the {MAX_UPLOAD_BYTES}-byte limit"
        )))
        .into());
    }

    let object_key = format!("{}/{}.pdf", state.object_folder, Uuid::new_v4());

    state
        .object_store
        .put_object(&object_key, bytes)
        .await
        .map_err(|e| {
            error!(error = %e, "upload failed to reach the object store");
            e
        })?;

    let document_id = match state.pipeline.process(&object_key, &filename, None).await {
        Ok(id) => id,
        Err(e) => {
            let _ = state.object_store.remove_object(&object_key).await;
            return Err(e.into());
        }
    };

    let document = state.document_store.get(document_id).await?;
    info!(document_id, "document uploaded and processed");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: document.id,
            filename: document.filename,
            status: "processing".to_string(),
            uploaded_at: document.created_at,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    tag = "documents",
    params(("id" = i64, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document found", body = Document),
        (status = 404, description = "Document not found", body = ErrorResponse)
    )
)]
async fn get_document_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Document>> {
    let document = state.document_store.get(id).await?;
    Ok(Json(document))
}

#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "documents",
    params(
        ("limit" = i64, Query, description = "Maximum rows to return, default 20"),
        ("offset" = i64, Query, description = "Rows to skip, default 0")
    ),
    responses(
        (status = 200, description = "Paginated document list", body = ListDocumentsResponse)
    )
)]
async fn list_documents_handler(
    State(state): State<AppState>,
    Query(query): Query<ListDocumentsQuery>,
) -> ApiResult<Json<ListDocumentsResponse>> {
    let (documents, total) = state.document_store.list(query.limit, query.offset).await?;
    Ok(Json(ListDocumentsResponse { documents, total }))
}

#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    tag = "documents",
    params(("id" = i64, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found", body = ErrorResponse)
    )
)]
async fn delete_document_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let document = state.document_store.get(id).await?;
    state.document_store.delete(id).await?;

    if let Err(e) = state.object_store.remove_object(&document.object_path).await {
        warn!(error = %e, document_id = id, "best-effort object removal failed");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /chat/messages` — runs the agent graph end to end for one prompt.
#[utoipa::path(
    post,
    path = "/chat/messages",
    tag = "chat",
    request_body = ChatMessageRequest,
    responses(
        (status = 200, description = "Agent response", body = ChatMessageResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn post_chat_message_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatMessageRequest>,
) -> ApiResult<Json<ChatMessageResponse>> {
    if request.user_id.trim().is_empty() {
        return Err(AppError::Chat(ChatError::EmptyOwner).into());
    }

    let mut initial_state = AgentState::new(&request.user_id, &request.message);
    initial_state.session_id = request.session_id;

    let final_state = state
        .agent_graph
        .run(initial_state)
        .await
        .map_err(|e| {
            error!(error = %e, "agent graph run failed");
            e
        })?;

    let message = final_state
        .final_response
        .unwrap_or_else(|| "I don't have enough information to answer that right now.".to_string());

    Ok(Json(ChatMessageResponse {
        session_id: final_state.session_id,
        message,
    }))
}
