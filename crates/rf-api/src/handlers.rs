//! # rf-api Handlers
//!
//! Translates HTTP requests into `PostService` calls and `AppError`s into
//! status codes.

use std::sync::Arc;

use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use rf_core::error::AppError;
use rf_core::keys;
use rf_core::models::NewPost;
use rf_core::traits::ObjectStore;
use rf_posts::PostService;
use serde::Deserialize;
use serde_json::{json, Value};

/// State shared across all Actix-web workers.
pub struct AppState {
    pub posts: Arc<PostService>,
    pub store: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(posts: Arc<PostService>, store: Arc<dyn ObjectStore>) -> Self {
        Self { posts, store }
    }
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub AppError);

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            // a plugin refused the post (spam filter, moderation queue, ...)
            AppError::Hook { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        HttpResponse::build(status).json(json!({ "error": self.0.to_string() }))
    }
}

/// Gives body extraction failures the same `{"error": ...}` shape as every other error.
pub fn json_error(err: JsonPayloadError, _: &HttpRequest) -> actix_web::Error {
    ApiError(AppError::ValidationError(err.to_string())).into()
}

/// Body of `POST /api/topics/{tid}/posts`. Ids may arrive as numbers or
/// strings; scalar content is taken as its text form.
#[derive(Debug, Deserialize)]
pub struct CreatePostBody {
    #[serde(default)]
    pub uid: Option<Value>,
    pub content: Value,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(rename = "isMain", default)]
    pub is_main: bool,
    #[serde(rename = "toPid", default)]
    pub to_pid: Option<Value>,
    #[serde(default)]
    pub handle: Option<String>,
}

impl CreatePostBody {
    fn into_new_post(self, topic_id: u64, origin_ip: Option<String>) -> Result<NewPost, AppError> {
        Ok(NewPost {
            topic_id,
            author_id: self.uid.and_then(raw_id),
            content: content_text(self.content)?,
            timestamp: self.timestamp,
            is_main: self.is_main,
            reply_to: self.to_pid.and_then(raw_id),
            origin_ip,
            guest_handle: self.handle,
        })
    }
}

/// Leaves interpretation to the workflow's validation; only `null` means absent.
fn raw_id(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn content_text(value: Value) -> Result<String, AppError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(AppError::ValidationError("content must be text".into())),
    }
}

pub async fn create_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<u64>,
    body: web::Json<CreatePostBody>,
) -> Result<HttpResponse, ApiError> {
    let origin_ip = req.peer_addr().map(|addr| addr.ip().to_string());
    let data = body.into_inner().into_new_post(path.into_inner(), origin_ip)?;

    let post = state.posts.create(data).await?;
    Ok(HttpResponse::Created().json(post))
}

pub async fn get_post(
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let pid = path.into_inner();
    let fields = state
        .store
        .get_object(&keys::post(pid))
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound("post".into(), pid.to_string()))?;

    Ok(HttpResponse::Ok().json(fields))
}
