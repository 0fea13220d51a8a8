//! HTTP surface of the registry.
//!
//! Three endpoints on `/` (save, fetch, delete) keyed by the `name` and
//! `version` query parameters, plus `/health_check`. Handlers translate
//! between HTTP and [`ModelStore`] calls; all storage semantics live in the
//! store.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::ModelStoreError;
use crate::model::{Model, extension_from_upload, validate_model_key};
use crate::model_store::ModelStore;

pub const HEALTH_CHECK_MESSAGE: &str = "I shouldn't have to die to feel alive";

/// Multipart field carrying the uploaded model.
const FILE_FIELD: &str = "file";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ModelStore>,
}

/// Query parameters identifying a model.
#[derive(Debug, Deserialize)]
pub struct ModelKey {
    pub name: String,
    pub version: String,
}

impl ModelKey {
    /// Reject keys before any storage or multipart work is done.
    fn validate(&self) -> Result<(), ApiError> {
        validate_model_key(&self.name, &self.version).map_err(ApiError::from)
    }
}

/// Build the router over the given store.
///
/// Uploads are not size-limited at this layer.
pub fn router(store: Arc<dyn ModelStore>) -> Router {
    Router::new()
        .route("/health_check", get(health_check))
        .route("/", get(get_model).post(save_model).delete(delete_model))
        .layer(DefaultBodyLimit::disable())
        .with_state(AppState { store })
}

/// Handler failure rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<ModelStoreError> for ApiError {
    fn from(err: ModelStoreError) -> Self {
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if err.is_recoverable() {
            info!(status = status.as_u16(), error = %err, "request rejected");
        } else {
            error!(error = %err, "model store failure");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

async fn health_check() -> Json<&'static str> {
    Json(HEALTH_CHECK_MESSAGE)
}

async fn save_model(
    State(state): State<AppState>,
    Query(key): Query<ModelKey>,
    mut multipart: Multipart,
) -> Result<Json<String>, ApiError> {
    info!(name = %key.name, version = %key.version, "received save model request");
    key.validate()?;

    let mut upload: Option<(Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(ToString::to_string);
        let content = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("reading upload: {e}")))?;
        upload = Some((file_name, content.to_vec()));
        break;
    }

    let Some((file_name, content)) = upload else {
        warn!(name = %key.name, version = %key.version, "save request without a file field");
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("missing multipart field '{FILE_FIELD}'"),
        ));
    };

    let model = Model::new(
        key.name,
        key.version,
        content,
        extension_from_upload(file_name.as_deref()),
    );
    state.store.save_model(&model).await?;

    let message = format!("Model {model} successfully saved");
    info!("{message}");
    Ok(Json(message))
}

async fn get_model(
    State(state): State<AppState>,
    Query(key): Query<ModelKey>,
) -> Result<Response, ApiError> {
    info!(name = %key.name, version = %key.version, "received get model request");
    key.validate()?;

    let model = state.store.get_model(&key.name, &key.version).await?;
    let file_name =
        state
            .store
            .create_model_file_name(&key.name, &key.version, &model.file_extension);
    let disposition = HeaderValue::from_str(&format!("attachment; filename={file_name}"))
        .map_err(|e| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("invalid file name '{file_name}': {e}"),
            )
        })?;

    info!(model = %model, bytes = model.content.len(), "fetched model");
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(model.content),
    )
        .into_response())
}

async fn delete_model(
    State(state): State<AppState>,
    Query(key): Query<ModelKey>,
) -> Result<Json<String>, ApiError> {
    info!(name = %key.name, version = %key.version, "received delete model request");
    key.validate()?;

    state.store.delete_model(&key.name, &key.version).await?;

    let message = format!("Model {}:{} successfully deleted", key.name, key.version);
    info!("{message}");
    Ok(Json(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_status_codes() {
        let cases = [
            (ModelStoreError::already_exists("m", "1"), StatusCode::CONFLICT),
            (ModelStoreError::not_found("m", "1"), StatusCode::NOT_FOUND),
            (
                ModelStoreError::invalid_key("../m", "1", "path separator"),
                StatusCode::BAD_REQUEST,
            ),
            (
                ModelStoreError::CompromisedLayout {
                    pattern: "m-1\\..*".into(),
                    directory: "/srv/models".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ModelStoreError::Storage(anyhow::anyhow!("disk on fire")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let message = err.to_string();
            let api = ApiError::from(err);
            assert_eq!(api.status, expected);
            assert_eq!(api.detail, message);
        }
    }

    #[test]
    fn unservable_key_is_bad_request() {
        let key = ModelKey {
            name: "a\nb".into(),
            version: "1".into(),
        };
        let err = key.validate().err().map(|e| e.status);
        assert_eq!(err, Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn api_error_response_keeps_status() {
        let response = ApiError::new(StatusCode::CONFLICT, "model exists: m-1").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
