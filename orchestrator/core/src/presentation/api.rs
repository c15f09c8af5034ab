// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::application::transfer_service::{
    CloneRequest, ExportRequest, ImageRequest, ImportRequest, RegistryRequest, TransferService,
};
use crate::domain::registry::RegistryAuth;
use crate::domain::transfer::{ErrorClass, TransferError};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

pub struct AppState {
    pub transfer_service: Arc<dyn TransferService>,
}

pub fn app(service: Arc<dyn TransferService>) -> Router {
    let state = Arc::new(AppState {
        transfer_service: service,
    });

    Router::new()
        .route("/health", get(health))
        .route("/progress", get(actions_in_progress))
        .route("/volumes", get(list_volumes))
        .route("/volumes/size", get(volumes_size))
        .route("/volumes/{volume}", axum::routing::delete(delete_volume))
        .route("/volumes/{volume}/size", get(volume_size))
        .route("/volumes/{volume}/container", get(containers_for_volume))
        .route("/volumes/{volume}/export", get(export_volume))
        .route("/volumes/{volume}/import", get(import_volume))
        .route("/volumes/{volume}/save", get(save_volume))
        .route("/volumes/{volume}/load", get(load_volume))
        .route("/volumes/{volume}/push", post(push_volume))
        .route("/volumes/{volume}/pull", post(pull_volume))
        .route("/volumes/{volume}/clone", post(clone_volume))
        .route("/volumes/{volume}/empty", post(empty_volume))
        .with_state(state)
}

/// Maps a failed operation onto an HTTP status with a plain-text body.
pub struct ApiError(TransferError);

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.class() {
            ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
            ErrorClass::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match self.0.worker_output() {
            Some(output) if !output.trim().is_empty() => format!("{}\n{}", self.0, output.trim_end()),
            _ => self.0.to_string(),
        };
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub path: String,
    #[serde(default, rename = "fileName")]
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct CloneQuery {
    #[serde(default, rename = "destVolume")]
    pub dest_volume: String,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceBody {
    #[serde(default)]
    pub reference: String,
}

/// Registry routes answer a missing or malformed body with 400 like every
/// other invalid request.
fn reference_body(body: Result<Json<ReferenceBody>, JsonRejection>) -> Result<String, ApiError> {
    match body {
        Ok(Json(body)) => Ok(body.reference),
        Err(rejection) => Err(TransferError::invalid(format!("invalid request body: {}", rejection.body_text())).into()),
    }
}

fn registry_auth(headers: &HeaderMap) -> RegistryAuth {
    RegistryAuth::from_header(headers.get(REGISTRY_AUTH_HEADER).and_then(|v| v.to_str().ok()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn actions_in_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.transfer_service.actions_in_progress())
}

async fn list_volumes(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.transfer_service.list_volumes().await?))
}

async fn volumes_size(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.transfer_service.volumes_size().await?))
}

async fn volume_size(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.transfer_service.volume_size(&volume).await?))
}

async fn containers_for_volume(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.transfer_service.containers_for_volume(&volume).await?))
}

async fn export_volume(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<StatusCode> {
    state
        .transfer_service
        .export(ExportRequest {
            volume,
            destination_dir: query.path,
            file_name: query.file_name,
        })
        .await?;
    Ok(StatusCode::OK)
}

async fn import_volume(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
    Query(query): Query<PathQuery>,
) -> ApiResult<StatusCode> {
    state
        .transfer_service
        .import(ImportRequest {
            volume,
            archive_path: query.path,
        })
        .await?;
    Ok(StatusCode::OK)
}

async fn save_volume(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
    Query(query): Query<ImageQuery>,
) -> ApiResult<StatusCode> {
    state
        .transfer_service
        .save(ImageRequest {
            volume,
            image: query.image,
        })
        .await?;
    Ok(StatusCode::OK)
}

async fn load_volume(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
    Query(query): Query<ImageQuery>,
) -> ApiResult<StatusCode> {
    state
        .transfer_service
        .load(ImageRequest {
            volume,
            image: query.image,
        })
        .await?;
    Ok(StatusCode::OK)
}

async fn push_volume(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ReferenceBody>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let reference = reference_body(body)?;
    state
        .transfer_service
        .push(RegistryRequest {
            volume,
            reference,
            auth: registry_auth(&headers),
        })
        .await?;
    Ok(StatusCode::CREATED)
}

async fn pull_volume(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ReferenceBody>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let reference = reference_body(body)?;
    state
        .transfer_service
        .pull(RegistryRequest {
            volume,
            reference,
            auth: registry_auth(&headers),
        })
        .await?;
    Ok(StatusCode::CREATED)
}

async fn clone_volume(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
    Query(query): Query<CloneQuery>,
) -> ApiResult<StatusCode> {
    state
        .transfer_service
        .clone_volume(CloneRequest {
            volume,
            destination_volume: query.dest_volume,
        })
        .await?;
    Ok(StatusCode::CREATED)
}

async fn delete_volume(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
) -> ApiResult<StatusCode> {
    state.transfer_service.delete(&volume).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn empty_volume(
    State(state): State<Arc<AppState>>,
    Path(volume): Path<String>,
) -> ApiResult<StatusCode> {
    state.transfer_service.empty(&volume).await?;
    Ok(StatusCode::OK)
}
