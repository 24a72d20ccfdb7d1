//! Artifact download, deploy and delete.
//!
//! Routes are `/storages/:storage/:repo/*path`. Group repositories resolve
//! through their members; only hosted repositories accept uploads.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::download_response::DownloadResponse;
use crate::api::middleware::access::{require_read, require_write};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::checksum::ChecksumSet;
use crate::models::repository::RepositoryKey;
use crate::services::access_policy::Principal;
use crate::services::artifact_service::DeployOutcome;
use crate::services::resolution_service::ResolutionResult;
use crate::services::trash_service::DeleteOutcome;

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    /// Skip the trash and remove permanently.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub repository: RepositoryKey,
    pub path: String,
    pub size_bytes: u64,
    pub checksums: ChecksumSet,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub repository: RepositoryKey,
    pub path: String,
    pub trashed: bool,
}

pub async fn download(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path((storage_id, repository_id, path)): Path<(String, String, String)>,
) -> Result<Response> {
    require_read(&state, &principal, &RepositoryKey::new(&storage_id, &repository_id))?;

    match state
        .services
        .artifacts
        .download(&storage_id, &repository_id, &path)
        .await?
    {
        ResolutionResult::Found(found) => Ok(DownloadResponse::open(&found).await?.into_response()),
        ResolutionResult::NotFound => Err(AppError::NotFound(format!(
            "{} not found in {}/{}",
            path, storage_id, repository_id
        ))),
    }
}

pub async fn deploy(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path((storage_id, repository_id, path)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Response> {
    let repository = RepositoryKey::new(&storage_id, &repository_id);
    require_write(&state, &principal, &repository)?;

    let outcome = state
        .services
        .artifacts
        .deploy(&storage_id, &repository_id, &path, body)
        .await?;

    Ok(match outcome {
        DeployOutcome::Stored {
            size_bytes,
            checksums,
        } => (
            StatusCode::CREATED,
            Json(DeployResponse {
                repository,
                path,
                size_bytes,
                checksums,
            }),
        )
            .into_response(),
        DeployOutcome::ChecksumVerified | DeployOutcome::MetadataIgnored => {
            StatusCode::NO_CONTENT.into_response()
        }
    })
}

pub async fn delete(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path((storage_id, repository_id, path)): Path<(String, String, String)>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>> {
    let repository = RepositoryKey::new(&storage_id, &repository_id);
    require_write(&state, &principal, &repository)?;

    let outcome = state
        .services
        .artifacts
        .delete(&storage_id, &repository_id, &path, query.force)
        .await?;

    Ok(Json(DeleteResponse {
        repository,
        path,
        trashed: outcome == DeleteOutcome::Trashed,
    }))
}
