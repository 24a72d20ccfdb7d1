//! Trash and metadata maintenance endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::middleware::access::require_write;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::repository::RepositoryKey;
use crate::services::access_policy::Principal;
use crate::services::metadata_service::RegenerationReport;
use crate::services::trash_service::PurgeReport;

#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    pub storage_id: String,
    /// Every repository of the storage when absent.
    pub repository_id: Option<String>,
    pub base_path: Option<String>,
    #[serde(default)]
    pub force: bool,
}

/// Restore a trashed path.
pub async fn undelete(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path((storage_id, repository_id, path)): Path<(String, String, String)>,
) -> Result<StatusCode> {
    require_write(&state, &principal, &RepositoryKey::new(&storage_id, &repository_id))?;
    state
        .services
        .artifacts
        .undelete(&storage_id, &repository_id, &path)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn purge_trash(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path((storage_id, repository_id)): Path<(String, String)>,
) -> Result<Json<PurgeReport>> {
    require_write(&state, &principal, &RepositoryKey::new(&storage_id, &repository_id))?;
    let report = state
        .services
        .trash
        .purge_trash(&storage_id, &repository_id)
        .await?;
    Ok(Json(report))
}

pub async fn purge_all_trash(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<PurgeReport>> {
    require_any_write(&state, &principal)?;
    Ok(Json(state.services.trash.purge_all_trash().await?))
}

pub async fn regenerate(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<RegenerateRequest>,
) -> Result<Json<RegenerationReport>> {
    let metadata = &state.services.metadata;
    let report = match &request.repository_id {
        Some(repository_id) => {
            require_write(
                &state,
                &principal,
                &RepositoryKey::new(&request.storage_id, repository_id),
            )?;
            metadata
                .regenerate(
                    &request.storage_id,
                    repository_id,
                    request.base_path.as_deref(),
                    request.force,
                )
                .await?
        }
        None => {
            if request.base_path.is_some() {
                return Err(AppError::Validation(
                    "base_path requires repository_id".to_string(),
                ));
            }
            require_any_write(&state, &principal)?;
            metadata
                .regenerate_storage(&request.storage_id, request.force)
                .await?
        }
    };
    Ok(Json(report))
}

/// Storage-wide operations need write access to every repository that holds files.
fn require_any_write(state: &SharedState, principal: &Principal) -> Result<()> {
    let snapshot = state.services.configuration.snapshot();
    for descriptor in snapshot.repositories().filter(|d| d.repo_type.has_storage()) {
        require_write(state, principal, &descriptor.key)?;
    }
    Ok(())
}
