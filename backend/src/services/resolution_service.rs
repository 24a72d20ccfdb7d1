//! Artifact resolution across hosted, proxy and group repositories.
//!
//! Group traversal uses an explicit stack bounded by [`MAX_GROUP_DEPTH`], so a
//! cyclic membership that slipped past configuration validation fails with
//! `CycleDetected` instead of recursing forever.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::repository::{RepositoryDescriptor, RepositoryKey, RepositoryType};
use crate::services::configuration_service::{ConfigurationService, ConfigurationSnapshot};
use crate::services::proxy_service::ProxyService;
use crate::services::routing_service;
use crate::storage::filesystem::is_file;
use crate::storage::path_resolver::{validate_relative_path, RepositoryPaths};

/// Maximum group nesting followed during resolution.
pub const MAX_GROUP_DEPTH: usize = 32;

/// A located artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedArtifact {
    /// Physical location of the file.
    pub path: PathBuf,
    /// Repository that holds it (a hosted or proxy member for group lookups).
    pub repository: RepositoryKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult {
    Found(ResolvedArtifact),
    NotFound,
}

impl ResolutionResult {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// One group being traversed and the index of its next member.
struct Frame {
    group: Arc<RepositoryDescriptor>,
    next_member: usize,
}

pub struct ResolutionService {
    configuration: Arc<ConfigurationService>,
    proxy: Arc<ProxyService>,
}

impl ResolutionService {
    pub fn new(configuration: Arc<ConfigurationService>, proxy: Arc<ProxyService>) -> Self {
        Self {
            configuration,
            proxy,
        }
    }

    /// Locate `path` in a repository.
    ///
    /// Errors from any repository consulted (remote transport failures,
    /// timeouts, cycles) are returned as errors; only a clean miss everywhere
    /// is `NotFound`.
    pub async fn resolve(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<ResolutionResult> {
        validate_relative_path(path)?;
        let snapshot = self.configuration.snapshot();
        let descriptor = snapshot.repository(storage_id, repository_id)?;

        let result = match descriptor.repo_type {
            RepositoryType::Group => self.resolve_group(&snapshot, descriptor.clone(), path).await?,
            _ => self.resolve_member(&descriptor, path).await?,
        };

        if let ResolutionResult::Found(found) = &result {
            debug!(
                repository = %descriptor.key,
                served_by = %found.repository,
                path,
                "Artifact resolved"
            );
        }
        Ok(result)
    }

    /// Hosted or proxy lookup.
    async fn resolve_member(
        &self,
        descriptor: &RepositoryDescriptor,
        path: &str,
    ) -> Result<ResolutionResult> {
        let location = match descriptor.repo_type {
            RepositoryType::Hosted => {
                let location = RepositoryPaths::for_descriptor(descriptor).artifact(path)?;
                is_file(&location).await?.then_some(location)
            }
            RepositoryType::Proxy => self.proxy.fetch(descriptor, path).await?,
            RepositoryType::Group => {
                return Err(AppError::Internal(format!(
                    "Group {} passed to member lookup",
                    descriptor.key
                )))
            }
        };

        Ok(match location {
            Some(path) => ResolutionResult::Found(ResolvedArtifact {
                path,
                repository: descriptor.key.clone(),
            }),
            None => ResolutionResult::NotFound,
        })
    }

    /// Members in configured order, depth first; the first hit wins.
    async fn resolve_group(
        &self,
        snapshot: &ConfigurationSnapshot,
        root: Arc<RepositoryDescriptor>,
        path: &str,
    ) -> Result<ResolutionResult> {
        let mut stack = vec![Frame {
            group: root,
            next_member: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(member_key) = frame.group.members.get(frame.next_member).cloned() else {
                stack.pop();
                continue;
            };
            frame.next_member += 1;
            let group_key = frame.group.key.clone();

            if !routing_service::is_member_allowed_in(snapshot, &group_key, &member_key, path) {
                continue;
            }

            let member = snapshot.get(&member_key).cloned().ok_or_else(|| {
                AppError::Config(format!(
                    "Group {} references unknown member {}",
                    group_key, member_key
                ))
            })?;

            if member.is_group() {
                if stack.len() >= MAX_GROUP_DEPTH {
                    return Err(AppError::CycleDetected(format!(
                        "Group nesting deeper than {} while resolving {} via {}",
                        MAX_GROUP_DEPTH, path, member_key
                    )));
                }
                stack.push(Frame {
                    group: member,
                    next_member: 0,
                });
                continue;
            }

            let result = self.resolve_member(&member, path).await?;
            if result.is_found() {
                return Ok(result);
            }
        }

        Ok(ResolutionResult::NotFound)
    }
}
