//! Background task scheduler.
//!
//! Runs the maintenance jobs of the depot configuration (checksum
//! regeneration and trash purges) on their cron schedules.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::job::{JobTask, ScheduledJob};
use crate::services::metadata_service::MetadataService;
use crate::services::trash_service::TrashService;

/// Spawn one task per enabled job. Jobs with an invalid cron expression are
/// logged and skipped.
pub fn spawn_all(
    jobs: &[ScheduledJob],
    metadata: Arc<MetadataService>,
    trash: Arc<TrashService>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    for job in jobs.iter().filter(|j| j.enabled) {
        let schedule = match parse_schedule(&job.cron) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!("Skipping job '{}': {}", job.name, e);
                continue;
            }
        };

        let job = job.clone();
        let metadata = metadata.clone();
        let trash = trash.clone();
        handles.push(tokio::spawn(async move {
            for next in schedule.upcoming(Utc) {
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tracing::debug!("Job '{}' next runs at {}", job.name, next);
                tokio::time::sleep(wait).await;

                tracing::info!("Running scheduled job '{}'", job.name);
                match run_job(&job.task, &metadata, &trash).await {
                    Ok(summary) => tracing::info!("Job '{}' finished: {}", job.name, summary),
                    Err(e) => tracing::error!("Job '{}' failed: {}", job.name, e),
                }
            }
        }));
    }

    tracing::info!("Scheduled {} maintenance job(s)", handles.len());
    handles
}

/// Execute one job immediately and summarize the outcome.
pub async fn run_job(
    task: &JobTask,
    metadata: &MetadataService,
    trash: &TrashService,
) -> Result<String> {
    match task {
        JobTask::RegenerateChecksums {
            storage_id,
            repository_id,
            base_path,
            force,
        } => {
            let report = match repository_id {
                Some(repository_id) => {
                    metadata
                        .regenerate(storage_id, repository_id, base_path.as_deref(), *force)
                        .await?
                }
                None => metadata.regenerate_storage(storage_id, *force).await?,
            };
            Ok(format!(
                "{} regenerated, {} skipped, {} failed",
                report.succeeded, report.skipped, report.failed
            ))
        }
        JobTask::PurgeTrash {
            storage_id,
            repository_id,
        } => {
            let report = match (storage_id, repository_id) {
                (Some(storage_id), Some(repository_id)) => {
                    trash.purge_trash(storage_id, repository_id).await?
                }
                (None, None) => trash.purge_all_trash().await?,
                _ => {
                    return Err(AppError::Config(
                        "purge_trash needs both storage_id and repository_id, or neither"
                            .to_string(),
                    ))
                }
            };
            Ok(format!("{} purged, {} failed", report.purged, report.failed))
        }
    }
}

/// Parse a cron expression.
///
/// The cron crate expects 6 or 7 fields (sec min hour dom month dow [year])
/// but users typically write 5 (min hour dom month dow), so "0 " is
/// prepended for seconds in that case.
pub fn parse_schedule(cron_expr: &str) -> Result<Schedule> {
    let normalized = if cron_expr.split_whitespace().count() == 5 {
        format!("0 {}", cron_expr)
    } else {
        cron_expr.to_string()
    };

    Schedule::from_str(&normalized)
        .map_err(|e| AppError::Config(format!("Invalid cron expression '{}': {}", cron_expr, e)))
}

/// Next run time of a cron expression, if it is valid and has one.
pub fn compute_next_run(cron_expr: &str) -> Option<chrono::DateTime<Utc>> {
    parse_schedule(cron_expr).ok()?.upcoming(Utc).next()
}
