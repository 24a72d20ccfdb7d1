//! Scheduled maintenance job model.

use serde::{Deserialize, Serialize};

/// A maintenance task run on a cron schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub name: String,
    /// Cron expression, 5 fields (`min hour dom mon dow`) or the 6/7-field
    /// form with seconds.
    pub cron: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub task: JobTask,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum JobTask {
    /// Regenerate checksums and aggregate metadata. Without a repository the
    /// whole storage is processed.
    RegenerateChecksums {
        storage_id: String,
        #[serde(default)]
        repository_id: Option<String>,
        #[serde(default)]
        base_path: Option<String>,
        #[serde(default)]
        force: bool,
    },
    /// Purge trash of one repository, or of every repository when unset.
    PurgeTrash {
        #[serde(default)]
        storage_id: Option<String>,
        #[serde(default)]
        repository_id: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_jobs() {
        let jobs: Vec<ScheduledJob> = serde_json::from_str(
            r#"[
                {"name": "nightly-checksums", "cron": "0 2 * * *",
                 "task": "regenerate_checksums", "storage_id": "storage0"},
                {"name": "purge", "cron": "0 0 4 * * *", "enabled": false,
                 "task": "purge_trash"}
            ]"#,
        )
        .unwrap();

        assert!(jobs[0].enabled);
        assert_eq!(
            jobs[0].task,
            JobTask::RegenerateChecksums {
                storage_id: "storage0".to_string(),
                repository_id: None,
                base_path: None,
                force: false,
            }
        );
        assert!(!jobs[1].enabled);
        assert_eq!(
            jobs[1].task,
            JobTask::PurgeTrash {
                storage_id: None,
                repository_id: None
            }
        );
    }
}
