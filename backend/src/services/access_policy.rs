//! Read/write capability checks for the HTTP layer.
//!
//! The resolution engine never consults this module; only request handlers do.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::repository::RepositoryKey;

/// Access section of the depot configuration.
#[derive(Clone, Deserialize)]
pub struct AccessSettings {
    /// Allow reads without a token.
    #[serde(default = "default_anonymous_read")]
    pub anonymous_read: bool,
    /// Bearer token → user name.
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    /// Users allowed to deploy and delete.
    #[serde(default)]
    pub writers: HashSet<String>,
}

redacted_debug!(AccessSettings {
    show anonymous_read,
    redact tokens,
    show writers,
});

fn default_anonymous_read() -> bool {
    true
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            anonymous_read: default_anonymous_read(),
            tokens: HashMap::new(),
            writers: HashSet::new(),
        }
    }
}

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(String),
}

pub trait AccessPolicy: Send + Sync {
    /// Map an optional bearer token to a principal. Unknown tokens are rejected.
    fn authenticate(&self, token: Option<&str>) -> Result<Principal>;

    fn can_read(&self, principal: &Principal, repository: &RepositoryKey) -> bool;

    fn can_write(&self, principal: &Principal, repository: &RepositoryKey) -> bool;
}

/// Policy built from [`AccessSettings`]. Rights are global, not per repository.
pub struct ConfiguredAccessPolicy {
    settings: AccessSettings,
}

impl ConfiguredAccessPolicy {
    pub fn new(settings: AccessSettings) -> Self {
        Self { settings }
    }
}

impl AccessPolicy for ConfiguredAccessPolicy {
    fn authenticate(&self, token: Option<&str>) -> Result<Principal> {
        match token {
            None => Ok(Principal::Anonymous),
            Some(token) => self
                .settings
                .tokens
                .get(token)
                .map(|user| Principal::User(user.clone()))
                .ok_or_else(|| AppError::Authorization("Invalid access token".to_string())),
        }
    }

    fn can_read(&self, principal: &Principal, _repository: &RepositoryKey) -> bool {
        match principal {
            Principal::Anonymous => self.settings.anonymous_read,
            Principal::User(_) => true,
        }
    }

    fn can_write(&self, principal: &Principal, _repository: &RepositoryKey) -> bool {
        match principal {
            Principal::Anonymous => false,
            Principal::User(user) => self.settings.writers.contains(user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(anonymous_read: bool) -> ConfiguredAccessPolicy {
        ConfiguredAccessPolicy::new(AccessSettings {
            anonymous_read,
            tokens: HashMap::from([
                ("t-deployer".to_string(), "deployer".to_string()),
                ("t-reader".to_string(), "reader".to_string()),
            ]),
            writers: HashSet::from(["deployer".to_string()]),
        })
    }

    #[test]
    fn test_capabilities() {
        let policy = policy(false);
        let repo = RepositoryKey::new("storage0", "releases");

        let anonymous = policy.authenticate(None).unwrap();
        assert!(!policy.can_read(&anonymous, &repo));
        assert!(!policy.can_write(&anonymous, &repo));

        let reader = policy.authenticate(Some("t-reader")).unwrap();
        assert!(policy.can_read(&reader, &repo));
        assert!(!policy.can_write(&reader, &repo));

        let deployer = policy.authenticate(Some("t-deployer")).unwrap();
        assert_eq!(deployer, Principal::User("deployer".to_string()));
        assert!(policy.can_write(&deployer, &repo));

        assert!(matches!(
            policy.authenticate(Some("bogus")),
            Err(AppError::Authorization(_))
        ));
    }

    #[test]
    fn test_anonymous_read_default() {
        let settings: AccessSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.anonymous_read);
        let policy = ConfiguredAccessPolicy::new(settings);
        assert!(policy.can_read(&Principal::Anonymous, &RepositoryKey::new("s", "r")));
    }

    #[test]
    fn test_tokens_redacted_in_debug() {
        let debug = format!("{:?}", policy(true).settings);
        assert!(!debug.contains("t-deployer"));
        assert!(debug.contains("[REDACTED]"));
    }
}
