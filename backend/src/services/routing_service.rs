//! Routing rule evaluation for group members.

use std::sync::Arc;

use crate::models::repository::RepositoryKey;
use crate::models::routing::RoutingRules;
use crate::services::configuration_service::{ConfigurationService, ConfigurationSnapshot};

/// Decide whether `member` may serve `path` for a group with `rules`.
///
/// Deny rules are checked first and the first match excludes the member.
/// With no accept rules every member is allowed; otherwise some accept rule
/// naming the member must match.
pub fn evaluate(rules: Option<&RoutingRules>, member: &RepositoryKey, path: &str) -> bool {
    let Some(rules) = rules else {
        return true;
    };

    if rules
        .denied
        .iter()
        .any(|rule| rule.applies_to(member) && rule.matches(path))
    {
        return false;
    }

    if rules.accepted.is_empty() {
        return true;
    }

    rules
        .accepted
        .iter()
        .any(|rule| rule.applies_to(member) && rule.matches(path))
}

/// Routing decisions against a configuration snapshot.
pub fn is_member_allowed_in(
    snapshot: &ConfigurationSnapshot,
    group: &RepositoryKey,
    member: &RepositoryKey,
    path: &str,
) -> bool {
    let rules = snapshot.routing_rules(group);
    let allowed = evaluate(rules.as_deref(), member, path);
    if !allowed {
        tracing::debug!(group = %group, member = %member, path, "Member excluded by routing rules");
    }
    allowed
}

/// Routing decisions against the current configuration.
pub struct RoutingService {
    configuration: Arc<ConfigurationService>,
}

impl RoutingService {
    pub fn new(configuration: Arc<ConfigurationService>) -> Self {
        Self { configuration }
    }

    pub fn is_member_allowed(&self, group: &RepositoryKey, member: &RepositoryKey, path: &str) -> bool {
        is_member_allowed_in(&self.configuration.snapshot(), group, member, path)
    }
}
