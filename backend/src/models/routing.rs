//! Routing rule model.
//!
//! Routing rules restrict which member of a group repository may serve a
//! given path. Each group owns an ordered list of accept rules and an ordered
//! list of deny rules; both are replaced wholesale when the configuration is
//! saved and never mutated afterwards.

use std::collections::HashSet;
use std::str::FromStr;

use regex::Regex;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::repository::RepositoryKey;

/// How a rule pattern is applied to a relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMatchMode {
    /// The pattern must match the whole path.
    #[default]
    Full,
    /// The pattern may match anywhere in the path.
    Partial,
}

impl FromStr for RoutingMatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "partial" | "contains" => Ok(Self::Partial),
            _ => Err(format!(
                "Unknown routing match mode: {}. Use 'full' or 'partial'",
                s
            )),
        }
    }
}

/// One rule as written in the configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingRuleConfig {
    pub pattern: String,
    /// Member references (`repo` or `storage:repo`). Empty means every member.
    #[serde(default)]
    pub repositories: Vec<String>,
}

/// Rule sets of one group as written in the configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingRulesConfig {
    #[serde(default)]
    pub match_mode: Option<RoutingMatchMode>,
    #[serde(default)]
    pub accepted: Vec<RoutingRuleConfig>,
    #[serde(default)]
    pub denied: Vec<RoutingRuleConfig>,
}

/// A compiled routing rule.
#[derive(Debug, Clone)]
pub struct RoutingRule {
    pattern: Regex,
    repositories: HashSet<RepositoryKey>,
}

impl RoutingRule {
    /// Compile a rule. Under [`RoutingMatchMode::Full`] the pattern is anchored
    /// at both ends.
    pub fn compile(
        pattern: &str,
        repositories: impl IntoIterator<Item = RepositoryKey>,
        mode: RoutingMatchMode,
    ) -> Result<Self> {
        let source = match mode {
            RoutingMatchMode::Full => format!("^(?:{})$", pattern),
            RoutingMatchMode::Partial => pattern.to_string(),
        };
        let pattern = Regex::new(&source).map_err(|e| {
            AppError::Config(format!("Invalid routing rule pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            pattern,
            repositories: repositories.into_iter().collect(),
        })
    }

    /// Whether this rule names the given member (an empty set names all members).
    pub fn applies_to(&self, member: &RepositoryKey) -> bool {
        self.repositories.is_empty() || self.repositories.contains(member)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

/// Compiled accept/deny rule sets of one group repository.
#[derive(Debug, Clone, Default)]
pub struct RoutingRules {
    pub accepted: Vec<RoutingRule>,
    pub denied: Vec<RoutingRule>,
}

impl RoutingRules {
    /// Compile the configured rules of `group`. Bare member references are
    /// resolved inside the group's own storage.
    pub fn compile(
        group: &RepositoryKey,
        config: &RoutingRulesConfig,
        default_mode: RoutingMatchMode,
    ) -> Result<Self> {
        let mode = config.match_mode.unwrap_or(default_mode);
        let compile_all = |rules: &[RoutingRuleConfig]| -> Result<Vec<RoutingRule>> {
            rules
                .iter()
                .map(|rule| {
                    let members = rule
                        .repositories
                        .iter()
                        .map(|r| RepositoryKey::parse_reference(r, &group.storage_id))
                        .collect::<Result<Vec<_>>>()?;
                    RoutingRule::compile(&rule.pattern, members, mode)
                })
                .collect()
        };

        Ok(Self {
            accepted: compile_all(&config.accepted)?,
            denied: compile_all(&config.denied)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.denied.is_empty()
    }
}
