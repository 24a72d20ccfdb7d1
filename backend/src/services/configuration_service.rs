//! Repository configuration snapshots.
//!
//! Readers take an `Arc` of the current snapshot and resolve against it for
//! the whole operation. Saving a configuration builds a new snapshot and
//! swaps it in; snapshots are never mutated.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{AppError, Result};
use crate::models::repository::{RepositoryDescriptor, RepositoryKey};
use crate::models::routing::RoutingRules;

/// Immutable view of every repository descriptor and routing rule set.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationSnapshot {
    repositories: BTreeMap<RepositoryKey, Arc<RepositoryDescriptor>>,
    routing: HashMap<RepositoryKey, Arc<RoutingRules>>,
}

impl ConfigurationSnapshot {
    /// Build a snapshot without validating it. Use [`validate`](Self::validate)
    /// (or [`ConfigurationService::replace`]) before serving from it.
    pub fn new(
        repositories: impl IntoIterator<Item = RepositoryDescriptor>,
        routing: impl IntoIterator<Item = (RepositoryKey, RoutingRules)>,
    ) -> Self {
        Self {
            repositories: repositories
                .into_iter()
                .map(|d| (d.key.clone(), Arc::new(d)))
                .collect(),
            routing: routing
                .into_iter()
                .map(|(group, rules)| (group, Arc::new(rules)))
                .collect(),
        }
    }

    pub fn get(&self, key: &RepositoryKey) -> Option<&Arc<RepositoryDescriptor>> {
        self.repositories.get(key)
    }

    /// Descriptor lookup; a missing descriptor is a configuration error.
    pub fn repository(&self, storage_id: &str, repository_id: &str) -> Result<Arc<RepositoryDescriptor>> {
        self.repositories
            .get(&RepositoryKey::new(storage_id, repository_id))
            .cloned()
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Repository {}:{} is not configured",
                    storage_id, repository_id
                ))
            })
    }

    /// Routing rules of a group; `None` when the group has none.
    pub fn routing_rules(&self, group: &RepositoryKey) -> Option<Arc<RoutingRules>> {
        self.routing.get(group).cloned()
    }

    pub fn repositories(&self) -> impl Iterator<Item = &Arc<RepositoryDescriptor>> {
        self.repositories.values()
    }

    pub fn storage_repositories<'a>(
        &'a self,
        storage_id: &'a str,
    ) -> impl Iterator<Item = &'a Arc<RepositoryDescriptor>> + 'a {
        self.repositories
            .values()
            .filter(move |d| d.storage_id() == storage_id)
    }

    pub fn has_storage(&self, storage_id: &str) -> bool {
        self.storage_repositories(storage_id).next().is_some()
    }

    /// Check member references, routing scopes and group acyclicity.
    pub fn validate(&self) -> Result<()> {
        for descriptor in self.repositories.values() {
            if !descriptor.is_group() && !descriptor.members.is_empty() {
                return Err(AppError::Config(format!(
                    "Repository {} is not a group but lists members",
                    descriptor.key
                )));
            }
            for member in &descriptor.members {
                if !self.repositories.contains_key(member) {
                    return Err(AppError::Config(format!(
                        "Group {} references unknown member {}",
                        descriptor.key, member
                    )));
                }
            }
        }

        for group in self.routing.keys() {
            match self.repositories.get(group) {
                Some(d) if d.is_group() => {}
                _ => {
                    return Err(AppError::Config(format!(
                        "Routing rules configured for {} which is not a group",
                        group
                    )))
                }
            }
        }

        if let Some(cycle) = self.find_cycle() {
            let chain: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            return Err(AppError::Config(format!(
                "Group membership cycle: {}",
                chain.join(" -> ")
            )));
        }

        Ok(())
    }

    /// First group membership cycle found, as the chain of keys that closes it.
    pub fn find_cycle(&self) -> Option<Vec<RepositoryKey>> {
        let mut done: HashSet<&RepositoryKey> = HashSet::new();

        for start in self.repositories.values().filter(|d| d.is_group()) {
            if done.contains(&start.key) {
                continue;
            }
            // (group, index of the next member to visit)
            let mut stack: Vec<(&RepositoryKey, usize)> = vec![(&start.key, 0)];
            let mut on_path: HashSet<&RepositoryKey> = HashSet::from([&start.key]);

            while let Some((group, next)) = stack.last_mut() {
                let members = self
                    .repositories
                    .get(*group)
                    .map(|d| d.members.as_slice())
                    .unwrap_or_default();

                let Some(member) = members.get(*next) else {
                    on_path.remove(*group);
                    done.insert(*group);
                    stack.pop();
                    continue;
                };
                *next += 1;

                let is_group = self.repositories.get(member).map(|d| d.is_group()).unwrap_or(false);
                if !is_group || done.contains(member) {
                    continue;
                }
                if on_path.contains(member) {
                    let mut chain: Vec<RepositoryKey> = stack
                        .iter()
                        .map(|(key, _)| (*key).clone())
                        .skip_while(|key| key != member)
                        .collect();
                    chain.push(member.clone());
                    return Some(chain);
                }
                on_path.insert(member);
                stack.push((member, 0));
            }
        }

        None
    }
}

/// Publishes the current configuration snapshot.
pub struct ConfigurationService {
    sender: watch::Sender<Arc<ConfigurationSnapshot>>,
}

impl ConfigurationService {
    /// Wrap an initial snapshot. The snapshot is validated first.
    pub fn new(snapshot: ConfigurationSnapshot) -> Result<Self> {
        snapshot.validate()?;
        Ok(Self::new_unchecked(snapshot))
    }

    /// Wrap a snapshot without validation. Resolution still bounds group
    /// nesting, so a cyclic snapshot fails with `CycleDetected` rather than looping.
    pub fn new_unchecked(snapshot: ConfigurationSnapshot) -> Self {
        let (sender, _) = watch::channel(Arc::new(snapshot));
        Self { sender }
    }

    /// Current snapshot. Hold on to it for the duration of one operation.
    pub fn snapshot(&self) -> Arc<ConfigurationSnapshot> {
        self.sender.borrow().clone()
    }

    pub fn repository_descriptor(
        &self,
        storage_id: &str,
        repository_id: &str,
    ) -> Result<Arc<RepositoryDescriptor>> {
        self.snapshot().repository(storage_id, repository_id)
    }

    pub fn routing_rules(&self, group: &RepositoryKey) -> Option<Arc<RoutingRules>> {
        self.snapshot().routing_rules(group)
    }

    /// Validate and atomically publish a new snapshot.
    pub fn replace(&self, snapshot: ConfigurationSnapshot) -> Result<()> {
        snapshot.validate()?;
        let count = snapshot.repositories.len();
        self.sender.send_replace(Arc::new(snapshot));
        tracing::info!(repositories = count, "Repository configuration replaced");
        Ok(())
    }

    /// Change notification: the receiver is marked changed on every replace.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ConfigurationSnapshot>> {
        self.sender.subscribe()
    }
}
