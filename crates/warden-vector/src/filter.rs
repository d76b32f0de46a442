//! Policy grouping and the provider-neutral expression type.

use std::collections::{BTreeMap, BTreeSet};

use warden_types::VectorDbPolicy;

/// A provider-specific filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpression {
    /// Milvus boolean expression string.
    Milvus(String),
    /// OpenSearch `bool` query body.
    OpenSearch(serde_json::Value),
}

/// The actors granted and denied for one (metadata key, value) pair.
///
/// Built by unioning the actor lists of every active policy sharing the
/// pair. Denied membership wins over allowed membership when a requester
/// appears in both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataGroup {
    pub key: String,
    pub value: String,
    pub allowed_users: BTreeSet<String>,
    pub allowed_groups: BTreeSet<String>,
    pub denied_users: BTreeSet<String>,
    pub denied_groups: BTreeSet<String>,
}

impl MetadataGroup {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            allowed_users: BTreeSet::new(),
            allowed_groups: BTreeSet::new(),
            denied_users: BTreeSet::new(),
            denied_groups: BTreeSet::new(),
        }
    }

    /// Returns whether the requester is denied this pair.
    pub fn denies(&self, user: &str, groups: &[String]) -> bool {
        self.denied_users.contains(user) || groups.iter().any(|g| self.denied_groups.contains(g))
    }

    /// Returns whether the requester is granted this pair.
    ///
    /// A denied match always wins, even when an allowed list also matches.
    pub fn grants(&self, user: &str, groups: &[String]) -> bool {
        if self.denies(user, groups) {
            return false;
        }
        self.allowed_users.contains(user) || groups.iter().any(|g| self.allowed_groups.contains(g))
    }
}

/// Groups active policies by their (metadata key, value) pair.
///
/// Returns groups in sorted key/value order so that the downstream
/// expression is deterministic regardless of policy iteration order.
/// Roles are folded into the group lists alongside groups: a role grant
/// behaves like a group grant for filter purposes.
pub fn group_policies(policies: &[VectorDbPolicy]) -> Vec<MetadataGroup> {
    let mut grouped: BTreeMap<(String, String), MetadataGroup> = BTreeMap::new();

    for policy in policies {
        if !policy.status.is_active() {
            continue;
        }
        let entry = grouped
            .entry((policy.metadata_key.clone(), policy.metadata_value.clone()))
            .or_insert_with(|| MetadataGroup::new(&policy.metadata_key, &policy.metadata_value));

        entry.allowed_users.extend(policy.allowed_users.iter().cloned());
        entry.allowed_groups.extend(policy.allowed_groups.iter().cloned());
        entry.allowed_groups.extend(policy.allowed_roles.iter().cloned());
        entry.denied_users.extend(policy.denied_users.iter().cloned());
        entry.denied_groups.extend(policy.denied_groups.iter().cloned());
        entry.denied_groups.extend(policy.denied_roles.iter().cloned());
    }

    grouped.into_values().collect()
}
