//! Vector-database filter expression construction.
//!
//! Lowers row-level [`VectorDbPolicy`] records into a provider-specific
//! filter expression that restricts which vector-store records a retrieval
//! query may return. Policies are grouped by their (metadata key, value)
//! pair; each group unions the allowed and denied actor lists of every
//! policy sharing that pair, then the requester is checked against the
//! group. Denied membership always wins over allowed membership.
//!
//! Dispatch is purely on the vector database's declared provider. Unknown
//! providers yield no expression (no row filtering) rather than an error;
//! this permissive default is intended behavior.
//!
//! The builder is deterministic: the same policy set and provider always
//! produce an identical expression (groups are visited in sorted
//! key/value order).

use warden_types::{VectorDbConfig, VectorDbPolicy, VectorDbProvider};

mod filter;
mod milvus;
mod opensearch;

pub use filter::{FilterExpression, MetadataGroup, group_policies};

/// Builds the filter expression for a retrieval query.
///
/// Returns `None` when the policy set matches nothing for this requester
/// or the provider has no filter builder.
pub fn build_filter(
    db: &VectorDbConfig,
    user: &str,
    groups: &[String],
    policies: &[VectorDbPolicy],
) -> Option<FilterExpression> {
    let grouped = group_policies(policies);
    if grouped.is_empty() {
        return None;
    }

    match &db.provider {
        VectorDbProvider::Milvus => {
            milvus::build(user, groups, &grouped).map(FilterExpression::Milvus)
        }
        VectorDbProvider::OpenSearch => {
            opensearch::build(user, groups, &grouped).map(FilterExpression::OpenSearch)
        }
        VectorDbProvider::Other(name) => {
            tracing::warn!(
                provider = %name,
                vector_db = %db.name,
                "no filter builder for provider; applying no row filtering"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::{MetadataOp, PolicyId, PolicyStatus, VectorDbId};

    fn policy(
        id: u64,
        key: &str,
        value: &str,
        allowed_groups: &[&str],
        denied_groups: &[&str],
    ) -> VectorDbPolicy {
        VectorDbPolicy {
            id: PolicyId::new(id),
            vector_db_id: VectorDbId::new(1),
            status: PolicyStatus::Active,
            allowed_users: vec![],
            allowed_groups: allowed_groups.iter().map(ToString::to_string).collect(),
            allowed_roles: vec![],
            denied_users: vec![],
            denied_groups: denied_groups.iter().map(ToString::to_string).collect(),
            denied_roles: vec![],
            metadata_key: key.into(),
            metadata_value: value.into(),
            operator: MetadataOp::Eq,
        }
    }

    fn db(provider: VectorDbProvider) -> VectorDbConfig {
        VectorDbConfig {
            id: VectorDbId::new(1),
            name: "docs".into(),
            enabled: true,
            provider,
        }
    }

    #[test]
    fn test_unknown_provider_yields_no_filter() {
        let policies = vec![policy(1, "security", "confidential", &["legal"], &[])];
        let expr = build_filter(
            &db(VectorDbProvider::Other("WEAVIATE".into())),
            "alice",
            &["legal".into()],
            &policies,
        );
        assert!(expr.is_none());
    }

    #[test]
    fn test_empty_policy_set_yields_no_filter() {
        let expr = build_filter(&db(VectorDbProvider::Milvus), "alice", &[], &[]);
        assert!(expr.is_none());
    }

    #[test]
    fn test_milvus_expression_is_deterministic() {
        let policies = vec![
            policy(1, "security", "confidential", &["legal"], &[]),
            policy(2, "department", "hr", &["legal"], &[]),
        ];
        let mut reversed = policies.clone();
        reversed.reverse();

        let groups = vec!["legal".to_string()];
        let a = build_filter(&db(VectorDbProvider::Milvus), "alice", &groups, &policies)
            .expect("expression");
        let b = build_filter(&db(VectorDbProvider::Milvus), "alice", &groups, &reversed)
            .expect("expression");
        assert_eq!(a, b, "policy order must not change the expression");
    }

    #[test]
    fn test_denied_group_wins_over_allowed() {
        // Allowed via "legal" but denied via "interns": the pair must land
        // in the exclusion clause.
        let policies = vec![policy(1, "security", "confidential", &["legal"], &["interns"])];
        let groups = vec!["legal".to_string(), "interns".to_string()];
        let expr = build_filter(&db(VectorDbProvider::Milvus), "alice", &groups, &policies)
            .expect("expression");
        let FilterExpression::Milvus(text) = expr else {
            panic!("expected milvus expression");
        };
        assert!(text.contains("!="), "denied pair must be excluded: {text}");
        assert!(!text.contains("=="), "no pair is granted: {text}");
    }
}
