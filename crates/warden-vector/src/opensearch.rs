//! OpenSearch `bool` query builder.
//!
//! Emits the filter body of an OpenSearch query:
//!
//! ```json
//! {
//!   "bool": {
//!     "should": [{ "term": { "metadata.security": "confidential" } }],
//!     "minimum_should_match": 1,
//!     "must_not": [{ "term": { "metadata.dept": "hr" } }]
//!   }
//! }
//! ```
//!
//! Granted pairs become `should` term clauses (any one suffices); pairs
//! the requester is not granted become `must_not` clauses.

use serde_json::{Value, json};

use crate::filter::MetadataGroup;

pub(crate) fn build(user: &str, groups: &[String], grouped: &[MetadataGroup]) -> Option<Value> {
    let mut should = Vec::new();
    let mut must_not = Vec::new();

    for group in grouped {
        let clause = json!({ "term": { (format!("metadata.{}", group.key)): group.value } });
        if group.grants(user, groups) {
            should.push(clause);
        } else {
            must_not.push(clause);
        }
    }

    if should.is_empty() && must_not.is_empty() {
        return None;
    }

    let mut body = serde_json::Map::new();
    if !should.is_empty() {
        body.insert("should".into(), Value::Array(should));
        body.insert("minimum_should_match".into(), json!(1));
    }
    if !must_not.is_empty() {
        body.insert("must_not".into(), Value::Array(must_not));
    }

    Some(json!({ "bool": body }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn group(key: &str, value: &str, allowed_groups: &[&str]) -> MetadataGroup {
        MetadataGroup {
            key: key.into(),
            value: value.into(),
            allowed_users: BTreeSet::new(),
            allowed_groups: allowed_groups.iter().map(ToString::to_string).collect(),
            denied_users: BTreeSet::new(),
            denied_groups: BTreeSet::new(),
        }
    }

    #[test]
    fn test_granted_pairs_become_should_clauses() {
        let grouped = vec![group("security", "internal", &["staff"])];
        let body = build("alice", &["staff".into()], &grouped).expect("query");
        assert_eq!(
            body,
            json!({
                "bool": {
                    "should": [{ "term": { "metadata.security": "internal" } }],
                    "minimum_should_match": 1
                }
            })
        );
    }

    #[test]
    fn test_ungranted_pairs_become_must_not() {
        let grouped = vec![group("security", "secret", &["board"])];
        let body = build("alice", &["staff".into()], &grouped).expect("query");
        assert_eq!(
            body,
            json!({
                "bool": {
                    "must_not": [{ "term": { "metadata.security": "secret" } }]
                }
            })
        );
    }

    #[test]
    fn test_empty_groups_yield_none() {
        assert!(build("alice", &[], &[]).is_none());
    }
}
