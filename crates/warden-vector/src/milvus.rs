//! Milvus boolean expression builder.
//!
//! Emits a Milvus `expr` string over record metadata:
//!
//! ```text
//! (metadata["security"] == "confidential") and (metadata["dept"] != "hr")
//! ```
//!
//! Pairs the requester is granted are joined with `or`; pairs the requester
//! is denied (or simply not granted) are excluded with `!=` terms joined
//! with `and`.

use crate::filter::MetadataGroup;

pub(crate) fn build(user: &str, groups: &[String], grouped: &[MetadataGroup]) -> Option<String> {
    let mut granted = Vec::new();
    let mut excluded = Vec::new();

    for group in grouped {
        if group.grants(user, groups) {
            granted.push(format!(
                "metadata[\"{}\"] == \"{}\"",
                escape(&group.key),
                escape(&group.value)
            ));
        } else {
            excluded.push(format!(
                "metadata[\"{}\"] != \"{}\"",
                escape(&group.key),
                escape(&group.value)
            ));
        }
    }

    let mut parts = Vec::new();
    if !granted.is_empty() {
        parts.push(format!("({})", granted.join(" or ")));
    }
    if !excluded.is_empty() {
        parts.push(format!("({})", excluded.join(" and ")));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" and "))
    }
}

/// Escapes quotes and backslashes in a metadata key or value.
fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
