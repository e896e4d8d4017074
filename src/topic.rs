//! Topic namespace helpers.
//!
//! Topics are `/`-delimited. The first segment is the root namespace and, for
//! tenant-scoped topics, the second segment names the owning tenant.

/// Returns everything before the first `/`, or the whole topic when it has none.
pub fn root_segment(topic: &str) -> &str {
    match topic.find('/') {
        Some(idx) => &topic[..idx],
        None => topic,
    }
}

/// Returns the second segment, or an empty string when the topic has fewer
/// than two segments.
pub fn tenant_segment(topic: &str) -> &str {
    topic.split('/').nth(1).unwrap_or("")
}
