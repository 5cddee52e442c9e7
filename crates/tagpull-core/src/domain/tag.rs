//! Tag partitions of the pull queue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default prefix used when rendering tags (`tag_0`, `tag_1`, ...).
pub const DEFAULT_TAG_PREFIX: &str = "tag";

/// A tag partition identifier.
///
/// Tags are rendered as `{prefix}_{index}`. Producers and workers must agree on
/// both the prefix and the partition count, otherwise a worker leases against a
/// tag no producer ever writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_index(prefix: &str, index: u32) -> Self {
        Self(format!("{prefix}_{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split `{prefix}_{index}` back into its parts.
    pub fn index_for(&self, prefix: &str) -> Option<u32> {
        self.0
            .strip_prefix(prefix)?
            .strip_prefix('_')?
            .parse()
            .ok()
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_prefix_and_index() {
        assert_eq!(TagId::from_index("tag", 2).as_str(), "tag_2");
        assert_eq!(TagId::from_index("mytag", 0).to_string(), "mytag_0");
    }

    #[test]
    fn index_for_requires_matching_prefix() {
        let tag = TagId::from_index("tag", 3);
        assert_eq!(tag.index_for("tag"), Some(3));
        assert_eq!(tag.index_for("other"), None);
        assert_eq!(TagId::new("tag_x").index_for("tag"), None);
    }
}
