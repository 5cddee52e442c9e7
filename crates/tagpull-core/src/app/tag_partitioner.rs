//! TagPartitioner - tag partition の一様選択
//!
//! producer 側（負荷の分散）と worker spawn 時（consumer の分散）で
//! それぞれ独立に呼ばれます。両者の協調はしません（収束は統計的）。

use std::sync::Arc;

use crate::config::{ConfigError, PullQueueConfig};
use crate::domain::TagId;
use crate::ports::RandomSource;

pub struct TagPartitioner {
    prefix: String,
    num_tags: u32,
    rng: Arc<dyn RandomSource>,
}

impl TagPartitioner {
    /// `num_tags` must be at least 1.
    pub fn new(
        prefix: impl Into<String>,
        num_tags: u32,
        rng: Arc<dyn RandomSource>,
    ) -> Result<Self, ConfigError> {
        if num_tags == 0 {
            return Err(ConfigError::NoTags);
        }
        Ok(Self {
            prefix: prefix.into(),
            num_tags,
            rng,
        })
    }

    pub fn from_config(config: &PullQueueConfig, rng: Arc<dyn RandomSource>) -> Result<Self, ConfigError> {
        Self::new(config.tag_prefix.clone(), config.num_tags, rng)
    }

    /// Pick one partition uniformly at random.
    pub fn assign_tag(&self) -> TagId {
        let index = self.rng.next_in_range(0, self.num_tags - 1);
        TagId::from_index(&self.prefix, index)
    }

    /// Whether `tag` is one of the configured partitions.
    pub fn contains(&self, tag: &TagId) -> bool {
        tag.index_for(&self.prefix)
            .is_some_and(|index| index < self.num_tags)
    }

    /// All partitions in index order.
    pub fn tags(&self) -> Vec<TagId> {
        (0..self.num_tags)
            .map(|i| TagId::from_index(&self.prefix, i))
            .collect()
    }

    pub fn num_tags(&self) -> u32 {
        self.num_tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ScriptedRandom, ThreadRandom};
    use rstest::rstest;

    #[test]
    fn zero_tags_is_rejected() {
        assert!(matches!(
            TagPartitioner::new("tag", 0, Arc::new(ThreadRandom)),
            Err(ConfigError::NoTags)
        ));
    }

    #[test]
    fn assign_uses_random_index() {
        let p = TagPartitioner::new("tag", 4, Arc::new(ScriptedRandom::new([3, 0, 2]))).unwrap();
        assert_eq!(p.assign_tag().as_str(), "tag_3");
        assert_eq!(p.assign_tag().as_str(), "tag_0");
        assert_eq!(p.assign_tag().as_str(), "tag_2");
    }

    #[test]
    fn single_tag_always_selected() {
        let p = TagPartitioner::new("tag", 1, Arc::new(ThreadRandom)).unwrap();
        for _ in 0..20 {
            assert_eq!(p.assign_tag().as_str(), "tag_0");
        }
    }

    #[rstest]
    #[case("tag_0", true)]
    #[case("tag_3", true)]
    #[case("tag_4", false)]
    #[case("other_1", false)]
    #[case("tag_x", false)]
    fn contains_only_configured_partitions(#[case] tag: &str, #[case] expected: bool) {
        let p = TagPartitioner::new("tag", 4, Arc::new(ThreadRandom)).unwrap();
        assert_eq!(p.contains(&TagId::new(tag)), expected);
    }

    #[test]
    fn tags_lists_every_partition() {
        let p = TagPartitioner::new("shard", 3, Arc::new(ThreadRandom)).unwrap();
        let tags: Vec<String> = p.tags().iter().map(|t| t.to_string()).collect();
        assert_eq!(tags, vec!["shard_0", "shard_1", "shard_2"]);
    }
}
