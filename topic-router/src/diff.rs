//! Minimal broker subscribe/unsubscribe sets between two topic lists.

use std::collections::HashSet;

use crate::topic::Topic;

/// Topics to drop and topics to add when moving from one subscription set
/// to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDiff {
    /// `previous − new`, issued first
    pub to_unsubscribe: Vec<Topic>,
    /// `new − previous`
    pub to_subscribe: Vec<Topic>,
}

impl SubscriptionDiff {
    /// Compute the diff between the previous and the new topic list.
    ///
    /// The two result sets are disjoint and
    /// `to_subscribe ∪ previous = new ∪ to_unsubscribe`.
    pub fn between(previous: &[Topic], new: &[Topic]) -> Self {
        let previous_set: HashSet<&Topic> = previous.iter().collect();
        let new_set: HashSet<&Topic> = new.iter().collect();

        Self {
            to_unsubscribe: unique(previous.iter().filter(|t| !new_set.contains(t))),
            to_subscribe: unique(new.iter().filter(|t| !previous_set.contains(t))),
        }
    }

    /// Whether the broker needs no change at all
    pub fn is_empty(&self) -> bool {
        self.to_unsubscribe.is_empty() && self.to_subscribe.is_empty()
    }
}

fn unique<'a>(topics: impl Iterator<Item = &'a Topic>) -> Vec<Topic> {
    let mut seen = HashSet::new();
    topics
        .filter(|topic| seen.insert(*topic))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(names: &[&str]) -> Vec<Topic> {
        names.iter().map(|n| Topic::from(*n)).collect()
    }

    #[test]
    fn test_first_subscription_adds_everything() {
        let new = topics(&["/st/Lamp/switch/command", "/st/Lamp/switch/set_state"]);
        let diff = SubscriptionDiff::between(&[], &new);
        assert_eq!(diff.to_subscribe, new);
        assert!(diff.to_unsubscribe.is_empty());
    }

    #[test]
    fn test_replacing_devices() {
        let previous = topics(&["/st/Lamp/switch/command", "/st/Lamp/switch/set_state"]);
        let new = topics(&["/st/Fan/switch/command", "/st/Fan/switch/set_state"]);
        let diff = SubscriptionDiff::between(&previous, &new);
        assert_eq!(diff.to_unsubscribe, previous);
        assert_eq!(diff.to_subscribe, new);
    }

    #[test]
    fn test_unchanged_lists_produce_empty_diff() {
        let list = topics(&["a/b", "a/+"]);
        assert!(SubscriptionDiff::between(&list, &list).is_empty());
    }

    #[test]
    fn test_partial_overlap() {
        let previous = topics(&["a", "b", "c"]);
        let new = topics(&["b", "c", "d"]);
        let diff = SubscriptionDiff::between(&previous, &new);
        assert_eq!(diff.to_unsubscribe, topics(&["a"]));
        assert_eq!(diff.to_subscribe, topics(&["d"]));
    }
}
