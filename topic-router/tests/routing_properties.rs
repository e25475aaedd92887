//! Property tests for wildcard resolution and subscription diffs.

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use topic_router::{
    matches, DeviceDirectory, NamingConvention, SubscriptionDiff, SubscriptionRequest,
    SubscriptionTable, Topic,
};

fn level() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("smartthings".to_string()),
        Just("Lamp".to_string()),
        Just("switch".to_string()),
        Just("level".to_string()),
        Just(String::new()),
    ]
}

fn concrete_topic() -> impl Strategy<Value = String> {
    prop::collection::vec(level(), 1..5).prop_map(|levels| levels.join("/"))
}

fn filter() -> impl Strategy<Value = String> {
    let filter_level = prop_oneof![
        4 => level(),
        1 => Just("+".to_string()),
    ];
    (prop::collection::vec(filter_level, 1..5), any::<bool>()).prop_map(|(levels, hash)| {
        let mut filter = levels.join("/");
        if hash {
            filter.push_str("/#");
        }
        filter
    })
}

/// Reference matcher: expand the filter level by level.
fn reference_match(topic: &str, filter: &str) -> bool {
    let topic: Vec<&str> = topic.split('/').collect();
    let filter: Vec<&str> = filter.split('/').collect();
    for (index, expected) in filter.iter().enumerate() {
        if *expected == "#" {
            return true;
        }
        match topic.get(index) {
            Some(actual) if *expected == "+" || expected == actual => continue,
            _ => return false,
        }
    }
    topic.len() == filter.len()
}

fn topic_list() -> impl Strategy<Value = Vec<Topic>> {
    prop::collection::vec(concrete_topic(), 0..8)
        .prop_map(|names| names.into_iter().map(Topic::from).collect())
}

proptest! {
    #[test]
    fn wildcard_matching_agrees_with_reference(topic in concrete_topic(), filter in filter()) {
        prop_assert_eq!(matches(&topic, &filter), reference_match(&topic, &filter));
    }

    #[test]
    fn resolve_incoming_is_complete_and_sound(
        topic in concrete_topic(),
        filters in prop::collection::vec(filter(), 0..6),
    ) {
        let unique: BTreeSet<&String> = filters.iter().collect();
        let directory_toml: String = unique
            .iter()
            .map(|f| format!("[\"Device\".subscribe.switch.\"{f}\"]\n"))
            .collect();
        let directory = DeviceDirectory::from_toml(&directory_toml).unwrap();
        let request = SubscriptionRequest::new().with("switch", &["Device"]);
        let table = SubscriptionTable::build(&request, &directory, &NamingConvention::default());

        let resolved: HashSet<&str> = table
            .resolve_incoming(&topic)
            .into_iter()
            .map(Topic::as_str)
            .collect();

        for key in table.topics() {
            let should_match = matches(&topic, key.as_str());
            prop_assert_eq!(resolved.contains(key.as_str()), should_match);
        }
    }

    #[test]
    fn diff_is_minimal(previous in topic_list(), new in topic_list()) {
        let diff = SubscriptionDiff::between(&previous, &new);

        let to_subscribe: HashSet<&Topic> = diff.to_subscribe.iter().collect();
        let to_unsubscribe: HashSet<&Topic> = diff.to_unsubscribe.iter().collect();
        prop_assert!(to_subscribe.is_disjoint(&to_unsubscribe));

        let left: HashSet<&Topic> = to_subscribe.iter().copied().chain(previous.iter()).collect();
        let right: HashSet<&Topic> = new.iter().chain(to_unsubscribe.iter().copied()).collect();
        prop_assert_eq!(left, right);
    }
}
