//! Broker topics and wildcard filter matching.
//!
//! A [`Topic`] is compared as a plain string. Wildcard containment is a
//! separate relation exposed through [`matches`]: a filter such as
//! `/smartthings/+/switch` matches every concrete topic whose segments line
//! up with it.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TopicError};

/// Matches exactly one topic level.
pub const SINGLE_LEVEL_WILDCARD: &str = "+";
/// Matches any number of trailing topic levels, including none.
pub const MULTI_LEVEL_WILDCARD: &str = "#";
/// Separator between topic levels.
pub const LEVEL_SEPARATOR: char = '/';

/// A broker topic, either concrete or containing wildcard segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Create a new topic from any string-like value
    pub fn new(topic: impl Into<String>) -> Self {
        Self(topic.into())
    }

    /// Get the topic as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the topic contains `+` or `#` segments
    pub fn is_wildcard(&self) -> bool {
        self.0
            .split(LEVEL_SEPARATOR)
            .any(|level| level == SINGLE_LEVEL_WILDCARD || level == MULTI_LEVEL_WILDCARD)
    }

    /// Whether this topic, used as a subscription filter, matches `topic`.
    pub fn matches(&self, topic: &str) -> bool {
        matches(topic, &self.0)
    }

    /// Check that the topic is usable as a subscription filter.
    pub fn validate_filter(&self) -> Result<()> {
        validate_filter(&self.0)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Validate a subscription filter.
///
/// `#` must be a whole segment and the last one; `+` must be a whole segment.
pub fn validate_filter(filter: &str) -> Result<()> {
    if filter.is_empty() {
        return Err(TopicError::Empty);
    }

    let levels: Vec<&str> = filter.split(LEVEL_SEPARATOR).collect();
    let last = levels.len() - 1;
    for (index, level) in levels.iter().enumerate() {
        if *level == MULTI_LEVEL_WILDCARD {
            if index != last {
                return Err(TopicError::MisplacedMultiLevelWildcard(filter.to_string()));
            }
        } else if *level != SINGLE_LEVEL_WILDCARD
            && (level.contains('#') || level.contains('+'))
        {
            return Err(TopicError::PartialWildcard(filter.to_string()));
        }
    }
    Ok(())
}

/// Standard publish/subscribe wildcard matching.
///
/// Returns `true` when the concrete `topic` is equal to `filter` or matched
/// by its wildcard segments. Invalid filters never match. Topics starting
/// with `$` are only matched by filters that name their first level
/// explicitly.
pub fn matches(topic: &str, filter: &str) -> bool {
    if topic == filter {
        return true;
    }
    if validate_filter(filter).is_err() {
        return false;
    }

    let mut topic_levels = topic.split(LEVEL_SEPARATOR);
    let mut filter_levels = filter.split(LEVEL_SEPARATOR).peekable();

    if topic.starts_with('$') {
        if let Some(first) = filter_levels.peek() {
            if *first == SINGLE_LEVEL_WILDCARD || *first == MULTI_LEVEL_WILDCARD {
                return false;
            }
        }
    }

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some(MULTI_LEVEL_WILDCARD), _) => return true,
            (Some(SINGLE_LEVEL_WILDCARD), Some(_)) => continue,
            (Some(expected), Some(actual)) if expected == actual => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
