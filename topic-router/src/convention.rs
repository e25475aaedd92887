//! Topic naming convention.
//!
//! Devices without a directory entry use generated topics of the form
//! `{preface}/{device}/{attribute}[/{suffix}]`, where the suffix selects the
//! direction of the topic. An empty suffix omits the trailing segment.

use serde::{Deserialize, Serialize};

use crate::topic::Topic;

/// Default topic preface used when none is configured.
pub const DEFAULT_PREFACE: &str = "/smartthings";

/// Which of the three generated topics to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// State changes reported by the hub, published by the bridge
    ReadState,
    /// Commands from devices to the hub
    Command,
    /// State changes from devices to the hub
    WriteState,
}

impl Direction {
    /// Whether a message arriving on a topic of this direction is a command
    pub fn is_command(&self) -> bool {
        matches!(self, Direction::Command)
    }
}

/// Preface and per-direction suffixes used to generate topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    pub preface: String,
    #[serde(rename = "state_read_suffix")]
    pub read_suffix: String,
    pub command_suffix: String,
    #[serde(rename = "state_write_suffix")]
    pub write_suffix: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            preface: DEFAULT_PREFACE.to_string(),
            read_suffix: String::new(),
            command_suffix: String::new(),
            write_suffix: String::new(),
        }
    }
}

impl NamingConvention {
    /// Create a convention with the given preface and empty suffixes
    pub fn new(preface: impl Into<String>) -> Self {
        Self {
            preface: preface.into(),
            ..Default::default()
        }
    }

    /// Builder-style setter for all three suffixes
    pub fn with_suffixes(
        mut self,
        read: impl Into<String>,
        command: impl Into<String>,
        write: impl Into<String>,
    ) -> Self {
        self.read_suffix = read.into();
        self.command_suffix = command.into();
        self.write_suffix = write.into();
        self
    }

    /// Suffix configured for a direction
    pub fn suffix(&self, direction: Direction) -> &str {
        match direction {
            Direction::ReadState => &self.read_suffix,
            Direction::Command => &self.command_suffix,
            Direction::WriteState => &self.write_suffix,
        }
    }

    /// Generate the topic for a device attribute in the given direction.
    ///
    /// Pure: the same inputs always produce the same topic.
    pub fn resolve(&self, device: &str, attribute: &str, direction: Direction) -> Topic {
        let suffix = self.suffix(direction);
        let mut levels = vec![self.preface.as_str(), device, attribute];
        if !suffix.is_empty() {
            levels.push(suffix);
        }
        Topic::new(levels.join("/"))
    }
}
