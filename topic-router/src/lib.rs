//! Topic routing for the hub MQTT bridge.
//!
//! This crate holds the pure, synchronous part of the bridge:
//!
//! - [`NamingConvention`]: generates `{preface}/{device}/{attribute}[/{suffix}]`
//!   topics per [`Direction`]
//! - [`Topic`] and [`matches`]: broker topics and standard `+`/`#` wildcard
//!   matching
//! - [`DeviceDirectory`]: per-device topic and value-mapping overrides
//! - [`SubscriptionTable`]: topic → device/attribute bindings built from a
//!   hub [`SubscriptionRequest`]
//! - [`SubscriptionDiff`]: the minimal broker subscribe/unsubscribe sets
//!   between two topic lists
//!
//! # Example
//!
//! ```
//! use topic_router::{
//!     DeviceDirectory, NamingConvention, SubscriptionDiff, SubscriptionRequest,
//!     SubscriptionTable,
//! };
//!
//! let convention = NamingConvention::new("/smartthings")
//!     .with_suffixes("", "command", "set_state");
//! let request = SubscriptionRequest::new().with("switch", &["Lamp"]);
//!
//! let table = SubscriptionTable::build(&request, &DeviceDirectory::new(), &convention);
//! let diff = SubscriptionDiff::between(&[], table.topics());
//!
//! assert_eq!(diff.to_subscribe.len(), 2);
//! assert_eq!(
//!     table.resolve_incoming("/smartthings/Lamp/switch/command").len(),
//!     1
//! );
//! ```

pub mod convention;
pub mod diff;
pub mod directory;
pub mod error;
pub mod table;
pub mod topic;

pub use convention::{Direction, NamingConvention, DEFAULT_PREFACE};
pub use diff::SubscriptionDiff;
pub use directory::{AttributeTopics, DeviceDirectory, DeviceEntry, TopicBinding};
pub use error::{DirectoryError, TopicError};
pub use table::{BindingOrigin, SubscriptionEntry, SubscriptionRequest, SubscriptionTable};
pub use topic::{matches, validate_filter, Topic};
