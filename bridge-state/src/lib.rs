//! Durable state for the hub MQTT bridge.
//!
//! All mutable engine state lives in one [`BridgeState`] value: the
//! subscription table and topic list, the [`HistoryCache`], the
//! [`PublicationRegistry`], the hub callback address, the last hub subscribe
//! request and the device directory snapshot. A [`SnapshotStore`] writes it
//! to `state.json` (plus a key-list `state.summary.json`) and loads it back
//! at startup, falling back to an empty state when nothing usable is on disk.

pub mod error;
pub mod history;
pub mod publications;
pub mod snapshot;
pub mod store;

pub use error::{Result, StateError};
pub use history::HistoryCache;
pub use publications::{PublicationRecord, PublicationRegistry};
pub use snapshot::{BridgeState, StateSummary, STATE_VERSION, UNSAVED_VERSION};
pub use store::{SnapshotStore, STATE_FILE, SUMMARY_FILE};
