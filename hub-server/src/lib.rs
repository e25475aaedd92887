//! HTTP surface of the hub MQTT bridge.
//!
//! Two endpoints, both answering `{"status": "OK"}` on success:
//!
//! - `POST /push` with `{name, type, value}`: a device attribute changed on
//!   the hub and is published to the broker.
//! - `POST /subscribe` with `{devices: {attribute: [device, ...]}, callback}`:
//!   the hub declares which device attributes it wants reported, and where.
//!
//! Bodies are validated here; malformed requests get a 400 with
//! `{"status": "ERROR", "message": ...}` and never reach the engine.

pub mod error;
pub mod routes;
pub mod server;
pub mod validation;

pub use error::{Result, ServerError};
pub use routes::{routes, StatusBody, MAX_BODY_BYTES};
pub use server::HubServer;
pub use validation::InvalidBody;
