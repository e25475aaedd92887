//! Request body validation at the HTTP boundary.
//!
//! Malformed bodies are rejected here and never reach the engine.

use bridge_engine::{PushRequest, SubscribeRequest};
use serde::de::DeserializeOwned;

/// A rejected request body, with a message for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBody(pub String);

impl warp::reject::Reject for InvalidBody {}

/// Parse a JSON body
pub fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, InvalidBody> {
    serde_json::from_slice(body).map_err(|e| InvalidBody(format!("invalid body: {e}")))
}

pub fn validate_push(request: &PushRequest) -> Result<(), InvalidBody> {
    require("name", &request.name)?;
    require("type", &request.attribute)?;
    require("value", &request.value)
}

pub fn validate_subscribe(request: &SubscribeRequest) -> Result<(), InvalidBody> {
    require("callback", &request.callback)?;
    match request.devices.pairs().find(|(_, device)| device.is_empty()) {
        Some((attribute, _)) => Err(InvalidBody(format!(
            "\"devices.{attribute}\" contains an empty device name"
        ))),
        None => Ok(()),
    }
}

fn require(field: &str, value: &str) -> Result<(), InvalidBody> {
    if value.is_empty() {
        Err(InvalidBody(format!("\"{field}\" is not allowed to be empty")))
    } else {
        Ok(())
    }
}
