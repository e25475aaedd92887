//! Warp filters for `POST /push` and `POST /subscribe`.

use std::convert::Infallible;

use bridge_engine::{EngineError, PushRequest, SubscribeRequest, WorkerHandle};
use bytes::Bytes;
use serde::Serialize;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::validation::{parse, validate_push, validate_subscribe, InvalidBody};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

/// JSON body of every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusBody {
    pub fn ok() -> Self {
        Self {
            status: "OK",
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "ERROR",
            message: Some(message.into()),
        }
    }
}

/// The engine could not complete an accepted request.
#[derive(Debug)]
struct EngineFailure(EngineError);

impl warp::reject::Reject for EngineFailure {}

/// All routes, with rejections turned into JSON error responses.
pub fn routes(
    worker: WorkerHandle,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    push(worker.clone())
        .or(subscribe(worker))
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn push(worker: WorkerHandle) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::post()
        .and(warp::path("push"))
        .and(warp::path::end())
        .and(json_body())
        .and(with_worker(worker))
        .and_then(handle_push)
}

fn subscribe(
    worker: WorkerHandle,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::post()
        .and(warp::path("subscribe"))
        .and(warp::path::end())
        .and(json_body())
        .and(with_worker(worker))
        .and_then(handle_subscribe)
}

fn json_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::bytes())
}

fn with_worker(
    worker: WorkerHandle,
) -> impl Filter<Extract = (WorkerHandle,), Error = Infallible> + Clone {
    warp::any().map(move || worker.clone())
}

async fn handle_push(body: Bytes, worker: WorkerHandle) -> Result<impl Reply, Rejection> {
    let request: PushRequest = parse(&body).map_err(warp::reject::custom)?;
    validate_push(&request).map_err(warp::reject::custom)?;

    worker
        .push(request)
        .await
        .map_err(|e| warp::reject::custom(EngineFailure(e)))?;
    Ok(warp::reply::json(&StatusBody::ok()))
}

async fn handle_subscribe(body: Bytes, worker: WorkerHandle) -> Result<impl Reply, Rejection> {
    let request: SubscribeRequest = parse(&body).map_err(warp::reject::custom)?;
    validate_subscribe(&request).map_err(warp::reject::custom)?;

    tracing::info!(callback = %request.callback, "Hub subscribe request");
    worker
        .subscribe(request)
        .await
        .map_err(|e| warp::reject::custom(EngineFailure(e)))?;
    Ok(warp::reply::json(&StatusBody::ok()))
}

/// Convert rejections into JSON error responses.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if let Some(InvalidBody(message)) = err.find::<InvalidBody>() {
        (StatusCode::BAD_REQUEST, message.clone())
    } else if let Some(EngineFailure(e)) = err.find::<EngineFailure>() {
        tracing::error!(error = %e, "Request failed in engine");
        let code = match e {
            EngineError::Broker(_) => StatusCode::BAD_GATEWAY,
            EngineError::WorkerStopped => StatusCode::SERVICE_UNAVAILABLE,
        };
        (code, e.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Body too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Length required".to_string())
    } else {
        tracing::warn!(rejection = ?err, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&StatusBody::error(message)),
        code,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_layout() {
        assert_eq!(
            serde_json::to_value(StatusBody::ok()).unwrap(),
            serde_json::json!({"status": "OK"})
        );
        assert_eq!(
            serde_json::to_value(StatusBody::error("boom")).unwrap(),
            serde_json::json!({"status": "ERROR", "message": "boom"})
        );
    }
}
