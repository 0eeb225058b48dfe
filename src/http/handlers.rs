//! Request handlers
//!
//! Mutations run on tokio's blocking pool: a put or delete waits on the
//! engine's write lock and, when the log's request queue is full, on the
//! queue itself. Reads only take the store's read lock and stay inline.

use std::io;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;

use crate::engine::EngineStatus;
use crate::error::TxkvError;

use super::server::SharedEngine;

impl IntoResponse for TxkvError {
    fn into_response(self) -> Response {
        let status = match &self {
            TxkvError::KeyNotFound => StatusCode::NOT_FOUND,
            TxkvError::InvalidKey(_) | TxkvError::InvalidValue(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        (status, format!("{self}\n")).into_response()
    }
}

/// Run an engine call on the blocking pool
async fn blocking<T, F>(call: F) -> Result<T, TxkvError>
where
    F: FnOnce() -> Result<T, TxkvError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| TxkvError::Io(io::Error::new(io::ErrorKind::Other, e)))?
}

pub(super) async fn put_key(
    State(engine): State<SharedEngine>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<StatusCode, TxkvError> {
    let value = String::from_utf8(body.to_vec())
        .map_err(|e| TxkvError::InvalidValue(format!("value is not UTF-8: {e}")))?;

    let bytes = value.len();
    let logged_key = key.clone();
    blocking(move || engine.put(&key, &value)).await?;
    tracing::debug!(key = %logged_key, bytes, "PUT");

    Ok(StatusCode::CREATED)
}

pub(super) async fn get_key(
    State(engine): State<SharedEngine>,
    Path(key): Path<String>,
) -> Result<String, TxkvError> {
    let value = engine.get(&key)?;
    tracing::debug!(key = %key, "GET");

    Ok(value)
}

pub(super) async fn delete_key(
    State(engine): State<SharedEngine>,
    Path(key): Path<String>,
) -> Result<StatusCode, TxkvError> {
    let logged_key = key.clone();
    blocking(move || engine.delete(&key)).await?;
    tracing::debug!(key = %logged_key, "DELETE");

    Ok(StatusCode::OK)
}

pub(super) async fn health(State(engine): State<SharedEngine>) -> (StatusCode, Json<EngineStatus>) {
    let status = engine.status();
    let code = if status.failure.is_some() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (code, Json(status))
}
