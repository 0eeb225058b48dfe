//! HTTP Module
//!
//! REST surface of the store.
//!
//! ## Routes
//! - `PUT    /v1/{key}`: body is the value → `201 Created`
//! - `GET    /v1/{key}`: value as body → `200`, or `404`
//! - `DELETE /v1/{key}`: `200`, or `404`
//! - `GET    /healthz`: engine and logger status as JSON
//!
//! Log write failures are not reported on the request that triggered them;
//! they surface through the logger's error channel. Mutations attempted
//! after the log failed are refused with `500`.

mod handlers;
mod server;

pub use server::{build_router, serve, SharedEngine};
