//! Error types.

use crate::notify::SendError;
use std::net::IpAddr;

/// Error enumerates the possible OOB Crab error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when the [`Config::domain`][`crate::config::Config::domain`] capture domain
    /// is empty. An empty capture domain would match every query name.
    #[error("capture domain must not be empty")]
    EmptyCaptureDomain,

    /// Returned when a chat ID in [`NotifyConfig::chat_id`][`crate::config::NotifyConfig`]
    /// isn't an integer.
    #[error("failed to convert chat ID {0:?} to an integer")]
    InvalidChatId(String),

    /// Returned when [`NotifyConfig::chat_id`][`crate::config::NotifyConfig`] holds no chat IDs.
    #[error("no valid chat IDs found")]
    NoChatIds,

    /// Returned when [`Config::api_timeout`][`crate::config::Config::api_timeout`] can't
    /// cover the notification interval plus the notifier's retry backoff.
    #[error("api_timeout of {api_timeout:?} must exceed {required:?}")]
    ApiTimeoutTooShort {
        api_timeout: std::time::Duration,
        required: std::time::Duration,
    },

    /// Returned by the HTTP API when a request outlives
    /// [`Config::api_timeout`][`crate::config::Config::api_timeout`].
    #[error("request timed out")]
    RequestTimeout,

    /// Returned by a [`Geolocator`][`crate::geo::Geolocator`] that couldn't resolve a
    /// location for the given IP.
    #[error("failed to geolocate {0}: {1}")]
    Geolocation(IpAddr, String),

    /// Returned by the [`Sink`][`crate::record::Sink`] when the record store rejected an append.
    #[error("failed to persist record")]
    Persistence(#[source] Box<Error>),

    /// Returned by the [`Notifier`][`crate::notify::Notifier`] once every delivery attempt
    /// has failed.
    #[error("notification failed after {attempts} attempts")]
    NotifyFailed {
        attempts: usize,
        #[source]
        source: SendError,
    },

    /// Returned by the credential capture endpoint when the autodiscover probe never produced
    /// an HTTP status (see [`PROBE_NOT_EXECUTED`][`crate::exchange::PROBE_NOT_EXECUTED`]).
    #[error("autodiscover probe did not execute")]
    ProbeNotExecuted(#[source] Box<Error>),

    /// Returned when a redirect response carries no `Location` header.
    #[error("redirect response has no Location header")]
    MissingRedirectLocation,

    /// Returned when the probe endpoint or a redirect `Location` is not a valid URL.
    #[error("invalid URL")]
    InvalidUrl(#[from] url::ParseError),

    /// Returned when the autodiscover request body can't be rendered.
    #[error("failed to render autodiscover request: {0}")]
    AutodiscoverTemplate(&'static str),

    /// Returned when a server's NTLM challenge message is malformed.
    #[error("invalid NTLM challenge: {0}")]
    InvalidChallenge(&'static str),

    /// Returned when a request must be sent twice (e.g. for an NTLM handshake) but its body
    /// can't be cloned.
    #[error("request body can't be replayed")]
    UnreplayableRequest,

    /// Returned when a value can't be used as an HTTP header value.
    #[error("invalid header value")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Returned when an outbound HTTP request fails at the transport level.
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Returned when the HTTP API server can't bind or fails while serving.
    #[error("HTTP server error")]
    HttpServer(#[from] hyper::Error),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when processing JSON fails, e.g. when
    /// [loading a `Config`][crate::config::Config::try_from_file] or
    /// [opening a `FileRecordStore`][crate::record_store::FileRecordStore::try_from_file].
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),
}
