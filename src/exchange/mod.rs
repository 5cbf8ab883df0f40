//! Autodiscover credential validation.
//!
//! [`validate`] sends one NTLM-authenticated GET to an autodiscover endpoint and reports the
//! HTTP status it got back. Whether that status means the credentials are valid is up to the
//! caller. The request goes through a stack of [`Transport`]s:
//!
//! ```text
//! NtlmTransport -> RedirectForwarder -> HttpTransport
//! ```
//!
//! Each call builds its own stack, so concurrent probes share no connections, cookies or
//! handshake state.

use crate::error::Error;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::{HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Request, StatusCode, Url};

pub mod ntlm;
pub mod redirect;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;

use ntlm::{Credentials, NtlmTransport};
use redirect::RedirectForwarder;
pub use transport::{HttpTransport, Transport};

/// Status reported for a probe that never got an HTTP response.
pub const PROBE_NOT_EXECUTED: i32 = -1;

const HOSTNAME_LEN: usize = 10;

/// One credential validation request. Lives for a single [`validate`] call.
#[derive(Debug, Clone)]
pub struct CredentialAttempt {
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub insecure: bool,
    pub proxy_url: Option<String>,
    /// Workstation name presented in the NTLM handshake, random per attempt.
    pub hostname: String,
}

impl CredentialAttempt {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        user_agent: impl Into<String>,
        insecure: bool,
        proxy_url: Option<String>,
    ) -> Self {
        CredentialAttempt {
            username: username.into(),
            password: password.into(),
            user_agent: user_agent.into(),
            insecure,
            proxy_url,
            hostname: random_hostname(),
        }
    }
}

fn random_hostname() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(HOSTNAME_LEN)
        .map(char::from)
        .collect()
}

/// Probe `endpoint` with the attempt's credentials over a fresh HTTP client.
///
/// # Errors
///
/// Returns an error when no HTTP response was received: the client couldn't be built, the
/// endpoint is not a URL, or the connection or NTLM handshake failed.
pub async fn validate(endpoint: &str, attempt: &CredentialAttempt) -> Result<StatusCode, Error> {
    let transport = HttpTransport::new(attempt.insecure, attempt.proxy_url.as_deref())?;
    validate_with(transport, endpoint, attempt).await
}

/// Like [`validate`], over the given base transport.
///
/// # Errors
///
/// See [`validate`].
pub async fn validate_with<T: Transport>(
    transport: T,
    endpoint: &str,
    attempt: &CredentialAttempt,
) -> Result<StatusCode, Error> {
    let credentials = Credentials {
        domain: String::new(),
        username: attempt.username.clone(),
        password: attempt.password.clone(),
    };
    let transport = NtlmTransport::new(
        RedirectForwarder::new(transport, &attempt.username, &attempt.password),
        credentials,
        &attempt.hostname,
    );

    let mut request = Request::new(Method::GET, Url::parse(endpoint)?);
    let headers = request.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml"));
    headers.insert(USER_AGENT, HeaderValue::from_str(&attempt.user_agent)?);

    let response = transport.round_trip(request).await?;
    let status = response.status();
    tracing::debug!(
        username = %attempt.username,
        hostname = %attempt.hostname,
        status = status.as_u16(),
        "autodiscover probe finished"
    );
    Ok(status)
}
