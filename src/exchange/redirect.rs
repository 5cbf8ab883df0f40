use crate::error::Error;
use crate::exchange::transport::Transport;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{
    HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LOCATION, USER_AGENT,
};
use reqwest::{Body, Method, Request, Response, StatusCode, Url};
use std::time::Duration;

/// Timeout of the forwarded request, independent of the wrapped transport's configuration.
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

const MAPI_HTTP_CAPABILITY: HeaderName = HeaderName::from_static("x-mapihttpcapability");
const ANCHOR_MAILBOX: HeaderName = HeaderName::from_static("x-anchormailbox");

const REQUEST_SCHEMA: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/outlook/requestschema/2006";
const RESPONSE_SCHEMA: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/outlook/responseschema/2006a";

/// Re-issues redirected autodiscover requests with their credentials.
///
/// Autodiscover frequently redirects across hosts (e.g. from `autodiscover.example.com` to
/// `autodiscover-s.outlook.com`), and HTTP clients strip `Authorization` on cross-host
/// redirects. On a 301, 302, 303 or 307 this transport instead POSTs the autodiscover request
/// to the redirect target itself, with Basic credentials, exactly once. Redirects answered by
/// that follow-up are returned as they are.
#[derive(Debug, Clone)]
pub struct RedirectForwarder<T> {
    inner: T,
    username: String,
    password: String,
}

impl<T> RedirectForwarder<T> {
    pub fn new(inner: T, username: impl Into<String>, password: impl Into<String>) -> Self {
        RedirectForwarder {
            inner,
            username: username.into(),
            password: password.into(),
        }
    }

    fn follow_up(
        &self,
        request_url: &Url,
        user_agent: Option<HeaderValue>,
        response: &Response,
    ) -> Result<Request, Error> {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(Error::MissingRedirectLocation)?;
        tracing::info!(
            request_url = %request_url,
            redirect_location = location,
            "request redirected"
        );
        let target = request_url.join(location)?;
        let body = autodiscover_request(&self.username)?;

        let mut request = Request::new(Method::POST, target);
        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml"));
        if let Some(user_agent) = user_agent {
            headers.insert(USER_AGENT, user_agent);
        }
        headers.insert(MAPI_HTTP_CAPABILITY, HeaderValue::from_static("1"));
        headers.insert(ANCHOR_MAILBOX, HeaderValue::from_str(&self.username)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&basic_auth(&self.username, &self.password))?,
        );
        *request.body_mut() = Some(Body::from(body));
        *request.timeout_mut() = Some(FORWARD_TIMEOUT);
        Ok(request)
    }
}

fn is_forwarded(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
    )
}

#[must_use]
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
}

/// Render the autodiscover POX request for `email`.
///
/// # Errors
///
/// Returns [`Error::AutodiscoverTemplate`] for an empty mailbox address.
pub fn autodiscover_request(email: &str) -> Result<String, Error> {
    if email.trim().is_empty() {
        return Err(Error::AutodiscoverTemplate("empty mailbox address"));
    }
    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <Autodiscover xmlns=\"{REQUEST_SCHEMA}\">\n\
         <Request><EMailAddress>{}</EMailAddress>\n\
         <AcceptableResponseSchema>{RESPONSE_SCHEMA}</AcceptableResponseSchema>\n\
         </Request></Autodiscover>",
        escape_xml(email)
    ))
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[async_trait::async_trait]
impl<T: Transport> Transport for RedirectForwarder<T> {
    async fn round_trip(&self, request: Request) -> Result<Response, Error> {
        let request_url = request.url().clone();
        let user_agent = request.headers().get(USER_AGENT).cloned();

        let response = self.inner.round_trip(request).await?;
        if !is_forwarded(response.status()) {
            return Ok(response);
        }

        let follow_up = self.follow_up(&request_url, user_agent, &response);
        drop(response);
        self.inner.round_trip(follow_up?).await
    }
}
