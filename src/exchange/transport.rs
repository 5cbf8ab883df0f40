use crate::error::Error;
use reqwest::redirect::Policy;
use reqwest::{Proxy, Request, Response};
use std::sync::Arc;

/// Executes one HTTP request. Decorators wrap another `Transport` to add behaviour.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: Request) -> Result<Response, Error>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn round_trip(&self, request: Request) -> Result<Response, Error> {
        (**self).round_trip(request).await
    }
}

/// The base transport: a [`reqwest::Client`] that never follows redirects by itself.
///
/// Build one per credential attempt. Its connection pool and cookie store live exactly as
/// long as the transport, so nothing carries over from one attempt to the next.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the proxy URL is invalid or the client can't be built.
    pub fn new(insecure: bool, proxy_url: Option<&str>) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .redirect(Policy::none())
            .cookie_store(true)
            // The NTLM handshake is bound to one connection.
            .pool_max_idle_per_host(1);
        if let Some(proxy_url) = proxy_url.filter(|url| !url.is_empty()) {
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }
        Ok(HttpTransport {
            client: builder.build()?,
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn round_trip(&self, request: Request) -> Result<Response, Error> {
        Ok(self.client.execute(request).await?)
    }
}
