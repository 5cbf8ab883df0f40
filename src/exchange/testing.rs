//! Scripted transport for exercising the decorators without a network.

use crate::error::Error;
use crate::exchange::transport::Transport;
use reqwest::header::{AsHeaderName, HeaderMap};
use reqwest::{Method, Request, Response, Url};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct SeenRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: String,
    pub timeout: Option<Duration>,
}

impl SeenRequest {
    pub fn header(&self, name: impl AsHeaderName) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }
}

/// Answers each request with the next scripted result, then with connection refused.
pub(crate) struct StubTransport {
    responses: Mutex<VecDeque<Result<Response, Error>>>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl StubTransport {
    pub fn new(responses: Vec<Result<Response, Error>>) -> Arc<Self> {
        Arc::new(StubTransport {
            responses: Mutex::new(responses.into()),
            seen: Mutex::default(),
        })
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for StubTransport {
    async fn round_trip(&self, request: Request) -> Result<Response, Error> {
        let body = request
            .body()
            .and_then(reqwest::Body::as_bytes)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();
        self.seen.lock().unwrap().push(SeenRequest {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            body,
            timeout: request.timeout().copied(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(connection_refused()))
    }
}

pub(crate) fn connection_refused() -> Error {
    Error::IO(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

pub(crate) fn response(status: u16, headers: &[(&str, &str)]) -> Response {
    let mut builder = hyper::Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    Response::from(builder.body(String::new()).unwrap())
}
