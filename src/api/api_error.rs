use crate::api::model::{Envelope, LoginValidationError};
use crate::error::Error;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub(crate) struct APIError(anyhow::Error);

impl APIError {
    fn code(&self) -> StatusCode {
        if self.0.is::<LoginValidationError>() || self.0.is::<QueryRejection>() {
            return StatusCode::BAD_REQUEST;
        }
        match self.0.downcast_ref::<Error>() {
            Some(Error::Geolocation(_, _) | Error::NotifyFailed { .. }) => StatusCode::BAD_REQUEST,
            Some(Error::ProbeNotExecuted(_)) => StatusCode::UNAUTHORIZED,
            Some(Error::RequestTimeout) => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for APIError {
    fn into_response(self) -> Response {
        let code = self.code();
        if code.is_server_error() {
            tracing::error!("request failed: {:#}", self.0);
        } else {
            tracing::debug!("request rejected: {:#}", self.0);
        }
        let body = Envelope::failure(code, format!("{:#}", self.0));
        (StatusCode::OK, Json(body)).into_response()
    }
}

impl<E> From<E> for APIError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
