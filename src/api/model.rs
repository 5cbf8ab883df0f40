use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

const MIN_PASSWORD_CHARS: usize = 6;

/// The JSON body of every capture endpoint response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Envelope<T> {
    pub code: u16,
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Envelope {
            code: StatusCode::OK.as_u16(),
            success: true,
            data,
        }
    }
}

impl Envelope<String> {
    #[must_use]
    pub fn failure(code: StatusCode, message: String) -> Self {
        Envelope {
            code: code.as_u16(),
            success: false,
            data: message,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CaptureData {
    pub ip: IpAddr,
    pub location: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginData {
    pub status: i32,
    pub username: String,
    pub ip: IpAddr,
    pub location: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub(super) struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LoginValidationError {
    #[error("username is required")]
    MissingUsername,
    #[error("username must be alphanumeric")]
    InvalidUsername,
    #[error("password must be at least 6 characters")]
    PasswordTooShort,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), LoginValidationError> {
        if self.username.is_empty() {
            return Err(LoginValidationError::MissingUsername);
        }
        if !self.username.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LoginValidationError::InvalidUsername);
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(LoginValidationError::PasswordTooShort);
        }
        Ok(())
    }
}
