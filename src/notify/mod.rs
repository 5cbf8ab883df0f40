//! Operator notifications.
//!
//! A single [`Notifier`] is shared by every producer. It delivers text through a
//! [`MessagingBackend`] (in production a [`TelegramBackend`]) with bounded retries:
//!
//! * at most [`MAX_ATTEMPTS`] attempts are made;
//! * when the backend reports a retry-after duration, exactly that long is slept before the
//!   next attempt;
//! * otherwise the delay before attempt `i + 1` is `i * 2` seconds;
//! * after a successful delivery the configured interval is slept before returning, which
//!   rate limits all outbound messages of the process.

pub mod message;
pub mod telegram;

pub use telegram::TelegramBackend;

use crate::error::Error;
use std::time::Duration;

pub const MAX_ATTEMPTS: usize = 3;

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// The default delay after failed attempt `attempt` (1-based).
fn backoff(attempt: usize) -> Duration {
    // NB: attempt is at most MAX_ATTEMPTS, the cast can't truncate.
    #[allow(clippy::cast_possible_truncation)]
    let attempt = attempt as u32;
    RETRY_DELAY * attempt
}

/// The total time a failing delivery spends in default backoff before giving up.
#[must_use]
pub fn backoff_budget() -> Duration {
    (1..MAX_ATTEMPTS).map(backoff).sum()
}

/// How the messaging backend should interpret the text it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Plain,
    Markdown,
}

/// A failed delivery attempt, as reported by a [`MessagingBackend`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SendError {
    pub message: String,
    /// How long the backend asked us to wait before trying again, if it said.
    pub retry_after: Option<Duration>,
}

impl SendError {
    pub fn new(message: impl Into<String>) -> Self {
        SendError {
            message: message.into(),
            retry_after: None,
        }
    }

    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Something that can deliver one message to the operator.
#[async_trait::async_trait]
pub trait MessagingBackend {
    /// Make a single delivery attempt.
    async fn send(&self, text: &str, format: Format) -> Result<(), SendError>;
}

pub type DynMessagingBackend = Box<dyn MessagingBackend + Send + Sync>;

pub struct Notifier {
    backend: DynMessagingBackend,
    interval: Duration,
}

impl Notifier {
    #[must_use]
    pub fn new(backend: DynMessagingBackend, interval: Duration) -> Self {
        Notifier { backend, interval }
    }

    /// Send a Markdown message made of a title line and a body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotifyFailed`] once all delivery attempts have failed.
    pub async fn send_markdown(&self, title: &str, body: &str) -> Result<(), Error> {
        self.send(&format!("{title}\n{body}"), Format::Markdown)
            .await
    }

    /// Send plain text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotifyFailed`] once all delivery attempts have failed.
    pub async fn send_text(&self, text: &str) -> Result<(), Error> {
        self.send(text, Format::Plain).await
    }

    /// Deliver `text` with retries, then sleep the configured interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotifyFailed`] once all delivery attempts have failed.
    pub async fn send(&self, text: &str, format: Format) -> Result<(), Error> {
        self.send_with_retries(text, format).await?;
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        Ok(())
    }

    async fn send_with_retries(&self, text: &str, format: Format) -> Result<(), Error> {
        let mut attempt = 1;
        loop {
            let err = match self.backend.send(text, format).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            if attempt >= MAX_ATTEMPTS {
                return Err(Error::NotifyFailed {
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = err.retry_after.unwrap_or_else(|| backoff(attempt));
            tracing::warn!(
                attempt,
                delay_secs = delay.as_secs_f64(),
                "notification attempt failed: {err}"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
