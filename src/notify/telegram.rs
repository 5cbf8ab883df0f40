//! A [Telegram Bot API] implementation of the [`MessagingBackend`][super::MessagingBackend]
//! trait.
//!
//! [Telegram Bot API]: https://core.telegram.org/bots/api#sendmessage
use crate::config::NotifyConfig;
use crate::error::Error;
use crate::notify::{Format, MessagingBackend, SendError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Sends each message to the first configured chat.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct TelegramBackend {
    client: reqwest::Client,
    send_message_url: String,
    chat_id: i64,
}

#[derive(Serialize, Debug)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Deserialize, Debug, Default)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize, Debug, Default)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

impl TelegramBackend {
    /// Build a backend from the notification config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChatId`] or [`Error::NoChatIds`] for an unusable chat ID list,
    /// and [`Error::Http`] if the HTTP client can't be built.
    pub fn new(config: &NotifyConfig) -> Result<Self, Error> {
        let chat_id = config.chat_ids()?[0];
        let api_base = config
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(TelegramBackend {
            client,
            send_message_url: format!("{api_base}/bot{}/sendMessage", config.bot_token),
            chat_id,
        })
    }
}

impl ApiReply {
    fn into_result(self) -> Result<(), SendError> {
        if self.ok {
            return Ok(());
        }
        let err = SendError::new(
            self.description
                .unwrap_or_else(|| "Telegram API request failed".to_string()),
        );
        match self.parameters.and_then(|p| p.retry_after) {
            Some(secs) if secs > 0 => Err(err.with_retry_after(Duration::from_secs(secs))),
            _ => Err(err),
        }
    }
}

fn parse_mode(format: Format) -> Option<&'static str> {
    match format {
        Format::Plain => None,
        Format::Markdown => Some("Markdown"),
    }
}

#[async_trait::async_trait]
impl MessagingBackend for TelegramBackend {
    async fn send(&self, text: &str, format: Format) -> Result<(), SendError> {
        let body = SendMessage {
            chat_id: self.chat_id,
            text,
            parse_mode: parse_mode(format),
        };
        // The request URL embeds the bot token, keep it out of error messages.
        let response = self
            .client
            .post(&self.send_message_url)
            .json(&body)
            .send()
            .await
            .map_err(|err| SendError::new(err.without_url().to_string()))?;
        let status = response.status();
        let reply: ApiReply = response.json().await.map_err(|err| {
            SendError::new(format!(
                "unreadable Telegram reply ({status}): {}",
                err.without_url()
            ))
        })?;
        reply.into_result()
    }
}
