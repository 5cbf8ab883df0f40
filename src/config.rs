use crate::error::Error;
use crate::notify;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub type SharedConfig = Arc<Config>;

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub domain: String,
    #[serde(default)]
    pub txt_value: Option<String>,
    #[serde(default = "default_dns_udp_bind_addr")]
    pub dns_udp_bind_addr: SocketAddr,
    #[serde(default = "default_dns_max_inflight")]
    pub dns_max_inflight: usize,
    #[serde(default = "default_capture_max_inflight")]
    pub capture_max_inflight: usize,
    pub api_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_api_timeout")]
    pub api_timeout: Duration,
    #[serde(default)]
    pub client_ip_header: Option<String>,
    #[serde(default)]
    pub http_log: Vec<String>,
    #[serde(default)]
    pub record_store_path: Option<String>,
    #[serde(default)]
    pub geolocation: GeolocationConfig,
    pub notify: NotifyConfig,
    pub exchange: ExchangeConfig,
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct NotifyConfig {
    pub bot_token: String,
    /// Comma separated Telegram chat IDs. Notifications go to the first one.
    pub chat_id: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default)]
    pub interval: Duration,
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExchangeConfig {
    pub endpoint: String,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub proxy_url: Option<String>,
}

#[serde_as]
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum GeolocationConfig {
    IpApi {
        #[serde_as(as = "DurationSeconds<u64>")]
        #[serde(default = "default_geolocation_timeout")]
        timeout: Duration,
    },
    Fixed {
        location: String,
    },
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        GeolocationConfig::IpApi {
            timeout: default_geolocation_timeout(),
        }
    }
}

fn default_dns_udp_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 53))
}

fn default_dns_max_inflight() -> usize {
    1024
}

fn default_capture_max_inflight() -> usize {
    256
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_geolocation_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Config {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.normalized()
    }

    pub fn try_from_str(s: &str) -> Result<Self, Error> {
        let conf: Config = serde_json::from_str(s)?;
        conf.normalized()
    }

    /// Returns the TXT answer value, the empty string when none is configured.
    pub fn txt_answer(&self) -> &str {
        self.txt_value.as_deref().unwrap_or_default()
    }

    fn normalized(mut self) -> Result<Self, Error> {
        self.domain = self.domain.trim().to_lowercase();
        if self.domain.is_empty() {
            return Err(Error::EmptyCaptureDomain);
        }
        self.notify.chat_ids()?;

        // Captures notify inside the request, so the API timeout must outlast a retried send.
        let required = self.notify.interval + notify::backoff_budget();
        if self.api_timeout <= required {
            return Err(Error::ApiTimeoutTooShort {
                api_timeout: self.api_timeout,
                required,
            });
        }
        Ok(self)
    }
}

impl NotifyConfig {
    /// Parse the comma separated chat ID list, skipping blank entries.
    pub fn chat_ids(&self) -> Result<Vec<i64>, Error> {
        let ids = self
            .chat_id
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse::<i64>()
                    .map_err(|_| Error::InvalidChatId(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if ids.is_empty() {
            return Err(Error::NoChatIds);
        }
        Ok(ids)
    }
}
