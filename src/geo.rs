//! Source IP geolocation.
//!
//! The [`Sink`][crate::record::Sink] resolves every interaction's source IP to a human
//! readable location string before persisting it. Two implementations are provided:
//! [`IpApiGeolocator`], which queries [ip-api.com], and [`FixedGeolocator`], which always
//! answers with the same configured string.
//!
//! [ip-api.com]: https://ip-api.com/docs/api:json

use crate::config::GeolocationConfig;
use crate::error::Error;
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use serde::Deserialize;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// The location reported for addresses that can't be routed on the public internet.
pub const LOCAL_NETWORK: &str = "Local network";

const IP_API_BASE: &str = "http://ip-api.com/json";

lazy_static! {
    static ref NON_PUBLIC_NETWORKS: Vec<IpNetwork> = ["fc00::/7", "fe80::/10", "169.254.0.0/16"]
        .iter()
        // NB: unwrap is safe: constant, valid CIDR literals.
        .map(|net| IpNetwork::from_str(net).unwrap())
        .collect();
}

#[allow(clippy::module_name_repetitions)]
pub type DynGeolocator = Arc<dyn Geolocator + Send + Sync>;

#[async_trait::async_trait]
pub trait Geolocator {
    /// Resolve `ip` to a location description.
    async fn geolocate(&self, ip: IpAddr) -> Result<String, Error>;
}

/// Build the geolocator selected by the config.
///
/// # Errors
///
/// Returns [`Error::Http`] if the HTTP client for [`IpApiGeolocator`] can't be built.
pub fn from_config(config: &GeolocationConfig) -> Result<DynGeolocator, Error> {
    let geolocator: DynGeolocator = match config {
        GeolocationConfig::IpApi { timeout } => Arc::new(IpApiGeolocator::new(*timeout)?),
        GeolocationConfig::Fixed { location } => Arc::new(FixedGeolocator::new(location)),
    };
    Ok(geolocator)
}

#[must_use]
pub fn is_local(ip: IpAddr) -> bool {
    let reserved = match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.to_ipv4_mapped().map_or(false, |v4| is_local(IpAddr::V4(v4)))
        }
    };
    reserved || NON_PUBLIC_NETWORKS.iter().any(|net| net.contains(ip))
}

#[derive(Debug, Clone)]
pub struct FixedGeolocator {
    location: String,
}

impl FixedGeolocator {
    pub fn new(location: impl Into<String>) -> Self {
        FixedGeolocator {
            location: location.into(),
        }
    }
}

#[async_trait::async_trait]
impl Geolocator for FixedGeolocator {
    async fn geolocate(&self, _ip: IpAddr) -> Result<String, Error> {
        Ok(self.location.clone())
    }
}

#[derive(Debug, Clone)]
pub struct IpApiGeolocator {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

impl IpApiGeolocator {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client can't be built.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        Self::with_base_url(IP_API_BASE, timeout)
    }

    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client can't be built.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(IpApiGeolocator {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl IpApiResponse {
    fn into_location(self, ip: IpAddr) -> Result<String, Error> {
        if self.status != "success" {
            return Err(Error::Geolocation(
                ip,
                self.message.unwrap_or_else(|| self.status.clone()),
            ));
        }
        let parts: Vec<String> = [self.country, self.region_name, self.city]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect();
        if !parts.is_empty() {
            return Ok(parts.join(", "));
        }
        self.country_code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| Error::Geolocation(ip, "no location data".to_string()))
    }
}

#[async_trait::async_trait]
impl Geolocator for IpApiGeolocator {
    async fn geolocate(&self, ip: IpAddr) -> Result<String, Error> {
        if is_local(ip) {
            return Ok(LOCAL_NETWORK.to_string());
        }
        let url = format!("{}/{ip}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| Error::Geolocation(ip, err.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Geolocation(
                ip,
                format!("lookup answered {}", response.status()),
            ));
        }
        let reply: IpApiResponse = response
            .json()
            .await
            .map_err(|err| Error::Geolocation(ip, err.to_string()))?;
        reply.into_location(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn local_addresses() {
        for local in [
            "127.0.0.1",
            "10.1.2.3",
            "192.168.0.10",
            "172.16.5.4",
            "169.254.1.1",
            "0.0.0.0",
            "::1",
            "fd00::1",
            "fe80::1",
            "::ffff:10.0.0.1",
        ] {
            assert!(is_local(ip(local)), "{local} should be local");
        }
        for public in ["8.8.8.8", "203.0.113.9", "2001:4860:4860::8888"] {
            assert!(!is_local(ip(public)), "{public} should be public");
        }
    }

    #[tokio::test]
    async fn local_addresses_skip_lookup() {
        // Port 9 (discard) is never queried for a local source.
        let geo = IpApiGeolocator::with_base_url("http://127.0.0.1:9", Duration::from_secs(1))
            .unwrap();
        assert_eq!(geo.geolocate(ip("10.0.0.7")).await.unwrap(), LOCAL_NETWORK);
    }

    #[test]
    fn joins_known_parts() {
        let reply: IpApiResponse = serde_json::from_str(
            r#"{"status":"success","country":"Germany","countryCode":"DE","regionName":"Hesse","city":"Frankfurt am Main"}"#,
        )
        .unwrap();
        assert_eq!(
            reply.into_location(ip("203.0.113.9")).unwrap(),
            "Germany, Hesse, Frankfurt am Main"
        );
    }

    #[test]
    fn falls_back_to_country_code() {
        let reply: IpApiResponse =
            serde_json::from_str(r#"{"status":"success","country":"","countryCode":"DE"}"#)
                .unwrap();
        assert_eq!(reply.into_location(ip("203.0.113.9")).unwrap(), "DE");
    }

    #[test]
    fn failed_lookup_is_an_error() {
        let reply: IpApiResponse =
            serde_json::from_str(r#"{"status":"fail","message":"reserved range"}"#).unwrap();
        match reply.into_location(ip("203.0.113.9")) {
            Err(Error::Geolocation(_, reason)) => assert_eq!(reason, "reserved range"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fixed_location() {
        let geo = FixedGeolocator::new("Lab");
        assert_eq!(geo.geolocate(ip("8.8.8.8")).await.unwrap(), "Lab");
    }
}
