//! Interaction records.
//!
//! Every producer (the [DNS responder][crate::dns], the HTTP capture endpoint and the
//! credential capture endpoint of the [HTTP API][crate::api]) describes what it saw as an
//! [`Interaction`] and hands it to the shared [`Sink`]. The sink turns it into a
//! [`NewRecord`] by resolving the source location, and the
//! [`RecordStore`][crate::record_store::RecordStore] turns that into a [`StoredRecord`] by
//! assigning an ID and the `created_at` timestamp.
//!
//! Stored records serialize to the interaction record wire shape:
//!
//! ```json
//! {
//!   "id": 7,
//!   "type": "DNS",
//!   "record": "abc123.oob.example.com",
//!   "location": "Germany, Hesse, Frankfurt am Main",
//!   "ip": "203.0.113.9",
//!   "created_at": "2024-06-01T12:00:00Z"
//! }
//! ```

pub mod sink;
#[cfg(test)]
pub(crate) mod testing;

pub use sink::{SharedSink, Sink};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use time::OffsetDateTime;

/// The kind of an interaction. Fixed when the interaction is created.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    #[serde(rename = "DNS")]
    Dns,
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "Exchange")]
    CredentialProbe,
}

impl Kind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Dns => "DNS",
            Kind::Http => "HTTP",
            Kind::CredentialProbe => "Exchange",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one autodiscover credential probe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub username: String,
    pub password: String,
    /// The HTTP status the autodiscover endpoint answered with.
    pub status: u16,
}

/// Something a producer observed, before it is located and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// A DNS query for a name containing the capture domain. The name is lower-cased and has
    /// no trailing root dot.
    Dns { name: String },
    /// An HTTP request to the capture endpoint, by request path.
    Http { path: String },
    /// A credential probe made on behalf of the credential capture endpoint.
    CredentialProbe(ProbeOutcome),
}

impl Interaction {
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Interaction::Dns { .. } => Kind::Dns,
            Interaction::Http { .. } => Kind::Http,
            Interaction::CredentialProbe(_) => Kind::CredentialProbe,
        }
    }

    /// The text stored in the record's `record` field.
    ///
    /// Credential probes render as `username:password:status` so the wire shape stays a
    /// single string; the structured outcome is stored alongside it.
    #[must_use]
    pub fn record_text(&self) -> String {
        match self {
            Interaction::Dns { name } => name.clone(),
            Interaction::Http { path } => path.clone(),
            Interaction::CredentialProbe(outcome) => format!(
                "{}:{}:{}",
                outcome.username, outcome.password, outcome.status
            ),
        }
    }
}

/// A located interaction, ready to be appended to a record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub kind: Kind,
    pub record: String,
    pub location: String,
    pub ip: IpAddr,
    pub probe: Option<ProbeOutcome>,
}

impl NewRecord {
    #[must_use]
    pub fn new(interaction: Interaction, ip: IpAddr, location: String) -> Self {
        let kind = interaction.kind();
        let record = interaction.record_text();
        let probe = match interaction {
            Interaction::CredentialProbe(outcome) => Some(outcome),
            _ => None,
        };
        NewRecord {
            kind,
            record,
            location,
            ip,
            probe,
        }
    }
}

/// A persisted interaction record. Never mutated once stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: Kind,
    pub record: String,
    pub location: String,
    pub ip: IpAddr,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeOutcome>,
}

impl StoredRecord {
    #[must_use]
    pub fn from_new(id: u64, created_at: OffsetDateTime, new: NewRecord) -> Self {
        StoredRecord {
            id,
            kind: new.kind,
            record: new.record,
            location: new.location,
            ip: new.ip,
            created_at,
            probe: new.probe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn probe_record_text_is_composite() {
        let interaction = Interaction::CredentialProbe(ProbeOutcome {
            username: "alice".to_string(),
            password: "hunter22".to_string(),
            status: 401,
        });
        assert_eq!(interaction.kind(), Kind::CredentialProbe);
        assert_eq!(interaction.record_text(), "alice:hunter22:401");

        let new = NewRecord::new(interaction, "10.0.0.1".parse().unwrap(), "Lab".into());
        assert_eq!(new.probe.unwrap().status, 401);
    }

    #[test]
    fn stored_record_wire_shape() {
        let new = NewRecord::new(
            Interaction::Dns {
                name: "abc.oob.example.com".to_string(),
            },
            "203.0.113.9".parse().unwrap(),
            "Frankfurt".to_string(),
        );
        let stored = StoredRecord::from_new(7, datetime!(2024-06-01 12:00 UTC), new);
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "type": "DNS",
                "record": "abc.oob.example.com",
                "location": "Frankfurt",
                "ip": "203.0.113.9",
                "created_at": "2024-06-01T12:00:00Z",
            })
        );
        let back: StoredRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(Kind::Dns.to_string(), "DNS");
        assert_eq!(Kind::Http.to_string(), "HTTP");
        assert_eq!(
            serde_json::to_string(&Kind::CredentialProbe).unwrap(),
            "\"Exchange\""
        );
    }
}
