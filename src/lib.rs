//! OOB Crab
//!
//! An out-of-band interaction catcher for security testing. Payloads that make a target
//! resolve `<token>.<domain>` or fetch `http://<host>/httplog/<token>` are recorded with the
//! source address and its location, and announced to the operator over Telegram.
//!
//! OOB Crab also probes Exchange [autodiscover] endpoints with credentials submitted to
//! `/users/login`, authenticating with NTLMv2 and carrying the credentials across the
//! redirects autodiscover likes to issue.
//!
//! The moving parts:
//!
//! * [`dns`]: a UDP responder answering every query from a synthetic zone;
//! * [`api`]: the HTTP capture and credential capture endpoints;
//! * [`exchange`]: the autodiscover credential validator;
//! * [`record::Sink`]: locates, stores and announces every interaction;
//! * [`notify::Notifier`]: delivers announcements with bounded retries.
//!
//! [autodiscover]: https://learn.microsoft.com/en-us/exchange/architecture/client-access/autodiscover
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
#[doc(hidden)]
pub mod crab;
pub mod dns;
pub mod error;
pub mod exchange;
pub mod geo;
pub mod notify;
pub mod record;
pub mod record_store;

pub use api::new as new_http;
pub use config::{Config, SharedConfig};
pub use dns::new as new_dns;
pub use record::{SharedSink, Sink};
pub use record_store::{FileRecordStore, InMemoryRecordStore};
