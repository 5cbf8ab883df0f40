//! Synthetic zone DNS responder.
//!
//! OOB Crab answers every UDP query it can decode with exactly one record, whatever the name.
//! It never returns NXDOMAIN, so a target's resolver always gets an answer to cache and the
//! lookup that proves an interaction is never retried elsewhere.
//!
//! # Captures
//!
//! If the lower-cased query name contains the configured
//! [`Config::domain`][`crate::config::Config::domain`] anywhere in it, a
//! [`DNS` interaction][crate::record::Interaction::Dns] is handed to the
//! [`Sink`][crate::record::Sink] in the background. Answering never waits for the sink.
//!
//! E.g. with config:
//! ```json
//! {
//!   "domain": "oob.example.com",
//!   ...
//! }
//! ```
//!
//! A query for `ZmxhZw.oob.example.com` records `zmxhzw.oob.example.com` along with the
//! address the datagram came from. Note that the match is on a substring, so
//! `oob.example.com.evil.net` is captured as well.
//!
//! # A
//!
//! `A` queries, and queries of every type other than `TXT`, are answered with `127.0.0.1` and
//! a TTL of 0:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 +short anything.oob.example.com AAAA
//! 127.0.0.1
//! ```
//!
//! # TXT
//!
//! `TXT` queries are answered with [`Config::txt_value`][`crate::config::Config::txt_value`],
//! or an empty string when none is configured, with a TTL of 0:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 +short oob.example.com TXT
//! "v=spf1 -all"
//! ```
//!
//! # Backpressure
//!
//! Each datagram is handled on its own task. At most
//! [`Config::dns_max_inflight`][`crate::config::Config::dns_max_inflight`] datagrams are
//! handled at once, and at most
//! [`Config::capture_max_inflight`][`crate::config::Config::capture_max_inflight`] captures
//! are waiting on the sink. Past either limit the newest work is dropped with a warning.

mod handlers;
pub mod server;

pub use handlers::{capture_name, synthesize};
pub use server::{new, Server};
