use crate::config::SharedConfig;
use crate::record::{Interaction, SharedSink};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Semaphore;
use trust_dns_proto::op::{Header, Message, MessageType, Query};
use trust_dns_proto::rr::rdata::TXT;
use trust_dns_proto::rr::{Name, RData, Record, RecordType};

/// Every answer is served with a zero TTL so resolvers come back for each lookup.
const ANSWER_TTL: u32 = 0;

/// Returns the name to record when `name` contains the capture `domain`: lower-cased and
/// without its trailing root dot.
#[must_use]
pub fn capture_name(name: &Name, domain: &str) -> Option<String> {
    let name = name.to_string().to_lowercase();
    if !name.contains(domain) {
        return None;
    }
    Some(name.strip_suffix('.').unwrap_or(&name).to_string())
}

/// Build the reply to `request`, answering `query` with exactly one record.
#[must_use]
pub fn synthesize(request: &Message, query: &Query, txt_value: &str) -> Message {
    let rdata = match query.query_type() {
        RecordType::TXT => RData::TXT(TXT::new(vec![txt_value.to_string()])),
        _ => RData::A(Ipv4Addr::LOCALHOST),
    };
    let answer = Record::from_rdata(query.name().clone(), ANSWER_TTL, rdata);

    let mut header = Header::response_from_request(request.header());
    header.set_message_type(MessageType::Response);
    header.set_authoritative(true);
    let mut response = Message::new();
    response
        .set_header(header)
        .add_query(query.clone())
        .add_answer(answer);
    response
}

#[derive(Clone)]
pub struct Handler {
    config: SharedConfig,
    sink: SharedSink,
    capture_permits: Arc<Semaphore>,
}

impl Handler {
    pub(super) fn new(config: SharedConfig, sink: SharedSink) -> Self {
        let capture_permits = Arc::new(Semaphore::new(config.capture_max_inflight));
        Handler {
            config,
            sink,
            capture_permits,
        }
    }

    /// Handle one datagram, returning the encoded reply to send back, if any.
    pub(super) fn handle_datagram(&self, datagram: &[u8], src: SocketAddr) -> Option<Vec<u8>> {
        let request = match Message::from_vec(datagram) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(%src, "dropping undecodable datagram: {err}");
                return None;
            }
        };
        let Some(query) = request.queries().first() else {
            tracing::debug!(%src, "dropping message without questions");
            return None;
        };

        if let Some(name) = capture_name(query.name(), &self.config.domain) {
            self.capture(name, src.ip());
        }

        let response = synthesize(&request, query, self.config.txt_answer());
        match response.to_vec() {
            Ok(reply) => Some(reply),
            Err(err) => {
                tracing::error!(%src, "failed to encode DNS response: {err}");
                None
            }
        }
    }

    fn capture(&self, name: String, source_ip: IpAddr) {
        let Ok(permit) = Arc::clone(&self.capture_permits).try_acquire_owned() else {
            tracing::warn!(%name, %source_ip, "too many captures in flight, dropping interaction");
            return;
        };
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(err) = sink.record(Interaction::Dns { name }, source_ip).await {
                tracing::warn!("failed to record DNS interaction: {err}");
            }
            drop(permit);
        });
    }
}
