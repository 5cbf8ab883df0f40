//! NTLMv2 challenge/response authentication, as described in [MS-NLMP].
//!
//! [`NtlmTransport`] decorates another [`Transport`]: it sends the request with a NEGOTIATE
//! message, answers the server's CHALLENGE with an AUTHENTICATE message computed from the
//! credentials, and returns the response to that second request. A server that doesn't reply
//! to the NEGOTIATE with an NTLM challenge gets its response passed through unchanged.
//!
//! [MS-NLMP]: https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-nlmp

use crate::error::Error;
use crate::exchange::transport::Transport;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;
use rand::RngCore;
use reqwest::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Request, Response, StatusCode};
use time::OffsetDateTime;

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";
const NEGOTIATE: u32 = 1;
const CHALLENGE: u32 = 2;
const AUTHENTICATE: u32 = 3;

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const NEGOTIATE_OEM: u32 = 0x0000_0002;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;
const NEGOTIATE_128: u32 = 0x2000_0000;
const NEGOTIATE_56: u32 = 0x8000_0000;

const NEGOTIATE_FLAGS: u32 = NEGOTIATE_UNICODE
    | NEGOTIATE_OEM
    | REQUEST_TARGET
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSIONSECURITY
    | NEGOTIATE_TARGET_INFO
    | NEGOTIATE_128
    | NEGOTIATE_56;

const AV_EOL: u16 = 0;
const AV_TIMESTAMP: u16 = 7;

/// Seconds between 1601-01-01 and the Unix epoch, in 100ns ticks.
const FILETIME_UNIX_EPOCH: i128 = 116_444_736_000_000_000;

type HmacMd5 = Hmac<Md5>;

/// The account an AUTHENTICATE message is computed for.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub domain: String,
    pub username: String,
    pub password: String,
}

/// A decoded CHALLENGE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub flags: u32,
    pub server_challenge: [u8; 8],
    pub target_info: Vec<u8>,
}

fn read_u16(buf: &[u8], at: usize) -> Option<u16> {
    buf.get(at..at + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
}

fn read_u32(buf: &[u8], at: usize) -> Option<u32> {
    buf.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
}

impl Challenge {
    /// Decode a CHALLENGE message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChallenge`] when `msg` isn't a well formed CHALLENGE message.
    pub fn parse(msg: &[u8]) -> Result<Self, Error> {
        if msg.len() < 32 {
            return Err(Error::InvalidChallenge("message too short"));
        }
        if &msg[..8] != SIGNATURE {
            return Err(Error::InvalidChallenge("bad signature"));
        }
        if read_u32(msg, 8) != Some(CHALLENGE) {
            return Err(Error::InvalidChallenge("not a CHALLENGE message"));
        }
        let flags = read_u32(msg, 20).unwrap_or_default();
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&msg[24..32]);

        let target_info = match (read_u16(msg, 40), read_u32(msg, 44)) {
            (Some(len), Some(offset)) if len > 0 => {
                let start = offset as usize;
                msg.get(start..start + usize::from(len))
                    .ok_or(Error::InvalidChallenge("target info out of bounds"))?
                    .to_vec()
            }
            _ => Vec::new(),
        };

        Ok(Challenge {
            flags,
            server_challenge,
            target_info,
        })
    }

    /// The server's `MsvAvTimestamp` AV pair, if the target info carries one.
    #[must_use]
    pub fn timestamp(&self) -> Option<[u8; 8]> {
        let info = &self.target_info;
        let mut at = 0;
        while let (Some(id), Some(len)) = (read_u16(info, at), read_u16(info, at + 2)) {
            let value = info.get(at + 4..at + 4 + usize::from(len))?;
            match id {
                AV_EOL => return None,
                AV_TIMESTAMP => return value.try_into().ok(),
                _ => at += 4 + usize::from(len),
            }
        }
        None
    }
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> [u8; 16] {
    // NB: unwrap is safe: HMAC accepts keys of any length.
    let mut mac = HmacMd5::new_from_slice(key).unwrap();
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// `NTOWFv2`: the NTLMv2 response key for an account.
#[must_use]
pub fn ntowf_v2(credentials: &Credentials) -> [u8; 16] {
    let nt_hash = Md4::digest(utf16le(&credentials.password));
    let identity = format!(
        "{}{}",
        credentials.username.to_uppercase(),
        credentials.domain
    );
    hmac_md5(&nt_hash, &[&utf16le(&identity)])
}

/// The current time as a little-endian Windows FILETIME.
fn filetime_now() -> [u8; 8] {
    let ticks = OffsetDateTime::now_utc().unix_timestamp_nanos() / 100 + FILETIME_UNIX_EPOCH;
    // NB: FILETIME fits in 64 bits until the year 30828.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    (ticks as u64).to_le_bytes()
}

/// The NEGOTIATE message opening the handshake. Carries no domain or workstation.
#[must_use]
pub fn negotiate_message() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&NEGOTIATE.to_le_bytes());
    msg.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    // Empty domain and workstation security buffers.
    msg.extend_from_slice(&[0u8; 16]);
    msg
}

/// The NTLMv2 and LMv2 responses to a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Responses {
    pub lm: Vec<u8>,
    pub nt: Vec<u8>,
}

/// Compute the NTLMv2 responses for `challenge`.
#[must_use]
pub fn responses(
    challenge: &Challenge,
    credentials: &Credentials,
    client_challenge: [u8; 8],
    timestamp: [u8; 8],
) -> Responses {
    let key = ntowf_v2(credentials);
    let server_timestamp = challenge.timestamp();

    let mut blob = vec![1, 1, 0, 0, 0, 0, 0, 0];
    blob.extend_from_slice(&server_timestamp.unwrap_or(timestamp));
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&challenge.target_info);
    blob.extend_from_slice(&[0u8; 4]);

    let nt_proof = hmac_md5(&key, &[&challenge.server_challenge, &blob]);
    let mut nt = nt_proof.to_vec();
    nt.extend_from_slice(&blob);

    // With a server timestamp the LMv2 response must be zeroed.
    let lm = if server_timestamp.is_some() {
        vec![0u8; 24]
    } else {
        let mut lm = hmac_md5(&key, &[&challenge.server_challenge, &client_challenge]).to_vec();
        lm.extend_from_slice(&client_challenge);
        lm
    };
    Responses { lm, nt }
}

/// Build the AUTHENTICATE message answering `challenge`.
#[must_use]
pub fn authenticate_message(
    challenge: &Challenge,
    credentials: &Credentials,
    workstation: &str,
    client_challenge: [u8; 8],
    timestamp: [u8; 8],
) -> Vec<u8> {
    let Responses { lm, nt } = responses(challenge, credentials, client_challenge, timestamp);
    let domain = utf16le(&credentials.domain);
    let user = utf16le(&credentials.username);
    let workstation = utf16le(workstation);
    let session_key: &[u8] = &[];
    let payloads: [&[u8]; 6] = [&lm, &nt, &domain, &user, &workstation, session_key];

    let header_len = 64;
    let mut msg = Vec::with_capacity(header_len + payloads.iter().map(|p| p.len()).sum::<usize>());
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&AUTHENTICATE.to_le_bytes());
    let mut offset = header_len;
    for payload in &payloads {
        // NB: every payload is far below 64KiB, the casts can't truncate.
        #[allow(clippy::cast_possible_truncation)]
        let len = (payload.len() as u16).to_le_bytes();
        msg.extend_from_slice(&len);
        msg.extend_from_slice(&len);
        #[allow(clippy::cast_possible_truncation)]
        msg.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += payload.len();
    }
    let flags = (challenge.flags & NEGOTIATE_FLAGS & !NEGOTIATE_OEM) | NEGOTIATE_UNICODE;
    msg.extend_from_slice(&flags.to_le_bytes());
    for payload in payloads {
        msg.extend_from_slice(payload);
    }
    msg
}

/// Find and decode the NTLM challenge of a `401 Unauthorized` response.
fn challenge_from(response: &Response) -> Result<Option<Challenge>, Error> {
    if response.status() != StatusCode::UNAUTHORIZED {
        return Ok(None);
    }
    let token = response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("NTLM").then(|| token.trim())
        });
    match token {
        None => Ok(None),
        Some(token) => {
            let raw = BASE64
                .decode(token)
                .map_err(|_| Error::InvalidChallenge("challenge is not base64"))?;
            Ok(Some(Challenge::parse(&raw)?))
        }
    }
}

fn ntlm_header(msg: &[u8]) -> Result<HeaderValue, Error> {
    Ok(HeaderValue::from_str(&format!("NTLM {}", BASE64.encode(msg)))?)
}

/// Authenticates requests sent through the wrapped transport with NTLMv2.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct NtlmTransport<T> {
    inner: T,
    credentials: Credentials,
    workstation: String,
}

impl<T> NtlmTransport<T> {
    pub fn new(inner: T, credentials: Credentials, workstation: impl Into<String>) -> Self {
        NtlmTransport {
            inner,
            credentials,
            workstation: workstation.into(),
        }
    }
}

#[async_trait::async_trait]
impl<T: Transport> Transport for NtlmTransport<T> {
    async fn round_trip(&self, mut request: Request) -> Result<Response, Error> {
        let mut authenticated = request.try_clone().ok_or(Error::UnreplayableRequest)?;

        request
            .headers_mut()
            .insert(AUTHORIZATION, ntlm_header(&negotiate_message())?);
        let response = self.inner.round_trip(request).await?;
        let Some(challenge) = challenge_from(&response)? else {
            return Ok(response);
        };
        drop(response);

        let mut client_challenge = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut client_challenge);
        let msg = authenticate_message(
            &challenge,
            &self.credentials,
            &self.workstation,
            client_challenge,
            filetime_now(),
        );
        authenticated
            .headers_mut()
            .insert(AUTHORIZATION, ntlm_header(&msg)?);
        self.inner.round_trip(authenticated).await
    }
}
