//! HTTP client for the broker's SEMP endpoint.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use crate::config::{BrokerConfig, SEMP_CONTENT_TYPE};
use crate::error::{PollerError, Result};

/// User agent string identifying this poller.
const USER_AGENT: &str = concat!("sempwatch/", env!("CARGO_PKG_VERSION"));

/// Attempts per request, first one included.
const MAX_RETRIES: u32 = 3;

/// Delay before the second attempt; doubles after that.
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Blocking client with the whole-request timeout and our user agent.
pub fn create_client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()?)
}

/// What one request attempt amounted to.
enum Attempt {
    Reply(String),
    /// Transient failure worth another try.
    Transient(String),
    Failed(PollerError),
}

/// Backoff before attempt `attempt` (zero-based): 500 ms, then doubling.
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS << attempt.saturating_sub(1))
}

/// POST one SEMP request and return the reply body.
///
/// Connection errors, timeouts and 5xx responses are retried with
/// exponential backoff. Any other status than 200 fails immediately.
///
/// # Arguments
/// * `client` - HTTP client built by [`create_client`]
/// * `broker` - Endpoint and credentials
/// * `request` - SEMP request XML (`<rpc>...</rpc>`)
///
/// # Returns
/// The reply XML, decoded as UTF-8
pub fn post_semp(client: &Client, broker: &BrokerConfig, request: &str) -> Result<String> {
    let url = broker.semp_url();
    let mut transient = String::new();

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let delay = backoff(attempt);
            tracing::debug!(attempt, ?delay, "backing off before resend");
            thread::sleep(delay);
        }

        match send_once(client, broker, &url, request) {
            Attempt::Reply(body) => return Ok(body),
            Attempt::Failed(e) => return Err(e),
            Attempt::Transient(reason) => {
                tracing::warn!(
                    %url,
                    reason = %reason,
                    attempt = attempt + 1,
                    of = MAX_RETRIES,
                    "SEMP request failed transiently"
                );
                transient = reason;
            }
        }
    }

    Err(PollerError::RetriesExhausted {
        attempts: MAX_RETRIES,
        message: transient,
    })
}

fn send_once(client: &Client, broker: &BrokerConfig, url: &str, request: &str) -> Attempt {
    let sent = client
        .post(url)
        .basic_auth(&broker.username, Some(&broker.password))
        .header(CONTENT_TYPE, SEMP_CONTENT_TYPE)
        .body(request.to_string())
        .send();

    let response = match sent {
        Ok(response) => response,
        Err(e) if e.is_connect() || e.is_timeout() => return Attempt::Transient(e.to_string()),
        Err(e) => return Attempt::Failed(e.into()),
    };

    let status = response.status();
    if status.is_server_error() {
        return Attempt::Transient(format!("broker answered {status}"));
    }
    if status != StatusCode::OK {
        return Attempt::Failed(PollerError::UnexpectedStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("unknown").to_string(),
        });
    }

    match response.bytes() {
        Ok(bytes) => Attempt::Reply(bytes_to_string(&bytes)),
        Err(e) if e.is_timeout() => Attempt::Transient(e.to_string()),
        Err(e) => Attempt::Failed(e.into()),
    }
}

/// Decode a reply body, replacing invalid UTF-8 sequences.
fn bytes_to_string(bytes: &[u8]) -> String {
    match String::from_utf8(bytes.to_vec()) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                valid_up_to = e.utf8_error().valid_up_to(),
                "Reply is not valid UTF-8, decoding lossily"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
