//! HTTP and SSE plumbing shared by both adapter families.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::ParleyError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// How a backend family authenticates its requests.
#[derive(Debug, Clone, Copy)]
pub enum AuthScheme<'a> {
    /// `Authorization: Bearer <key>` (delta-style backends).
    Bearer,
    /// `x-api-key` plus a protocol version header (block-style backends).
    VersionedKey { version: &'a str },
}

/// Build the request headers for one backend family.
pub fn request_headers(api_key: &str, scheme: AuthScheme<'_>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    match scheme {
        AuthScheme::Bearer => {
            if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
                headers.insert(AUTHORIZATION, val);
            }
        }
        AuthScheme::VersionedKey { version } => {
            if let Ok(val) = HeaderValue::from_str(api_key) {
                headers.insert("x-api-key", val);
            }
            if let Ok(val) = HeaderValue::from_str(version) {
                headers.insert("anthropic-version", val);
            }
        }
    }
    headers
}

/// Reassembles SSE `data:` payloads from raw network chunks.
///
/// Chunk boundaries may fall anywhere, including mid-line; incomplete lines
/// stay buffered until the closing newline arrives. Comment lines,
/// event-name lines, and the `[DONE]` sentinel carry no payload.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning the data payloads it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));
        let mut payloads = Vec::new();
        while let Some(line_end) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=line_end).collect();
            let line = line.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data: ") {
                if data != "[DONE]" {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

/// Map a non-200 response to the matching error family.
pub fn status_to_error(status: u16, body: &str) -> ParleyError {
    let detail = error_body(body);
    match status {
        401 | 403 => ParleyError::Authentication(detail.message),
        429 => ParleyError::RateLimited {
            retry_after_ms: detail.retry_after_ms,
        },
        _ => ParleyError::Api {
            status,
            message: detail.message,
        },
    }
}

struct ErrorDetail {
    message: String,
    retry_after_ms: Option<u64>,
}

// Backends wrap failures as {"error": {"message": ..., "retry_after": ...}};
// anything else is passed through verbatim.
fn error_body(body: &str) -> ErrorDetail {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    let retry_after_ms = error
        .and_then(|e| e.get("retry_after"))
        .and_then(|r| r.as_f64())
        .map(|s| (s * 1000.0) as u64);
    ErrorDetail {
        message,
        retry_after_ms,
    }
}
