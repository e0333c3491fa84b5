//! Shared plumbing for HTTP-backed providers.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use mapier_core::{Error, Result};

/// Timeout for provider health probes.
pub(crate) const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a client whose requests are bounded by `timeout`.
pub(crate) fn build_client(provider: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client for {}: {}", provider, e)))
}

/// Classify a transport failure.
pub(crate) fn send_error(provider: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::ProviderTimeout {
            provider: provider.to_string(),
        }
    } else {
        Error::ProviderUnavailable {
            provider: provider.to_string(),
            reason: format!("Request failed: {}", e),
        }
    }
}

/// Pass 2xx responses through; turn anything else into
/// `ProviderUnavailable` carrying the status and body.
pub(crate) async fn ensure_success(provider: &str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::ProviderUnavailable {
        provider: provider.to_string(),
        reason: format!("{} returned {}: {}", provider, status, truncate(&body, 200)),
    })
}

/// Like [`ensure_success`], but a 404 becomes `Ok(None)`.
pub(crate) async fn ensure_found(provider: &str, response: Response) -> Result<Option<Response>> {
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    ensure_success(provider, response).await.map(Some)
}

/// Decode a JSON body.
pub(crate) async fn decode<T: DeserializeOwned>(provider: &str, response: Response) -> Result<T> {
    response.json().await.map_err(|e| Error::ProviderUnavailable {
        provider: provider.to_string(),
        reason: format!("Failed to parse response: {}", e),
    })
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 200), "short");
    }
}
