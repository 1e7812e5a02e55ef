use std::time::Duration;

use anyhow::Context as _;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ReaderError, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
const ACCEPT_ANY: &str = "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8";

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Extra attempts after the first one fails.
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout_secs: 30,
            retries: 0,
            backoff_ms: 500,
        }
    }
}

/// Blocking HTTP collaborator shared by listing, chapter and API requests.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;
        Ok(Self { client, config })
    }

    pub fn get_bytes(&self, url: &str, bearer: Option<&str>) -> Result<Vec<u8>> {
        self.with_retries(url, || {
            let mut request = self.client.get(url).header(ACCEPT, ACCEPT_ANY);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }
            self.send(request)
        })
    }

    /// GET and decode a JSON payload; also returns the payload size in bytes.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<(T, usize)> {
        let bytes = self.get_bytes(url, bearer)?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|err| ReaderError::fetch(url, format!("malformed payload: {err}")))?;
        Ok((value, bytes.len()))
    }

    pub fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        self.post_json_with_headers(url, body, &[])
    }

    pub fn post_json_with_headers<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> Result<T> {
        let bytes = self.with_retries(url, || {
            let mut request = self.client.post(url).json(body);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            self.send(request)
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|err| ReaderError::fetch(url, format!("malformed payload: {err}")))
    }

    fn send(&self, request: RequestBuilder) -> std::result::Result<Vec<u8>, String> {
        let response = request
            .header(USER_AGENT, &self.config.user_agent)
            .send()
            .map_err(|err| err.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| format!("read body: {err}"))
    }

    fn with_retries<T>(
        &self,
        url: &str,
        mut attempt_once: impl FnMut() -> std::result::Result<T, String>,
    ) -> Result<T> {
        let attempts = self.config.retries.saturating_add(1);
        let mut last_reason = String::new();
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self
                    .config
                    .backoff_ms
                    .saturating_mul(1_u64 << (attempt - 1).min(10));
                std::thread::sleep(Duration::from_millis(delay));
            }
            match attempt_once() {
                Ok(value) => return Ok(value),
                Err(reason) => {
                    tracing::warn!(
                        url,
                        attempt = attempt + 1,
                        attempts,
                        reason = %reason,
                        "fetch attempt failed"
                    );
                    last_reason = reason;
                }
            }
        }
        Err(ReaderError::fetch(url, last_reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_single_attempt() {
        let config = FetchConfig::default();
        assert_eq!(config.retries, 0);
        assert_eq!(config.user_agent, "Mozilla/5.0");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn unreachable_host_is_a_fetch_error() -> anyhow::Result<()> {
        let fetcher = Fetcher::new(FetchConfig {
            timeout_secs: 2,
            ..FetchConfig::default()
        })?;
        let err = fetcher
            .get_bytes("http://127.0.0.1:9/nothing", None)
            .unwrap_err();
        assert!(matches!(err, ReaderError::Fetch { .. }));
        Ok(())
    }
}
