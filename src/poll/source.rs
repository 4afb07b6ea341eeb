// src/poll/source.rs
//! HTTP JSON source for backend endpoints (`/api/lawyers`, `/api/stats`, ...).

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::time::Duration;

use crate::poll::types::SnapshotSource;

pub struct HttpJsonSource<T> {
    name: String,
    url: String,
    client: Client,
    timeout: Duration,
    _payload: PhantomData<fn() -> T>,
}

impl<T> HttpJsonSource<T> {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            _payload: PhantomData,
        }
    }

    /// Share one connection pool between sources.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Parse a response body. Empty or `null` bodies are errors, not empty payloads,
/// so a flaky backend never wipes the last good snapshot.
pub fn parse_json_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        anyhow::bail!("backend returned empty/null body");
    }
    serde_json::from_str(trimmed).with_context(|| {
        let preview: String = trimmed.chars().take(200).collect();
        format!("parse JSON failed, body: {preview}")
    })
}

#[async_trait::async_trait]
impl<T> SnapshotSource<T> for HttpJsonSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch(&self) -> Result<T> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("read body of {}", self.url))?;
        if !status.is_success() {
            anyhow::bail!("GET {} returned {status}", self.url);
        }
        parse_json_body(&body).with_context(|| format!("decode {}", self.name))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_null_bodies_are_errors() {
        assert!(parse_json_body::<serde_json::Value>("").is_err());
        assert!(parse_json_body::<serde_json::Value>("  null ").is_err());
    }

    #[test]
    fn parse_error_mentions_body() {
        let err = parse_json_body::<Vec<u32>>("{oops").unwrap_err();
        assert!(format!("{err:#}").contains("{oops"));
    }

    #[test]
    fn parses_valid_body() {
        let v: Vec<u32> = parse_json_body(" [1,2,3] ").unwrap();
        assert_eq!(v, vec![1, 2, 3]);
    }
}
