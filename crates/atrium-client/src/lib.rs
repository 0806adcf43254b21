//! HTTP client for the Atrium API.
//!
//! Provides a Bearer-authenticated client with generic JSON helpers, the
//! domain calls used by the CLI ([`api`]), the two-phase upload with local
//! orphan recovery ([`upload`], [`recovery`]) and download-or-open handling
//! ([`download`]).

pub mod api;
pub mod download;
pub mod error;
pub mod preview;
pub mod recovery;
pub mod upload;

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use download::{download_or_open, DownloadOutcome};
pub use error::{ClientError, ClientResult};
pub use recovery::{
    FileRecoveryStore, MemoryRecoveryStore, RecoveryDrainer, RecoveryRecord, RecoveryStore,
    RecoveryTool, ReplayReport,
};
pub use upload::{UploadRequest, Uploader};

pub const API_PREFIX: &str = "/api";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// HTTP client for the Atrium API. Every request carries
/// `Authorization: Bearer <token>` when a token is set.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> ClientResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// ATRIUM_API_URL (default `http://localhost:3000`) and ATRIUM_API_KEY.
    /// The key may be the master API key or a session token.
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url =
            std::env::var("ATRIUM_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let token = std::env::var("ATRIUM_API_KEY")
            .context("Missing API key. Set ATRIUM_API_KEY to a master key or session token")?;

        Self::new(base_url, Some(token)).context("Failed to create HTTP client")
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Raw client for requests outside the API (e.g. media downloads).
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = self.apply_auth(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!(%status, body = %body, "API request failed");
            return Err(ClientError::Http { status, body });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET with optional query parameters; deserializes the JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let mut request = self.client.get(self.build_url(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.client.post(self.build_url(path)).json(body);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.client.put(self.build_url(path)).json(body);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> ClientResult<T> {
        let request = self.client.post(self.build_url(path)).multipart(form);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    /// POST without a body; returns the success status.
    pub async fn post_empty(&self, path: &str) -> ClientResult<StatusCode> {
        let response = self.send(self.client.post(self.build_url(path))).await?;
        Ok(response.status())
    }

    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send(self.client.delete(self.build_url(path))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed() {
        let client = ApiClient::new("http://localhost:3000/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(
            client.build_url("/api/categories"),
            "http://localhost:3000/api/categories"
        );
    }
}
