//! HTTP binding for the remote artwork service
//!
//! REST endpoints under one base URL, bearer-token auth, JSON bodies:
//!
//! - `GET    /artworks`        list (force refresh sends `Cache-Control: no-cache`)
//! - `POST   /artworks`        create
//! - `PUT    /artworks/{id}`   update
//! - `DELETE /artworks/{id}`   delete
//! - `GET    /artworks/quota`  upload quota

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use tracing::debug;

use super::error::{ApiError, ApiResult};
use super::ArtworkApi;
use crate::models::{ArtworkPatch, ArtworkRecord, NewArtwork, UploadQuota};

/// Production client for the remote artwork service
pub struct HttpArtworkApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpArtworkApi {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            token: None,
        }
    }

    /// Attach the bearer token used on every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Turn a non-success response into a classified error
    async fn classify(response: Response) -> ApiError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ApiError::from_status(status, &body)
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> ApiResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Transient(format!("malformed server response: {}", e)))
    }
}

#[async_trait]
impl ArtworkApi for HttpArtworkApi {
    async fn list_artworks(
        &self,
        _use_cache: bool,
        force_refresh: bool,
    ) -> ApiResult<Vec<ArtworkRecord>> {
        let mut builder = self.request(Method::GET, "artworks");
        if force_refresh {
            // any response cache between here and the server must be bypassed
            builder = builder.header("Cache-Control", "no-cache");
        }
        debug!("GET /artworks force_refresh={}", force_refresh);

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Self::decode(response).await
    }

    async fn create_artwork(&self, payload: &NewArtwork) -> ApiResult<ArtworkRecord> {
        debug!("POST /artworks title={:?}", payload.title);
        let response = self
            .request(Method::POST, "artworks")
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Self::decode(response).await
    }

    async fn update_artwork(&self, id: i64, payload: &ArtworkPatch) -> ApiResult<ArtworkRecord> {
        debug!("PUT /artworks/{}", id);
        let response = self
            .request(Method::PUT, &format!("artworks/{}", id))
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Self::decode(response).await
    }

    async fn delete_artwork(&self, id: i64) -> ApiResult<()> {
        debug!("DELETE /artworks/{}", id);
        let response = self
            .request(Method::DELETE, &format!("artworks/{}", id))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Ok(())
    }

    async fn check_upload_quota(&self) -> ApiResult<UploadQuota> {
        debug!("GET /artworks/quota");
        let response = self.request(Method::GET, "artworks/quota").send().await?;
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Self::decode(response).await
    }
}
