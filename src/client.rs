//! HTTP client for the upstream feature API.

use crate::error::{ProxyError, Result};
use crate::translate::upstream_types::{FeatureRequest, FeatureResponse};

use bytes::Bytes;
use futures::stream::Stream;
use reqwest::{RequestBuilder, Response, Url};
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;

/// Raw upstream body, chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

const API_KEY_HEADER: &str = "API-KEY";

/// One client per request: the API key is the caller's.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            request_timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `path` with `id` appended as a single, escaped path segment.
    fn url_with_id(&self, path: &str, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| ProxyError::config(format!("Invalid upstream URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ProxyError::config("Upstream URL cannot carry a path"))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(API_KEY_HEADER, &self.api_key)
    }

    /// Send a buffered request and decode its JSON body.
    async fn send_json(&self, builder: RequestBuilder) -> Result<Value> {
        let response = self
            .authed(builder)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = check_status(response).await?;
        let text = response.text().await?;
        Ok(parse_body(&text))
    }

    /// `POST /api/features`, buffered.
    pub async fn call_value(&self, req: &FeatureRequest) -> Result<Value> {
        tracing::debug!(feature = %req.feature_type, model = %req.model, "POST /api/features");
        self.send_json(self.http.post(self.url("/api/features")).json(req))
            .await
    }

    pub async fn call(&self, req: &FeatureRequest) -> Result<FeatureResponse> {
        self.call_value(req).await.map(FeatureResponse::classify)
    }

    /// `POST /api/features?isStreaming=true`, returning the body as it arrives.
    ///
    /// Only the response head is bounded by the request timeout; the caller
    /// bounds each chunk.
    pub async fn open_stream(&self, req: &FeatureRequest) -> Result<ByteStream> {
        tracing::debug!(feature = %req.feature_type, model = %req.model, "POST /api/features (streaming)");
        let request = self
            .authed(self.http.post(self.url("/api/features")))
            .query(&[("isStreaming", "true")])
            .json(req);
        let response = self.send_head(request).await?;
        let response = check_status(response).await?;
        Ok(Box::pin(response.bytes_stream()))
    }

    /// `POST /api/assets` as multipart with the file in the `asset` field.
    pub async fn upload_asset(
        &self,
        data: Bytes,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<Value> {
        let mut part = reqwest::multipart::Part::bytes(data.to_vec()).file_name(filename.to_string());
        if let Some(mime) = content_type {
            part = part
                .mime_str(mime)
                .map_err(|e| ProxyError::validation(format!("Invalid MIME type: {e}"), None))?;
        }
        let form = reqwest::multipart::Form::new().part("asset", part);

        tracing::debug!(filename, size = data.len(), "POST /api/assets");
        self.send_json(self.http.post(self.url("/api/assets")).multipart(form))
            .await
    }

    pub async fn get_asset(&self, id: &str) -> Result<Value> {
        let url = self.url_with_id("/api/assets", id)?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn create_conversation<T: Serialize + ?Sized>(&self, params: &T) -> Result<Value> {
        self.send_json(self.http.post(self.url("/api/conversations")).json(params))
            .await
    }

    pub async fn list_conversations(&self) -> Result<Value> {
        self.send_json(self.http.get(self.url("/api/conversations")))
            .await
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Value> {
        let url = self.url_with_id("/api/conversations", id)?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<Value> {
        let url = self.url_with_id("/api/conversations", id)?;
        self.send_json(self.http.delete(url)).await
    }

    /// Unauthenticated GET of a generated asset, e.g. synthesized speech.
    ///
    /// Like [`open_stream`](Self::open_stream), only the head is bounded here.
    pub async fn fetch_asset(&self, url: &str) -> Result<Response> {
        let response = self.send_head(self.http.get(url)).await?;
        check_status(response).await
    }

    /// Send a request whose body will be streamed. The request timeout covers
    /// the response head only, never the body.
    async fn send_head(&self, builder: RequestBuilder) -> Result<Response> {
        tokio::time::timeout(self.request_timeout, builder.send())
            .await
            .map_err(|_| ProxyError::timeout(self.request_timeout))?
            .map_err(ProxyError::from)
    }
}

/// Turn a non-2xx answer into [`ProxyError::Upstream`] carrying the raw body.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), body_len = body.len(), "Upstream error");
    Err(ProxyError::upstream(status.as_u16(), body))
}

/// Bodies are JSON; anything else is kept as a bare string envelope.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
