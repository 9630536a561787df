use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::RestError;

// ============================================================================
// Thin REST helper
// ============================================================================
//
// JSON in, JSON out. Every request carries the same headers; any non-2xx
// response becomes RestError::Status(code) without looking at the body.
//
// ============================================================================

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type Query<'a> = [(&'a str, String)];

#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    token: Option<String>,
}

impl RestClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, RestError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            token: None,
        })
    }

    /// Bearer token to send instead of the api key
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query<'_>) -> Result<T, RestError> {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    pub async fn post<B, T>(&self, path: &str, query: &Query<'_>, body: &B) -> Result<T, RestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.request(Method::POST, path).query(query).json(body))
            .await
    }

    pub async fn put<B, T>(&self, path: &str, query: &Query<'_>, body: &B) -> Result<T, RestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.request(Method::PUT, path).query(query).json(body))
            .await
    }

    /// Partial update; PostgREST uses PATCH for filtered updates
    pub async fn patch<B, T>(&self, path: &str, query: &Query<'_>, body: &B) -> Result<T, RestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.request(Method::PATCH, path).query(query).json(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, query: &Query<'_>) -> Result<T, RestError> {
        self.send(self.request(Method::DELETE, path).query(query)).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url_for(path))
            .headers(self.headers())
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("prefer", HeaderValue::from_static("return=representation"));

        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", value);
        }

        let bearer = self.token.as_deref().unwrap_or(&self.api_key);
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {bearer}")) {
            headers.insert(AUTHORIZATION, value);
        }

        headers
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RestError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), url = %response.url(), "REST request failed");
            return Err(RestError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        decode_body(&body)
    }
}

/// Empty bodies (204, DELETE without representation) decode as `null`
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, RestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_slice(body)?)
}
