use crate::models::{
    Dog, LocationSearchRequest, LocationSearchResponse, MatchResponse, PageRequest, SearchResponse,
};
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur when talking to the search API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("{message} ({status})")]
    ApiError { status: u16, message: String },

    #[error("Unauthorized: session missing or expired")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Build an error from a non-success response, preferring the server's text
    pub(crate) async fn from_response(response: Response) -> Self {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Unauthorized;
        }

        let body = response.text().await.unwrap_or_default();
        let message = if !body.trim().is_empty() {
            body.trim().to_string()
        } else {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        };

        ApiError::ApiError {
            status: status.as_u16(),
            message,
        }
    }
}

/// Remote service contract consumed by the search engine.
///
/// Every call after `login` carries the session credential the login
/// established; `logout` drops it.
#[async_trait]
pub trait DogApi: Send + Sync {
    async fn login(&self, name: &str, email: &str) -> Result<(), ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;

    async fn fetch_breeds(&self) -> Result<Vec<String>, ApiError>;

    /// Fetch one page of ids. A cursor request is sent verbatim.
    async fn search(&self, request: &PageRequest) -> Result<SearchResponse, ApiError>;

    /// Batch lookup. Result order is not guaranteed to follow `ids`.
    async fn fetch_dogs(&self, ids: &[String]) -> Result<Vec<Dog>, ApiError>;

    async fn search_locations(
        &self,
        request: &LocationSearchRequest,
    ) -> Result<LocationSearchResponse, ApiError>;

    async fn match_dogs(&self, ids: &[String]) -> Result<MatchResponse, ApiError>;
}

/// reqwest-backed client for the dog search API
///
/// The session credential is whatever cookies `/auth/login` sets; they are
/// replayed on every later request until logout.
pub struct FetchClient {
    base_url: String,
    client: Client,
    credential: RwLock<Option<String>>,
}

impl FetchClient {
    /// Create a new API client
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credential: RwLock::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.credential.read().await.as_deref() {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = self.authorized(builder).await.send().await?;

        if !response.status().is_success() {
            let error = ApiError::from_response(response).await;
            tracing::error!("Search API request failed: {}", error);
            return Err(error);
        }

        Ok(response)
    }

    /// Whether a session credential is currently held
    pub async fn has_credential(&self) -> bool {
        self.credential.read().await.is_some()
    }
}

/// Collapse `Set-Cookie` headers into a single `Cookie` header value
fn collect_cookies(response: &Response) -> Option<String> {
    let cookies: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();

    if cookies.is_empty() {
        None
    } else {
        Some(cookies.join("; "))
    }
}

#[async_trait]
impl DogApi for FetchClient {
    async fn login(&self, name: &str, email: &str) -> Result<(), ApiError> {
        let url = self.url("/auth/login");
        tracing::debug!("Logging in at: {}", url);

        let response = self
            .send(
                self.client
                    .post(&url)
                    .json(&serde_json::json!({ "name": name, "email": email })),
            )
            .await?;

        let cookies = collect_cookies(&response);
        if cookies.is_none() {
            tracing::warn!("Login succeeded without a session cookie");
        }
        *self.credential.write().await = cookies;

        Ok(())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let url = self.url("/auth/logout");
        let result = self.send(self.client.post(&url)).await.map(|_| ());

        // The credential is forgotten even when the server call fails
        *self.credential.write().await = None;

        result
    }

    async fn fetch_breeds(&self) -> Result<Vec<String>, ApiError> {
        let url = self.url("/dogs/breeds");
        let response = self.send(self.client.get(&url)).await?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse breeds: {}", e)))
    }

    async fn search(&self, request: &PageRequest) -> Result<SearchResponse, ApiError> {
        let builder = match request {
            PageRequest::Fresh(query) => {
                let url = self.url("/dogs/search");
                tracing::debug!("Searching dogs: {} {:?}", url, query);
                self.client.get(&url).query(&query.to_pairs())
            }
            PageRequest::Cursor(cursor) => {
                let url = self.url(cursor.as_str());
                tracing::debug!("Following search cursor: {}", url);
                self.client.get(&url)
            }
        };

        let response = self.send(builder).await?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse search results: {}", e)))
    }

    async fn fetch_dogs(&self, ids: &[String]) -> Result<Vec<Dog>, ApiError> {
        let url = self.url("/dogs");
        let response = self.send(self.client.post(&url).json(ids)).await?;

        let dogs: Vec<Dog> = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse dogs: {}", e)))?;

        tracing::debug!("Fetched {} of {} requested dogs", dogs.len(), ids.len());
        Ok(dogs)
    }

    async fn search_locations(
        &self,
        request: &LocationSearchRequest,
    ) -> Result<LocationSearchResponse, ApiError> {
        let url = self.url("/locations/search");
        let response = self.send(self.client.post(&url).json(request)).await?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse locations: {}", e)))
    }

    async fn match_dogs(&self, ids: &[String]) -> Result<MatchResponse, ApiError> {
        let url = self.url("/dogs/match");
        let response = self.send(self.client.post(&url).json(ids)).await?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse match: {}", e)))
    }
}
