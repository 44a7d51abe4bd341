// src/http.rs
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error for '{context}': {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("{service} rate limit exceeded (Status 429)")]
    RateLimitExceeded { service: &'static str },

    // Non-429 API errors; the body is kept for diagnosis.
    #[error("{service} API error: Status={status}, Body='{body}'")]
    ApiError {
        service: &'static str,
        status: StatusCode,
        body: String,
    },
}

/// Decoded body plus the response headers (pagination lives in `Link`).
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub data: T,
    pub headers: HeaderMap,
}

/// Bearer-token JSON client shared by the SmartHR and KING OF TIME wrappers.
#[derive(Clone)]
pub struct ApiClient {
    service: &'static str,
    http_client: Client,
    token: String,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("service", &self.service)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ApiClient {
    pub fn new(service: &'static str, token: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            service,
            http_client,
            token: token.trim().to_string(),
        })
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/json")
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        context_msg: &str,
    ) -> Result<ApiResponse<T>, ClientError> {
        self.send_and_deserialize(self.request(Method::GET, url), context_msg)
            .await
    }

    pub async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<ApiResponse<T>, ClientError> {
        let request = request_builder.build().map_err(|e| {
            error!("Request build failed for '{}': {}", context_msg, e);
            ClientError::Request(e)
        })?;
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to URL: {}", context_msg, request_url);

        let resp = self.http_client.execute(request).await.map_err(|e| {
            // Network, DNS, timeout: nothing came back.
            error!(
                "HTTP execution failed before receiving response for '{}' (URL: {}): {}",
                context_msg, request_url, e
            );
            ClientError::Request(e)
        })?;

        let status = resp.status();
        info!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );

        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            error!(
                "{} API Error Response: Status={}, Body='{}' for URL: {}",
                self.service, status, body, request_url
            );
            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!("Rate limit exceeded for '{}' (URL: {})", context_msg, request_url);
                return Err(ClientError::RateLimitExceeded {
                    service: self.service,
                });
            }
            return Err(ClientError::ApiError {
                service: self.service,
                status,
                body,
            });
        }

        let headers = resp.headers().clone();
        let bytes = resp.bytes().await?;
        let data = serde_json::from_slice::<T>(&bytes).map_err(|e| {
            error!(
                "JSON deserialization failed for '{}' (URL: {}): {}",
                context_msg, request_url, e
            );
            ClientError::Json {
                context: context_msg.to_string(),
                source: e,
            }
        })?;
        debug!("Successfully deserialized response for '{}'", context_msg);

        Ok(ApiResponse { data, headers })
    }
}
