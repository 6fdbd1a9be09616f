//! Shared HTTP plumbing for the upstream adapters: base-url joining,
//! default headers, auth strategies, and mapping of error-status bodies
//! into [`ProviderError`] values.

use crate::error::ProviderError;
use reqwest::{header::HeaderMap, Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Clone, Debug)]
pub enum AuthStrategy {
    Bearer { token: String },
    Header { name: String, value: String },
    None,
}

#[derive(Clone)]
pub struct HttpProviderClient {
    http: Client,
    base_url: String,
    default_headers: HeaderMap,
}

impl HttpProviderClient {
    pub fn new(
        timeout: Duration,
        base_url: Option<String>,
        default_base: &str,
        headers: &HashMap<String, String>,
        auth: AuthStrategy,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            ProviderError::Configuration {
                message: format!("failed to create HTTP client: {e}"),
            }
        })?;

        let mut default_headers = HeaderMap::new();

        match auth {
            AuthStrategy::Bearer { token } => {
                if let Ok(value) = format!("Bearer {token}").parse() {
                    default_headers.insert("Authorization", value);
                }
            }
            AuthStrategy::Header { name, value } => {
                if let (Ok(name), Ok(value)) =
                    (name.parse::<reqwest::header::HeaderName>(), value.parse())
                {
                    default_headers.insert(name, value);
                }
            }
            AuthStrategy::None => {}
        }

        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (k.parse::<reqwest::header::HeaderName>(), v.parse()) {
                default_headers.insert(name, value);
            }
        }

        let base_url = base_url.unwrap_or_else(|| default_base.to_string());

        Ok(Self {
            http,
            base_url,
            default_headers,
        })
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), path)
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), path)
        }
    }

    pub async fn post_json<TReq: Serialize, TResp: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TResp, ProviderError> {
        let resp = self
            .http
            .request(Method::POST, self.build_url(path))
            .headers(self.default_headers.clone())
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !resp.status().is_success() {
            return Err(map_error_response(resp).await);
        }
        resp.json::<TResp>()
            .await
            .map_err(|_| ProviderError::InvalidResponse)
    }

    /// POST without consuming the response, for SSE byte streams.
    pub async fn post_json_raw<TReq: Serialize>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<Response, ProviderError> {
        self.http
            .request(Method::POST, self.build_url(path))
            .headers(self.default_headers.clone())
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)
    }

    pub async fn get_json<TResp: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<TResp, ProviderError> {
        let resp = self
            .http
            .request(Method::GET, self.build_url(path))
            .headers(self.default_headers.clone())
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !resp.status().is_success() {
            return Err(map_error_response(resp).await);
        }
        resp.json::<TResp>()
            .await
            .map_err(|_| ProviderError::InvalidResponse)
    }
}

/// Timeouts get their own variant so the orchestrator and breaker see them
/// uniformly regardless of which layer produced them.
pub fn classify_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Http(e)
    }
}

/// Map a non-2xx response into a typed error, pulling a message from the
/// common `{"error": {"message": ...}}` body shape when present.
pub async fn map_error_response(resp: Response) -> ProviderError {
    let status = resp.status();
    match resp.text().await {
        Ok(body) => {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").cloned())
                .and_then(|e| e.get("message").cloned())
                .and_then(|m| m.as_str().map(|s| s.to_string()))
                .unwrap_or_else(|| body.clone());

            match status.as_u16() {
                401 | 403 => ProviderError::InvalidApiKey,
                404 => ProviderError::ModelNotFound {
                    model: "unknown".to_string(),
                },
                429 => ProviderError::RateLimited,
                503 => ProviderError::ServiceUnavailable,
                code => ProviderError::Api { code, message },
            }
        }
        Err(_) => ProviderError::Api {
            code: status.as_u16(),
            message: "failed to read error response".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joining_handles_slashes() {
        let client = HttpProviderClient::new(
            Duration::from_secs(1),
            Some("http://host/v1/".to_string()),
            "http://default",
            &HashMap::new(),
            AuthStrategy::None,
        )
        .unwrap();
        assert_eq!(client.build_url("/chat/completions"), "http://host/v1/chat/completions");
        assert_eq!(client.build_url("models"), "http://host/v1/models");
    }

    #[test]
    fn default_base_used_when_no_override() {
        let client = HttpProviderClient::new(
            Duration::from_secs(1),
            None,
            "https://api.example.com",
            &HashMap::new(),
            AuthStrategy::Bearer {
                token: "t".to_string(),
            },
        )
        .unwrap();
        assert_eq!(client.build_url("/x"), "https://api.example.com/x");
    }
}
