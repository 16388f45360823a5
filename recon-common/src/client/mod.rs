//! Lattice REST clients
//!
//! [`LatticeHttp`] carries the authenticated `reqwest::Client` and the API
//! root; [`EntityClient`] and [`TaskClient`] wrap the entity and task
//! endpoints on top of it. Both clients are cheap to clone.

mod entities;
mod tasks;

pub use entities::EntityClient;
pub use tasks::TaskClient;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use crate::config::LatticeEndpoint;
use crate::{Error, Result};

const USER_AGENT: &str = concat!("auto-reconnaissance/", env!("CARGO_PKG_VERSION"));
const SANDBOX_AUTH_HEADER: &str = "anduril-sandbox-authorization";

/// Authenticated HTTP transport shared by the entity and task clients
#[derive(Clone)]
pub struct LatticeHttp {
    http: reqwest::Client,
    api_root: Url,
}

impl LatticeHttp {
    pub fn new(endpoint: &LatticeEndpoint) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer_header(&endpoint.bearer_token)?);
        if let Some(sandbox_token) = &endpoint.sandbox_token {
            headers.insert(
                HeaderName::from_static(SANDBOX_AUTH_HEADER),
                bearer_header(sandbox_token)?,
            );
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(endpoint.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        let api_root = Url::parse(&endpoint.api_root())
            .map_err(|e| Error::Config(format!("invalid lattice_url: {}", e)))?;
        if api_root.cannot_be_a_base() {
            return Err(Error::Config(format!("invalid lattice_url: {}", api_root)));
        }

        Ok(Self { http, api_root })
    }

    /// API root joined with percent-encoded path segments
    pub fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_root.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("invalid lattice_url: {}", self.api_root)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.http.get(url)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.http.post(url)
    }

    pub fn put(&self, url: Url) -> RequestBuilder {
        self.http.put(url)
    }

    /// Send and map non-2xx responses to [`Error::Api`]
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Send and decode a JSON body
    pub async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.execute(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// Send and decode a JSON body; an empty body yields `T::default()`
    pub async fn execute_json_or_default<T: DeserializeOwned + Default>(
        &self,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.execute(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&body).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Send and discard the response body
    pub async fn execute_empty(&self, request: RequestBuilder) -> Result<()> {
        self.execute(request).await.map(|_| ())
    }
}

fn bearer_header(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| Error::Config(format!("token is not a valid header value: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(base_url: &str) -> LatticeEndpoint {
        LatticeEndpoint {
            base_url: base_url.to_string(),
            bearer_token: "tok".to_string(),
            sandbox_token: Some("sandbox".to_string()),
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_url_joins_and_encodes_segments() {
        let http = LatticeHttp::new(&endpoint("https://lattice.example")).unwrap();

        let url = http.url(&["entities", "track 01", "override", "mil_view.disposition"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://lattice.example/api/v1/entities/track%2001/override/mil_view.disposition"
        );

        let url = http.url(&["tasks", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "https://lattice.example/api/v1/tasks/a%2Fb");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let mut bad = endpoint("https://lattice.example");
        bad.bearer_token = "line\nbreak".to_string();
        assert!(matches!(LatticeHttp::new(&bad), Err(Error::Config(_))));
    }
}
