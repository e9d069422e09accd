use std::fmt;

use async_trait::async_trait;

use crate::config::ApiConfig;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_owned(), value.to_string()));
        self
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response; status classification happens in the API layer because
/// error bodies carry structured payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[derive(Clone)]
pub struct ReqwestHttpTransport {
    base_url: String,
    api_token: String,
    client: reqwest::Client,
}

impl fmt::Debug for ReqwestHttpTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReqwestHttpTransport")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("client", &self.client)
            .finish()
    }
}

impl ReqwestHttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|err| {
                ApiError::Transport(format!("failed to initialize packing HTTP client: {err}"))
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_token: config.api_token.clone(),
            client,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let url = self.url_for(&request.path);
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        let mut builder = builder
            .bearer_auth(&self.api_token)
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            ApiError::Transport(format!("failed to call {}: {err}", request.path))
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| {
            ApiError::Transport(format!(
                "failed to read response from {}: {err}",
                request.path
            ))
        })?;

        Ok(HttpResponse { status, body })
    }
}

pub(crate) fn truncate_for_error(body: &str) -> String {
    const MAX_LEN: usize = 200;
    if body.chars().count() <= MAX_LEN {
        body.to_owned()
    } else {
        format!("{}...", body.chars().take(MAX_LEN).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::{truncate_for_error, HttpRequest, ReqwestHttpTransport};
    use crate::config::ApiConfig;

    #[test]
    fn truncate_for_error_caps_long_bodies() {
        let body = "x".repeat(250);
        let truncated = truncate_for_error(&body);
        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_for_error("short"), "short");
    }

    #[test]
    fn urls_join_without_duplicate_slashes() {
        let transport = ReqwestHttpTransport::new(&ApiConfig {
            base_url: "https://desk.example.com/".to_owned(),
            api_token: "token".to_owned(),
            ..ApiConfig::default()
        })
        .expect("build transport");

        assert_eq!(
            transport.url_for("/api/packing/postings"),
            "https://desk.example.com/api/packing/postings"
        );
        assert!(!format!("{transport:?}").contains("\"token\""));
    }

    #[test]
    fn params_are_kept_in_insertion_order() {
        let request = HttpRequest::get("/x").param("offset", 24).param("limit", 12);
        assert_eq!(request.query_value("offset"), Some("24"));
        assert_eq!(
            request.query,
            vec![
                ("offset".to_owned(), "24".to_owned()),
                ("limit".to_owned(), "12".to_owned())
            ]
        );
    }
}
