use crate::core::config::FetchConfig;
use crate::core::error::GenerationError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Source of raw HTML for a URL.
///
/// The pipeline only talks to this seam, so tests and embedders can serve
/// pages from memory instead of the network.
#[async_trait]
pub trait HtmlFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, GenerationError>;
}

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Get a random browser user agent string
pub fn get_random_user_agent() -> &'static str {
    use rand::prelude::*;
    let mut rng = rand::rng();
    let index = rng.random_range(0..USER_AGENTS.len());
    USER_AGENTS[index]
}

/// Plain HTTP GET fetcher backed by reqwest.
pub struct HttpFetcher {
    client: Client,
    user_agent: Option<String>,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| GenerationError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            user_agent: None,
        }
    }
}

#[async_trait]
impl HtmlFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, GenerationError> {
        let user_agent = self
            .user_agent
            .as_deref()
            .unwrap_or_else(|| get_random_user_agent());

        let response = self
            .client
            .get(url)
            .header("User-Agent", user_agent)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();
        if !(content_type.contains("html") || content_type.contains("xml") || content_type.contains("text/plain")) {
            return Err(GenerationError::Parse(format!(
                "unsupported content type '{}'",
                content_type
            )));
        }

        let html = response.text().await?;
        debug!("fetched {} ({} bytes, HTTP {})", url, html.len(), status.as_u16());
        Ok(html)
    }
}

/// In-memory fetcher serving fixed pages. URLs without a page yield the
/// configured error (HTTP 404 by default).
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, Result<String, GenerationError>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), Ok(html.into()));
        self
    }

    pub fn with_error(mut self, url: impl Into<String>, error: GenerationError) -> Self {
        self.pages.insert(url.into(), Err(error));
        self
    }
}

#[async_trait]
impl HtmlFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, GenerationError> {
        self.pages
            .get(url)
            .cloned()
            .unwrap_or(Err(GenerationError::HttpStatus { status: 404 }))
    }
}
