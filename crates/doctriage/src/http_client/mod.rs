//! HTTP client shared by the provider backends.

mod response;

pub use response::HttpResponse;

use std::time::{Duration, Instant};

use reqwest::multipart::Form;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const USER_AGENT: &str = concat!("doctriage/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to create HTTP client: {0}")]
    Build(String),
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        // Request URLs can carry API keys in the query string.
        let decode = e.is_decode();
        let message = redact_key(&e.without_url().to_string());
        if decode {
            Self::Decode(message)
        } else {
            Self::Transport(message)
        }
    }
}

/// HTTP client with a fixed timeout and a service name for logging.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    service: String,
}

impl HttpClient {
    /// Create a client for the named service.
    pub fn new(service: &str, timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            client,
            service: service.to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// POST a JSON body with extra headers.
    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        json: &T,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        let mut request = self.client.post(url).json(json);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request, "POST", url).await
    }

    /// POST a multipart form.
    pub async fn post_multipart(
        &self,
        url: &str,
        form: Form,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        let mut request = self.client.post(url).multipart(form);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request, "POST", url).await
    }

    /// GET with extra headers.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, HttpError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request, "GET", url).await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
        url: &str,
    ) -> Result<HttpResponse, HttpError> {
        let start = Instant::now();
        let response = request.send().await?;
        debug!(
            "{} {} {} -> {} in {:?}",
            self.service,
            method,
            redact_key(url),
            response.status().as_u16(),
            start.elapsed()
        );
        Ok(HttpResponse::from_reqwest(response))
    }
}

/// Strip a `key=` query parameter before logging a URL.
pub fn redact_key(url: &str) -> String {
    match url.find("key=") {
        Some(pos) => {
            let rest = &url[pos + 4..];
            let end = rest.find('&').map(|i| pos + 4 + i).unwrap_or(url.len());
            format!("{}key=***{}", &url[..pos], &url[end..])
        }
        None => url.to_string(),
    }
}
