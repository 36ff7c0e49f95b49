//! HTTP response wrapper.

use reqwest::{Response, StatusCode};

use super::HttpError;

/// HTTP response wrapper.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    response: Response,
}

impl HttpResponse {
    pub(crate) fn from_reqwest(response: Response) -> Self {
        Self {
            status: response.status(),
            response,
        }
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response indicates rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Server-side failures worth retrying.
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Get response body as text.
    pub async fn text(self) -> Result<String, HttpError> {
        Ok(self.response.text().await?)
    }

    /// Deserialize response body as JSON.
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = self.response.text().await?;
        serde_json::from_str(&body).map_err(|e| HttpError::Decode(e.to_string()))
    }
}
