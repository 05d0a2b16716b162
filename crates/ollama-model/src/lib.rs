//! A model provider for a local Ollama server.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, StatusCode, header};
use strandline_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};

pub use config::{
    DEFAULT_HOST, DEFAULT_MODEL, OllamaConfig, OllamaConfigBuilder,
};
use io::{Chunks, Lines};
pub use response::OllamaResponse;

/// Error type for [`OllamaProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ollama: {}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Ollama model provider, talking to `/api/chat` with streaming enabled.
#[derive(Clone, Debug)]
pub struct OllamaProvider {
    client: Client,
    config: Arc<OllamaConfig>,
}

impl OllamaProvider {
    /// Creates a new `OllamaProvider` with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                Error::new(
                    format!("failed to build http client: {err}"),
                    ErrorKind::Misconfigured,
                )
            })?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Creates a provider configured from `OLLAMA_HOST` and `OLLAMA_MODEL`.
    #[inline]
    pub fn from_env() -> Result<Self, Error> {
        Self::new(OllamaConfigBuilder::from_env().build())
    }

    /// Returns the configuration of this provider.
    #[inline]
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }
}

impl ModelProvider for OllamaProvider {
    type Error = Error;
    type Response = OllamaResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let chat_req = proto::create_request(req, &self.config);
        let url = format!("{}/api/chat", self.config.host);
        debug!("sending chat request to {url} (model: {})", self.config.model);
        let resp_fut = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/x-ndjson")
            .json(&chat_req)
            .send();
        let host = self.config.host.clone();

        async move {
            let resp = resp_fut.await.map_err(|err| {
                if err.is_connect() || err.is_timeout() {
                    Error::new(
                        format!("cannot reach {host}, is `ollama serve` running? ({err})"),
                        ErrorKind::Network,
                    )
                } else {
                    Error::new(format!("{err}"), ErrorKind::Other)
                }
            })?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(status_error(status, &body));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned);
            let is_valid_content_type = content_type
                .as_deref()
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| {
                    m.subtype() == mime::JSON || m.subtype() == "x-ndjson"
                })
                .unwrap_or(false);
            if !is_valid_content_type {
                return Err(Error::new(
                    format!("unexpected content type: {content_type:?}"),
                    ErrorKind::MalformedResponse,
                ));
            }

            let lines = Lines::new(Chunks::from_response(resp));
            Ok(OllamaResponse::from_lines(lines))
        }
    }
}

fn status_error(status: StatusCode, body: &str) -> Error {
    // Ollama reports failures as `{"error": "..."}`.
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.as_str().map(ToOwned::to_owned))
        .unwrap_or_else(|| body.trim().to_owned());
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ErrorKind::Unauthorized
        }
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        // Unknown models are a setup problem rather than a model failure.
        StatusCode::NOT_FOUND => ErrorKind::Misconfigured,
        _ => ErrorKind::Other,
    };
    Error::new(format!("HTTP {status}: {detail}"), kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error() {
        let err = status_error(
            StatusCode::NOT_FOUND,
            r#"{"error":"model \"gemma3\" not found, try pulling it first"}"#,
        );
        assert_eq!(err.kind(), ErrorKind::Misconfigured);
        assert_eq!(
            err.to_string(),
            "ollama: HTTP 404 Not Found: model \"gemma3\" not found, try pulling it first"
        );

        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom\n");
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.message(), "HTTP 500 Internal Server Error: boom");
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let config = OllamaConfigBuilder::new()
            .with_host("http://127.0.0.1:1")
            .build();
        let provider = OllamaProvider::new(config).unwrap();
        let req = ModelRequest::with_prompt("Hi");
        let err = match provider.send_request(&req).await {
            Ok(_) => panic!("expected the request to fail"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
