//! A model provider for Anthropic models hosted on Amazon Bedrock.
//!
//! Besides the [`ModelProvider`] implementation used by agents, the crate
//! exposes [`invoke_bedrock`], a one-shot call that turns a prompt into the
//! first block of generated text. It never panics: every failure, including
//! missing configuration, comes back as an [`Error`] whose display starts
//! with `An error occurred:`.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;
mod transport;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use bytes::Bytes;
use reqwest::Url;
use strandline_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};
use tracing::Instrument;

pub use config::{BedrockConfig, BedrockConfigBuilder, DEFAULT_REGION};
pub use proto::{ANTHROPIC_VERSION, MAX_TOKENS};
use proto::{InvokeModelRequest, InvokeModelResponse};
pub use response::BedrockResponse;
use transport::Transport;

/// Error type for [`BedrockProvider`].
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

    /// Returns the error message without the display prefix.
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
        write!(f, "An error occurred: {}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Bedrock model provider.
#[derive(Clone)]
pub struct BedrockProvider {
    transport: Transport,
    config: Arc<BedrockConfig>,
}

impl BedrockProvider {
    /// Creates a new `BedrockProvider` with the given configuration.
    #[inline]
    pub fn new(config: BedrockConfig) -> Self {
        Self {
            transport: Transport::http(),
            config: Arc::new(config),
        }
    }

    /// Creates a provider configured from the process environment.
    ///
    /// See [`BedrockConfigBuilder::from_env`].
    #[inline]
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::new(BedrockConfigBuilder::from_env()?.build()))
    }

    #[cfg(test)]
    fn with_transport(config: BedrockConfig, transport: Transport) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Returns the configuration of this provider.
    #[inline]
    pub fn config(&self) -> &BedrockConfig {
        &self.config
    }

    /// Sends a single prompt and returns the text of the first content
    /// block in the response.
    pub fn invoke(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send + 'static {
        let body = proto::create_prompt_body(prompt);
        let resp_fut = self.invoke_model(&body);
        async move {
            let resp = resp_fut.await?;
            proto::first_text(&resp).map(ToOwned::to_owned)
        }
        .instrument(debug_span!("bedrock invoke"))
    }

    fn invoke_model(
        &self,
        body: &InvokeModelRequest,
    ) -> impl Future<Output = Result<InvokeModelResponse, Error>>
    + Send
    + 'static
    + use<> {
        let prepared = serde_json::to_vec(body)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))
            .and_then(|body| Ok((self.invoke_url()?, Bytes::from(body))));
        let transport = self.transport.clone();
        let api_key = self.config.api_key.clone();

        async move {
            let (url, body) = prepared?;
            trace!("invoking {url}");
            let resp_body = transport.post_json(url, api_key, body).await?;
            serde_json::from_slice::<InvokeModelResponse>(&resp_body).map_err(
                |err| {
                    Error::new(
                        format!("malformed response body: {err}"),
                        ErrorKind::MalformedResponse,
                    )
                },
            )
        }
    }

    fn invoke_url(&self) -> Result<Url, Error> {
        let misconfigured = |what: String| {
            Error::new(
                format!("invalid endpoint `{}`: {what}", self.config.endpoint),
                ErrorKind::Misconfigured,
            )
        };
        let mut url = Url::parse(&self.config.endpoint)
            .map_err(|err| misconfigured(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| misconfigured("cannot be a base".to_owned()))?
            .pop_if_empty()
            // ARNs contain `/`, which is escaped as part of the segment.
            .extend(["model", self.config.model_id.as_str(), "invoke"]);
        Ok(url)
    }
}

impl fmt::Debug for BedrockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BedrockProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ModelProvider for BedrockProvider {
    type Error = Error;
    type Response = BedrockResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let resp_fut = self.invoke_model(&proto::create_request(req));
        async move { resp_fut.await.map(BedrockResponse::from_body) }
    }
}

/// Sends `prompt` to the model named by `MODEL_ARN` and returns the
/// generated text.
///
/// Configuration is read from the environment on every call; see
/// [`BedrockConfigBuilder::from_env`].
pub async fn invoke_bedrock(prompt: &str) -> Result<String, Error> {
    let provider = BedrockProvider::from_env()?;
    provider.invoke(prompt).await.inspect_err(|err| {
        warn!("bedrock invocation failed: {}", err.message());
    })
}
