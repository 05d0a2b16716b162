use std::env;
use std::fmt::Debug;
use std::time::Duration;

/// Host of a default local Ollama install.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemma3";

/// Builder for [`OllamaConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OllamaConfigBuilder {
    host: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
}

impl OllamaConfigBuilder {
    /// Creates a builder with every value at its default.
    #[inline]
    pub fn new() -> Self {
        Self {
            host: None,
            model: None,
            timeout: None,
        }
    }

    /// Creates a builder seeded from `OLLAMA_HOST` and `OLLAMA_MODEL`.
    ///
    /// Unset or empty variables fall back to the defaults. Explicit
    /// `with_*` calls made afterwards take precedence.
    pub fn from_env() -> Self {
        let var = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            host: var("OLLAMA_HOST"),
            model: var("OLLAMA_MODEL"),
            timeout: None,
        }
    }

    /// Sets the server host, e.g. `http://localhost:11434`.
    #[inline]
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the timeout for a whole chat request.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OllamaConfig {
        let mut host = self.host.unwrap_or_else(|| DEFAULT_HOST.to_owned());
        if !host.contains("://") {
            // `OLLAMA_HOST` is commonly given as `host:port`.
            host.insert_str(0, "http://");
        }
        OllamaConfig {
            host: host.trim_end_matches('/').to_owned(),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            // Local models may need a while to load on first use.
            timeout: self.timeout.unwrap_or(Duration::from_secs(300)),
        }
    }
}

impl Default for OllamaConfigBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the Ollama provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OllamaConfig {
    pub(crate) host: String,
    pub(crate) model: String,
    pub(crate) timeout: Duration,
}

impl OllamaConfig {
    /// Returns the server host.
    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the model name.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OllamaConfigBuilder::new().build();
        assert_eq!(config.host(), "http://localhost:11434");
        assert_eq!(config.model(), "gemma3");
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_bare_host() {
        let config = OllamaConfigBuilder::new()
            .with_host("10.0.0.2:11434/")
            .with_model("llama3.2")
            .build();
        assert_eq!(config.host(), "http://10.0.0.2:11434");
        assert_eq!(config.model(), "llama3.2");
    }
}
