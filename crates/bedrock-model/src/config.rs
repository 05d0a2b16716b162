use std::env;
use std::fmt::Debug;

use strandline_model::ErrorKind;

use crate::Error;

/// Region used when neither the builder nor `AWS_REGION` names one.
pub const DEFAULT_REGION: &str = "us-east-2";

/// Builder for [`BedrockConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BedrockConfigBuilder {
    model_id: String,
    region: Option<String>,
    api_key: Option<String>,
    endpoint: Option<String>,
}

impl BedrockConfigBuilder {
    /// Creates a builder for the given model id or inference profile ARN.
    #[inline]
    pub fn with_model_id<S: Into<String>>(model_id: S) -> Self {
        Self {
            model_id: model_id.into(),
            region: None,
            api_key: None,
            endpoint: None,
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// - `MODEL_ARN`: model id or ARN, required.
    /// - `AWS_REGION`: region, defaults to [`DEFAULT_REGION`].
    /// - `AWS_BEARER_TOKEN_BEDROCK`: Bedrock API key, required.
    #[inline]
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), with a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let Some(model_id) = non_empty("MODEL_ARN") else {
            return Err(Error::new(
                "MODEL_ARN is not set",
                ErrorKind::Misconfigured,
            ));
        };
        let Some(api_key) = non_empty("AWS_BEARER_TOKEN_BEDROCK") else {
            return Err(Error::new(
                "AWS_BEARER_TOKEN_BEDROCK is not set",
                ErrorKind::Misconfigured,
            ));
        };

        let mut builder = Self::with_model_id(model_id).with_api_key(api_key);
        if let Some(region) = non_empty("AWS_REGION") {
            builder = builder.with_region(region);
        }
        Ok(builder)
    }

    /// Sets the region.
    #[inline]
    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the Bedrock API key sent as a bearer token.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the runtime endpoint, e.g. for a VPC endpoint.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> BedrockConfig {
        let region = self.region.unwrap_or_else(|| DEFAULT_REGION.to_owned());
        let endpoint = self.endpoint.unwrap_or_else(|| {
            format!("https://bedrock-runtime.{region}.amazonaws.com")
        });
        BedrockConfig {
            model_id: self.model_id,
            region,
            api_key: self.api_key,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
        }
    }
}

impl Debug for BedrockConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockConfigBuilder")
            .field("model_id", &self.model_id)
            .field("region", &self.region)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Configuration for the Bedrock provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BedrockConfig {
    pub(crate) model_id: String,
    pub(crate) region: String,
    pub(crate) api_key: Option<String>,
    pub(crate) endpoint: String,
}

impl BedrockConfig {
    /// Returns the model id or ARN requests are sent to.
    #[inline]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns the region.
    #[inline]
    pub fn region(&self) -> &str {
        &self.region
    }
}

impl Debug for BedrockConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockConfig")
            .field("model_id", &self.model_id)
            .field("region", &self.region)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_in(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup() {
        let config = BedrockConfigBuilder::from_lookup(lookup_in(&[
            ("MODEL_ARN", "anthropic.claude-3-haiku-20240307-v1:0"),
            ("AWS_BEARER_TOKEN_BEDROCK", "secret"),
        ]))
        .unwrap()
        .build();
        assert_eq!(config.model_id(), "anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(config.region(), "us-east-2");
        assert_eq!(
            config.endpoint,
            "https://bedrock-runtime.us-east-2.amazonaws.com"
        );
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_region_override() {
        let config = BedrockConfigBuilder::from_lookup(lookup_in(&[
            ("MODEL_ARN", "m"),
            ("AWS_BEARER_TOKEN_BEDROCK", "k"),
            ("AWS_REGION", "eu-west-1"),
        ]))
        .unwrap()
        .build();
        assert_eq!(
            config.endpoint,
            "https://bedrock-runtime.eu-west-1.amazonaws.com"
        );
    }

    #[test]
    fn test_missing_values() {
        let err = BedrockConfigBuilder::from_lookup(lookup_in(&[(
            "AWS_BEARER_TOKEN_BEDROCK",
            "k",
        )]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Misconfigured);
        assert_eq!(err.message(), "MODEL_ARN is not set");

        let err = BedrockConfigBuilder::from_lookup(lookup_in(&[
            ("MODEL_ARN", "m"),
            ("AWS_BEARER_TOKEN_BEDROCK", "  "),
        ]))
        .unwrap_err();
        assert_eq!(err.message(), "AWS_BEARER_TOKEN_BEDROCK is not set");
    }
}
