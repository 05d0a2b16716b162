use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use strandline_bedrock_model::{BedrockProvider, invoke_bedrock};
use strandline_core::tool::{Error as ToolError, Tool, ToolResult};

/// Parameters of [`InvokeBedrockTool`].
#[derive(Deserialize, JsonSchema)]
pub struct InvokeBedrockParameters {
    /// Prompt sent as the single user message.
    #[schemars(description = "The prompt to send to the Bedrock model.")]
    pub prompt: String,
}

/// A tool that forwards a prompt to a model hosted on Amazon Bedrock.
///
/// Without an explicit provider the model and credentials are read from
/// the environment on every call (see
/// [`invoke_bedrock`](strandline_bedrock_model::invoke_bedrock)).
pub struct InvokeBedrockTool {
    provider: Option<BedrockProvider>,
    parameter_schema: Value,
}

impl InvokeBedrockTool {
    /// Creates a new tool configured from the environment.
    #[inline]
    pub fn new() -> Self {
        InvokeBedrockTool {
            provider: None,
            parameter_schema: schema_for!(InvokeBedrockParameters).to_value(),
        }
    }

    /// Creates a new tool sending prompts through `provider`.
    #[inline]
    pub fn with_provider(provider: BedrockProvider) -> Self {
        InvokeBedrockTool {
            provider: Some(provider),
            ..Self::new()
        }
    }
}

impl Default for InvokeBedrockTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for InvokeBedrockTool {
    type Input = InvokeBedrockParameters;

    fn name(&self) -> &str {
        "invoke_bedrock"
    }

    fn description(&self) -> &str {
        "Sends a prompt to a Bedrock-hosted model and returns the generated text."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: InvokeBedrockParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let provider = self.provider.clone();
        async move {
            if input.prompt.trim().is_empty() {
                return Err(
                    ToolError::invalid_input().with_reason("`prompt` is empty")
                );
            }
            let result = match provider {
                Some(provider) => provider.invoke(&input.prompt).await,
                None => invoke_bedrock(&input.prompt).await,
            };
            result.map_err(|err| {
                ToolError::execution_error().with_reason(err.to_string())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use strandline_bedrock_model::BedrockConfigBuilder;
    use strandline_core::tool::ErrorKind;

    use super::*;

    #[tokio::test]
    async fn test_empty_prompt() {
        let err = InvokeBedrockTool::new()
            .execute(InvokeBedrockParameters {
                prompt: "  ".to_owned(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let config = BedrockConfigBuilder::with_model_id("m")
            .with_api_key("k")
            .with_endpoint("http://127.0.0.1:1")
            .build();
        let tool = InvokeBedrockTool::with_provider(BedrockProvider::new(config));
        let err = tool
            .execute(InvokeBedrockParameters {
                prompt: "What is the square root of 1764?".to_owned(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert!(err.reason().starts_with("An error occurred:"));
    }
}
