use std::collections::BTreeMap;

use strandline_model::{ModelTool, ToolCallRequest, ToolCallResult};
use tracing::Instrument;

use crate::tool::{Error, ToolObject};

/// Runs tool call requests from the model against the registered tools.
pub struct Executor {
    // Ordered by name so that tool definitions are stable across requests.
    tools: BTreeMap<String, Box<dyn ToolObject>>,
}

impl Executor {
    pub fn with_tools(tools: Vec<Box<dyn ToolObject>>) -> Self {
        let mut tool_map = BTreeMap::new();
        for tool in tools {
            let name = tool.name().to_owned();
            if tool_map.insert(name.clone(), tool).is_some() {
                warn!("tool `{name}` registered twice, keeping the last one");
            }
        }
        Self { tools: tool_map }
    }

    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .values()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Runs one request to completion.
    ///
    /// Failures, including unknown tools, become error results addressed
    /// to the model rather than errors of the caller.
    pub async fn run(&self, req: ToolCallRequest) -> ToolCallResult {
        let ToolCallRequest {
            id,
            name,
            arguments,
        } = req;

        let result = match self.tools.get(&name) {
            Some(tool) => {
                trace!("running tool `{name}` ({id}) with args: {arguments}");
                tool.execute(arguments)
                    .instrument(debug_span!("tool execute", tool = %name))
                    .await
            }
            None => {
                warn!("tool not found: {name}");
                Err(Error::not_found()
                    .with_reason(format!("no tool named `{name}`")))
            }
        };

        match result {
            Ok(content) => ToolCallResult {
                id,
                content,
                is_error: false,
            },
            Err(err) => {
                debug!("tool `{name}` ({id}) failed: {err}");
                ToolCallResult {
                    id,
                    content: err.to_string(),
                    is_error: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::{Value, json};

    use super::*;
    use crate::tool::{AnyTool, Tool, ToolResult};

    #[derive(Deserialize)]
    struct EchoInput {
        text: String,
    }

    struct EchoTool(Value);

    impl Tool for EchoTool {
        type Input = EchoInput;

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the text back"
        }

        fn parameter_schema(&self) -> &Value {
            &self.0
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            std::future::ready(if input.text.is_empty() {
                Err(Error::execution_error().with_reason("nothing to echo"))
            } else {
                Ok(input.text)
            })
        }
    }

    fn executor() -> Executor {
        let schema = json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        });
        Executor::with_tools(vec![Box::new(AnyTool(EchoTool(schema)))])
    }

    fn request(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_0".to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    #[test]
    fn test_definitions() {
        let definitions = executor().definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "echo");
        assert_eq!(definitions[0].parameters["required"], json!(["text"]));
    }

    #[tokio::test]
    async fn test_run() {
        let executor = executor();

        let result = executor
            .run(request("echo", json!({ "text": "hello" })))
            .await;
        assert_eq!(result.id, "call_0");
        assert_eq!(result.content, "hello");
        assert!(!result.is_error);

        let result = executor.run(request("echo", json!({ "text": "" }))).await;
        assert!(result.is_error);
        assert_eq!(result.content, "Execution error: nothing to echo");

        let result = executor.run(request("echo", json!({ "txt": 1 }))).await;
        assert!(result.is_error);
        assert!(result.content.starts_with("Invalid input: "));

        let result = executor.run(request("weather", json!({}))).await;
        assert!(result.is_error);
        assert_eq!(result.content, "Tool not found: no tool named `weather`");
    }
}
