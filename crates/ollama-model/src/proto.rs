use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strandline_model::{ModelMessage, ModelRequest, ModelTool};

use crate::OllamaConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCall {
    /// Ollama does not identify tool calls, so ids are assigned locally and
    /// kept out of the wire format.
    #[serde(default, skip_serializing)]
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatChunk {
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
    pub done_reason: Option<String>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChunkMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    stream: bool,
}

// -----------
// Conversions
// -----------

pub fn create_request(req: &ModelRequest, config: &OllamaConfig) -> ChatRequest {
    // Tool results only carry the call id, but Ollama wants the tool name.
    // Both are known from the assistant messages earlier in the history.
    let mut tool_names: HashMap<&str, &str> = HashMap::new();
    let mut messages = Vec::with_capacity(req.messages.len());

    for msg in &req.messages {
        let msg = match msg {
            ModelMessage::System(content) => Message::System {
                content: content.clone(),
            },
            ModelMessage::User(content) => Message::User {
                content: content.clone(),
            },
            ModelMessage::Assistant(content) => Message::Assistant {
                content: content.clone(),
                tool_calls: vec![],
            },
            ModelMessage::Tool(result) => Message::Tool {
                content: result.content.clone(),
                tool_name: tool_names
                    .get(result.id.as_str())
                    .map(|name| name.to_string()),
            },
            ModelMessage::Opaque(opaque) => {
                let Some(msg) = opaque.to_raw::<Message>() else {
                    warn!("skipping foreign opaque message {}", opaque.id());
                    continue;
                };
                if let Message::Assistant { tool_calls, .. } = msg {
                    for call in tool_calls {
                        tool_names.insert(&call.id, &call.function.name);
                    }
                }
                msg.clone()
            }
        };
        messages.push(msg);
    }

    ChatRequest {
        model: config.model.clone(),
        messages,
        tools: req.tools.iter().map(create_tool).collect(),
        stream: true,
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use strandline_model::{OpaqueMessage, ToolCallResult};

    use super::*;
    use crate::OllamaConfigBuilder;

    #[test]
    fn test_create_request() {
        let assistant = Message::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_0".to_owned(),
                function: FunctionCall {
                    name: "current_time".to_owned(),
                    arguments: json!({}),
                },
            }],
        };
        let request = ModelRequest {
            messages: vec![
                ModelMessage::System("You are a helpful assistant.".to_owned()),
                ModelMessage::User("What time is it?".to_owned()),
                ModelMessage::Opaque(OpaqueMessage::new("ollama-msg-1", assistant)),
                ModelMessage::Tool(ToolCallResult {
                    id: "call_0".to_owned(),
                    content: "2025-06-01T12:00:00+00:00".to_owned(),
                    is_error: false,
                }),
            ],
            tools: vec![ModelTool {
                name: "current_time".to_owned(),
                description: "Returns the current time.".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
        };
        let config = OllamaConfigBuilder::new().build();
        let value = serde_json::to_value(create_request(&request, &config)).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gemma3",
                "messages": [
                    { "role": "system", "content": "You are a helpful assistant." },
                    { "role": "user", "content": "What time is it?" },
                    {
                        "role": "assistant",
                        "content": "",
                        "tool_calls": [{
                            "function": { "name": "current_time", "arguments": {} }
                        }]
                    },
                    {
                        "role": "tool",
                        "content": "2025-06-01T12:00:00+00:00",
                        "tool_name": "current_time"
                    }
                ],
                "tools": [{
                    "type": "function",
                    "function": {
                        "name": "current_time",
                        "description": "Returns the current time.",
                        "parameters": { "type": "object" }
                    }
                }],
                "stream": true
            })
        );
    }

    #[test]
    fn test_parse_chunk() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"model":"gemma3","created_at":"2025-06-01T12:00:00Z","message":{"role":"assistant","content":"Hi"},"done":false}"#,
        )
        .unwrap();
        assert_eq!(chunk.message.unwrap().content, "Hi");
        assert!(!chunk.done);

        let chunk: ChatChunk =
            serde_json::from_str(r#"{"error":"model \"nope\" not found"}"#).unwrap();
        assert!(chunk.message.is_none());
        assert_eq!(chunk.error.as_deref(), Some("model \"nope\" not found"));
    }
}
