use serde::{Deserialize, Serialize};
use serde_json::Value;
use strandline_model::{ErrorKind, ModelMessage, ModelRequest, ModelTool};

use crate::Error;

/// Protocol version tag Bedrock expects for Anthropic models.
pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Token budget for every invocation.
pub const MAX_TOKENS: u32 = 1024;

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct InvokeModelRequest {
    anthropic_version: &'static str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InvokeModelResponse {
    pub id: Option<String>,
    pub content: Vec<ResponseBlock>,
    pub stop_reason: Option<String>,
}

/// A content block as returned by the model.
///
/// Fields are all optional: a block without `type` but with `text` is read
/// as a text block.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ResponseBlock {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub input: Option<Value>,
}

impl ResponseBlock {
    #[inline]
    fn is_tool_use(&self) -> bool {
        self.kind.as_deref() == Some("tool_use")
    }
}

// -----------
// Conversions
// -----------

/// Builds the body for a single prompt: one user message holding one text
/// block.
#[inline]
pub fn create_prompt_body(prompt: &str) -> InvokeModelRequest {
    create_request(&ModelRequest::with_prompt(prompt))
}

pub fn create_request(req: &ModelRequest) -> InvokeModelRequest {
    let mut system: Option<String> = None;
    let mut messages: Vec<Message> = vec![];

    for msg in &req.messages {
        match msg {
            ModelMessage::System(content) => {
                let system = system.get_or_insert_default();
                if !system.is_empty() {
                    system.push_str("\n\n");
                }
                system.push_str(content);
            }
            ModelMessage::User(text) => push_block(
                &mut messages,
                Role::User,
                ContentBlock::Text { text: text.clone() },
            ),
            ModelMessage::Assistant(text) => push_block(
                &mut messages,
                Role::Assistant,
                ContentBlock::Text { text: text.clone() },
            ),
            ModelMessage::Tool(result) => push_block(
                &mut messages,
                Role::User,
                ContentBlock::ToolResult {
                    tool_use_id: result.id.clone(),
                    content: result.content.clone(),
                    is_error: result.is_error,
                },
            ),
            ModelMessage::Opaque(opaque) => {
                // Opaque messages from this provider always hold `Message`.
                let Some(msg) = opaque.to_raw::<Message>() else {
                    warn!("skipping foreign opaque message {}", opaque.id());
                    continue;
                };
                for block in &msg.content {
                    push_block(&mut messages, msg.role, block.clone());
                }
            }
        }
    }

    InvokeModelRequest {
        anthropic_version: ANTHROPIC_VERSION,
        max_tokens: MAX_TOKENS,
        system,
        messages,
        tools: req.tools.iter().map(create_tool).collect(),
    }
}

/// Appends a block, merging into the last message when the role matches so
/// that roles keep alternating.
fn push_block(messages: &mut Vec<Message>, role: Role, block: ContentBlock) {
    match messages.last_mut() {
        Some(last) if last.role == role => last.content.push(block),
        _ => messages.push(Message {
            role,
            content: vec![block],
        }),
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: tool.parameters.clone(),
    }
}

/// Returns the text of the first content block.
pub fn first_text(resp: &InvokeModelResponse) -> Result<&str, Error> {
    let Some(block) = resp.content.first() else {
        return Err(Error::new(
            "response contains no content blocks",
            ErrorKind::MalformedResponse,
        ));
    };
    block.text.as_deref().ok_or_else(|| {
        Error::new(
            "first content block has no text",
            ErrorKind::MalformedResponse,
        )
    })
}

/// Rebuilds the assistant message from a response, for history replay.
pub fn assistant_message(resp: &InvokeModelResponse) -> Message {
    let content = resp
        .content
        .iter()
        .filter_map(|block| {
            if block.is_tool_use() {
                return Some(ContentBlock::ToolUse {
                    id: block.id.clone().unwrap_or_default(),
                    name: block.name.clone().unwrap_or_default(),
                    input: block
                        .input
                        .clone()
                        .unwrap_or_else(|| Value::Object(Default::default())),
                });
            }
            block
                .text
                .as_ref()
                .map(|text| ContentBlock::Text { text: text.clone() })
        })
        .collect();
    Message {
        role: Role::Assistant,
        content,
    }
}
