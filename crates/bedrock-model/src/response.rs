use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use serde_json::Value;
use strandline_model::{
    ModelFinishReason, ModelResponse, ModelResponseEvent, OpaqueMessage,
    ToolCallRequest,
};

use crate::Error;
use crate::proto::{self, InvokeModelResponse, Message};

static NEXT_LOCAL_ID: AtomicU64 = AtomicU64::new(1);

/// A fully received Bedrock response, replayed as model events.
///
/// `InvokeModel` is not streamed, so every event is known up front: one
/// message delta with all text, one tool call per `tool_use` block, then the
/// completion.
pub struct BedrockResponse {
    events: VecDeque<ModelResponseEvent>,
    full_msg: (String, Message),
}

impl BedrockResponse {
    pub(crate) fn from_body(body: InvokeModelResponse) -> Self {
        let mut events = VecDeque::new();

        let text: String = body
            .content
            .iter()
            .filter(|block| block.kind.as_deref() != Some("tool_use"))
            .filter_map(|block| block.text.as_deref())
            .collect();
        if !text.is_empty() {
            events.push_back(ModelResponseEvent::MessageDelta(text));
        }

        for block in &body.content {
            if block.kind.as_deref() != Some("tool_use") {
                continue;
            }
            events.push_back(ModelResponseEvent::ToolCall(ToolCallRequest {
                id: block.id.clone().unwrap_or_default(),
                name: block.name.clone().unwrap_or_default(),
                arguments: block.input.clone().unwrap_or(Value::Null),
            }));
        }

        let finish_reason = match body.stop_reason.as_deref() {
            Some("tool_use") => ModelFinishReason::ToolCalls,
            Some("max_tokens") => ModelFinishReason::MaxTokens,
            _ => ModelFinishReason::Stop,
        };
        events.push_back(ModelResponseEvent::Completed(finish_reason));

        let id = body.id.clone().unwrap_or_else(|| {
            let n = NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed);
            format!("bedrock-local-{n}")
        });
        let full_msg = (id, proto::assistant_message(&body));

        Self { events, full_msg }
    }
}

impl ModelResponse for BedrockResponse {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(self.get_mut().events.pop_front()))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        let (id, msg) = &self.full_msg;
        Some(OpaqueMessage::new(id, msg.clone()))
    }
}
