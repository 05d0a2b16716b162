use serde::{Deserialize, Serialize};
use strandline_model::{ModelFinishReason, ToolCallRequest};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PresetEvent {
    MessageDelta(String),
    ToolCall(ToolCallRequest),
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response, before the completion event.
    pub events: Vec<PresetEvent>,
    /// Overrides the finish reason derived from the events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<ModelFinishReason>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            finish_reason: None,
        }
    }

    /// Creates a response with a single text delta.
    #[inline]
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Sets the finish reason reported on completion.
    #[inline]
    pub fn with_finish_reason(mut self, finish_reason: ModelFinishReason) -> Self {
        self.finish_reason = Some(finish_reason);
        self
    }

    /// Returns the finish reason reported on completion.
    ///
    /// Without an override, a response with any tool call finishes with
    /// [`ModelFinishReason::ToolCalls`] and every other one with
    /// [`ModelFinishReason::Stop`].
    pub fn effective_finish_reason(&self) -> ModelFinishReason {
        if let Some(finish_reason) = self.finish_reason {
            return finish_reason;
        }
        let has_tool_call = self
            .events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCall(_)));
        if has_tool_call {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        }
    }

    pub(crate) fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                PresetEvent::MessageDelta(delta) => Some(delta.as_str()),
                PresetEvent::ToolCall(_) => None,
            })
            .collect()
    }
}
