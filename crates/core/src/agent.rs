mod builder;
mod error;

use std::fmt::{self, Display};
use std::sync::Arc;

use strandline_model::{
    ModelFinishReason, ModelMessage, ModelRequest, ToolCallRequest,
};

use crate::conversation::Conversation;
use crate::model_client::ModelClient;
use crate::tool::Executor as ToolExecutor;
pub use builder::AgentBuilder;
pub use error::Error;

pub(crate) type OnTranscript = Arc<dyn Fn(&str, TranscriptSource) + Send + Sync>;

/// Who produced a piece of transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranscriptSource {
    /// Input passed to [`Agent::run`].
    User,
    /// Text generated by the model, reported as it streams in.
    Assistant,
    /// The output of a tool call.
    Tool,
}

/// The outcome of [`Agent::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentResponse {
    /// Text of the final model turn.
    pub text: String,
    /// Why the final model turn ended.
    pub finish_reason: ModelFinishReason,
    /// Every tool call made while producing this response, in order.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl Display for AgentResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// An agent, which owns a model client, a toolset and the conversation.
///
/// Each call to [`run`](Agent::run) continues the same conversation.
pub struct Agent {
    model_client: ModelClient,
    tool_executor: ToolExecutor,
    system_prompt: Option<String>,
    max_turns: usize,
    conversation: Conversation,
    on_transcript: Option<OnTranscript>,
}

impl Agent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            model_client,
            system_prompt,
            tools,
            max_turns,
            on_transcript,
        } = builder;

        Self {
            model_client,
            tool_executor: ToolExecutor::with_tools(tools),
            system_prompt,
            max_turns,
            conversation: Default::default(),
            on_transcript,
        }
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Sends `input` to the model and keeps running requested tools until
    /// the model answers without asking for more.
    ///
    /// Tools run one at a time in the order they were requested. Tool
    /// failures are reported back to the model and do not end the run.
    pub async fn run<S: Into<String>>(
        &mut self,
        input: S,
    ) -> Result<AgentResponse, Error> {
        let input = input.into();
        self.emit_transcript(&input, TranscriptSource::User);
        self.conversation.push(
            ModelMessage::User(input.clone()),
            input,
            TranscriptSource::User,
        );

        let mut tool_calls = vec![];
        for turn in 1..=self.max_turns {
            debug!("model turn {turn}/{}", self.max_turns);
            let resp = self
                .model_client
                .send_request(self.build_model_request(), self.delta_handler())
                .await
                .map_err(Error::Model)?;

            self.conversation.push(
                resp.history_message(),
                resp.transcript.clone(),
                TranscriptSource::Assistant,
            );

            if resp.tool_calls.is_empty() {
                return Ok(AgentResponse {
                    text: resp.transcript,
                    finish_reason: resp.finish_reason,
                    tool_calls,
                });
            }

            for req in resp.tool_calls {
                let result = self.tool_executor.run(req.clone()).await;
                self.emit_transcript(&result.content, TranscriptSource::Tool);
                let transcript = result.content.clone();
                self.conversation.push(
                    ModelMessage::Tool(result),
                    transcript,
                    TranscriptSource::Tool,
                );
                tool_calls.push(req);
            }
        }

        warn!("no final answer after {} model turns", self.max_turns);
        Err(Error::MaxTurnsExceeded(self.max_turns))
    }

    fn build_model_request(&self) -> ModelRequest {
        let system = self.system_prompt.iter().cloned().map(ModelMessage::System);
        ModelRequest {
            messages: system
                .chain(self.conversation.messages().cloned())
                .collect(),
            tools: self.tool_executor.definitions(),
        }
    }

    fn delta_handler(&self) -> impl Fn(&str) + Send + 'static {
        let on_transcript = self.on_transcript.clone();
        move |delta| {
            if let Some(on_transcript) = &on_transcript {
                on_transcript(delta, TranscriptSource::Assistant);
            }
        }
    }

    #[inline]
    fn emit_transcript(&self, text: &str, source: TranscriptSource) {
        if let Some(on_transcript) = &self.on_transcript {
            on_transcript(text, source);
        }
    }
}
