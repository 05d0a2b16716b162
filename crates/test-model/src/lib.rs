//! A scripted fake model for testing agents without a server.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use strandline_model::{
    ErrorKind, ModelMessage, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, OpaqueMessage,
};

pub use preset::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A scripted response. Every event is available immediately.
pub struct TestModelResponse {
    events: VecDeque<ModelResponseEvent>,
    opaque_msg: OpaqueMessage,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(self.get_mut().events.pop_front()))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        Some(self.opaque_msg.clone())
    }
}

#[derive(Clone, Debug)]
enum ScriptStep {
    Respond(PresetResponse),
    Fail(ErrorKind, String),
}

/// A scripted fake model for testing.
///
/// Steps are picked by the number of assistant turns already in the request
/// history, so the first request gets the first step, the request carrying
/// one assistant reply gets the second step, and so on. Running past the
/// end of the script fails the request.
///
/// Every request is recorded and can be inspected with
/// [`requests`](TestModelProvider::requests), also from clones of the
/// provider.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Vec<ScriptStep>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl TestModelProvider {
    /// Appends a step answering with `preset`.
    #[inline]
    pub fn add_response_step(&mut self, preset: PresetResponse) {
        self.script.push(ScriptStep::Respond(preset));
    }

    /// Appends a step failing the request with the given error kind.
    #[inline]
    pub fn add_failure_step(
        &mut self,
        kind: ErrorKind,
        message: impl Into<String>,
    ) {
        self.script.push(ScriptStep::Fail(kind, message.into()));
    }

    /// Returns every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn respond(&self, req: &ModelRequest) -> Result<TestModelResponse, Error> {
        let step_idx = req
            .messages
            .iter()
            .filter(|msg| {
                matches!(msg, ModelMessage::Assistant(_) | ModelMessage::Opaque(_))
            })
            .count();

        match self.script.get(step_idx) {
            Some(ScriptStep::Respond(preset)) => {
                let mut events: VecDeque<_> = preset
                    .events
                    .iter()
                    .map(|event| match event {
                        PresetEvent::MessageDelta(delta) => {
                            ModelResponseEvent::MessageDelta(delta.clone())
                        }
                        PresetEvent::ToolCall(req) => {
                            ModelResponseEvent::ToolCall(req.clone())
                        }
                    })
                    .collect();
                events.push_back(ModelResponseEvent::Completed(
                    preset.effective_finish_reason(),
                ));
                Ok(TestModelResponse {
                    events,
                    opaque_msg: OpaqueMessage::new(
                        format!("msg:{step_idx}"),
                        preset.text(),
                    ),
                })
            }
            Some(ScriptStep::Fail(kind, message)) => Err(Error {
                message: message.clone(),
                kind: *kind,
            }),
            None => Err(Error {
                message: format!("no scripted step at index {step_idx}"),
                kind: ErrorKind::Other,
            }),
        }
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req.clone());
        ready(self.respond(req))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use strandline_model::{
        ModelFinishReason, ModelTool, ToolCallRequest, ToolCallResult,
    };
    use serde_json::json;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Vec<ToolCallRequest>, ModelFinishReason, OpaqueMessage) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_calls = vec![];
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(reason) => {
                    return (
                        msg,
                        tool_calls,
                        reason,
                        resp.make_opaque_message().unwrap(),
                    );
                }
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_calls.push(req),
            }
        }
    }

    #[tokio::test]
    async fn test_scripted_turns() {
        let mut provider = TestModelProvider::default();
        provider.add_response_step(PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me ".to_owned()),
            PresetEvent::MessageDelta("compute that.".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call_0".to_owned(),
                name: "calculator".to_owned(),
                arguments: json!({ "expression": "sqrt(1764)" }),
            }),
        ]));
        provider.add_response_step(PresetResponse::with_text("It is 42."));

        let mut req = ModelRequest {
            messages: vec![ModelMessage::User(
                "What is the square root of 1764?".to_owned(),
            )],
            tools: vec![ModelTool {
                name: "calculator".to_owned(),
                description: "Evaluates an expression".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_calls, reason, opaque_msg) = collect_response(resp).await;
        assert_eq!(msg, "Let me compute that.");
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(reason, ModelFinishReason::ToolCalls);
        assert_eq!(opaque_msg.id(), "msg:0");

        req.messages.push(ModelMessage::Opaque(opaque_msg));
        req.messages.push(ModelMessage::Tool(ToolCallResult {
            id: "call_0".to_owned(),
            content: "42".to_owned(),
            is_error: false,
        }));
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_calls, reason, _) = collect_response(resp).await;
        assert_eq!(msg, "It is 42.");
        assert!(tool_calls.is_empty());
        assert_eq!(reason, ModelFinishReason::Stop);

        let requests = provider.clone().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_failure_step(ErrorKind::RateLimitExceeded, "slow down");

        let req = ModelRequest::with_prompt("Hi");
        let err = match provider.send_request(&req).await {
            Ok(_) => panic!("expected a scripted failure"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(err.message(), "slow down");

        let mut req = req;
        req.messages.push(ModelMessage::Assistant("Hello".to_owned()));
        let err = match provider.send_request(&req).await {
            Ok(_) => panic!("expected the script to be exhausted"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.to_string(), "no scripted step at index 1 (other error)");
    }
}
