use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};

use strandline_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Lines;
use crate::proto::{ChatChunk, Message, ToolCall};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

struct PartialState {
    lines: Lines,
    content: String,
    tool_calls: Vec<ToolCall>,
    // Indexes into `tool_calls` not yet handed out as events.
    pending_tool_call_idx: VecDeque<usize>,
    // Taken once the completion event has been returned.
    pending_finish_reason: Option<ModelFinishReason>,
    done: bool,
}

impl PartialState {
    #[inline]
    fn finish(self) -> (String, Message) {
        let n = NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed);
        (
            format!("ollama-msg-{n}"),
            Message::Assistant {
                content: self.content,
                tool_calls: self.tool_calls,
            },
        )
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OllamaResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Message)>,
    }
}

impl OllamaResponse {
    #[inline]
    pub(crate) fn from_lines(lines: Lines) -> Self {
        let partial_state = PartialState {
            lines,
            content: Default::default(),
            tool_calls: Default::default(),
            pending_tool_call_idx: Default::default(),
            pending_finish_reason: Default::default(),
            done: false,
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(partial_state))),
            full_msg: None,
        }
    }
}

impl ModelResponse for OllamaResponse {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, partial_state)) => {
                    *this.next_event_fut = None;
                    *this.full_msg = Some(partial_state.finish());
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        *this.next_event_fut = Some(Box::pin(next_event(partial_state)));
        Poll::Ready(Ok(Some(event)))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id, msg.clone()))
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    let mut message_delta = None;

    // Tool calls already queued go out before another line is read.
    while !partial_state.done && partial_state.pending_tool_call_idx.is_empty() {
        let line = match partial_state.lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                return Err(Error::new(
                    "stream ended before the response was done",
                    ErrorKind::MalformedResponse,
                ));
            }
            Err(err) => {
                return Err(Error::new(
                    format!("{err}"),
                    ErrorKind::MalformedResponse,
                ));
            }
        };
        trace!("got chat chunk: {line}");

        let chunk = serde_json::from_str::<ChatChunk>(&line).map_err(|err| {
            Error::new(format!("{err}"), ErrorKind::MalformedResponse)
        })?;
        if let Some(error) = chunk.error {
            return Err(Error::new(error, ErrorKind::Other));
        }

        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
                partial_state.content.push_str(&message.content);
                message_delta = Some(message.content);
            }
            for mut tool_call in message.tool_calls {
                if tool_call.id.is_empty() {
                    tool_call.id = format!("call_{}", partial_state.tool_calls.len());
                }
                partial_state
                    .pending_tool_call_idx
                    .push_back(partial_state.tool_calls.len());
                partial_state.tool_calls.push(tool_call);
            }
        }

        if chunk.done {
            partial_state.done = true;
            partial_state.pending_finish_reason =
                Some(if !partial_state.tool_calls.is_empty() {
                    ModelFinishReason::ToolCalls
                } else if chunk.done_reason.as_deref() == Some("length") {
                    ModelFinishReason::MaxTokens
                } else {
                    ModelFinishReason::Stop
                });
        }

        if message_delta.is_some() || !partial_state.pending_tool_call_idx.is_empty() {
            break;
        }
    }

    // Message delta first, then pending tool calls, then the finish reason.

    if let Some(message_delta) = message_delta {
        return Ok((
            Some(ModelResponseEvent::MessageDelta(message_delta)),
            partial_state,
        ));
    }

    if let Some(idx) = partial_state.pending_tool_call_idx.pop_front() {
        let tool_call = &partial_state.tool_calls[idx];
        return Ok((
            Some(ModelResponseEvent::ToolCall(ToolCallRequest {
                id: tool_call.id.clone(),
                name: tool_call.function.name.clone(),
                arguments: tool_call.function.arguments.clone(),
            })),
            partial_state,
        ));
    }

    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    Ok((None, partial_state))
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::io::Chunks;

    async fn collect(
        chunks: Vec<Bytes>,
    ) -> (Result<Vec<ModelResponseEvent>, Error>, Option<OpaqueMessage>) {
        let lines = Lines::new(Chunks::from_vec_deque(chunks.into()));
        let mut resp = pin!(OllamaResponse::from_lines(lines));
        let mut events = vec![];
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => break,
                Err(err) => return (Err(err), None),
            }
        }
        (Ok(events), resp.make_opaque_message())
    }

    #[tokio::test]
    async fn test_tool_call_stream() {
        let (events, opaque) = collect(vec![Bytes::from_static(
            include_bytes!("../fixtures/tool_call_stream.ndjson"),
        )])
        .await;
        let events = events.unwrap();

        assert_eq!(
            events,
            [
                ModelResponseEvent::MessageDelta("Let me ".to_owned()),
                ModelResponseEvent::MessageDelta("check.".to_owned()),
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_0".to_owned(),
                    name: "calculator".to_owned(),
                    arguments: json!({ "expression": "sqrt(1764)" }),
                }),
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_1".to_owned(),
                    name: "current_time".to_owned(),
                    arguments: json!({}),
                }),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ]
        );

        let opaque = opaque.unwrap();
        let Message::Assistant {
            content,
            tool_calls,
        } = opaque.to_raw::<Message>().unwrap()
        else {
            panic!("expected an assistant message");
        };
        assert_eq!(content, "Let me check.");
        assert_eq!(tool_calls.len(), 2);
    }

    #[tokio::test]
    async fn test_text_with_done_in_same_chunk() {
        let (events, _) = collect(vec![
            Bytes::from_static(b"{\"message\":{\"role\":\"assistant\",\"content\":\"Agentic AI \"},\"done\":false}\n"),
            Bytes::from_static(b"{\"message\":{\"role\":\"assistant\",\"content\":\"acts.\"},\"done\":true,\"done_reason\":\"length\"}\n"),
        ])
        .await;
        assert_eq!(
            events.unwrap(),
            [
                ModelResponseEvent::MessageDelta("Agentic AI ".to_owned()),
                ModelResponseEvent::MessageDelta("acts.".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::MaxTokens),
            ]
        );
    }

    #[tokio::test]
    async fn test_errors() {
        let (events, _) = collect(vec![Bytes::from_static(
            b"{\"error\":\"model 'gemma3' not found\"}\n",
        )])
        .await;
        assert_eq!(events.unwrap_err().message(), "model 'gemma3' not found");

        let (events, _) = collect(vec![Bytes::from_static(
            b"{\"message\":{\"role\":\"assistant\",\"content\":\"cut\"},\"done\":false}\n",
        )])
        .await;
        let err = events.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_tool_call_before_later_text() {
        let (events, _) = collect(vec![
            Bytes::from_static(b"{\"message\":{\"role\":\"assistant\",\"content\":\"A\",\"tool_calls\":[{\"function\":{\"name\":\"calculator\",\"arguments\":{\"expression\":\"1 + 1\"}}}]},\"done\":false}\n"),
            Bytes::from_static(b"{\"message\":{\"role\":\"assistant\",\"content\":\"B\"},\"done\":false}\n"),
            Bytes::from_static(b"{\"done\":true,\"done_reason\":\"stop\"}\n"),
        ])
        .await;
        assert_eq!(
            events.unwrap(),
            [
                ModelResponseEvent::MessageDelta("A".to_owned()),
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_0".to_owned(),
                    name: "calculator".to_owned(),
                    arguments: json!({ "expression": "1 + 1" }),
                }),
                ModelResponseEvent::MessageDelta("B".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_message() {
        let (events, _) =
            collect(vec![Bytes::from_static(b"{\"done\":\xff}\n")]).await;
        let err = events.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert_eq!(err.message(), "response stream is not valid UTF-8");
    }
}
