//! Core logic including the agent loop, tool execution and conversation
//! history.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod tool;

pub use agent::{Agent, AgentBuilder, AgentResponse, Error, TranscriptSource};
pub use tool::Tool;
