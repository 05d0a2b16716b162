//! Ready-made tools and console helpers for agents backed by Amazon
//! Bedrock or a local Ollama server.
//!
//! The crate ships three demo binaries (`agent-simple`, `agent-tools` and
//! `agent-calculator`) built on the same pieces it exports.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

#[cfg(feature = "cli")]
pub mod cli;
pub mod tools;

pub use strandline_bedrock_model::invoke_bedrock;

/// Re-exports of [`strandline_core`] crate.
pub mod core {
    pub use strandline_core::*;
}
