//! Provider-neutral types shared by the agent runtime and the model
//! backends.
//!
//! A backend (Bedrock, Ollama, the scripted test model) translates a
//! [`ModelRequest`] into its own wire format and reports what the model
//! produced as a sequence of [`ModelResponseEvent`]s. Nothing here talks to
//! the network; these are the constraints implementors adhere to.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
