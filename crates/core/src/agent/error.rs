use std::error::Error as StdError;
use std::fmt::{self, Display};

use strandline_model::{ErrorKind, ModelProviderError};

/// Error type for [`Agent::run`](crate::Agent::run).
#[derive(Debug)]
pub enum Error {
    /// The model provider failed.
    Model(Box<dyn ModelProviderError>),
    /// The model kept requesting tools for more turns than allowed.
    MaxTurnsExceeded(usize),
}

impl Error {
    /// Returns the provider error kind, if the model failed.
    #[inline]
    pub fn model_error_kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Model(err) => Some(err.kind()),
            Error::MaxTurnsExceeded(_) => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Model(err) => write!(f, "model request failed: {err}"),
            Error::MaxTurnsExceeded(max_turns) => {
                write!(f, "no final answer after {max_turns} model turns")
            }
        }
    }
}

impl StdError for Error {}
