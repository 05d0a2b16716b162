use std::fmt::{self, Display};

/// The kind of error that occurred while talking to a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The credentials were missing or rejected.
    Unauthorized,
    /// Required configuration (model id, region, host) is missing or invalid.
    Misconfigured,
    /// The endpoint could not be reached.
    Network,
    /// The endpoint answered with a body we could not understand.
    MalformedResponse,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Moderated => "content moderated",
            ErrorKind::RateLimitExceeded => "rate limit exceeded",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Misconfigured => "misconfigured",
            ErrorKind::Network => "network error",
            ErrorKind::MalformedResponse => "malformed response",
            ErrorKind::Other => "other error",
        };
        f.write_str(s)
    }
}
