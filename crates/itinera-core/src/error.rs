use std::sync::Arc;

/// Rejection of a single streamed event. Never aborts a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("field `{0}` is not a finite coordinate")]
    NonFinite(&'static str),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Failure of a whole submission, shown in the error region.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("could not generate any results")]
    NoResults,

    #[error("model request failed: {0}")]
    Upstream(Arc<str>),
}

impl SessionError {
    pub fn upstream(message: impl Into<Arc<str>>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoResults => ErrorKind::NoResults,
            Self::Upstream(_) => ErrorKind::Upstream,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoResults,
    Upstream,
    Export,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::NoResults => "no-results",
            Self::Upstream => "upstream",
            Self::Export => "export",
        }
    }
}
