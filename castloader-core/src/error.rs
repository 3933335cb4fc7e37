use thiserror::Error;

/// Construction-time / synchronous errors. Never routed through `on_error`,
/// always returned directly from the call that caused them.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// The recoverable/unrecoverable failure modes a [`crate::Loader`] can
/// report, error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderErrorKind {
    Exception,
    HttpStatusCodeInvalid,
    ConnectingTimeout,
    EarlyEof,
    UnrecoverableEarlyEof,
}

/// A single error event reported by a [`crate::Loader`].
#[derive(Debug, Clone)]
pub struct LoaderError {
    pub kind: LoaderErrorKind,
    pub code: Option<u16>,
    pub msg: String,
}

impl LoaderError {
    pub fn new(kind: LoaderErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            msg: msg.into(),
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }
}

impl std::fmt::Display for LoaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{:?} ({code}): {}", self.kind, self.msg),
            None => write!(f, "{:?}: {}", self.kind, self.msg),
        }
    }
}

impl std::error::Error for LoaderError {}
