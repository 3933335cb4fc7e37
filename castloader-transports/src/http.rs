use castloader_core::{LoaderError, LoaderErrorKind};

/// Classifies a transport-level failure reported by `reqwest`'s request
/// builder: a timed-out connection attempt gets its own taxonomy entry
/// (§6 `ConnectingTimeout`), everything else is a plain `Exception`. Shared
/// by every HTTP-based loader so the distinction is made the same way
/// everywhere.
pub fn connect_error(err: reqwest::Error) -> LoaderError {
    if err.is_timeout() {
        LoaderError::new(LoaderErrorKind::ConnectingTimeout, err.to_string())
    } else {
        LoaderError::new(LoaderErrorKind::Exception, err.to_string())
    }
}
