/// A byte range to request from a resource. `to == -1` means open-ended
/// (i.e. "to the end of the resource"), matching how an HTTP `Range` header
/// omits the end for an unbounded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub from: u64,
    pub to: i64,
}

impl Range {
    pub fn open_ended(from: u64) -> Self {
        Self { from, to: -1 }
    }

    pub fn bounded(from: u64, to: u64) -> Self {
        Self { from, to: to as i64 }
    }

    pub fn is_open_ended(&self) -> bool {
        self.to < 0
    }
}

/// Shapes how a seek/resume request asks the transport for a byte range.
/// Different transports and servers expect this in different places: a
/// `Range` header, query parameters, or something transport-specific
/// entirely.
///
/// Grounded on `turntable_collab::input::Input::query`'s capability-probe
/// pattern: callers pick a concrete implementor up front rather than the
/// handler dispatching dynamically per call.
pub trait SeekHandler: Send + Sync {
    /// Applies `range` to an outgoing request, described abstractly as a
    /// list of `(name, value)` header pairs plus an optional query string
    /// the transport should append to the resource URL.
    fn shape(&self, range: Range) -> RequestShape;
}

#[derive(Debug, Clone, Default)]
pub struct RequestShape {
    pub headers: Vec<(String, String)>,
    pub query: Option<String>,
}

impl RequestShape {
    /// Renders `base_url` with this shape's query string appended, if any.
    /// Transports call this instead of reading `query` directly so the
    /// `?`/`&` joining logic lives in one place.
    pub fn request_url(&self, base_url: &str) -> String {
        let Some(query) = &self.query else {
            return base_url.to_string();
        };

        if base_url.contains('?') {
            format!("{base_url}&{query}")
        } else {
            format!("{base_url}?{query}")
        }
    }
}

/// Shapes requests via a standard HTTP `Range` header. The default.
///
/// `range_load_zero_start` mirrors `config.range_load_zero_start`: when set,
/// the header always reads `bytes=0-` even for a non-zero `from`, relying on
/// the server to honor the true start some other way (e.g. a signed URL that
/// already encodes it).
pub struct RangeSeekHandler {
    pub range_load_zero_start: bool,
}

impl RangeSeekHandler {
    pub const fn new(range_load_zero_start: bool) -> Self {
        Self { range_load_zero_start }
    }
}

impl Default for RangeSeekHandler {
    fn default() -> Self {
        Self::new(false)
    }
}

impl SeekHandler for RangeSeekHandler {
    fn shape(&self, range: Range) -> RequestShape {
        let from = if self.range_load_zero_start { 0 } else { range.from };
        let value = if range.is_open_ended() {
            format!("bytes={from}-")
        } else {
            format!("bytes={from}-{}", range.to)
        };

        RequestShape {
            headers: vec![("Range".to_string(), value)],
            query: None,
        }
    }
}

/// Shapes requests via query parameters (e.g. `?bstart=0&bend=1023`), for
/// resources fronted by something that can't forward `Range` headers.
pub struct ParamSeekHandler {
    pub start_param: String,
    pub end_param: String,
}

impl ParamSeekHandler {
    pub fn new(start_param: impl Into<String>, end_param: impl Into<String>) -> Self {
        Self {
            start_param: start_param.into(),
            end_param: end_param.into(),
        }
    }
}

impl SeekHandler for ParamSeekHandler {
    fn shape(&self, range: Range) -> RequestShape {
        let query = if range.is_open_ended() {
            format!("{}={}", self.start_param, range.from)
        } else {
            format!(
                "{}={}&{}={}",
                self.start_param, range.from, self.end_param, range.to
            )
        };

        RequestShape {
            headers: Vec::new(),
            query: Some(query),
        }
    }
}

/// Shapes requests via caller-supplied logic, for transports whose seek
/// mechanism fits neither of the built-in shapes (e.g. a custom signed-URL
/// scheme).
pub struct CustomSeekHandler {
    shape_fn: Box<dyn Fn(Range) -> RequestShape + Send + Sync>,
}

impl CustomSeekHandler {
    pub fn new(shape_fn: impl Fn(Range) -> RequestShape + Send + Sync + 'static) -> Self {
        Self {
            shape_fn: Box::new(shape_fn),
        }
    }
}

impl SeekHandler for CustomSeekHandler {
    fn shape(&self, range: Range) -> RequestShape {
        (self.shape_fn)(range)
    }
}

/// Picks the [`SeekHandler`] named by `config.seek_type`. `custom`
/// must be `Some` when `seek_type` is [`crate::config::SeekType::Custom`];
/// its absence is an `InvalidArgument`, matching the source's behavior when
/// `custom_seek_handler` is unset but `seek_type = custom`.
pub fn select_seek_handler(
    config: &crate::config::ControllerConfig,
    custom: Option<std::sync::Arc<dyn SeekHandler>>,
) -> Result<std::sync::Arc<dyn SeekHandler>, crate::error::ControllerError> {
    use crate::config::SeekType;

    match config.seek_type {
        SeekType::Range => Ok(std::sync::Arc::new(RangeSeekHandler::new(config.range_load_zero_start))),
        SeekType::Param => Ok(std::sync::Arc::new(ParamSeekHandler::new(
            config.seek_param_start.clone(),
            config.seek_param_end.clone(),
        ))),
        SeekType::Custom => custom.ok_or_else(|| {
            crate::error::ControllerError::InvalidArgument(
                "seek_type is custom but no custom seek handler was supplied".to_string(),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_seek_handler_open_ended() {
        let handler = RangeSeekHandler::default();
        let shape = handler.shape(Range::open_ended(1024));
        assert_eq!(shape.headers, vec![("Range".to_string(), "bytes=1024-".to_string())]);
        assert!(shape.query.is_none());
    }

    #[test]
    fn test_range_seek_handler_bounded() {
        let handler = RangeSeekHandler::default();
        let shape = handler.shape(Range::bounded(0, 999));
        assert_eq!(shape.headers, vec![("Range".to_string(), "bytes=0-999".to_string())]);
    }

    #[test]
    fn test_param_seek_handler() {
        let handler = ParamSeekHandler::new("bstart", "bend");
        let shape = handler.shape(Range::bounded(10, 20));
        assert_eq!(shape.query.as_deref(), Some("bstart=10&bend=20"));
        assert!(shape.headers.is_empty());
    }

    #[test]
    fn test_custom_seek_handler() {
        let handler = CustomSeekHandler::new(|range| RequestShape {
            headers: vec![("X-Offset".to_string(), range.from.to_string())],
            query: None,
        });

        let shape = handler.shape(Range::open_ended(42));
        assert_eq!(shape.headers, vec![("X-Offset".to_string(), "42".to_string())]);
    }

    #[test]
    fn test_select_seek_handler_custom_requires_handler() {
        use crate::config::{ControllerConfig, SeekType};

        let mut config = ControllerConfig::default();
        config.seek_type = SeekType::Custom;

        let err = select_seek_handler(&config, None).unwrap_err();
        assert!(matches!(err, crate::error::ControllerError::InvalidArgument(_)));
    }

    #[test]
    fn test_select_seek_handler_range_default() {
        let config = crate::config::ControllerConfig::default();
        let handler = select_seek_handler(&config, None).unwrap();
        let shape = handler.shape(Range::open_ended(0));
        assert_eq!(shape.headers, vec![("Range".to_string(), "bytes=0-".to_string())]);
    }

    #[test]
    fn test_range_load_zero_start_pins_from() {
        let handler = RangeSeekHandler::new(true);
        let shape = handler.shape(Range::bounded(600, 999));
        assert_eq!(shape.headers, vec![("Range".to_string(), "bytes=0-999".to_string())]);
    }

    #[test]
    fn test_request_url_appends_query() {
        let shape = ParamSeekHandler::new("bstart", "bend").shape(Range::bounded(10, 20));
        assert_eq!(
            shape.request_url("https://example.test/a.bin"),
            "https://example.test/a.bin?bstart=10&bend=20"
        );
    }

    #[test]
    fn test_request_url_without_query_is_unchanged() {
        let shape = RangeSeekHandler::default().shape(Range::open_ended(0));
        assert_eq!(
            shape.request_url("https://example.test/a.bin"),
            "https://example.test/a.bin"
        );
    }
}
