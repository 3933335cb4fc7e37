use std::collections::HashMap;

/// Picks the request-shaping policy used to turn a logical byte range into
/// transport parameters. See [`crate::SeekHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekType {
    /// Send an HTTP `Range` header.
    #[default]
    Range,
    /// Encode the range as `bstart`/`bend`-style query parameters.
    Param,
    /// Defer to a caller-supplied shaper.
    Custom,
}

/// Configuration for a [`crate::Controller`].
///
/// Mirrors how `turntable_core::Config` is a plain struct with a
/// `Default`-friendly shape rather than something parsed from a file; the
/// binary crate is the only place CLI/env configuration is read.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Initial size of the stash window, in bytes. Must be `> 0`.
    pub stash_initial_size: usize,
    /// Whether buffered (stash) delivery is used at all.
    pub enable_stash_buffer: bool,
    /// Selects the live stash-sizing curve and disables early-EOF reconnect.
    pub is_live: bool,
    /// Which [`SeekType`] to shape requests with.
    pub seek_type: SeekType,
    /// Query parameter name for the start of a range, used when
    /// `seek_type` is [`SeekType::Param`]. Defaults to `"bstart"`.
    pub seek_param_start: String,
    /// Query parameter name for the end of a range. Defaults to `"bend"`.
    pub seek_param_end: String,
    /// Send `Range: bytes=0-` even when `from > 0`, relying on the server to
    /// honor `from` some other way.
    pub range_load_zero_start: bool,
    /// Reuse a previously resolved redirected URL on subsequent requests.
    pub reuse_redirected_url: bool,
    /// Additional request headers forwarded to the transport.
    pub headers: HashMap<String, String>,
    /// Forwarded to the transport, uninterpreted.
    pub referrer_policy: Option<String>,
}

impl ControllerConfig {
    pub const DEFAULT_STASH_INITIAL_SIZE: usize = 384 * 1024;
    pub const INITIAL_BUFFER_HEADROOM: usize = 1024 * 1024;
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stash_initial_size: Self::DEFAULT_STASH_INITIAL_SIZE,
            enable_stash_buffer: true,
            is_live: false,
            seek_type: SeekType::Range,
            seek_param_start: "bstart".to_string(),
            seek_param_end: "bend".to_string(),
            range_load_zero_start: false,
            reuse_redirected_url: false,
            headers: HashMap::new(),
            referrer_policy: None,
        }
    }
}
