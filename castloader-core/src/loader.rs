use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LoaderError;
use crate::seek::Range;

/// An immutable-per-session description of what's being loaded. `url` is
/// the only field the Controller may later replace (`update_url`).
#[derive(Debug, Clone)]
pub struct DataSource {
    pub url: String,
    pub filesize: Option<u64>,
    pub cors: bool,
    pub with_credentials: bool,
    pub referrer_policy: Option<String>,
    /// Memoized resolved URL once a transport reports it followed a
    /// redirect.
    pub redirected_url: Option<String>,
}

impl DataSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filesize: None,
            cors: true,
            with_credentials: false,
            referrer_policy: None,
            redirected_url: None,
        }
    }
}

/// A span of newly-arrived bytes reported by a [`Loader`].
#[derive(Debug, Clone)]
pub struct ChunkEvent {
    pub bytes: Vec<u8>,
    pub byte_start: u64,
    pub received_length_so_far: u64,
}

/// The Loader status machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderStatus {
    Idle,
    Connecting,
    Buffering,
    Complete,
    Error,
}

impl LoaderStatus {
    pub fn is_working(self) -> bool {
        matches!(self, LoaderStatus::Connecting | LoaderStatus::Buffering)
    }
}

/// Which concrete transport a [`Loader`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderType {
    Ranged,
    Streaming,
    WebSocket,
    Custom,
}

/// Events a [`Loader`] reports to its owning Controller.
///
/// This stands in for the source's callback slots (`on_content_length_known`,
/// `on_url_redirect`, `on_data_arrival`, `on_complete`, `on_error`): instead
/// of every Loader variant holding settable, `this`-bound callbacks, the
/// Controller implements this trait once and hands a reference to it down
/// into the Loader it owns.
pub trait LoaderEventSink: Send + Sync {
    fn on_content_length_known(&self, len: u64);
    fn on_url_redirect(&self, url: &str);
    fn on_data_arrival(&self, chunk: ChunkEvent);
    fn on_complete(&self, range_from: u64, range_to: i64);
    fn on_error(&self, error: LoaderError);
}

/// The transport contract every Loader variant implements.
///
/// `open`/`abort`/`destroy` are async because they suspend on real I/O
/// (connection establishment, socket teardown); everything else is a
/// synchronous query over locally-held state.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Opens the loader against `source` for `range`, reporting events to
    /// `sink` as they occur for as long as this instance lives. `sink` is
    /// owned (not borrowed) so implementations may hand a clone into a
    /// spawned task and keep delivering events long after `open` returns.
    async fn open(&self, source: &DataSource, range: Range, sink: Arc<dyn LoaderEventSink>);

    /// Aborts in-flight work. After this returns, no further events for
    /// this instance are delivered to the sink.
    async fn abort(&self);

    /// Releases any transport-held resources. Called once, after `abort`,
    /// right before the instance is dropped.
    async fn destroy(&self);

    fn is_working(&self) -> bool {
        self.status().is_working()
    }

    fn status(&self) -> LoaderStatus;

    /// Whether the Controller's StashEngine should buffer on this loader's
    /// behalf. Ranged loaders already deliver complete sub-ranges and
    /// report `false`; streaming loaders report `true`.
    fn needs_stash_buffer(&self) -> bool;

    fn loader_type(&self) -> LoaderType;
}

/// Produces fresh [`Loader`] instances of a single, already-selected
/// variant. The Controller calls `create` once at construction and again on
/// every `open`/`seek`/reconnect, since each of those destroys and recreates
/// the Loader instance while the Controller itself persists.
///
/// Selection of *which* variant this factory builds (custom class from
/// config, WebSocket by URL scheme, fetch-style streaming, ranged, ...) is
/// done once by whoever constructs the factory; the factory itself just
/// repeats that one choice.
pub trait LoaderFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Loader>;

    fn loader_type(&self) -> LoaderType;
}

#[cfg(test)]
pub mod test_support {
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// A Loader stand-in for Controller unit tests: `open` just records the
    /// call, and the test drives events by calling `emit_chunk` / `emit_eof`
    /// / `emit_error` directly against the sink it was opened with.
    pub struct MockLoader {
        status: Mutex<LoaderStatus>,
        needs_stash_buffer: bool,
        loader_type: LoaderType,
        aborted: AtomicBool,
        opened_range: Mutex<Option<Range>>,
    }

    impl MockLoader {
        pub fn new(needs_stash_buffer: bool, loader_type: LoaderType) -> Self {
            Self {
                status: Mutex::new(LoaderStatus::Idle),
                needs_stash_buffer,
                loader_type,
                aborted: AtomicBool::new(false),
                opened_range: Mutex::new(None),
            }
        }

        pub fn opened_range(&self) -> Option<Range> {
            *self.opened_range.lock()
        }

        pub fn was_aborted(&self) -> bool {
            self.aborted.load(Ordering::SeqCst)
        }

        pub fn set_status(&self, status: LoaderStatus) {
            *self.status.lock() = status;
        }
    }

    #[async_trait]
    impl Loader for MockLoader {
        async fn open(&self, _source: &DataSource, range: Range, _sink: Arc<dyn LoaderEventSink>) {
            *self.opened_range.lock() = Some(range);
            *self.status.lock() = LoaderStatus::Connecting;
        }

        async fn abort(&self) {
            self.aborted.store(true, Ordering::SeqCst);
            *self.status.lock() = LoaderStatus::Idle;
        }

        async fn destroy(&self) {
            self.aborted.store(true, Ordering::SeqCst);
        }

        fn status(&self) -> LoaderStatus {
            *self.status.lock()
        }

        fn needs_stash_buffer(&self) -> bool {
            self.needs_stash_buffer
        }

        fn loader_type(&self) -> LoaderType {
            self.loader_type
        }
    }

    #[tokio::test]
    async fn test_mock_loader_records_open_range() {
        struct NullSink;
        impl LoaderEventSink for NullSink {
            fn on_content_length_known(&self, _len: u64) {}
            fn on_url_redirect(&self, _url: &str) {}
            fn on_data_arrival(&self, _chunk: ChunkEvent) {}
            fn on_complete(&self, _range_from: u64, _range_to: i64) {}
            fn on_error(&self, _error: LoaderError) {}
        }

        let loader = MockLoader::new(true, LoaderType::Streaming);
        let source = DataSource::new("https://example.test/a.bin");
        loader
            .open(&source, Range::open_ended(42), Arc::new(NullSink))
            .await;

        assert_eq!(loader.opened_range(), Some(Range::open_ended(42)));
        assert!(loader.is_working());
    }
}
