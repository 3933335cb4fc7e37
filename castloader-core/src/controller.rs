use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::ControllerConfig;
use crate::error::{ControllerError, LoaderError, LoaderErrorKind};
use crate::ladder::{normalize, SPEED_LADDER_KB};
use crate::loader::{
    ChunkEvent, DataSource, Loader, LoaderEventSink, LoaderFactory, LoaderStatus, LoaderType,
};
use crate::seek::{Range, SeekHandler};
use crate::speed_sampler::SpeedSampler;
use crate::stash::StashEngine;
use crate::Introspect;

type DataArrivalCb = Box<dyn FnMut(&[u8], u64) -> usize + Send>;
type SimpleCb = Box<dyn FnMut() + Send>;
type RedirectCb = Box<dyn FnMut(&str) + Send>;
type ErrorCb = Box<dyn FnMut(LoaderErrorKind, Option<u16>, &str) + Send>;
type CompleteCb<E> = Box<dyn FnMut(&E) + Send>;

struct Callbacks<E> {
    on_data_arrival: Option<DataArrivalCb>,
    on_seeked: Option<SimpleCb>,
    on_error: Option<ErrorCb>,
    on_complete: Option<CompleteCb<E>>,
    on_redirect: Option<RedirectCb>,
    on_recovered_early_eof: Option<SimpleCb>,
}

impl<E> Callbacks<E> {
    fn new() -> Self {
        Self {
            on_data_arrival: None,
            on_seeked: None,
            on_error: None,
            on_complete: None,
            on_redirect: None,
            on_recovered_early_eof: None,
        }
    }
}

struct State {
    current_range: Range,
    full_request_flag: bool,
    paused: bool,
    resume_from: u64,
    early_eof_reconnecting: bool,
    last_normalized_speed: u32,
    total_length: Option<u64>,
    enable_stash: bool,
    has_redirect: bool,
}

/// A read-only snapshot of a [`Controller`]'s observables, for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct ControllerObservables {
    pub status: LoaderStatus,
    pub is_working: bool,
    pub is_paused: bool,
    pub current_speed_kbps: f64,
    pub current_url: String,
    pub has_redirect: bool,
    pub current_redirected_url: Option<String>,
    pub loader_type: LoaderType,
}

/// Owns the stash buffer, throughput sampling, and the currently-open
/// Loader for one streaming session.
///
/// Holds a `Weak` back-reference to itself (populated via
/// [`Arc::new_cyclic`]) solely so it can hand an owned `Arc<dyn
/// LoaderEventSink>` to the Loader it creates and so the early-EOF
/// reconnect path can spawn its own `internal_seek` without every
/// public method needing to be called through an explicit `Arc<Self>`.
///
/// `E` is the opaque `extra_data` a caller supplies at construction (§3
/// Lifecycle) and gets handed back, by reference, to its bound
/// `on_complete` callback (§6) — the Controller never inspects it itself.
/// Callers with nothing to carry use `Controller<()>`.
pub struct Controller<E: Send + Sync + 'static = ()> {
    self_weak: Weak<Controller<E>>,
    config: ControllerConfig,
    factory: Arc<dyn LoaderFactory>,
    #[allow(dead_code)]
    seek_handler: Arc<dyn SeekHandler>,
    data_source: Mutex<DataSource>,
    state: Mutex<State>,
    stash: Mutex<StashEngine>,
    sampler: SpeedSampler,
    loader: Mutex<Option<Arc<dyn Loader>>>,
    callbacks: Mutex<Callbacks<E>>,
    extra_data: E,
}

impl<E: Send + Sync + 'static> Controller<E> {
    pub fn new(
        config: ControllerConfig,
        data_source: DataSource,
        factory: Arc<dyn LoaderFactory>,
        seek_handler: Arc<dyn SeekHandler>,
        extra_data: E,
    ) -> Result<Arc<Self>, ControllerError> {
        if config.stash_initial_size == 0 {
            return Err(ControllerError::InvalidArgument(
                "stash_initial_size must be greater than 0".to_string(),
            ));
        }
        if data_source.url.is_empty() {
            return Err(ControllerError::InvalidArgument(
                "url must not be empty".to_string(),
            ));
        }

        let total_length = data_source.filesize;
        let stash = StashEngine::new(config.stash_initial_size);
        let enable_stash = config.enable_stash_buffer;

        Ok(Arc::new_cyclic(|weak| Controller {
            self_weak: weak.clone(),
            stash: Mutex::new(stash),
            sampler: SpeedSampler::new(),
            data_source: Mutex::new(data_source),
            state: Mutex::new(State {
                current_range: Range::open_ended(0),
                full_request_flag: true,
                paused: false,
                resume_from: 0,
                early_eof_reconnecting: false,
                last_normalized_speed: 0,
                total_length,
                enable_stash,
                has_redirect: false,
            }),
            loader: Mutex::new(None),
            callbacks: Mutex::new(Callbacks::new()),
            config,
            factory,
            seek_handler,
            extra_data,
        }))
    }

    fn arc_self(&self) -> Arc<Self> {
        self.self_weak
            .upgrade()
            .expect("controller dropped while still processing a callback")
    }

    // --- callback registration -------------------------------------------

    pub fn set_on_data_arrival(&self, cb: impl FnMut(&[u8], u64) -> usize + Send + 'static) {
        self.callbacks.lock().on_data_arrival = Some(Box::new(cb));
    }

    pub fn set_on_seeked(&self, cb: impl FnMut() + Send + 'static) {
        self.callbacks.lock().on_seeked = Some(Box::new(cb));
    }

    pub fn set_on_error(&self, cb: impl FnMut(LoaderErrorKind, Option<u16>, &str) + Send + 'static) {
        self.callbacks.lock().on_error = Some(Box::new(cb));
    }

    pub fn set_on_complete(&self, cb: impl FnMut(&E) + Send + 'static) {
        self.callbacks.lock().on_complete = Some(Box::new(cb));
    }

    pub fn set_on_redirect(&self, cb: impl FnMut(&str) + Send + 'static) {
        self.callbacks.lock().on_redirect = Some(Box::new(cb));
    }

    pub fn set_on_recovered_early_eof(&self, cb: impl FnMut() + Send + 'static) {
        self.callbacks.lock().on_recovered_early_eof = Some(Box::new(cb));
    }

    // --- public operations -----------------------------------------

    pub async fn open(&self, optional_from: Option<u64>) -> Result<(), ControllerError> {
        if self.callbacks.lock().on_data_arrival.is_none() {
            return Err(ControllerError::IllegalState(
                "on_data_arrival must be set before open".to_string(),
            ));
        }

        let from = optional_from.unwrap_or(0);
        {
            let mut state = self.state.lock();
            state.current_range = Range::open_ended(from);
            state.full_request_flag = optional_from.is_none();
        }

        self.sampler.reset();
        self.open_loader(Range::open_ended(from)).await;
        Ok(())
    }

    /// Aborts the current Loader. Per the fix recommended for the source's
    /// stash-leak (documented separately), this flushes the stash rather
    /// than silently retaining it across the next `open`.
    pub async fn abort(&self) {
        let loader = self.loader.lock().clone();
        if let Some(loader) = &loader {
            if loader.is_working() {
                loader.abort().await;
            }
        }

        self.flush_stash(false);

        let mut state = self.state.lock();
        if state.paused {
            state.paused = false;
            state.resume_from = 0;
        }
    }

    pub async fn pause(&self) {
        let loader = self.loader.lock().clone();
        let working = loader.as_ref().map(|l| l.is_working()).unwrap_or(false);
        if !working {
            return;
        }

        if let Some(loader) = loader {
            loader.abort().await;
        }

        let mut state = self.state.lock();
        let mut stash = self.stash.lock();

        if !stash.is_empty() {
            let byte_start = stash.byte_start();
            state.resume_from = byte_start;
            state.current_range.to = byte_start as i64 - 1;
        } else {
            state.resume_from = (state.current_range.to + 1).max(0) as u64;
        }

        stash.reset();
        state.paused = true;
    }

    pub async fn resume(&self) -> Result<(), ControllerError> {
        let bytes = {
            let mut state = self.state.lock();
            if !state.paused {
                return Ok(());
            }
            state.paused = false;
            let bytes = state.resume_from;
            state.resume_from = 0;
            bytes
        };

        self.internal_seek(bytes, true).await
    }

    pub async fn seek(&self, bytes: u64) -> Result<(), ControllerError> {
        self.state.lock().paused = false;
        self.stash.lock().reset();
        self.internal_seek(bytes, true).await
    }

    pub async fn update_url(&self, url: impl Into<String>) -> Result<(), ControllerError> {
        let url = url.into();
        if url.is_empty() {
            return Err(ControllerError::InvalidArgument(
                "url must not be empty".to_string(),
            ));
        }
        self.data_source.lock().url = url;
        Ok(())
    }

    pub async fn destroy(&self) {
        let loader = self.loader.lock().take();
        if let Some(loader) = loader {
            if loader.is_working() {
                loader.abort().await;
            }
            loader.destroy().await;
        }
        self.stash.lock().reset();
        *self.callbacks.lock() = Callbacks::new();
    }

    /// Aborts the current loader, flushes or discards the stash, then
    /// reopens a fresh loader at `bytes`.
    async fn internal_seek(&self, bytes: u64, drop_unconsumed: bool) -> Result<(), ControllerError> {
        let loader = self.loader.lock().clone();
        if let Some(loader) = &loader {
            if loader.is_working() {
                loader.abort().await;
            }
        }

        self.flush_stash(drop_unconsumed);

        {
            let mut state = self.state.lock();
            state.current_range = Range::open_ended(bytes);
        }

        self.sampler.reset();
        self.stash.lock().reset_stash_size(self.config.stash_initial_size);

        self.open_loader(Range::open_ended(bytes)).await;

        let mut callbacks = self.callbacks.lock();
        if let Some(cb) = callbacks.on_seeked.as_mut() {
            cb();
        }

        Ok(())
    }

    async fn open_loader(&self, range: Range) {
        let loader = self.factory.create();
        let needs_stash = loader.needs_stash_buffer();

        {
            let mut state = self.state.lock();
            state.enable_stash = self.config.enable_stash_buffer && needs_stash;
        }

        *self.loader.lock() = Some(loader.clone());

        let mut source = self.data_source.lock().clone();
        if self.config.reuse_redirected_url {
            if let Some(redirected) = source.redirected_url.clone() {
                source.url = redirected;
            }
        }

        let sink: Arc<dyn LoaderEventSink> = self.arc_self();
        loader.open(&source, range, sink).await;
    }

    /// Flushes whatever the stash is holding, routed through the bound
    /// `on_data_arrival` consumer.
    fn flush_stash(&self, drop_unconsumed: bool) -> usize {
        let mut stash = self.stash.lock();
        let mut callbacks = self.callbacks.lock();

        stash.flush(drop_unconsumed, |bytes, byte_start| {
            callbacks
                .on_data_arrival
                .as_mut()
                .map(|cb| cb(bytes, byte_start))
                .unwrap_or(0)
        })
    }

    fn escalate_error(&self, error: LoaderError) {
        self.flush_stash(false);

        let mut callbacks = self.callbacks.lock();
        match callbacks.on_error.as_mut() {
            Some(cb) => cb(error.kind, error.code, &error.msg),
            None => panic!("unhandled loader error with no on_error bound: {error}"),
        }
    }

    /// Runs the full chunk arrival algorithm: early-EOF recovery bookkeeping,
    /// speed sampling, stash sizing, then dispatch.
    fn on_loader_chunk_arrival(&self, chunk: ChunkEvent) {
        if self.callbacks.lock().on_data_arrival.is_none() {
            panic!("on_data_arrival must be set before any bytes arrive");
        }

        if self.state.lock().paused {
            return;
        }

        let was_reconnecting = {
            let mut state = self.state.lock();
            let was = state.early_eof_reconnecting;
            state.early_eof_reconnecting = false;
            was
        };
        if was_reconnecting {
            let mut callbacks = self.callbacks.lock();
            if let Some(cb) = callbacks.on_recovered_early_eof.as_mut() {
                cb();
            }
        }

        let now = Instant::now();
        self.sampler.add_bytes(chunk.bytes.len(), now);

        let kbps = self.sampler.last_second_kbps(now);
        if kbps > 0.0 {
            let normalized = normalize(kbps.round() as u32, SPEED_LADDER_KB);
            let changed = {
                let mut state = self.state.lock();
                let changed = state.last_normalized_speed != normalized;
                state.last_normalized_speed = normalized;
                changed
            };
            if changed {
                self.adjust_stash_size(normalized);
            }
        }

        let enable_stash = self.state.lock().enable_stash;
        let byte_start = chunk.byte_start;
        let chunk_len = chunk.bytes.len() as u64;

        if enable_stash {
            self.dispatch_stash_enabled(chunk);
        } else {
            self.dispatch_stash_disabled(chunk);
        }

        let mut state = self.state.lock();
        state.current_range.to = (byte_start + chunk_len) as i64 - 1;
    }

    fn dispatch_stash_disabled(&self, chunk: ChunkEvent) {
        let mut stash = self.stash.lock();
        let mut callbacks = self.callbacks.lock();

        if stash.is_empty() {
            let consumed = callbacks
                .on_data_arrival
                .as_mut()
                .map(|cb| cb(&chunk.bytes, chunk.byte_start))
                .unwrap_or(0);

            if consumed < chunk.bytes.len() {
                stash.replace_with(chunk.byte_start + consumed as u64, &chunk.bytes[consumed..]);
            }
        } else {
            stash.append(&chunk.bytes);
            stash.flush(false, |bytes, byte_start| {
                callbacks
                    .on_data_arrival
                    .as_mut()
                    .map(|cb| cb(bytes, byte_start))
                    .unwrap_or(0)
            });
        }
    }

    fn dispatch_stash_enabled(&self, chunk: ChunkEvent) {
        let mut stash = self.stash.lock();
        let mut callbacks = self.callbacks.lock();

        if stash.is_empty() && stash.byte_start() == 0 {
            stash.set_fresh_start(chunk.byte_start);
        }

        if stash.used() + chunk.bytes.len() <= stash.stash_size() {
            stash.append(&chunk.bytes);
            return;
        }

        if !stash.is_empty() {
            stash.flush(false, |bytes, byte_start| {
                callbacks
                    .on_data_arrival
                    .as_mut()
                    .map(|cb| cb(bytes, byte_start))
                    .unwrap_or(0)
            });
            stash.append(&chunk.bytes);
        } else {
            let consumed = callbacks
                .on_data_arrival
                .as_mut()
                .map(|cb| cb(&chunk.bytes, chunk.byte_start))
                .unwrap_or(0);

            if consumed < chunk.bytes.len() {
                stash.replace_with(chunk.byte_start + consumed as u64, &chunk.bytes[consumed..]);
            }
        }
    }

    /// Recomputes the stash's target size from a newly normalized speed
    /// rung and grows the backing buffer to match.
    fn adjust_stash_size(&self, normalized: u32) {
        let stash_size_kb: u32 = if self.config.is_live {
            normalized
        } else if normalized < 512 {
            normalized
        } else if normalized <= 1024 {
            (normalized as f64 * 1.5).floor() as u32
        } else {
            normalized * 2
        }
        .min(8192);

        let desired_buffer = stash_size_kb as usize * 1024 + StashEngine::BUFFER_HEADROOM;

        let mut stash = self.stash.lock();
        stash.grow_to(desired_buffer);
        stash.set_stash_size(stash_size_kb as usize * 1024);
    }

    // --- observables ------------------------------------------------

    pub fn status(&self) -> LoaderStatus {
        self.loader
            .lock()
            .as_ref()
            .map(|l| l.status())
            .unwrap_or(LoaderStatus::Idle)
    }

    pub fn is_working(&self) -> bool {
        let paused = self.state.lock().paused;
        !paused && self.loader.lock().as_ref().map(|l| l.is_working()).unwrap_or(false)
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn current_speed_kbps(&self, now: Instant) -> f64 {
        self.sampler.last_second_kbps(now)
    }

    pub fn current_url(&self) -> String {
        self.data_source.lock().url.clone()
    }

    pub fn has_redirect(&self) -> bool {
        self.state.lock().has_redirect
    }

    pub fn current_redirected_url(&self) -> Option<String> {
        self.data_source.lock().redirected_url.clone()
    }

    pub fn loader_type(&self) -> LoaderType {
        self.factory.loader_type()
    }
}

impl<E: Send + Sync + 'static> LoaderEventSink for Controller<E> {
    fn on_content_length_known(&self, len: u64) {
        let mut state = self.state.lock();
        if state.full_request_flag {
            state.total_length = Some(len);
        }
    }

    fn on_url_redirect(&self, url: &str) {
        {
            let mut state = self.state.lock();
            state.has_redirect = true;
        }
        self.data_source.lock().redirected_url = Some(url.to_string());

        let mut callbacks = self.callbacks.lock();
        if let Some(cb) = callbacks.on_redirect.as_mut() {
            cb(url);
        }
    }

    fn on_data_arrival(&self, chunk: ChunkEvent) {
        self.on_loader_chunk_arrival(chunk);
    }

    fn on_complete(&self, _range_from: u64, _range_to: i64) {
        self.flush_stash(false);

        let mut callbacks = self.callbacks.lock();
        if let Some(cb) = callbacks.on_complete.as_mut() {
            cb(&self.extra_data);
        }
    }

    fn on_error(&self, error: LoaderError) {
        if error.kind == LoaderErrorKind::EarlyEof {
            let (can_reconnect, resume_from) = {
                let state = self.state.lock();
                let resume_from = (state.current_range.to + 1).max(0) as u64;
                let can = !self.config.is_live
                    && state
                        .total_length
                        .map(|total| resume_from < total)
                        .unwrap_or(false);
                (can, resume_from)
            };

            if can_reconnect {
                self.state.lock().early_eof_reconnecting = true;
                self.flush_stash(false);

                let controller = self.arc_self();
                tokio::spawn(async move {
                    let _ = controller.internal_seek(resume_from, false).await;
                });
                return;
            }

            self.escalate_error(LoaderError::new(
                LoaderErrorKind::UnrecoverableEarlyEof,
                error.msg,
            ));
            return;
        }

        self.escalate_error(error);
    }
}

impl<E: Send + Sync + 'static> Introspect<ControllerObservables> for Controller<E> {
    fn introspect(&self) -> ControllerObservables {
        ControllerObservables {
            status: self.status(),
            is_working: self.is_working(),
            is_paused: self.is_paused(),
            current_speed_kbps: self.current_speed_kbps(Instant::now()),
            current_url: self.current_url(),
            has_redirect: self.has_redirect(),
            current_redirected_url: self.current_redirected_url(),
            loader_type: self.loader_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::loader::test_support::MockLoader;
    use crate::seek::RangeSeekHandler;

    use super::*;

    struct MockFactory {
        needs_stash_buffer: bool,
        loader_type: LoaderType,
    }

    impl LoaderFactory for MockFactory {
        fn create(&self) -> Arc<dyn Loader> {
            Arc::new(MockLoader::new(self.needs_stash_buffer, self.loader_type))
        }

        fn loader_type(&self) -> LoaderType {
            self.loader_type
        }
    }

    fn new_controller(config: ControllerConfig, needs_stash_buffer: bool) -> Arc<Controller<()>> {
        Controller::new(
            config,
            DataSource::new("https://example.test/a.bin"),
            Arc::new(MockFactory {
                needs_stash_buffer,
                loader_type: LoaderType::Streaming,
            }),
            Arc::new(RangeSeekHandler::default()),
            (),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_requires_on_data_arrival() {
        let controller = new_controller(ControllerConfig::default(), true);
        let err = controller.open(None).await.unwrap_err();
        assert!(matches!(err, ControllerError::IllegalState(_)));
    }

    #[tokio::test]
    async fn test_stash_enabled_flush_combines_chunks() {
        // Scenario S1: two chunks accumulate in the stash and are dispatched
        // as one combined window on_complete (not merely on abort/destroy),
        // and on_complete itself still fires afterward.
        let mut config = ControllerConfig::default();
        config.stash_initial_size = 1024;
        let controller = new_controller(config, true);

        let dispatches: Arc<Mutex<Vec<(Vec<u8>, u64)>>> = Arc::new(Mutex::new(Vec::new()));
        let dispatches_cb = dispatches.clone();
        controller.set_on_data_arrival(move |bytes, byte_start| {
            dispatches_cb.lock().push((bytes.to_vec(), byte_start));
            bytes.len()
        });

        let completed = Arc::new(AtomicUsize::new(0));
        let completed_cb = completed.clone();
        controller.set_on_complete(move |_| {
            completed_cb.fetch_add(1, Ordering::SeqCst);
        });

        controller.open(None).await.unwrap();

        LoaderEventSink::on_data_arrival(
            &*controller,
            ChunkEvent {
                bytes: b"ABCDE".to_vec(),
                byte_start: 0,
                received_length_so_far: 5,
            },
        );
        LoaderEventSink::on_data_arrival(
            &*controller,
            ChunkEvent {
                bytes: b"FGHIJ".to_vec(),
                byte_start: 5,
                received_length_so_far: 10,
            },
        );

        LoaderEventSink::on_complete(&*controller, 0, 9);

        let dispatched = dispatches.lock();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0], (b"ABCDEFGHIJ".to_vec(), 0));
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_consumption_stash_disabled() {
        // Stash disabled: each arrival dispatches only what downstream
        // consumes, retaining the rest for the next call.
        let mut config = ControllerConfig::default();
        config.enable_stash_buffer = false;
        let controller = new_controller(config, false);

        let calls = Arc::new(AtomicUsize::new(0));
        let dispatches: Arc<Mutex<Vec<(Vec<u8>, u64)>>> = Arc::new(Mutex::new(Vec::new()));
        let calls_cb = calls.clone();
        let dispatches_cb = dispatches.clone();
        controller.set_on_data_arrival(move |bytes, byte_start| {
            dispatches_cb.lock().push((bytes.to_vec(), byte_start));
            let n = calls_cb.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                4
            } else {
                bytes.len()
            }
        });

        controller.open(None).await.unwrap();

        LoaderEventSink::on_data_arrival(
            &*controller,
            ChunkEvent {
                bytes: b"0123456789".to_vec(),
                byte_start: 100,
                received_length_so_far: 10,
            },
        );

        {
            let dispatched = dispatches.lock();
            assert_eq!(dispatched.len(), 1);
            assert_eq!(dispatched[0], (b"0123456789".to_vec(), 100));
        }

        controller.abort().await;

        let dispatched = dispatches.lock();
        assert_eq!(dispatched.len(), 2);
        assert_eq!(dispatched[1], (b"456789".to_vec(), 104));
    }

    #[tokio::test]
    async fn test_pause_across_stash_then_resume() {
        // Consumer retains less than the full chunk, then the session is
        // paused and resumed from the first unconsumed byte.
        let mut config = ControllerConfig::default();
        config.enable_stash_buffer = false;
        let controller = new_controller(config, false);

        controller.set_on_data_arrival(|bytes, _| bytes.len().min(60));

        controller.open(None).await.unwrap();

        LoaderEventSink::on_data_arrival(
            &*controller,
            ChunkEvent {
                bytes: vec![0u8; 100],
                byte_start: 0,
                received_length_so_far: 100,
            },
        );

        controller.pause().await;

        assert!(controller.is_paused());

        controller.resume().await.unwrap();
        assert!(!controller.is_paused());
    }

    #[tokio::test]
    async fn test_update_url_rejects_empty() {
        let controller = new_controller(ControllerConfig::default(), true);
        let err = controller.update_url("").await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_seek_resets_current_range() {
        let controller = new_controller(ControllerConfig::default(), true);
        controller.set_on_data_arrival(|bytes, _| bytes.len());
        controller.open(None).await.unwrap();

        controller.seek(500).await.unwrap();

        // A fresh chunk starting exactly at the sought offset should be
        // accepted as the new in-order start.
        LoaderEventSink::on_data_arrival(
            &*controller,
            ChunkEvent {
                bytes: b"hello".to_vec(),
                byte_start: 500,
                received_length_so_far: 5,
            },
        );

        assert!(!controller.is_paused());
    }

    #[tokio::test]
    async fn test_on_complete_receives_extra_data() {
        // A Controller parameterized over a non-unit extra_data type hands
        // that value back to the bound on_complete callback by reference.
        let controller = Controller::new(
            ControllerConfig::default(),
            DataSource::new("https://example.test/a.bin"),
            Arc::new(MockFactory {
                needs_stash_buffer: true,
                loader_type: LoaderType::Streaming,
            }),
            Arc::new(RangeSeekHandler::default()),
            "session-42".to_string(),
        )
        .unwrap();

        controller.set_on_data_arrival(|bytes, _| bytes.len());

        let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let seen_cb = seen.clone();
        controller.set_on_complete(move |extra_data| {
            *seen_cb.lock() = Some(extra_data.clone());
        });

        controller.open(None).await.unwrap();
        LoaderEventSink::on_complete(&*controller, 0, -1);

        assert_eq!(seen.lock().as_deref(), Some("session-42"));
    }
}
