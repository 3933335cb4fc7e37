use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use crossbeam::atomic::AtomicCell;
use tokio::sync::Notify;

use castloader_core::{
    normalize, ChunkEvent, DataSource, Loader, LoaderError, LoaderErrorKind, LoaderEventSink,
    LoaderStatus, LoaderType, Range, SeekHandler, SpeedSampler,
};

use crate::http::connect_error;

/// Chunk-size ladder used to adapt sub-range GET size to throughput, in KiB.
const CHUNK_SIZE_LADDER_KB: &[u32] = &[
    128, 256, 384, 512, 768, 1024, 1536, 2048, 3072, 4096, 5120, 6144, 7168, 8192,
];

const INITIAL_CHUNK_SIZE_KB: u32 = 128;

struct Inner {
    client: reqwest::Client,
    seek_handler: Arc<dyn SeekHandler>,
    extra_headers: Vec<(String, String)>,
    status: AtomicCell<LoaderStatus>,
    request_abort: AtomicBool,
    abort_notify: Notify,
    current_chunk_size_kb: AtomicU32,
}

impl Inner {
    async fn probe_total_length(&self, source: &DataSource) -> Option<u64> {
        let shape = self.seek_handler.shape(Range::open_ended(0));
        let mut req = self.client.get(shape.request_url(&source.url));
        for (k, v) in &shape.headers {
            req = req.header(k.clone(), v.clone());
        }

        let resp = tokio::select! {
            r = req.send() => r.ok()?,
            _ = self.abort_notify.notified() => return None,
        };

        content_range_total(&resp).or_else(|| resp.content_length())
    }

    async fn run(self: Arc<Self>, source: DataSource, range: Range, sink: Arc<dyn LoaderEventSink>) {
        let mut total_length = source.filesize;
        if total_length.is_none() {
            total_length = self.probe_total_length(&source).await;
        }
        if self.request_abort.load(Ordering::SeqCst) {
            return;
        }

        if let Some(len) = total_length {
            sink.on_content_length_known(len);
        }

        self.status.store(LoaderStatus::Buffering);

        let mut cursor = range.from;
        let mut received: u64 = 0;
        let mut consecutive_zero_kbps = 0u32;
        let sampler = SpeedSampler::new();

        loop {
            if self.request_abort.load(Ordering::SeqCst) {
                return;
            }

            if let Some(total) = total_length {
                if cursor >= total {
                    self.status.store(LoaderStatus::Complete);
                    sink.on_complete(range.from, total as i64 - 1);
                    return;
                }
            }

            let chunk_size_bytes = self.current_chunk_size_kb.load(Ordering::SeqCst) as u64 * 1024;
            let to = total_length
                .map(|total| (cursor + chunk_size_bytes - 1).min(total - 1))
                .unwrap_or(cursor + chunk_size_bytes - 1);

            let shape = self.seek_handler.shape(Range::bounded(cursor, to));
            let mut req = self.client.get(shape.request_url(&source.url));
            for (k, v) in &shape.headers {
                req = req.header(k.clone(), v.clone());
            }
            for (k, v) in &self.extra_headers {
                req = req.header(k.clone(), v.clone());
            }

            let resp = tokio::select! {
                r = req.send() => r,
                _ = self.abort_notify.notified() => return,
            };

            let resp = match resp {
                Ok(r) => r,
                Err(e) => {
                    self.status.store(LoaderStatus::Error);
                    sink.on_error(connect_error(e));
                    return;
                }
            };

            if !resp.status().is_success() {
                let code = resp.status().as_u16();
                self.status.store(LoaderStatus::Error);
                sink.on_error(
                    LoaderError::new(LoaderErrorKind::HttpStatusCodeInvalid, resp.status().to_string())
                        .with_code(code),
                );
                return;
            }

            let bytes = tokio::select! {
                b = resp.bytes() => b,
                _ = self.abort_notify.notified() => return,
            };

            let bytes = match bytes {
                Ok(b) => b,
                Err(e) => {
                    self.status.store(LoaderStatus::Error);
                    sink.on_error(LoaderError::new(LoaderErrorKind::Exception, e.to_string()));
                    return;
                }
            };

            if self.request_abort.load(Ordering::SeqCst) {
                return;
            }

            let byte_start = cursor;
            let len = bytes.len() as u64;
            if len == 0 {
                self.status.store(LoaderStatus::Complete);
                sink.on_complete(range.from, byte_start as i64 - 1);
                return;
            }

            cursor += len;
            received += len;

            sink.on_data_arrival(ChunkEvent {
                bytes: bytes.to_vec(),
                byte_start,
                received_length_so_far: received,
            });

            let now = Instant::now();
            sampler.add_bytes(len as usize, now);
            let last_second = sampler.last_second_kbps(now);

            if last_second == 0.0 {
                consecutive_zero_kbps += 1;
            } else {
                consecutive_zero_kbps = 0;
            }

            let effective_kbps = if consecutive_zero_kbps >= 3 {
                sampler.current_kbps(now)
            } else {
                last_second
            };

            if effective_kbps > 0.0 {
                let normalized = normalize(effective_kbps.round() as u32, CHUNK_SIZE_LADDER_KB);
                self.current_chunk_size_kb.store(normalized, Ordering::SeqCst);
            }
        }
    }
}

fn content_range_total(resp: &reqwest::Response) -> Option<u64> {
    let value = resp.headers().get(reqwest::header::CONTENT_RANGE)?;
    let text = value.to_str().ok()?;
    let (_, total) = text.rsplit_once('/')?;
    total.parse().ok()
}

/// Issues successive byte-range GETs, growing or shrinking the sub-range
/// size with observed throughput. Reports `needs_stash_buffer =
/// false` since every delivered chunk is already a complete, ready-to-
/// dispatch sub-range.
pub struct RangedLoader {
    inner: Arc<Inner>,
}

impl RangedLoader {
    pub fn new(
        client: reqwest::Client,
        seek_handler: Arc<dyn SeekHandler>,
        extra_headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                seek_handler,
                extra_headers,
                status: AtomicCell::new(LoaderStatus::Idle),
                request_abort: AtomicBool::new(false),
                abort_notify: Notify::new(),
                current_chunk_size_kb: AtomicU32::new(INITIAL_CHUNK_SIZE_KB),
            }),
        }
    }
}

#[async_trait]
impl Loader for RangedLoader {
    async fn open(&self, source: &DataSource, range: Range, sink: Arc<dyn LoaderEventSink>) {
        self.inner.status.store(LoaderStatus::Connecting);
        self.inner.request_abort.store(false, Ordering::SeqCst);

        let inner = self.inner.clone();
        let source = source.clone();

        tokio::spawn(async move {
            inner.run(source, range, sink).await;
        });
    }

    async fn abort(&self) {
        self.inner.request_abort.store(true, Ordering::SeqCst);
        self.inner.abort_notify.notify_waiters();
        self.inner.status.store(LoaderStatus::Idle);
    }

    async fn destroy(&self) {
        self.inner.request_abort.store(true, Ordering::SeqCst);
        self.inner.abort_notify.notify_waiters();
    }

    fn status(&self) -> LoaderStatus {
        self.inner.status.load()
    }

    fn needs_stash_buffer(&self) -> bool {
        false
    }

    fn loader_type(&self) -> LoaderType {
        LoaderType::Ranged
    }
}
