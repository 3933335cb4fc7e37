use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use crossbeam::atomic::AtomicCell;
use tokio::sync::Notify;

use castloader_core::{
    ChunkEvent, DataSource, Loader, LoaderError, LoaderErrorKind, LoaderEventSink, LoaderStatus,
    LoaderType, Range, SeekHandler,
};

use crate::http::connect_error;

struct Inner {
    client: reqwest::Client,
    seek_handler: Arc<dyn SeekHandler>,
    extra_headers: Vec<(String, String)>,
    status: AtomicCell<LoaderStatus>,
    request_abort: AtomicBool,
    abort_notify: Notify,
}

impl Inner {
    async fn run(self: Arc<Self>, source: DataSource, range: Range, sink: Arc<dyn LoaderEventSink>) {
        let shape = self.seek_handler.shape(range);
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

        if self.request_abort.load(Ordering::SeqCst) {
            return;
        }

        if resp.url().as_str() != source.url {
            sink.on_url_redirect(resp.url().as_str());
        }

        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            self.status.store(LoaderStatus::Error);
            sink.on_error(
                LoaderError::new(LoaderErrorKind::HttpStatusCodeInvalid, resp.status().to_string())
                    .with_code(code),
            );
            return;
        }

        let content_length = resp.content_length();
        if let Some(len) = content_length {
            sink.on_content_length_known(len);
        }

        self.status.store(LoaderStatus::Buffering);

        let mut stream = resp.bytes_stream();
        let mut cursor = range.from;
        let mut received: u64 = 0;

        loop {
            if self.request_abort.load(Ordering::SeqCst) {
                return;
            }

            let next = tokio::select! {
                n = stream.next() => n,
                _ = self.abort_notify.notified() => return,
            };

            match next {
                Some(Ok(bytes)) => {
                    let byte_start = cursor;
                    let len = bytes.len() as u64;
                    cursor += len;
                    received += len;

                    sink.on_data_arrival(ChunkEvent {
                        bytes: bytes.to_vec(),
                        byte_start,
                        received_length_so_far: received,
                    });
                }
                Some(Err(e)) => {
                    // A network error mid-stream is treated as an early EOF,
                    // same as an unexpectedly short body.
                    self.status.store(LoaderStatus::Error);
                    sink.on_error(LoaderError::new(LoaderErrorKind::EarlyEof, e.to_string()));
                    return;
                }
                None => {
                    if let Some(total) = content_length {
                        if received < total {
                            self.status.store(LoaderStatus::Error);
                            sink.on_error(LoaderError::new(
                                LoaderErrorKind::EarlyEof,
                                format!("stream ended at {received} of {total} bytes"),
                            ));
                            return;
                        }
                    }

                    self.status.store(LoaderStatus::Complete);
                    sink.on_complete(range.from, cursor as i64 - 1);
                    return;
                }
            }
        }
    }
}

/// A fetch-style streaming Loader: delivers raw, unpredictably
/// sized chunks as they arrive off a single long-lived response body.
/// Reports `needs_stash_buffer = true` since, unlike [`crate::RangedLoader`],
/// it has no natural sub-range boundaries of its own.
pub struct StreamingLoader {
    inner: Arc<Inner>,
}

impl StreamingLoader {
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
            }),
        }
    }
}

#[async_trait]
impl Loader for StreamingLoader {
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
        true
    }

    fn loader_type(&self) -> LoaderType {
        LoaderType::Streaming
    }
}
