use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use crossbeam::atomic::AtomicCell;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;

use castloader_core::{
    ChunkEvent, DataSource, Loader, LoaderError, LoaderErrorKind, LoaderEventSink, LoaderStatus,
    LoaderType, Range,
};

/// How long a handshake may take before it's reported as a
/// `ConnectingTimeout` rather than left to hang.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

struct Inner {
    status: AtomicCell<LoaderStatus>,
    request_abort: AtomicBool,
    abort_notify: Notify,
}

impl Inner {
    async fn run(self: Arc<Self>, source: DataSource, sink: Arc<dyn LoaderEventSink>) {
        let connect = tokio::time::timeout(
            CONNECT_TIMEOUT,
            tokio_tungstenite::connect_async(&source.url),
        );

        let stream = tokio::select! {
            r = connect => r,
            _ = self.abort_notify.notified() => return,
        };

        let (ws_stream, _response) = match stream {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                self.status.store(LoaderStatus::Error);
                sink.on_error(LoaderError::new(LoaderErrorKind::Exception, e.to_string()));
                return;
            }
            Err(_elapsed) => {
                self.status.store(LoaderStatus::Error);
                sink.on_error(LoaderError::new(
                    LoaderErrorKind::ConnectingTimeout,
                    format!("websocket handshake exceeded {CONNECT_TIMEOUT:?}"),
                ));
                return;
            }
        };

        if self.request_abort.load(Ordering::SeqCst) {
            return;
        }

        self.status.store(LoaderStatus::Buffering);

        let (_write, mut read) = ws_stream.split();
        let mut received: u64 = 0;

        loop {
            if self.request_abort.load(Ordering::SeqCst) {
                return;
            }

            let next = tokio::select! {
                n = read.next() => n,
                _ = self.abort_notify.notified() => return,
            };

            match next {
                Some(Ok(Message::Binary(bytes))) => {
                    self.dispatch(&sink, &mut received, bytes.to_vec());
                }
                Some(Ok(Message::Text(text))) => {
                    self.dispatch(&sink, &mut received, text.as_bytes().to_vec());
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.status.store(LoaderStatus::Complete);
                    sink.on_complete(0, received as i64 - 1);
                    return;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    self.status.store(LoaderStatus::Error);
                    sink.on_error(LoaderError::new(
                        LoaderErrorKind::Exception,
                        "unsupported websocket frame kind".to_string(),
                    ));
                    return;
                }
                Some(Err(e)) => {
                    self.status.store(LoaderStatus::Error);
                    sink.on_error(LoaderError::new(LoaderErrorKind::Exception, e.to_string()));
                    return;
                }
            }
        }
    }

    fn dispatch(&self, sink: &Arc<dyn LoaderEventSink>, received: &mut u64, bytes: Vec<u8>) {
        let byte_start = *received;
        *received += bytes.len() as u64;
        sink.on_data_arrival(ChunkEvent {
            bytes,
            byte_start,
            received_length_so_far: *received,
        });
    }
}

/// A WebSocket Loader. Ignores the requested `Range`: frames
/// arrive in connection order regardless of what range was asked for, with
/// `byte_start` tracked as the number of bytes already delivered on this
/// connection rather than an offset into the resource.
pub struct WebSocketLoader {
    inner: Arc<Inner>,
}

impl WebSocketLoader {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                status: AtomicCell::new(LoaderStatus::Idle),
                request_abort: AtomicBool::new(false),
                abort_notify: Notify::new(),
            }),
        }
    }

    pub fn url_is_supported(url: &str) -> bool {
        url.starts_with("ws://") || url.starts_with("wss://")
    }
}

impl Default for WebSocketLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Loader for WebSocketLoader {
    async fn open(&self, source: &DataSource, _range: Range, sink: Arc<dyn LoaderEventSink>) {
        self.inner.status.store(LoaderStatus::Connecting);
        self.inner.request_abort.store(false, Ordering::SeqCst);

        let inner = self.inner.clone();
        let source = source.clone();

        tokio::spawn(async move {
            inner.run(source, sink).await;
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
        LoaderType::WebSocket
    }
}
