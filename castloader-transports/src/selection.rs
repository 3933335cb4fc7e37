use std::sync::Arc;

use castloader_core::{ControllerConfig, DataSource, Loader, LoaderFactory, LoaderType, SeekHandler};

use crate::ranged_loader::RangedLoader;
use crate::streaming_loader::StreamingLoader;
use crate::websocket_loader::WebSocketLoader;

struct RangedLoaderFactory {
    client: reqwest::Client,
    seek_handler: Arc<dyn SeekHandler>,
    headers: Vec<(String, String)>,
}

impl LoaderFactory for RangedLoaderFactory {
    fn create(&self) -> Arc<dyn Loader> {
        Arc::new(RangedLoader::new(
            self.client.clone(),
            self.seek_handler.clone(),
            self.headers.clone(),
        ))
    }

    fn loader_type(&self) -> LoaderType {
        LoaderType::Ranged
    }
}

struct StreamingLoaderFactory {
    client: reqwest::Client,
    seek_handler: Arc<dyn SeekHandler>,
    headers: Vec<(String, String)>,
}

impl LoaderFactory for StreamingLoaderFactory {
    fn create(&self) -> Arc<dyn Loader> {
        Arc::new(StreamingLoader::new(
            self.client.clone(),
            self.seek_handler.clone(),
            self.headers.clone(),
        ))
    }

    fn loader_type(&self) -> LoaderType {
        LoaderType::Streaming
    }
}

struct WebSocketLoaderFactory;

impl LoaderFactory for WebSocketLoaderFactory {
    fn create(&self) -> Arc<dyn Loader> {
        Arc::new(WebSocketLoader::new())
    }

    fn loader_type(&self) -> LoaderType {
        LoaderType::WebSocket
    }
}

/// Picks which Loader variant backs a session, implementing a first-match
/// ladder: a caller-supplied override, then WebSocket by URL scheme, then
/// fetch-style streaming.
///
/// The browser-era distinction between "fetch-style streaming" and "chunked
/// XHR" collapses here: a native client built on `reqwest` either streams a
/// response body or it doesn't, so [`StreamingLoader`] stands in for both,
/// and wins over [`RangedLoader`] whenever neither a custom loader nor a
/// `wss?://` URL is in play — exactly mirroring how a modern browser
/// reaches for `fetch` streaming ahead of the chunked-XHR and plain-ranged
/// fallbacks it still carries for older targets. To force ranged loading,
/// supply it as `custom_factory`.
pub fn select_loader_factory(
    _config: &ControllerConfig,
    data_source: &DataSource,
    custom_factory: Option<Arc<dyn LoaderFactory>>,
    client: reqwest::Client,
    seek_handler: Arc<dyn SeekHandler>,
    headers: Vec<(String, String)>,
) -> Arc<dyn LoaderFactory> {
    if let Some(factory) = custom_factory {
        return factory;
    }

    if WebSocketLoader::url_is_supported(&data_source.url) {
        return Arc::new(WebSocketLoaderFactory);
    }

    Arc::new(StreamingLoaderFactory {
        client,
        seek_handler,
        headers,
    })
}

/// Exposed for callers that want to force ranged loading explicitly rather
/// than relying on [`select_loader_factory`]'s default preference for
/// streaming.
pub fn ranged_loader_factory(
    client: reqwest::Client,
    seek_handler: Arc<dyn SeekHandler>,
    headers: Vec<(String, String)>,
) -> Arc<dyn LoaderFactory> {
    Arc::new(RangedLoaderFactory {
        client,
        seek_handler,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use castloader_core::RangeSeekHandler;

    use super::*;

    #[test]
    fn test_selects_websocket_by_scheme() {
        let factory = select_loader_factory(
            &ControllerConfig::default(),
            &DataSource::new("wss://example.test/socket"),
            None,
            reqwest::Client::new(),
            Arc::new(RangeSeekHandler::default()),
            Vec::new(),
        );
        assert_eq!(factory.loader_type(), LoaderType::WebSocket);
    }

    #[test]
    fn test_selects_streaming_by_default() {
        let factory = select_loader_factory(
            &ControllerConfig::default(),
            &DataSource::new("https://example.test/a.bin"),
            None,
            reqwest::Client::new(),
            Arc::new(RangeSeekHandler::default()),
            Vec::new(),
        );
        assert_eq!(factory.loader_type(), LoaderType::Streaming);
    }

    #[test]
    fn test_custom_factory_overrides_selection() {
        let custom = ranged_loader_factory(reqwest::Client::new(), Arc::new(RangeSeekHandler::default()), Vec::new());
        let factory = select_loader_factory(
            &ControllerConfig::default(),
            &DataSource::new("wss://example.test/socket"),
            Some(custom),
            reqwest::Client::new(),
            Arc::new(RangeSeekHandler::default()),
            Vec::new(),
        );
        assert_eq!(factory.loader_type(), LoaderType::Ranged);
    }
}
