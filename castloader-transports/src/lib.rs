mod http;
mod ranged_loader;
mod selection;
mod streaming_loader;
mod websocket_loader;

pub use ranged_loader::RangedLoader;
pub use selection::{ranged_loader_factory, select_loader_factory};
pub use streaming_loader::StreamingLoader;
pub use websocket_loader::WebSocketLoader;
