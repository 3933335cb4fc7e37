mod config;
mod controller;
mod error;
mod introspect;
mod ladder;
mod loader;
mod seek;
mod speed_sampler;
mod stash;

pub use config::{ControllerConfig, SeekType};
pub use controller::{Controller, ControllerObservables};
pub use error::{ControllerError, LoaderError, LoaderErrorKind};
pub use introspect::Introspect;
pub use ladder::{normalize, SPEED_LADDER_KB};
pub use loader::{
    ChunkEvent, DataSource, Loader, LoaderEventSink, LoaderFactory, LoaderStatus, LoaderType,
};
pub use seek::{
    select_seek_handler, CustomSeekHandler, ParamSeekHandler, Range, RangeSeekHandler,
    RequestShape, SeekHandler,
};
pub use speed_sampler::SpeedSampler;
pub use stash::{StashEngine, StashIntrospection};
