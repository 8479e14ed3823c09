//! Pool of named, time-rotated log sinks.
//!
//! A [`LogPool`] hands out [`Logger`] handles by key. Each handle writes JSON
//! lines to `<log_dir>/<bucket>/<host>/<key>.log`, where the bucket is the
//! current day (`YYYYMMDD`) or hour (`YYYYMMDDThh`). When the bucket changes
//! or the file disappears, the next lookup opens a new sink and queues the old
//! one for release by a background sweeper.

mod clock;
mod log_pool;
mod path;
mod settings;
mod sink;

pub use clock::{Clock, ManualClock, SystemClock};
pub use log_pool::{
    DEFAULT_RELEASE_INTERVAL, DEFAULT_STALE_INTERVAL, EvictReason, LogPool, LogPoolBuilder,
    PoolStats,
};
pub use path::{Rotation, bucket_dir, build_log_path, local_hostname};
pub use settings::{
    DEFAULT_LOG_DIR, LOG_DIR, LOG_ENABLE_LEVEL, LOG_SINK_TYPE, LOG_TIME_GROUP, PoolSettings,
    SinkType, parse_level,
};
pub use sink::{
    Event, Logger, OpenedSink, SinkOpener, SinkRelease, SinkTarget, SinkWriter, StandardOpener,
    open_log_file,
};
