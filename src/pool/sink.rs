//! Opening and releasing log destinations, and the handle callers write through.

use crate::error::{Result, RuntimeError};
use arc_swap::ArcSwap;
use chrono::{Local, SecondsFormat};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing::level_filters::LevelFilter;

/// Where a sink writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SinkTarget {
    /// A file inside a rotation directory.
    File(PathBuf),
    /// Standard output, tagged with the bucket it was opened in.
    Console {
        /// Rotation bucket at open time.
        bucket: String,
    },
}

impl SinkTarget {
    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Console { .. } => None,
        }
    }

    /// Whether the backing resource still exists. Console targets always do.
    pub fn is_present(&self) -> bool {
        match self {
            Self::File(path) => path.is_file(),
            Self::Console { .. } => true,
        }
    }
}

type SharedWriter = Arc<Mutex<Option<Box<dyn Write + Send>>>>;

/// Cloneable writer over an open destination.
///
/// Writes after the owning [`SinkRelease`] ran fail with `BrokenPipe`.
#[derive(Clone)]
pub struct SinkWriter {
    inner: SharedWriter,
}

impl SinkWriter {
    /// Write one record followed by a newline.
    pub fn write_line(&self, line: &[u8]) -> io::Result<()> {
        match self.inner.lock().as_mut() {
            Some(writer) => {
                writer.write_all(line)?;
                writer.write_all(b"\n")
            }
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink released")),
        }
    }

    /// Whether the destination has been released.
    pub fn is_released(&self) -> bool {
        self.inner.lock().is_none()
    }
}

/// Flushes and closes a destination. Consumed on use, so it runs at most once.
pub struct SinkRelease {
    inner: SharedWriter,
}

impl SinkRelease {
    /// Flush and close the destination.
    pub fn release(self) -> io::Result<()> {
        let writer = self.inner.lock().take();
        match writer {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

/// A freshly opened destination: the writer handed to loggers and its release.
pub struct OpenedSink {
    /// Writer shared by every handle of the sink.
    pub writer: SinkWriter,
    /// Release half, owned by the pool.
    pub release: SinkRelease,
}

impl OpenedSink {
    /// Wrap any writer as a sink.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        let inner: SharedWriter = Arc::new(Mutex::new(Some(Box::new(writer))));
        Self {
            writer: SinkWriter {
                inner: Arc::clone(&inner),
            },
            release: SinkRelease { inner },
        }
    }
}

/// Opens destinations for the pool.
pub trait SinkOpener: Send + Sync {
    /// Open `target` for appending.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SinkCreation`] when the directory or file cannot
    /// be created or opened.
    fn open(&self, target: &SinkTarget) -> Result<OpenedSink>;
}

/// Opens files (creating directories on demand) and standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardOpener;

impl SinkOpener for StandardOpener {
    fn open(&self, target: &SinkTarget) -> Result<OpenedSink> {
        match target {
            SinkTarget::File(path) => {
                let file = open_log_file(path)?;
                Ok(OpenedSink::new(LineWriter::new(file)))
            }
            SinkTarget::Console { .. } => Ok(OpenedSink::new(io::stdout())),
        }
    }
}

/// Create the rotation directory and open `path` for appending. An existing
/// file is reused, never truncated.
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent() {
        create_dir_all_permissive(dir).map_err(|e| RuntimeError::sink_creation(dir, e))?;
    }

    let existed = path.is_file();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RuntimeError::sink_creation(path, e))?;

    if !existed {
        set_permissive_mode(path).map_err(|e| RuntimeError::sink_creation(path, e))?;
    }
    Ok(file)
}

#[cfg(unix)]
fn create_dir_all_permissive(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o777).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all_permissive(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn set_permissive_mode(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn set_permissive_mode(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// A named log handle obtained from [`LogPool::instance`](crate::pool::LogPool::instance).
///
/// Records are written as one JSON object per line with `level`, `time`,
/// `host`, `logger`, any extra fields, and `message`. The minimum level is
/// shared with the pool, so a configuration reload changes it for every
/// live handle.
///
/// Handles stay writable until the pool releases their sink; call
/// `instance` again rather than holding a handle across rotations.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    key: String,
    host: String,
    target: SinkTarget,
    writer: SinkWriter,
    level: Arc<ArcSwap<LevelFilter>>,
}

impl Logger {
    pub(crate) fn new(
        key: &str,
        host: &str,
        target: SinkTarget,
        writer: SinkWriter,
        level: Arc<ArcSwap<LevelFilter>>,
    ) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                key: key.to_string(),
                host: host.to_string(),
                target,
                writer,
                level,
            }),
        }
    }

    /// Pool key of this handle.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Destination of this handle.
    pub fn target(&self) -> &SinkTarget {
        &self.inner.target
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.target.path()
    }

    /// Whether two handles share the same open sink.
    pub fn same_sink(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.inner.writer.inner, &other.inner.writer.inner)
    }

    /// Whether the pool has released this handle's sink.
    pub fn is_released(&self) -> bool {
        self.inner.writer.is_released()
    }

    /// Whether records at `level` are written.
    pub fn enabled(&self, level: Level) -> bool {
        level <= **self.inner.level.load()
    }

    /// Start a record with extra fields.
    pub fn event(&self, level: Level) -> Event<'_> {
        Event {
            logger: self,
            level,
            fields: Map::new(),
        }
    }

    /// Write `message` at `level`.
    pub fn log(&self, level: Level, message: &str) {
        self.event(level).msg(message);
    }

    /// Write `message` at debug level.
    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }

    /// Write `message` at info level.
    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    /// Write `message` at warn level.
    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    /// Write `message` at error level.
    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    fn write(&self, level: Level, fields: Map<String, Value>, message: &str) {
        if !self.enabled(level) {
            return;
        }

        let mut record = Map::with_capacity(fields.len() + 5);
        record.insert(
            "level".to_string(),
            Value::from(level.as_str().to_ascii_lowercase()),
        );
        record.insert(
            "time".to_string(),
            Value::from(Local::now().to_rfc3339_opts(SecondsFormat::Millis, false)),
        );
        record.insert("host".to_string(), Value::from(self.inner.host.as_str()));
        record.insert("logger".to_string(), Value::from(self.inner.key.as_str()));
        record.extend(fields);
        record.insert("message".to_string(), Value::from(message));

        let line = match serde_json::to_vec(&Value::Object(record)) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(logger = %self.inner.key, error = %e, "failed to encode log record");
                return;
            }
        };
        if let Err(e) = self.inner.writer.write_line(&line) {
            tracing::debug!(logger = %self.inner.key, error = %e, "log record dropped");
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("key", &self.inner.key)
            .field("target", &self.inner.target)
            .finish()
    }
}

/// A record under construction.
///
/// ```rust,no_run
/// # fn example(logger: hotswap_runtime::pool::Logger) {
/// logger
///     .event(tracing::Level::INFO)
///     .field("status", 200)
///     .field("path", "/health")
///     .msg("request served");
/// # }
/// ```
#[must_use = "a record is only written by `msg`"]
pub struct Event<'a> {
    logger: &'a Logger,
    level: Level,
    fields: Map<String, Value>,
}

impl Event<'_> {
    /// Attach a field.
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Write the record with `message`.
    pub fn msg(self, message: &str) {
        self.logger.write(self.level, self.fields, message);
    }
}
