//! Rotation buckets and log file path construction.

use chrono::{DateTime, FixedOffset};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Time granularity of log file rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// One directory per day, `YYYYMMDD`.
    #[default]
    Daily,
    /// One directory per hour, `YYYYMMDDThh`.
    Hourly,
}

impl Rotation {
    /// Parse the `LOG_TIME_GROUP` setting. Anything but `hour` is daily.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "hour" | "hourly" => Self::Hourly,
            _ => Self::Daily,
        }
    }

    /// `chrono` format string of the bucket segment.
    pub fn pattern(self) -> &'static str {
        match self {
            Self::Daily => "%Y%m%d",
            Self::Hourly => "%Y%m%dT%H",
        }
    }

    /// Bucket segment for `now`.
    pub fn bucket(self, now: &DateTime<FixedOffset>) -> String {
        now.format(self.pattern()).to_string()
    }

    /// How long an idle entry may stay active: one bucket plus a little slack.
    pub fn ttl(self) -> Duration {
        match self {
            Self::Daily => Duration::from_secs(86_400 + 10),
            Self::Hourly => Duration::from_secs(3_600 + 10),
        }
    }
}

/// Directory holding the files of one bucket: `base/bucket[/host]`.
pub fn bucket_dir(base_dir: &Path, bucket: &str, host: &str) -> PathBuf {
    let dir = base_dir.join(bucket);
    if host.is_empty() { dir } else { dir.join(host) }
}

/// Resolve the file for `key` at time `now`: `base/bucket[/host]/key.log`.
///
/// An empty host omits its segment. Leading separators of `key` are dropped,
/// so an absolute key still lands under `base_dir`.
///
/// # Examples
///
/// ```rust
/// use chrono::{FixedOffset, TimeZone};
/// use hotswap_runtime::pool::{Rotation, build_log_path};
/// use std::path::Path;
///
/// let now = FixedOffset::east_opt(0).unwrap()
///     .with_ymd_and_hms(2024, 1, 2, 8, 0, 0)
///     .unwrap();
/// let path = build_log_path(Path::new("/var/log/svc"), &now, Rotation::Daily, "h1", "access");
/// assert_eq!(path, Path::new("/var/log/svc/20240102/h1/access.log"));
/// ```
pub fn build_log_path(
    base_dir: &Path,
    now: &DateTime<FixedOffset>,
    rotation: Rotation,
    host: &str,
    key: &str,
) -> PathBuf {
    let relative = key.trim_start_matches(KEY_SEPARATORS);
    bucket_dir(base_dir, &rotation.bucket(now), host).join(format!("{}.log", relative))
}

const KEY_SEPARATORS: [char; 2] = ['/', '\\'];

/// Whether `key` names a file inside the bucket directory: non-empty once
/// leading separators are dropped, with no `..` segment.
pub(crate) fn is_valid_key(key: &str) -> bool {
    let relative = key.trim_start_matches(KEY_SEPARATORS);
    !relative.is_empty() && !relative.split(KEY_SEPARATORS).any(|segment| segment == "..")
}

/// Host segment of log paths: the system hostname, or empty when it is not
/// valid UTF-8.
pub fn local_hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .map(|host| host.trim().to_string())
        .unwrap_or_default()
}
