//! File-based configuration source.

use super::ConfigSource;
use crate::error::{Result, RuntimeError};
use config::{File, FileFormat};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Parse format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParseType {
    /// TOML (`.toml`)
    #[default]
    Toml,
    /// YAML (`.yaml`, `.yml`)
    Yaml,
    /// JSON (`.json`)
    Json,
}

impl ParseType {
    /// Canonical file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }

    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }

    fn file_format(self) -> FileFormat {
        match self {
            Self::Toml => FileFormat::Toml,
            Self::Yaml => FileFormat::Yaml,
            Self::Json => FileFormat::Json,
        }
    }
}

impl FromStr for ParseType {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(RuntimeError::ParseError(format!(
                "Unsupported format: {}. Supported: toml, yaml, yml, json",
                other
            ))),
        }
    }
}

impl fmt::Display for ParseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// File-based configuration source.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_runtime::sources::{FileSource, ParseType};
///
/// let source = FileSource::new("conf/app.toml");
/// let explicit = FileSource::with_format("conf/app.conf", ParseType::Toml);
/// ```
pub struct FileSource {
    path: PathBuf,
    format: Option<ParseType>,
    priority: i32,
}

impl FileSource {
    /// Create a new file source; the format is detected from the extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            priority: 100,
        }
    }

    /// Create a file source with an explicit parse format.
    pub fn with_format(path: impl Into<PathBuf>, format: ParseType) -> Self {
        Self {
            format: Some(format),
            ..Self::new(path)
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The file this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resolve_format(&self) -> Result<ParseType> {
        self.format
            .or_else(|| ParseType::from_path(&self.path))
            .ok_or_else(|| {
                RuntimeError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        let format = self.resolve_format()?;

        if !self.path.is_file() {
            return Err(RuntimeError::LoadError(format!(
                "Configuration file not found: {}",
                self.path.display()
            )));
        }

        let built = config::Config::builder()
            .add_source(
                File::from(self.path.as_path())
                    .format(format.file_format())
                    .required(true),
            )
            .build()
            .map_err(|e| RuntimeError::LoadError(format!("Failed to load file: {}", e)))?;

        built
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| RuntimeError::ParseError(format!("Failed to parse file: {}", e)))
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn watch_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_type_from_str() {
        assert_eq!("toml".parse::<ParseType>().unwrap(), ParseType::Toml);
        assert_eq!("YML".parse::<ParseType>().unwrap(), ParseType::Yaml);
        assert_eq!("json".parse::<ParseType>().unwrap(), ParseType::Json);
        assert!("ini".parse::<ParseType>().is_err());
    }

    #[test]
    fn test_unknown_extension_without_format() {
        let source = FileSource::new("app.conf");
        assert!(source.resolve_format().is_err());

        let source = FileSource::with_format("app.conf", ParseType::Toml);
        assert_eq!(source.resolve_format().unwrap(), ParseType::Toml);
    }

    #[test]
    fn test_load_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("app.toml");
        fs::write(
            &config_path,
            "LOG_DIR = \"/tmp/logs\"\n\n[server]\nport = 8080\n",
        )
        .unwrap();

        let map = FileSource::new(&config_path).load().unwrap();
        assert!(map.contains_key("LOG_DIR") || map.contains_key("log_dir"));
        assert!(map.contains_key("server"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let source = FileSource::new("/nonexistent/app.toml");
        assert!(source.load().is_err());
    }

    #[test]
    fn test_watch_path_and_name() {
        let source = FileSource::new("conf/app.yaml").with_priority(150);
        assert_eq!(source.priority(), 150);
        assert_eq!(source.watch_path(), Some(Path::new("conf/app.yaml")));
        assert!(source.name().contains("app.yaml"));
    }
}
