//! Configuration for the image asset store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{debug, warn};

use crate::error::{ImageError, ImageResult};
use crate::formats::mime_essence;

/// Bytes per MiB.
pub const MB: u64 = 1024 * 1024;

/// Image asset store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Upload validation and ingest settings
    pub ingest: IngestConfig,
    /// Storage capacity accounting
    pub quota: QuotaConfig,
    /// Optional downscaling before storage
    pub resize: ResizeConfig,
    /// Durable storage location
    pub storage: StorageConfig,
}

/// Upload validation and ingest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum declared upload size in bytes (5 MB)
    pub max_upload_bytes: u64,
    /// Accepted content types
    pub allowed_types: Vec<String>,
    /// Artificial delay simulating network latency, in milliseconds
    pub simulated_latency_ms: u64,
}

/// Storage capacity accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Assumed capacity of durable storage in bytes (10 MB)
    pub capacity_bytes: u64,
    /// Usage ratio at and above which storage is reported unavailable
    pub warning_ratio: f64,
}

/// Downscaling before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// Whether oversized images are downscaled
    pub enabled: bool,
    /// Longest permitted edge in pixels
    pub max_dimension: u32,
}

/// Durable storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one file per storage key
    pub root_dir: Option<PathBuf>,
    /// Whether the file backend rejects writes beyond `quota.capacity_bytes`
    pub enforce_capacity: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 5 * MB,
            allowed_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
                "image/webp".to_string(),
            ],
            simulated_latency_ms: 300,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 10 * MB,
            warning_ratio: 0.85,
        }
    }
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_dimension: 2048,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            enforce_capacity: true,
        }
    }
}

impl IngestConfig {
    /// Check if a content type is accepted. Parameters are ignored on both
    /// sides.
    pub fn is_type_allowed(&self, content_type: &str) -> bool {
        let essence = mime_essence(content_type);
        self.allowed_types.iter().any(|t| mime_essence(t) == essence)
    }

    /// Upload limit in whole MB, as shown in validation messages.
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / MB
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

impl ImageConfig {
    /// Configuration suited to tests: no artificial latency.
    pub fn without_latency() -> Self {
        let mut config = Self::default();
        config.ingest.simulated_latency_ms = 0;
        config
    }

    /// Load configuration from a YAML file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    pub fn from_file(path: &Path) -> ImageResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with hierarchy support.
    ///
    /// Configuration hierarchy (highest to lowest priority):
    /// 1. Explicit file passed by the caller
    /// 2. Project-level config (`config/images.yaml`)
    /// 3. User-level config (`~/.galleria/config/images.yaml`)
    /// 4. Built-in defaults
    ///
    /// Layers are merged key by key, so a layer that sets one field leaves
    /// the others as the lower layers had them.
    pub fn load_with_hierarchy(explicit: Option<&Path>) -> ImageResult<Self> {
        let user = dirs::home_dir().map(|home| home.join(".galleria").join("config").join("images.yaml"));
        Self::load_layers(user.as_deref(), Path::new("config/images.yaml"), explicit)
    }

    fn load_layers(user: Option<&Path>, project: &Path, explicit: Option<&Path>) -> ImageResult<Self> {
        let mut merged = serde_yaml::to_value(Self::default())?;

        for path in user.into_iter().chain(std::iter::once(project)) {
            if !path.exists() {
                continue;
            }
            if let Err(e) = Self::apply_layer(&mut merged, path) {
                warn!(path = %path.display(), "Ignoring unreadable config layer: {}", e);
            }
        }

        // An explicitly requested file must exist and parse
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ImageError::ConfigError(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Self::apply_layer(&mut merged, path)?;
        }

        Ok(serde_yaml::from_value(merged)?)
    }

    /// Merge the file at `path` into `merged`, leaving `merged` untouched when
    /// the file is unreadable or the result is not a valid configuration.
    fn apply_layer(merged: &mut Value, path: &Path) -> ImageResult<()> {
        let content = std::fs::read_to_string(path)?;
        let layer: Value = serde_yaml::from_str(&content)?;
        if !matches!(layer, Value::Mapping(_) | Value::Null) {
            return Err(ImageError::ConfigError(format!(
                "{} is not a YAML mapping",
                path.display()
            )));
        }

        let mut candidate = merged.clone();
        merge_values(&mut candidate, layer);
        serde_yaml::from_value::<Self>(candidate.clone())?;
        *merged = candidate;
        debug!(path = %path.display(), "Applied config layer");
        Ok(())
    }

    /// Storage directory: configured value or `~/.galleria/data`.
    pub fn storage_root(&self) -> PathBuf {
        self.storage.root_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".galleria")
                .join("data")
        })
    }
}

/// Overlay `layer` onto `base`: mappings merge recursively, anything else
/// replaces. A null layer value leaves `base` as is.
fn merge_values(base: &mut Value, layer: Value) {
    match (base, layer) {
        (_, Value::Null) => {}
        (Value::Mapping(base), Value::Mapping(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ImageConfig::default();
        assert_eq!(config.ingest.max_upload_bytes, 5 * MB);
        assert_eq!(config.ingest.max_upload_mb(), 5);
        assert_eq!(config.ingest.simulated_latency_ms, 300);
        assert_eq!(config.quota.capacity_bytes, 10 * MB);
        assert!((config.quota.warning_ratio - 0.85).abs() < f64::EPSILON);
        assert!(!config.resize.enabled);
        assert!(config.storage.enforce_capacity);
    }

    #[test]
    fn test_is_type_allowed() {
        let config = IngestConfig::default();
        assert!(config.is_type_allowed("image/jpeg"));
        assert!(config.is_type_allowed("IMAGE/PNG"));
        assert!(config.is_type_allowed("image/gif"));
        assert!(config.is_type_allowed("image/webp"));
        assert!(!config.is_type_allowed("image/bmp"));
        assert!(!config.is_type_allowed("text/plain"));
        assert!(config.is_type_allowed("image/png; charset=binary"));
        assert!(config.is_type_allowed(" image/webp ;q=1"));
    }

    #[test]
    fn test_from_missing_file_is_default() {
        let config = ImageConfig::from_file(Path::new("/nonexistent/images.yaml")).unwrap();
        assert_eq!(config.quota.capacity_bytes, 10 * MB);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "quota:\n  capacity_bytes: 2048\nresize:\n  enabled: true").unwrap();

        let config = ImageConfig::load_with_hierarchy(Some(file.path())).unwrap();
        assert_eq!(config.quota.capacity_bytes, 2048);
        assert!((config.quota.warning_ratio - 0.85).abs() < f64::EPSILON);
        assert!(config.resize.enabled);
        assert_eq!(config.resize.max_dimension, 2048);
        assert_eq!(config.ingest.max_upload_bytes, 5 * MB);
    }

    #[test]
    fn test_invalid_explicit_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "quota: [not, a, map]").unwrap();
        assert!(ImageConfig::load_with_hierarchy(Some(file.path())).is_err());
    }

    fn write_layer(dir: &Path, name: &str, yaml: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_layers_merge_field_by_field() {
        let dir = tempfile::TempDir::new().unwrap();
        let user = write_layer(dir.path(), "user.yaml", "quota:\n  capacity_bytes: 2048\n");
        let project = write_layer(dir.path(), "project.yaml", "quota:\n  warning_ratio: 0.5\n");
        let explicit = write_layer(dir.path(), "explicit.yaml", "resize:\n  enabled: true\n");

        let config = ImageConfig::load_layers(Some(&user), &project, Some(&explicit)).unwrap();
        assert_eq!(config.quota.capacity_bytes, 2048);
        assert!((config.quota.warning_ratio - 0.5).abs() < f64::EPSILON);
        assert!(config.resize.enabled);
        assert_eq!(config.resize.max_dimension, 2048);
        assert_eq!(config.ingest.simulated_latency_ms, 300);
    }

    #[test]
    fn test_missing_layers_are_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let user = write_layer(dir.path(), "user.yaml", "storage:\n  enforce_capacity: false\n");
        let project = dir.path().join("absent.yaml");

        let config = ImageConfig::load_layers(Some(&user), &project, None).unwrap();
        assert!(!config.storage.enforce_capacity);
        assert_eq!(config.quota.capacity_bytes, 10 * MB);
    }

    #[test]
    fn test_higher_layer_wins_on_same_field() {
        let dir = tempfile::TempDir::new().unwrap();
        let user = write_layer(dir.path(), "user.yaml", "ingest:\n  simulated_latency_ms: 10\n");
        let project = write_layer(dir.path(), "project.yaml", "ingest:\n  simulated_latency_ms: 20\n");

        let config = ImageConfig::load_layers(Some(&user), &project, None).unwrap();
        assert_eq!(config.ingest.simulated_latency_ms, 20);
        assert_eq!(config.ingest.allowed_types.len(), 4);
    }

    #[test]
    fn test_unreadable_implicit_layer_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let user = write_layer(dir.path(), "user.yaml", "quota: [1, 2]\n");
        let project = write_layer(dir.path(), "project.yaml", "{}\n");

        let config = ImageConfig::load_layers(Some(&user), &project, None).unwrap();
        assert_eq!(config.quota.capacity_bytes, 10 * MB);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = ImageConfig::load_with_hierarchy(Some(Path::new("/nonexistent/images.yaml")))
            .unwrap_err();
        assert!(matches!(err, ImageError::ConfigError(_)));
    }
}
