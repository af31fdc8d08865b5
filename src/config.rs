//! Plugin configuration.
//!
//! Settings are stored as JSON in the user's config directory and can be
//! exported and imported. Environment variables override individual values
//! at runtime without touching the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Log level setting for the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get the display name for this log level.
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
        }
    }

    /// Parse a level name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Prefix of the environment variables that override settings.
pub const ENV_PREFIX: &str = "COCO_OVERLAY_";

/// Complete plugin configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Version of the configuration file format
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub visualization: VisualizationConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

/// Layer styling and caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationConfig {
    #[serde(default = "default_edge_width")]
    pub default_edge_width: f32,
    #[serde(default = "default_opacity")]
    pub default_opacity: f32,
    #[serde(default = "default_max_annotations")]
    pub max_annotations_display: usize,
    #[serde(default = "default_true")]
    pub enable_caching: bool,
    /// Maximum number of built layers kept in the cache
    #[serde(default = "default_cache_size_limit")]
    pub cache_size_limit: usize,
}

fn default_edge_width() -> f32 {
    2.0
}

fn default_opacity() -> f32 {
    1.0
}

fn default_max_annotations() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_cache_size_limit() -> usize {
    100
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            default_edge_width: default_edge_width(),
            default_opacity: default_opacity(),
            max_annotations_display: default_max_annotations(),
            enable_caching: true,
            cache_size_limit: default_cache_size_limit(),
        }
    }
}

/// Widget behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Initial value of the N-filter
    #[serde(default = "default_n_filter")]
    pub default_n_filter: usize,
    #[serde(default = "default_true")]
    pub show_annotation_count: bool,
    #[serde(default = "default_true")]
    pub show_category_colors: bool,
    #[serde(default = "default_true")]
    pub enable_tooltips: bool,
    #[serde(default)]
    pub compact_mode: bool,
}

fn default_n_filter() -> usize {
    1000
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_n_filter: default_n_filter(),
            show_annotation_count: true,
            show_category_colors: true,
            enable_tooltips: true,
            compact_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_true")]
    pub lazy_loading: bool,
    #[serde(default)]
    pub background_processing: bool,
    #[serde(default = "default_memory_limit")]
    pub memory_limit_mb: usize,
    /// Operations between cache cleanup checks
    #[serde(default = "default_gc_threshold")]
    pub gc_threshold: u32,
}

fn default_memory_limit() -> usize {
    512
}

fn default_gc_threshold() -> u32 {
    50
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            lazy_loading: true,
            background_processing: false,
            memory_limit_mb: default_memory_limit(),
            gc_threshold: default_gc_threshold(),
        }
    }
}

impl PluginConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            visualization: VisualizationConfig::default(),
            ui: UiConfig::default(),
            performance: PerformanceConfig::default(),
            log_level: LogLevel::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Get the default filename of the config file.
    pub fn default_filename() -> &'static str {
        "config.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("coco-overlay").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("coco-overlay")
                    .join(Self::default_filename())
            })
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// No config directory could be determined
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Loads, caches and saves the configuration file.
#[derive(Debug)]
pub struct ConfigManager {
    path: Option<PathBuf>,
    cached: Option<PluginConfig>,
}

impl ConfigManager {
    /// Manager for the default config location.
    pub fn new() -> Self {
        Self {
            path: PluginConfig::default_path(),
            cached: None,
        }
    }

    /// Manager for a specific config file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            cached: None,
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The configuration, loaded from disk on first access.
    pub fn config(&mut self) -> &PluginConfig {
        if self.cached.is_none() {
            self.cached = Some(self.load_config());
        }
        self.cached.get_or_insert_with(PluginConfig::new)
    }

    /// Read the config file, falling back to defaults if it is missing or invalid.
    pub fn load_config(&self) -> PluginConfig {
        let Some(path) = self.path.as_deref() else {
            return PluginConfig::new();
        };
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return PluginConfig::new();
        }

        match read_config(path) {
            Ok(config) => {
                log::info!("Loaded configuration from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("Error loading config {:?}, using defaults: {}", path, e);
                PluginConfig::new()
            }
        }
    }

    /// Save `config` (or the current configuration) and make it current.
    pub fn save_config(&mut self, config: Option<PluginConfig>) -> Result<(), ConfigError> {
        let config = match config {
            Some(config) => config,
            None => self.config().clone(),
        };
        let path = self.path.clone().ok_or(ConfigError::NoConfigDir)?;
        write_config(&path, &config)?;
        log::info!("Saved configuration to {:?}", path);
        self.cached = Some(config);
        Ok(())
    }

    /// Restore and save the defaults.
    pub fn reset_to_defaults(&mut self) -> Result<&PluginConfig, ConfigError> {
        self.save_config(Some(PluginConfig::new()))?;
        Ok(self.config())
    }

    /// Modify the configuration in place and save it.
    pub fn update(&mut self, f: impl FnOnce(&mut PluginConfig)) -> Result<(), ConfigError> {
        let mut config = self.config().clone();
        f(&mut config);
        self.save_config(Some(config))
    }

    /// Write the current configuration to another file.
    pub fn export_config(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let config = self.config().clone();
        write_config(path, &config)?;
        log::info!("Exported configuration to {:?}", path);
        Ok(())
    }

    /// Load a configuration from another file and save it as current.
    pub fn import_config(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let config = read_config(path.as_ref())?;
        log::info!("Imported configuration from {:?}", path.as_ref());
        self.save_config(Some(config))
    }

    /// The configuration with environment overrides applied.
    pub fn effective_config(&mut self) -> PluginConfig {
        apply_env_overrides(self.config().clone())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn read_config(path: &Path) -> Result<PluginConfig, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    PluginConfig::from_json(&json)
}

fn write_config(path: &Path, config: &PluginConfig) -> Result<(), ConfigError> {
    // Create parent directories if needed
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config.to_json()?)?;
    Ok(())
}

/// Apply `COCO_OVERLAY_*` environment variables to `config`.
pub fn apply_env_overrides(config: PluginConfig) -> PluginConfig {
    apply_overrides_from(config, |name| std::env::var(name).ok())
}

/// Apply overrides read through `lookup`. Unparseable values are ignored.
pub fn apply_overrides_from(
    mut config: PluginConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> PluginConfig {
    let var = |suffix: &str| {
        lookup(&format!("{}{}", ENV_PREFIX, suffix)).filter(|value| !value.is_empty())
    };
    let is_true = |value: &str| value.eq_ignore_ascii_case("true");

    if let Some(width) = var("EDGE_WIDTH").and_then(|v| v.parse().ok()) {
        config.visualization.default_edge_width = width;
    }
    if let Some(max) = var("MAX_ANNOTATIONS").and_then(|v| v.parse().ok()) {
        config.visualization.max_annotations_display = max;
    }
    if let Some(value) = var("DISABLE_CACHE") {
        config.visualization.enable_caching = !is_true(&value);
    }
    if let Some(n) = var("DEFAULT_N_FILTER").and_then(|v| v.parse().ok()) {
        config.ui.default_n_filter = n;
    }
    if let Some(value) = var("COMPACT_MODE") {
        config.ui.compact_mode = is_true(&value);
    }
    if let Some(limit) = var("MEMORY_LIMIT").and_then(|v| v.parse().ok()) {
        config.performance.memory_limit_mb = limit;
    }
    if let Some(value) = var("DISABLE_LAZY_LOADING") {
        config.performance.lazy_loading = !is_true(&value);
    }
    if let Some(level) = var("LOG_LEVEL").and_then(|v| LogLevel::parse(&v)) {
        config.log_level = level;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("coco_overlay_config_{}_{}", name, std::process::id()))
            .join("config.json")
    }

    #[test]
    fn test_defaults() {
        let config = PluginConfig::default();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.visualization.default_edge_width, 2.0);
        assert_eq!(config.visualization.max_annotations_display, 1000);
        assert!(config.visualization.enable_caching);
        assert_eq!(config.ui.default_n_filter, 1000);
        assert!(!config.ui.compact_mode);
        assert_eq!(config.performance.memory_limit_mb, 512);
        assert_eq!(config.performance.gc_threshold, 50);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = PluginConfig::from_json(r#"{ "ui": { "default_n_filter": 5 } }"#).unwrap();
        assert_eq!(config.ui.default_n_filter, 5);
        assert!(config.ui.show_annotation_count);
        assert_eq!(config.visualization, VisualizationConfig::default());
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = PluginConfig::from_json(r#"{ "version": 99 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::VersionTooNew { file_version: 99, .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("COCO_OVERLAY_EDGE_WIDTH", "3.5"),
            ("COCO_OVERLAY_MAX_ANNOTATIONS", "not-a-number"),
            ("COCO_OVERLAY_DISABLE_CACHE", "TRUE"),
            ("COCO_OVERLAY_DEFAULT_N_FILTER", "25"),
            ("COCO_OVERLAY_COMPACT_MODE", "true"),
            ("COCO_OVERLAY_MEMORY_LIMIT", "64"),
            ("COCO_OVERLAY_DISABLE_LAZY_LOADING", "false"),
        ]
        .into_iter()
        .collect();

        let config = apply_overrides_from(PluginConfig::default(), |name| {
            vars.get(name).map(|v| v.to_string())
        });

        assert_eq!(config.visualization.default_edge_width, 3.5);
        assert_eq!(config.visualization.max_annotations_display, 1000);
        assert!(!config.visualization.enable_caching);
        assert_eq!(config.ui.default_n_filter, 25);
        assert!(config.ui.compact_mode);
        assert_eq!(config.performance.memory_limit_mb, 64);
        assert!(config.performance.lazy_loading);
    }

    #[test]
    fn test_manager_save_update_reload() {
        let path = temp_path("manager");
        let _ = std::fs::remove_file(&path);

        let mut manager = ConfigManager::with_path(&path);
        assert_eq!(manager.config(), &PluginConfig::default());

        manager
            .update(|config| config.visualization.default_edge_width = 4.0)
            .unwrap();

        let reloaded = ConfigManager::with_path(&path).load_config();
        assert_eq!(reloaded.visualization.default_edge_width, 4.0);

        manager.reset_to_defaults().unwrap();
        assert_eq!(ConfigManager::with_path(&path).load_config(), PluginConfig::default());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_export_import() {
        let source = temp_path("export_src");
        let exported = temp_path("export_out");
        let target = temp_path("export_dst");

        let mut manager = ConfigManager::with_path(&source);
        manager.update(|config| config.ui.compact_mode = true).unwrap();
        manager.export_config(&exported).unwrap();

        let mut other = ConfigManager::with_path(&target);
        other.import_config(&exported).unwrap();
        assert!(other.config().ui.compact_mode);
        assert!(ConfigManager::with_path(&target).load_config().ui.compact_mode);

        for path in [source, exported, target] {
            let _ = std::fs::remove_dir_all(path.parent().unwrap());
        }
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let path = temp_path("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ broken").unwrap();

        let config = ConfigManager::with_path(&path).load_config();
        assert_eq!(config, PluginConfig::default());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
