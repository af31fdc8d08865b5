//! Plugin discovery contract.
//!
//! A plugin describes what it contributes in a [`PluginManifest`] and hands
//! the viewer one [`ReaderHook`] per reader contribution. When a file is
//! opened the registry tries every reader whose filename patterns match, in
//! registration order, until one returns layers. A reader returning `None`
//! means "not mine to handle".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layer::LayerData;

/// Reader entry point: the paths to open, layers or `None` when not handled.
pub type ReaderHook = fn(&[PathBuf]) -> Option<Vec<LayerData>>;

/// What a plugin contributes to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique package name
    pub name: String,
    /// Name shown in menus
    pub display_name: String,
    #[serde(default)]
    pub contributions: Contributions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contributions {
    #[serde(default)]
    pub readers: Vec<ReaderContribution>,
    #[serde(default)]
    pub widgets: Vec<WidgetContribution>,
}

/// A file reader offered by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderContribution {
    /// Command id the hook is registered under
    pub command: String,
    /// Patterns such as `*.json`
    pub filename_patterns: Vec<String>,
    #[serde(default)]
    pub accepts_directories: bool,
}

impl ReaderContribution {
    /// Whether `path` matches one of the filename patterns.
    ///
    /// Supports `*` (anything) and `*.ext` (case-insensitive suffix) patterns
    /// plus exact file names.
    pub fn matches(&self, path: &Path) -> bool {
        if path.is_dir() {
            return self.accepts_directories;
        }
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_lowercase(),
            None => return false,
        };
        self.filename_patterns.iter().any(|pattern| {
            let pattern = pattern.to_lowercase();
            match pattern.strip_prefix('*') {
                Some("") => true,
                Some(suffix) => file_name.ends_with(suffix),
                None => file_name == pattern,
            }
        })
    }
}

/// A dock widget offered by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetContribution {
    pub command: String,
    pub display_name: String,
}

struct RegisteredReader {
    plugin: String,
    contribution: ReaderContribution,
    hook: ReaderHook,
}

/// Readers and widgets of all registered plugins.
#[derive(Default)]
pub struct PluginRegistry {
    manifests: Vec<PluginManifest>,
    readers: Vec<RegisteredReader>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin with one hook per reader command.
    ///
    /// Reader contributions without a matching hook are skipped with a warning.
    pub fn register(&mut self, manifest: PluginManifest, hooks: &[(&str, ReaderHook)]) {
        for contribution in &manifest.contributions.readers {
            match hooks.iter().find(|(command, _)| *command == contribution.command) {
                Some((_, hook)) => self.readers.push(RegisteredReader {
                    plugin: manifest.name.clone(),
                    contribution: contribution.clone(),
                    hook: *hook,
                }),
                None => log::warn!(
                    "Plugin '{}' declares reader '{}' without a hook",
                    manifest.name,
                    contribution.command
                ),
            }
        }
        log::info!(
            "Registered plugin '{}' ({} readers, {} widgets)",
            manifest.name,
            manifest.contributions.readers.len(),
            manifest.contributions.widgets.len()
        );
        self.manifests.push(manifest);
    }

    pub fn manifests(&self) -> &[PluginManifest] {
        &self.manifests
    }

    /// Reader commands whose patterns match `path`, in registration order.
    pub fn readers_for(&self, path: &Path) -> Vec<&str> {
        self.readers
            .iter()
            .filter(|r| r.contribution.matches(path))
            .map(|r| r.contribution.command.as_str())
            .collect()
    }

    /// Open `paths` with the first matching reader that accepts them.
    pub fn read(&self, paths: &[PathBuf]) -> Option<Vec<LayerData>> {
        let first = paths.first()?;
        for reader in self.readers.iter().filter(|r| r.contribution.matches(first)) {
            log::debug!(
                "Trying reader '{}' from '{}' for {:?}",
                reader.contribution.command,
                reader.plugin,
                first
            );
            if let Some(layers) = (reader.hook)(paths) {
                return Some(layers);
            }
        }
        log::info!("No reader accepted {:?}", first);
        None
    }

    /// All widget contributions with the plugin that provides them.
    pub fn widgets(&self) -> Vec<(&str, &WidgetContribution)> {
        self.manifests
            .iter()
            .flat_map(|m| m.contributions.widgets.iter().map(move |w| (m.name.as_str(), w)))
            .collect()
    }
}
