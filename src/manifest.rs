//! Discovery manifest and registration with the host's plugin registry.

use coco_viewer::{
    Contributions, PluginManifest, PluginRegistry, ReaderContribution, ReaderHook,
    WidgetContribution,
};

use crate::reader::coco_reader;

pub const PLUGIN_NAME: &str = "coco-overlay";
pub const READER_COMMAND: &str = "coco_overlay.read_coco";
pub const WIDGET_COMMAND: &str = "coco_overlay.coco_widget";

pub fn manifest() -> PluginManifest {
    PluginManifest {
        name: PLUGIN_NAME.to_string(),
        display_name: "COCO Overlay".to_string(),
        contributions: Contributions {
            readers: vec![ReaderContribution {
                command: READER_COMMAND.to_string(),
                filename_patterns: vec!["*.json".to_string()],
                accepts_directories: false,
            }],
            widgets: vec![WidgetContribution {
                command: WIDGET_COMMAND.to_string(),
                display_name: "COCO Controls".to_string(),
            }],
        },
    }
}

/// Register the manifest and the reader hook.
pub fn register(registry: &mut PluginRegistry) {
    let hooks: [(&str, ReaderHook); 1] = [(READER_COMMAND, coco_reader)];
    registry.register(manifest(), &hooks);
}
