//! COCO Overlay - COCO annotation overlays for the viewer
//!
//! A viewer plugin that opens COCO JSON datasets as shapes layers and
//! provides a controls widget for category filtering, image navigation and
//! display-density limiting (N-filter).

pub mod config;
pub mod controllers;
pub mod error;
pub mod image_cache;
pub mod manifest;
pub mod memory;
pub mod progress;
pub mod reader;
pub mod utils;
pub mod visualization;
pub mod widget;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, ConfigManager, LogLevel, PluginConfig};
pub use controllers::{
    CategoryController, CocoFileManager, CountInfo, DisplayController, FileInfo,
    NavigationController, RefreshRequest, VisualizationManager, VisualizationMode,
};
pub use error::CocoError;
pub use manifest::{manifest, register};
pub use reader::{coco_reader, read_coco};
pub use visualization::{CocoVisualizer, ShapesRequest};
pub use widget::{CocoWidget, DisplayToggle, Status, WidgetState};
