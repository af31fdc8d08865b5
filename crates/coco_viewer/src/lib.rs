//! coco_viewer - headless layer viewer and plugin host
//!
//! Models what an annotation plugin needs from its host: image, labels and
//! shapes layers, an ordered layer list, and reader/widget discovery through
//! plugin manifests.

pub mod error;
pub mod layer;
pub mod plugin;
pub mod viewer;

pub use error::LayerError;
pub use layer::{
    ImageLayer, LabelsLayer, LayerData, LayerKind, Properties, PropertyValue, Rgba, ShapeType,
    ShapesLayer,
};
pub use plugin::{
    Contributions, PluginManifest, PluginRegistry, ReaderContribution, ReaderHook,
    WidgetContribution,
};
pub use viewer::{LayerId, LayerList, Viewer};
