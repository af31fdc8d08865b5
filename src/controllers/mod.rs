//! Stateful controllers behind the COCO widget.
//!
//! Each controller owns one concern: the loaded file, category visibility,
//! the current image, the layers in the viewer, and the display options.
//! The widget wires them together in its event handlers.

mod category;
mod display;
mod file_manager;
mod navigation;
mod visualization;

pub use category::CategoryController;
pub use display::{CountInfo, DisplayController};
pub use file_manager::{CocoFileManager, FileInfo};
pub use navigation::NavigationController;
pub use visualization::{RefreshRequest, VisualizationManager, VisualizationMode};
