//! coco_utils - COCO annotation dataset utilities
//!
//! Typed COCO model, JSON I/O, stable category colors and segmentation mask
//! rasterization. Used by the viewer plugin as its annotation library.

pub mod categories;
pub mod dataset;
pub mod io;
pub mod mask;
pub mod palette;

pub use categories::CategoryManager;
pub use dataset::{CocoAnnotation, CocoCategory, CocoDataset, CocoImage, CocoInfo, Segmentation};
pub use io::{load_coco, save_coco, LoadError};
pub use mask::{annotation_mask, Mask};
pub use palette::{category_colors, Rgba};
