//! Reading and writing COCO JSON files.

use std::path::Path;

use thiserror::Error;

use crate::dataset::CocoDataset;

/// Errors that can occur while loading or saving a COCO file.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The content is not valid JSON, or does not match the COCO schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load a COCO dataset from a JSON file.
pub fn load_coco(path: impl AsRef<Path>) -> Result<CocoDataset, LoadError> {
    let path = path.as_ref();
    log::debug!("Loading COCO dataset from {:?}", path);

    let json = std::fs::read_to_string(path)?;
    let dataset = from_json_str(&json)?;

    log::info!(
        "Loaded {:?}: {} images, {} annotations, {} categories",
        path,
        dataset.images.len(),
        dataset.annotations.len(),
        dataset.categories.len()
    );
    Ok(dataset)
}

/// Parse a COCO dataset from a JSON string.
pub fn from_json_str(json: &str) -> Result<CocoDataset, LoadError> {
    Ok(serde_json::from_str(json)?)
}

/// Parse a COCO dataset from an already decoded JSON value.
pub fn from_json_value(value: serde_json::Value) -> Result<CocoDataset, LoadError> {
    Ok(serde_json::from_value(value)?)
}

/// Write a COCO dataset as pretty-printed JSON.
pub fn save_coco(path: impl AsRef<Path>, dataset: &CocoDataset) -> Result<(), LoadError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(dataset)?;
    std::fs::write(path, json)?;
    log::info!("Saved COCO dataset to {:?}", path);
    Ok(())
}
