use std::path::{Path, PathBuf};
use std::sync::Arc;

use coco_utils::{CocoDataset, CocoImage};

use crate::error::CocoError;
use crate::utils::load_coco_file;

/// Summary of the loaded file for the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub num_annotations: usize,
    pub num_images: usize,
    pub num_categories: usize,
    pub file_name: String,
}

/// Holds the loaded COCO file.
#[derive(Debug, Default)]
pub struct CocoFileManager {
    data: Option<Arc<CocoDataset>>,
    path: Option<PathBuf>,
}

impl CocoFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a COCO file. On error the previously loaded file stays current.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Arc<CocoDataset>, CocoError> {
        let path = path.as_ref();
        let data = Arc::new(load_coco_file(path)?);
        self.data = Some(Arc::clone(&data));
        self.path = Some(path.to_path_buf());
        Ok(data)
    }

    pub fn file_info(&self) -> Option<FileInfo> {
        let data = self.data.as_ref()?;
        Some(FileInfo {
            num_annotations: data.annotations.len(),
            num_images: data.images.len(),
            num_categories: data.categories.len(),
            file_name: self
                .path
                .as_deref()
                .and_then(Path::file_name)
                .map_or_else(|| "Unknown".to_string(), |n| n.to_string_lossy().into_owned()),
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn data(&self) -> Option<&Arc<CocoDataset>> {
        self.data.as_ref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Location of an image file, relative paths taken from the COCO file's directory.
    pub fn resolve_image_path(&self, image: &CocoImage) -> Option<PathBuf> {
        let file = Path::new(&image.file_name);
        if file.is_absolute() {
            return Some(file.to_path_buf());
        }
        let dir = self.path.as_deref()?.parent()?;
        Some(dir.join(file))
    }
}
