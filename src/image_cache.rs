//! Background image loading for the masked visualization mode.
//!
//! Images are decoded once to `(H, W, 3)` RGB arrays and kept in a
//! byte-bounded LRU cache keyed by path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::error::{ImageError, ParameterError, ParameterErrorKind};
use ndarray::Array3;

use crate::memory::LruCache;

/// Supported image file extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "tif"];

/// Check if a filename has a supported image extension.
pub fn is_image_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Decode an image file to `(H, W, 3)` RGB.
pub fn load_image(path: &Path) -> Result<Array3<u8>, ImageError> {
    log::info!("🖼️ Loading image: {:?}", path);
    let rgb = image::open(path)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    let data = rgb.into_raw();
    log::info!("🖼️ Loaded {}x{} image", width, height);
    Array3::from_shape_vec((height as usize, width as usize, 3), data).map_err(|_| {
        ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::DimensionMismatch))
    })
}

/// Decoded images by path.
pub struct ImageCache {
    decoded: LruCache<PathBuf, Arc<Array3<u8>>>,
    /// Paths that failed to decode, so they are not retried on every refresh
    failed: Vec<PathBuf>,
}

impl ImageCache {
    /// Keep at most `max_images` images and `max_memory_mb` MB.
    pub fn new(max_images: usize, max_memory_mb: usize) -> Self {
        Self {
            decoded: LruCache::new(max_images, max_memory_mb),
            failed: Vec::new(),
        }
    }

    /// Clear all cached images.
    pub fn clear(&mut self) {
        self.decoded.clear();
        self.failed.clear();
    }

    pub fn len(&self) -> usize {
        self.decoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        self.decoded.memory_usage()
    }

    /// Get a cached image or load it. `None` when the file cannot be decoded.
    pub fn get_or_load(&mut self, path: &Path) -> Option<Arc<Array3<u8>>> {
        let key = path.to_path_buf();
        if let Some(image) = self.decoded.get(&key) {
            return Some(Arc::clone(image));
        }
        if self.failed.contains(&key) {
            return None;
        }

        match load_image(path) {
            Ok(image) => {
                let image = Arc::new(image);
                self.decoded.put(key, Arc::clone(&image), image.len());
                Some(image)
            }
            Err(e) => {
                log::error!("Failed to load image {:?}: {}", path, e);
                self.failed.push(key);
                None
            }
        }
    }

    /// Decode the images next to `current` in `paths` ahead of navigation.
    pub fn preload_adjacent(&mut self, paths: &[PathBuf], current: usize) {
        let neighbours = [current.checked_sub(1), current.checked_add(1)];
        for idx in neighbours.into_iter().flatten() {
            if let Some(path) = paths.get(idx) {
                if !self.decoded.contains(path) {
                    log::debug!("🖼️ Preloading image at index {}", idx);
                    self.get_or_load(path);
                }
            }
        }
    }
}
