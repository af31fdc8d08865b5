//! Turning COCO annotations into viewer layers.
//!
//! [`CocoVisualizer`] owns a shared dataset and builds a shapes layer per
//! image on request. Masks become filled polygons, boxes become outlined
//! rectangles, and the N-filter subsamples at the annotation level so every
//! shape of a picked annotation is shown together. The masked mode builds a
//! labels layer plus a copy of the background image with everything outside
//! the visible annotations blacked out.

use std::collections::BTreeMap;
use std::sync::Arc;

use ndarray::{Array2, Array3};
use rand::SeedableRng;
use rand::rngs::StdRng;

use coco_utils::palette::{Rgba, TRANSPARENT};
use coco_utils::{CategoryManager, CocoAnnotation, CocoDataset, Mask, Segmentation, annotation_mask};
use coco_viewer::{ImageLayer, LabelsLayer, LayerData, Properties, PropertyValue, ShapeType, ShapesLayer};

use crate::config::PluginConfig;
use crate::memory::{LruCache, MemoryManager, MemoryStats};
use crate::utils::{bbox_to_viewer_rectangle, coco_to_viewer_coordinates};

/// Base name of the annotation shapes layer.
pub const SHAPES_LAYER_NAME: &str = "COCO Annotations";
/// Base name of the masked-mode labels layer.
pub const LABELS_LAYER_NAME: &str = "COCO Labels";
/// Base name of the masked-mode image layer.
pub const MASKED_IMAGE_LAYER_NAME: &str = "COCO Masked Image";

/// Seed used until the user asks for a resample.
pub const DEFAULT_SEED: u64 = 42;

const ANNOTATION_ENTRY_BYTES: usize = 200;
const SHAPE_ENTRY_BYTES: usize = 1024;
const BBOX_ENTRY_BYTES: usize = 64;

/// Which annotations to draw and how.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapesRequest {
    pub image_id: u64,
    /// Categories to include; `None` includes all
    pub category_filter: Option<Vec<u64>>,
    pub show_bbox: bool,
    pub show_mask: bool,
    /// Maximum number of annotations; `None` or `Some(0)` shows all
    pub n_filter: Option<usize>,
    pub random_seed: u64,
}

impl ShapesRequest {
    pub fn new(image_id: u64) -> Self {
        Self {
            image_id,
            category_filter: None,
            show_bbox: true,
            show_mask: true,
            n_filter: None,
            random_seed: DEFAULT_SEED,
        }
    }

    pub fn with_categories(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.category_filter = Some(ids.into_iter().collect());
        self
    }

    pub fn with_display(mut self, show_bbox: bool, show_mask: bool) -> Self {
        self.show_bbox = show_bbox;
        self.show_mask = show_mask;
        self
    }

    pub fn with_n_filter(mut self, n: usize) -> Self {
        self.n_filter = Some(n);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Same request with the category filter sorted and deduplicated.
    fn normalized(&self) -> Self {
        let mut key = self.clone();
        if let Some(ids) = key.category_filter.as_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
        key
    }
}

type SelectionKey = (u64, Option<Vec<u64>>);

/// Builds layers from a COCO dataset, with caching.
pub struct CocoVisualizer {
    dataset: Arc<CocoDataset>,
    categories: CategoryManager,
    // parallel to dataset.annotations
    ann_image_ids: Vec<u64>,
    ann_category_ids: Vec<u64>,
    caching: bool,
    annotation_cache: LruCache<SelectionKey, Vec<usize>>,
    shape_cache: LruCache<ShapesRequest, Option<ShapesLayer>>,
    polygon_cache: LruCache<Vec<u64>, Option<Array2<f64>>>,
    bbox_cache: LruCache<[u64; 4], Option<Array2<f64>>>,
    memory: MemoryManager,
}

impl CocoVisualizer {
    pub fn new(dataset: Arc<CocoDataset>, config: &PluginConfig) -> Self {
        let categories = CategoryManager::new(&dataset);
        let ann_image_ids = dataset.annotations.iter().map(|a| a.image_id).collect();
        let ann_category_ids = dataset.annotations.iter().map(|a| a.category_id).collect();

        log::debug!(
            "Visualizer ready: {} annotations, {} categories",
            dataset.annotations.len(),
            categories.len()
        );

        Self {
            dataset,
            categories,
            ann_image_ids,
            ann_category_ids,
            caching: config.visualization.enable_caching,
            annotation_cache: LruCache::new(50, 25),
            shape_cache: LruCache::new(config.visualization.cache_size_limit.max(1), 100),
            polygon_cache: LruCache::new(1000, 50),
            bbox_cache: LruCache::new(1000, 10),
            memory: MemoryManager::new(
                config.performance.gc_threshold,
                config.performance.memory_limit_mb,
            ),
        }
    }

    pub fn dataset(&self) -> &Arc<CocoDataset> {
        &self.dataset
    }

    pub fn categories(&self) -> &CategoryManager {
        &self.categories
    }

    /// Category id to color, assigned in ascending id order.
    pub fn category_colors(&self) -> &BTreeMap<u64, Rgba> {
        self.categories.colors()
    }

    /// Number of annotations using a category across the whole dataset.
    pub fn category_count(&self, category_id: u64) -> usize {
        self.categories.count(category_id)
    }

    /// Indices of the annotations on `image_id` passing the category filter.
    pub fn selected_annotations(&mut self, image_id: u64, filter: Option<&[u64]>) -> Vec<usize> {
        let key: SelectionKey = (
            image_id,
            filter.map(|ids| {
                let mut ids = ids.to_vec();
                ids.sort_unstable();
                ids.dedup();
                ids
            }),
        );
        if self.caching {
            if let Some(cached) = self.annotation_cache.get(&key) {
                return cached.clone();
            }
        }

        let indices: Vec<usize> = self
            .ann_image_ids
            .iter()
            .zip(&self.ann_category_ids)
            .enumerate()
            .filter(|(_, (img, cat))| {
                **img == image_id && key.1.as_ref().is_none_or(|ids| ids.binary_search(*cat).is_ok())
            })
            .map(|(i, _)| i)
            .collect();

        if self.caching {
            let size = indices.len() * ANNOTATION_ENTRY_BYTES;
            self.annotation_cache.put(key, indices.clone(), size);
        }
        indices
    }

    /// Build the shapes layer for a request. `None` when there is nothing to draw.
    pub fn create_shapes_layer(&mut self, request: &ShapesRequest) -> Option<ShapesLayer> {
        let key = request.normalized();
        if self.caching {
            if let Some(cached) = self.shape_cache.get(&key) {
                log::trace!("Shape cache hit for image {}", key.image_id);
                return cached.clone();
            }
        }

        let layer = self.build_shapes_layer(&key);

        if self.caching {
            let size = layer.as_ref().map_or(0, |l| l.len() * SHAPE_ENTRY_BYTES);
            self.shape_cache.put(key, layer.clone(), size);
        }
        self.track_operation();
        layer
    }

    fn build_shapes_layer(&mut self, request: &ShapesRequest) -> Option<ShapesLayer> {
        let mut indices =
            self.selected_annotations(request.image_id, request.category_filter.as_deref());
        if indices.is_empty() {
            return None;
        }

        if let Some(n) = request.n_filter.filter(|&n| n > 0 && n < indices.len()) {
            let total = indices.len();
            indices = subsample_annotations(&indices, n, request.random_seed);
            log::info!("N-filter applied: {} of {} annotations sampled", indices.len(), total);
        }

        let dataset = Arc::clone(&self.dataset);
        let image_dims = dataset
            .image(request.image_id)
            .map(|img| (img.height as usize, img.width as usize));

        let mut layer = ShapesLayer::new(SHAPES_LAYER_NAME);
        layer.edge_width = 2.0;

        for &idx in &indices {
            let ann = &dataset.annotations[idx];
            let color = self.categories.color(ann.category_id);

            if request.show_mask {
                for vertices in self.mask_shapes(ann, image_dims) {
                    layer.push(
                        vertices,
                        ShapeType::Polygon,
                        color,
                        color,
                        self.shape_properties(ann, "mask"),
                    );
                }
            }

            if request.show_bbox {
                if let Some(vertices) = ann.bbox.as_deref().and_then(|b| self.convert_bbox(b)) {
                    let shape_type = if request.show_mask {
                        ShapeType::Polygon
                    } else {
                        ShapeType::Rectangle
                    };
                    layer.push(
                        vertices,
                        shape_type,
                        TRANSPARENT,
                        color,
                        self.shape_properties(ann, "bbox"),
                    );
                }
            }
        }

        (!layer.is_empty()).then_some(layer)
    }

    /// Polygons drawn for an annotation's segmentation.
    ///
    /// Run-length masks have no outline, so they are drawn as the box around
    /// the decoded mask.
    fn mask_shapes(
        &mut self,
        ann: &CocoAnnotation,
        image_dims: Option<(usize, usize)>,
    ) -> Vec<Array2<f64>> {
        match &ann.segmentation {
            Some(Segmentation::Polygons(rings)) => rings
                .iter()
                .filter(|ring| ring.len() >= 6)
                .filter_map(|ring| self.convert_polygon(ring))
                .collect(),
            Some(Segmentation::Rle { size, .. } | Segmentation::CompressedRle { size, .. }) => {
                let (height, width) =
                    image_dims.unwrap_or((size[0] as usize, size[1] as usize));
                annotation_mask(ann, height, width)
                    .bounding_box()
                    .and_then(|[x, y, w, h]| bbox_to_viewer_rectangle(&[x, y, w, h]))
                    .into_iter()
                    .collect()
            }
            None => Vec::new(),
        }
    }

    fn shape_properties(&self, ann: &CocoAnnotation, kind: &str) -> Properties {
        let mut props = Properties::new();
        props.insert("category_id".to_string(), ann.category_id.into());
        props.insert(
            "category_name".to_string(),
            self.categories.name(ann.category_id).into(),
        );
        props.insert("annotation_id".to_string(), ann.id.into());
        props.insert("area".to_string(), PropertyValue::Float(ann.area.unwrap_or(0.0)));
        props.insert("type".to_string(), kind.into());
        props
    }

    fn convert_polygon(&mut self, ring: &[f64]) -> Option<Array2<f64>> {
        if !self.caching {
            return coco_to_viewer_coordinates(ring);
        }
        let key: Vec<u64> = ring.iter().map(|v| v.to_bits()).collect();
        if let Some(cached) = self.polygon_cache.get(&key) {
            return cached.clone();
        }
        let converted = coco_to_viewer_coordinates(ring);
        self.polygon_cache.put(key, converted.clone(), ring.len() * 8);
        converted
    }

    fn convert_bbox(&mut self, bbox: &[f64]) -> Option<Array2<f64>> {
        if !self.caching || bbox.len() < 4 {
            return bbox_to_viewer_rectangle(bbox);
        }
        let key = [bbox[0], bbox[1], bbox[2], bbox[3]].map(f64::to_bits);
        if let Some(cached) = self.bbox_cache.get(&key) {
            return cached.clone();
        }
        let converted = bbox_to_viewer_rectangle(bbox);
        self.bbox_cache.put(key, converted.clone(), BBOX_ENTRY_BYTES);
        converted
    }

    /// Layers for the masked visualization mode.
    ///
    /// Returns a labels layer holding the category id of every covered pixel
    /// and, when a background image is given, a copy of it with all pixels
    /// outside the visible annotations set to zero. Label value 0 is the
    /// background, so pixels of category 0 stay 0 in the labels layer; the
    /// cut-out follows the annotation masks and keeps them. The same category filter
    /// and N-filter as the shapes layer apply. Empty when the image id is
    /// unknown or nothing is visible.
    pub fn create_masked_layers(
        &mut self,
        image_id: u64,
        category_filter: Option<&[u64]>,
        n_filter: Option<usize>,
        random_seed: u64,
        image: Option<&Array3<u8>>,
    ) -> Vec<LayerData> {
        let dims = match (image, self.dataset.image(image_id)) {
            (Some(data), _) => (data.shape()[0], data.shape()[1]),
            (None, Some(img)) => (img.height as usize, img.width as usize),
            (None, None) => {
                log::warn!("Masked mode: unknown image id {}", image_id);
                return Vec::new();
            }
        };

        let mut indices = self.selected_annotations(image_id, category_filter);
        if let Some(n) = n_filter.filter(|&n| n > 0 && n < indices.len()) {
            indices = subsample_annotations(&indices, n, random_seed);
        }
        if indices.is_empty() {
            return Vec::new();
        }

        let (height, width) = dims;
        let mut labels = Array2::<u32>::zeros((height, width));
        let mut covered = Mask::new(height, width);
        for &idx in &indices {
            let ann = &self.dataset.annotations[idx];
            let mask = annotation_mask(ann, height, width);
            covered.union_with(&mask);
            let Ok(label) = u32::try_from(ann.category_id) else {
                log::warn!(
                    "Masked mode: category id {} does not fit a label value, annotation {} left unlabeled",
                    ann.category_id,
                    ann.id
                );
                continue;
            };
            for ((y, x), value) in labels.indexed_iter_mut() {
                if mask.get(y, x) {
                    *value = label;
                }
            }
        }

        let mut labels_layer = LabelsLayer::new(LABELS_LAYER_NAME, labels);
        labels_layer.color = self
            .category_colors()
            .iter()
            .filter_map(|(&id, &color)| u32::try_from(id).ok().map(|id| (id, color)))
            .collect();

        let mut layers = Vec::with_capacity(2);
        if let Some(data) = image {
            let mut masked = data.clone();
            for ((y, x, _), value) in masked.indexed_iter_mut() {
                if !covered.get(y, x) {
                    *value = 0;
                }
            }
            layers.push(LayerData::Image(ImageLayer::new(MASKED_IMAGE_LAYER_NAME, masked)));
        }
        layers.push(LayerData::Labels(labels_layer));

        self.track_operation();
        layers
    }

    /// Drop all cached selections, layers and converted geometry.
    pub fn clear_cache(&mut self) {
        self.annotation_cache.clear();
        self.shape_cache.clear();
        self.polygon_cache.clear();
        self.bbox_cache.clear();
    }

    fn cache_totals(&self) -> (usize, usize) {
        let entries = self.annotation_cache.len()
            + self.shape_cache.len()
            + self.polygon_cache.len()
            + self.bbox_cache.len();
        let bytes = self.annotation_cache.memory_usage()
            + self.shape_cache.memory_usage()
            + self.polygon_cache.memory_usage()
            + self.bbox_cache.memory_usage();
        (entries, bytes)
    }

    pub fn memory_stats(&self) -> MemoryStats {
        let (entries, bytes) = self.cache_totals();
        self.memory.stats(entries, bytes)
    }

    fn track_operation(&mut self) {
        let (_, bytes) = self.cache_totals();
        if self.memory.trigger_operation(bytes) {
            self.clear_cache();
            self.memory.record_cleanup();
        }
    }
}

/// Pick `sample_size` items at random, keeping their original order.
///
/// The same seed always picks the same items. Returns everything when
/// `sample_size` covers the whole input.
pub fn subsample_annotations<T: Clone>(items: &[T], sample_size: usize, seed: u64) -> Vec<T> {
    if sample_size >= items.len() {
        return items.to_vec();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, items.len(), sample_size).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| items[i].clone()).collect()
}
