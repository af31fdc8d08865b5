use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use coco_utils::CocoDataset;

use crate::config::PluginConfig;
use crate::utils::{filter_annotations_by_category, get_image_annotations};
use crate::visualization::DEFAULT_SEED;

/// Annotation counts shown next to the N-filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountInfo {
    /// Annotations of the current image in the selected categories
    pub visible: usize,
    /// Annotations in the whole dataset
    pub total: usize,
}

/// Display options: N-filter, sampling seed and the bbox/mask toggles.
pub struct DisplayController {
    pub n_filter_value: usize,
    pub random_seed: u64,
    pub show_bounding_boxes: bool,
    pub show_masks: bool,
    rng: StdRng,
}

impl DisplayController {
    pub const SEED_RANGE: std::ops::RangeInclusive<u64> = 1..=10_000;

    pub fn new(config: &PluginConfig) -> Self {
        Self {
            n_filter_value: config.ui.default_n_filter.max(1),
            random_seed: DEFAULT_SEED,
            show_bounding_boxes: true,
            show_masks: true,
            rng: StdRng::from_entropy(),
        }
    }

    /// Set the N-filter, at least 1.
    pub fn set_n_filter(&mut self, value: usize) {
        self.n_filter_value = value.max(1);
    }

    pub fn set_annotation_display_mode(&mut self, show_bbox: bool, show_mask: bool) {
        self.show_bounding_boxes = show_bbox;
        self.show_masks = show_mask;
    }

    /// Pick a new sampling seed and return it.
    pub fn resample(&mut self) -> u64 {
        self.random_seed = self.rng.gen_range(Self::SEED_RANGE);
        log::info!("New random seed: {}", self.random_seed);
        self.random_seed
    }

    /// `(show_bbox, show_mask)` to start with for `dataset`.
    ///
    /// Bbox-only data hides masks; everything else shows both.
    pub fn determine_default_display_modes(dataset: &CocoDataset) -> (bool, bool) {
        if dataset.annotations.is_empty() || dataset.has_segmentation() {
            return (true, true);
        }
        if dataset.has_bbox() {
            (true, false)
        } else {
            (true, true)
        }
    }

    pub fn annotation_count_info(
        dataset: &CocoDataset,
        image_id: u64,
        selected_categories: &[u64],
    ) -> CountInfo {
        let annotations = get_image_annotations(dataset, image_id);
        CountInfo {
            visible: filter_annotations_by_category(&annotations, selected_categories).len(),
            total: dataset.annotations.len(),
        }
    }
}

impl Default for DisplayController {
    fn default() -> Self {
        Self::new(&PluginConfig::default())
    }
}
