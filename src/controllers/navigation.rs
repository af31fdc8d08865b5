use coco_utils::{CocoDataset, CocoImage};

/// Current position in a multi-image dataset.
#[derive(Debug, Default)]
pub struct NavigationController {
    images: Vec<CocoImage>,
    current: usize,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the image list of `dataset` and go to the first image.
    pub fn initialize_images(&mut self, dataset: &CocoDataset) {
        self.images = dataset.images.clone();
        self.current = 0;
    }

    pub fn images(&self) -> &[CocoImage] {
        &self.images
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_image(&self) -> Option<&CocoImage> {
        self.images.get(self.current)
    }

    pub fn current_image_id(&self) -> Option<u64> {
        self.current_image().map(|img| img.id)
    }

    /// Go to `index`. Out-of-range indices fail and leave the position unchanged.
    pub fn navigate_to_image(&mut self, index: usize) -> bool {
        if index < self.images.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    pub fn can_go_previous(&self) -> bool {
        self.current > 0
    }

    pub fn can_go_next(&self) -> bool {
        self.current + 1 < self.images.len()
    }

    pub fn go_previous(&mut self) -> bool {
        if self.can_go_previous() {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    pub fn go_next(&mut self) -> bool {
        if self.can_go_next() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    pub fn has_multiple_images(&self) -> bool {
        self.images.len() > 1
    }
}
