use std::collections::BTreeMap;

use coco_utils::palette::{Rgba, WHITE};
use coco_utils::{CocoCategory, CocoDataset};

use crate::utils::{generate_category_colors, get_category_info};

/// Category visibility and colors.
///
/// The visibility map only ever holds known category ids, so the selection
/// is always a subset of the dataset's categories.
#[derive(Debug, Default)]
pub struct CategoryController {
    categories: BTreeMap<u64, CocoCategory>,
    states: BTreeMap<u64, bool>,
    colors: BTreeMap<u64, Rgba>,
}

impl CategoryController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the categories of `dataset`, all visible, colored by sorted id.
    pub fn initialize_categories(&mut self, dataset: &CocoDataset) {
        self.categories = get_category_info(dataset)
            .into_iter()
            .map(|(id, cat)| (id, cat.clone()))
            .collect();
        let palette = generate_category_colors(self.categories.len());
        self.colors = self.categories.keys().copied().zip(palette).collect();
        self.states = self.categories.keys().map(|&id| (id, true)).collect();
    }

    /// Show or hide a category. Returns false for unknown ids, which are ignored.
    pub fn toggle_category(&mut self, category_id: u64, enabled: bool) -> bool {
        match self.states.get_mut(&category_id) {
            Some(state) => {
                *state = enabled;
                true
            }
            None => {
                log::debug!("Ignoring toggle of unknown category {}", category_id);
                false
            }
        }
    }

    /// Visible category ids in ascending order.
    pub fn selected_categories(&self) -> Vec<u64> {
        self.states
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn is_selected(&self, category_id: u64) -> bool {
        self.states.get(&category_id).copied().unwrap_or(false)
    }

    pub fn select_all(&mut self) {
        self.states.values_mut().for_each(|state| *state = true);
    }

    pub fn select_none(&mut self) {
        self.states.values_mut().for_each(|state| *state = false);
    }

    /// Color of a category, white for unknown ids.
    pub fn category_color(&self, category_id: u64) -> Rgba {
        self.colors.get(&category_id).copied().unwrap_or(WHITE)
    }

    pub fn categories(&self) -> &BTreeMap<u64, CocoCategory> {
        &self.categories
    }
}
