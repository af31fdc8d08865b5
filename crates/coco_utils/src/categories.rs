//! Category lookup, color assignment and counting.

use std::collections::BTreeMap;

use crate::dataset::{CocoCategory, CocoDataset};
use crate::palette::{category_colors, Rgba, WHITE};

/// Category table of a dataset with stable colors.
///
/// Colors are assigned in ascending category-id order, so the same set of
/// categories always gets the same colors regardless of file order.
#[derive(Debug, Clone, Default)]
pub struct CategoryManager {
    categories: BTreeMap<u64, CocoCategory>,
    colors: BTreeMap<u64, Rgba>,
    counts: BTreeMap<u64, usize>,
}

impl CategoryManager {
    pub fn new(dataset: &CocoDataset) -> Self {
        let categories: BTreeMap<u64, CocoCategory> = dataset
            .categories
            .iter()
            .map(|cat| (cat.id, cat.clone()))
            .collect();

        let palette = category_colors(categories.len());
        let colors = categories.keys().copied().zip(palette).collect();

        let mut counts: BTreeMap<u64, usize> = categories.keys().map(|&id| (id, 0)).collect();
        for ann in &dataset.annotations {
            *counts.entry(ann.category_id).or_insert(0) += 1;
        }

        Self {
            categories,
            colors,
            counts,
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&CocoCategory> {
        self.categories.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.categories.contains_key(&id)
    }

    /// Category name, or `category_<id>` for ids missing from the table.
    pub fn name(&self, id: u64) -> String {
        self.categories
            .get(&id)
            .map(|cat| cat.name.clone())
            .unwrap_or_else(|| format!("category_{}", id))
    }

    /// Category ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.categories.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CocoCategory> {
        self.categories.values()
    }

    /// Color of a category, white when the id is unknown.
    pub fn color(&self, id: u64) -> Rgba {
        self.colors.get(&id).copied().unwrap_or(WHITE)
    }

    pub fn colors(&self) -> &BTreeMap<u64, Rgba> {
        &self.colors
    }

    /// Number of annotations in the whole dataset using this category.
    pub fn count(&self, id: u64) -> usize {
        self.counts.get(&id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CocoAnnotation;

    fn dataset() -> CocoDataset {
        CocoDataset {
            categories: vec![CocoCategory::new(5, "car"), CocoCategory::new(2, "person")],
            annotations: vec![
                CocoAnnotation::new(1, 1, 2),
                CocoAnnotation::new(2, 1, 2),
                CocoAnnotation::new(3, 1, 9),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_colors_follow_sorted_ids() {
        let manager = CategoryManager::new(&dataset());
        let palette = category_colors(2);
        assert_eq!(manager.color(2), palette[0]);
        assert_eq!(manager.color(5), palette[1]);
        assert_eq!(manager.color(42), WHITE);
        assert_eq!(manager.ids().collect::<Vec<_>>(), vec![2, 5]);
    }

    #[test]
    fn test_counts_and_names() {
        let manager = CategoryManager::new(&dataset());
        assert_eq!(manager.count(2), 2);
        assert_eq!(manager.count(5), 0);
        assert_eq!(manager.count(9), 1);
        assert_eq!(manager.name(5), "car");
        assert_eq!(manager.name(9), "category_9");
    }
}
