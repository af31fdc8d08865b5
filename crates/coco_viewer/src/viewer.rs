//! The viewer and its ordered layer list.

use crate::error::LayerError;
use crate::layer::{ImageLayer, LabelsLayer, LayerData, ShapesLayer};

/// Stable handle of a layer inside a [`LayerList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Layers in draw order, bottom first.
#[derive(Debug, Default)]
pub struct LayerList {
    entries: Vec<(LayerId, LayerData)>,
    next_id: u64,
}

impl LayerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a layer on top.
    pub fn add(&mut self, layer: LayerData) -> Result<LayerId, LayerError> {
        layer.validate()?;
        let id = LayerId(self.next_id);
        self.next_id += 1;
        log::debug!("Adding {} layer '{}' as {:?}", layer.kind().name(), layer.name(), id);
        self.entries.push((id, layer));
        Ok(id)
    }

    pub fn remove(&mut self, id: LayerId) -> Option<LayerData> {
        let pos = self.entries.iter().position(|(lid, _)| *lid == id)?;
        let (_, layer) = self.entries.remove(pos);
        log::debug!("Removed layer '{}' ({:?})", layer.name(), id);
        Some(layer)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.entries.iter().any(|(lid, _)| *lid == id)
    }

    pub fn get(&self, id: LayerId) -> Option<&LayerData> {
        self.entries
            .iter()
            .find(|(lid, _)| *lid == id)
            .map(|(_, layer)| layer)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut LayerData> {
        self.entries
            .iter_mut()
            .find(|(lid, _)| *lid == id)
            .map(|(_, layer)| layer)
    }

    /// Topmost layer with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<LayerId> {
        self.entries
            .iter()
            .rev()
            .find(|(_, layer)| layer.name() == name)
            .map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &LayerData)> {
        self.entries.iter().map(|(id, layer)| (*id, layer))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, layer)| layer.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Headless viewer state: a title and a layer list.
#[derive(Debug)]
pub struct Viewer {
    pub title: String,
    pub layers: LayerList,
}

impl Viewer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            layers: LayerList::new(),
        }
    }

    pub fn add_layer(&mut self, layer: LayerData) -> Result<LayerId, LayerError> {
        self.layers.add(layer)
    }

    pub fn add_shapes(&mut self, layer: ShapesLayer) -> Result<LayerId, LayerError> {
        self.layers.add(LayerData::Shapes(layer))
    }

    pub fn add_labels(&mut self, layer: LabelsLayer) -> Result<LayerId, LayerError> {
        self.layers.add(LayerData::Labels(layer))
    }

    pub fn add_image(&mut self, layer: ImageLayer) -> Result<LayerId, LayerError> {
        self.layers.add(LayerData::Image(layer))
    }

    /// Replace the contents of an existing layer in place.
    ///
    /// The replacement must be of the same kind and pass validation; on error
    /// the layer is left untouched.
    pub fn replace_layer(&mut self, id: LayerId, layer: LayerData) -> Result<(), LayerError> {
        let current = self.layers.get_mut(id).ok_or(LayerError::NotFound(id))?;
        if current.kind() != layer.kind() {
            return Err(LayerError::WrongKind {
                id,
                expected: current.kind().name(),
                found: layer.kind().name(),
            });
        }
        layer.validate()?;
        *current = layer;
        Ok(())
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new("viewer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, Array3};

    fn shapes(name: &str) -> ShapesLayer {
        let mut layer = ShapesLayer::new(name);
        layer.push(
            array![[0.0, 0.0], [0.0, 2.0], [2.0, 2.0]],
            crate::layer::ShapeType::Polygon,
            [1.0; 4],
            [1.0; 4],
            Default::default(),
        );
        layer
    }

    #[test]
    fn test_add_remove_contains() {
        let mut viewer = Viewer::default();
        let a = viewer.add_shapes(shapes("a")).unwrap();
        let b = viewer.add_image(ImageLayer::new("b", Array3::zeros((2, 2, 3)))).unwrap();

        assert_ne!(a, b);
        assert_eq!(viewer.layers.len(), 2);
        assert_eq!(viewer.layers.names(), vec!["a", "b"]);
        assert_eq!(viewer.layers.find_by_name("b"), Some(b));

        assert!(viewer.layers.remove(a).is_some());
        assert!(!viewer.layers.contains(a));
        assert!(viewer.layers.remove(a).is_none());
    }

    #[test]
    fn test_invalid_layer_is_rejected() {
        let mut viewer = Viewer::default();
        let mut layer = shapes("broken");
        layer.face_color.clear();
        assert!(viewer.add_shapes(layer).is_err());
        assert!(viewer.layers.is_empty());
    }

    #[test]
    fn test_replace_layer_keeps_original_on_error() {
        let mut viewer = Viewer::default();
        let id = viewer.add_shapes(shapes("a")).unwrap();

        let mut bad = shapes("a");
        bad.edge_color.clear();
        assert!(viewer.replace_layer(id, LayerData::Shapes(bad)).is_err());
        assert_eq!(viewer.layers.get(id).and_then(|l| l.as_shapes()).map(|s| s.len()), Some(1));

        let labels = LayerData::Labels(LabelsLayer::new("l", Array2::zeros((1, 1))));
        assert!(matches!(
            viewer.replace_layer(id, labels),
            Err(LayerError::WrongKind { .. })
        ));

        let mut renamed = shapes("renamed");
        renamed.edge_width = 3.0;
        viewer.replace_layer(id, LayerData::Shapes(renamed)).unwrap();
        assert_eq!(viewer.layers.get(id).map(|l| l.name()), Some("renamed"));
    }
}
