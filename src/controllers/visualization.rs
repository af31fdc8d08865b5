use std::sync::Arc;

use ndarray::Array3;

use coco_utils::CocoDataset;
use coco_viewer::{LayerData, LayerError, LayerId, Viewer};

use crate::config::PluginConfig;
use crate::memory::ResourceTracker;
use crate::visualization::{CocoVisualizer, ShapesRequest, DEFAULT_SEED, SHAPES_LAYER_NAME};

/// How annotations are shown in the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualizationMode {
    /// Shapes drawn over the image
    #[default]
    Overlay,
    /// A labels layer plus the image cut out to the annotated pixels
    Masked,
}

impl VisualizationMode {
    pub fn name(&self) -> &'static str {
        match self {
            VisualizationMode::Overlay => "Overlay",
            VisualizationMode::Masked => "Masked",
        }
    }
}

/// What to draw on the next refresh.
#[derive(Debug, Clone, Copy)]
pub struct RefreshRequest<'a> {
    pub image_id: u64,
    pub selected_categories: &'a [u64],
    /// Used in the layer name, may be empty
    pub image_filename: &'a str,
    pub show_bbox: bool,
    pub show_mask: bool,
    /// Background pixels for masked mode
    pub background: Option<&'a Array3<u8>>,
}

/// Owns the visualizer and the layers it put into the viewer.
pub struct VisualizationManager {
    config: PluginConfig,
    visualizer: Option<CocoVisualizer>,
    shapes_layer: Option<LayerId>,
    masked_layers: Vec<LayerId>,
    n_filter: Option<usize>,
    random_seed: u64,
    mode: VisualizationMode,
}

impl VisualizationManager {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            config,
            visualizer: None,
            shapes_layer: None,
            masked_layers: Vec::new(),
            n_filter: None,
            random_seed: DEFAULT_SEED,
            mode: VisualizationMode::default(),
        }
    }

    pub fn initialize_visualizer(&mut self, dataset: Arc<CocoDataset>) {
        self.visualizer = Some(CocoVisualizer::new(dataset, &self.config));
    }

    pub fn visualizer(&self) -> Option<&CocoVisualizer> {
        self.visualizer.as_ref()
    }

    pub fn set_n_filter(&mut self, value: usize) {
        self.n_filter = Some(value);
    }

    pub fn n_filter(&self) -> Option<usize> {
        self.n_filter
    }

    pub fn set_random_seed(&mut self, seed: u64) {
        self.random_seed = seed;
    }

    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    pub fn set_mode(&mut self, mode: VisualizationMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    /// Id of the shapes layer currently owned by this manager.
    pub fn shapes_layer(&self) -> Option<LayerId> {
        self.shapes_layer
    }

    pub fn masked_layers(&self) -> &[LayerId] {
        &self.masked_layers
    }

    /// Redraw the annotations of one image.
    ///
    /// In overlay mode the existing shapes layer is updated in place and
    /// recreated when the viewer rejects the update. When nothing is visible
    /// the layer is removed. Does nothing before a dataset is loaded.
    pub fn refresh_visualization(
        &mut self,
        viewer: &mut Viewer,
        request: &RefreshRequest<'_>,
    ) -> Result<(), LayerError> {
        if self.visualizer.is_none() {
            return Ok(());
        }
        let _tracker = ResourceTracker::new("refresh_visualization");

        match self.mode {
            VisualizationMode::Overlay => {
                self.remove_masked_layers(viewer);
                self.refresh_overlay(viewer, request)
            }
            VisualizationMode::Masked => {
                self.remove_shapes_layer(viewer);
                self.refresh_masked(viewer, request)
            }
        }
    }

    fn refresh_overlay(
        &mut self,
        viewer: &mut Viewer,
        request: &RefreshRequest<'_>,
    ) -> Result<(), LayerError> {
        let Some(visualizer) = self.visualizer.as_mut() else {
            return Ok(());
        };
        let mut shapes_request = ShapesRequest::new(request.image_id)
            .with_categories(request.selected_categories.iter().copied())
            .with_display(request.show_bbox, request.show_mask)
            .with_seed(self.random_seed);
        if let Some(n) = self.n_filter {
            shapes_request = shapes_request.with_n_filter(n);
        }

        let Some(mut layer) = visualizer.create_shapes_layer(&shapes_request) else {
            self.remove_shapes_layer(viewer);
            return Ok(());
        };

        layer.name = if request.image_filename.is_empty() {
            SHAPES_LAYER_NAME.to_string()
        } else {
            format!("{} - {}", SHAPES_LAYER_NAME, request.image_filename)
        };
        layer.edge_width = self.config.visualization.default_edge_width;
        layer.opacity = self.config.visualization.default_opacity;
        let layer = LayerData::Shapes(layer);

        if let Some(id) = self.shapes_layer {
            match viewer.replace_layer(id, layer.clone()) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::debug!("Recreating annotation layer: {}", e);
                    self.remove_shapes_layer(viewer);
                }
            }
        }
        self.shapes_layer = Some(viewer.add_layer(layer)?);
        Ok(())
    }

    fn refresh_masked(
        &mut self,
        viewer: &mut Viewer,
        request: &RefreshRequest<'_>,
    ) -> Result<(), LayerError> {
        self.remove_masked_layers(viewer);
        let Some(visualizer) = self.visualizer.as_mut() else {
            return Ok(());
        };
        let layers = visualizer.create_masked_layers(
            request.image_id,
            Some(request.selected_categories),
            self.n_filter,
            self.random_seed,
            request.background,
        );
        for mut layer in layers {
            if !request.image_filename.is_empty() {
                let name = format!("{} - {}", layer.name(), request.image_filename);
                layer.set_name(name);
            }
            let id = viewer.add_layer(layer)?;
            self.masked_layers.push(id);
        }
        Ok(())
    }

    fn remove_shapes_layer(&mut self, viewer: &mut Viewer) {
        if let Some(id) = self.shapes_layer.take() {
            viewer.layers.remove(id);
        }
    }

    fn remove_masked_layers(&mut self, viewer: &mut Viewer) {
        for id in self.masked_layers.drain(..) {
            viewer.layers.remove(id);
        }
    }

    /// Remove every layer this manager added.
    pub fn cleanup(&mut self, viewer: &mut Viewer) {
        self.remove_shapes_layer(viewer);
        self.remove_masked_layers(viewer);
    }

    /// Forget the loaded dataset after removing its layers.
    pub fn reset(&mut self, viewer: &mut Viewer) {
        self.cleanup(viewer);
        self.visualizer = None;
    }
}
