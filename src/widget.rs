//! Headless COCO controls widget.
//!
//! [`CocoWidget`] holds the controllers plus the state a dock widget would
//! display ([`WidgetState`]). Front ends call the `on_*` handlers when the
//! user interacts and render from [`CocoWidget::state`].

use std::path::Path;
use std::sync::Arc;

use ndarray::Array3;

use coco_utils::palette::Rgba;
use coco_viewer::Viewer;

use crate::config::PluginConfig;
use crate::controllers::{
    CategoryController, CocoFileManager, DisplayController, FileInfo, NavigationController,
    RefreshRequest, VisualizationManager, VisualizationMode,
};
use crate::error::CocoError;
use crate::image_cache::{is_image_file, ImageCache};

const NO_FILE_LABEL: &str = "No file selected";
const N_FILTER_MAX: usize = 10_000;
const N_FILTER_RESET_CAP: usize = 1000;
const IMAGE_CACHE_ENTRIES: usize = 8;

/// Status line contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ready,
    Loading,
    Success(String),
    Error(String),
}

impl Status {
    pub fn text(&self) -> String {
        match self {
            Status::Ready => "Ready".to_string(),
            Status::Loading => "Loading COCO file...".to_string(),
            Status::Success(message) => format!("✓ {}", message),
            Status::Error(message) => format!("✗ {}", message),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error(_))
    }
}

/// One category check box.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryToggle {
    pub category_id: u64,
    /// `"<name> (<count>)"`
    pub label: String,
    pub checked: bool,
    /// Text color, `None` when category colors are switched off
    pub color: Option<Rgba>,
}

/// Integer spin box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinBox {
    pub value: usize,
    pub min: usize,
    pub max: usize,
    pub enabled: bool,
}

/// Which display check box changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayToggle {
    BoundingBoxes,
    Masks,
}

/// Everything the widget shows.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState {
    pub file_label: String,
    pub status: Status,
    pub category_toggles: Vec<CategoryToggle>,
    pub select_buttons_enabled: bool,
    pub n_filter: SpinBox,
    pub annotation_count_label: String,
    pub resample_enabled: bool,
    pub show_bbox: bool,
    pub show_mask: bool,
    pub display_toggles_enabled: bool,
    pub visualization_mode: VisualizationMode,
    /// `"<i+1>: <file_name>"` per image
    pub image_entries: Vec<String>,
    pub image_combo_enabled: bool,
    pub current_image_index: usize,
    pub prev_enabled: bool,
    pub next_enabled: bool,
}

impl WidgetState {
    fn new(n_filter: usize) -> Self {
        Self {
            file_label: NO_FILE_LABEL.to_string(),
            status: Status::Ready,
            category_toggles: Vec::new(),
            select_buttons_enabled: false,
            n_filter: SpinBox {
                value: n_filter,
                min: 1,
                max: N_FILTER_MAX,
                enabled: false,
            },
            annotation_count_label: "/ 0 total".to_string(),
            resample_enabled: false,
            show_bbox: true,
            show_mask: true,
            display_toggles_enabled: false,
            visualization_mode: VisualizationMode::Overlay,
            image_entries: Vec::new(),
            image_combo_enabled: false,
            current_image_index: 0,
            prev_enabled: false,
            next_enabled: false,
        }
    }
}

/// COCO controls: file loading, category filter, N-filter, display options
/// and image navigation.
pub struct CocoWidget {
    config: PluginConfig,
    file_manager: CocoFileManager,
    category_controller: CategoryController,
    navigation_controller: NavigationController,
    visualization_manager: VisualizationManager,
    display_controller: DisplayController,
    image_cache: ImageCache,
    state: WidgetState,
}

impl CocoWidget {
    pub fn new(config: PluginConfig) -> Self {
        let display_controller = DisplayController::new(&config);
        let state = WidgetState::new(display_controller.n_filter_value);
        Self {
            file_manager: CocoFileManager::new(),
            category_controller: CategoryController::new(),
            navigation_controller: NavigationController::new(),
            visualization_manager: VisualizationManager::new(config.clone()),
            display_controller,
            image_cache: ImageCache::new(IMAGE_CACHE_ENTRIES, config.performance.memory_limit_mb),
            config,
            state,
        }
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn file_manager(&self) -> &CocoFileManager {
        &self.file_manager
    }

    pub fn category_controller(&self) -> &CategoryController {
        &self.category_controller
    }

    pub fn navigation_controller(&self) -> &NavigationController {
        &self.navigation_controller
    }

    pub fn visualization_manager(&self) -> &VisualizationManager {
        &self.visualization_manager
    }

    pub fn display_controller(&self) -> &DisplayController {
        &self.display_controller
    }

    /// Load a COCO file and show its first image.
    ///
    /// On failure the controllers are reset, the annotation layers removed
    /// and the error shown in the status line.
    pub fn on_file_selected(
        &mut self,
        viewer: &mut Viewer,
        path: impl AsRef<Path>,
    ) -> Result<FileInfo, CocoError> {
        let path = path.as_ref();
        self.state.status = Status::Loading;
        log::debug!("Diagnostics for {:?}:\n{}", path, crate::utils::diagnose_coco_file(path));

        let data = match self.file_manager.load_file(path) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Error loading COCO file {:?}: {}", path, e);
                self.state.status = Status::Error(e.user_message());
                self.reset_controllers(viewer);
                return Err(e);
            }
        };

        self.category_controller.initialize_categories(&data);
        self.navigation_controller.initialize_images(&data);
        self.visualization_manager.initialize_visualizer(Arc::clone(&data));
        self.visualization_manager
            .set_random_seed(self.display_controller.random_seed);

        let (show_bbox, show_mask) = DisplayController::determine_default_display_modes(&data);
        self.state.show_bbox = show_bbox;
        self.state.show_mask = show_mask;
        self.display_controller
            .set_annotation_display_mode(show_bbox, show_mask);

        let info = self
            .file_manager
            .file_info()
            .ok_or_else(|| CocoError::Other("file info unavailable after load".to_string()))?;
        self.state.file_label = info.file_name.clone();

        self.update_category_controls();
        self.update_image_navigation();
        self.update_annotation_count();
        self.refresh_visualization(viewer);

        // a failed refresh already put its message in the status line
        if !self.state.status.is_error() {
            self.state.status = Status::Success(format!(
                "Loaded: {} annotations, {} images",
                info.num_annotations, info.num_images
            ));
        }
        self.enable_controls();
        Ok(info)
    }

    fn reset_controllers(&mut self, viewer: &mut Viewer) {
        self.file_manager = CocoFileManager::new();
        self.category_controller = CategoryController::new();
        self.navigation_controller = NavigationController::new();
        self.visualization_manager.reset(viewer);
        self.image_cache.clear();

        let n_filter = self.display_controller.n_filter_value;
        let status = std::mem::take(&mut self.state.status);
        self.state = WidgetState::new(n_filter);
        self.state.status = status;
    }

    pub fn on_category_toggled(&mut self, viewer: &mut Viewer, category_id: u64, enabled: bool) {
        if !self.file_manager.is_loaded() {
            return;
        }
        if self.category_controller.toggle_category(category_id, enabled) {
            if let Some(toggle) = self
                .state
                .category_toggles
                .iter_mut()
                .find(|t| t.category_id == category_id)
            {
                toggle.checked = enabled;
            }
        }
        self.refresh_visualization(viewer);
        self.update_annotation_count();
    }

    pub fn on_image_changed(&mut self, viewer: &mut Viewer, index: usize) {
        if !self.file_manager.is_loaded() {
            return;
        }
        if self.navigation_controller.navigate_to_image(index) {
            self.after_navigation(viewer);
        }
    }

    pub fn on_prev_image(&mut self, viewer: &mut Viewer) {
        if self.navigation_controller.go_previous() {
            self.after_navigation(viewer);
        }
    }

    pub fn on_next_image(&mut self, viewer: &mut Viewer) {
        if self.navigation_controller.go_next() {
            self.after_navigation(viewer);
        }
    }

    fn after_navigation(&mut self, viewer: &mut Viewer) {
        self.state.current_image_index = self.navigation_controller.current_index();
        self.refresh_visualization(viewer);
        self.update_navigation_buttons();
    }

    pub fn select_all_categories(&mut self, viewer: &mut Viewer) {
        self.category_controller.select_all();
        self.state.category_toggles.iter_mut().for_each(|t| t.checked = true);
        self.refresh_visualization(viewer);
    }

    pub fn select_none_categories(&mut self, viewer: &mut Viewer) {
        self.category_controller.select_none();
        self.state.category_toggles.iter_mut().for_each(|t| t.checked = false);
        self.refresh_visualization(viewer);
    }

    pub fn on_n_filter_changed(&mut self, viewer: &mut Viewer, value: usize) {
        self.display_controller.set_n_filter(value);
        self.state.n_filter.value = self.display_controller.n_filter_value;
        self.refresh_visualization(viewer);
    }

    /// Use a fixed sampling seed instead of a random one.
    pub fn on_seed_changed(&mut self, viewer: &mut Viewer, seed: u64) {
        self.display_controller.random_seed = seed;
        self.visualization_manager.set_random_seed(seed);
        self.refresh_visualization(viewer);
    }

    pub fn on_resample_clicked(&mut self, viewer: &mut Viewer) {
        let seed = self.display_controller.resample();
        self.visualization_manager.set_random_seed(seed);
        self.refresh_visualization(viewer);
    }

    /// Handle a bbox or mask check box change.
    ///
    /// Unchecking the last enabled mode checks the other one.
    pub fn on_display_mode_changed(&mut self, viewer: &mut Viewer, toggle: DisplayToggle, checked: bool) {
        match toggle {
            DisplayToggle::BoundingBoxes => self.state.show_bbox = checked,
            DisplayToggle::Masks => self.state.show_mask = checked,
        }
        if !self.state.show_bbox && !self.state.show_mask {
            match toggle {
                DisplayToggle::BoundingBoxes => self.state.show_mask = true,
                DisplayToggle::Masks => self.state.show_bbox = true,
            }
        }

        log::debug!(
            "Display mode changed: bbox={}, mask={}",
            self.state.show_bbox,
            self.state.show_mask
        );
        self.display_controller
            .set_annotation_display_mode(self.state.show_bbox, self.state.show_mask);
        self.refresh_visualization(viewer);
    }

    pub fn on_visualization_mode_changed(&mut self, viewer: &mut Viewer, mode: VisualizationMode) {
        self.state.visualization_mode = mode;
        self.visualization_manager.set_mode(mode);
        self.refresh_visualization(viewer);
    }

    fn update_category_controls(&mut self) {
        let Some(visualizer) = self.visualization_manager.visualizer() else {
            return;
        };
        let show_colors = self.config.ui.show_category_colors;
        self.state.category_toggles = self
            .category_controller
            .categories()
            .iter()
            .map(|(&id, category)| CategoryToggle {
                category_id: id,
                label: format!("{} ({})", category.name, visualizer.category_count(id)),
                checked: self.category_controller.is_selected(id),
                color: show_colors.then(|| self.category_controller.category_color(id)),
            })
            .collect();
    }

    fn update_image_navigation(&mut self) {
        self.state.image_entries = self
            .navigation_controller
            .images()
            .iter()
            .enumerate()
            .map(|(i, img)| format!("{}: {}", i + 1, img.file_name))
            .collect();
        self.state.image_combo_enabled = self.navigation_controller.has_multiple_images();
        self.state.current_image_index = self.navigation_controller.current_index();
        self.update_navigation_buttons();
    }

    fn update_navigation_buttons(&mut self) {
        self.state.prev_enabled = self.navigation_controller.can_go_previous();
        self.state.next_enabled = self.navigation_controller.can_go_next();
    }

    fn update_annotation_count(&mut self) {
        let (Some(data), Some(image_id)) = (
            self.file_manager.data(),
            self.navigation_controller.current_image_id(),
        ) else {
            return;
        };
        let selected = self.category_controller.selected_categories();
        let info = DisplayController::annotation_count_info(data, image_id, &selected);

        if self.config.ui.show_annotation_count {
            self.state.annotation_count_label =
                format!("/ {} visible ({} total)", info.visible, info.total);
        }

        if info.visible > 0 {
            self.state.n_filter.max = info.visible.max(1);
            if self.display_controller.n_filter_value > info.visible {
                self.display_controller
                    .set_n_filter(N_FILTER_RESET_CAP.min(info.visible));
                self.state.n_filter.value = self.display_controller.n_filter_value;
            }
        }
    }

    fn enable_controls(&mut self) {
        self.state.select_buttons_enabled = true;
        self.state.n_filter.enabled = true;
        self.state.resample_enabled = true;
        self.state.display_toggles_enabled = true;
        if self.navigation_controller.has_multiple_images() {
            self.state.image_combo_enabled = true;
            self.update_navigation_buttons();
        }
    }

    /// Background pixels of the current image for masked mode.
    fn current_background(&mut self) -> Option<Arc<Array3<u8>>> {
        let image = self.navigation_controller.current_image()?;
        if !is_image_file(&image.file_name) {
            return None;
        }
        let path = self.file_manager.resolve_image_path(image)?;
        let background = self.image_cache.get_or_load(&path);

        if !self.config.performance.lazy_loading {
            let paths: Vec<_> = self
                .navigation_controller
                .images()
                .iter()
                .filter_map(|img| self.file_manager.resolve_image_path(img))
                .collect();
            self.image_cache
                .preload_adjacent(&paths, self.navigation_controller.current_index());
        }
        background
    }

    fn refresh_visualization(&mut self, viewer: &mut Viewer) {
        if !self.file_manager.is_loaded() {
            return;
        }
        let Some(image) = self.navigation_controller.current_image().cloned() else {
            return;
        };

        let background = match self.visualization_manager.mode() {
            VisualizationMode::Masked => self.current_background(),
            VisualizationMode::Overlay => None,
        };
        let selected = self.category_controller.selected_categories();
        self.visualization_manager
            .set_n_filter(self.display_controller.n_filter_value);

        let request = RefreshRequest {
            image_id: image.id,
            selected_categories: &selected,
            image_filename: &image.file_name,
            show_bbox: self.state.show_bbox,
            show_mask: self.state.show_mask,
            background: background.as_deref(),
        };
        if let Err(e) = self.visualization_manager.refresh_visualization(viewer, &request) {
            log::error!("Error refreshing visualization: {}", e);
            let message: String = e.to_string().chars().take(40).collect();
            self.state.status = Status::Error(format!("Visualization error: {}...", message));
        }

        self.update_annotation_count();
    }
}

impl Default for CocoWidget {
    fn default() -> Self {
        Self::new(PluginConfig::default())
    }
}
