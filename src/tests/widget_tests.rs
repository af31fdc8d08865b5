//! Tests for widget workflows against a headless viewer.

use coco_viewer::{LayerData, LayerKind, ShapeType, Viewer};

use super::{multi_image_coco, TempFile};
use crate::controllers::VisualizationMode;
use crate::widget::{CocoWidget, DisplayToggle};

fn loaded(name: &str) -> (TempFile, Viewer, CocoWidget) {
    let file = TempFile::json(name, &multi_image_coco());
    let mut viewer = Viewer::default();
    let mut widget = CocoWidget::default();
    widget.on_file_selected(&mut viewer, &file.path).unwrap();
    (file, viewer, widget)
}

fn shapes_layer(viewer: &Viewer) -> Option<&coco_viewer::ShapesLayer> {
    viewer.layers.iter().find_map(|(_, layer)| layer.as_shapes())
}

#[test]
fn test_load_populates_controls() {
    let (_file, viewer, widget) = loaded("widget_load.json");
    let state = widget.state();

    assert_eq!(state.file_label, "widget_load.json");
    assert_eq!(state.status.text(), "✓ Loaded: 4 annotations, 3 images");
    let labels: Vec<&str> = state.category_toggles.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, vec!["cell (2)", "nucleus (2)"]);
    assert!(state.category_toggles.iter().all(|t| t.checked && t.color.is_some()));

    assert_eq!(state.image_entries, vec!["1: first.png", "2: second.png", "3: third.png"]);
    assert!(state.image_combo_enabled);
    assert!(!state.prev_enabled);
    assert!(state.next_enabled);

    assert_eq!(state.annotation_count_label, "/ 3 visible (4 total)");
    assert_eq!(state.n_filter.max, 3);
    assert_eq!(state.n_filter.value, 3);
    assert!(state.n_filter.enabled && state.resample_enabled);
    assert!(state.show_bbox && state.show_mask);

    // one polygon and one box per annotation
    assert_eq!(shapes_layer(&viewer).unwrap().len(), 6);
}

#[test]
fn test_category_toggle_filters_layer() {
    let (_file, mut viewer, mut widget) = loaded("widget_toggle.json");

    widget.on_category_toggled(&mut viewer, 2, false);
    assert_eq!(shapes_layer(&viewer).unwrap().len(), 4);
    assert_eq!(widget.state().annotation_count_label, "/ 2 visible (4 total)");
    assert!(!widget.state().category_toggles[1].checked);
    assert_eq!(widget.state().n_filter.value, 2);

    // unknown ids change nothing
    widget.on_category_toggled(&mut viewer, 99, true);
    assert_eq!(widget.category_controller().selected_categories(), vec![1]);

    widget.select_none_categories(&mut viewer);
    assert!(viewer.layers.is_empty());
    assert_eq!(widget.state().annotation_count_label, "/ 0 visible (4 total)");

    // the N-filter was lowered to 2 while only two annotations were visible
    widget.select_all_categories(&mut viewer);
    assert_eq!(shapes_layer(&viewer).unwrap().len(), 4);
    assert!(widget.state().category_toggles.iter().all(|t| t.checked));
}

#[test]
fn test_n_filter_limits_annotations() {
    let (_file, mut viewer, mut widget) = loaded("widget_nfilter.json");

    widget.on_n_filter_changed(&mut viewer, 1);
    let layer = shapes_layer(&viewer).unwrap();
    assert_eq!(layer.len(), 2);
    // mask and box of the same annotation stay together
    assert_eq!(layer.properties[0]["annotation_id"], layer.properties[1]["annotation_id"]);

    widget.on_n_filter_changed(&mut viewer, 0);
    assert_eq!(widget.state().n_filter.value, 1);
}

#[test]
fn test_resample_updates_seed() {
    let (_file, mut viewer, mut widget) = loaded("widget_resample.json");
    widget.on_n_filter_changed(&mut viewer, 1);

    widget.on_resample_clicked(&mut viewer);
    let seed = widget.display_controller().random_seed;
    assert!((1..=10_000).contains(&seed));
    assert_eq!(widget.visualization_manager().random_seed(), seed);
    assert_eq!(shapes_layer(&viewer).unwrap().len(), 2);

    widget.on_seed_changed(&mut viewer, 7);
    assert_eq!(widget.visualization_manager().random_seed(), 7);
}

#[test]
fn test_display_modes() {
    let (_file, mut viewer, mut widget) = loaded("widget_display.json");

    widget.on_display_mode_changed(&mut viewer, DisplayToggle::Masks, false);
    let layer = shapes_layer(&viewer).unwrap();
    assert_eq!(layer.len(), 3);
    assert!(layer.shape_type.iter().all(|t| *t == ShapeType::Rectangle));

    widget.on_display_mode_changed(&mut viewer, DisplayToggle::BoundingBoxes, false);
    assert!(widget.state().show_mask);
    let layer = shapes_layer(&viewer).unwrap();
    assert_eq!(layer.len(), 3);
    assert!(layer.shape_type.iter().all(|t| *t == ShapeType::Polygon));
}

#[test]
fn test_navigation() {
    let (_file, mut viewer, mut widget) = loaded("widget_nav.json");

    widget.on_next_image(&mut viewer);
    assert_eq!(widget.state().current_image_index, 1);
    assert!(widget.state().prev_enabled);
    let layer = shapes_layer(&viewer).unwrap();
    assert_eq!(layer.name, "COCO Annotations - second.png");
    assert_eq!(layer.len(), 1);

    widget.on_image_changed(&mut viewer, 10);
    assert_eq!(widget.state().current_image_index, 1);

    // the third image has no annotations
    widget.on_image_changed(&mut viewer, 2);
    assert!(viewer.layers.is_empty());
    assert!(!widget.state().next_enabled);

    widget.on_prev_image(&mut viewer);
    assert_eq!(widget.navigation_controller().current_image_id(), Some(2));
    assert_eq!(viewer.layers.len(), 1);
}

#[test]
fn test_failed_load_resets_widget() {
    let (_file, mut viewer, mut widget) = loaded("widget_reset.json");
    assert_eq!(viewer.layers.len(), 1);

    let bad = TempFile::with_contents("widget_bad.json", "[1, 2");
    assert!(widget.on_file_selected(&mut viewer, &bad.path).is_err());

    let state = widget.state();
    assert_eq!(
        state.status.text(),
        "✗ File is not valid JSON format. Please select a valid COCO file."
    );
    assert_eq!(state.file_label, "No file selected");
    assert!(state.category_toggles.is_empty());
    assert!(state.image_entries.is_empty());
    assert!(!state.n_filter.enabled);
    assert!(!widget.file_manager().is_loaded());
    assert!(viewer.layers.is_empty());

    // handlers are inert after the reset
    widget.on_next_image(&mut viewer);
    assert!(viewer.layers.is_empty());
}

#[test]
fn test_masked_mode_with_background() {
    let (file, mut viewer, mut widget) = loaded("widget_masked.json");
    let background = file.path.with_file_name("first.png");
    image::RgbImage::from_pixel(32, 32, image::Rgb([200, 100, 50]))
        .save(&background)
        .unwrap();

    widget.on_visualization_mode_changed(&mut viewer, VisualizationMode::Masked);
    let kinds: Vec<LayerKind> = viewer.layers.iter().map(|(_, l)| l.kind()).collect();
    assert_eq!(kinds, vec![LayerKind::Image, LayerKind::Labels]);

    let image = viewer.layers.iter().find_map(|(_, l)| l.as_image()).unwrap();
    assert_eq!(image.name, "COCO Masked Image - first.png");
    assert_eq!(image.data[[5, 5, 0]], 200);
    assert_eq!(image.data[[0, 0, 0]], 0);

    let labels = viewer.layers.iter().find_map(|(_, l)| l.as_labels()).unwrap();
    assert_eq!(labels.data[[5, 5]], 1);
    assert_eq!(labels.data[[22, 22]], 2);
    assert_eq!(labels.labels(), vec![1, 2]);

    widget.on_visualization_mode_changed(&mut viewer, VisualizationMode::Overlay);
    assert!(matches!(viewer.layers.iter().next(), Some((_, LayerData::Shapes(_)))));
    assert_eq!(viewer.layers.len(), 1);

    std::fs::remove_file(background).ok();
}
