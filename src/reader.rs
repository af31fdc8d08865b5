//! Reader hook: opens a COCO JSON file as a viewer shapes layer.

use std::path::{Path, PathBuf};

use coco_utils::palette::WHITE;
use coco_utils::{CategoryManager, CocoDataset};
use coco_viewer::{LayerData, Properties, PropertyValue, ShapeType, ShapesLayer};

use crate::error::CocoError;
use crate::progress::{with_progress, ProgressReporter, ReporterKind};
use crate::utils::{bbox_to_viewer_rectangle, coco_to_viewer_coordinates, load_coco_file};
use crate::visualization::SHAPES_LAYER_NAME;

/// Minimum flat coordinate count of a drawable polygon ring.
const MIN_POLYGON_COORDS: usize = 6;
const PROGRESS_EVERY: usize = 100;

/// Reader entry point registered with the host.
///
/// Returns `None` for anything that is not a single COCO JSON file, so the
/// host can try other readers. Unexpected failures are logged.
pub fn coco_reader(paths: &[PathBuf]) -> Option<Vec<LayerData>> {
    let [path] = paths else {
        log::debug!("COCO reader takes a single file, got {}", paths.len());
        return None;
    };
    if !has_json_extension(path) {
        return None;
    }

    match read_coco(path) {
        Ok(layers) => Some(layers),
        Err(e) if e.is_format_error() => {
            log::debug!("{:?} is not a COCO file: {}", path, e);
            None
        }
        Err(e) => {
            log::error!("Error loading COCO file {:?}: {}", path, e);
            None
        }
    }
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load `path` and convert it, reporting progress on the console or log.
pub fn read_coco(path: impl AsRef<Path>) -> Result<Vec<LayerData>, CocoError> {
    let path = path.as_ref();
    with_progress("Loading COCO file...", ReporterKind::Auto, |reporter| {
        read_coco_with(path, reporter)
    })
}

/// Load `path` and convert it, reporting to `reporter`.
pub fn read_coco_with(
    path: &Path,
    reporter: &mut dyn ProgressReporter,
) -> Result<Vec<LayerData>, CocoError> {
    reporter.update(0, 2, "Loading COCO data");
    let dataset = load_coco_file(path)?;

    reporter.update(1, 2, "Converting to viewer layers");
    let layers = dataset_to_layers(&dataset, reporter);

    reporter.update(2, 2, "Completed");
    Ok(layers)
}

/// One shapes layer with every annotation of `dataset`, empty when nothing is drawable.
///
/// Polygon segmentations give one shape per ring; annotations without one
/// fall back to their bbox.
pub fn dataset_to_layers(
    dataset: &CocoDataset,
    reporter: &mut dyn ProgressReporter,
) -> Vec<LayerData> {
    let categories = CategoryManager::new(dataset);
    let mut layer = ShapesLayer::new(SHAPES_LAYER_NAME);
    let total = dataset.annotations.len();

    for (i, ann) in dataset.annotations.iter().enumerate() {
        if i % PROGRESS_EVERY == 0 {
            reporter.update(i, total, &format!("Processing annotation {}/{}", i + 1, total));
        }

        let color = categories.colors().get(&ann.category_id).copied().unwrap_or(WHITE);
        let properties = |area: f64| {
            let mut props = Properties::new();
            props.insert("category_id".to_string(), ann.category_id.into());
            props.insert("category_name".to_string(), categories.name(ann.category_id).into());
            props.insert("annotation_id".to_string(), ann.id.into());
            props.insert("area".to_string(), PropertyValue::Float(area));
            props
        };

        let polygons = ann.polygons();
        if polygons.iter().any(|ring| !ring.is_empty()) {
            for ring in polygons.iter().filter(|ring| ring.len() >= MIN_POLYGON_COORDS) {
                match coco_to_viewer_coordinates(ring) {
                    Some(points) => layer.push(
                        points,
                        ShapeType::Polygon,
                        color,
                        color,
                        properties(ann.area.unwrap_or(0.0)),
                    ),
                    None => log::warn!("Annotation {} has an odd-length polygon", ann.id),
                }
            }
        } else if let Some(bbox) = ann.bbox.as_deref() {
            match bbox_to_viewer_rectangle(bbox) {
                Some(corners) => {
                    let area = ann.area.unwrap_or(bbox[2] * bbox[3]);
                    layer.push(corners, ShapeType::Polygon, color, color, properties(area));
                }
                None => log::warn!("Annotation {} has a malformed bbox", ann.id),
            }
        }
    }

    if layer.is_empty() {
        Vec::new()
    } else {
        vec![LayerData::Shapes(layer)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use coco_utils::{CocoAnnotation, CocoCategory, CocoImage};

    fn dataset(annotations: Vec<CocoAnnotation>) -> CocoDataset {
        CocoDataset {
            images: vec![CocoImage::new(1, "a.png", 100, 100)],
            categories: vec![CocoCategory::new(1, "cell")],
            annotations,
            ..Default::default()
        }
    }

    fn shapes(layers: &[LayerData]) -> &ShapesLayer {
        layers[0].as_shapes().unwrap()
    }

    #[test]
    fn test_rejects_multiple_and_non_json_paths() {
        assert!(coco_reader(&[]).is_none());
        assert!(coco_reader(&[PathBuf::from("a.json"), PathBuf::from("b.json")]).is_none());
        assert!(coco_reader(&[PathBuf::from("image.png")]).is_none());
        assert!(coco_reader(&[PathBuf::from("/no/such/file.json")]).is_none());
    }

    #[test]
    fn test_polygon_rings() {
        let ds = dataset(vec![CocoAnnotation::new(5, 1, 1)
            .with_polygons(vec![
                vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0],
                vec![1.0, 1.0, 2.0, 2.0],
                vec![20.0, 20.0, 30.0, 20.0, 30.0, 30.0, 20.0, 30.0],
            ])
            .with_bbox(0.0, 0.0, 30.0, 30.0)
            .with_area(42.0)]);

        let layers = dataset_to_layers(&ds, &mut SilentReporter::new());
        let layer = shapes(&layers);
        assert_eq!(layer.name, "COCO Annotations");
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.data[1].nrows(), 4);
        assert_eq!(layer.properties[0]["annotation_id"], PropertyValue::Int(5));
        assert_eq!(layer.properties[0]["area"], PropertyValue::Float(42.0));
        assert_eq!(layer.properties[0]["category_name"], PropertyValue::from("cell"));
    }

    #[test]
    fn test_bbox_fallback_area() {
        let ds = dataset(vec![
            CocoAnnotation::new(1, 1, 1).with_bbox(10.0, 20.0, 4.0, 5.0),
            CocoAnnotation::new(2, 1, 9).with_bbox(0.0, 0.0, 1.0, 1.0).with_area(0.5),
        ]);
        let layers = dataset_to_layers(&ds, &mut SilentReporter::new());
        let layer = shapes(&layers);
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.data[0][[0, 0]], 20.0);
        assert_eq!(layer.data[0][[0, 1]], 10.0);
        assert_eq!(layer.properties[0]["area"], PropertyValue::Float(20.0));
        assert_eq!(layer.properties[1]["area"], PropertyValue::Float(0.5));

        // unknown category: white and a generated name
        assert_eq!(layer.face_color[1], WHITE);
        assert_eq!(layer.properties[1]["category_name"], PropertyValue::from("category_9"));
    }

    #[test]
    fn test_no_geometry_gives_no_layers() {
        let ds = dataset(vec![CocoAnnotation::new(1, 1, 1)]);
        assert!(dataset_to_layers(&ds, &mut SilentReporter::new()).is_empty());
        assert!(dataset_to_layers(&dataset(Vec::new()), &mut SilentReporter::new()).is_empty());
    }
}
