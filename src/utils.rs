//! Conversions between COCO data and viewer layer data.
//!
//! COCO stores polygons flat as `[x1, y1, x2, y2, ...]` and boxes as
//! `[x, y, width, height]`. The viewer wants `(N, 2)` arrays of `[row, col]`,
//! so every conversion swaps the axes.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use serde_json::Value;

use coco_utils::palette::{category_colors, Rgba};
use coco_utils::{CocoAnnotation, CocoCategory, CocoDataset};

use crate::error::CocoError;

const IMAGE_KEYS: [&str; 4] = ["id", "file_name", "width", "height"];
const ANNOTATION_KEYS: [&str; 3] = ["id", "image_id", "category_id"];
const CATEGORY_KEYS: [&str; 2] = ["id", "name"];

/// Check that a JSON document has the shape of a COCO dataset.
///
/// `images`, `annotations` and `categories` must all be arrays of objects
/// carrying their required keys.
pub fn validate_coco_structure(data: &Value) -> bool {
    let Some(root) = data.as_object() else {
        return false;
    };

    let sections = [
        ("images", &IMAGE_KEYS[..]),
        ("annotations", &ANNOTATION_KEYS[..]),
        ("categories", &CATEGORY_KEYS[..]),
    ];

    sections.iter().all(|(section, keys)| {
        root.get(*section)
            .and_then(Value::as_array)
            .is_some_and(|entries| {
                entries.iter().all(|entry| {
                    entry
                        .as_object()
                        .is_some_and(|obj| keys.iter().all(|key| obj.contains_key(*key)))
                })
            })
    })
}

/// Convert a flat COCO polygon to `(N, 2)` viewer points.
///
/// Returns `None` when the coordinate count is odd.
pub fn coco_to_viewer_coordinates(polygon: &[f64]) -> Option<Array2<f64>> {
    if polygon.len() % 2 != 0 {
        return None;
    }
    let n = polygon.len() / 2;
    Some(Array2::from_shape_fn((n, 2), |(i, axis)| {
        // axis 0 is row (COCO y), axis 1 is col (COCO x)
        polygon[2 * i + 1 - axis]
    }))
}

/// Convert `(N, 2)` viewer points back to a flat COCO polygon.
pub fn viewer_to_coco_coordinates(points: ArrayView2<'_, f64>) -> Vec<f64> {
    points
        .rows()
        .into_iter()
        .flat_map(|row| [row[1], row[0]])
        .collect()
}

/// Corners of a COCO bbox as viewer points, clockwise from the top-left.
pub fn bbox_to_viewer_rectangle(bbox: &[f64]) -> Option<Array2<f64>> {
    let [x, y, w, h] = match bbox {
        [x, y, w, h, ..] => [*x, *y, *w, *h],
        _ => return None,
    };
    Some(ndarray::array![
        [y, x],
        [y, x + w],
        [y + h, x + w],
        [y + h, x],
    ])
}

/// `n` distinct colors, one per category.
pub fn generate_category_colors(n: usize) -> Vec<Rgba> {
    category_colors(n)
}

/// Category id to color, assigned in ascending id order.
pub fn category_color_map(dataset: &CocoDataset) -> BTreeMap<u64, Rgba> {
    let info = get_category_info(dataset);
    info.keys()
        .copied()
        .zip(generate_category_colors(info.len()))
        .collect()
}

/// Category id to category.
pub fn get_category_info(dataset: &CocoDataset) -> BTreeMap<u64, &CocoCategory> {
    dataset.categories.iter().map(|cat| (cat.id, cat)).collect()
}

/// Annotations of one image, sorted by annotation id.
pub fn get_image_annotations(dataset: &CocoDataset, image_id: u64) -> Vec<&CocoAnnotation> {
    let mut annotations: Vec<&CocoAnnotation> = dataset.annotations_for_image(image_id).collect();
    annotations.sort_by_key(|ann| ann.id);
    annotations
}

/// Keep annotations whose category is in `category_ids`.
///
/// An empty id list selects nothing.
pub fn filter_annotations_by_category<'a>(
    annotations: &[&'a CocoAnnotation],
    category_ids: &[u64],
) -> Vec<&'a CocoAnnotation> {
    annotations
        .iter()
        .copied()
        .filter(|ann| category_ids.contains(&ann.category_id))
        .collect()
}

/// Load and validate a COCO file.
pub fn load_coco_file(path: impl AsRef<Path>) -> Result<CocoDataset, CocoError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CocoError::NotFound {
            path: path.to_path_buf(),
        },
        _ => CocoError::Io(e),
    })?;

    let value: Value = serde_json::from_str(&json).map_err(|e| {
        log::error!("JSON decode error in {:?}: {}", path, e);
        CocoError::InvalidJson(e)
    })?;

    if !validate_coco_structure(&value) {
        return Err(CocoError::invalid_structure(format!(
            "{:?} is missing images, annotations or categories",
            path
        )));
    }

    let dataset = coco_utils::io::from_json_value(value)?;
    log::info!(
        "Loaded COCO file {:?}: {} images, {} annotations, {} categories",
        path,
        dataset.images.len(),
        dataset.annotations.len(),
        dataset.categories.len()
    );
    Ok(dataset)
}

/// Human-readable report of what is wrong (or right) with a COCO file.
pub fn diagnose_coco_file(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    if !path.exists() {
        return format!("File does not exist: {}", path.display());
    }
    if !path.is_file() {
        return format!("Path is not a file: {}", path.display());
    }

    let mut lines = Vec::new();
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        lines.push("Warning: File does not have .json extension".to_string());
    }

    match std::fs::metadata(path) {
        Ok(meta) => lines.push(format!("File size: {} bytes", meta.len())),
        Err(e) => lines.push(format!("✗ Cannot read metadata: {}", e)),
    }

    let value: Value = match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()))
    {
        Ok(value) => {
            lines.push("✓ Valid JSON format".to_string());
            value
        }
        Err(e) => {
            lines.push(format!("✗ Error during diagnosis: {}", e));
            return lines.join("\n");
        }
    };

    if validate_coco_structure(&value) {
        lines.push("✓ Valid COCO structure".to_string());
    } else {
        lines.push("✗ Invalid COCO structure".to_string());
    }

    for (label, key) in [
        ("Images", "images"),
        ("Categories", "categories"),
        ("Annotations", "annotations"),
    ] {
        let count = value.get(key).and_then(Value::as_array).map_or(0, Vec::len);
        lines.push(format!("{}: {}", label, count));
    }

    match coco_utils::io::from_json_value(value) {
        Ok(_) => lines.push("✓ Annotation library can load file".to_string()),
        Err(e) => lines.push(format!("✗ Annotation library error: {}", e)),
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use coco_utils::CocoImage;
    use ndarray::array;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "images": [{ "id": 1, "file_name": "a.png", "width": 10, "height": 10 }],
            "categories": [{ "id": 1, "name": "cell" }],
            "annotations": [{ "id": 1, "image_id": 1, "category_id": 1, "bbox": [0, 0, 2, 2] }]
        })
    }

    #[test]
    fn test_validate_accepts_minimal_example() {
        assert!(validate_coco_structure(&minimal()));
    }

    #[test]
    fn test_validate_rejects_missing_sections() {
        for key in ["images", "annotations", "categories"] {
            let mut data = minimal();
            data.as_object_mut().unwrap().remove(key);
            assert!(!validate_coco_structure(&data), "accepted without {}", key);
        }
        assert!(!validate_coco_structure(&json!([])));
        assert!(!validate_coco_structure(&Value::Null));
    }

    #[test]
    fn test_validate_rejects_incomplete_entries() {
        let mut data = minimal();
        data["images"] = json!({ "id": 1 });
        assert!(!validate_coco_structure(&data));

        let mut data = minimal();
        data["categories"] = json!([{ "id": 1 }]);
        assert!(!validate_coco_structure(&data));

        let mut data = minimal();
        data["annotations"] = json!([{ "id": 1, "image_id": 1 }]);
        assert!(!validate_coco_structure(&data));
    }

    #[test]
    fn test_coordinate_round_trip() {
        let polygon = vec![1.0, 2.0, 3.5, 4.0, 5.0, 6.25];
        let points = coco_to_viewer_coordinates(&polygon).unwrap();
        assert_eq!(points, array![[2.0, 1.0], [4.0, 3.5], [6.25, 5.0]]);
        assert_eq!(viewer_to_coco_coordinates(points.view()), polygon);

        for len in [0usize, 2, 6, 100] {
            let flat: Vec<f64> = (0..len).map(|i| (i as f64 - 50.0) * 0.37).collect();
            let points = coco_to_viewer_coordinates(&flat).unwrap();
            assert_eq!(points.dim(), (len / 2, 2));
            for (row, pair) in points.rows().into_iter().zip(flat.chunks(2)) {
                assert_eq!(row[0], pair[1]);
                assert_eq!(row[1], pair[0]);
            }
            assert_eq!(viewer_to_coco_coordinates(points.view()), flat);
        }
    }

    #[test]
    fn test_odd_polygon_is_rejected() {
        assert!(coco_to_viewer_coordinates(&[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn test_bbox_corners() {
        let rect = bbox_to_viewer_rectangle(&[10.0, 20.0, 5.0, 3.0]).unwrap();
        assert_eq!(
            rect,
            array![[20.0, 10.0], [20.0, 15.0], [23.0, 15.0], [23.0, 10.0]]
        );
        assert!(bbox_to_viewer_rectangle(&[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn test_image_annotations_sorted_and_filtered() {
        let dataset = CocoDataset {
            images: vec![CocoImage::new(1, "a.png", 4, 4)],
            annotations: vec![
                CocoAnnotation::new(9, 1, 2),
                CocoAnnotation::new(3, 1, 1),
                CocoAnnotation::new(5, 2, 1),
            ],
            ..Default::default()
        };

        let anns = get_image_annotations(&dataset, 1);
        assert_eq!(anns.iter().map(|a| a.id).collect::<Vec<_>>(), vec![3, 9]);

        let filtered = filter_annotations_by_category(&anns, &[2]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 9);
        assert!(filter_annotations_by_category(&anns, &[]).is_empty());
    }

    #[test]
    fn test_color_map_uses_sorted_ids() {
        let dataset = CocoDataset {
            categories: vec![CocoCategory::new(7, "b"), CocoCategory::new(2, "a")],
            ..Default::default()
        };
        let colors = category_color_map(&dataset);
        let palette = generate_category_colors(2);
        assert_eq!(colors[&2], palette[0]);
        assert_eq!(colors[&7], palette[1]);
    }
}
