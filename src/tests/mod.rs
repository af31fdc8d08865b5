//! Cross-module tests: reader hook, widget workflows and end-to-end loading.

mod widget_tests;

use std::path::PathBuf;

use serde_json::{json, Value};

/// The smallest valid COCO document: one image, one category, one box.
pub(crate) fn minimal_coco() -> Value {
    json!({
        "images": [{ "id": 1, "file_name": "a.png", "width": 10, "height": 10 }],
        "categories": [{ "id": 1, "name": "cell" }],
        "annotations": [{ "id": 1, "image_id": 1, "category_id": 1, "bbox": [0, 0, 2, 2] }]
    })
}

/// Three images, two categories, polygons and boxes.
pub(crate) fn multi_image_coco() -> Value {
    json!({
        "images": [
            { "id": 1, "file_name": "first.png", "width": 32, "height": 32 },
            { "id": 2, "file_name": "second.png", "width": 32, "height": 32 },
            { "id": 3, "file_name": "third.png", "width": 32, "height": 32 }
        ],
        "categories": [
            { "id": 1, "name": "cell" },
            { "id": 2, "name": "nucleus" }
        ],
        "annotations": [
            {
                "id": 1, "image_id": 1, "category_id": 1,
                "bbox": [2, 2, 8, 8], "area": 64,
                "segmentation": [[2, 2, 10, 2, 10, 10, 2, 10]]
            },
            {
                "id": 2, "image_id": 1, "category_id": 1,
                "bbox": [12, 12, 6, 6], "area": 36,
                "segmentation": [[12, 12, 18, 12, 18, 18, 12, 18]]
            },
            {
                "id": 3, "image_id": 1, "category_id": 2,
                "bbox": [20, 20, 4, 4], "area": 16,
                "segmentation": [[20, 20, 24, 20, 24, 24, 20, 24]]
            },
            { "id": 4, "image_id": 2, "category_id": 2, "bbox": [1, 1, 3, 3] }
        ]
    })
}

/// Fixture file under a per-process temp directory, removed on drop.
pub(crate) struct TempFile {
    pub path: PathBuf,
}

impl TempFile {
    pub fn with_contents(name: &str, contents: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("coco_overlay_tests_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        Self { path }
    }

    pub fn json(name: &str, value: &Value) -> Self {
        Self::with_contents(name, &value.to_string())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        std::fs::remove_file(&self.path).ok();
    }
}
