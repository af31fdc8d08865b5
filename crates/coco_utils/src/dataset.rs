//! COCO dataset model.
//!
//! ```json
//! {
//!   "images": [{ "id": 1, "file_name": "a.png", "width": 640, "height": 480 }],
//!   "annotations": [{
//!     "id": 1, "image_id": 1, "category_id": 1,
//!     "bbox": [x, y, width, height],
//!     "segmentation": [[x1, y1, x2, y2, ...]],
//!     "area": 1234.5, "iscrowd": 0
//!   }],
//!   "categories": [{ "id": 1, "name": "cell", "supercategory": "object" }]
//! }
//! ```

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// A whole COCO annotation file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CocoDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<CocoInfo>,
    #[serde(default)]
    pub licenses: Vec<CocoLicense>,
    #[serde(default)]
    pub images: Vec<CocoImage>,
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

impl CocoDataset {
    /// Look up an image by its COCO id.
    pub fn image(&self, id: u64) -> Option<&CocoImage> {
        self.images.iter().find(|img| img.id == id)
    }

    /// Look up a category by its COCO id.
    pub fn category(&self, id: u64) -> Option<&CocoCategory> {
        self.categories.iter().find(|cat| cat.id == id)
    }

    /// All annotations attached to `image_id`, in file order.
    pub fn annotations_for_image(&self, image_id: u64) -> impl Iterator<Item = &CocoAnnotation> {
        self.annotations
            .iter()
            .filter(move |ann| ann.image_id == image_id)
    }

    /// Whether any annotation carries a non-empty segmentation.
    pub fn has_segmentation(&self) -> bool {
        self.annotations
            .iter()
            .any(|ann| ann.segmentation.as_ref().is_some_and(|s| !s.is_empty()))
    }

    /// Whether any annotation carries a bounding box.
    pub fn has_bbox(&self) -> bool {
        self.annotations.iter().any(|ann| ann.bbox.is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CocoInfo {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub contributor: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoLicense {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoImage {
    #[serde(deserialize_with = "deserialize_integral")]
    pub id: u64,
    pub file_name: String,
    #[serde(deserialize_with = "deserialize_integral")]
    pub width: u32,
    #[serde(deserialize_with = "deserialize_integral")]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<u64>,
}

impl CocoImage {
    pub fn new(id: u64, file_name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            width,
            height,
            license: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoCategory {
    #[serde(deserialize_with = "deserialize_integral")]
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

impl CocoCategory {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            supercategory: None,
        }
    }
}

/// A single object annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoAnnotation {
    #[serde(deserialize_with = "deserialize_integral")]
    pub id: u64,
    #[serde(deserialize_with = "deserialize_integral")]
    pub image_id: u64,
    #[serde(deserialize_with = "deserialize_integral")]
    pub category_id: u64,
    /// `[x, y, width, height]` in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Segmentation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_iscrowd")]
    pub iscrowd: bool,
}

impl CocoAnnotation {
    /// Create an annotation without geometry.
    pub fn new(id: u64, image_id: u64, category_id: u64) -> Self {
        Self {
            id,
            image_id,
            category_id,
            bbox: None,
            segmentation: None,
            area: None,
            iscrowd: false,
        }
    }

    pub fn with_bbox(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bbox = Some(vec![x, y, width, height]);
        self
    }

    pub fn with_polygons(mut self, polygons: Vec<Vec<f64>>) -> Self {
        self.segmentation = Some(Segmentation::Polygons(polygons));
        self
    }

    pub fn with_area(mut self, area: f64) -> Self {
        self.area = Some(area);
        self
    }

    /// Polygon rings of this annotation, empty for RLE or missing segmentation.
    pub fn polygons(&self) -> &[Vec<f64>] {
        match &self.segmentation {
            Some(Segmentation::Polygons(polys)) => polys,
            _ => &[],
        }
    }

    /// The bbox as a fixed array, when it has at least four values.
    pub fn bbox_array(&self) -> Option<[f64; 4]> {
        match self.bbox.as_deref() {
            Some([x, y, w, h, ..]) => Some([*x, *y, *w, *h]),
            _ => None,
        }
    }
}

fn deserialize_iscrowd<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IsCrowd {
        Bool(bool),
        Int(u8),
    }
    match IsCrowd::deserialize(deserializer)? {
        IsCrowd::Bool(b) => Ok(b),
        IsCrowd::Int(i) => Ok(i != 0),
    }
}

/// Ids and sizes written as whole floats (`640.0`) by some exporters.
fn deserialize_integral<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Integral {
        Int(u64),
        Float(f64),
    }
    let value = match Integral::deserialize(deserializer)? {
        Integral::Int(i) => i,
        Integral::Float(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => f as u64,
        Integral::Float(f) => {
            return Err(D::Error::custom(format!(
                "expected a non-negative integer, found {}",
                f
            )))
        }
    };
    T::try_from(value).map_err(|_| D::Error::custom(format!("integer {} out of range", value)))
}

/// Segmentation geometry of an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    /// One or more flat rings `[x1, y1, x2, y2, ...]`.
    Polygons(Vec<Vec<f64>>),
    /// Column-major run lengths, starting with background.
    Rle { size: [u32; 2], counts: Vec<u32> },
    /// Run lengths packed in the COCO string encoding.
    CompressedRle { size: [u32; 2], counts: String },
}

impl Segmentation {
    pub fn is_empty(&self) -> bool {
        match self {
            Segmentation::Polygons(polys) => polys.iter().all(|p| p.is_empty()),
            Segmentation::Rle { counts, .. } => counts.is_empty(),
            Segmentation::CompressedRle { counts, .. } => counts.is_empty(),
        }
    }
}
