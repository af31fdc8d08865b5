//! Layer types displayed by the viewer.
//!
//! Every layer carries its own display metadata. Coordinates are in data
//! space with rows first: a shape vertex is `[row, col]`, i.e. `[y, x]`.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array2, Array3};
use serde::Serialize;

use crate::error::LayerError;

/// RGBA color with channels in `0.0..=1.0`.
pub type Rgba = [f32; 4];

/// Per-shape key/value metadata.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Geometry kind of a single shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Polygon,
    Rectangle,
}

impl ShapeType {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeType::Polygon => "polygon",
            ShapeType::Rectangle => "rectangle",
        }
    }

    /// Minimum number of vertices for this shape.
    pub fn min_vertices(&self) -> usize {
        match self {
            ShapeType::Polygon => 3,
            ShapeType::Rectangle => 2,
        }
    }
}

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        PropertyValue::Int(v as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

/// A set of vector shapes with per-shape colors and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapesLayer {
    pub name: String,
    /// One `(N, 2)` array of `[row, col]` vertices per shape.
    pub data: Vec<Array2<f64>>,
    pub shape_type: Vec<ShapeType>,
    pub face_color: Vec<Rgba>,
    pub edge_color: Vec<Rgba>,
    pub properties: Vec<Properties>,
    pub edge_width: f32,
    pub opacity: f32,
    pub visible: bool,
}

impl ShapesLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Vec::new(),
            shape_type: Vec::new(),
            face_color: Vec::new(),
            edge_color: Vec::new(),
            properties: Vec::new(),
            edge_width: 1.0,
            opacity: 1.0,
            visible: true,
        }
    }

    /// Append one shape together with its per-shape attributes.
    pub fn push(
        &mut self,
        vertices: Array2<f64>,
        shape_type: ShapeType,
        face_color: Rgba,
        edge_color: Rgba,
        properties: Properties,
    ) {
        self.data.push(vertices);
        self.shape_type.push(shape_type);
        self.face_color.push(face_color);
        self.edge_color.push(edge_color);
        self.properties.push(properties);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check that all per-shape attributes line up with the shape data.
    pub fn validate(&self) -> Result<(), LayerError> {
        let expected = self.data.len();
        let lengths = [
            ("shape_type", self.shape_type.len()),
            ("face_color", self.face_color.len()),
            ("edge_color", self.edge_color.len()),
            ("properties", self.properties.len()),
        ];
        for (field, found) in lengths {
            if found != expected {
                return Err(LayerError::MismatchedLength {
                    field,
                    expected,
                    found,
                });
            }
        }

        for (index, (vertices, shape_type)) in self.data.iter().zip(&self.shape_type).enumerate() {
            if vertices.ncols() != 2 {
                return Err(LayerError::InvalidShape {
                    index,
                    reason: format!("expected 2 columns, found {}", vertices.ncols()),
                });
            }
            if vertices.nrows() < shape_type.min_vertices() {
                return Err(LayerError::InvalidShape {
                    index,
                    reason: format!(
                        "{} needs at least {} vertices, found {}",
                        shape_type.name(),
                        shape_type.min_vertices(),
                        vertices.nrows()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Count shapes whose `key` property equals `value`.
    pub fn count_property(&self, key: &str, value: &PropertyValue) -> usize {
        self.properties
            .iter()
            .filter(|props| props.get(key) == Some(value))
            .count()
    }
}

/// An integer label image; `0` is background.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelsLayer {
    pub name: String,
    /// `(H, W)` label ids.
    pub data: Array2<u32>,
    /// Color per label id; unlisted labels use the viewer's default cycle.
    pub color: BTreeMap<u32, Rgba>,
    pub opacity: f32,
    pub visible: bool,
}

impl LabelsLayer {
    pub fn new(name: impl Into<String>, data: Array2<u32>) -> Self {
        Self {
            name: name.into(),
            data,
            color: BTreeMap::new(),
            opacity: 0.7,
            visible: true,
        }
    }

    /// Distinct non-background labels present in the image.
    pub fn labels(&self) -> Vec<u32> {
        let mut labels: Vec<u32> = self.data.iter().copied().filter(|&l| l != 0).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

/// A raster image, `(H, W, C)` with 1, 3 or 4 channels.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayer {
    pub name: String,
    pub data: Array3<u8>,
    pub opacity: f32,
    pub visible: bool,
}

impl ImageLayer {
    pub fn new(name: impl Into<String>, data: Array3<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            opacity: 1.0,
            visible: true,
        }
    }

    pub fn height(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[2]
    }
}

/// Kind tag of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Image,
    Labels,
    Shapes,
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Image => "image",
            LayerKind::Labels => "labels",
            LayerKind::Shapes => "shapes",
        }
    }
}

/// A layer with its data and display metadata, as produced by reader hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerData {
    Image(ImageLayer),
    Labels(LabelsLayer),
    Shapes(ShapesLayer),
}

impl LayerData {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerData::Image(_) => LayerKind::Image,
            LayerData::Labels(_) => LayerKind::Labels,
            LayerData::Shapes(_) => LayerKind::Shapes,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LayerData::Image(l) => &l.name,
            LayerData::Labels(l) => &l.name,
            LayerData::Shapes(l) => &l.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            LayerData::Image(l) => l.name = name,
            LayerData::Labels(l) => l.name = name,
            LayerData::Shapes(l) => l.name = name,
        }
    }

    pub fn as_shapes(&self) -> Option<&ShapesLayer> {
        match self {
            LayerData::Shapes(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_shapes_mut(&mut self) -> Option<&mut ShapesLayer> {
        match self {
            LayerData::Shapes(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_labels(&self) -> Option<&LabelsLayer> {
        match self {
            LayerData::Labels(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageLayer> {
        match self {
            LayerData::Image(l) => Some(l),
            _ => None,
        }
    }

    /// Validate layer invariants before the viewer accepts the layer.
    pub fn validate(&self) -> Result<(), LayerError> {
        match self {
            LayerData::Shapes(l) => l.validate(),
            LayerData::Image(l) => match l.channels() {
                1 | 3 | 4 => Ok(()),
                n => Err(LayerError::InvalidImage(format!("unsupported channel count {}", n))),
            },
            LayerData::Labels(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn triangle() -> Array2<f64> {
        array![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]
    }

    #[test]
    fn test_shapes_push_and_validate() {
        let mut layer = ShapesLayer::new("shapes");
        let mut props = Properties::new();
        props.insert("category_id".to_string(), 1u64.into());
        layer.push(triangle(), ShapeType::Polygon, [1.0; 4], [1.0; 4], props);

        assert_eq!(layer.len(), 1);
        assert!(layer.validate().is_ok());
        assert_eq!(layer.count_property("category_id", &PropertyValue::Int(1)), 1);
    }

    #[test]
    fn test_shapes_mismatched_lengths() {
        let mut layer = ShapesLayer::new("shapes");
        layer.data.push(triangle());
        let err = layer.validate().unwrap_err();
        assert!(matches!(err, LayerError::MismatchedLength { field: "shape_type", .. }));
    }

    #[test]
    fn test_polygon_needs_three_vertices() {
        let mut layer = ShapesLayer::new("shapes");
        layer.push(
            array![[0.0, 0.0], [1.0, 1.0]],
            ShapeType::Polygon,
            [1.0; 4],
            [1.0; 4],
            Properties::new(),
        );
        assert!(matches!(layer.validate(), Err(LayerError::InvalidShape { index: 0, .. })));
    }

    #[test]
    fn test_labels_distinct_values() {
        let layer = LabelsLayer::new("labels", array![[0, 2, 2], [1, 0, 2]]);
        assert_eq!(layer.labels(), vec![1, 2]);
    }

    #[test]
    fn test_layer_data_kind_and_name() {
        let mut layer = LayerData::Image(ImageLayer::new("img", Array3::zeros((2, 2, 3))));
        assert_eq!(layer.kind(), LayerKind::Image);
        layer.set_name("renamed");
        assert_eq!(layer.name(), "renamed");
        assert!(layer.validate().is_ok());

        let bad = LayerData::Image(ImageLayer::new("bad", Array3::zeros((2, 2, 2))));
        assert!(bad.validate().is_err());
    }
}
