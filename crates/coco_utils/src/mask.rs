//! Segmentation mask rasterization.
//!
//! Masks are stored row-major (`data[y * width + x]`). COCO run-length
//! encodings are column-major and are transposed while decoding.
//!
//! Polygon rings are filled with the even-odd rule across *all* rings of an
//! annotation: a ring lying inside another ring cuts a hole, overlapping
//! rings cancel where they overlap. A pixel is inside when its center is.

use crate::dataset::{CocoAnnotation, Segmentation};

/// Binary mask of an image region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    height: usize,
    width: usize,
    data: Vec<u8>,
}

impl Mask {
    /// An empty (all background) mask.
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            data: vec![0; height * width],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Row-major pixel values, `1` for foreground.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, y: usize, x: usize) -> bool {
        y < self.height && x < self.width && self.data[y * self.width + x] != 0
    }

    pub fn set(&mut self, y: usize, x: usize, value: bool) {
        if y < self.height && x < self.width {
            self.data[y * self.width + x] = value as u8;
        }
    }

    /// Number of foreground pixels.
    pub fn area(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Merge `other` into this mask. Pixels outside this mask's extent are ignored.
    pub fn union_with(&mut self, other: &Mask) {
        let rows = self.height.min(other.height);
        let cols = self.width.min(other.width);
        for y in 0..rows {
            for x in 0..cols {
                if other.data[y * other.width + x] != 0 {
                    self.data[y * self.width + x] = 1;
                }
            }
        }
    }

    /// Tight `[x, y, width, height]` box around the foreground.
    pub fn bounding_box(&self) -> Option<[f64; 4]> {
        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        let mut any = false;

        for y in 0..self.height {
            for x in 0..self.width {
                if self.data[y * self.width + x] != 0 {
                    any = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        any.then(|| {
            [
                min_x as f64,
                min_y as f64,
                (max_x - min_x + 1) as f64,
                (max_y - min_y + 1) as f64,
            ]
        })
    }

    /// Copy into a mask of another size, cropping or padding with background.
    pub fn resized_to(&self, height: usize, width: usize) -> Mask {
        if height == self.height && width == self.width {
            return self.clone();
        }
        let mut out = Mask::new(height, width);
        out.union_with(self);
        out
    }
}

/// Fill a single flat `[x1, y1, x2, y2, ...]` ring.
pub fn rasterize_polygon(ring: &[f64], height: usize, width: usize) -> Mask {
    rasterize_polygons(&[ring.to_vec()], height, width)
}

/// Fill several rings with the even-odd rule.
///
/// Rings with fewer than three points are skipped, as is a dangling odd
/// coordinate at the end of a ring.
pub fn rasterize_polygons(rings: &[Vec<f64>], height: usize, width: usize) -> Mask {
    let mut mask = Mask::new(height, width);

    let edges: Vec<((f64, f64), (f64, f64))> = rings
        .iter()
        .filter(|ring| ring.len() >= 6)
        .flat_map(|ring| {
            let points: Vec<(f64, f64)> = ring.chunks_exact(2).map(|c| (c[0], c[1])).collect();
            let n = points.len();
            (0..n).map(move |i| (points[i], points[(i + 1) % n]))
        })
        .collect();

    if edges.is_empty() {
        return mask;
    }

    let mut crossings: Vec<f64> = Vec::new();
    for y in 0..height {
        let yc = y as f64 + 0.5;
        crossings.clear();

        for &((x0, y0), (x1, y1)) in &edges {
            if (y0 <= yc) != (y1 <= yc) {
                crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        for pair in crossings.chunks_exact(2) {
            let start = (pair[0] - 0.5).ceil().max(0.0) as usize;
            let end = ((pair[1] - 0.5).ceil().max(0.0) as usize).min(width);
            for x in start..end {
                mask.data[y * width + x] = 1;
            }
        }
    }

    mask
}

/// Fill an `[x, y, width, height]` box.
pub fn rasterize_bbox(bbox: [f64; 4], height: usize, width: usize) -> Mask {
    let [x, y, w, h] = bbox;
    let ring = vec![x, y, x + w, y, x + w, y + h, x, y + h];
    rasterize_polygons(&[ring], height, width)
}

/// Decode column-major COCO run lengths of a `height x width` mask.
///
/// Runs alternate background/foreground, starting with background. Runs past
/// the end of the mask are ignored; missing runs leave background.
pub fn decode_rle(counts: &[u32], height: usize, width: usize) -> Mask {
    let mut mask = Mask::new(height, width);
    let total = height * width;
    let mut idx = 0usize;
    let mut value = 0u8;

    for &count in counts {
        let end = (idx + count as usize).min(total);
        if value == 1 {
            for i in idx..end {
                // column-major index i -> (row, col)
                let (row, col) = (i % height, i / height);
                mask.data[row * width + col] = 1;
            }
        }
        idx = end;
        if idx >= total {
            break;
        }
        value ^= 1;
    }

    mask
}

/// Unpack the COCO compressed-counts string into run lengths.
///
/// Each count is a little-endian sequence of 5-bit groups offset by 48, with
/// `0x20` marking continuation and `0x10` of the last group as sign. From the
/// fourth count on, values are stored as deltas to the count two places back.
/// Returns `None` for malformed input.
pub fn decode_compressed_counts(encoded: &str) -> Option<Vec<u32>> {
    let bytes = encoded.as_bytes();
    let mut counts: Vec<i64> = Vec::new();
    let mut p = 0;

    while p < bytes.len() {
        let mut x: i64 = 0;
        let mut k = 0;
        loop {
            let c = i64::from(*bytes.get(p)?) - 48;
            if c < 0 || k >= 12 {
                return None;
            }
            x |= (c & 0x1f) << (5 * k);
            p += 1;
            k += 1;
            if c & 0x20 == 0 {
                if c & 0x10 != 0 {
                    x |= -1i64 << (5 * k);
                }
                break;
            }
        }
        if counts.len() > 2 {
            x += counts[counts.len() - 2];
        }
        counts.push(x);
    }

    counts.into_iter().map(|c| u32::try_from(c).ok()).collect()
}

/// Mask of one annotation on a `height x width` image.
///
/// Polygons take precedence, then run-length encodings, then the bbox.
pub fn annotation_mask(ann: &CocoAnnotation, height: usize, width: usize) -> Mask {
    match &ann.segmentation {
        Some(Segmentation::Polygons(rings)) if rings.iter().any(|r| r.len() >= 6) => {
            return rasterize_polygons(rings, height, width);
        }
        Some(Segmentation::Rle { size, counts }) => {
            let [h, w] = *size;
            return decode_rle(counts, h as usize, w as usize).resized_to(height, width);
        }
        Some(Segmentation::CompressedRle { size, counts }) => match decode_compressed_counts(counts) {
            Some(counts) => {
                let [h, w] = *size;
                return decode_rle(&counts, h as usize, w as usize).resized_to(height, width);
            }
            None => log::warn!("Annotation {} has malformed compressed RLE", ann.id),
        },
        _ => {}
    }

    match ann.bbox_array() {
        Some(bbox) => rasterize_bbox(bbox, height, width),
        None => Mask::new(height, width),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Vec<f64> {
        vec![x, y, x + size, y, x + size, y + size, x, y + size]
    }

    #[test]
    fn test_square_polygon_area() {
        let mask = rasterize_polygon(&square(0.0, 0.0, 4.0), 6, 6);
        assert_eq!(mask.area(), 16);
        assert!(mask.get(0, 0));
        assert!(mask.get(3, 3));
        assert!(!mask.get(4, 4));
        assert_eq!(mask.bounding_box(), Some([0.0, 0.0, 4.0, 4.0]));
    }

    #[test]
    fn test_nested_ring_cuts_hole() {
        let rings = vec![square(0.0, 0.0, 6.0), square(2.0, 2.0, 2.0)];
        let mask = rasterize_polygons(&rings, 8, 8);
        assert_eq!(mask.area(), 36 - 4);
        assert!(!mask.get(2, 2));
        assert!(!mask.get(3, 3));
        assert!(mask.get(1, 1));
    }

    #[test]
    fn test_polygon_is_clipped_to_image() {
        let mask = rasterize_polygon(&square(-2.0, -2.0, 4.0), 4, 4);
        assert_eq!(mask.area(), 4);
    }

    #[test]
    fn test_degenerate_rings_are_skipped() {
        let mask = rasterize_polygons(&[vec![0.0, 0.0, 3.0, 3.0]], 4, 4);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_decode_rle_column_major() {
        // 2x3 mask, column-major: skip 1, fill 2 -> (1,0) and (0,1)
        let mask = decode_rle(&[1, 2, 3], 2, 3);
        assert!(!mask.get(0, 0));
        assert!(mask.get(1, 0));
        assert!(mask.get(0, 1));
        assert!(!mask.get(1, 1));
        assert_eq!(mask.area(), 2);
    }

    #[test]
    fn test_decode_compressed_counts() {
        // Single-group counts below 16 encode as chr(48 + n).
        assert_eq!(decode_compressed_counts("12"), Some(vec![1, 2]));
        // Fourth count is a delta against the second: 2 + 2 = 4.
        assert_eq!(decode_compressed_counts("1222"), Some(vec![1, 2, 2, 4]));
        // Continuation: 0x20 | 1 then 1 -> 1 + (1 << 5) = 33.
        assert_eq!(decode_compressed_counts("Q1"), Some(vec![33]));
        assert_eq!(decode_compressed_counts("\u{1}"), None);
        assert_eq!(decode_compressed_counts("Q"), None);
    }

    #[test]
    fn test_annotation_mask_bbox_fallback() {
        let ann = CocoAnnotation::new(1, 1, 1).with_bbox(1.0, 1.0, 2.0, 2.0);
        let mask = annotation_mask(&ann, 5, 5);
        assert_eq!(mask.area(), 4);
        assert!(mask.get(1, 1) && mask.get(2, 2));
    }

    #[test]
    fn test_annotation_mask_prefers_polygons() {
        let ann = CocoAnnotation::new(1, 1, 1)
            .with_bbox(0.0, 0.0, 5.0, 5.0)
            .with_polygons(vec![square(0.0, 0.0, 2.0)]);
        assert_eq!(annotation_mask(&ann, 5, 5).area(), 4);
    }

    #[test]
    fn test_union_and_resize() {
        let mut a = rasterize_polygon(&square(0.0, 0.0, 1.0), 3, 3);
        let b = rasterize_polygon(&square(2.0, 2.0, 1.0), 3, 3);
        a.union_with(&b);
        assert_eq!(a.area(), 2);

        let grown = a.resized_to(4, 4);
        assert_eq!(grown.area(), 2);
        let cropped = a.resized_to(2, 2);
        assert_eq!(cropped.area(), 1);
    }
}
