//! Category color generation.
//!
//! Small category counts use a fixed qualitative palette so neighbouring ids
//! stay easy to tell apart; larger counts are spread evenly around the hue
//! circle.

/// RGBA color with channels in `0.0..=1.0`.
pub type Rgba = [f32; 4];

/// Fallback for categories without an assigned color.
pub const WHITE: Rgba = [1.0, 1.0, 1.0, 1.0];

/// Fully transparent, used for unfilled shape faces.
pub const TRANSPARENT: Rgba = [0.0, 0.0, 0.0, 0.0];

/// Largest category count served from [`TAB20`].
pub const QUALITATIVE_LIMIT: usize = 20;

/// The 20-entry qualitative "tab20" palette.
pub const TAB20: [[u8; 3]; QUALITATIVE_LIMIT] = [
    [0x1f, 0x77, 0xb4],
    [0xae, 0xc7, 0xe8],
    [0xff, 0x7f, 0x0e],
    [0xff, 0xbb, 0x78],
    [0x2c, 0xa0, 0x2c],
    [0x98, 0xdf, 0x8a],
    [0xd6, 0x27, 0x28],
    [0xff, 0x98, 0x96],
    [0x94, 0x67, 0xbd],
    [0xc5, 0xb0, 0xd5],
    [0x8c, 0x56, 0x4b],
    [0xc4, 0x9c, 0x94],
    [0xe3, 0x77, 0xc2],
    [0xf7, 0xb6, 0xd2],
    [0x7f, 0x7f, 0x7f],
    [0xc7, 0xc7, 0xc7],
    [0xbc, 0xbd, 0x22],
    [0xdb, 0xdb, 0x8d],
    [0x17, 0xbe, 0xcf],
    [0x9e, 0xda, 0xe5],
];

/// Convert HSV to RGB.
///
/// # Arguments
/// * `h` - Hue in degrees (0-360)
/// * `s` - Saturation (0.0-1.0)
/// * `v` - Value/brightness (0.0-1.0)
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (r + m, g + m, b + m)
}

/// Generate `n` distinct, deterministic RGBA colors.
pub fn category_colors(n: usize) -> Vec<Rgba> {
    if n <= QUALITATIVE_LIMIT {
        return TAB20[..n]
            .iter()
            .map(|&[r, g, b]| [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0])
            .collect();
    }

    (0..n)
        .map(|i| {
            let hue = (i as f64 * 360.0 / n as f64) as f32;
            let (r, g, b) = hsv_to_rgb(hue, 1.0, 1.0);
            [r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0), 1.0]
        })
        .collect()
}

/// Convert an RGBA color to 8-bit channels.
pub fn to_rgba8(color: Rgba) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}
