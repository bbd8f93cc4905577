// recolor.rs - CPU reference for the palette match-and-recolor pass.
//
// This is the authoritative definition of what `shaders/recolor.wgsl`
// computes. The GPU pass is validated against it pixel-for-pixel.
//
// Per pixel:
//   1. c = sampled RGB in [0, 1]
//   2. for i in 0..16: if ‖c − palette[i]‖ < threshold → matched, stop
//   3. matched ? (marker.rgb, c.a) : c
//
// The scan stops at the first entry under the threshold, so when several
// entries qualify the lowest index wins, same as the k-means tie-break.

use serde::{Deserialize, Serialize};

use crate::collector::BYTES_PER_PIXEL;
use crate::color::Rgb8;
use crate::palette::{Palette, PALETTE_SIZE};

/// Default match radius in normalized RGB space.
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// Default marker color (purple).
pub const DEFAULT_MARKER: [f32; 3] = [0.5, 0.0, 0.5];

/// Parameters shared by the CPU reference and the GPU pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecolorParams {
    /// A pixel matches an entry when its distance is strictly below this.
    pub threshold: f32,
    /// Replacement RGB for matched pixels. Alpha is preserved.
    pub marker: [f32; 3],
}

impl Default for RecolorParams {
    fn default() -> Self {
        RecolorParams { threshold: DEFAULT_THRESHOLD, marker: DEFAULT_MARKER }
    }
}

#[inline]
fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Index of the first palette entry within `threshold` of `rgb`.
pub fn find_match(rgb: [f32; 3], palette: &Palette, threshold: f32) -> Option<usize> {
    (0..PALETTE_SIZE).find(|&i| distance(rgb, palette.rgb(i)) < threshold)
}

/// Recolor one normalized RGBA pixel.
#[inline]
pub fn recolor_pixel(rgba: [f32; 4], palette: &Palette, params: &RecolorParams) -> [f32; 4] {
    let rgb = [rgba[0], rgba[1], rgba[2]];
    match find_match(rgb, palette, params.threshold) {
        Some(_) => [params.marker[0], params.marker[1], params.marker[2], rgba[3]],
        None => rgba,
    }
}

/// Recolor an interleaved RGBA8 buffer. Output has the same length and
/// layout as the input; a trailing partial pixel is copied unchanged.
pub fn recolor_rgba(pixels: &[u8], palette: &Palette, params: &RecolorParams) -> Vec<u8> {
    let marker = Rgb8::from_normalized(params.marker);
    let mut out = pixels.to_vec();
    for px in out.chunks_exact_mut(BYTES_PER_PIXEL) {
        let rgb = Rgb8::new(px[0], px[1], px[2]).to_normalized();
        if find_match(rgb, palette, params.threshold).is_some() {
            px[0] = marker.r;
            px[1] = marker.g;
            px[2] = marker.b;
        }
    }
    out
}

/// Fraction of pixels in an RGBA8 buffer equal to the marker color.
/// Handy for checking rendered output.
pub fn marker_coverage(pixels: &[u8], params: &RecolorParams) -> f32 {
    let marker = Rgb8::from_normalized(params.marker);
    let mut total = 0usize;
    let mut hits = 0usize;
    for px in pixels.chunks_exact(BYTES_PER_PIXEL) {
        total += 1;
        if Rgb8::new(px[0], px[1], px[2]) == marker {
            hits += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        hits as f32 / total as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
