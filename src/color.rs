// color.rs - Color samples and quantized color keys.
//
// A frame pixel is reduced to a single `u32` key before it enters the
// observed color set:
//
//   (r, g, b)  ──÷d──▶  (r/d, g/d, b/d)  ──pack──▶  (qr << 16) | (qg << 8) | qb
//
// Division truncates, so many pixels share a key. With d = 3 every channel
// lands in 0..=85, which bounds the key space at 86³ distinct values.
//
// Decoding multiplies each quantized channel back by d. That is exact at the
// ends of the range for d = 3 (255 → 85 → 255, 0 → 0 → 0), which is what
// lets a pure-red frame produce a palette entry of exactly (1, 0, 0).
//
// NEW RUST CONCEPTS:
// - `#[repr(transparent)]` newtype over `u32`: the key has the same layout
//   as the integer but cannot be confused with a pixel count or an index.
// - `From` impls for cheap, infallible conversions between representations.

use std::fmt;

use crate::config::ConfigError;

/// Default quantization divisor.
pub const DEFAULT_DIVISOR: u8 = 3;

// ---------------------------------------------------------------------------
// Rgb8
// ---------------------------------------------------------------------------

/// An 8-bit-per-channel color sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb8 { r, g, b }
    }

    /// Normalize to [0, 1] per channel. 0 → 0.0, 255 → 1.0.
    #[inline]
    pub fn to_normalized(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }

    /// Inverse of [`Rgb8::to_normalized`]. Values are clamped and rounded.
    #[inline]
    pub fn from_normalized(c: [f32; 3]) -> Self {
        let q = |v: f32| (v * 255.0).clamp(0.0, 255.0).round() as u8;
        Rgb8::new(q(c[0]), q(c[1]), q(c[2]))
    }

    /// Channels as `f64` in raw 0–255 units (k-means works in this space).
    #[inline]
    pub fn to_f64(self) -> [f64; 3] {
        [self.r as f64, self.g as f64, self.b as f64]
    }
}

impl From<[u8; 3]> for Rgb8 {
    fn from(c: [u8; 3]) -> Self {
        Rgb8::new(c[0], c[1], c[2])
    }
}

impl fmt::Display for Rgb8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ---------------------------------------------------------------------------
// ColorKey
// ---------------------------------------------------------------------------

/// A quantized, packed color. Only meaningful together with the
/// [`Quantizer`] that produced it.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorKey(pub u32);

impl ColorKey {
    /// Unpack into the three quantized channels (not yet scaled back).
    #[inline]
    pub fn channels(self) -> [u8; 3] {
        [
            ((self.0 >> 16) & 0xff) as u8,
            ((self.0 >> 8) & 0xff) as u8,
            (self.0 & 0xff) as u8,
        ]
    }
}

// ---------------------------------------------------------------------------
// Quantizer
// ---------------------------------------------------------------------------

/// Divide-and-truncate color quantizer.
///
/// The collector encodes with it and the palette snapshot decodes with it;
/// both sides must hold the same divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    divisor: u8,
}

impl Default for Quantizer {
    fn default() -> Self {
        Quantizer { divisor: DEFAULT_DIVISOR }
    }
}

impl Quantizer {
    /// Create a quantizer. A divisor of zero is rejected.
    pub fn new(divisor: u8) -> Result<Self, ConfigError> {
        if divisor == 0 {
            return Err(ConfigError::ZeroDivisor);
        }
        Ok(Quantizer { divisor })
    }

    pub fn divisor(&self) -> u8 {
        self.divisor
    }

    /// Number of distinct values one quantized channel can take.
    pub fn levels(&self) -> u32 {
        255 / self.divisor as u32 + 1
    }

    /// Upper bound on the number of distinct keys (`levels³`).
    pub fn key_space(&self) -> u32 {
        self.levels().pow(3)
    }

    /// Quantize and pack one sample.
    #[inline]
    pub fn key(&self, c: Rgb8) -> ColorKey {
        let d = self.divisor;
        let (r, g, b) = ((c.r / d) as u32, (c.g / d) as u32, (c.b / d) as u32);
        ColorKey((r << 16) | (g << 8) | b)
    }

    /// Map a key back to a representative 8-bit sample.
    ///
    /// Saturates at 255 for divisors that do not divide 255 evenly.
    #[inline]
    pub fn decode(&self, key: ColorKey) -> Rgb8 {
        let d = self.divisor as u16;
        let [r, g, b] = key.channels();
        let up = |q: u8| (q as u16 * d).min(255) as u8;
        Rgb8::new(up(r), up(g), up(b))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_divisor_rejected() {
        assert!(matches!(Quantizer::new(0), Err(ConfigError::ZeroDivisor)));
    }

    #[test]
    fn test_key_packs_channels() {
        let q = Quantizer::new(1).unwrap();
        assert_eq!(q.key(Rgb8::new(0x12, 0x34, 0x56)), ColorKey(0x123456));
    }

    #[test]
    fn test_key_is_deterministic() {
        let q = Quantizer::default();
        for v in [0u8, 1, 2, 3, 127, 128, 254, 255] {
            let c = Rgb8::new(v, 255 - v, v / 2);
            assert_eq!(q.key(c), q.key(c));
        }
    }

    #[test]
    fn test_quantization_is_many_to_one() {
        let q = Quantizer::default();
        // 0, 1, 2 all truncate to 0 with d = 3.
        let a = q.key(Rgb8::new(0, 0, 0));
        let b = q.key(Rgb8::new(1, 2, 0));
        assert_eq!(a, b);
        assert_ne!(a, q.key(Rgb8::new(3, 0, 0)));
    }

    #[test]
    fn test_decode_extremes_exact_for_three() {
        let q = Quantizer::default();
        assert_eq!(q.decode(q.key(Rgb8::new(255, 0, 255))), Rgb8::new(255, 0, 255));
        assert_eq!(q.decode(q.key(Rgb8::new(0, 0, 0))), Rgb8::new(0, 0, 0));
    }

    #[test]
    fn test_decode_saturates() {
        // 255 / 2 = 127 → 254; 255 / 4 = 63 → 252. Never above 255.
        let q = Quantizer::new(2).unwrap();
        assert_eq!(q.decode(q.key(Rgb8::new(255, 255, 255))), Rgb8::new(254, 254, 254));
        let q = Quantizer::new(200).unwrap();
        // 255 / 200 = 1 → 200.
        assert_eq!(q.decode(q.key(Rgb8::new(255, 0, 0))).r, 200);
    }

    #[test]
    fn test_key_space() {
        assert_eq!(Quantizer::default().levels(), 86);
        assert_eq!(Quantizer::default().key_space(), 86 * 86 * 86);
        assert_eq!(Quantizer::new(1).unwrap().key_space(), 256 * 256 * 256);
    }

    #[test]
    fn test_normalized_round_trip_endpoints() {
        assert_eq!(Rgb8::new(255, 0, 0).to_normalized(), [1.0, 0.0, 0.0]);
        assert_eq!(Rgb8::from_normalized([0.5, 0.0, 1.0]), Rgb8::new(128, 0, 255));
    }
}
