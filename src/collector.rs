// collector.rs - Observed color set and the per-frame color collector.
//
// The observed set is an explicitly owned value. Whoever drives the frame
// loop owns it, lends it mutably to the collector for one frame at a time,
// and lends it immutably to the palette extractor when a snapshot is taken.
// There is exactly one writer, so no locking is involved.
//
// The set only grows. Re-scanning an identical frame inserts keys that are
// already present and leaves the size unchanged.

use std::collections::HashSet;

use crate::color::{ColorKey, Quantizer, Rgb8};

/// Bytes per interleaved RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

// ---------------------------------------------------------------------------
// ObservedColorSet
// ---------------------------------------------------------------------------

/// Unique quantized colors seen across frames.
#[derive(Debug, Clone, Default)]
pub struct ObservedColorSet {
    keys: HashSet<ColorKey>,
}

impl ObservedColorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: ColorKey) -> bool {
        self.keys.contains(&key)
    }

    /// Insert one key. Returns `true` if it was new.
    pub fn insert(&mut self, key: ColorKey) -> bool {
        self.keys.insert(key)
    }

    /// Forget every color. Only the demo's reset key uses this; the frame
    /// loop itself never shrinks the set.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Full copy of the set, decoded back to 8-bit samples.
    ///
    /// Sorted by key so that identical sets always produce identical
    /// snapshots regardless of hash iteration order.
    pub fn snapshot(&self, quantizer: &Quantizer) -> Vec<Rgb8> {
        let mut keys: Vec<ColorKey> = self.keys.iter().copied().collect();
        keys.sort_unstable();
        keys.into_iter().map(|k| quantizer.decode(k)).collect()
    }
}

// ---------------------------------------------------------------------------
// ColorCollector
// ---------------------------------------------------------------------------

/// Scans RGBA8 frames into an [`ObservedColorSet`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorCollector {
    quantizer: Quantizer,
}

impl ColorCollector {
    pub fn new(quantizer: Quantizer) -> Self {
        ColorCollector { quantizer }
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    /// Quantize every pixel of `pixels` into `set`. Returns the set size
    /// after the scan.
    ///
    /// `pixels` is interleaved RGBA, row-major. Alpha is ignored. A
    /// trailing partial pixel is ignored and an empty buffer is a no-op.
    pub fn collect(&self, set: &mut ObservedColorSet, pixels: &[u8]) -> usize {
        for px in pixels.chunks_exact(BYTES_PER_PIXEL) {
            set.insert(self.quantizer.key(Rgb8::new(px[0], px[1], px[2])));
        }
        set.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(pixels: &[[u8; 3]]) -> Vec<u8> {
        pixels.iter().flat_map(|p| [p[0], p[1], p[2], 255]).collect()
    }

    #[test]
    fn test_empty_buffer_is_noop() {
        let mut set = ObservedColorSet::new();
        assert_eq!(ColorCollector::default().collect(&mut set, &[]), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_partial_trailing_pixel_ignored() {
        let mut set = ObservedColorSet::new();
        let n = ColorCollector::default().collect(&mut set, &[255, 0, 0, 255, 9, 9]);
        assert_eq!(n, 1);
    }

    #[test]
    fn test_alpha_does_not_split_colors() {
        let mut set = ObservedColorSet::new();
        let n = ColorCollector::default().collect(&mut set, &[10, 20, 30, 0, 10, 20, 30, 255]);
        assert_eq!(n, 1);
    }

    #[test]
    fn test_refeed_is_idempotent() {
        let collector = ColorCollector::default();
        let frame = rgba(&[[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 0, 0]]);
        let mut set = ObservedColorSet::new();
        let first = collector.collect(&mut set, &frame);
        let second = collector.collect(&mut set, &frame);
        assert_eq!(first, 3);
        assert_eq!(second, 3);
    }

    #[test]
    fn test_near_colors_collapse() {
        let collector = ColorCollector::default();
        let mut set = ObservedColorSet::new();
        // 90, 91, 92 all quantize to 30 with d = 3.
        collector.collect(&mut set, &rgba(&[[90, 90, 90], [91, 92, 90], [92, 91, 91]]));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_snapshot_sorted_and_decoded() {
        let collector = ColorCollector::default();
        let mut set = ObservedColorSet::new();
        collector.collect(&mut set, &rgba(&[[255, 0, 0], [0, 0, 255]]));
        let snap = set.snapshot(collector.quantizer());
        assert_eq!(snap, vec![Rgb8::new(0, 0, 255), Rgb8::new(255, 0, 0)]);
    }

    #[test]
    fn test_clear() {
        let mut set = ObservedColorSet::new();
        ColorCollector::default().collect(&mut set, &rgba(&[[1, 2, 3]]));
        set.clear();
        assert!(set.is_empty());
    }
}
