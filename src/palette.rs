// palette.rs - Fixed-size target palette and the on-demand extractor.
//
// PALETTE LAYOUT
// ──────────────
// A palette is always exactly `PALETTE_SIZE` (16) entries. Each entry is four
// f32 lanes: normalized RGB plus one zero pad lane. That is the memory layout
// of a WGSL `array<vec3<f32>, 16>` in the uniform address space (vec3 has a
// 16-byte stride), so `bytemuck::bytes_of(&palette.entries)` is uploaded to
// the GPU as-is.
//
// Slots beyond the number of clusters found stay all-zero. A zero slot is
// pure black, so near-black pixels match it. This is kept for compatibility
// with existing palettes; it is a known false-positive source in dark scenes.
//
// EXTRACTION
// ──────────
// `extract_palette` is the pure, synchronous clustering step. The
// `PaletteExtractor` runs it on a worker thread over a full copy of the
// observed set, so the frame loop keeps rendering with the previous palette.
// The finished palette comes back through a channel and is picked up by
// `poll()`; at most one job runs at a time and a second trigger is rejected.
//
// NEW RUST CONCEPTS:
// - `std::thread::spawn` + `mpsc::channel`: the worker owns its snapshot
//   (moved into the closure), and sends one value back. No shared state.
// - `TryRecvError::Disconnected`: how a receiver learns that the sending
//   thread died (e.g. panicked) without ever sending.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use thiserror::Error;

use crate::collector::ObservedColorSet;
use crate::color::{Quantizer, Rgb8};
use crate::kmeans::{self, KmeansConfig};

/// Number of palette slots. Must match `TARGET_COLORS_SIZE` in recolor.wgsl.
pub const PALETTE_SIZE: usize = 16;

/// One palette slot: `[r, g, b, pad]`, RGB normalized to [0, 1].
pub type PaletteEntry = [f32; 4];

/// Errors from palette extraction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no colors observed yet; enable extraction and feed some frames first")]
    EmptyColorSet,
    #[error("a palette extraction is already running")]
    AlreadyRunning,
}

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

/// An immutable, generation-tagged set of 16 target colors.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    entries: [PaletteEntry; PALETTE_SIZE],
    generation: u64,
}

impl Palette {
    /// Build a palette from up to 16 normalized colors. Extra colors are
    /// dropped; missing slots are zero.
    pub fn from_colors(colors: &[[f32; 3]], generation: u64) -> Self {
        let mut entries = [[0.0f32; 4]; PALETTE_SIZE];
        for (slot, c) in entries.iter_mut().zip(colors) {
            *slot = [c[0], c[1], c[2], 0.0];
        }
        Palette { entries, generation }
    }

    /// The palette in effect before the first extraction: red, green, blue,
    /// yellow, cyan, magenta, then ten zero slots.
    pub fn seed() -> Self {
        Palette::from_colors(
            &[
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 1.0],
                [1.0, 0.0, 1.0],
            ],
            0,
        )
    }

    pub fn entries(&self) -> &[PaletteEntry; PALETTE_SIZE] {
        &self.entries
    }

    /// RGB of slot `i`. Panics if `i >= PALETTE_SIZE`.
    #[inline]
    pub fn rgb(&self, i: usize) -> [f32; 3] {
        let e = self.entries[i];
        [e[0], e[1], e[2]]
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Slots that are not all-zero.
    pub fn non_zero_count(&self) -> usize {
        self.entries.iter().filter(|e| e[..3].iter().any(|&v| v != 0.0)).count()
    }

    /// Raw bytes for the GPU uniform buffer (256 bytes).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entries)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::seed()
    }
}

// ---------------------------------------------------------------------------
// Synchronous extraction
// ---------------------------------------------------------------------------

/// Cluster a snapshot into a palette.
///
/// With fewer distinct samples than clusters each sample becomes its own
/// entry and the remaining slots stay zero. The cluster count is clamped to
/// 1..=16, so a non-empty snapshot always yields at least one color.
pub fn extract_palette(
    samples: &[Rgb8],
    config: &KmeansConfig,
    generation: u64,
) -> Result<Palette, ExtractError> {
    if samples.is_empty() {
        return Err(ExtractError::EmptyColorSet);
    }

    let config = KmeansConfig {
        clusters: config.clusters.clamp(1, PALETTE_SIZE),
        ..*config
    };
    let points: Vec<[f64; 3]> = samples.iter().map(|s| s.to_f64()).collect();
    let result = kmeans::kmeans(&points, &config);

    tracing::debug!(
        samples = samples.len(),
        clusters = result.centroids.len(),
        iterations = result.iterations,
        converged = result.converged,
        "k-means finished"
    );

    let colors: Vec<[f32; 3]> = result
        .centroids
        .iter()
        .map(|c| [(c[0] / 255.0) as f32, (c[1] / 255.0) as f32, (c[2] / 255.0) as f32])
        .collect();
    Ok(Palette::from_colors(&colors, generation))
}

// ---------------------------------------------------------------------------
// PaletteExtractor
// ---------------------------------------------------------------------------

/// Runs palette extraction off the frame loop, one job at a time.
pub struct PaletteExtractor {
    config: KmeansConfig,
    quantizer: Quantizer,
    /// Generation assigned to the most recently triggered job.
    generation: u64,
    /// Receiver for the in-flight job, if any.
    in_flight: Option<Receiver<Result<Palette, ExtractError>>>,
}

impl PaletteExtractor {
    /// `quantizer` must be the one the collector encodes with.
    pub fn new(config: KmeansConfig, quantizer: Quantizer) -> Self {
        PaletteExtractor { config, quantizer, generation: 0, in_flight: None }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Snapshot `set` and start clustering on a worker thread.
    ///
    /// Rejected while a previous job is still running, and when the set is
    /// empty. Neither rejection changes any state.
    pub fn trigger(&mut self, set: &ObservedColorSet) -> Result<(), ExtractError> {
        if self.in_flight.is_some() {
            return Err(ExtractError::AlreadyRunning);
        }
        if set.is_empty() {
            return Err(ExtractError::EmptyColorSet);
        }

        let samples = set.snapshot(&self.quantizer);
        let config = self.config;
        let generation = self.generation + 1;
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("huekey-extract".into())
            .spawn(move || {
                let result = extract_palette(&samples, &config, generation);
                // The receiver may already be gone if the extractor was
                // dropped; nothing to do then.
                let _ = tx.send(result);
            });

        match spawned {
            Ok(_) => {
                tracing::info!(generation, colors = set.len(), "palette extraction started");
                self.generation = generation;
                self.in_flight = Some(rx);
                Ok(())
            }
            Err(e) => {
                // Thread creation failure: fall back to running inline.
                tracing::warn!(error = %e, "could not spawn extraction worker; running inline");
                let (tx, rx) = mpsc::channel();
                let samples = set.snapshot(&self.quantizer);
                let _ = tx.send(extract_palette(&samples, &self.config, generation));
                self.generation = generation;
                self.in_flight = Some(rx);
                Ok(())
            }
        }
    }

    /// Non-blocking check for a finished palette. Yields each result once.
    pub fn poll(&mut self) -> Option<Palette> {
        let rx = self.in_flight.as_ref()?;
        match rx.try_recv() {
            Ok(Ok(palette)) => {
                self.in_flight = None;
                Some(palette)
            }
            Ok(Err(e)) => {
                self.in_flight = None;
                tracing::warn!(error = %e, "palette extraction produced no palette");
                None
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.in_flight = None;
                tracing::error!("palette extraction worker exited without a result");
                None
            }
        }
    }

    /// Block until the in-flight job finishes. For tests and shutdown; the
    /// frame loop only ever calls [`PaletteExtractor::poll`].
    pub fn wait(&mut self) -> Option<Palette> {
        let rx = self.in_flight.take()?;
        match rx.recv() {
            Ok(Ok(palette)) => Some(palette),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "palette extraction produced no palette");
                None
            }
            Err(_) => {
                tracing::error!("palette extraction worker exited without a result");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
