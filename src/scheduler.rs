// scheduler.rs - Per-frame loop: collect colors, render, publish palettes.
//
// The host calls `tick()` once per display refresh (the demo does it once
// per window update). Each tick:
//
//   1. If a palette extraction finished since the last tick, hand the new
//      palette to the render backend. This happens between render cycles,
//      so a render sees either the old palette or the new one, never a mix.
//   2. While `WaitingForFrame`, poll the source's dimensions. Zero means
//      "not ready": return without touching the backend.
//   3. Once `Active`, pull the latest frame, feed the collector (if
//      extraction is enabled) and render it (if rendering is enabled).
//
// STATE MACHINE
// ─────────────
//   WaitingForFrame ──(source reports non-zero dimensions)──▶ Active
//
// There is no way back: a source that disappears is not modelled.
//
// Nothing in a tick blocks. Extraction runs on the extractor's worker
// thread; GPU submission is fire-and-forget.
//
// NEW RUST CONCEPTS:
// - Generic parameters `S: FrameSource, B: RenderBackend` instead of trait
//   objects: the scheduler is monomorphised for the real GPU backend and for
//   the recording backend used in tests, with no dynamic dispatch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collector::{ColorCollector, ObservedColorSet};
use crate::config::{ConfigError, HuekeyConfig};
use crate::frame::{Frame, FrameError, FrameSource};
use crate::palette::{ExtractError, Palette, PaletteExtractor};

/// Errors from the render side of one cycle. Never fatal to the loop.
#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("display surface unavailable: {0}")]
    Surface(String),
}

/// The render side of the pipeline, as seen by the scheduler.
///
/// The GPU implementation is `gpu::GpuRecolorer`.
pub trait RenderBackend {
    /// Replace the palette used by subsequent renders. Must be all-or-nothing:
    /// on error the previous palette stays in effect.
    fn publish_palette(&mut self, palette: &Palette) -> Result<(), RenderError>;

    /// Upload `frame` and run one recolor pass to the display surface.
    fn render_frame(&mut self, frame: &Frame) -> Result<(), RenderError>;
}

/// Switches and pacing for the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Feed every frame to the color collector.
    pub extraction_enabled: bool,
    /// Render every frame.
    pub render_enabled: bool,
    /// Refresh rate the host loop is paced to.
    pub target_fps: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig { extraction_enabled: true, render_enabled: true, target_fps: 60 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    WaitingForFrame,
    Active,
}

/// What one tick did.
#[derive(Debug, PartialEq)]
pub enum TickOutcome {
    /// Source not ready; nothing was done.
    Waiting,
    /// Source is active but had no frame this tick.
    NoFrame,
    /// A frame was processed.
    Processed { collected: bool, rendered: bool },
    /// The frame was collected (if enabled) but rendering failed; the loop
    /// carries on next tick.
    RenderFailed(RenderError),
}

/// Running counters, for status lines and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub waiting_ticks: u64,
    pub frames_seen: u64,
    pub frames_rendered: u64,
    pub render_failures: u64,
    pub dimension_mismatches: u64,
    pub palettes_published: u64,
    pub observed_colors: usize,
}

/// Drives collector, extractor and render backend from one control flow.
pub struct FrameScheduler<S, B> {
    source: S,
    backend: B,
    collector: ColorCollector,
    colors: ObservedColorSet,
    extractor: PaletteExtractor,
    /// Last palette handed to the backend.
    palette: Palette,
    state: SchedulerState,
    extraction_enabled: bool,
    render_enabled: bool,
    expected: (u32, u32),
    last_mismatch: Option<(u32, u32)>,
    stats: SchedulerStats,
}

impl<S: FrameSource, B: RenderBackend> FrameScheduler<S, B> {
    /// The backend is expected to start out with [`Palette::seed`].
    pub fn new(config: &HuekeyConfig, source: S, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let quantizer = config.collector.quantizer()?;
        Ok(FrameScheduler {
            source,
            backend,
            collector: ColorCollector::new(quantizer),
            colors: ObservedColorSet::new(),
            extractor: PaletteExtractor::new(config.kmeans, quantizer),
            palette: Palette::seed(),
            state: SchedulerState::WaitingForFrame,
            extraction_enabled: config.scheduler.extraction_enabled,
            render_enabled: config.scheduler.render_enabled,
            expected: (config.frame.expected_width, config.frame.expected_height),
            last_mismatch: None,
            stats: SchedulerStats::default(),
        })
    }

    /// Run one loop iteration.
    pub fn tick(&mut self) -> TickOutcome {
        self.stats.ticks += 1;

        if let Some(palette) = self.extractor.poll() {
            self.publish(palette);
        }

        if self.state == SchedulerState::WaitingForFrame {
            let (w, h) = self.source.current_dimensions();
            if w == 0 || h == 0 {
                self.stats.waiting_ticks += 1;
                return TickOutcome::Waiting;
            }
            tracing::info!(width = w, height = h, "frame source ready");
            self.state = SchedulerState::Active;
        }

        let Some(frame) = self.source.current_frame() else {
            return TickOutcome::NoFrame;
        };
        self.stats.frames_seen += 1;
        self.check_dimensions(frame.dimensions());

        let collected = self.extraction_enabled;
        if collected {
            self.stats.observed_colors = self.collector.collect(&mut self.colors, frame.as_bytes());
        }

        if !self.render_enabled {
            return TickOutcome::Processed { collected, rendered: false };
        }

        match self.backend.render_frame(&frame) {
            Ok(()) => {
                self.stats.frames_rendered += 1;
                TickOutcome::Processed { collected, rendered: true }
            }
            Err(e) => {
                self.stats.render_failures += 1;
                tracing::warn!(error = %e, "render cycle skipped");
                TickOutcome::RenderFailed(e)
            }
        }
    }

    fn check_dimensions(&mut self, dims: (u32, u32)) {
        if dims == self.expected {
            self.last_mismatch = None;
            return;
        }
        self.stats.dimension_mismatches += 1;
        if self.last_mismatch != Some(dims) {
            tracing::warn!(
                width = dims.0,
                height = dims.1,
                expected_width = self.expected.0,
                expected_height = self.expected.1,
                "frame dimensions differ from configured resolution"
            );
            self.last_mismatch = Some(dims);
        }
    }

    fn publish(&mut self, palette: Palette) {
        match self.backend.publish_palette(&palette) {
            Ok(()) => {
                tracing::info!(
                    generation = palette.generation(),
                    entries = palette.non_zero_count(),
                    "palette published"
                );
                self.stats.palettes_published += 1;
                self.palette = palette;
            }
            Err(e) => {
                tracing::warn!(error = %e, generation = palette.generation(), "palette publish failed");
            }
        }
    }

    /// Start a palette extraction over the colors observed so far.
    ///
    /// Rejected (with no state change) while one is already running.
    pub fn trigger_extraction(&mut self) -> Result<(), ExtractError> {
        self.extractor.trigger(&self.colors).inspect_err(|e| {
            tracing::warn!(error = %e, "palette extraction not started");
        })
    }

    pub fn is_extracting(&self) -> bool {
        self.extractor.is_running()
    }

    /// Block until the running extraction (if any) finishes and publish its
    /// result immediately. Returns whether a palette was published.
    ///
    /// The frame loop never calls this; it is for shutdown and tests.
    pub fn finish_extraction(&mut self) -> bool {
        match self.extractor.wait() {
            Some(palette) => {
                self.publish(palette);
                true
            }
            None => false,
        }
    }

    /// Flip the extraction switch. Returns the new value.
    pub fn toggle_extraction(&mut self) -> bool {
        self.extraction_enabled = !self.extraction_enabled;
        self.extraction_enabled
    }

    pub fn set_extraction_enabled(&mut self, enabled: bool) {
        self.extraction_enabled = enabled;
    }

    pub fn extraction_enabled(&self) -> bool {
        self.extraction_enabled
    }

    pub fn set_render_enabled(&mut self, enabled: bool) {
        self.render_enabled = enabled;
    }

    pub fn render_enabled(&self) -> bool {
        self.render_enabled
    }

    /// Forget all observed colors.
    pub fn clear_colors(&mut self) {
        self.colors.clear();
        self.stats.observed_colors = 0;
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn colors(&self) -> &ObservedColorSet {
        &self.colors
    }

    /// Palette currently in effect on the backend.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb8;
    use crate::frame::StaticSource;

    #[derive(Default)]
    struct CountingBackend {
        renders: usize,
        publishes: usize,
        fail_next: bool,
    }

    impl RenderBackend for CountingBackend {
        fn publish_palette(&mut self, _palette: &Palette) -> Result<(), RenderError> {
            self.publishes += 1;
            Ok(())
        }

        fn render_frame(&mut self, _frame: &Frame) -> Result<(), RenderError> {
            if std::mem::take(&mut self.fail_next) {
                return Err(RenderError::Surface("lost".into()));
            }
            self.renders += 1;
            Ok(())
        }
    }

    fn scheduler(w: u32, h: u32) -> FrameScheduler<StaticSource, CountingBackend> {
        let config = HuekeyConfig::default();
        let src = StaticSource::solid(w, h, Rgb8::new(255, 0, 0)).unwrap();
        FrameScheduler::new(&config, src, CountingBackend::default()).unwrap()
    }

    #[test]
    fn test_active_source_renders_immediately() {
        let mut s = scheduler(8, 8);
        assert_eq!(s.tick(), TickOutcome::Processed { collected: true, rendered: true });
        assert_eq!(s.state(), SchedulerState::Active);
        assert_eq!(s.backend().renders, 1);
        assert_eq!(s.stats().observed_colors, 1);
    }

    #[test]
    fn test_extraction_toggle_takes_effect_next_tick() {
        let mut s = scheduler(8, 8);
        assert!(!s.toggle_extraction());
        assert_eq!(s.tick(), TickOutcome::Processed { collected: false, rendered: true });
        assert!(s.colors().is_empty());
        assert!(s.toggle_extraction());
        s.tick();
        assert_eq!(s.colors().len(), 1);
    }

    #[test]
    fn test_set_extraction_enabled() {
        let mut s = scheduler(8, 8);
        s.set_extraction_enabled(false);
        assert!(!s.extraction_enabled());
        assert_eq!(s.tick(), TickOutcome::Processed { collected: false, rendered: true });
        s.set_extraction_enabled(true);
        assert_eq!(s.tick(), TickOutcome::Processed { collected: true, rendered: true });
        assert_eq!(s.colors().len(), 1);
    }

    #[test]
    fn test_render_disabled() {
        let mut s = scheduler(8, 8);
        s.set_render_enabled(false);
        assert_eq!(s.tick(), TickOutcome::Processed { collected: true, rendered: false });
        assert_eq!(s.backend().renders, 0);
    }

    #[test]
    fn test_render_failure_is_not_fatal() {
        let mut s = scheduler(8, 8);
        s.backend_mut().fail_next = true;
        assert!(matches!(s.tick(), TickOutcome::RenderFailed(RenderError::Surface(_))));
        assert_eq!(s.tick(), TickOutcome::Processed { collected: true, rendered: true });
        assert_eq!(s.stats().render_failures, 1);
        assert_eq!(s.stats().frames_rendered, 1);
    }

    #[test]
    fn test_dimension_mismatch_counted_not_fatal() {
        let mut s = scheduler(8, 8);
        s.tick();
        s.tick();
        assert_eq!(s.stats().dimension_mismatches, 2);
        assert_eq!(s.stats().frames_rendered, 2);
    }

    #[test]
    fn test_palette_published_between_ticks() {
        let mut s = scheduler(8, 8);
        s.tick();
        s.trigger_extraction().unwrap();
        assert_eq!(s.trigger_extraction(), Err(ExtractError::AlreadyRunning));
        assert!(s.finish_extraction());
        assert_eq!(s.backend().publishes, 1);
        assert_eq!(s.palette().generation(), 1);
        assert_eq!(s.palette().rgb(0), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_trigger_before_any_frame_rejected() {
        let mut s = scheduler(8, 8);
        assert_eq!(s.trigger_extraction(), Err(ExtractError::EmptyColorSet));
        assert!(!s.is_extracting());
    }
}
