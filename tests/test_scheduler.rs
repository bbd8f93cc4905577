// tests/test_scheduler.rs - Frame loop behaviour against a CPU render backend.
//
// `CpuBackend` stands in for the GPU: it keeps the published palette and runs
// the CPU reference recolor on every frame, so these tests need no adapter.

use std::time::Duration;

use huekey::color::Rgb8;
use huekey::config::HuekeyConfig;
use huekey::frame::{Frame, PendingSource, StaticSource};
use huekey::palette::{Palette, PALETTE_SIZE};
use huekey::recolor::{marker_coverage, recolor_rgba, RecolorParams};
use huekey::scheduler::{FrameScheduler, RenderBackend, RenderError, SchedulerState, TickOutcome};

#[derive(Default)]
struct CpuBackend {
    palette: Palette,
    params: RecolorParams,
    /// Generation of the palette each render used.
    rendered_generations: Vec<u64>,
    published: Vec<u64>,
    last_output: Vec<u8>,
}

impl RenderBackend for CpuBackend {
    fn publish_palette(&mut self, palette: &Palette) -> Result<(), RenderError> {
        self.published.push(palette.generation());
        self.palette = palette.clone();
        Ok(())
    }

    fn render_frame(&mut self, frame: &Frame) -> Result<(), RenderError> {
        assert_eq!(self.palette.entries().len(), PALETTE_SIZE);
        self.rendered_generations.push(self.palette.generation());
        self.last_output = recolor_rgba(frame.as_bytes(), &self.palette, &self.params);
        Ok(())
    }
}

const RED: Rgb8 = Rgb8::new(255, 0, 0);

/// Tick until the running extraction has been published, like the host loop
/// does. Gives up after a few seconds.
fn tick_until_published<S: huekey::frame::FrameSource>(s: &mut FrameScheduler<S, CpuBackend>) {
    for _ in 0..5000 {
        s.tick();
        if !s.is_extracting() {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("extraction did not finish");
}

// ===== Startup without frames =====

#[test]
fn pending_source_issues_no_backend_calls() {
    let config = HuekeyConfig::default();
    let src = PendingSource::new(StaticSource::solid(640, 480, RED).unwrap(), 3);
    let mut s = FrameScheduler::new(&config, src, CpuBackend::default()).unwrap();

    for _ in 0..3 {
        assert_eq!(s.tick(), TickOutcome::Waiting);
        assert_eq!(s.state(), SchedulerState::WaitingForFrame);
    }
    assert!(s.backend().rendered_generations.is_empty());
    assert!(s.backend().published.is_empty());
    assert!(s.colors().is_empty());

    assert_eq!(s.tick(), TickOutcome::Processed { collected: true, rendered: true });
    assert_eq!(s.state(), SchedulerState::Active);
    assert_eq!(s.stats().waiting_ticks, 3);
    assert_eq!(s.backend().rendered_generations, vec![0]);
}

// ===== Solid red end to end =====

#[test]
fn solid_red_frame_fully_highlighted() {
    let config = HuekeyConfig::default();
    let src = StaticSource::solid(640, 480, RED).unwrap();
    let mut s = FrameScheduler::new(&config, src, CpuBackend::default()).unwrap();

    for _ in 0..10 {
        s.tick();
    }
    assert_eq!(s.colors().len(), 1);
    assert_eq!(s.stats().dimension_mismatches, 0);

    s.trigger_extraction().unwrap();
    tick_until_published(&mut s);
    assert_eq!(s.palette().generation(), 1);
    assert_eq!(s.palette().rgb(0), [1.0, 0.0, 0.0]);

    s.tick();
    let coverage = marker_coverage(&s.backend().last_output, &config.recolor);
    assert_eq!(coverage, 1.0);
}

#[test]
fn seed_palette_already_matches_pure_primaries() {
    // Red is in the seed palette, so the very first render is highlighted.
    let config = HuekeyConfig::default();
    let src = StaticSource::solid(64, 64, RED).unwrap();
    let mut s = FrameScheduler::new(&config, src, CpuBackend::default()).unwrap();
    s.tick();
    assert_eq!(marker_coverage(&s.backend().last_output, &config.recolor), 1.0);
}

#[test]
fn unmatched_color_left_alone_until_extracted() {
    let config = HuekeyConfig::default();
    let orange = Rgb8::new(255, 128, 0);
    let src = StaticSource::solid(64, 64, orange).unwrap();
    let mut s = FrameScheduler::new(&config, src, CpuBackend::default()).unwrap();

    s.tick();
    assert_eq!(marker_coverage(&s.backend().last_output, &config.recolor), 0.0);

    s.trigger_extraction().unwrap();
    tick_until_published(&mut s);
    s.tick();
    assert_eq!(marker_coverage(&s.backend().last_output, &config.recolor), 1.0);
}

// ===== Palette publication =====

#[test]
fn renders_see_one_generation_each() {
    let config = HuekeyConfig::default();
    let src = StaticSource::split(64, 64, RED, Rgb8::new(0, 0, 255)).unwrap();
    let mut s = FrameScheduler::new(&config, src, CpuBackend::default()).unwrap();

    s.tick();
    for _ in 0..3 {
        s.trigger_extraction().unwrap();
        tick_until_published(&mut s);
        s.tick();
    }

    let b = s.backend();
    assert_eq!(b.published, vec![1, 2, 3]);
    // Generations only ever move forward from render to render.
    assert!(b.rendered_generations.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(b.rendered_generations.first(), Some(&0));
    assert_eq!(b.rendered_generations.last(), Some(&3));
    assert_eq!(s.stats().palettes_published, 3);
}

#[test]
fn clear_colors_then_trigger_is_rejected() {
    let config = HuekeyConfig::default();
    let src = StaticSource::solid(16, 16, RED).unwrap();
    let mut s = FrameScheduler::new(&config, src, CpuBackend::default()).unwrap();
    s.tick();
    s.clear_colors();
    assert!(s.trigger_extraction().is_err());
    assert_eq!(s.stats().observed_colors, 0);
}

#[test]
fn invalid_config_rejected_at_construction() {
    let mut config = HuekeyConfig::default();
    config.collector.quantization_divisor = 0;
    let src = StaticSource::solid(16, 16, RED).unwrap();
    assert!(FrameScheduler::new(&config, src, CpuBackend::default()).is_err());
}

// ===== Failed render cycles =====

/// Renders nothing and reports the readback as lost, every time.
struct LostReadbackBackend;

impl RenderBackend for LostReadbackBackend {
    fn publish_palette(&mut self, _palette: &Palette) -> Result<(), RenderError> {
        Ok(())
    }

    fn render_frame(&mut self, _frame: &Frame) -> Result<(), RenderError> {
        Err(RenderError::Surface("readback map failed".into()))
    }
}

#[test]
fn failed_readback_not_counted_as_rendered() {
    let config = HuekeyConfig::default();
    let src = StaticSource::solid(16, 16, RED).unwrap();
    let mut s = FrameScheduler::new(&config, src, LostReadbackBackend).unwrap();

    for _ in 0..3 {
        assert!(matches!(s.tick(), TickOutcome::RenderFailed(RenderError::Surface(_))));
    }
    assert_eq!(s.stats().frames_rendered, 0);
    assert_eq!(s.stats().render_failures, 3);
    // Collection still ran on every failed cycle.
    assert_eq!(s.colors().len(), 1);
    assert_eq!(s.stats().frames_seen, 3);
}
