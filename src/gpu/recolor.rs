// gpu/recolor.rs - Render pipeline for the palette match-and-recolor pass.
//
// Created once at startup and immutable afterwards: shader module, bind
// group layout, pipeline and sampler are shared by every frame. Per frame
// only the bind group is rebuilt, because the frame texture is new each
// cycle.
//
// The fragment shader mirrors `recolor::recolor_pixel`; see that module for
// the algorithm. Threshold, marker color and the configured resolution are
// substituted into the WGSL source before compilation, the same template
// approach the compute kernels used for workgroup sizes.
//
// NEW RUST CONCEPTS:
// - `include_str!`: embeds the WGSL file as a `&'static str` at compile
//   time, so the binary carries its own shader.
// - Render pipeline vs. compute pipeline: a render pipeline has vertex and
//   fragment stages and writes to color attachments instead of storage
//   buffers. The draw is a single oversized triangle (`draw(0..3, 0..1)`).

use std::num::NonZeroU64;

use crate::gpu::device::GpuDevice;
use crate::gpu::frame::GpuFrame;
use crate::gpu::palette::{PaletteBuffer, PALETTE_BUFFER_SIZE};
use crate::recolor::RecolorParams;

const SHADER_TEMPLATE: &str = include_str!("../shaders/recolor.wgsl");

/// Fill in the template values of recolor.wgsl.
pub(crate) fn shader_source(params: &RecolorParams, resolution: (u32, u32)) -> String {
    let lit = |v: f32| format!("{v:?}");
    SHADER_TEMPLATE
        .replace("{{FRAME_WIDTH}}", &lit(resolution.0 as f32))
        .replace("{{FRAME_HEIGHT}}", &lit(resolution.1 as f32))
        .replace("{{THRESHOLD}}", &lit(params.threshold))
        .replace("{{MARKER_R}}", &lit(params.marker[0]))
        .replace("{{MARKER_G}}", &lit(params.marker[1]))
        .replace("{{MARKER_B}}", &lit(params.marker[2]))
}

/// Immutable pipeline state for the recolor pass.
pub struct RecolorPipeline {
    pipeline: wgpu::RenderPipeline,
    bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl RecolorPipeline {
    /// Compile the shader and build the pipeline.
    ///
    /// `resolution` is the configured frame size that fragment coordinates
    /// are normalized by; `target_format` is the display surface's format.
    pub fn new(
        gpu: &GpuDevice,
        target_format: wgpu::TextureFormat,
        params: &RecolorParams,
        resolution: (u32, u32),
    ) -> Self {
        let shader_src = shader_source(params, resolution);
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("recolor.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let bgl = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Recolor BGL"),
            entries: &[
                // 0: frame texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                // 1: linear sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // 2: palette uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(PALETTE_BUFFER_SIZE),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Recolor pipeline layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("recolor"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vertex_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fragment_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Recolor sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        tracing::info!(
            format = ?target_format,
            width = resolution.0,
            height = resolution.1,
            threshold = params.threshold,
            "recolor pipeline ready"
        );

        RecolorPipeline { pipeline, bgl, sampler }
    }

    /// Record and submit one recolor pass into `target`.
    ///
    /// Fire-and-forget: the submission is not waited on.
    pub fn render(
        &self,
        gpu: &GpuDevice,
        frame: &GpuFrame,
        palette: &PaletteBuffer,
        target: &wgpu::TextureView,
    ) {
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Recolor BG"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&frame.view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&self.sampler) },
                wgpu::BindGroupEntry { binding: 2, resource: palette.buffer().as_entire_binding() },
            ],
        });

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Recolor pass"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("recolor"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
