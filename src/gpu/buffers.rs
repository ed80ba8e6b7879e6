use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResource;
use bevy::render::render_resource::{
    BindGroup, BindGroupEntry, BindGroupLayout, BindGroupLayoutEntry, BindingResource,
    BindingType, Buffer, BufferBindingType, BufferDescriptor, BufferInitDescriptor, BufferUsages,
    Extent3d, ShaderStages, TexelCopyBufferLayout, TextureDescriptor, TextureDimension,
    TextureFormat, TextureSampleType, TextureUsages, TextureView, TextureViewDescriptor,
    TextureViewDimension,
};
use bevy::render::renderer::{RenderDevice, RenderQueue};
use bevy::render::{Extract, ExtractSchedule, Render, RenderApp, RenderSet};

use crate::cpu::verlet::{Attenuation, FrameInput, ParticleSim, SourceImage};
use crate::gpu::blur::{
    extract_blur, init_blur_params, init_blur_targets, prepare_blur_bind_groups,
    prepare_blur_pipelines, queue_blur_params, BlurSettings,
};
use crate::gpu::draw_buffers::{
    extract_draw_params_buffer, init_draw_bgl, init_draw_params, prepare_draw_bind_groups,
    update_draw_params,
};
use crate::gpu::draw_pipeline::prepare_draw_pipeline;
use crate::gpu::pipeline::{add_particle_nodes_to_graph, prepare_update_pipeline, UpdatePipeline};
use crate::PointSize;

// ==================== resources ======================================

/* interface of resources for the update shader -> actual resource binding via
BindGroup, created through RenderDevice::create_bind_group_layout. */
#[derive(Resource, Clone)]
pub struct ParticleBindGroupLayout(pub BindGroupLayout);

// one bind group per buffer orientation: [0] reads A writes B, [1] reads B writes A
#[derive(Resource, Clone, ExtractResource)]
pub struct ParticleBindGroups(pub [BindGroup; 2]);

/// Which buffer is the source generation. Lives in the render world and
/// advances only after a completed update dispatch; while the compute
/// pipeline is still compiling the label holds on the seeded buffer, so the
/// seed data is never overwritten by a read of the unwritten destination.
#[derive(Resource, Clone, Copy)]
pub struct SourceIndex(pub usize);

impl SourceIndex {
    pub fn advance(&mut self, dispatched: bool) {
        if dispatched {
            self.0 = 1 - self.0;
        }
    }
}

#[derive(Resource)]
pub struct ParticleBuffers {
    pub buffers: [Buffer; 2],
    pub params: Buffer,
    pub textures: [TextureView; 2],
    pub num_particles: u32,
}

// Render-world copy
#[derive(Resource, Clone, ExtractResource)]
pub struct ExtractedParticleBuffers {
    pub buffers: [Buffer; 2],
    pub params: Buffer,
    pub textures: [TextureView; 2],
    pub num_particles: u32,
}

// =====================================================================

// ========================== systems ==================================

// Startup systems that run only once

fn init_gpu_buffers(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    render_queue: Res<RenderQueue>,
    sim: Res<ParticleSim>,
) {
    let particle_buffers = ParticleBuffers::new(&render_device, &render_queue, &sim);
    commands.insert_resource(particle_buffers);
}

fn init_particle_bind_group_layout(mut commands: Commands, render_device: Res<RenderDevice>) {
    // Rgba32Float is not filterable; the shader uses textureLoad, no sampler
    let texture_entry = |binding| BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: false },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };

    let layout = render_device.create_bind_group_layout(
        Some("particle_bind_group_layout"),
        &[
            // binding 0: source generation (read-only)
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // binding 1: destination generation (read-write)
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // binding 2: SimParams uniform
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // bindings 3 and 4: the two blend source images (1x1 placeholders
            // when the variant has none)
            texture_entry(3),
            texture_entry(4),
        ],
    );
    commands.insert_resource(ParticleBindGroupLayout(layout));
}

// Update systems that run per frame

fn queue_sim_params(
    sim: Res<ParticleSim>,
    input: Res<FrameInput>,
    particle_buffers: Option<Res<ParticleBuffers>>, // so that the CPU demo still works
    render_queue: Res<RenderQueue>,
) {
    let Some(particle_buffers) = particle_buffers else {
        return;
    };

    let params =
        crate::gpu::ffi::SimParams::snapshot(&sim, &input, particle_buffers.num_particles);
    render_queue.write_buffer(&particle_buffers.params, 0, bytemuck::bytes_of(&params));
}

// One label swap per completed update dispatch. Runs after the graph has
// executed; the gate mirrors the update node's own bail-outs, so a frame the
// node skipped (pipeline still compiling, nothing extracted) leaves the
// label where it was.
fn flip_source_index(
    source: Option<ResMut<SourceIndex>>,
    pipeline: Option<Res<UpdatePipeline>>,
    bind_groups: Option<Res<ParticleBindGroups>>,
    extracted: Option<Res<ExtractedParticleBuffers>>,
) {
    let Some(mut source) = source else {
        return;
    };
    let dispatched = pipeline.is_some()
        && bind_groups.is_some()
        && extracted.map(|e| e.num_particles > 0).unwrap_or(false);
    source.advance(dispatched);
}

// Extract systems that send from App to Render

fn extract_particle_buffers(
    mut commands: Commands,
    particle_buffers: Extract<Option<Res<ParticleBuffers>>>,
) {
    let Some(particle_buffers) = particle_buffers.as_ref() else {
        return;
    };
    commands.insert_resource(ExtractedParticleBuffers {
        buffers: particle_buffers.buffers.clone(),
        params: particle_buffers.params.clone(),
        textures: particle_buffers.textures.clone(),
        num_particles: particle_buffers.num_particles,
    });
}

fn extract_bind_group_layout(
    mut commands: Commands,
    layout: Extract<Res<ParticleBindGroupLayout>>,
) {
    commands.insert_resource(ParticleBindGroupLayout(layout.0.clone()));
}

// Prepare systems in the Render world

fn prepare_particle_bind_groups(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    layout: Res<ParticleBindGroupLayout>,
    extracted: Res<ExtractedParticleBuffers>,
) {
    let bind_group = |src: usize, dst: usize| {
        render_device.create_bind_group(
            Some("particle_update_bind_group"),
            &layout.0,
            &[
                BindGroupEntry {
                    binding: 0,
                    resource: extracted.buffers[src].as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: extracted.buffers[dst].as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: extracted.params.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 3,
                    resource: BindingResource::TextureView(&extracted.textures[0]),
                },
                BindGroupEntry {
                    binding: 4,
                    resource: BindingResource::TextureView(&extracted.textures[1]),
                },
            ],
        )
    };
    commands.insert_resource(ParticleBindGroups([bind_group(0, 1), bind_group(1, 0)]));
}

// Implementations

impl ParticleBuffers {
    pub fn new(render_device: &RenderDevice, render_queue: &RenderQueue, sim: &ParticleSim) -> Self {
        // converting the cpu particles to the gpu layout
        let mut gpu_particles = Vec::with_capacity(sim.len());
        for particle in sim.current() {
            gpu_particles.push(crate::gpu::ffi::GpuParticle::from(particle));
        }

        let (img_a, img_b) = match sim.textures() {
            Some((a, b)) => (Some(a), Some(b)),
            None => (None, None),
        };
        let tex_a = upload_source_image(render_device, render_queue, "blend_texture_a", img_a);
        let tex_b = upload_source_image(render_device, render_queue, "blend_texture_b", img_b);

        // source buffer with the seed data; written from the CPU exactly once
        let source = render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("particle_buffer_a"),
            contents: bytemuck::cast_slice(&gpu_particles),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        });

        // destination stays unwritten until the first update dispatch
        let destination = render_device.create_buffer(&BufferDescriptor {
            label: Some("particle_buffer_b"),
            size: (gpu_particles.len() * std::mem::size_of::<crate::gpu::ffi::GpuParticle>())
                as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let params = render_device.create_buffer(&BufferDescriptor {
            label: Some("sim_params"),
            size: std::mem::size_of::<crate::gpu::ffi::SimParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            buffers: [source, destination],
            params,
            textures: [tex_a, tex_b],
            num_particles: gpu_particles.len() as u32,
        }
    }
}

// Device copy of a blend source image; a 1x1 zero texture keeps the bind
// group layout satisfied for variants without textures.
fn upload_source_image(
    render_device: &RenderDevice,
    render_queue: &RenderQueue,
    label: &str,
    image: Option<&SourceImage>,
) -> TextureView {
    let (width, height, data) = match image {
        Some(img) => {
            let mut data = Vec::with_capacity(img.pixels().len() * 4);
            for p in img.pixels() {
                data.extend_from_slice(&p.to_array());
            }
            (img.width as u32, img.height as u32, data)
        }
        None => (1, 1, vec![0.0_f32; 4]),
    };

    let texture = render_device.create_texture(&TextureDescriptor {
        label: Some(label),
        size: Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba32Float,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    render_queue.write_texture(
        texture.as_image_copy(),
        bytemuck::cast_slice(&data),
        TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(16 * width),
            rows_per_image: Some(height),
        },
        Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&TextureViewDescriptor::default())
}

// =====================================================================

// Plugin

pub struct GpuVerletPlugin;

impl Plugin for GpuVerletPlugin {
    fn build(&self, app: &mut App) {
        // App
        app.init_resource::<FrameInput>()
            .init_resource::<Attenuation>()
            .init_resource::<PointSize>()
            .init_resource::<BlurSettings>()
            .add_systems(
                Startup,
                (
                    init_gpu_buffers,
                    init_particle_bind_group_layout,
                    init_draw_params,
                    init_blur_params,
                ),
            )
            .add_systems(Update, (queue_sim_params, update_draw_params, queue_blur_params));

        // Render
        let render_app = app.sub_app_mut(RenderApp);
        render_app
            // seeded buffer A is the source until the first dispatch completes
            .insert_resource(SourceIndex(0))
            .add_systems(
                ExtractSchedule,
                (
                    extract_particle_buffers,
                    extract_bind_group_layout,
                    extract_draw_params_buffer,
                    extract_blur,
                ),
            )
            .add_systems(
                Render,
                (
                    init_draw_bgl.in_set(RenderSet::Prepare),
                    init_blur_targets.in_set(RenderSet::Prepare),
                    prepare_particle_bind_groups.in_set(RenderSet::Prepare),
                    prepare_update_pipeline.in_set(RenderSet::Prepare),
                    prepare_draw_pipeline.in_set(RenderSet::Prepare),
                    prepare_blur_pipelines.in_set(RenderSet::Prepare),
                    prepare_draw_bind_groups.in_set(RenderSet::PrepareBindGroups),
                    prepare_blur_bind_groups.in_set(RenderSet::PrepareBindGroups),
                    flip_source_index.in_set(RenderSet::Cleanup),
                ),
            );

        add_particle_nodes_to_graph(render_app);
    }
}

#[cfg(test)]
mod tests {
    use super::SourceIndex;

    #[test]
    fn source_label_holds_until_a_dispatch_lands() {
        let mut source = SourceIndex(0);

        // warm-up frames with no update executed must not move the label
        for _ in 0..5 {
            source.advance(false);
        }
        assert_eq!(source.0, 0);

        // one completed dispatch, one swap
        source.advance(true);
        assert_eq!(source.0, 1);
        source.advance(true);
        assert_eq!(source.0, 0);

        // a skipped frame between dispatches still holds
        source.advance(false);
        assert_eq!(source.0, 0);
    }
}
