use bevy::prelude::*;
use bevy::render::render_resource::*;
use bevy::render::renderer::{RenderDevice, RenderQueue};

use bevy::render::Extract;
use bevy::render::extract_resource::ExtractResource;

use crate::cpu::verlet::ParticleSim;
use crate::gpu::buffers::ExtractedParticleBuffers;
use crate::gpu::ffi::DrawParams;
use crate::PointSize;

// ---------------- Types ----------------

#[derive(Resource)]
pub struct DrawParamsBuffer {
    pub buffer: Buffer,
}

/// World-space extent of the particle field, taken from the seed homes.
/// The projection frames this box; homes never move, so computed once.
#[derive(Resource, Clone, Copy)]
pub struct SimBounds {
    pub width: f32,
    pub height: f32,
}

#[derive(Resource, Clone)]
pub struct DrawBindGroupLayout(pub BindGroupLayout);

// one bind group per particle buffer; the draw pass picks the freshly
// written generation
#[derive(Resource)]
pub struct DrawBindGroups(pub [BindGroup; 2]);

#[derive(Resource)]
pub struct QuadVertexBuffer {
    pub buffer: Buffer,
}

#[derive(Resource, Clone, ExtractResource)]
pub struct ExtractedDrawParamsBuffer {
    pub buffer: Buffer,
}

const QUAD_VERTS: &[[f32; 2]] = &[
    [-0.5, -0.5],
    [0.5, -0.5],
    [0.5, 0.5],
    [-0.5, -0.5],
    [0.5, 0.5],
    [-0.5, 0.5],
];

// ---------------- Systems (App world) ----------------

pub fn init_draw_params(mut commands: Commands, rd: Res<RenderDevice>, sim: Res<ParticleSim>) {
    let mut max = Vec2::ZERO;
    for p in sim.current() {
        max.x = max.x.max(p.home.x);
        max.y = max.y.max(p.home.y);
    }
    let bounds = SimBounds {
        width: max.x + 1.0,
        height: max.y + 1.0,
    };

    let dp = DrawParams {
        view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
        point_size: 1.0,
        _pad: [0.0; 3],
    };
    let buffer = rd.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("draw_params_uniform"),
        contents: bytemuck::bytes_of(&dp),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });
    commands.insert_resource(DrawParamsBuffer { buffer });
    commands.insert_resource(bounds);
}

// Update the UBO each frame (cheap); picks up point-size keystrokes.
pub fn update_draw_params(
    rq: Res<RenderQueue>,
    dp: Option<Res<DrawParamsBuffer>>,
    bounds: Option<Res<SimBounds>>,
    point_size: Res<PointSize>,
) {
    let (Some(dp), Some(bounds)) = (dp, bounds) else {
        return;
    };

    let view_proj =
        glam::Mat4::orthographic_rh(0.0, bounds.width, 0.0, bounds.height, -1000.0, 1000.0);

    let dp_cpu = DrawParams {
        view_proj: view_proj.to_cols_array_2d(),
        point_size: point_size.value,
        _pad: [0.0; 3],
    };
    rq.write_buffer(&dp.buffer, 0, bytemuck::bytes_of(&dp_cpu));
}

pub fn extract_draw_params_buffer(
    mut commands: Commands,
    dp: Extract<Option<Res<DrawParamsBuffer>>>,
) {
    let Some(dp) = dp.as_ref() else {
        return;
    };
    commands.insert_resource(ExtractedDrawParamsBuffer {
        buffer: dp.buffer.clone(),
    });
}

// ---------------- Systems (Render world) ----------------

// Layout: 0 = particles SSBO fetched in the vertex stage, 1 = draw params UBO
pub fn init_draw_bgl(
    mut commands: Commands,
    rd: Res<RenderDevice>,
    existing: Option<Res<DrawBindGroupLayout>>,
) {
    if existing.is_some() {
        return;
    }

    let bgl = rd.create_bind_group_layout(
        Some("draw_bgl"),
        &[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    );
    commands.insert_resource(DrawBindGroupLayout(bgl));

    // small quad expanded per instance in the vertex shader
    let vb = rd.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("instanced_quad_vb"),
        contents: bytemuck::cast_slice(QUAD_VERTS),
        usage: BufferUsages::VERTEX,
    });
    commands.insert_resource(QuadVertexBuffer { buffer: vb });
}

pub fn prepare_draw_bind_groups(
    mut commands: Commands,
    rd: Res<RenderDevice>,
    layout: Option<Res<DrawBindGroupLayout>>,
    particles: Option<Res<ExtractedParticleBuffers>>,
    dp: Option<Res<ExtractedDrawParamsBuffer>>,
) {
    let (Some(layout), Some(particles), Some(dp)) = (layout, particles, dp) else {
        return;
    };

    let bind_group = |i: usize| {
        rd.create_bind_group(
            Some("draw_bg"),
            &layout.0,
            &[
                BindGroupEntry {
                    binding: 0,
                    resource: particles.buffers[i].as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: dp.buffer.as_entire_binding(),
                },
            ],
        )
    };
    commands.insert_resource(DrawBindGroups([bind_group(0), bind_group(1)]));
}
