use bevy::asset::AssetServer;
use bevy::prelude::*;
use bevy::render::render_resource::TextureFormat;
use bevy::render::render_resource::{
    CachedPipelineState, CachedRenderPipelineId, ColorTargetState, ColorWrites, FragmentState,
    MultisampleState, PipelineCache, PrimitiveState, RenderPipelineDescriptor, Shader,
    VertexAttribute, VertexBufferLayout, VertexFormat, VertexState,
};

use super::draw_buffers::DrawBindGroupLayout;

/// Ready render pipelines for the point pass: one targeting the camera view
/// (msaa) and one targeting the off-screen scene texture the blur samples.
#[derive(Resource)]
pub struct DrawPipeline {
    pub direct: CachedRenderPipelineId,
    pub offscreen: CachedRenderPipelineId,
}

fn point_pipeline_desc(
    label: &'static str,
    shader: Handle<Shader>,
    bgl: &DrawBindGroupLayout,
    format: TextureFormat,
    samples: u32,
) -> RenderPipelineDescriptor {
    let vbuf_layout = VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as u64,
        step_mode: bevy::render::render_resource::VertexStepMode::Vertex,
        attributes: vec![VertexAttribute {
            format: VertexFormat::Float32x2,
            offset: 0,
            shader_location: 0,
        }],
    };

    RenderPipelineDescriptor {
        label: Some(label.into()),
        layout: vec![bgl.0.clone()],
        vertex: VertexState {
            shader: shader.clone(),
            entry_point: "vs_main".into(),
            shader_defs: vec![],
            buffers: vec![vbuf_layout],
        },
        fragment: Some(FragmentState {
            shader,
            entry_point: "fs_main".into(),
            shader_defs: vec![],
            targets: vec![Some(ColorTargetState {
                format,
                blend: Some(bevy::render::render_resource::BlendState::ALPHA_BLENDING),
                write_mask: ColorWrites::ALL,
            })],
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState {
            count: samples,
            ..Default::default()
        },
        push_constant_ranges: vec![],
        zero_initialize_workgroup_memory: false,
    }
}

pub fn prepare_draw_pipeline(
    mut commands: Commands,
    cache: Res<PipelineCache>,
    bgl: Option<Res<DrawBindGroupLayout>>,
    assets: Res<AssetServer>,
    mut cached: Local<Option<(CachedRenderPipelineId, CachedRenderPipelineId)>>,
) {
    let Some(bgl) = bgl else {
        return;
    };

    if cached.is_none() {
        let shader: Handle<Shader> = assets.load("shaders/particles_draw.wgsl");
        let direct = cache.queue_render_pipeline(point_pipeline_desc(
            "particles_draw_pipeline",
            shader.clone(),
            &bgl,
            TextureFormat::Rgba8UnormSrgb,
            4, // match the main RenderPass sample count
        ));
        let offscreen = cache.queue_render_pipeline(point_pipeline_desc(
            "particles_draw_offscreen_pipeline",
            shader,
            &bgl,
            TextureFormat::Rgba8UnormSrgb,
            1,
        ));
        *cached = Some((direct, offscreen));
        return;
    }

    if let Some((direct, offscreen)) = *cached {
        match (
            cache.get_render_pipeline_state(direct),
            cache.get_render_pipeline_state(offscreen),
        ) {
            (&CachedPipelineState::Ok(_), &CachedPipelineState::Ok(_)) => {
                commands.insert_resource(DrawPipeline { direct, offscreen });
            }
            (&CachedPipelineState::Err(ref err), _) | (_, &CachedPipelineState::Err(ref err)) => {
                error!("draw_pipeline ERROR: {err:?}");
            }
            _ => {} // still compiling
        }
    }
}
