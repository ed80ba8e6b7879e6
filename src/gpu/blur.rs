//! Two-pass separable blur composited additively over the sharp point pass.
//!
//! The point pass renders into a fixed-size off-screen scene target, a
//! horizontal then a vertical pass smear it by one texel scaled with the
//! pointer-driven attenuation, and the composite draws scene + blurred back
//! to the camera view.

use bevy::prelude::*;
use bevy::render::Extract;
use bevy::render::extract_resource::ExtractResource;
use bevy::render::render_graph::{NodeRunError, RenderGraphContext, RenderLabel, ViewNode};
use bevy::render::render_resource::{
    AddressMode, BindGroup, BindGroupEntry, BindGroupLayout, BindGroupLayoutEntry, BindingResource,
    BindingType, BlendComponent, BlendFactor, BlendOperation, BlendState, Buffer,
    BufferBindingType, BufferDescriptor, BufferUsages, CachedPipelineState,
    CachedRenderPipelineId, ColorTargetState, ColorWrites, Extent3d, FilterMode, FragmentState,
    LoadOp, MultisampleState, Operations, PipelineCache, PrimitiveState,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipelineDescriptor, Sampler,
    SamplerBindingType, SamplerDescriptor, Shader, ShaderStages, StoreOp, Texture,
    TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType, TextureUsages,
    TextureView, TextureViewDescriptor, TextureViewDimension, VertexState,
};
use bevy::render::renderer::{RenderContext, RenderDevice, RenderQueue};
use bevy::render::view::ViewTarget;

use crate::cpu::verlet::{Attenuation, FrameInput};
use crate::gpu::ffi::BlurParams;

pub const FBO_WIDTH: u32 = 1440;
pub const FBO_HEIGHT: u32 = 880;

const TARGET_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

/// Opt-in per variant; only the image demo turns the blur on.
#[derive(Resource, Clone, Copy, Default, ExtractResource)]
pub struct BlurSettings {
    pub enabled: bool,
}

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct BlurPassLabel;

// ==================== resources ======================================

// App-world uniform buffers, one per pass direction.
#[derive(Resource)]
pub struct BlurParamsBuffers {
    pub horizontal: Buffer,
    pub vertical: Buffer,
}

#[derive(Resource, Clone, ExtractResource)]
pub struct ExtractedBlurParams {
    pub horizontal: Buffer,
    pub vertical: Buffer,
}

/// Off-screen color targets: sharp scene, half-blurred, fully blurred.
#[derive(Resource)]
pub struct BlurTargets {
    pub scene: Texture,
    pub scene_view: TextureView,
    pub blur_h: Texture,
    pub blur_h_view: TextureView,
    pub blur_v: Texture,
    pub blur_v_view: TextureView,
    pub sampler: Sampler,
}

#[derive(Resource, Clone)]
pub struct BlurBindGroupLayout(pub BindGroupLayout);

#[derive(Resource, Clone)]
pub struct CompositeBindGroupLayout(pub BindGroupLayout);

#[derive(Resource)]
pub struct BlurBindGroups {
    pub horizontal: BindGroup,  // samples scene
    pub vertical: BindGroup,    // samples blur_h
    pub composite_scene: BindGroup,
    pub composite_blur: BindGroup, // samples blur_v
}

#[derive(Resource)]
pub struct BlurPipelines {
    pub blur: CachedRenderPipelineId,
    pub composite_base: CachedRenderPipelineId,
    pub composite_add: CachedRenderPipelineId,
}

// ========================== systems ==================================

pub fn init_blur_params(mut commands: Commands, rd: Res<RenderDevice>) {
    let make = |label| {
        rd.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<BlurParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    };
    commands.insert_resource(BlurParamsBuffers {
        horizontal: make("blur_params_h"),
        vertical: make("blur_params_v"),
    });
}

/// Advance the attenuation state machine from the pointer and queue both
/// pass uniforms: a 1-texel offset scaled by the current attenuation.
pub fn queue_blur_params(
    mut attenuation: ResMut<Attenuation>,
    input: Res<FrameInput>,
    buffers: Option<Res<BlurParamsBuffers>>,
    settings: Res<BlurSettings>,
    rq: Res<RenderQueue>,
) {
    if !settings.enabled {
        return;
    }
    let Some(buffers) = buffers else {
        return;
    };

    let value = attenuation.advance(input.pointer_down);

    let h = BlurParams {
        sample_offset: [1.0 / FBO_WIDTH as f32, 0.0],
        attenuation: value,
        _pad: 0.0,
    };
    let v = BlurParams {
        sample_offset: [0.0, 1.0 / FBO_HEIGHT as f32],
        attenuation: value,
        _pad: 0.0,
    };
    rq.write_buffer(&buffers.horizontal, 0, bytemuck::bytes_of(&h));
    rq.write_buffer(&buffers.vertical, 0, bytemuck::bytes_of(&v));
}

pub fn extract_blur(
    mut commands: Commands,
    settings: Extract<Res<BlurSettings>>,
    buffers: Extract<Option<Res<BlurParamsBuffers>>>,
) {
    commands.insert_resource(**settings);
    if let Some(buffers) = buffers.as_ref() {
        commands.insert_resource(ExtractedBlurParams {
            horizontal: buffers.horizontal.clone(),
            vertical: buffers.vertical.clone(),
        });
    }
}

/// Create the fixed-size off-screen targets and the two layouts. Runs every
/// Prepare but only does work once.
pub fn init_blur_targets(
    mut commands: Commands,
    rd: Res<RenderDevice>,
    existing: Option<Res<BlurTargets>>,
    settings: Option<Res<BlurSettings>>,
) {
    if existing.is_some() {
        return;
    }
    if !settings.map(|s| s.enabled).unwrap_or(false) {
        return;
    }

    let make_target = |label| {
        let tex = rd.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: FBO_WIDTH,
                height: FBO_HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = tex.create_view(&TextureViewDescriptor::default());
        (tex, view)
    };

    let (scene, scene_view) = make_target("blur_scene_target");
    let (blur_h, blur_h_view) = make_target("blur_h_target");
    let (blur_v, blur_v_view) = make_target("blur_v_target");

    let sampler = rd.create_sampler(&SamplerDescriptor {
        label: Some("blur_sampler"),
        address_mode_u: AddressMode::ClampToEdge,
        address_mode_v: AddressMode::ClampToEdge,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        ..Default::default()
    });

    let texture_entry = |binding| BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    let sampler_entry = |binding| BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Sampler(SamplerBindingType::Filtering),
        count: None,
    };

    let blur_bgl = rd.create_bind_group_layout(
        Some("blur_bgl"),
        &[
            texture_entry(0),
            sampler_entry(1),
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    );
    let composite_bgl = rd.create_bind_group_layout(
        Some("composite_bgl"),
        &[texture_entry(0), sampler_entry(1)],
    );

    commands.insert_resource(BlurTargets {
        scene,
        scene_view,
        blur_h,
        blur_h_view,
        blur_v,
        blur_v_view,
        sampler,
    });
    commands.insert_resource(BlurBindGroupLayout(blur_bgl));
    commands.insert_resource(CompositeBindGroupLayout(composite_bgl));
}

fn fullscreen_pipeline_desc(
    label: &'static str,
    shader: Handle<Shader>,
    layout: BindGroupLayout,
    entry_point: &'static str,
    blend: Option<BlendState>,
    samples: u32,
) -> RenderPipelineDescriptor {
    RenderPipelineDescriptor {
        label: Some(label.into()),
        layout: vec![layout],
        vertex: VertexState {
            shader: shader.clone(),
            entry_point: "vs_fullscreen".into(),
            shader_defs: vec![],
            buffers: vec![],
        },
        fragment: Some(FragmentState {
            shader,
            entry_point: entry_point.into(),
            shader_defs: vec![],
            targets: vec![Some(ColorTargetState {
                format: TARGET_FORMAT,
                blend,
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

const ADDITIVE: BlendState = BlendState {
    color: BlendComponent {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::One,
        operation: BlendOperation::Add,
    },
    alpha: BlendComponent {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::One,
        operation: BlendOperation::Add,
    },
};

pub fn prepare_blur_pipelines(
    mut commands: Commands,
    cache: Res<PipelineCache>,
    blur_bgl: Option<Res<BlurBindGroupLayout>>,
    composite_bgl: Option<Res<CompositeBindGroupLayout>>,
    assets: Res<AssetServer>,
    mut cached: Local<Option<(CachedRenderPipelineId, CachedRenderPipelineId, CachedRenderPipelineId)>>,
) {
    let (Some(blur_bgl), Some(composite_bgl)) = (blur_bgl, composite_bgl) else {
        return;
    };

    if cached.is_none() {
        let blur_shader: Handle<Shader> = assets.load("shaders/blur.wgsl");
        let composite_shader: Handle<Shader> = assets.load("shaders/composite.wgsl");

        let blur = cache.queue_render_pipeline(fullscreen_pipeline_desc(
            "blur_pipeline",
            blur_shader,
            blur_bgl.0.clone(),
            "fs_blur",
            None,
            1,
        ));
        let composite_base = cache.queue_render_pipeline(fullscreen_pipeline_desc(
            "composite_base_pipeline",
            composite_shader.clone(),
            composite_bgl.0.clone(),
            "fs_composite",
            None,
            4, // camera view sample count
        ));
        let composite_add = cache.queue_render_pipeline(fullscreen_pipeline_desc(
            "composite_add_pipeline",
            composite_shader,
            composite_bgl.0.clone(),
            "fs_composite",
            Some(ADDITIVE),
            4,
        ));
        *cached = Some((blur, composite_base, composite_add));
        return;
    }

    if let Some((blur, composite_base, composite_add)) = *cached {
        let all_ok = [blur, composite_base, composite_add]
            .iter()
            .all(|id| matches!(cache.get_render_pipeline_state(*id), &CachedPipelineState::Ok(_)));
        if all_ok {
            commands.insert_resource(BlurPipelines {
                blur,
                composite_base,
                composite_add,
            });
        } else {
            for id in [blur, composite_base, composite_add] {
                if let &CachedPipelineState::Err(ref err) = cache.get_render_pipeline_state(id) {
                    error!("blur pipeline ERROR: {err:?}");
                }
            }
        }
    }
}

pub fn prepare_blur_bind_groups(
    mut commands: Commands,
    rd: Res<RenderDevice>,
    targets: Option<Res<BlurTargets>>,
    blur_bgl: Option<Res<BlurBindGroupLayout>>,
    composite_bgl: Option<Res<CompositeBindGroupLayout>>,
    params: Option<Res<ExtractedBlurParams>>,
) {
    let (Some(targets), Some(blur_bgl), Some(composite_bgl), Some(params)) =
        (targets, blur_bgl, composite_bgl, params)
    else {
        return;
    };

    let blur_bg = |view: &TextureView, buffer: &Buffer| {
        rd.create_bind_group(
            Some("blur_bg"),
            &blur_bgl.0,
            &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&targets.sampler),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: buffer.as_entire_binding(),
                },
            ],
        )
    };
    let composite_bg = |view: &TextureView| {
        rd.create_bind_group(
            Some("composite_bg"),
            &composite_bgl.0,
            &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&targets.sampler),
                },
            ],
        )
    };

    commands.insert_resource(BlurBindGroups {
        horizontal: blur_bg(&targets.scene_view, &params.horizontal),
        vertical: blur_bg(&targets.blur_h_view, &params.vertical),
        composite_scene: composite_bg(&targets.scene_view),
        composite_blur: composite_bg(&targets.blur_v_view),
    });
}

// ========================== node =====================================

#[derive(Default)]
pub struct BlurNode;

impl ViewNode for BlurNode {
    type ViewQuery = (&'static ViewTarget,);

    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        rcx: &mut RenderContext,
        (view_target,): <Self::ViewQuery as bevy::ecs::query::QueryData>::Item<'_>,
        world: &World,
    ) -> Result<(), NodeRunError> {
        let enabled = world
            .get_resource::<BlurSettings>()
            .map(|s| s.enabled)
            .unwrap_or(false);
        if !enabled {
            return Ok(());
        }

        let Some(targets) = world.get_resource::<BlurTargets>() else {
            return Ok(());
        };
        let Some(pipelines) = world.get_resource::<BlurPipelines>() else {
            return Ok(());
        };
        let Some(bgs) = world.get_resource::<BlurBindGroups>() else {
            return Ok(());
        };
        let cache = world.resource::<PipelineCache>();
        let (Some(blur), Some(base), Some(add)) = (
            cache.get_render_pipeline(pipelines.blur),
            cache.get_render_pipeline(pipelines.composite_base),
            cache.get_render_pipeline(pipelines.composite_add),
        ) else {
            return Ok(());
        };

        let blur_pass = |rcx: &mut RenderContext, target: &TextureView, bg: &BindGroup| {
            let mut pass = rcx.begin_tracked_render_pass(RenderPassDescriptor {
                label: Some("BlurPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(LinearRgba::BLACK.into()),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_render_pipeline(blur);
            pass.set_bind_group(0, bg, &[]);
            pass.draw(0..3, 0..1);
        };

        // horizontal into blur_h, vertical into blur_v
        blur_pass(rcx, &targets.blur_h_view, &bgs.horizontal);
        blur_pass(rcx, &targets.blur_v_view, &bgs.vertical);

        // sharp scene first, then the twice-blurred target additively on top
        let mut pass = rcx.begin_tracked_render_pass(RenderPassDescriptor {
            label: Some("CompositePass"),
            color_attachments: &[Some(view_target.get_color_attachment())],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_render_pipeline(base);
        pass.set_bind_group(0, &bgs.composite_scene, &[]);
        pass.draw(0..3, 0..1);

        pass.set_render_pipeline(add);
        pass.set_bind_group(0, &bgs.composite_blur, &[]);
        pass.draw(0..3, 0..1);

        Ok(())
    }
}
