use std::borrow::Cow;

use bevy::core_pipeline::core_2d::graph::{Core2d, Node2d};
use bevy::prelude::*;
use bevy::render::graph::CameraDriverLabel;
use bevy::render::render_graph::{
    Node, NodeRunError, RenderGraph, RenderGraphApp, RenderGraphContext, RenderLabel,
    ViewNodeRunner,
};
use bevy::render::render_resource::{
    CachedComputePipelineId, ComputePassDescriptor, ComputePipeline, ComputePipelineDescriptor,
    PipelineCache, PushConstantRange, ShaderDefVal,
};
use bevy::render::renderer::RenderContext;

use crate::gpu::blur::{BlurNode, BlurPassLabel};
use crate::gpu::buffers::{
    ExtractedParticleBuffers, ParticleBindGroupLayout, ParticleBindGroups, SourceIndex,
};
use crate::gpu::draw_pass::{ParticlesDrawNode, ParticlesDrawPassLabel};

#[derive(Resource)]
pub struct UpdatePipeline(pub ComputePipeline);

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct VerletUpdateLabel;

#[derive(Default)]
struct VerletUpdateNode;

impl Node for VerletUpdateNode {
    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
        world: &World,
    ) -> Result<(), NodeRunError> {
        // bail out until every upstream resource exists
        let Some(pipeline) = world.get_resource::<UpdatePipeline>() else { return Ok(()); };
        let Some(bind_groups) = world.get_resource::<ParticleBindGroups>() else { return Ok(()); };
        let Some(extracted) = world.get_resource::<ExtractedParticleBuffers>() else { return Ok(()); };
        let Some(source) = world.get_resource::<SourceIndex>() else { return Ok(()); };

        if extracted.num_particles == 0 {
            return Ok(());
        }

        // one invocation per particle, reading the source generation and
        // writing the destination at the same index
        let workgroups = (extracted.num_particles + 255) / 256;

        let mut pass = render_context
            .command_encoder()
            .begin_compute_pass(&ComputePassDescriptor::default());

        pass.set_pipeline(&pipeline.0);
        pass.set_bind_group(0, &bind_groups.0[source.0], &[]);
        pass.dispatch_workgroups(workgroups, 1, 1);

        Ok(())
    }
}

pub fn prepare_update_pipeline(
    mut commands: Commands,
    pipeline_cache: Res<PipelineCache>,
    layout: Res<ParticleBindGroupLayout>,
    mut pipeline_id: Local<Option<CachedComputePipelineId>>,
    assets: Res<AssetServer>,
) {
    if pipeline_id.is_none() {
        let shader: Handle<Shader> = assets.load("shaders/verlet_update.wgsl");
        let desc = ComputePipelineDescriptor {
            label: Some("verlet_update_pipeline".into()),
            layout: vec![layout.0.clone()],
            push_constant_ranges: Vec::<PushConstantRange>::new(),
            shader,
            shader_defs: Vec::<ShaderDefVal>::new(),
            entry_point: Cow::from("main"),
            zero_initialize_workgroup_memory: false,
        };
        *pipeline_id = Some(pipeline_cache.queue_compute_pipeline(desc));
        return; // waits for compilation
    }

    if let Some(id) = *pipeline_id {
        if let Some(pipeline) = pipeline_cache.get_compute_pipeline(id) {
            commands.insert_resource(UpdatePipeline(pipeline.clone()));
        }
    }
}

/// Update pass first, then the camera-driven draw graph: that edge is the
/// barrier making destination writes visible before the render stage reads.
pub fn add_particle_nodes_to_graph(render_app: &mut bevy::app::SubApp) {
    {
        let mut graph = render_app.world_mut().resource_mut::<RenderGraph>();
        graph.add_node(VerletUpdateLabel, VerletUpdateNode::default());
        graph.add_node_edge(VerletUpdateLabel, CameraDriverLabel);
    }

    render_app
        .add_render_graph_node::<ViewNodeRunner<ParticlesDrawNode>>(Core2d, ParticlesDrawPassLabel)
        .add_render_graph_node::<ViewNodeRunner<BlurNode>>(Core2d, BlurPassLabel)
        .add_render_graph_edges(
            Core2d,
            (
                Node2d::MainTransparentPass,
                ParticlesDrawPassLabel,
                BlurPassLabel,
                Node2d::EndMainPass,
            ),
        );
}
