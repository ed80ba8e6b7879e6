use bevy::prelude::*;
use bevy::render::render_graph::{NodeRunError, RenderGraphContext, RenderLabel, ViewNode};
use bevy::render::render_resource::{
    LoadOp, Operations, RenderPassColorAttachment, RenderPassDescriptor, StoreOp,
};
use bevy::render::renderer::RenderContext;
use bevy::render::view::ViewTarget;

use crate::gpu::blur::{BlurSettings, BlurTargets};
use crate::gpu::buffers::{ExtractedParticleBuffers, SourceIndex};
use crate::gpu::draw_buffers::{DrawBindGroups, QuadVertexBuffer};
use crate::gpu::draw_pipeline::DrawPipeline;
use crate::gpu::pipeline::UpdatePipeline;

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct ParticlesDrawPassLabel;

#[derive(Default)]
pub struct ParticlesDrawNode;

impl ViewNode for ParticlesDrawNode {
    type ViewQuery = (&'static ViewTarget,);

    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        rcx: &mut RenderContext,
        (view_target,): <Self::ViewQuery as bevy::ecs::query::QueryData>::Item<'_>,
        world: &World,
    ) -> Result<(), NodeRunError> {
        let Some(dp) = world.get_resource::<DrawPipeline>() else {
            return Ok(());
        };
        let cache = world.resource::<bevy::render::render_resource::PipelineCache>();

        let Some(bgs) = world.get_resource::<DrawBindGroups>() else {
            return Ok(());
        };
        let Some(vb) = world.get_resource::<QuadVertexBuffer>() else {
            return Ok(());
        };
        let Some(particles) = world.get_resource::<ExtractedParticleBuffers>() else {
            return Ok(());
        };
        if particles.num_particles == 0 {
            return Ok(());
        }
        let Some(source) = world.get_resource::<SourceIndex>() else {
            return Ok(());
        };

        // once the update pass runs it reads `source` and writes the other
        // buffer, so draw the freshly written generation; until the compute
        // pipeline is ready nothing was written and the seed is the only
        // valid data
        let current = if world.get_resource::<UpdatePipeline>().is_some() {
            1 - source.0
        } else {
            source.0
        };

        let blur_on = world
            .get_resource::<BlurSettings>()
            .map(|s| s.enabled)
            .unwrap_or(false);
        let blur_targets = world.get_resource::<BlurTargets>().filter(|_| blur_on);

        let mut pass = if let Some(targets) = blur_targets {
            let Some(pipeline) = cache.get_render_pipeline(dp.offscreen) else {
                return Ok(());
            };
            // scene goes to the off-screen target; blur + composite follow
            let mut pass = rcx.begin_tracked_render_pass(RenderPassDescriptor {
                label: Some("ParticlesScenePass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &targets.scene_view,
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
            pass.set_render_pipeline(pipeline);
            pass
        } else {
            let Some(pipeline) = cache.get_render_pipeline(dp.direct) else {
                return Ok(());
            };
            let mut pass = rcx.begin_tracked_render_pass(RenderPassDescriptor {
                label: Some("ParticlesDrawPass"),
                color_attachments: &[Some(view_target.get_color_attachment())],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_render_pipeline(pipeline);
            pass
        };

        pass.set_bind_group(0, &bgs.0[current], &[]);
        pass.set_vertex_buffer(0, vb.buffer.slice(..));
        pass.draw(0..6, 0..particles.num_particles);
        Ok(())
    }
}
