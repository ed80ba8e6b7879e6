use bytemuck::{Pod, Zeroable};

use crate::cpu::verlet::{FrameInput, Particle, ParticleSim};

// not using glam so the layouts stay WGSL compatible; vec3 fields carry an
// explicit fourth float to satisfy 16-byte alignment

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuParticle {
    pub pos: [f32; 3],
    pub damping: f32,
    pub ppos: [f32; 3],
    pub _pad0: f32,
    pub home: [f32; 3],
    pub _pad1: f32,
    pub color: [f32; 4],
    pub pixel: [f32; 2],
    pub _pad2: [f32; 2],
}

impl From<&Particle> for GpuParticle {
    fn from(p: &Particle) -> Self {
        Self {
            pos: p.pos.to_array(),
            damping: p.damping,
            ppos: p.ppos.to_array(),
            _pad0: 0.0,
            home: p.home.to_array(),
            _pad1: 0.0,
            color: p.color.to_array(),
            pixel: p.pixel.to_array(),
            _pad2: [0.0; 2],
        }
    }
}

/// Uniform block for the update pass; one input snapshot per frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SimParams {
    pub pointer_pos: [f32; 3],
    pub force: f32,
    pub blend: f32,
    pub spring: f32,
    pub num_particles: u32,
    pub use_textures: u32, // 0 = pass color through, 1 = blend the two bound images
}

impl SimParams {
    pub fn snapshot(sim: &ParticleSim, input: &FrameInput, num_particles: u32) -> Self {
        Self {
            pointer_pos: input.pointer_pos.to_array(),
            force: input.force,
            blend: input.blend,
            spring: sim.config.spring_strength,
            num_particles,
            use_textures: sim.textures().is_some() as u32,
        }
    }
}

/// Uniform block for the point draw pass. The trailing pads must stay scalar
/// floats on the WGSL side as well: a vec3 pad has 16-byte alignment there
/// and would grow the shader struct past this buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawParams {
    pub view_proj: [[f32; 4]; 4],
    pub point_size: f32,
    pub _pad: [f32; 3],
}

/// Uniform block shared by the two blur passes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BlurParams {
    pub sample_offset: [f32; 2],
    pub attenuation: f32,
    pub _pad: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::verlet::{SimConfig, SourceImage};
    use glam::Vec4;

    #[test]
    fn uniform_layouts_match_the_wgsl_mirrors() {
        assert_eq!(std::mem::size_of::<GpuParticle>(), 80);
        assert_eq!(std::mem::size_of::<SimParams>(), 32);
        // scalar pads keep this at 80; a vec3 pad on either side rounds to 96
        assert_eq!(std::mem::size_of::<DrawParams>(), 80);
        assert_eq!(std::mem::size_of::<BlurParams>(), 16);
    }

    #[test]
    fn sim_params_snapshot_carries_blend_and_texture_flag() {
        let img = SourceImage::new(1, 1, vec![Vec4::ONE]).unwrap();
        let plain = ParticleSim::from_image(&img, SimConfig::default()).unwrap();
        let blended = ParticleSim::from_image(&img, SimConfig::default())
            .unwrap()
            .with_textures(img.clone(), img);

        let input = FrameInput {
            blend: 0.25,
            ..FrameInput::default()
        };
        let params = SimParams::snapshot(&plain, &input, 1);
        assert_eq!(params.use_textures, 0);

        let params = SimParams::snapshot(&blended, &input, 1);
        assert_eq!(params.use_textures, 1);
        assert_eq!(params.blend, 0.25);
    }
}
