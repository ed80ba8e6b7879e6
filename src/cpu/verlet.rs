// damped Verlet particle field with homing springs and pointer forces (CPU reference)
use bevy::prelude::Resource;
use glam::{Vec2, Vec3, Vec4};

// pointer push blows up as 1/r^2; clamp the radius so a direct hit stays finite
const MIN_DIST_SQ: f32 = 1e-4;

#[inline]
fn hash01(seed: u32) -> f32 {
    let mut x = seed.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    x ^= x >> 16;
    x = x.wrapping_mul(2_246_822_519);
    x ^= x >> 13;
    (x as f32) / (u32::MAX as f32)
}

// deterministic jitter direction per particle index, roughly unit length
#[inline]
fn hash_vec3(seed: u32) -> Vec3 {
    let v = Vec3::new(
        hash01(seed) * 2.0 - 1.0,
        hash01(seed.wrapping_add(0x9E37)) * 2.0 - 1.0,
        hash01(seed.wrapping_add(0x79B9)) * 2.0 - 1.0,
    );
    if v.length_squared() <= 1e-8 { Vec3::X } else { v.normalize() }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Particle {
    pub pos: Vec3,  // position
    pub ppos: Vec3, // previous position (implicit velocity)
    pub home: Vec3, // rest anchor, never mutated after creation
    pub color: Vec4,
    pub damping: f32,
    pub pixel: Vec2, // normalized source-image coordinate
}

impl Particle {
    pub fn at_rest(pos: Vec3, color: Vec4) -> Self {
        Self {
            pos,
            ppos: pos,
            home: pos,
            color,
            damping: 0.0,
            pixel: Vec2::ZERO,
        }
    }
}

/// Per-frame input snapshot. The update law reads only this, never ambient
/// state, so a step is reproducible from (generation, snapshot).
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct FrameInput {
    pub pointer_down: bool,
    pub pointer_pos: Vec3,
    pub force: f32, // signed; zero means no pointer push
    pub blend: f32, // two-texture mix weight in [0, 1]
}

#[derive(Resource, Clone, Copy, Debug)]
pub struct SimConfig {
    pub spring_strength: f32,
    pub force_ramp_up: f32,
    pub force_ramp_down: f32,
    /// The grid variants originally ramped force without bound while the
    /// pointer was held; that looked like an omission, so the cap is a knob.
    pub force_cap: f32,
    pub damping_range: (f32, f32),
    pub jitter: f32, // magnitude of the random initial velocity offset
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            spring_strength: 0.009, // ~32 / 60^2, the classic homing constant
            force_ramp_up: 10.0,
            force_ramp_down: 10.0,
            force_cap: 500.0,
            damping_range: (0.000_965, 0.000_985),
            jitter: 10.0,
        }
    }
}

/// Two generations of the particle population behind a source/destination
/// label. The storage never moves; only the label flips.
pub struct DualBuffer {
    gens: [Vec<Particle>; 2],
    source: usize,
}

impl DualBuffer {
    /// `None` when `records` is empty: there is nothing to simulate and the
    /// caller is expected to treat that as a fatal setup error.
    pub fn new(records: Vec<Particle>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let dest = vec![Particle::default(); records.len()];
        Some(Self {
            gens: [records, dest],
            source: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.gens[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 // constructor rejects empty record sets, so never true
    }

    /// Exchange the source/destination labels. Exactly once per completed
    /// update step: skipping leaves the renderer on stale data, doubling
    /// makes the next step read the generation it just wrote.
    pub fn swap(&mut self) {
        self.source = 1 - self.source;
    }

    pub fn current(&self) -> &[Particle] {
        &self.gens[self.source]
    }

    /// (source, destination) views for one update pass. Physically separate
    /// storage is what enforces read-old / write-new.
    pub fn split(&mut self) -> (&[Particle], &mut [Particle]) {
        let (a, b) = self.gens.split_at_mut(1);
        if self.source == 0 {
            (&a[0][..], &mut b[0][..])
        } else {
            (&b[0][..], &mut a[0][..])
        }
    }
}

/// Decoded image contract: just enough to seed particles and blend colors.
#[derive(Clone)]
pub struct SourceImage {
    pub width: usize,
    pub height: usize,
    pixels: Vec<Vec4>, // row-major RGBA
}

impl SourceImage {
    pub fn new(width: usize, height: usize, pixels: Vec<Vec4>) -> Option<Self> {
        if width == 0 || height == 0 || pixels.len() != width * height {
            return None;
        }
        Some(Self { width, height, pixels })
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    /// Nearest sample at normalized (u, v), v = 0 at the bottom row.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let col = ((uv.x * self.width as f32) as usize).min(self.width - 1);
        let row_up = ((uv.y * self.height as f32) as usize).min(self.height - 1);
        let row = self.height - 1 - row_up;
        self.pixels[row * self.width + col]
    }
}

/// One per-particle integration step. Pure: generation t in, record t+1 out.
pub fn update_particle(p: &Particle, input: &FrameInput, config: &SimConfig) -> Particle {
    let mut pos = p.pos;

    if input.force != 0.0 {
        let dir = pos - input.pointer_pos;
        let d2 = dir.length_squared().max(MIN_DIST_SQ);
        pos += input.force * dir / d2;
    }

    let vel = (pos - p.ppos) * (1.0 - p.damping);
    let spring = (p.home - pos) * config.spring_strength;

    Particle {
        pos: pos + vel + spring,
        ppos: pos,
        home: p.home,
        color: p.color,
        damping: p.damping,
        pixel: p.pixel,
    }
}

#[derive(Resource)]
pub struct ParticleSim {
    buffer: DualBuffer,
    pub config: SimConfig,
    textures: Option<(SourceImage, SourceImage)>,
}

impl ParticleSim {
    pub fn from_records(records: Vec<Particle>, config: SimConfig) -> Option<Self> {
        Some(Self {
            buffer: DualBuffer::new(records)?,
            config,
            textures: None,
        })
    }

    /// Square grid of particles at (col+1, row+1, 0), all one color, with a
    /// deterministic initial kick so the field settles visibly on startup.
    pub fn from_grid(grid_size: usize, color: Vec4, config: SimConfig) -> Option<Self> {
        let mut records = Vec::with_capacity(grid_size * grid_size);
        for row in 0..grid_size {
            for col in 0..grid_size {
                let i = (row * grid_size + col) as u32;
                let home = Vec3::new(col as f32 + 1.0, row as f32 + 1.0, 0.0);
                let (lo, hi) = config.damping_range;
                records.push(Particle {
                    pos: home,
                    ppos: home + hash_vec3(i) * config.jitter,
                    home,
                    color,
                    damping: lo + (hi - lo) * hash01(i.wrapping_mul(31)),
                    pixel: Vec2::ZERO,
                });
            }
        }
        Self::from_records(records, config)
    }

    /// One particle per source pixel; the particle keeps its image coordinate
    /// so the update step can re-sample colors when blending two textures.
    pub fn from_image(image: &SourceImage, config: SimConfig) -> Option<Self> {
        let (w, h) = (image.width, image.height);
        let mut records = Vec::with_capacity(w * h);
        for row in 0..h {
            for col in 0..w {
                let i = (row * w + col) as u32;
                let home = Vec3::new(col as f32 + 1.0, row as f32 + 1.0, 0.0);
                let pixel = Vec2::new(
                    col as f32 / w as f32,
                    1.0 - (row as f32 + 1.0) / h as f32,
                );
                let (lo, hi) = config.damping_range;
                records.push(Particle {
                    pos: home,
                    ppos: home + hash_vec3(i) * config.jitter,
                    home,
                    color: image.sample(pixel),
                    damping: lo + (hi - lo) * hash01(i.wrapping_mul(31)),
                    pixel,
                });
            }
        }
        Self::from_records(records, config)
    }

    pub fn with_textures(mut self, a: SourceImage, b: SourceImage) -> Self {
        self.textures = Some((a, b));
        self
    }

    pub fn textures(&self) -> Option<(&SourceImage, &SourceImage)> {
        self.textures.as_ref().map(|(a, b)| (a, b))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn current(&self) -> &[Particle] {
        self.buffer.current()
    }

    /// Advance every particle one generation and swap. Each index is updated
    /// independently from the committed source generation only.
    pub fn step(&mut self, input: &FrameInput) {
        let config = self.config;
        let textures = self.textures.as_ref();
        let (src, dst) = self.buffer.split();

        for (p, out) in src.iter().zip(dst.iter_mut()) {
            let mut next = update_particle(p, input, &config);
            if let Some((a, b)) = textures {
                next.color = a.sample(p.pixel).lerp(b.sample(p.pixel), input.blend);
            }
            *out = next;
        }

        self.buffer.swap();
    }
}

/// Pointer force scalar: ramps up while the button is held, decays to zero
/// after release. Step sizes and the cap come from SimConfig.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct ForceRamp {
    pub value: f32,
}

impl ForceRamp {
    pub fn advance(&mut self, held: bool, config: &SimConfig) -> f32 {
        if held {
            self.value = (self.value + config.force_ramp_up).min(config.force_cap);
        } else if self.value > 0.0 {
            self.value = (self.value - config.force_ramp_down).max(0.0);
        }
        self.value
    }
}

/// Blur strength driven by the pointer button: rises to the cap while held,
/// falls back to zero while released.
#[derive(Resource, Clone, Copy, Debug)]
pub struct Attenuation {
    pub value: f32,
    pub rise: f32,
    pub fall: f32,
    pub cap: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            value: 0.0,
            rise: 0.05,
            fall: 0.1,
            cap: 3.0,
        }
    }
}

impl Attenuation {
    pub fn advance(&mut self, pointer_down: bool) -> f32 {
        if pointer_down {
            if self.value < self.cap {
                self.value = (self.value + self.rise).min(self.cap);
            }
        } else if self.value > 0.0 {
            self.value = (self.value - self.fall).max(0.0);
        }
        self.value
    }
}

/// Cubic ease-in toward a retargetable goal, the shape the originals used
/// for the texture blend factor.
#[derive(Resource, Clone, Copy, Debug)]
pub struct BlendTween {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

impl Default for BlendTween {
    fn default() -> Self {
        Self {
            from: 0.0,
            to: 0.0,
            elapsed: 0.0,
            duration: 1.0,
        }
    }
}

impl BlendTween {
    pub fn retarget(&mut self, to: f32, duration: f32) {
        self.from = self.value();
        self.to = to;
        self.elapsed = 0.0;
        self.duration = duration.max(1e-3);
    }

    pub fn advance(&mut self, dt: f32) -> f32 {
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        self.value()
    }

    pub fn value(&self) -> f32 {
        let t = (self.elapsed / self.duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t * t * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_ramp_caps_and_decays() {
        let config = SimConfig {
            force_ramp_up: 10.0,
            force_ramp_down: 10.0,
            force_cap: 25.0,
            ..SimConfig::default()
        };
        let mut ramp = ForceRamp::default();
        for _ in 0..5 {
            ramp.advance(true, &config);
        }
        assert_eq!(ramp.value, 25.0);
        ramp.advance(false, &config);
        assert_eq!(ramp.value, 15.0);
        for _ in 0..10 {
            ramp.advance(false, &config);
        }
        assert_eq!(ramp.value, 0.0);
    }

    #[test]
    fn blend_tween_eases_in() {
        let mut tween = BlendTween::default();
        tween.retarget(1.0, 1.0);
        assert!(tween.advance(0.5) < 0.5); // cubic ease-in lags the midpoint
        assert_eq!(tween.advance(0.5), 1.0);
        assert_eq!(tween.advance(10.0), 1.0); // saturates at the goal
    }

    #[test]
    fn image_sample_is_nearest_and_bottom_up() {
        let img = SourceImage::new(
            2,
            2,
            vec![
                Vec4::new(0.0, 0.0, 0.0, 1.0), // top-left
                Vec4::new(1.0, 0.0, 0.0, 1.0), // top-right
                Vec4::new(0.0, 1.0, 0.0, 1.0), // bottom-left
                Vec4::new(0.0, 0.0, 1.0, 1.0), // bottom-right
            ],
        )
        .unwrap();
        assert_eq!(img.sample(Vec2::new(0.0, 0.0)).y, 1.0);
        assert_eq!(img.sample(Vec2::new(0.9, 0.9)).x, 1.0);
    }
}
