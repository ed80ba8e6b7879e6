use bevy_verlet_particles::cpu::verlet::{
    Attenuation, DualBuffer, FrameInput, Particle, ParticleSim, SimConfig, SourceImage,
    update_particle,
};
use glam::{Vec2, Vec3, Vec4};

fn quiet_config() -> SimConfig {
    SimConfig {
        spring_strength: 0.0,
        damping_range: (0.0, 0.0),
        jitter: 0.0,
        ..SimConfig::default()
    }
}

#[test]
fn from_grid_n() {
    let sim = ParticleSim::from_grid(10, Vec4::ONE, quiet_config()).unwrap();
    assert_eq!(sim.len(), 100); // 10 * 10
    assert_eq!(sim.current()[0].pos, Vec3::new(1.0, 1.0, 0.0));
    assert_eq!(sim.current()[1].pos, Vec3::new(2.0, 1.0, 0.0));
    assert_eq!(sim.current()[10].pos, Vec3::new(1.0, 2.0, 0.0));
}

#[test]
fn empty_seed_is_rejected() {
    assert!(DualBuffer::new(Vec::new()).is_none());
    assert!(ParticleSim::from_records(Vec::new(), SimConfig::default()).is_none());
}

#[test]
fn swap_preserves_count_and_order() {
    let records: Vec<Particle> = (0..17)
        .map(|i| Particle::at_rest(Vec3::new(i as f32, 0.0, 0.0), Vec4::ONE))
        .collect();
    let mut buffer = DualBuffer::new(records.clone()).unwrap();

    for _ in 0..7 {
        buffer.swap();
    }
    assert_eq!(buffer.len(), 17);

    // double swap restores the original labeling
    buffer.swap();
    assert_eq!(buffer.current().len(), 17);
    for (i, p) in buffer.current().iter().enumerate() {
        assert_eq!(p.pos.x, records[i].pos.x);
    }
}

#[test]
fn spring_term_vanishes_at_home() {
    let mut p = Particle::at_rest(Vec3::new(3.0, 4.0, 0.0), Vec4::ONE);
    p.ppos = Vec3::new(2.5, 4.0, 0.0); // nonzero velocity
    p.damping = 0.25;
    let config = SimConfig {
        spring_strength: 0.5,
        ..SimConfig::default()
    };

    let next = update_particle(&p, &FrameInput::default(), &config);

    // at home the spring contributes nothing: newPos == pos + vel*(1-damping)
    let vel = (p.pos - p.ppos) * (1.0 - p.damping);
    assert_eq!(next.pos, p.pos + vel);
    assert_eq!(next.ppos, p.pos);
    assert_eq!(next.home, p.home);
}

#[test]
fn full_damping_is_a_fixed_point() {
    let mut p = Particle::at_rest(Vec3::new(1.0, 2.0, 3.0), Vec4::ONE);
    p.ppos = Vec3::new(0.0, 0.0, 0.0);
    p.damping = 1.0;

    let next = update_particle(&p, &FrameInput::default(), &quiet_config());
    assert_eq!(next.pos, p.pos);
}

#[test]
fn static_equilibrium_survives_a_step() {
    let records = vec![
        Particle::at_rest(Vec3::new(0.0, 0.0, 0.0), Vec4::ONE),
        Particle::at_rest(Vec3::new(1.0, 0.0, 0.0), Vec4::ONE),
        Particle::at_rest(Vec3::new(0.0, 1.0, 0.0), Vec4::ONE),
        Particle::at_rest(Vec3::new(1.0, 1.0, 0.0), Vec4::ONE),
    ];
    let mut sim = ParticleSim::from_records(records.clone(), quiet_config()).unwrap();

    sim.step(&FrameInput::default());

    // no velocity, no forces: every particle stays put, and the stepped
    // generation is now the source
    assert_eq!(sim.len(), 4);
    for (p, seed) in sim.current().iter().zip(&records) {
        assert_eq!(p.pos, seed.pos);
        assert_eq!(p.ppos, seed.pos);
    }
}

#[test]
fn pointer_force_pushes_away() {
    let p = Particle::at_rest(Vec3::new(2.0, 0.0, 0.0), Vec4::ONE);
    let input = FrameInput {
        pointer_down: true,
        pointer_pos: Vec3::ZERO,
        force: 4.0,
        blend: 0.0,
    };

    let next = update_particle(&p, &input, &quiet_config());
    assert!(next.pos.x > p.pos.x); // pushed along +x, away from the pointer
    assert_eq!(next.pos.y, 0.0);
}

#[test]
fn attenuation_ramp_matches_the_state_machine() {
    let mut att = Attenuation::default();

    // holding for k frames yields min(0.05 k, 3.0)
    for k in 1..=30 {
        let v = att.advance(true);
        assert!((v - (0.05 * k as f32).min(3.0)).abs() < 1e-5);
    }
    for _ in 0..100 {
        att.advance(true);
    }
    assert_eq!(att.value, 3.0);

    // releasing for m frames yields max(3.0 - 0.1 m, 0.0)
    for m in 1..=25 {
        let v = att.advance(false);
        assert!((v - (3.0 - 0.1 * m as f32).max(0.0)).abs() < 1e-5);
    }
    for _ in 0..100 {
        att.advance(false);
    }
    assert_eq!(att.value, 0.0);
}

#[test]
fn image_seed_assigns_pixel_coordinates() {
    let image = SourceImage::new(
        2,
        2,
        vec![
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::new(0.0, 1.0, 0.0, 1.0),
            Vec4::new(0.0, 0.0, 1.0, 1.0),
            Vec4::new(1.0, 1.0, 1.0, 1.0),
        ],
    )
    .unwrap();

    let sim = ParticleSim::from_image(&image, quiet_config()).unwrap();
    assert_eq!(sim.len(), 4);

    // (col / width, 1 - (row + 1) / height), rows seeded bottom of the image last
    let expected = [
        Vec2::new(0.0, 0.5),
        Vec2::new(0.5, 0.5),
        Vec2::new(0.0, 0.0),
        Vec2::new(0.5, 0.0),
    ];
    for (p, want) in sim.current().iter().zip(expected) {
        assert_eq!(p.pixel, want);
    }
}

#[test]
fn two_texture_blend_mixes_colors() {
    let red = SourceImage::new(1, 1, vec![Vec4::new(1.0, 0.0, 0.0, 1.0)]).unwrap();
    let blue = SourceImage::new(1, 1, vec![Vec4::new(0.0, 0.0, 1.0, 1.0)]).unwrap();

    let mut sim = ParticleSim::from_image(&red, quiet_config())
        .unwrap()
        .with_textures(red, blue);

    let input = FrameInput {
        blend: 0.5,
        ..FrameInput::default()
    };
    sim.step(&input);

    let color = sim.current()[0].color;
    assert!((color.x - 0.5).abs() < 1e-5);
    assert!((color.z - 0.5).abs() < 1e-5);
}
