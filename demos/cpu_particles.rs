use bevy::input::ButtonInput;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use glam::{Vec3 as GVec3, Vec4 as GVec4};

use bevy_verlet_particles::cpu::verlet::{ForceRamp, FrameInput, ParticleSim, SimConfig};
use bevy_verlet_particles::PointSize;

#[derive(Component)]
struct ParticleVisual(usize);

const GRID_SIZE: usize = 48;
const RENDER_SCALE: f32 = 14.0;
const MAGENTA: Color = Color::srgb(239.0 / 255.0, 3.0 / 255.0, 137.0 / 255.0);

fn main() {
    let config = SimConfig {
        force_cap: 150.0,
        ..SimConfig::default()
    };
    let sim = ParticleSim::from_grid(GRID_SIZE, GVec4::new(0.94, 0.01, 0.54, 1.0), config)
        .expect("grid seed is never empty");

    App::new()
        .add_plugins(DefaultPlugins)
        .insert_resource(sim)
        .insert_resource(FrameInput::default())
        .insert_resource(ForceRamp::default())
        .insert_resource(PointSize::default())
        .add_systems(Startup, setup)
        .add_systems(Update, (pointer_input, sim_step, point_size_keys, sync_particles).chain())
        .run();
}

fn setup(mut commands: Commands, sim: Res<ParticleSim>) {
    commands.spawn(Camera2d::default());

    // one sprite per particle
    for (i, p) in sim.current().iter().enumerate() {
        commands.spawn((
            Sprite {
                color: MAGENTA,
                custom_size: Some(Vec2::splat(2.0)),
                ..Default::default()
            },
            Transform::from_translation(Vec3::new(
                (p.pos.x - GRID_SIZE as f32 / 2.0) * RENDER_SCALE,
                (p.pos.y - GRID_SIZE as f32 / 2.0) * RENDER_SCALE,
                0.0,
            )),
            GlobalTransform::default(),
            ParticleVisual(i),
        ));
    }
}

// Build this frame's input snapshot from the window pointer.
fn pointer_input(
    mut input: ResMut<FrameInput>,
    mut ramp: ResMut<ForceRamp>,
    sim: Res<ParticleSim>,
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };

    input.pointer_down = buttons.pressed(MouseButton::Left);
    input.force = ramp.advance(input.pointer_down, &sim.config);

    if let Some(pos) = window.cursor_position() {
        let win_w = window.resolution.width();
        let win_h = window.resolution.height();
        // window origin is top-left; sim space is bottom-up
        input.pointer_pos = GVec3::new(
            pos.x / win_w * GRID_SIZE as f32,
            (1.0 - pos.y / win_h) * GRID_SIZE as f32,
            0.0,
        );
    }
}

fn sim_step(mut sim: ResMut<ParticleSim>, input: Res<FrameInput>) {
    sim.step(&input);
}

fn point_size_keys(mut point_size: ResMut<PointSize>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyF) {
        point_size.increase();
    }
    if keys.just_pressed(KeyCode::KeyR) {
        point_size.reset();
    }
}

fn sync_particles(
    sim: Res<ParticleSim>,
    point_size: Res<PointSize>,
    mut query: Query<(&ParticleVisual, &mut Transform, &mut Sprite)>,
) {
    for (visual, mut transform, mut sprite) in query.iter_mut() {
        let particle = &sim.current()[visual.0];
        transform.translation.x = (particle.pos.x - GRID_SIZE as f32 / 2.0) * RENDER_SCALE;
        transform.translation.y = (particle.pos.y - GRID_SIZE as f32 / 2.0) * RENDER_SCALE;
        sprite.custom_size = Some(Vec2::splat(2.0 * point_size.value));
    }
}
