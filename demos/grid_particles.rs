use bevy::input::ButtonInput;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use glam::{Vec3 as GVec3, Vec4 as GVec4};

use bevy_verlet_particles::cpu::verlet::{ForceRamp, FrameInput, ParticleSim, SimConfig};
use bevy_verlet_particles::gpu::buffers::GpuVerletPlugin;
use bevy_verlet_particles::PointSize;

const GRID_SIZE: usize = 734;

fn main() {
    // the original grid variant kicked the pointer force straight to a large
    // constant while held; the ramp cap reproduces that without the
    // unbounded growth
    let config = SimConfig {
        force_ramp_up: 150.0,
        force_ramp_down: 150.0,
        force_cap: 150.0,
        damping_range: (0.0, 0.0),
        ..SimConfig::default()
    };
    let Some(sim) = ParticleSim::from_grid(
        GRID_SIZE,
        GVec4::new(239.0 / 255.0, 3.0 / 255.0, 137.0 / 255.0, 1.0),
        config,
    ) else {
        error!("empty particle seed");
        return;
    };

    App::new()
        .add_plugins(DefaultPlugins)
        .insert_resource(ClearColor(Color::BLACK))
        .insert_resource(sim)
        .insert_resource(ForceRamp::default())
        .add_plugins(GpuVerletPlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, (pointer_input, point_size_keys))
        .run();
}

fn setup(mut commands: Commands) {
    commands.spawn(Camera2d::default());
}

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
        input.pointer_pos = GVec3::new(
            pos.x / win_w * GRID_SIZE as f32,
            (1.0 - pos.y / win_h) * GRID_SIZE as f32,
            0.0,
        );
    }
}

fn point_size_keys(mut point_size: ResMut<PointSize>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyF) {
        point_size.increase();
    }
    if keys.just_pressed(KeyCode::KeyR) {
        point_size.reset();
    }
}
