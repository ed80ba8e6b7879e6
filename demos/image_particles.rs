use bevy::input::ButtonInput;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use glam::{Vec2 as GVec2, Vec3 as GVec3, Vec4 as GVec4};

use bevy_verlet_particles::cpu::verlet::{
    BlendTween, ForceRamp, FrameInput, ParticleSim, SimConfig, SourceImage,
};
use bevy_verlet_particles::gpu::blur::BlurSettings;
use bevy_verlet_particles::gpu::buffers::GpuVerletPlugin;
use bevy_verlet_particles::PointSize;

const IMG_WIDTH: usize = 480;
const IMG_HEIGHT: usize = 300;

/// Procedural stand-ins for the two source photographs: a warm and a cool
/// gradient with enough structure to make the blend visible.
fn make_image(phase: f32) -> SourceImage {
    let mut pixels = Vec::with_capacity(IMG_WIDTH * IMG_HEIGHT);
    for row in 0..IMG_HEIGHT {
        for col in 0..IMG_WIDTH {
            let u = col as f32 / IMG_WIDTH as f32;
            let v = row as f32 / IMG_HEIGHT as f32;
            let swirl = ((u * 12.0 + phase).sin() * (v * 8.0 - phase).cos()) * 0.5 + 0.5;
            pixels.push(GVec4::new(
                u * (1.0 - phase) + swirl * phase,
                swirl * 0.6,
                v * phase + (1.0 - swirl) * (1.0 - phase),
                1.0,
            ));
        }
    }
    SourceImage::new(IMG_WIDTH, IMG_HEIGHT, pixels).expect("dimensions match pixel count")
}

fn main() {
    let image_a = make_image(0.0);
    let image_b = make_image(1.0);

    let Some(sim) = ParticleSim::from_image(&image_a, SimConfig::default()) else {
        error!("empty particle seed");
        return;
    };
    let sim = sim.with_textures(image_a, image_b);

    App::new()
        .add_plugins(DefaultPlugins)
        .insert_resource(ClearColor(Color::BLACK))
        .insert_resource(sim)
        .insert_resource(ForceRamp::default())
        .insert_resource(BlendTween::default())
        .add_plugins(GpuVerletPlugin)
        .insert_resource(BlurSettings { enabled: true })
        .add_systems(Startup, setup)
        .add_systems(Update, (pointer_input, blend_keys, point_size_keys))
        .run();
}

fn setup(mut commands: Commands) {
    commands.spawn(Camera2d::default());
}

fn pointer_input(
    mut input: ResMut<FrameInput>,
    mut ramp: ResMut<ForceRamp>,
    mut tween: ResMut<BlendTween>,
    sim: Res<ParticleSim>,
    time: Res<Time>,
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };

    input.pointer_down = buttons.pressed(MouseButton::Left);
    input.force = ramp.advance(input.pointer_down, &sim.config);
    input.blend = tween.advance(time.delta_secs());

    if let Some(pos) = window.cursor_position() {
        let extent = GVec2::new(IMG_WIDTH as f32, IMG_HEIGHT as f32);
        let win_w = window.resolution.width();
        let win_h = window.resolution.height();
        input.pointer_pos = GVec3::new(
            pos.x / win_w * extent.x,
            (1.0 - pos.y / win_h) * extent.y,
            0.0,
        );
    }
}

// 'a' tweens fully to the second image, 'b' back to an even mix
fn blend_keys(mut tween: ResMut<BlendTween>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyA) {
        tween.retarget(1.0, 1.0);
    }
    if keys.just_pressed(KeyCode::KeyB) {
        tween.retarget(0.5, 1.0);
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
