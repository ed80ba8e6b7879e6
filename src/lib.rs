use bevy::prelude::*;

pub mod cpu {
    pub mod verlet;
}

pub mod gpu {
    pub mod blur;
    pub mod buffers;
    pub mod draw_buffers;
    pub mod draw_pass;
    pub mod draw_pipeline;
    pub mod ffi;
    pub mod pipeline;
}

/// Rendered point size; globally mutable from a keystroke in the demos.
#[derive(Resource, Clone, Copy, Debug)]
pub struct PointSize {
    pub value: f32,
    pub step: f32,
}

impl Default for PointSize {
    fn default() -> Self {
        Self { value: 1.0, step: 0.1 }
    }
}

impl PointSize {
    pub fn increase(&mut self) {
        self.value += self.step;
    }

    pub fn reset(&mut self) {
        self.value = 1.0;
    }
}
