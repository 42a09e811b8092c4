use glam::Vec3;
use winit::event::{ElementState, MouseScrollDelta};
use winit::keyboard::KeyCode;

use crate::camera::{Camera, CameraMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightMode {
    /// Light rides along with the camera.
    Headlight,
    /// Light stays where the panel put it.
    Fixed,
}

#[derive(Debug, Default)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

/// All mutable viewer state: camera, light rig, held keys and the pending
/// reload request. Passed by reference into the input handlers, the
/// per-frame update and the panel; nothing here is a process-wide global.
pub struct ViewerState {
    pub camera: Camera,
    pub light_mode: LightMode,
    pub light_position: Vec3,
    pub light_color: [f32; 3],
    pub input: InputState,
    pub mouse_sensitivity: f32,
    reload_requested: bool,
}

impl ViewerState {
    pub fn new() -> Self {
        Self {
            camera: Camera::new(),
            light_mode: LightMode::Headlight,
            light_position: Vec3::new(0.0, -10.0, -10.0),
            light_color: [1.0, 1.0, 1.0],
            input: InputState::default(),
            mouse_sensitivity: 0.1,
            reload_requested: false,
        }
    }

    /// Keyboard input. `repeat` filters OS key-repeat so the toggles fire
    /// once per physical press.
    pub fn handle_key(&mut self, key: KeyCode, state: ElementState, repeat: bool) {
        let pressed = state == ElementState::Pressed;
        match key {
            KeyCode::KeyW => self.input.forward = pressed,
            KeyCode::KeyS => self.input.backward = pressed,
            KeyCode::KeyA => self.input.left = pressed,
            KeyCode::KeyD => self.input.right = pressed,
            KeyCode::KeyC => {
                if pressed && !repeat {
                    self.camera.toggle_mode();
                }
            }
            KeyCode::KeyX => {
                if pressed && !repeat {
                    self.light_mode = match self.light_mode {
                        LightMode::Headlight => LightMode::Fixed,
                        LightMode::Fixed => LightMode::Headlight,
                    };
                }
            }
            KeyCode::KeyR => {
                if pressed && !repeat {
                    self.reload_requested = true;
                }
            }
            _ => {}
        }
    }

    pub fn handle_mouse_motion(&mut self, delta: (f64, f64)) {
        self.camera
            .handle_mouse_motion(delta.0 as f32, delta.1 as f32, self.mouse_sensitivity);
    }

    pub fn handle_mouse_scroll(&mut self, delta: MouseScrollDelta) {
        let amount = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(position) => position.y as f32 * 0.01,
        };
        self.camera.handle_scroll(amount);
    }

    /// Per-frame update: apply held movement keys, settle the orbit
    /// position, and drag the headlight along.
    pub fn update(&mut self, dt: f32) {
        if self.camera.mode == CameraMode::Free {
            let direction = self.movement_direction();
            self.camera.move_free(direction, dt);
        }
        self.camera.update_orbit();

        if self.light_mode == LightMode::Headlight {
            self.light_position = self.camera.position;
        }
    }

    /// Consumes a pending reload request, one reload per R press.
    pub fn take_reload_request(&mut self) -> bool {
        std::mem::take(&mut self.reload_requested)
    }

    fn movement_direction(&self) -> Vec3 {
        let mut direction = Vec3::ZERO;
        if self.input.forward {
            direction += self.camera.front;
        }
        if self.input.backward {
            direction -= self.camera.front;
        }
        if self.input.right {
            direction += self.camera.right();
        }
        if self.input.left {
            direction -= self.camera.right();
        }
        direction.normalize_or_zero()
    }
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_request_fires_once_per_press() {
        let mut state = ViewerState::new();
        state.handle_key(KeyCode::KeyR, ElementState::Pressed, false);
        // OS key repeat while held must not queue further reloads.
        state.handle_key(KeyCode::KeyR, ElementState::Pressed, true);
        assert!(state.take_reload_request());
        assert!(!state.take_reload_request());
    }

    #[test]
    fn light_mode_toggles_on_x() {
        let mut state = ViewerState::new();
        assert_eq!(state.light_mode, LightMode::Headlight);
        state.handle_key(KeyCode::KeyX, ElementState::Pressed, false);
        assert_eq!(state.light_mode, LightMode::Fixed);
        state.handle_key(KeyCode::KeyX, ElementState::Pressed, false);
        assert_eq!(state.light_mode, LightMode::Headlight);
    }

    #[test]
    fn headlight_follows_camera() {
        let mut state = ViewerState::new();
        state.update(0.016);
        assert_eq!(state.light_position, state.camera.position);
    }

    #[test]
    fn fixed_light_stays_put() {
        let mut state = ViewerState::new();
        state.handle_key(KeyCode::KeyX, ElementState::Pressed, false);
        state.light_position = Vec3::new(5.0, 5.0, 5.0);
        state.update(0.016);
        assert_eq!(state.light_position, Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn held_keys_move_the_free_camera() {
        let mut state = ViewerState::new();
        state.handle_key(KeyCode::KeyC, ElementState::Pressed, false);
        let start = state.camera.position;
        state.handle_key(KeyCode::KeyW, ElementState::Pressed, false);
        state.update(1.0);
        assert_ne!(state.camera.position, start);

        state.handle_key(KeyCode::KeyW, ElementState::Released, false);
        let stopped = state.camera.position;
        state.update(1.0);
        assert_eq!(state.camera.position, stopped);
    }

    #[test]
    fn opposed_keys_cancel() {
        let mut state = ViewerState::new();
        state.handle_key(KeyCode::KeyC, ElementState::Pressed, false);
        let start = state.camera.position;
        state.handle_key(KeyCode::KeyW, ElementState::Pressed, false);
        state.handle_key(KeyCode::KeyS, ElementState::Pressed, false);
        state.update(1.0);
        assert_eq!(state.camera.position, start);
    }
}
