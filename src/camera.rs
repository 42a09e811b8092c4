use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    /// Circles a fixed target; mouse orbits, scroll changes the radius.
    Orbit,
    /// Fly-through; mouse steers, WASD moves, scroll changes the speed.
    Free,
}

/// Viewer camera with two control modes. Angles are kept in degrees.
///
/// Toggling the mode recomputes yaw/pitch from the current geometry so the
/// view direction carries over instead of snapping.
#[derive(Debug)]
pub struct Camera {
    pub mode: CameraMode,
    pub position: Vec3,
    pub front: Vec3,
    pub world_up: Vec3,
    pub target: Vec3,
    pub radius: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub speed: f32,
    pub fov: f32,
}

const PITCH_LIMIT: f32 = 89.0;

impl Camera {
    pub fn new() -> Self {
        Self {
            mode: CameraMode::Orbit,
            position: Vec3::new(0.0, 0.0, 3.0),
            front: Vec3::new(0.0, 0.0, -1.0),
            world_up: Vec3::Y,
            target: Vec3::ZERO,
            radius: 3.0,
            yaw: -90.0,
            pitch: 0.0,
            speed: 2.5,
            fov: 45.0,
        }
    }

    /// Applies a mouse delta in screen pixels (y grows downward).
    pub fn handle_mouse_motion(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.yaw += dx * sensitivity;
        self.pitch = (self.pitch - dy * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        if self.mode == CameraMode::Free {
            self.front = direction_from_angles(self.yaw, self.pitch);
        }
    }

    pub fn handle_scroll(&mut self, amount: f32) {
        match self.mode {
            CameraMode::Orbit => self.radius = (self.radius - amount).clamp(1.0, 45.0),
            CameraMode::Free => self.speed = (self.speed + amount * 0.5).clamp(0.5, 10.0),
        }
    }

    pub fn move_free(&mut self, direction: Vec3, dt: f32) {
        if self.mode == CameraMode::Free {
            self.position += direction * self.speed * dt;
        }
    }

    pub fn right(&self) -> Vec3 {
        self.front.cross(self.world_up).normalize()
    }

    /// Re-derives the orbit position from the current yaw/pitch/radius.
    /// Called once per frame while orbiting.
    pub fn update_orbit(&mut self) {
        if self.mode == CameraMode::Orbit {
            self.position = self.target + self.radius * direction_from_angles(self.yaw, self.pitch);
        }
    }

    pub fn toggle_mode(&mut self) {
        match self.mode {
            CameraMode::Free => {
                self.mode = CameraMode::Orbit;
                self.target = Vec3::ZERO;
                self.radius = (self.position - self.target).length().clamp(1.0, 45.0);
                // Orbit angles describe the target->position direction.
                let direction = (self.position - self.target).normalize();
                self.set_angles_from(direction);
            }
            CameraMode::Orbit => {
                self.mode = CameraMode::Free;
                self.front = (self.target - self.position).normalize();
                self.set_angles_from(self.front);
            }
        }
    }

    fn set_angles_from(&mut self, direction: Vec3) {
        self.yaw = direction.z.atan2(direction.x).to_degrees();
        self.pitch = direction
            .y
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn view_matrix(&self) -> Mat4 {
        match self.mode {
            CameraMode::Orbit => Mat4::look_at_rh(self.position, self.target, self.world_up),
            CameraMode::Free => {
                Mat4::look_at_rh(self.position, self.position + self.front, self.world_up)
            }
        }
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov.to_radians(), aspect_ratio, 0.1, 100.0)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

fn direction_from_angles(yaw: f32, pitch: f32) -> Vec3 {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    Vec3::new(
        yaw.cos() * pitch.cos(),
        pitch.sin(),
        yaw.sin() * pitch.cos(),
    )
    .normalize()
}
