use egui::{Context, DragValue, Window};

use crate::camera::CameraMode;
use crate::viewer::{LightMode, ViewerState};

/// Draws the two parameter windows. Runs inside the egui frame started by
/// the render loop.
pub fn show(ctx: &Context, state: &mut ViewerState) {
    show_camera_window(ctx, state);
    show_light_window(ctx, state);
}

fn show_camera_window(ctx: &Context, state: &mut ViewerState) {
    Window::new("Camera").show(ctx, |ui| {
        let camera = &state.camera;
        let mode = match camera.mode {
            CameraMode::Orbit => "Orbit (press C)",
            CameraMode::Free => "Free (press C)",
        };
        ui.label(format!("Mode: {}", mode));
        ui.label(format!(
            "Position: ({:.2}, {:.2}, {:.2})",
            camera.position.x, camera.position.y, camera.position.z
        ));

        match camera.mode {
            CameraMode::Orbit => {
                ui.label(format!("Yaw: {:.2}, Pitch: {:.2}", camera.yaw, camera.pitch));
                ui.label(format!("Radius: {:.2}", camera.radius));
            }
            CameraMode::Free => {
                ui.label(format!(
                    "Front: ({:.2}, {:.2}, {:.2})",
                    camera.front.x, camera.front.y, camera.front.z
                ));
                ui.label(format!("Speed: {:.2}", camera.speed));
            }
        }
    });
}

fn show_light_window(ctx: &Context, state: &mut ViewerState) {
    Window::new("Light").show(ctx, |ui| {
        let mode = match state.light_mode {
            LightMode::Headlight => "Headlight (press X)",
            LightMode::Fixed => "Fixed (press X)",
        };
        ui.label(format!("Mode: {}", mode));

        match state.light_mode {
            LightMode::Headlight => {
                ui.label(format!(
                    "Position: ({:.2}, {:.2}, {:.2})",
                    state.light_position.x, state.light_position.y, state.light_position.z
                ));
            }
            LightMode::Fixed => {
                ui.horizontal(|ui| {
                    ui.label("Position:");
                    ui.add(DragValue::new(&mut state.light_position.x).speed(0.1));
                    ui.add(DragValue::new(&mut state.light_position.y).speed(0.1));
                    ui.add(DragValue::new(&mut state.light_position.z).speed(0.1));
                });
            }
        }

        ui.horizontal(|ui| {
            ui.label("Color:");
            ui.color_edit_button_rgb(&mut state.light_color);
        });
    });
}
