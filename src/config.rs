use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

/// Viewer settings, read from an optional `viewer.toml` next to the binary.
/// Every field has a default, so a partial file is fine and a missing one
/// means stock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub model: PathBuf,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub mouse_sensitivity: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_width: 800,
            window_height: 600,
            model: PathBuf::from("assets/models/cube.obj"),
            vertex_shader: PathBuf::from("assets/shaders/model.vert"),
            fragment_shader: PathBuf::from("assets/shaders/model.frag"),
            mouse_sensitivity: 0.1,
        }
    }
}

impl ViewerConfig {
    /// Loads the config file if present. A malformed file is reported and
    /// ignored rather than stopping the viewer.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    warn!("ignoring malformed {}: {}", path.display(), err);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = ViewerConfig::load(Path::new("/nonexistent/viewer.toml"));
        assert_eq!(config.window_width, 800);
        assert_eq!(config.model, PathBuf::from("assets/models/cube.obj"));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.toml");
        fs::write(&path, "model = \"teapot.obj\"\nwindow_width = 1280\n").unwrap();

        let config = ViewerConfig::load(&path);
        assert_eq!(config.model, PathBuf::from("teapot.obj"));
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 600);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.toml");
        fs::write(&path, "window_width = \"not a number\"").unwrap();

        let config = ViewerConfig::load(&path);
        assert_eq!(config.window_width, 800);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = ViewerConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: ViewerConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.window_height, config.window_height);
        assert_eq!(back.vertex_shader, config.vertex_shader);
    }
}
