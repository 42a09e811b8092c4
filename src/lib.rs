pub mod camera;
pub mod config;
pub mod mesh;
pub mod shader;
pub mod ui;
pub mod viewer;

// Re-export commonly used types
pub use camera::{Camera, CameraMode};
pub use config::ViewerConfig;
pub use mesh::{Mesh, MeshData, MeshError, Vertex};
pub use shader::{ShaderError, ShaderProgram};
pub use viewer::{LightMode, ViewerState};
