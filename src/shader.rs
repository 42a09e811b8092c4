use std::collections::HashMap;
use std::ffi::{CString, NulError};
use std::fs;
use std::path::{Path, PathBuf};
use std::ptr;

use gl::types::*;
use glam::{Mat4, Vec3};
use log::{debug, error, info, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("could not read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: &'static str, log: String },

    #[error("program failed to link:\n{log}")]
    Link { log: String },

    #[error("shader source contains a NUL byte")]
    Nul(#[from] NulError),
}

/// A linked vertex+fragment program that can be rebuilt from its source
/// files while the application keeps running.
///
/// The program handle is `None` until the first successful link. `reload`
/// builds a complete replacement program before touching the held handle, so
/// a draw call never observes a half-built program: on any failure the
/// previous program stays active, on success the swap is a single
/// assignment.
pub struct ShaderProgram {
    program: Option<GLuint>,
    vertex_path: PathBuf,
    fragment_path: PathBuf,
    // Uniform locations resolved against the current program generation;
    // cleared on every successful relink.
    uniforms: HashMap<String, GLint>,
}

impl ShaderProgram {
    /// Stores the source paths and attempts one initial build. Construction
    /// itself never fails; callers check `is_linked` before drawing.
    pub fn new(vertex_path: impl Into<PathBuf>, fragment_path: impl Into<PathBuf>) -> Self {
        let mut shader = Self {
            program: None,
            vertex_path: vertex_path.into(),
            fragment_path: fragment_path.into(),
            uniforms: HashMap::new(),
        };
        shader.reload();
        shader
    }

    pub fn is_linked(&self) -> bool {
        self.program.is_some()
    }

    /// Re-reads both source files, compiles and links a new program, and
    /// swaps it in. Every failure path logs and leaves the currently held
    /// program untouched.
    pub fn reload(&mut self) {
        match self.build() {
            Ok(program) => {
                if let Some(old) = self.program.replace(program) {
                    unsafe {
                        gl::DeleteProgram(old);
                    }
                }
                self.uniforms.clear();
                info!(
                    "shader program linked from {} + {}",
                    self.vertex_path.display(),
                    self.fragment_path.display()
                );
            }
            Err(err) => {
                error!("shader reload failed, keeping previous program: {}", err);
            }
        }
    }

    fn build(&self) -> Result<GLuint, ShaderError> {
        // Both sources must be readable before any GL object is created.
        let vertex_source = read_source(&self.vertex_path)?;
        let fragment_source = read_source(&self.fragment_path)?;

        let vertex = compile_stage(gl::VERTEX_SHADER, "vertex", &vertex_source)?;
        let fragment = match compile_stage(gl::FRAGMENT_SHADER, "fragment", &fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                unsafe {
                    gl::DeleteShader(vertex);
                }
                return Err(err);
            }
        };

        let program = unsafe { gl::CreateProgram() };
        unsafe {
            gl::AttachShader(program, vertex);
            gl::AttachShader(program, fragment);
            gl::LinkProgram(program);
            // Attached shaders are only flagged for deletion here; they go
            // away with the program they are attached to.
            gl::DeleteShader(vertex);
            gl::DeleteShader(fragment);
        }

        let mut success = 1;
        unsafe {
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut success);
        }
        if success == 0 {
            let log = program_info_log(program);
            unsafe {
                gl::DeleteProgram(program);
            }
            return Err(ShaderError::Link { log });
        }

        Ok(program)
    }

    /// Activates the program for subsequent draw calls. A no-op while no
    /// program has ever linked.
    pub fn bind(&self) {
        match self.program {
            Some(program) => unsafe { gl::UseProgram(program) },
            None => debug!("bind() called with no linked program"),
        }
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.set_int(name, value as i32);
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.bind();
        if let Some(location) = self.uniform_location(name) {
            unsafe {
                gl::Uniform1i(location, value);
            }
        }
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.bind();
        if let Some(location) = self.uniform_location(name) {
            unsafe {
                gl::Uniform1f(location, value);
            }
        }
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.bind();
        if let Some(location) = self.uniform_location(name) {
            unsafe {
                gl::Uniform3f(location, value.x, value.y, value.z);
            }
        }
    }

    pub fn set_mat4(&mut self, name: &str, value: &Mat4) {
        self.bind();
        if let Some(location) = self.uniform_location(name) {
            let columns = value.to_cols_array();
            unsafe {
                gl::UniformMatrix4fv(location, 1, gl::FALSE, columns.as_ptr());
            }
        }
    }

    /// Resolves a uniform name against the current program generation. A
    /// name the active shaders do not declare resolves to -1, which is
    /// cached and warned about once, then silently skipped.
    fn uniform_location(&mut self, name: &str) -> Option<GLint> {
        let program = self.program?;

        if let Some(&location) = self.uniforms.get(name) {
            return if location == -1 { None } else { Some(location) };
        }

        let cname = CString::new(name).ok()?;
        let location = unsafe { gl::GetUniformLocation(program, cname.as_ptr()) };
        if location == -1 {
            warn!("uniform '{}' not found in shader program", name);
        }
        self.uniforms.insert(name.to_string(), location);

        if location == -1 {
            None
        } else {
            Some(location)
        }
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        if let Some(program) = self.program.take() {
            unsafe {
                gl::DeleteProgram(program);
            }
        }
    }
}

fn read_source(path: &Path) -> Result<String, ShaderError> {
    fs::read_to_string(path).map_err(|source| ShaderError::FileRead {
        path: path.display().to_string(),
        source,
    })
}

fn compile_stage(kind: GLenum, stage: &'static str, source: &str) -> Result<GLuint, ShaderError> {
    let source = CString::new(source.as_bytes())?;

    let shader = unsafe { gl::CreateShader(kind) };
    unsafe {
        gl::ShaderSource(shader, 1, &source.as_ptr(), ptr::null());
        gl::CompileShader(shader);
    }

    let mut success = 1;
    unsafe {
        gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut success);
    }
    if success == 0 {
        let log = shader_info_log(shader);
        unsafe {
            gl::DeleteShader(shader);
        }
        return Err(ShaderError::Compile { stage, log });
    }

    Ok(shader)
}

fn shader_info_log(shader: GLuint) -> String {
    let mut len = 0;
    unsafe {
        gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
    }
    let buffer = whitespace_cstring(len as usize);
    unsafe {
        gl::GetShaderInfoLog(shader, len, ptr::null_mut(), buffer.as_ptr() as *mut GLchar);
    }
    buffer.to_string_lossy().into_owned()
}

fn program_info_log(program: GLuint) -> String {
    let mut len = 0;
    unsafe {
        gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
    }
    let buffer = whitespace_cstring(len as usize);
    unsafe {
        gl::GetProgramInfoLog(program, len, ptr::null_mut(), buffer.as_ptr() as *mut GLchar);
    }
    buffer.to_string_lossy().into_owned()
}

fn whitespace_cstring(len: usize) -> CString {
    let mut buffer: Vec<u8> = Vec::with_capacity(len + 1);
    buffer.extend([b' '].iter().cycle().take(len));
    unsafe { CString::from_vec_unchecked(buffer) }
}

#[cfg(test)]
mod tests {
    // Compile, link and swap paths need a current GL context, so they are
    // exercised by running the viewer. What can run headless is the file
    // reading stage, which reload hits before any GL call.
    use super::*;

    #[test]
    fn missing_sources_leave_program_unlinked() {
        let shader = ShaderProgram::new("/nonexistent/a.vert", "/nonexistent/a.frag");
        assert!(!shader.is_linked());
    }

    #[test]
    fn failed_reload_is_a_no_op() {
        let mut shader = ShaderProgram::new("/nonexistent/a.vert", "/nonexistent/a.frag");
        shader.reload();
        shader.reload();
        assert!(!shader.is_linked());
    }

    #[test]
    fn missing_fragment_source_fails_before_gl() {
        // Only the fragment path is unreadable; the reload must bail out at
        // the read stage rather than compile the vertex stage first.
        let dir = tempfile::tempdir().unwrap();
        let vertex = dir.path().join("ok.vert");
        fs::write(&vertex, "#version 330 core\nvoid main() {}\n").unwrap();

        let shader = ShaderProgram::new(&vertex, dir.path().join("missing.frag"));
        assert!(!shader.is_linked());
    }

    #[test]
    fn file_read_error_names_the_path() {
        let err = read_source(Path::new("/nonexistent/a.vert")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/a.vert"));
    }

    #[test]
    fn compile_error_names_the_stage() {
        let err = ShaderError::Compile {
            stage: "fragment",
            log: "0:1(1): error: syntax error".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("fragment"));
        assert!(message.contains("syntax error"));
    }
}
