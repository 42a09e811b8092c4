use std::ffi::CString;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use glam::{Mat4, Vec3};
use glutin::{
    config::ConfigTemplateBuilder,
    context::{ContextApi, ContextAttributesBuilder, GlProfile, PossiblyCurrentContext, Version},
    display::{GetGlDisplay, GlDisplay},
    prelude::*,
    surface::{Surface, WindowSurface},
};
use glutin_winit::{DisplayBuilder, GlWindow};
use log::{error, info, warn, LevelFilter};
use raw_window_handle::HasRawWindowHandle;
use simple_logger::SimpleLogger;
use winit::{
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, ElementState, Event, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowBuilder},
};

use meshview::{ui, Mesh, ShaderProgram, ViewerConfig, ViewerState};

struct App {
    window: Window,
    gl_context: PossiblyCurrentContext,
    gl_surface: Surface<WindowSurface>,
    egui_ctx: egui::Context,
    egui_winit: egui_winit::State,
    painter: egui_glow::Painter,
    shader: ShaderProgram,
    mesh: Mesh,
    state: ViewerState,
    cursor_captured: bool,
    last_frame: Instant,
}

impl App {
    fn new(config: ViewerConfig) -> Result<(Self, EventLoop<()>)> {
        info!("initializing viewer");

        let event_loop = EventLoop::new()?;
        let window_builder = WindowBuilder::new()
            .with_title("meshview")
            .with_inner_size(LogicalSize::new(config.window_width, config.window_height));

        let template = ConfigTemplateBuilder::new().with_depth_size(24);
        let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

        let (window, gl_config) = display_builder
            .build(&event_loop, template, |configs| {
                configs
                    .reduce(|best, candidate| {
                        if candidate.num_samples() > best.num_samples() {
                            candidate
                        } else {
                            best
                        }
                    })
                    .expect("no GL configs offered")
            })
            .map_err(|err| anyhow::anyhow!("failed to build GL display: {}", err))?;
        let window = window.context("display builder returned no window")?;

        let raw_window_handle = window.raw_window_handle();
        let gl_display = gl_config.display();

        let context_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .with_profile(GlProfile::Core)
            .build(Some(raw_window_handle));

        let gl_context = unsafe { gl_display.create_context(&gl_config, &context_attributes)? };

        let attrs = window.build_surface_attributes(<_>::default());
        let gl_surface = unsafe { gl_display.create_window_surface(&gl_config, &attrs)? };
        let gl_context = gl_context.make_current(&gl_surface)?;

        gl::load_with(|symbol| {
            let symbol = CString::new(symbol).unwrap();
            gl_display.get_proc_address(symbol.as_c_str()) as *const _
        });

        let glow_context = Arc::new(unsafe {
            glow::Context::from_loader_function(|symbol| {
                let symbol = CString::new(symbol).unwrap();
                gl_display.get_proc_address(symbol.as_c_str()) as *const _
            })
        });

        let egui_ctx = egui::Context::default();
        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &event_loop,
            None,
            None,
        );
        let painter = egui_glow::Painter::new(glow_context, "", None)
            .map_err(|err| anyhow::anyhow!("egui painter: {}", err))?;

        // Both of these fail soft: a missing model or broken shader leaves
        // the viewer running with nothing to draw.
        let shader = ShaderProgram::new(&config.vertex_shader, &config.fragment_shader);
        let mesh = Mesh::load(&config.model);

        let mut state = ViewerState::new();
        state.mouse_sensitivity = config.mouse_sensitivity;

        let mut app = Self {
            window,
            gl_context,
            gl_surface,
            egui_ctx,
            egui_winit,
            painter,
            shader,
            mesh,
            state,
            cursor_captured: false,
            last_frame: Instant::now(),
        };
        app.set_cursor_captured(true);

        Ok((app, event_loop))
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if let (Some(width), Some(height)) =
            (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        {
            self.gl_surface.resize(&self.gl_context, width, height);
            unsafe {
                gl::Viewport(0, 0, size.width as i32, size.height as i32);
            }
        }
    }

    /// Holding Alt releases the cursor so the panel can be used; releasing
    /// Alt recaptures it for mouse-look.
    fn set_cursor_captured(&mut self, captured: bool) {
        let mode = if captured {
            CursorGrabMode::Locked
        } else {
            CursorGrabMode::None
        };
        let grabbed = self.window.set_cursor_grab(mode).or_else(|_| {
            if captured {
                self.window.set_cursor_grab(CursorGrabMode::Confined)
            } else {
                Ok(())
            }
        });
        if let Err(err) = grabbed {
            warn!("cursor grab not available: {}", err);
        }
        self.window.set_cursor_visible(!captured);
        self.cursor_captured = captured;
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        // Hot reload happens at a frame boundary, never mid-draw.
        if self.state.take_reload_request() {
            self.shader.reload();
        }
        self.state.update(dt);

        unsafe {
            // The egui painter turns depth testing off; the scene needs it
            // back every frame.
            gl::Enable(gl::DEPTH_TEST);
            gl::ClearColor(0.1, 0.1, 0.1, 1.0);
            gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
        }

        self.draw_scene();
        self.draw_panel();

        if let Err(err) = self.gl_surface.swap_buffers(&self.gl_context) {
            error!("swap_buffers failed: {}", err);
        }
    }

    fn draw_scene(&mut self) {
        if !self.shader.is_linked() || !self.mesh.is_drawable() {
            return;
        }
        let size = self.window.inner_size();
        if size.height == 0 {
            return;
        }
        let aspect_ratio = size.width as f32 / size.height as f32;

        let camera = &self.state.camera;
        self.shader.bind();
        self.shader.set_bool("u_hasNormals", self.mesh.has_normals());
        self.shader.set_vec3("viewPos", camera.position);
        self.shader.set_vec3("lightPos", self.state.light_position);
        self.shader
            .set_vec3("lightColor", Vec3::from(self.state.light_color));
        self.shader.set_mat4("view", &camera.view_matrix());
        self.shader
            .set_mat4("projection", &camera.projection_matrix(aspect_ratio));
        self.shader.set_mat4("model", &Mat4::IDENTITY);

        self.mesh.draw();
    }

    fn draw_panel(&mut self) {
        let raw_input = self.egui_winit.take_egui_input(&self.window);
        self.egui_ctx.begin_frame(raw_input);

        ui::show(&self.egui_ctx, &mut self.state);

        let full_output = self.egui_ctx.end_frame();
        let clipped_primitives = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        let size = self.window.inner_size();
        self.painter.paint_and_update_textures(
            [size.width, size.height],
            self.window.scale_factor() as f32,
            &clipped_primitives,
            &full_output.textures_delta,
        );

        self.egui_winit
            .handle_platform_output(&self.window, full_output.platform_output);
    }
}

fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    let mut config = ViewerConfig::load(Path::new("viewer.toml"));
    if let Some(model) = std::env::args().nth(1) {
        config.model = PathBuf::from(model);
    }

    let (mut app, event_loop) = App::new(config)?;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => {
            let response = app.egui_winit.on_window_event(&app.window, &event);

            match event {
                WindowEvent::CloseRequested => {
                    app.painter.destroy();
                    elwt.exit();
                }
                WindowEvent::Resized(size) => app.resize(size),
                WindowEvent::RedrawRequested => app.redraw(),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(code),
                            state,
                            repeat,
                            ..
                        },
                    ..
                } => match code {
                    KeyCode::Escape => {
                        app.painter.destroy();
                        elwt.exit();
                    }
                    KeyCode::AltLeft => {
                        app.set_cursor_captured(state == ElementState::Released);
                    }
                    _ => {
                        if !response.consumed {
                            app.state.handle_key(code, state, repeat);
                        }
                    }
                },
                WindowEvent::MouseWheel { delta, .. } => {
                    if !response.consumed && !app.egui_ctx.wants_pointer_input() {
                        app.state.handle_mouse_scroll(delta);
                    }
                }
                _ => {}
            }
        }
        Event::DeviceEvent {
            event: DeviceEvent::MouseMotion { delta },
            ..
        } => {
            // Mouse-look only while the cursor is captured and the panel is
            // not using the pointer.
            if app.cursor_captured && !app.egui_ctx.wants_pointer_input() {
                app.state.handle_mouse_motion(delta);
            }
        }
        Event::AboutToWait => app.window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}
