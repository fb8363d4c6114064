//! Interactive viewer: loads an OBJ scene and renders it with voxel
//! cone-traced global illumination.
//!
//! Usage: `voxcone-viewer [model.obj] [scale]`
//!
//! Controls: WASD/space/shift to move, hold right mouse to look.
//! 1-4 cycle the debug views (voxels, radiance, normals, dominant axis),
//! X/Y/Z force a voxelization axis (C returns to per-triangle selection),
//! F toggles wireframe, N normal mapping, I indirect lighting, B shadows,
//! and [ / ] step the radiance mip shown by the debug view.

use std::sync::Arc;

use anyhow::Result;
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use voxcone::context::Context;
use voxcone::renderer::Renderer;
use voxcone::resources::load_mesh_obj;
use voxcone::scene::Scene;
use voxcone::settings::VoxelConfig;

struct ViewerState {
    ctx: Context,
    renderer: Renderer,
    scene: Scene,
    mouse_look: bool,
}

impl ViewerState {
    async fn new(window: Arc<Window>, model_path: &str, scale: f32) -> Result<Self> {
        let ctx = Context::new(window).await?;

        let renderer = Renderer::new(
            &ctx.device,
            &ctx.capabilities,
            VoxelConfig::default(),
            &ctx.camera.buffer,
            ctx.config.format,
        )?;

        let mut scene = Scene::new();
        let mesh = load_mesh_obj(
            model_path,
            cgmath::Matrix4::from_scale(scale),
            &ctx.device,
            &ctx.queue,
            &renderer.layouts,
        )
        .await?;
        scene.add_mesh(mesh);

        Ok(Self {
            ctx,
            renderer,
            scene,
            mouse_look: false,
        })
    }

    fn handle_key(&mut self, code: KeyCode) {
        let max_mip = self.renderer.config().levels as i32;
        let settings = &mut self.renderer.settings;
        match code {
            KeyCode::Digit1 => settings.draw_voxels = !settings.draw_voxels,
            KeyCode::Digit2 => settings.draw_radiance = !settings.draw_radiance,
            KeyCode::Digit3 => settings.draw_normals = !settings.draw_normals,
            KeyCode::Digit4 => settings.draw_dominant_axis = !settings.draw_dominant_axis,
            KeyCode::KeyX => settings.axis_override = 0,
            KeyCode::KeyY => settings.axis_override = 1,
            KeyCode::KeyZ => settings.axis_override = 2,
            KeyCode::KeyC => settings.axis_override = -1,
            KeyCode::KeyF => settings.wireframe = !settings.wireframe,
            KeyCode::KeyN => settings.enable_normal_map = !settings.enable_normal_map,
            KeyCode::KeyI => settings.enable_indirect = !settings.enable_indirect,
            KeyCode::KeyB => settings.enable_shadows = !settings.enable_shadows,
            KeyCode::BracketLeft => settings.mip_level = (settings.mip_level - 1).max(0),
            KeyCode::BracketRight => {
                settings.mip_level = (settings.mip_level + 1).min(max_mip);
            }
            _ => return,
        }
        log::debug!("settings: {:?}", self.renderer.settings);
    }

    fn render(&mut self, dt: instant::Duration) -> Result<(), wgpu::SurfaceError> {
        let projection = &self.ctx.projection;
        self.ctx.camera.update(&self.ctx.queue, projection, dt);

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer.render_frame(
            &self.ctx.device,
            &self.ctx.queue,
            &view,
            &self.ctx.depth_texture.view,
            &self.scene,
        );

        output.present();
        Ok(())
    }
}

struct Viewer {
    model_path: String,
    scale: f32,
    state: Option<ViewerState>,
    last_time: Instant,
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let attributes = Window::default_attributes().with_title("voxcone viewer");
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("window creation failed: {}", e);
                event_loop.exit();
                return;
            }
        };

        match futures::executor::block_on(ViewerState::new(window, &self.model_path, self.scale)) {
            Ok(state) => {
                state.ctx.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => {
                log::error!("initialization failed: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if state.mouse_look {
                state.ctx.camera.controller.process_mouse(dx, dy);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.ctx.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: key_state,
                        repeat,
                        ..
                    },
                ..
            } => {
                if !state.ctx.camera.controller.process_keyboard(code, key_state)
                    && key_state == ElementState::Pressed
                    && !repeat
                {
                    state.handle_key(code);
                }
            }
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Right,
                ..
            } => {
                state.mouse_look = button_state.is_pressed();
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                match state.render(dt) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.ctx.resize(size.width, size.height);
                    }
                    Err(e) => log::error!("render failed: {}", e),
                }
                state.ctx.window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let model_path = std::env::args().nth(1).unwrap_or_else(|| "sponza.obj".to_string());
    let scale = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(1.0);

    let event_loop = EventLoop::new()?;
    let mut viewer = Viewer {
        model_path,
        scale,
        state: None,
        last_time: Instant::now(),
    };
    event_loop.run_app(&mut viewer)?;
    Ok(())
}
