//! The windowed demo application.
//!
//! Wires the demo scene together: the four-sided polygon region, one point
//! emitter in the interior, one bar emitter along the bottom edge, and a
//! 15k particle pool driven by [`ComputeUpdater`] every frame.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    window::{Window, WindowId},
};

use crate::emitter::Emitter;
use crate::gpu::GpuState;
use crate::particle::ParticlePool;
use crate::region;
use crate::time::Time;
use crate::updater::ComputeUpdater;

const DEMO_PARTICLE_COUNT: u32 = 15_000;

struct Scene {
    gpu: GpuState,
    updater: ComputeUpdater,
    time: Time,
}

pub struct App {
    window: Option<Arc<Window>>,
    scene: Option<Scene>,
}

impl App {
    pub fn new() -> Self {
        Self {
            window: None,
            scene: None,
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Region-local to window space: squeeze the wider axis so the region
/// keeps its shape regardless of window aspect ratio.
fn window_transform(width: u32, height: u32) -> Mat4 {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    if w > h {
        Mat4::from_scale(Vec3::new(h / w, 1.0, 1.0))
    } else {
        Mat4::from_scale(Vec3::new(1.0, w / h, 1.0))
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window_attrs = Window::default_attributes()
                .with_title("polyspray")
                .with_inner_size(winit::dpi::LogicalSize::new(900, 900));

            let window = Arc::new(event_loop.create_window(window_attrs).unwrap());
            self.window = Some(window.clone());

            let mut updater = ComputeUpdater::new(DEMO_PARTICLE_COUNT);
            updater
                .add_emitter(Emitter::point(Vec2::new(0.0, -0.2), 0.3, 0.5))
                .unwrap();
            updater
                .add_emitter(Emitter::bar(
                    Vec2::new(-0.5, -0.75),
                    Vec2::new(0.5, -0.75),
                    Vec2::Y,
                    0.1,
                    0.3,
                ))
                .unwrap();

            let mut pool = ParticlePool::new(DEMO_PARTICLE_COUNT);
            updater.init_particles(&mut pool);

            let faces = region::demo_region();
            match pollster::block_on(GpuState::new(window, &pool, &faces)) {
                Ok(gpu) => {
                    self.scene = Some(Scene {
                        gpu,
                        updater,
                        time: Time::new(),
                    });
                }
                Err(e) => {
                    eprintln!("GPU initialization failed: {}", e);
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(scene) = &mut self.scene {
                    scene.gpu.resize(physical_size);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(scene) = &mut self.scene {
                    let (_, delta) = scene.time.update();
                    let transform =
                        window_transform(scene.gpu.config.width, scene.gpu.config.height);

                    scene.updater.update(delta, transform, &mut scene.gpu);

                    match scene.gpu.render(transform) {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost) => {
                            scene.gpu.resize(winit::dpi::PhysicalSize {
                                width: scene.gpu.config.width,
                                height: scene.gpu.config.height,
                            })
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                        Err(e) => eprintln!("Render error: {:?}", e),
                    }

                    if scene.time.frame() % 60 == 0 {
                        if let Some(window) = &self.window {
                            window.set_title(&format!("polyspray - {:.0} fps", scene.time.fps()));
                        }
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_window_transform_preserves_region_shape() {
        // Wide window: x gets squeezed, y untouched.
        let t = window_transform(1600, 800);
        let p = t * Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert!((p.x - 0.5).abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);

        // Square window: identity.
        let t = window_transform(900, 900);
        assert!(t.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
