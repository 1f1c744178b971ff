use std::{sync::Arc, time::Instant};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    event::{ElementState, KeyEvent, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    config::EtherOptions,
    error::Result,
    gfx::{Palette, RenderEngine},
    performance::PerformanceMonitor,
    simulation::{
        fluid::FluidSimulation, gpu::GpuFluidSimulation, manager::SimulationManager,
        traits::Simulation,
    },
};

pub struct EtherApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    options: EtherOptions,
    palette: Palette,
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    host: Option<SimulationManager>,
    performance: PerformanceMonitor,
}

impl EtherApp {
    pub fn new(options: EtherOptions) -> Result<Self> {
        let event_loop = EventLoop::new()?;
        let palette = Palette::from_stops(&options.colors);

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                options,
                palette,
                window: None,
                render_engine: None,
                host: None,
                performance: PerformanceMonitor::new(),
            },
        })
    }

    /// Run the application until the window closes
    pub fn run(mut self) -> Result<()> {
        let Some(event_loop) = self.event_loop.take() else {
            return Ok(());
        };
        // Frames are self-scheduled from RedrawRequested while the host runs
        event_loop.set_control_flow(ControlFlow::Wait);
        event_loop.run_app(&mut self.app_state)?;
        Ok(())
    }
}

impl AppState {
    fn logical_size(window: &Window, size: PhysicalSize<u32>) -> (f32, f32) {
        let logical: LogicalSize<f32> = size.to_logical(window.scale_factor());
        (logical.width, logical.height)
    }

    fn logical_position(&self, position: PhysicalPosition<f64>) -> Option<(f32, f32)> {
        let window = self.window.as_ref()?;
        let logical = position.to_logical::<f32>(window.scale_factor());
        Some((logical.x, logical.y))
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(host) = self.host.as_mut() {
            host.dispose();
        }
        event_loop.exit();
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Arc::new(
            event_loop.create_window(
                WindowAttributes::default()
                    .with_title("etherflow")
                    .with_inner_size(LogicalSize::new(1200, 800)),
            )?,
        );

        let physical = window.inner_size();
        let renderer = pollster::block_on(RenderEngine::new(
            window.clone(),
            physical.width,
            physical.height,
            &self.palette,
        ))?;

        let container = Self::logical_size(&window, physical);
        let params = self.options.simulation_params();
        let simulation: Box<dyn Simulation> = if self.options.cpu_solver {
            Box::new(FluidSimulation::new(params, container))
        } else {
            Box::new(GpuFluidSimulation::new(
                renderer.device(),
                renderer.queue(),
                params,
                container,
            ))
        };
        let mut host =
            SimulationManager::with_simulation(&self.options, container, Instant::now(), simulation);
        host.start();

        self.window = Some(window);
        self.render_engine = Some(renderer);
        self.host = Some(host);
        self.request_redraw();
        Ok(())
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.create_window(event_loop) {
            log::error!("Renderer unavailable: {}", err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let now = Instant::now();
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            }
            | WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::CursorMoved { position, .. } => {
                if let (Some((x, y)), Some(host)) =
                    (self.logical_position(position), self.host.as_mut())
                {
                    host.pointer_moved(x, y, now);
                }
            }
            WindowEvent::CursorEntered { .. } => {
                if let Some(host) = self.host.as_mut() {
                    host.pointer_entered();
                }
            }
            WindowEvent::CursorLeft { .. } => {
                if let Some(host) = self.host.as_mut() {
                    host.pointer_left();
                }
            }
            WindowEvent::Touch(touch) => {
                let Some((x, y)) = self.logical_position(touch.location) else {
                    return;
                };
                let Some(host) = self.host.as_mut() else {
                    return;
                };
                match touch.phase {
                    TouchPhase::Started => host.touch_started(touch.id, x, y, now),
                    TouchPhase::Moved => host.touch_moved(touch.id, x, y, now),
                    TouchPhase::Ended | TouchPhase::Cancelled => host.touch_ended(touch.id),
                }
            }
            WindowEvent::Resized(size) => {
                let (Some(window), Some(host)) = (self.window.as_ref(), self.host.as_mut()) else {
                    return;
                };
                if size.width == 0 || size.height == 0 {
                    host.set_on_screen(false);
                    return;
                }
                let (width, height) = Self::logical_size(window, size);
                host.resize(width, height);
                if let Some(render_engine) = self.render_engine.as_mut() {
                    render_engine.resize(size.width, size.height);
                }
                if host.set_on_screen(true) {
                    window.request_redraw();
                }
            }
            WindowEvent::Occluded(occluded) => {
                let restarted = self
                    .host
                    .as_mut()
                    .is_some_and(|host| host.set_document_hidden(occluded));
                if restarted {
                    self.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                let (Some(host), Some(render_engine)) =
                    (self.host.as_mut(), self.render_engine.as_mut())
                else {
                    return;
                };
                let Some(field) = host.tick(now) else {
                    return;
                };
                render_engine.render_frame(field);
                self.performance.record_frame(now, Instant::now());
                self.request_redraw();
            }
            _ => (),
        }
    }
}
