// main.rs — window, event loop, menu bar and status bar

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use glam::{UVec2, Vec2};
use log::{error, info, warn};
use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

use spherical_monitor::app::RenderLoop;
use spherical_monitor::bridge::Viewport;
use spherical_monitor::capture::x11::X11Backend;
use spherical_monitor::capture::{CaptureStatus, CaptureSource, CaptureSummary};
use spherical_monitor::config::{Cli, Settings};
use spherical_monitor::controls::{Key, KeySnapshot, ViewState};
use spherical_monitor::projection::ProjectionMode;
use spherical_monitor::renderer::Renderer;

const WINDOW_TITLE: &str = "Spherical Monitor (Window Capture)";

/// Overlay state that is not part of the view.
#[derive(Debug, Default)]
struct Hud {
    show_fps: bool,
    fullscreen: bool,
}

impl Hud {
    fn toggle_fullscreen(&mut self, window: &Window) {
        self.fullscreen = !self.fullscreen;
        if self.fullscreen {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        } else {
            window.set_fullscreen(None);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (settings, warnings) = Settings::resolve(&cli);
    for warning in &warnings {
        warn!("{warning}");
    }

    let backend = X11Backend::connect(settings.capture_display.as_deref())
        .context("cannot open the capture display")?;

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .context("creating the window")?,
    );

    let mut renderer = pollster::block_on(Renderer::new(window.clone()))?;
    let capture = CaptureSource::initialize(backend, &settings.capture_settings(), &mut renderer);
    let mut render_loop = Some(RenderLoop::new(&settings, capture));
    let mut renderer = Some(renderer);

    let mut keys = KeySnapshot::default();
    let mut hud = Hud::default();
    // last pointer position, logical pixels
    let mut cursor = Vec2::ZERO;

    // FPS
    let mut last_frame_time = Instant::now();
    let mut frame_count = 0;
    let mut fps = 0.0;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => {
                let (Some(renderer), Some(app)) = (renderer.as_mut(), render_loop.as_mut()) else {
                    return;
                };

                // A held gesture is always finished, even over the HUD.
                match event {
                    WindowEvent::MouseInput {
                        state: ElementState::Released,
                        button: MouseButton::Left,
                        ..
                    } if app.bridge().is_pressed() => {
                        app.pointer_released(cursor, &viewport(&window, renderer));
                    }
                    WindowEvent::Focused(false) => {
                        keys.clear();
                        app.cancel_pointer();
                    }
                    _ => {}
                }

                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        renderer.resize(*new_inner_size);
                    }

                    WindowEvent::KeyboardInput { input, .. } => {
                        let Some(code) = input.virtual_keycode else {
                            return;
                        };
                        let pressed = input.state == ElementState::Pressed;
                        if code == VirtualKeyCode::F11 && pressed {
                            hud.toggle_fullscreen(&window);
                        }
                        if let Some(key) = Key::from_keycode(code) {
                            if pressed {
                                keys.press(key);
                            } else {
                                keys.release(key);
                            }
                        }
                    }

                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    } => {
                        app.pointer_pressed(cursor, &viewport(&window, renderer));
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        let logical = position.to_logical::<f32>(window.scale_factor());
                        cursor = Vec2::new(logical.x, logical.y);
                        app.pointer_moved(cursor, &viewport(&window, renderer));
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                frame_count += 1;
                let now = Instant::now();
                let elapsed = now.duration_since(last_frame_time).as_secs_f32();
                if elapsed >= 1.0 {
                    fps = frame_count as f32 / elapsed;
                    frame_count = 0;
                    last_frame_time = now;
                }

                let (Some(renderer), Some(app)) = (renderer.as_mut(), render_loop.as_mut()) else {
                    return;
                };

                let update = app.step(&keys, now, renderer);
                if let Some(mesh) = &update.mesh {
                    renderer.set_mesh(mesh);
                }
                renderer.update_camera(&app.view().camera);

                let summary = app.capture().summary();
                let render_result = renderer.render_with_ui(&window, |ctx| {
                    draw_hud(ctx, app.view_mut(), &mut hud, summary, fps, &window);
                });

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.reconfigure(),
                    Err(wgpu::SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                    Err(e) => warn!("Render error: {e:?}"),
                }
            }

            Event::MainEventsCleared => {
                window.request_redraw();
            }

            Event::LoopDestroyed => {
                // capture connection first, then the texture it fed
                if let Some(mut app) = render_loop.take() {
                    app.cancel_pointer();
                    drop(app);
                    info!("Capture stopped");
                }
                drop(renderer.take());
            }

            _ => {}
        }
    })
}

fn viewport(window: &Window, renderer: &Renderer) -> Viewport {
    let logical: LogicalSize<f32> = renderer.size.to_logical(window.scale_factor());
    Viewport::new(
        Vec2::new(logical.width, logical.height),
        UVec2::new(renderer.size.width, renderer.size.height),
    )
}

fn draw_hud(
    ctx: &egui::Context,
    view: &mut ViewState,
    hud: &mut Hud,
    capture: CaptureSummary,
    fps: f32,
    window: &Window,
) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("View", |ui| {
                if ui.button("Reset view").clicked() {
                    view.camera.reset();
                    ui.close_menu();
                }

                let label = if hud.fullscreen {
                    "Exit fullscreen (F11)"
                } else {
                    "Fullscreen (F11)"
                };
                if ui.button(label).clicked() {
                    hud.toggle_fullscreen(window);
                    ui.close_menu();
                }

                ui.separator();
                ui.menu_button("Projection mode", |ui| {
                    for mode in ProjectionMode::ALL {
                        if ui.radio(view.mode == mode, mode.name()).clicked() {
                            view.set_mode(mode);
                            ui.close_menu();
                        }
                    }
                });

                ui.separator();
                if ui.checkbox(&mut hud.show_fps, "Show FPS").clicked() {
                    ui.close_menu();
                }
            });
        });
    });

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.label(format!("Mode: {}", view.mode));
            ui.label("|");
            ui.label(format!("FOV: {:.1}°", view.camera.fov_y_deg()));
            ui.label("|");
            ui.label(format!("Yaw: {:.1}°", view.camera.yaw_deg()));
            ui.label("|");
            ui.label(format!("Pitch: {:.1}°", view.camera.pitch_deg()));

            match view.mode {
                ProjectionMode::Morph => {
                    ui.label("|");
                    ui.label(format!("Sphericity: {:.1}", view.params.sphericity()));
                }
                ProjectionMode::SphereClamp => {
                    ui.label("|");
                    ui.label(format!("θmax: {:.1}°", view.params.theta_max_deg()));
                }
                _ => {}
            }

            ui.label("|");
            ui.label(format!("Capture: {}", capture.size));

            let notice = match capture.status {
                CaptureStatus::Placeholder => Some("waiting for first capture"),
                CaptureStatus::Stale => Some("capture failing, showing last frame"),
                CaptureStatus::Live => None,
            };
            for text in notice
                .into_iter()
                .chain(capture.cropped.then_some("cropped to texture limit"))
            {
                ui.label("|");
                ui.label(egui::RichText::new(text).color(egui::Color32::YELLOW));
            }

            if hud.show_fps {
                ui.label("|");
                ui.label(egui::RichText::new(format!("FPS: {fps:.1}")).color(egui::Color32::GREEN));
            }
        });
    });
}
