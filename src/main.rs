// main.rs — 窗口、事件循环、菜单、状态栏与叠加层

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

mod cli;
mod renderer;

use cli::{Cli, LoadOptions};
use renderer::Renderer;

use clap::Parser;
use glam::Vec2;
use house_tour::cursor::PointerAffordance;
use house_tour::manifest::{FLOOR_PLAN_VIEW, OUTSIDE_VIEW};
use house_tour::tour::ErrorBanner;
use house_tour::view::TourEvent;
use house_tour::{
    ChangeOptions, HouseTour, Manifest, TextureCatalog, TourConfig, TransitionKind,
};

use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{CursorIcon, Fullscreen, Window, WindowBuilder},
};

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Marker, reticle and infospot images; absent files fall back to shapes.
const OVERLAY_IMAGES: [&str; 3] = ["hotspot.png", "reticle.png", "infospot.png"];

struct LoadedTour {
    path: PathBuf,
    manifest: Manifest,
    config: TourConfig,
    catalog: TextureCatalog,
}

type LoadResult = house_tour::Result<LoadedTour>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let options = cli.load_options();

    let event_loop = EventLoop::new();
    let window = match WindowBuilder::new()
        .with_title("House Tour")
        .with_inner_size(LogicalSize::new(cli.width, cli.height))
        .build(&event_loop)
    {
        Ok(w) => Arc::new(w),
        Err(e) => {
            log::error!("failed to create window: {e}");
            std::process::exit(1);
        }
    };

    let mut renderer = match pollster::block_on(Renderer::new(window.clone())) {
        Ok(r) => r,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    let mut tour: Option<HouseTour> = None;
    let mut icons = OverlayIcons::default();
    let mut shell_banner = ErrorBanner::default();
    let mut status = ShellStatus::default();

    // 交互状态
    let mut cursor_pos = Vec2::ZERO;
    let mut ui_dirty = true;
    let mut last_tick = Instant::now();

    // FPS 计算
    let mut last_frame_time = Instant::now();
    let mut frame_count = 0;

    // 异步加载通道
    let (tx, rx): (Sender<LoadResult>, Receiver<LoadResult>) = channel();

    if let Some(path) = cli.manifest.clone() {
        status.loading = true;
        start_load_tour(path, options.clone(), tx.clone());
    }

    event_loop.run(move |event, _, control_flow| {
        // 检查后台加载结果
        if let Ok(result) = rx.try_recv() {
            status.loading = false;
            ui_dirty = true;
            match result.and_then(|loaded| open_tour(loaded, &options)) {
                Ok(mut new_tour) => {
                    let size = renderer.size;
                    new_tour.resize(size.width as f32, size.height as f32);
                    renderer.upload_catalog(new_tour.cache());
                    icons = OverlayIcons::default();
                    shell_banner.clear();
                    tour = Some(new_tour);
                }
                Err(e) => {
                    log::error!("{e}");
                    shell_banner.raise(e.to_string());
                }
            }
        }

        match event {
            Event::WindowEvent { event, .. } => {
                ui_dirty = true;
                // 先让 egui 处理事件
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
                        if let Some(t) = tour.as_mut() {
                            t.resize(new_size.width as f32, new_size.height as f32);
                        }
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        renderer.resize(*new_inner_size);
                        if let Some(t) = tour.as_mut() {
                            t.resize(new_inner_size.width as f32, new_inner_size.height as f32);
                        }
                    }

                    WindowEvent::Occluded(hidden) => {
                        if let Some(t) = tour.as_mut() {
                            if hidden {
                                t.suspend();
                            } else {
                                t.resume();
                            }
                        }
                    }

                    // 键盘快捷键
                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state == ElementState::Pressed {
                            match input.virtual_keycode {
                                Some(VirtualKeyCode::O) => {
                                    if let Some(path) = pick_manifest() {
                                        status.loading = true;
                                        start_load_tour(path, options.clone(), tx.clone());
                                    }
                                }
                                Some(VirtualKeyCode::F11) => toggle_fullscreen(&window),
                                _ => {}
                            }
                        }
                    }

                    // 鼠标交互
                    WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                        if let Some(t) = tour.as_mut() {
                            match state {
                                ElementState::Pressed => t.pointer_down(cursor_pos),
                                ElementState::Released => t.pointer_up(cursor_pos),
                            }
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor_pos = Vec2::new(position.x as f32, position.y as f32);
                        if let Some(t) = tour.as_mut() {
                            t.pointer_move(cursor_pos);
                            window.set_cursor_icon(match t.affordance() {
                                PointerAffordance::Clickable => CursorIcon::Hand,
                                PointerAffordance::Default => CursorIcon::Default,
                            });
                        }
                    }

                    WindowEvent::CursorLeft { .. } => {
                        if let Some(t) = tour.as_mut() {
                            t.pointer_left();
                        }
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        let scroll = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                        };
                        if let Some(t) = tour.as_mut() {
                            t.wheel(scroll);
                        }
                    }

                    WindowEvent::DroppedFile(path) => {
                        status.loading = true;
                        start_load_tour(path, options.clone(), tx.clone());
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f32().min(0.1);
                last_tick = now;
                ui_dirty = false;

                // FPS 统计
                frame_count += 1;
                let elapsed = now.duration_since(last_frame_time).as_secs_f32();
                if elapsed >= 1.0 {
                    status.fps = frame_count as f32 / elapsed;
                    frame_count = 0;
                    last_frame_time = now;
                }

                if let Some(t) = tour.as_mut() {
                    t.tick(dt);
                    for event in t.take_events() {
                        status.note(&event);
                        if let TourEvent::ResourceMissing { view, texture } = event {
                            shell_banner.raise(format!("{view}: missing texture {texture}"));
                        }
                    }
                    if t.take_rebind_request() {
                        renderer.upload_catalog(t.cache());
                    }
                    renderer.update_frame(&t.frame());
                }

                let mut requests = UiRequests::default();
                let render_result = renderer.render_with_ui(&window, |ctx| {
                    draw_ui(
                        ctx,
                        tour.as_ref(),
                        &shell_banner,
                        &status,
                        &mut icons,
                        &mut requests,
                        window.fullscreen().is_some(),
                    );
                });

                if let Some(path) = requests.open_manifest.take() {
                    status.loading = true;
                    start_load_tour(path, options.clone(), tx.clone());
                }
                if requests.toggle_fullscreen {
                    toggle_fullscreen(&window);
                }
                if requests.dismiss_banner {
                    shell_banner.clear();
                    if let Some(t) = tour.as_mut() {
                        t.banner_mut().clear();
                    }
                }
                if let Some(t) = tour.as_mut() {
                    if let Some(view) = requests.change_view.take() {
                        let outcome = t.change_view(&view, ChangeOptions::default());
                        log::debug!("menu {view} -> {outcome:?}");
                    }
                    if let Some(kind) = requests.transition {
                        t.set_transition_kind(kind);
                    }
                }

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => match tour.as_mut() {
                        Some(t) => {
                            t.on_context_lost();
                            renderer.reconfigure();
                            t.on_context_restored();
                        }
                        None => renderer.reconfigure(),
                    },
                    Err(wgpu::SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                    Err(e) => log::warn!("render error: {e:?}"),
                }
            }

            Event::MainEventsCleared => {
                let active = status.loading
                    || ui_dirty
                    || tour.as_ref().map_or(false, HouseTour::is_render_active);
                if active {
                    window.request_redraw();
                    *control_flow = ControlFlow::Poll;
                } else if *control_flow != ControlFlow::Exit {
                    *control_flow = ControlFlow::Wait;
                }
            }

            _ => {}
        }
    });
}

fn open_tour(loaded: LoadedTour, options: &LoadOptions) -> house_tour::Result<HouseTour> {
    let mut tour = HouseTour::open(&loaded.manifest, loaded.config, loaded.catalog)?;
    if let Some(kind) = options.transition {
        tour.set_transition_kind(kind);
    }
    log::info!("tour ready: {}", loaded.path.display());
    Ok(tour)
}

fn load_tour(path: &Path, options: &LoadOptions) -> LoadResult {
    let mut manifest = Manifest::load(path)?;
    if let Some(start) = &options.start {
        manifest.start_point = start.clone();
    }
    let config = match &options.config {
        Some(config_path) => TourConfig::load(config_path)?,
        None => TourConfig::default(),
    };
    let assets = options.assets_for(path);
    let mut catalog = TextureCatalog::load_all(&assets, manifest.texture_names())?;
    catalog.load_optional(&assets, OVERLAY_IMAGES);
    Ok(LoadedTour {
        path: path.to_path_buf(),
        manifest,
        config,
        catalog,
    })
}

fn start_load_tour(path: PathBuf, options: LoadOptions, tx: Sender<LoadResult>) {
    thread::spawn(move || {
        log::info!("loading tour {} in background", path.display());
        if tx.send(load_tour(&path, &options)).is_err() {
            log::error!("failed to hand the loaded tour to the main thread");
        }
    });
}

fn pick_manifest() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Tour manifest", &["json"])
        .pick_file()
}

fn toggle_fullscreen(window: &Window) {
    if window.fullscreen().is_some() {
        window.set_fullscreen(None);
    } else {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
    }
}

#[derive(Default)]
struct ShellStatus {
    loading: bool,
    fps: f32,
    last_event: String,
}

impl ShellStatus {
    fn note(&mut self, event: &TourEvent) {
        match event {
            TourEvent::ModeChanged(mode) => self.last_event = format!("entered {}", mode.name()),
            TourEvent::ResourceMissing { texture, .. } => {
                self.last_event = format!("missing {texture}")
            }
            TourEvent::Rendering(_) => {}
        }
    }
}

#[derive(Default)]
struct UiRequests {
    open_manifest: Option<PathBuf>,
    change_view: Option<String>,
    transition: Option<TransitionKind>,
    toggle_fullscreen: bool,
    dismiss_banner: bool,
}

/// egui copies of the optional overlay images, created on first use.
#[derive(Default)]
struct OverlayIcons {
    loaded: bool,
    hotspot: Option<egui::TextureHandle>,
    reticle: Option<egui::TextureHandle>,
    infospot: Option<egui::TextureHandle>,
}

impl OverlayIcons {
    fn ensure(&mut self, ctx: &egui::Context, catalog: &TextureCatalog) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        let load = |name: &str| {
            use house_tour::ResourceCache;
            let img = catalog.texture(name).and_then(|h| catalog.image(h))?;
            let size = [img.width() as usize, img.height() as usize];
            let color = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
            Some(ctx.load_texture(name, color, egui::TextureOptions::LINEAR))
        };
        self.hotspot = load(OVERLAY_IMAGES[0]);
        self.reticle = load(OVERLAY_IMAGES[1]);
        self.infospot = load(OVERLAY_IMAGES[2]);
    }
}

const FULL_UV: egui::Rect = egui::Rect {
    min: egui::Pos2 { x: 0.0, y: 0.0 },
    max: egui::Pos2 { x: 1.0, y: 1.0 },
};

fn draw_overlay(ctx: &egui::Context, tour: &HouseTour, icons: &OverlayIcons) {
    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Background,
        egui::Id::new("tour_overlay"),
    ));
    // tour 坐标为物理像素
    let ppp = ctx.pixels_per_point();
    let to_pos = |v: Vec2| egui::pos2(v.x / ppp, v.y / ppp);

    for marker in tour.hotspot_markers() {
        let alpha = (marker.opacity.clamp(0.0, 1.0) * 255.0) as u8;
        let center = to_pos(marker.screen);
        let radius = (marker.radius / ppp).max(4.0);
        match &icons.hotspot {
            Some(tex) => painter.image(
                tex.id(),
                egui::Rect::from_center_size(center, egui::vec2(radius, radius) * 2.0),
                FULL_UV,
                egui::Color32::from_white_alpha(alpha),
            ),
            None => {
                painter.circle_filled(center, radius, egui::Color32::from_white_alpha(alpha / 2));
                painter.circle_stroke(
                    center,
                    radius,
                    egui::Stroke::new(2.0, egui::Color32::from_white_alpha(alpha)),
                );
            }
        }
    }

    if let Some(reticle) = tour.reticle() {
        let [r, g, b] = reticle.color;
        let color = egui::Color32::from_rgb(r, g, b);
        let center = to_pos(reticle.screen);
        let radius = (reticle.radius / ppp).max(2.0);
        match &icons.reticle {
            Some(tex) => painter.image(
                tex.id(),
                egui::Rect::from_center_size(center, egui::vec2(radius, radius) * 2.0),
                FULL_UV,
                color,
            ),
            None => {
                painter.circle_stroke(center, radius, egui::Stroke::new(2.0, color));
                painter.circle_filled(center, 2.0, color);
            }
        }
    }

    let font = egui::FontId::proportional(14.0);
    for label in tour.infospot_labels() {
        let anchor = to_pos(label.screen);
        if let Some(tex) = &icons.infospot {
            painter.image(
                tex.id(),
                egui::Rect::from_center_size(anchor, egui::vec2(16.0, 16.0)),
                FULL_UV,
                egui::Color32::WHITE,
            );
        }
        let galley = painter.layout_no_wrap(label.text.clone(), font.clone(), egui::Color32::WHITE);
        let size = galley.size();
        let top_left = anchor - egui::vec2(size.x / 2.0, size.y + 14.0);
        let bubble = egui::Rect::from_min_size(top_left, size).expand(4.0);
        painter.rect_filled(bubble, 4.0, egui::Color32::from_black_alpha(180));
        painter.galley(top_left, galley);
    }
}

fn draw_ui(
    ctx: &egui::Context,
    tour: Option<&HouseTour>,
    shell_banner: &ErrorBanner,
    status: &ShellStatus,
    icons: &mut OverlayIcons,
    requests: &mut UiRequests,
    is_fullscreen: bool,
) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            // File
            ui.menu_button("File", |ui| {
                if ui.button("Open manifest…").clicked() {
                    ui.close_menu();
                    requests.open_manifest = pick_manifest();
                }
                if ui.button("Exit").clicked() {
                    std::process::exit(0);
                }
            });

            // View
            ui.menu_button("View", |ui| {
                let Some(tour) = tour else {
                    ui.label("No tour loaded");
                    return;
                };
                let busy = tour.is_transitioning();
                let current = tour.mode().map(|m| m.name().to_string());
                let mut view_entry = |ui: &mut egui::Ui, name: &str, label: &str| {
                    let selected = current.as_deref() == Some(name);
                    if ui
                        .add_enabled(!busy, egui::SelectableLabel::new(selected, label))
                        .clicked()
                    {
                        requests.change_view = Some(name.to_string());
                        ui.close_menu();
                    }
                };
                view_entry(ui, OUTSIDE_VIEW, "Outside");
                view_entry(ui, FLOOR_PLAN_VIEW, "Floor plan");

                let interiors: Vec<&str> = tour.interior_names().collect();
                if !interiors.is_empty() {
                    ui.separator();
                    for name in interiors {
                        view_entry(ui, name, name);
                    }
                }
                ui.separator();
                ui.menu_button("Panoramas", |ui| {
                    for name in tour.panorama_names() {
                        view_entry(ui, name, name);
                    }
                });

                ui.separator();
                let fullscreen_label = if is_fullscreen { "Exit fullscreen" } else { "Fullscreen" };
                if ui.button(fullscreen_label).clicked() {
                    requests.toggle_fullscreen = true;
                    ui.close_menu();
                }
            });

            // Transition
            ui.menu_button("Transition", |ui| {
                let Some(tour) = tour else {
                    ui.label("No tour loaded");
                    return;
                };
                let mut kind = tour.transition_kind();
                ui.add_enabled_ui(!tour.is_transitioning(), |ui| {
                    for option in TransitionKind::ALL {
                        if ui.radio_value(&mut kind, option, option.label()).clicked() {
                            requests.transition = Some(kind);
                            ui.close_menu();
                        }
                    }
                });
            });
        });
    });

    let banner = tour
        .map(HouseTour::banner)
        .filter(|b| b.visible)
        .or(Some(shell_banner).filter(|b| b.visible));
    if let Some(banner) = banner {
        egui::TopBottomPanel::top("error_banner").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(&banner.message).color(egui::Color32::LIGHT_RED));
                if ui.small_button("✕").clicked() {
                    requests.dismiss_banner = true;
                }
            });
        });
    }

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if status.loading {
                ui.label(egui::RichText::new("Loading tour…").color(egui::Color32::YELLOW));
                ui.label("|");
            }
            match tour {
                Some(tour) => {
                    let mode = tour.mode().map_or("-", |m| m.name());
                    ui.label(format!("View: {mode}"));
                    ui.label("|");
                    ui.label(format!("FOV: {:.1}°", tour.rig().fov()));
                    ui.label("|");
                    ui.label(format!("Transition: {}", tour.transition_kind().label()));
                    if tour.is_transitioning() {
                        ui.label("|");
                        ui.add(
                            egui::ProgressBar::new(tour.progress())
                                .desired_width(120.0)
                                .show_percentage(),
                        );
                    }
                    if !status.last_event.is_empty() {
                        ui.label("|");
                        ui.label(&status.last_event);
                    }
                }
                None => {
                    ui.label("Press O or drop a panoItems.json to open a tour");
                }
            }
            ui.label("|");
            ui.label(egui::RichText::new(format!("FPS: {:.1}", status.fps)).color(egui::Color32::GREEN));
        });
    });

    if let Some(tour) = tour {
        icons.ensure(ctx, tour.cache());
        draw_overlay(ctx, tour, icons);
    }
}
