//! SatMap - live satellite positions on a world map
//!
//! Loads an element catalog, propagates every tracked object once per
//! refresh interval and draws them over a georeferenced base map. Clicking a
//! marker selects it; the header shows where the selection is and how fast
//! it moves.

mod headless;
mod renderer;
mod ui;

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;

use satmap::config::load_config;
use satmap::data::{load_catalog, warn_if_stale};
use satmap::propagation::Sgp4Propagator;
use satmap::{Frame, MapSession, SessionConfig, SystemClock};

use headless::HeadlessArgs;
use renderer::{paint_markers, MapImage, MapView};
use ui::{show_footer, BrowserPanel, DetailPanel, TelemetryPanel};

#[derive(Parser, Debug)]
#[command(name = "satmap", about = "Live satellite positions on a world map")]
pub struct Cli {
    /// Element catalog (three-line TLE text, optionally .gz)
    #[arg(long, default_value = "data/active.tle")]
    pub catalog: PathBuf,
    /// Georeferenced base-map image
    #[arg(long)]
    pub map: Option<PathBuf>,
    /// JSON session config
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Object selected at start
    #[arg(long)]
    pub default_object: Option<String>,
    /// Object to track; repeat for more. Tracks the whole catalog when omitted
    #[arg(long = "track")]
    pub track: Vec<String>,
    /// Refresh interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,
    #[command(flatten)]
    pub headless: HeadlessArgs,
}

impl Cli {
    /// Config file (or defaults) with command-line overrides applied
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => SessionConfig::default(),
        };

        if let Some(name) = &self.default_object {
            config.default_object = Some(name.clone());
        }
        if !self.track.is_empty() {
            config.tracked_objects = self.track.clone();
        }
        if let Some(ms) = self.interval_ms {
            config.refresh_interval_ms = ms;
        }

        Ok(config)
    }
}

/// Everything loaded from disk before the session starts
struct SessionSetup {
    session: MapSession,
    propagator: Arc<Sgp4Propagator>,
    map_image: Option<MapImage>,
    marker_radius_px: f64,
    refresh_interval: Duration,
}

impl SessionSetup {
    fn load(cli: &Cli, config: &SessionConfig) -> Result<Self> {
        let catalog = load_catalog(&cli.catalog)?;
        warn_if_stale(&cli.catalog, config.catalog_max_age_days);

        let objects = catalog.tracked_objects(&config.tracked_objects);
        if objects.is_empty() {
            anyhow::bail!("No tracked objects found in {:?}", cli.catalog);
        }

        let propagator = Arc::new(Sgp4Propagator::from_catalog(
            &catalog,
            config.max_element_age_days,
        ));

        let map_image = cli
            .map
            .as_ref()
            .map(renderer::load_map_image)
            .transpose()?;
        let base_map = match &map_image {
            Some(image) => config.base_map_for(image.width, image.height),
            None => config.default_base_map(),
        };

        let session =
            MapSession::new(objects, &base_map, config).context("Failed to set up map session")?;

        Ok(Self {
            session,
            propagator,
            map_image,
            marker_radius_px: config.marker_radius_px,
            refresh_interval: config.refresh_interval(),
        })
    }
}

/// Application state
pub struct SatMapApp {
    session: MapSession,
    frames: Receiver<Frame>,
    latest: Option<Frame>,
    frames_closed: bool,

    propagator: Arc<Sgp4Propagator>,

    // UI state
    browser_panel: BrowserPanel,
    map_texture: egui::TextureHandle,
    map_size: [u32; 2],
    marker_radius_px: f64,
    refresh_interval: Duration,
}

impl SatMapApp {
    fn new(cc: &eframe::CreationContext<'_>, setup: SessionSetup) -> Result<Self> {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let SessionSetup {
            mut session,
            propagator,
            map_image,
            marker_radius_px,
            refresh_interval,
        } = setup;

        let image = match map_image {
            Some(image) => image,
            None => MapImage::graticule(session.base_map(), session.projector()),
        };
        let map_size = [image.width, image.height];
        let map_texture = cc.egui_ctx.load_texture(
            "base_map",
            image.to_color_image(),
            egui::TextureOptions::LINEAR,
        );

        let frames = session.start(propagator.clone(), Arc::new(SystemClock))?;

        Ok(Self {
            session,
            frames,
            latest: None,
            frames_closed: false,
            propagator,
            browser_panel: BrowserPanel,
            map_texture,
            map_size,
            marker_radius_px,
            refresh_interval,
        })
    }

    /// Keep only the newest frame from the worker
    fn drain_frames(&mut self) {
        loop {
            match self.frames.try_recv() {
                Ok(frame) => self.latest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.frames_closed {
                        log::warn!("Refresh worker stopped; showing last known positions");
                        self.frames_closed = true;
                    }
                    break;
                }
            }
        }
    }

    fn render_map(&self, ui: &mut egui::Ui) {
        let viewport_rect = ui.available_rect_before_wrap();
        let (response, painter) = ui.allocate_painter(viewport_rect.size(), egui::Sense::click());

        painter.rect_filled(response.rect, 0.0, egui::Color32::from_rgb(5, 5, 15));

        let view = MapView::fit(response.rect, self.map_size[0], self.map_size[1]);
        painter.image(
            self.map_texture.id(),
            view.rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        if let Some(frame) = &self.latest {
            paint_markers(&painter, &view, frame, self.marker_radius_px);
        }

        if response.clicked() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let pixel = view.to_pixel(pointer);
                let hit_radius = view.hit_radius(self.marker_radius_px);
                if let Some(id) = self.session.click_with_radius(pixel, hit_radius) {
                    log::info!("Selected {}", id);
                }
            }
        }
    }
}

impl eframe::App for SatMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_frames();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            TelemetryPanel::show(ui, self.latest.as_ref());
        });

        let mut quit = false;
        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            quit = show_footer(ui, self.latest.as_ref());
        });
        if quit {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        egui::SidePanel::left("left_panel")
            .default_width(240.0)
            .show(ctx, |ui| {
                let Some(frame) = &self.latest else {
                    return;
                };

                if let Some(id) = self.browser_panel.show(ui, frame) {
                    if let Err(e) = self.session.select(id.as_str()) {
                        log::warn!("Selection rejected: {}", e);
                    }
                }

                ui.separator();
                let catalog_number = self
                    .session
                    .objects()
                    .iter()
                    .find(|o| o.id == frame.selected)
                    .and_then(|o| o.catalog_number);
                let age = self
                    .propagator
                    .element_age_days(frame.selected.as_str(), &frame.instant);
                DetailPanel::show(ui, frame, catalog_number, age);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_map(ui);
        });

        // Frames arrive from the worker; poll often enough to pick up a
        // click-triggered refresh promptly
        ctx.request_repaint_after(self.refresh_interval.min(Duration::from_millis(100)));
    }
}

impl Drop for SatMapApp {
    fn drop(&mut self) {
        self.session.stop();
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!("Starting SatMap...");

    let config = cli.session_config()?;
    let mut setup = SessionSetup::load(&cli, &config)?;

    if cli.headless.headless {
        headless::run(
            &mut setup.session,
            setup.propagator.clone(),
            Arc::new(SystemClock),
            cli.headless.ticks,
        )?;
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 760.0])
            .with_title("SatMap - Live Satellite Map"),
        ..Default::default()
    };

    eframe::run_native(
        "SatMap",
        options,
        Box::new(move |cc| match SatMapApp::new(cc, setup) {
            Ok(app) => Ok(Box::new(app)),
            Err(e) => {
                log::error!("Failed to initialize app: {}", e);
                Err(e.into())
            }
        }),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {}", e))
}
