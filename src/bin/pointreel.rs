use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pointreel::{
    AssetLoader, Catalog, Driver, FsArraySource, PlayerConfig, RenderStyle, Surface, ViewId,
    ViewState, ViewportMetrics, Visualization,
};

#[derive(Parser, Debug)]
#[command(name = "pointreel", version, about = "Play back and export point-cloud embeddings")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a synthetic spiral dataset (catalog, arrays, previews).
    Demo(DemoArgs),
    /// Summarize a catalog.
    Inspect(InspectArgs),
    /// Export consecutive frames of one view as PNGs.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct DemoArgs {
    /// Output directory; `catalog.json` lands at its root.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 60)]
    frames: usize,

    #[arg(long, default_value_t = 300)]
    samples: usize,

    #[arg(long, default_value_t = 5)]
    classes: usize,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Catalog JSON.
    #[arg(long)]
    catalog: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Catalog JSON; array paths resolve relative to its directory.
    #[arg(long)]
    catalog: PathBuf,

    /// Capture name (defaults to the first one).
    #[arg(long)]
    capture: Option<String>,

    /// Variation name (defaults to the first one).
    #[arg(long)]
    variation: Option<String>,

    #[arg(long)]
    channel: Option<usize>,

    /// dots, dots-tail or lines-tail.
    #[arg(long)]
    style: Option<RenderStyle>,

    /// Number of frames to export.
    #[arg(long, default_value_t = 1)]
    frames: usize,

    /// Time (in frames) of the first exported frame.
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Display size in pixels (square).
    #[arg(long, default_value_t = 512.0)]
    size: f64,

    /// Device pixel ratio applied on top of the display size.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Comma separated hex palette, overriding the config.
    #[arg(long, value_delimiter = ',')]
    colors: Vec<String>,

    /// Player config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long to wait for the variation to load.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Output directory for `frame_NNNN.png` files.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Demo(args) => cmd_demo(args),
        Command::Inspect(args) => cmd_inspect(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_demo(args: DemoArgs) -> anyhow::Result<()> {
    let spec = pointreel::demo::DemoSpec {
        frames: args.frames,
        samples: args.samples,
        classes: args.classes,
        ..pointreel::demo::DemoSpec::default()
    };
    let ds = pointreel::demo::build(&spec)?;
    ds.write_to(&args.out)
        .with_context(|| format!("write demo dataset to '{}'", args.out.display()))?;

    let capture = ds.capture();
    let palette = pointreel::parse_palette(pointreel::ViewOptions::default().colors.as_slice())?;
    for i in 0..spec.samples {
        let Some(rel) = capture.preview_image_path(i) else {
            break;
        };
        let c = palette[(i % spec.classes) % palette.len()];
        write_preview(&args.out.join(rel), [c.r, c.g, c.b, 255])?;
    }

    tracing::info!(
        capture = %capture.name,
        frames = spec.frames,
        samples = spec.samples,
        "demo dataset written"
    );
    eprintln!("wrote {}", args.out.join("catalog.json").display());
    Ok(())
}

fn write_preview(path: &Path, rgba: [u8; 4]) -> anyhow::Result<()> {
    const SIDE: u32 = 16;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create preview dir '{}'", parent.display()))?;
    }
    let data: Vec<u8> = rgba.repeat((SIDE * SIDE) as usize);
    image::save_buffer_with_format(
        path,
        &data,
        SIDE,
        SIDE,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let catalog = Catalog::from_path(&args.catalog)?;
    for cap in &catalog.captures {
        println!(
            "{} ({} frames, {} classes, previews: {}) at {}",
            cap.name,
            cap.frame_count,
            cap.class_count(),
            if cap.has_x_preview { "yes" } else { "no" },
            cap.path
        );
        for v in &cap.variations {
            println!("  {}", v.name);
            for (i, ch) in v.channels.iter().enumerate() {
                let [x, y] = ch.bounds;
                println!(
                    "    [{i}] {}  x [{}, {}]  y [{}, {}]",
                    ch.name, x[0], x[1], y[0], y[1]
                );
            }
        }
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let catalog = Catalog::from_path(&args.catalog)?;
    let root = args.catalog.parent().unwrap_or_else(|| Path::new("."));

    let capture = match &args.capture {
        Some(name) => catalog
            .capture(name)
            .with_context(|| format!("unknown capture '{name}'"))?,
        None => catalog
            .captures
            .first()
            .context("catalog has no captures")?,
    };
    let variation = match &args.variation {
        Some(name) => capture
            .variation(name)
            .with_context(|| format!("capture '{}' has no variation '{name}'", capture.name))?,
        None => capture
            .variations
            .first()
            .context("capture has no variations")?,
    };

    let mut cfg = match &args.config {
        Some(p) => PlayerConfig::from_path(p)?,
        None => PlayerConfig::default(),
    };
    if let Some(style) = args.style {
        cfg.view.render_style = style;
    }
    if let Some(channel) = args.channel {
        cfg.view.channel = channel;
    }
    if !args.colors.is_empty() {
        cfg.view.colors = args.colors.clone();
    }

    let mut driver = Driver::new();
    let controller = cfg.controller()?.shared();
    controller.borrow_mut().set_capture(capture.clone());
    driver.add_controller(controller.clone());

    let loader = AssetLoader::new(Arc::new(FsArraySource::new(root)), cfg.loader.clone());
    let metrics = ViewportMetrics {
        device_pixel_ratio: args.scale,
        zoom: 1.0,
    };
    let surface = Surface::new(args.size, args.size, metrics)?;
    let vis = Visualization::attach(ViewId::next(), &controller, loader, surface, &cfg.view)?;

    let failure = Rc::new(RefCell::new(None::<String>));
    {
        let mut v = vis.borrow_mut();
        let f = Rc::clone(&failure);
        v.subscribe_load_error(move |e| *f.borrow_mut() = Some(e.to_string()));
        v.subscribe_progress(|pct| tracing::debug!(pct = *pct, "loading"));
        v.set_variation(variation.clone(), &capture.path);
    }

    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    while vis.borrow().state() == ViewState::Loading {
        anyhow::ensure!(
            Instant::now() < deadline,
            "timed out loading variation '{}'",
            variation.name
        );
        driver.frame_with_delta(0.0);
        std::thread::sleep(Duration::from_millis(2));
    }
    if let Some(msg) = failure.borrow().as_ref() {
        anyhow::bail!("failed to load variation '{}': {msg}", variation.name);
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;
    controller.borrow_mut().set_time(args.start);

    // At fps * dt == 1 every driver frame draws the current frame, then advances by one.
    let dt = if cfg.fps > 0.0 { 1.0 / cfg.fps } else { 0.0 };
    for i in 0..args.frames {
        driver.frame_with_delta(dt);
        let v = vis.borrow();
        let (w, h) = v.surface().pixel_size();
        let path = args.out.join(format!("frame_{i:04}.png"));
        image::save_buffer_with_format(
            &path,
            &v.snapshot_rgba8(),
            u32::from(w),
            u32::from(h),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
    }

    vis.borrow_mut().shutdown();
    driver.remove_controller(&controller);
    eprintln!("wrote {} frame(s) to {}", args.frames, args.out.display());
    Ok(())
}
