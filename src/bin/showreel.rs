use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use showreel::{
    CpuSurface, Effect, FrameInput, Point, RenderSurface, Script, ShowreelConfig, Texture,
    shader::{MagnifierParams, SpotlightParams},
};

#[derive(Parser, Debug)]
#[command(name = "showreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay an input script against a mounted page and print one snapshot per step.
    Simulate(SimulateArgs),
    /// Render the hover magnifier over an image as a PNG.
    Magnify(MagnifyArgs),
    /// Render the pointer spotlight over an image as a PNG.
    Spotlight(SpotlightArgs),
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Input script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Engine config JSON (defaults when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the snapshot trace here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct MagnifyArgs {
    /// Source image.
    #[arg(long)]
    image: PathBuf,

    /// Pointer in texture coordinates, `u,v` with v pointing up.
    #[arg(long, value_parser = parse_point, default_value = "0.5,0.5")]
    pointer: Point,

    /// Zoom progress in [0, 1].
    #[arg(long, default_value_t = 1.0)]
    zoom: f64,

    /// Engine config JSON supplying the lens parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct SpotlightArgs {
    /// Source image.
    #[arg(long)]
    image: PathBuf,

    /// Pointer in texture coordinates, `u,v` with v pointing up.
    #[arg(long, value_parser = parse_point, default_value = "0.5,0.5")]
    pointer: Point,

    /// Engine config JSON supplying the light parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected 'x,y', got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate '{v}': {e}"))
    };
    Ok(Point::new(parse(x)?, parse(y)?))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(args),
        Command::Magnify(args) => cmd_magnify(args),
        Command::Spotlight(args) => cmd_spotlight(args),
    }
}

fn read_config(path: Option<&Path>) -> anyhow::Result<ShowreelConfig> {
    let Some(path) = path else {
        return Ok(ShowreelConfig::default());
    };
    Ok(ShowreelConfig::from_path(path)?)
}

fn read_script(path: &Path) -> anyhow::Result<Script> {
    let f = File::open(path).with_context(|| format!("open script '{}'", path.display()))?;
    let r = BufReader::new(f);
    let script: Script = serde_json::from_reader(r).with_context(|| "parse script JSON")?;
    Ok(script)
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let config = read_config(args.config.as_deref())?;
    let script = read_script(&args.script)?;
    let trace = script.run(config)?;

    let json = serde_json::to_string_pretty(&trace).with_context(|| "serialize trace")?;
    match args.out {
        Some(out) => {
            create_parent(&out)?;
            std::fs::write(&out, json).with_context(|| format!("write '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_magnify(args: MagnifyArgs) -> anyhow::Result<()> {
    let config = read_config(args.config.as_deref())?;
    let effect = Effect::Magnifier(MagnifierParams::from(&config.shader));
    let frame = FrameInput {
        pointer: args.pointer,
        zoom: args.zoom.clamp(0.0, 1.0),
        hovering: args.zoom > 0.0,
    };
    render_png(&args.image, effect, &frame, &args.out)
}

fn cmd_spotlight(args: SpotlightArgs) -> anyhow::Result<()> {
    let config = read_config(args.config.as_deref())?;
    let effect = Effect::Spotlight(SpotlightParams::from(&config.shader));
    let frame = FrameInput {
        pointer: args.pointer,
        ..FrameInput::default()
    };
    render_png(&args.image, effect, &frame, &args.out)
}

fn render_png(image: &Path, effect: Effect, frame: &FrameInput, out: &Path) -> anyhow::Result<()> {
    let texture = Texture::load(image)?;
    let (w, h) = (texture.width(), texture.height());

    let mut surface = CpuSurface::new(effect, 1.0);
    surface.mount(texture);
    surface.resize(w as f64, h as f64, 1.0);
    surface.render(frame)?;

    create_parent(out)?;
    image::save_buffer_with_format(
        out,
        surface.pixels(),
        w,
        h,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))?;
    surface.dispose();

    eprintln!("wrote {}", out.display());
    Ok(())
}

fn create_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}
