use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use sha2::Digest as _;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clmandelbrot", version)]
struct Cli {
    /// Render settings JSON. Flags override its fields.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend to use.
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendChoice>,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one image as a PNG.
    Render(RenderArgs),
    /// Print device capability records as JSON.
    Devices,
    /// Render repeatedly on every device and report timings.
    Bench(BenchArgs),
    /// Print crate and kernel versions.
    Info,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Image width in pixels.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Image height in pixels.
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Complex-plane step per pixel. Defaults to 10 / (width + height).
    #[arg(long)]
    unit: Option<f64>,

    /// Catalog index of the render device.
    #[arg(long)]
    device: Option<usize>,

    /// Read the field row-major (`x + y * width`) instead of `x + y * height`.
    #[arg(long)]
    row_major: bool,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Print the SHA-256 of the raw escape field.
    #[arg(long)]
    sha256: bool,
}

#[derive(Parser, Debug)]
struct BenchArgs {
    /// Image width in pixels.
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Image height in pixels.
    #[arg(long, default_value_t = 1024)]
    height: u32,

    /// Complex-plane step per pixel.
    #[arg(long)]
    unit: Option<f64>,

    /// Renders per device.
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Directory for the per-device PNGs.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Host,
    Opencl,
    Gpu,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(choice) = cli.backend {
        settings.backend = match choice {
            BackendChoice::Host => clmandelbrot::BackendKind::Host,
            BackendChoice::Opencl => clmandelbrot::BackendKind::OpenCl,
            BackendChoice::Gpu => clmandelbrot::BackendKind::Gpu,
        };
    }

    match cli.cmd {
        Command::Render(args) => cmd_render(settings, args),
        Command::Devices => cmd_devices(&settings),
        Command::Bench(args) => cmd_bench(&settings, args),
        Command::Info => cmd_info(),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<clmandelbrot::RenderSettings> {
    match path {
        Some(p) => clmandelbrot::RenderSettings::from_json_path(p)
            .with_context(|| format!("load settings '{}'", p.display())),
        None => Ok(clmandelbrot::RenderSettings::default()),
    }
}

fn cmd_render(
    mut settings: clmandelbrot::RenderSettings,
    args: RenderArgs,
) -> anyhow::Result<()> {
    if let Some(index) = args.device {
        settings.device_index = index;
        settings.device_cap = settings.device_cap.max(index + 1);
    }
    if args.row_major {
        settings.row_stride = clmandelbrot::RowStride::Width;
    }

    let request = settings.request(args.width, args.height, args.unit)?;
    let (field, report) = clmandelbrot::compute_field(&settings, &request)?;

    if args.sha256 {
        let digest = sha2::Sha256::digest(field.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        println!("{hex}");
    }

    let mut img = image::RgbImage::new(request.width(), request.height());
    clmandelbrot::draw(&field, request.stride(), &mut img)?;

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    img.save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({}x{} on {}, {:.3}s)",
        args.out.display(),
        report.width,
        report.height,
        report.device_name,
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

fn cmd_devices(settings: &clmandelbrot::RenderSettings) -> anyhow::Result<()> {
    let records = clmandelbrot::list_devices(settings)?;
    let json = serde_json::to_string_pretty(&records).context("serialize device records")?;
    println!("{json}");
    Ok(())
}

fn cmd_bench(settings: &clmandelbrot::RenderSettings, args: BenchArgs) -> anyhow::Result<()> {
    let opts = clmandelbrot::BenchOpts {
        width: args.width,
        height: args.height,
        unit: args.unit,
        iterations: args.iterations,
        out_dir: args.out_dir,
    };
    let entries = clmandelbrot::bench(settings, &opts)?;
    if entries.is_empty() {
        anyhow::bail!("no devices to benchmark");
    }
    for e in &entries {
        println!(
            "{}: {} ({} iterations) {:.3}s",
            e.device_index,
            e.device_name,
            opts.iterations.max(1),
            e.elapsed.as_secs_f64()
        );
        eprintln!("wrote {}", e.image_path.display());
    }
    Ok(())
}

fn cmd_info() -> anyhow::Result<()> {
    let kernel = clmandelbrot::KernelSource::builtin(clmandelbrot::KernelDialect::OpenClC);
    println!("clmandelbrot {}", env!("CARGO_PKG_VERSION"));
    println!("kernel {}", kernel.version().unwrap_or("unversioned"));
    let backends: Vec<&str> = clmandelbrot::BackendKind::ALL
        .iter()
        .filter(|k| k.is_available())
        .map(|k| k.name())
        .collect();
    println!("backends {}", backends.join(", "));
    Ok(())
}
