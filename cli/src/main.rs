use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use cosmoview::sky::{RaDec, ViewState};
use cosmoview::skyview::{
    CutoutProvider, CutoutRequest, DEFAULT_OUTPUT_DIR, DEFAULT_SKYVIEW_CONNECT_TIMEOUT_SECS,
    DEFAULT_SKYVIEW_REQUEST_TIMEOUT_SECS, DEFAULT_SKYVIEW_URL, DEFAULT_SURVEY, SkyViewClient, SkyViewError,
};
use cosmoview::tiles::{DEFAULT_TILE_BASE_URL, HttpTileSource, TileError, TileQuery, TileSource, decode_tile};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {status}")]
    HealthCheck { status: u16 },
    #[error(transparent)]
    SkyView(#[from] SkyViewError),
    #[error(transparent)]
    Tile(#[from] TileError),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "cosmoview-cli", about = "Fetch NASA SkyView cutouts and talk to the CosmoView tile proxy")]
struct Cli {
    #[arg(long, env = "COSMOVIEW_TILE_BASE_URL", default_value = DEFAULT_TILE_BASE_URL)]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the tile proxy is up.
    Ping,
    /// Download a cutout directly from SkyView.
    Fetch(FetchArgs),
    /// Fetch a panoramic tile through the proxy.
    Tile(TileArgs),
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Named target resolvable by SIMBAD/NED (e.g. 'M51', 'NGC 2023').
    #[arg(long, conflicts_with = "ra", required_unless_present = "ra")]
    target: Option<String>,

    /// Right ascension in decimal degrees.
    #[arg(long, value_parser = parse_angle, requires = "dec", allow_negative_numbers = true)]
    ra: Option<f64>,

    /// Declination in decimal degrees.
    #[arg(long, value_parser = parse_angle, allow_negative_numbers = true)]
    dec: Option<f64>,

    #[arg(long, default_value = DEFAULT_SURVEY)]
    survey: String,

    /// Width of the cutout in degrees.
    #[arg(long, value_parser = parse_angle, default_value_t = 0.4)]
    width: f64,

    /// Height of the cutout in degrees (defaults to width).
    #[arg(long, value_parser = parse_angle)]
    height: Option<f64>,

    /// Number of pixels on a side.
    #[arg(long, default_value_t = 600)]
    pixels: u32,

    /// Sky projection (Tan, Car, Ait, Hammer, ...).
    #[arg(long, default_value = "Tan")]
    projection: String,

    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Do not overwrite existing files.
    #[arg(long)]
    no_overwrite: bool,

    /// Also save the raw FITS file.
    #[arg(long)]
    fits: bool,

    #[arg(long, env = "SKYVIEW_URL", default_value = DEFAULT_SKYVIEW_URL)]
    skyview_url: String,

    #[arg(long, env = "SKYVIEW_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_SKYVIEW_REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl FetchArgs {
    fn to_request(&self) -> CutoutRequest {
        CutoutRequest {
            target: self.target.clone(),
            ra: self.ra,
            dec: self.dec,
            survey: self.survey.clone(),
            width_deg: self.width,
            height_deg: self.height,
            pixels: self.pixels,
            projection: self.projection.clone(),
            overwrite: !self.no_overwrite,
            include_fits: self.fits,
        }
    }
}

#[derive(Args, Debug)]
struct TileArgs {
    #[arg(long, value_parser = parse_angle, allow_negative_numbers = true)]
    ra: f64,

    #[arg(long, value_parser = parse_angle, allow_negative_numbers = true)]
    dec: f64,

    /// Field of view in degrees (clamped like the viewer does).
    #[arg(long, value_parser = parse_angle, default_value_t = cosmoview::sky::view::DEFAULT_FOV_DEG)]
    width: f64,

    #[arg(long, default_value_t = cosmoview::sky::view::DEFAULT_PIXELS)]
    pixels: u32,

    #[arg(long, default_value = DEFAULT_SURVEY)]
    survey: String,

    #[arg(long)]
    out: PathBuf,
}

impl TileArgs {
    fn to_query(&self) -> TileQuery {
        let view = ViewState::new(self.width, self.pixels, &self.survey);
        TileQuery::new(RaDec::new(self.ra, self.dec), &view)
    }
}

fn parse_angle(raw: &str) -> Result<f64, String> {
    let value = raw.trim().parse::<f64>().map_err(|e| e.to_string())?;
    if value.is_finite() { Ok(value) } else { Err("angle must be finite".to_owned()) }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let base_url = cli.base_url.trim_end_matches('/').to_owned();

    match cli.command {
        Command::Ping => run_ping(&base_url).await,
        Command::Fetch(args) => run_fetch(&args).await,
        Command::Tile(args) => run_tile(&base_url, &args).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let response = client.get(format!("{base_url}/healthz")).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::HealthCheck { status: status.as_u16() });
    }
    println!("ok");
    Ok(())
}

async fn run_fetch(args: &FetchArgs) -> Result<(), CliError> {
    let client = SkyViewClient::new(
        &args.skyview_url,
        &args.output_dir,
        Duration::from_secs(args.timeout_secs),
        Duration::from_secs(DEFAULT_SKYVIEW_CONNECT_TIMEOUT_SECS),
    )?;
    let product = client.fetch_cutout(&args.to_request()).await?;

    if let Some(fits_path) = &product.fits_path {
        println!("FITS saved: {}", fits_path.display());
    }
    let verb = if product.cached { "reused" } else { "saved" };
    println!("PNG {verb}:  {}", product.png_path.display());
    Ok(())
}

async fn run_tile(base_url: &str, args: &TileArgs) -> Result<(), CliError> {
    let source = HttpTileSource::with_defaults(base_url)?;
    let query = args.to_query();
    let bytes = source.fetch_tile(&query).await?;
    let image = decode_tile(&bytes)?;

    tokio::fs::write(&args.out, &bytes).await?;
    println!(
        "{}x{} tile ({}, fov {:.2}°) saved to {}",
        image.width(),
        image.height(),
        query.survey,
        query.width_deg,
        args.out.display()
    );
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
