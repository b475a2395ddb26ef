use anyhow::{bail, Context, Result};
use clap::Parser;
use dapview::{
    show, Colormap, Credentials, Dapview, Figure, HttpConfig, PlotStyle, DEFAULT_AUTH_HOST,
    DEFAULT_DIMENSION, DEFAULT_FIELD, PASSWORD_VAR, USERNAME_VAR,
};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

const IMERG_GRANULE: &str = "https://gpm1.gesdisc.eosdis.nasa.gov/opendap/GPM_L3/GPM_3IMERGHH.07/2023/03/3B-HHR.MS.MRG.3IMERG.20230301-S000000-E002959.0000.V07B.HDF5";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Open a remote OPeNDAP dataset, slice one variable and plot it"
)]
struct Args {
    /// Dataset URL, without the .dds/.das/.dods suffix
    #[arg(long, default_value = IMERG_GRANULE)]
    url: String,

    #[arg(long, env = USERNAME_VAR)]
    username: Option<String>,

    #[arg(long, env = PASSWORD_VAR, hide_env_values = true)]
    password: Option<String>,

    #[arg(long, default_value = DEFAULT_FIELD)]
    field: String,

    #[arg(long, default_value = DEFAULT_DIMENSION)]
    dimension: String,

    #[arg(long, default_value_t = 0)]
    index: usize,

    /// Figure title; derived from the variable and the fixed coordinate if omitted
    #[arg(long)]
    title: Option<String>,

    /// Blues, Greys, Greens, Reds, YlGnBu, viridis or plasma, `_r` to reverse
    #[arg(long, default_value = "Blues")]
    colormap: Colormap,

    #[arg(long, default_value_t = 1000)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,

    #[arg(long)]
    vmin: Option<f64>,

    #[arg(long)]
    vmax: Option<f64>,

    /// TrueType font for the figure text
    #[arg(long)]
    font: Option<PathBuf>,

    /// Write the figure to this PNG instead of opening a viewer
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the slice as a .csv or .parquet table
    #[arg(long)]
    export: Option<PathBuf>,

    /// Print the dataset summary as JSON
    #[arg(long)]
    summary_json: bool,

    /// Hosts that may receive the credentials during login redirects
    #[arg(long, default_value = DEFAULT_AUTH_HOST)]
    auth_host: Vec<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 300)]
    timeout: u64,
}

fn resolve_credentials(args: &Args) -> Result<Option<Credentials>> {
    match (&args.username, &args.password) {
        (Some(user), Some(pass)) => return Ok(Some(Credentials::new(user, pass))),
        (Some(_), None) | (None, Some(_)) => {
            bail!("--username and --password ({} / {}) must be given together", USERNAME_VAR, PASSWORD_VAR)
        }
        (None, None) => {}
    }

    let dataset_host = Url::parse(&args.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    for host in args.auth_host.iter().chain(dataset_host.iter()) {
        if let Some(found) = Credentials::from_netrc(host)? {
            info!("Using netrc credentials for {}", host);
            return Ok(Some(found));
        }
    }
    warn!("No credentials given, the server may refuse the request");
    Ok(None)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let credentials = resolve_credentials(&args)?;

    let config = HttpConfig::builder()
        .auth_hosts(args.auth_host.clone())
        .request_timeout(Duration::from_secs(args.timeout))
        .build();
    let client = Dapview::with_config(config)?;

    let dataset = client
        .open()
        .url(&args.url)
        .maybe_credentials(credentials.as_ref())
        .call()
        .await
        .with_context(|| format!("Failed to open {}", args.url))?;

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&dataset.summary())?);
    } else {
        println!("{}", dataset);
    }

    let variable = dataset.variable(&args.field)?;
    let slice = variable.isel(&args.dimension, args.index).await?;

    if let Some(path) = &args.export {
        slice.write_table(path)?;
    }

    let style = PlotStyle::builder()
        .maybe_title(args.title)
        .colormap(args.colormap)
        .width(args.width)
        .height(args.height)
        .maybe_vmin(args.vmin)
        .maybe_vmax(args.vmax)
        .maybe_font(args.font)
        .build();

    match &args.output {
        Some(path) => Figure::render(&slice, &style)?.save_png(path)?,
        None => show(&slice, &style).context("Pass --output <file.png> to render without a viewer")?,
    }

    dataset.close();
    Ok(())
}
