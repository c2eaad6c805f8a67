use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gpx2fit::config::{ConversionOptions, DeviceProfile, Sport, SubSport};
use gpx2fit::conversion::convert_gpx_bytes;
use gpx2fit::output::write_outputs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gpx2fit")]
#[command(about = "Convert GPX tracks into FIT activity files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a GPX file into a FIT activity and a CSV dump
    Convert {
        /// GPX file to read
        input: PathBuf,

        /// FIT output path (defaults to the input path with a .fit extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// CSV dump path (defaults to the FIT path with a .csv extension)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Skip writing the CSV dump
        #[arg(long)]
        no_csv: bool,

        #[arg(long, default_value_t = Sport::default())]
        sport: Sport,

        #[arg(long, default_value_t = SubSport::default())]
        sub_sport: SubSport,

        /// Device serial number reported in the file
        #[arg(long)]
        serial_number: Option<u32>,

        /// Device product id reported in the file
        #[arg(long)]
        product: Option<u16>,
    },
    /// Run the upload web service
    Serve {
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gpx2fit=debug,tower_http=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Command::Convert {
            input,
            output,
            csv,
            no_csv,
            sport,
            sub_sport,
            serial_number,
            product,
        } => {
            let defaults = DeviceProfile::default();
            let options = ConversionOptions {
                sport,
                sub_sport,
                device: DeviceProfile {
                    serial_number: serial_number.unwrap_or(defaults.serial_number),
                    product: product.unwrap_or(defaults.product),
                    ..defaults
                },
            };
            convert(input, output, csv, no_csv, &options)
        }
        Command::Serve { addr } => serve(addr).await,
    }
}

fn convert(
    input: PathBuf,
    output: Option<PathBuf>,
    csv: Option<PathBuf>,
    no_csv: bool,
    options: &ConversionOptions,
) -> Result<()> {
    let bytes = std::fs::read(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    let converted = convert_gpx_bytes(&bytes, options)
        .with_context(|| format!("failed to convert {}", input.display()))?;

    let fit_path = output.unwrap_or_else(|| input.with_extension("fit"));
    let csv_path = csv.unwrap_or_else(|| fit_path.with_extension("csv"));

    let mut outputs = vec![(fit_path.as_path(), converted.fit_bytes.as_slice())];
    if !no_csv {
        outputs.push((csv_path.as_path(), converted.csv.as_bytes()));
    }
    write_outputs(&outputs).context("failed to write outputs")?;

    for (index, summary) in converted.summaries.iter().enumerate() {
        tracing::info!(
            track = index,
            distance_m = summary.total_distance,
            elapsed_s = summary.elapsed_seconds,
            "track summary"
        );
    }
    Ok(())
}

async fn serve(addr: SocketAddr) -> Result<()> {
    let app = gpx2fit::build_app();
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("server crashed")?;
    Ok(())
}
