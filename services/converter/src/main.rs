//! GeoFLOW converter.
//!
//! Reads spectral-element grid and field files, reorders the nodes into
//! 2D layers and writes a UGRID-style Zarr store.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use converter::{ConversionSummary, Converter, ConverterConfig};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "geoflow-convert")]
#[command(about = "Convert GeoFLOW grid and field files to a layered mesh Zarr store")]
struct Args {
    /// Job configuration file (JSON)
    #[arg(short, long, env = "GEOFLOW_CONFIG")]
    config: PathBuf,

    /// Override the configured output path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Build the mesh and read every field without writing output
    #[arg(long)]
    dry_run: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_tracing(&args) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(summary) => {
            info!(
                nodes = summary.nodes,
                faces = summary.faces,
                timesteps = summary.timesteps.len(),
                fields_read = summary.fields_read,
                fields_skipped = summary.fields_skipped,
                bytes_written = summary.bytes_written,
                elapsed_ms = summary.elapsed_ms,
                "Conversion complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn run(args: &Args) -> Result<ConversionSummary> {
    let mut config = ConverterConfig::from_file(&args.config)?;
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    info!(
        config = %args.config.display(),
        input = %config.input_dir.display(),
        output = %config.output_path.display(),
        fields = ?config.field_roots,
        "Loaded configuration"
    );

    Converter::new(config).run(args.dry_run)
}
