// exiffield - inspect cached EXIF data and validate field definitions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use exif_field::{
    getters, parse_exif_json, validate, Attachment, ExifMap, Exiftool, FieldConfig,
    MetadataExtractor, RecordSchema,
};

#[derive(Parser)]
#[command(name = "exiffield", version, about = "Inspect exiftool metadata as ExifField caches it")]
struct Args {
    /// exiftool binary to run
    #[arg(long, global = true, default_value = "exiftool")]
    exiftool: PathBuf,

    /// Stop waiting for exiftool after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the normalized tag map for a file
    Extract {
        file: PathBuf,

        /// Pipe the content on stdin like an uncommitted upload
        #[arg(long)]
        stdin: bool,
    },

    /// Print every built-in derived value for a file
    Inspect {
        file: PathBuf,

        #[arg(long)]
        stdin: bool,
    },

    /// Validate a field configuration against a record schema
    Check {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        schema: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let tool = Exiftool::with_program(&args.exiftool);

    match args.command {
        Command::Extract { file, stdin } => {
            let exif = extract(tool, &file, stdin, args.timeout_secs).await?;
            println!("{}", serde_json::to_string_pretty(&exif)?);
        }
        Command::Inspect { file, stdin } => {
            let exif = extract(tool, &file, stdin, args.timeout_secs).await?;
            println!("{}", serde_json::to_string_pretty(&inspect(&exif))?);
        }
        Command::Check { config, schema } => {
            let config = FieldConfig::from_json_file(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            let raw = std::fs::read(&schema)
                .with_context(|| format!("Failed to read {}", schema.display()))?;
            let schema: RecordSchema =
                serde_json::from_slice(&raw).context("Invalid record schema")?;

            let diagnostics = validate(&config, &schema, &tool);
            if diagnostics.is_empty() {
                info!("No issues found for {}.{}", schema.name, config.name);
                return Ok(());
            }
            for diagnostic in &diagnostics {
                println!("{}", diagnostic);
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Run exiftool on a blocking thread, optionally bounded by a timeout
async fn extract(tool: Exiftool, file: &Path, stdin: bool, timeout_secs: Option<u64>) -> Result<ExifMap> {
    let mut attachment = if stdin {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        Attachment::from_bytes(name, bytes)
    } else {
        Attachment::stored(file)
    };

    debug!("Extracting {:?}", attachment);
    let task = tokio::task::spawn_blocking(move || tool.extract(&mut attachment));

    let joined = match timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), task)
            .await
            .with_context(|| format!("exiftool did not finish within {}s", secs))?,
        None => task.await,
    };
    let raw = joined.context("Extraction task failed")??;

    Ok(parse_exif_json(&raw)?.unwrap_or_default())
}

fn inspect(exif: &ExifMap) -> Value {
    let specs = [
        ("camera", "exifgetter:Model"),
        ("file_kind", "get_file_kind"),
        ("capture_moment", "get_capture_moment"),
        ("orientation", "get_orientation"),
        ("recording_mode", "get_recording_mode"),
        ("sequence_position", "get_sequence_position"),
    ];

    let mut out = Map::new();
    for (label, spec) in specs {
        let value = match getters::Getter::from_spec(spec).map(|g| g.call(exif)) {
            Some(Ok(value)) => value,
            Some(Err(e)) => json!({ "error": e.to_string() }),
            None => Value::Null,
        };
        out.insert(label.to_string(), value);
    }
    Value::Object(out)
}
