use clap::{Parser, Subcommand};
use renditions::imaging::{Output, RustBackend, get_dimensions, process_image};
use renditions::{FsBlobStore, Uploader, config, hashing, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "renditions")]
#[command(about = "Turn one uploaded image into every variant you serve")]
#[command(long_about = "\
Turn one uploaded image into every variant you serve

Each upload is hashed, and every configured variant is transformed and
written under a content-addressed key:

  files/
  └── 3a7/
      └── 3a7bd3e2360a3d29eea436fcfb7e44c735d117c42d1c1835420b6b9942dd4f1b/
          ├── small.jpeg     # cover 128x128
          └── large.jpeg     # contain 1280x1280

Uploading the same bytes again rewrites the same keys.

Set RUST_LOG (e.g. RUST_LOG=renditions=debug) for diagnostic logging.
Run 'renditions gen-config' to generate a documented renditions.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (missing file = stock defaults)
    #[arg(long, default_value = "renditions.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Produce and store every configured variant of an image
    Upload {
        /// Image file to upload
        file: PathBuf,
        /// Filesystem store root (overrides store.path)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Print the outcome as JSON instead of a tree
        #[arg(long)]
        json: bool,
    },
    /// Show the content hash, dimensions and variant keys without storing
    Inspect {
        file: PathBuf,
    },
    /// Render one configured variant to a file
    Render {
        file: PathBuf,
        /// Variant name from the configuration
        #[arg(long)]
        variant: String,
        /// Output path
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the content hash of a file
    Hash {
        file: PathBuf,
    },
    /// Print a stock renditions.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Upload { file, store, json } => {
            let settings = config::load_config(&cli.config)?;
            let store_root = store.unwrap_or_else(|| PathBuf::from(&settings.store.path));
            let uploader = Uploader::new(
                settings.to_config()?,
                RustBackend::new(),
                FsBlobStore::new(store_root),
            )?;
            upload(&uploader, &file, json)?;
        }
        Command::Inspect { file } => {
            let upload_config = config::load_config(&cli.config)?.to_config()?;
            let bytes = std::fs::read(&file)?;
            let hash = hashing::content_hash(&bytes);
            let dimensions = get_dimensions(&RustBackend::new(), &bytes)?;
            let keys: Vec<(String, String)> = upload_config
                .variants()
                .iter()
                .map(|v| {
                    let key = upload_config
                        .path_rule()
                        .storage_key(&hash, &v.name, v.extension());
                    (v.name.clone(), key)
                })
                .collect();
            for line in output::format_inspect(&display_name(&file), &hash, dimensions, &keys) {
                println!("{}", line);
            }
        }
        Command::Render { file, variant, out } => {
            let upload_config = config::load_config(&cli.config)?.to_config()?;
            let spec = upload_config
                .variant(&variant)
                .ok_or_else(|| format!("no variant named {variant:?} in configuration"))?;
            let bytes = std::fs::read(&file)?;
            let processed = process_image(&RustBackend::new(), &bytes, Output::File(&out), spec)?;
            let dims = processed.dimensions();
            println!(
                "{} \u{2192} {} ({}x{})",
                variant,
                out.display(),
                dims.width,
                dims.height
            );
        }
        Command::Hash { file } => {
            let reader = std::io::BufReader::new(std::fs::File::open(&file)?);
            println!("{}", hashing::hash_reader(reader)?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Upload one file, printing progress while variants settle.
fn upload(
    uploader: &Uploader<RustBackend, FsBlobStore>,
    file: &Path,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(file)?;
    let filename = display_name(file);

    let result = if json {
        uploader.upload(Some(bytes.as_slice()), &filename)
    } else {
        let (tx, rx) = std::sync::mpsc::channel();
        let printer = std::thread::spawn(move || {
            for event in rx {
                for line in output::format_variant_event(&event) {
                    println!("{}", line);
                }
            }
        });
        let result = uploader.upload_with_events(Some(bytes.as_slice()), &filename, tx);
        printer
            .join()
            .map_err(|_| "progress printer thread panicked")?;
        result
    };

    match result {
        Ok(outcome) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                output::print_upload_outcome(&outcome);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let body = serde_json::json!({
                    "filename": filename,
                    "error": { "kind": e.kind(), "message": e.to_string() },
                    "files": e.partial_results(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                output::print_upload_error(&filename, &e);
            }
            Err(e.into())
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Structured diagnostics on stderr; stdout stays reserved for results.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
