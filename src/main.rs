use clap::{Parser, Subcommand};
use place_photos::compress::{CompressParams, RustCompressor};
use place_photos::intake::{IntakeController, SessionContext};
use place_photos::location::{AddressExtractor, AddressSlot, CoordinateResolver, SharedAddress};
use place_photos::retrieval::{FsAssetStore, Retriever};
use place_photos::types::{EntryId, RawFile};
use place_photos::{config, output};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "place-photos")]
#[command(about = "Attach photos to a place entry")]
#[command(long_about = "\
Attach photos to a place entry

Selected photos are checked against the 8-image limit, scanned for GPS
metadata to fill in the place's address, compressed for upload, and kept
in an ordered list whose first image is the cover.

Accepted file types: .jpg .jpeg .png .webp .avif .heic

Set RUST_LOG=debug for pipeline logs.

Run 'place-photos gen-config' to generate a documented place-photos.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one photo selection through the intake pipeline
    Intake {
        /// Photos to attach, in selection order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Address already entered for the place
        #[arg(long, default_value = "")]
        address: String,

        /// Directory for compressed images and submission.json
        #[arg(long, default_value = "place-photos-out")]
        out: PathBuf,

        /// New order as 1-based positions, e.g. 2,1,3
        #[arg(long, value_delimiter = ',')]
        order: Option<Vec<usize>>,

        /// Directory containing place-photos.toml
        #[arg(long, default_value = ".")]
        config: PathBuf,
    },
    /// Download a stored place image
    Fetch {
        /// Stored image path, e.g. places/2024/cafe.jpg
        image_path: String,

        /// Directory standing in for the storage bucket
        #[arg(long)]
        store: PathBuf,

        /// Directory to save the image into
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Directory containing place-photos.toml
        #[arg(long, default_value = ".")]
        config: PathBuf,
    },
    /// Print a stock place-photos.toml with all options documented
    GenConfig,
}

/// One line of `submission.json`.
#[derive(Serialize)]
struct SubmissionRecord {
    identity: EntryId,
    filename: String,
    mime: String,
    bytes: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Intake {
            files,
            address,
            out,
            order,
            config: config_dir,
        } => {
            let intake_config = config::load_config(&config_dir)?;
            init_thread_pool(&intake_config.processing);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_intake(&intake_config, files, address, &out, order))?;
        }
        Command::Fetch {
            image_path,
            store,
            out,
            config: config_dir,
        } => {
            let intake_config = config::load_config(&config_dir)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let (tx, rx) = std::sync::mpsc::channel();
                let retriever = Retriever::new(
                    Arc::new(FsAssetStore::new(store)),
                    intake_config.retrieval.bucket.as_str(),
                )
                .with_events(tx);
                let result = retriever
                    .download_to(&image_path, chrono::Utc::now(), &out)
                    .await;
                drop(retriever);
                for event in rx {
                    output::print_intake_event(&event);
                }
                let path = result?;
                println!("Saved {}", path.display());
                Ok::<_, Box<dyn std::error::Error>>(())
            })?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

async fn run_intake(
    intake_config: &config::IntakeConfig,
    files: Vec<PathBuf>,
    address: String,
    out: &Path,
    order: Option<Vec<usize>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut raw = Vec::with_capacity(files.len());
    for path in &files {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        raw.push(RawFile::new(name, bytes));
    }

    let session = Arc::new(SessionContext::new());
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_intake_event(&event);
        }
    });

    let controller = IntakeController::new(
        Arc::clone(&session),
        Arc::new(RustCompressor::new()),
        AddressExtractor::new(Arc::new(CoordinateResolver::new()), intake_config.address.policy),
        CompressParams::from_config(&intake_config.compression),
    )
    .with_events(tx);
    let slot = SharedAddress::new(address);

    let outcome: Result<(), Box<dyn std::error::Error>> = async {
        let report = controller.select_files(raw, &slot).await?;
        output::print_report(&report);
        if let Some(positions) = order {
            let ids = controller.ids();
            let reordered = positions
                .iter()
                .map(|&p| {
                    p.checked_sub(1)
                        .and_then(|i| ids.get(i).copied())
                        .ok_or_else(|| format!("--order position {p} is out of range"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            controller.reorder(&reordered)?;
        }
        controller.with_list(output::print_list);
        write_submission(&controller, out).await?;
        println!("Address: {}", slot.current());
        Ok(())
    }
    .await;

    drop(controller);
    session.close();
    printer.join().ok();
    outcome
}

/// Write each entry as `NNN-<stem>.<ext>` plus a `submission.json` manifest.
async fn write_submission(
    controller: &IntakeController,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(out).await?;
    let mut records = Vec::new();
    for (i, submitted) in controller.submission().into_iter().enumerate() {
        let payload = &submitted.payload;
        let stem = payload
            .name()
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(payload.name());
        let filename = format!("{:03}-{}.{}", i + 1, stem, payload.extension());
        tokio::fs::write(out.join(&filename), &payload.bytes()[..]).await?;
        records.push(SubmissionRecord {
            identity: submitted.identity,
            filename,
            mime: payload.mime().to_string(),
            bytes: payload.len(),
        });
    }
    let json = serde_json::to_string_pretty(&records)?;
    tokio::fs::write(out.join("submission.json"), json).await?;
    println!("Wrote {} images to {}", records.len(), out.display());
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
