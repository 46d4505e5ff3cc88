use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde_json::json;

use carrier_intel::config::Settings;
use carrier_intel::harvest::capture::{BarProgress, CaptureSession, ManualAdvance};
use carrier_intel::harvest::directory::structured_directory;
use carrier_intel::harvest::identity::{carrier_id, carrier_url, CarrierIdentity};
use carrier_intel::harvest::page::{Document, FilePage};
use carrier_intel::harvest::{self, Snapshot};
use carrier_intel::model::SafetyBlock;
use carrier_intel::parser;
use carrier_intel::transport::{self, IngestPayload};

#[derive(Parser)]
#[command(name = "carrier-intel", about = "Carrier page harvesting, guided safety capture and record parsing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse saved snapshots into records (printed as JSON)
    Parse {
        #[arg(value_enum)]
        kind: RecordKind,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Bulk harvest of a saved carrier page
    Harvest {
        page: PathBuf,
        /// Harvest the directory region instead of the overview
        #[arg(long)]
        directory: bool,
        /// Write the snapshot JSON here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Guided capture of the five BASIC panels from a page file kept current by a browser bridge
    Capture { page: PathBuf },
    /// Harvest, capture and upload one carrier
    Submit {
        /// Overview page file
        page: PathBuf,
        /// Directory page file
        #[arg(long)]
        directory: Option<PathBuf>,
        /// Upload without the guided safety capture
        #[arg(long)]
        skip_capture: bool,
        /// Address of the carrier page, sent as the source reference
        #[arg(long)]
        url: Option<String>,
        /// Load board origin used to build the canonical carrier URL
        #[arg(long, default_value = "https://highway.com")]
        site: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RecordKind {
    Overview,
    Directory,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { kind, files } => parse_files(kind, &files),
        Commands::Harvest { page, directory, out } => {
            let markup = read_page(&page)?;
            let doc = Document::parse(&markup);
            let identity = CarrierIdentity::from_document(&doc).ok();
            let (snapshot, structured) = if directory {
                (harvest::directory_snapshot(&doc), structured_directory(&doc))
            } else {
                (harvest::overview_snapshot(&doc), None)
            };
            print_summary(identity.as_ref(), &snapshot);

            let report = json!({ "identity": identity, "snapshot": snapshot, "structured": structured });
            let rendered = serde_json::to_string_pretty(&report)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;
                    println!("Snapshot written to {}", path.display());
                }
                None => println!("{}", rendered),
            }
            Ok(())
        }
        Commands::Capture { page } => {
            let settings = Settings::load()?;
            let block = run_capture(&page, &settings).await;
            println!("{}", block.encode().trim_start());
            Ok(())
        }
        Commands::Submit { page, directory, skip_capture, url, site } => {
            let settings = Settings::load()?;
            let markup = read_page(&page)?;
            let (identity, mut overview) = {
                let doc = Document::parse(&markup);
                (CarrierIdentity::from_document(&doc), harvest::overview_snapshot(&doc))
            };
            let identity = match identity {
                Ok(identity) => identity,
                Err(e) => {
                    eprintln!("Cannot upload: {}\n  {}", e, e.hint());
                    std::process::exit(1);
                }
            };
            println!(
                "Carrier: {} (MC {})",
                truncate(identity.name.as_deref().unwrap_or("-"), 40),
                identity.mc_number
            );

            if !skip_capture {
                let block = run_capture(&page, &settings).await;
                overview.append_tagged_block(&block);
            }

            let source_url = url
                .as_deref()
                .and_then(carrier_id)
                .map(|id| carrier_url(&site, id))
                .or(url);
            let mut payload = IngestPayload::new(identity, source_url).with_overview(overview.markup);
            if let Some(path) = directory {
                let markup = read_page(&path)?;
                payload = payload.with_directory(harvest::directory_blob(&Document::parse(&markup)));
            }

            match transport::submit(&settings.api, &payload).await {
                Ok(ack) => {
                    println!("Uploaded MC {} ({} extra fields in acknowledgement)", payload.mc_number, ack.details.len());
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Upload failed: {}\n  {}", e, e.hint());
                    std::process::exit(1);
                }
            }
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn read_page(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn parse_files(kind: RecordKind, files: &[PathBuf]) -> anyhow::Result<()> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let records = files
        .par_iter()
        .map(|path| -> anyhow::Result<serde_json::Value> {
            let input = read_page(path)?;
            let record = match kind {
                RecordKind::Overview => serde_json::to_value(parser::parse_overview(&input))?,
                RecordKind::Directory => serde_json::to_value(parser::parse_directory(&input))?,
            };
            pb.inc(1);
            Ok(json!({ "file": path.display().to_string(), "record": record }))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    pb.finish_and_clear();

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// Guided capture against `page`. Each line on stdin is a manual advance.
async fn run_capture(page: &Path, settings: &Settings) -> SafetyBlock {
    let source = Arc::new(FilePage::new(page));
    let (session, advance) = CaptureSession::polling(source, settings.capture.clone());
    let mut session = session.with_progress(BarProgress::new());
    spawn_stdin_advance(advance);
    println!("Open each safety category on the carrier page. Press Enter to read the panel on screen.");
    session.run().await
}

fn spawn_stdin_advance(advance: ManualAdvance) {
    // blocking reads on a plain thread; the process exit ends it
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() || !advance.advance() {
                break;
            }
        }
    });
}

fn print_summary(identity: Option<&CarrierIdentity>, snapshot: &Snapshot) {
    match identity {
        Some(id) => println!("Carrier: {} (MC {})", truncate(id.name.as_deref().unwrap_or("-"), 40), id.mc_number),
        None => println!("Carrier: no MC number visible"),
    }
    let e = &snapshot.entities;
    println!("Text:      {} chars", snapshot.text.len());
    println!("Emails:    {}", e.emails.len());
    println!("Phones:    {}", e.phones.len());
    println!("Addresses: {}", e.addresses.len());
    println!("Names:     {}", e.names.len());
    println!("Dates:     {}", e.dates.len());
    println!("DOT ids:   {}", e.dot_numbers.join(", "));
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
