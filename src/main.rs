//! Main entry point for the runhpi CLI application.
//!
//! This binary maps command-line arguments onto the library: it opens
//! each archive over the right byte source (local file or HTTP URL),
//! drives extraction or listing, and turns decode failures into exit
//! codes and stderr diagnostics.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use runhpi::cli::is_http_url;
use runhpi::{
    CancelToken, Cli, Command, HpiError, HpiExtractor, HttpRangeReader, LocalFileReader, ReadAt,
};

/// Application entry point.
///
/// Parses arguments, wires Ctrl-C to the shared cancellation token, and
/// dispatches to extraction or listing. Any failure propagates out as a
/// non-zero exit status with the diagnostic on standard error.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Cancellation is polled between leaves and between chunks, so an
    // interrupt never leaves a partial output file behind.
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("interrupted, stopping");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Extract {
            out_dir,
            archives,
            keep_going,
        } => {
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;

            let mut failures = 0usize;
            for archive in &archives {
                failures +=
                    process_archive(archive, &out_dir, keep_going, cli.quiet, &cancel).await?;
            }
            if failures > 0 {
                bail!("{failures} entries failed to extract");
            }
        }
        Command::List { archives, verbose } => {
            for archive in &archives {
                list_archive(archive, verbose).await?;
            }
        }
    }

    Ok(())
}

/// Open one archive over the appropriate byte source and extract it.
///
/// Returns the number of entries skipped in `--keep-going` mode; in the
/// default fail-fast mode any entry failure aborts with an error. For
/// HTTP sources the transfer total is reported on stderr afterwards.
async fn process_archive(
    archive: &str,
    out_dir: &Path,
    keep_going: bool,
    quiet: bool,
    cancel: &CancelToken,
) -> Result<usize> {
    if is_http_url(archive) {
        let reader = Arc::new(HttpRangeReader::new(archive.to_string()).await?);
        let failures =
            extract_archive(reader.clone(), archive, out_dir, keep_going, cancel).await?;
        if !quiet {
            eprintln!(
                "{archive}: {} transferred",
                format_size(reader.transferred_bytes())
            );
        }
        Ok(failures)
    } else {
        let reader = Arc::new(
            LocalFileReader::new(Path::new(archive)).with_context(|| format!("opening {archive}"))?,
        );
        extract_archive(reader, archive, out_dir, keep_going, cancel).await
    }
}

/// Extract every leaf of an archive into `out_dir`.
///
/// Each successfully extracted path is printed on standard output, one
/// per line. Failures are reported on standard error together with the
/// archive, the entry path, and the byte offset of its chunk data.
async fn extract_archive<R: ReadAt + 'static>(
    reader: Arc<R>,
    archive: &str,
    out_dir: &Path,
    keep_going: bool,
    cancel: &CancelToken,
) -> Result<usize> {
    let extractor = HpiExtractor::open(reader)
        .await
        .with_context(|| format!("{archive}: opening archive"))?;
    let entries = extractor
        .entries()
        .with_context(|| format!("{archive}: reading directory"))?;

    let mut failures = 0usize;
    for entry in &entries {
        if cancel.is_cancelled() {
            bail!("{archive}: extraction cancelled");
        }

        let dest = out_dir.join(&entry.path);
        match extractor.extract_to_file(entry, &dest, cancel).await {
            Ok(()) => println!("{}", entry.path),
            Err(HpiError::Cancelled) => bail!("{archive}: extraction cancelled"),
            Err(e) => {
                eprintln!(
                    "{archive}: {}: {e} (chunk data at {:#x})",
                    entry.path, entry.data_offset
                );
                if !keep_going {
                    bail!("{archive}: failed to extract {}", entry.path);
                }
                failures += 1;
            }
        }
    }

    Ok(failures)
}

/// List one archive's contents.
async fn list_archive(archive: &str, verbose: bool) -> Result<()> {
    if is_http_url(archive) {
        let reader = Arc::new(HttpRangeReader::new(archive.to_string()).await?);
        list_entries(reader, archive, verbose).await
    } else {
        let reader = Arc::new(
            LocalFileReader::new(Path::new(archive)).with_context(|| format!("opening {archive}"))?,
        );
        list_entries(reader, archive, verbose).await
    }
}

/// Print an archive's leaves, either bare or as a table with sizes,
/// storage methods, and a summary line.
async fn list_entries<R: ReadAt + 'static>(
    reader: Arc<R>,
    archive: &str,
    verbose: bool,
) -> Result<()> {
    let extractor = HpiExtractor::open(reader)
        .await
        .with_context(|| format!("{archive}: opening archive"))?;
    let entries = extractor
        .entries()
        .with_context(|| format!("{archive}: reading directory"))?;

    if !verbose {
        for entry in &entries {
            println!("{}", entry.path);
        }
        return Ok(());
    }

    let flavor = if extractor.header().is_save() {
        "save (BANK)"
    } else {
        "standard"
    };
    println!("{archive}: {flavor} archive");
    println!("{:>10}  {:>6}  Name", "Length", "Method");
    println!("{}", "-".repeat(50));

    let mut total = 0u64;
    for entry in &entries {
        println!(
            "{:>10}  {:>6}  {}",
            entry.file_size,
            entry.method.name(),
            entry.path
        );
        total += u64::from(entry.file_size);
    }

    println!("{}", "-".repeat(50));
    println!("{total:>10}  {:>6}  {} files", "", entries.len());

    Ok(())
}

/// Format a byte count into a human-readable size string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
