use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "runhpi")]
#[command(version)]
#[command(about = "An HPI (Total Annihilation archive) extractor", long_about = None)]
#[command(after_help = "Examples:\n  \
  runhpi extract out totala1.hpi            extract an archive into out/\n  \
  runhpi extract out a.hpi b.hpi --keep-going   extract several, skipping bad entries\n  \
  runhpi list -v https://example.com/maps.hpi   list a remote archive")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (suppress progress chatter on stderr)
    #[arg(short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract one or more archives into a directory
    Extract {
        /// Output directory (created if absent)
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,

        /// Archive paths or HTTP URLs
        #[arg(value_name = "ARCHIVE", required = true)]
        archives: Vec<String>,

        /// Skip entries that fail to decode instead of aborting
        #[arg(long)]
        keep_going: bool,
    },

    /// List the contents of one or more archives
    List {
        /// Archive paths or HTTP URLs
        #[arg(value_name = "ARCHIVE", required = true)]
        archives: Vec<String>,

        /// Show sizes and storage methods
        #[arg(short = 'v', long)]
        verbose: bool,
    },
}

/// Whether an archive argument names a remote source.
pub fn is_http_url(arg: &str) -> bool {
    arg.starts_with("http://") || arg.starts_with("https://")
}
