use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the routeros-backup tool.
///
/// Everything about the router and the destination comes from the
/// environment; the flags only control how this invocation behaves.
#[derive(Parser, Debug)]
#[clap(
    name = "routeros-backup",
    about = "Back up a RouterOS appliance to S3-compatible storage"
)]
pub struct Args {
    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Environment file to load before reading settings (default: .env if present)
    #[clap(short = 'e', long)]
    pub env_file: Option<PathBuf>,

    /// Validate settings and exit without connecting anywhere
    #[clap(long)]
    pub check_config: bool,

    /// Write the cycle report as JSON to this path
    #[clap(long)]
    pub report: Option<PathBuf>,
}
