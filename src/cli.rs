//! Command-line entry point: one positional argument, the configuration
//! file path (`SPEC_FULL.md` §6).

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "embervine", about = "A single-threaded, multi-host HTTP/1.1 serving engine")]
pub struct Cli {
    /// Path to the server configuration file.
    pub config_path: PathBuf,
}
