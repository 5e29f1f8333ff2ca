//! Contains all the definition of command line arguments.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueHint};
use log::warn;

use crate::core::build::{Orchestrator, Stage};
use crate::core::config::{Config, DEFAULT_CONFIG_FILE};
use crate::core::sdk::GitCli;
use crate::utils::{self, HttpTransport};

/// Cross compile Go programs with cgo, using Zig as the C/C++ compiler.
// NOTE: keep the README usage in sync with this struct.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Zgo {
    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,
    /// Suppress non-critical messages
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
    /// Read the configuration from another file
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    #[command(subcommand)]
    command: ZgoSubcommand,
}

#[derive(Subcommand, Debug)]
enum ZgoSubcommand {
    /// Run `go build` for GOOS/GOARCH with zig as the cgo compiler
    ///
    /// Every argument is passed on to `go build`.
    Build {
        #[arg(
            value_name = "ARGS",
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        args: Vec<String>,
    },
}

impl Zgo {
    pub fn execute(&self) -> Result<()> {
        let config = Config::load_from_env(&self.config).context(Stage::LoadConfig)?;
        setup(self.verbose || config.verbose, self.quiet, &config)?;
        for msg in config.warnings() {
            warn!("{msg}");
        }

        match &self.command {
            ZgoSubcommand::Build { args } => {
                let transport = HttpTransport::new()?.quiet(self.quiet);
                Orchestrator::from_process(config, &transport, &GitCli)?
                    .quiet(self.quiet)
                    .run(args)
            }
        }
    }
}

pub fn parse_cli() -> Zgo {
    Zgo::parse()
}

/// Parse the command line and run it.
pub fn run() -> Result<()> {
    parse_cli().execute()
}

fn setup(verbose: bool, quiet: bool, config: &Config) -> Result<()> {
    utils::Logger::new()
        .verbose(verbose)
        .quiet(quiet)
        .log_dir(Some(config.dir.join("log")))
        .setup()
}
