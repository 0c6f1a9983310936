use crate::cli::Output;
use crate::config::{CliOverrides, ReportflowConfig};
use crate::sink::JsonLinesSink;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub mod compilation;
pub mod config;
pub mod publish;
pub mod run;
pub mod transform;
pub mod xunit;

#[derive(Parser)]
#[command(
    name = "reportflow",
    version = env!("CARGO_PKG_VERSION"),
    about = "Turn unit-test reports and analyzer results into metrics and issues",
    long_about = "Reportflow locates xUnit-style test reports, normalizes vendor formats with \
                  declarative rule sets, aggregates test statistics and publishes them, together \
                  with source-analysis results, to a measurement sink."
)]
pub struct Cli {
    /// Run as if started in <DIR> instead of current working directory
    #[arg(short = 'C', long = "directory", global = true)]
    pub directory: Option<String>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Abort on the first failing report or sink call
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import unit-test reports and publish test statistics
    Tests(xunit::TestsArgs),
    /// Convert a vendor report into the canonical xUnit format
    Transform(transform::TransformArgs),
    /// Publish an analysis result set
    Publish(publish::PublishArgs),
    /// Extract compilation settings from a compilation database and build logs
    Compilation(compilation::CompilationArgs),
    /// Import tests and publish analysis results as configured
    Run(run::RunArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

/// Flags every subcommand shares.
pub struct CommandContext<'a> {
    pub config_path: Option<&'a str>,
    pub strict: bool,
    pub output: &'a Output,
}

impl CommandContext<'_> {
    /// Load the layered configuration with this command's overrides on top.
    pub fn load_config(&self, mut overrides: CliOverrides) -> Result<ReportflowConfig> {
        if self.strict {
            overrides.error_recovery_enabled = Some(false);
        }
        ReportflowConfig::load(self.config_path, Some(&overrides))
    }
}

impl Cli {
    /// Run the selected command. A fatal error is reported on stderr before
    /// it is returned.
    pub fn run(self) -> Result<()> {
        let output = Output::new(self.verbose > 0, self.quiet);
        let result = self.dispatch(&output);
        if let Err(err) = &result {
            output.error(&format!("{:#}", err));
        }
        result
    }

    fn dispatch(self, output: &Output) -> Result<()> {
        // Change directory if specified
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)
                .with_context(|| format!("Cannot change directory to '{}'", dir))?;
        }

        setup_logging(self.verbose, self.quiet);

        let ctx = CommandContext {
            config_path: self.config.as_deref(),
            strict: self.strict,
            output,
        };

        match self.command {
            Commands::Tests(args) => xunit::execute(args, &ctx),
            Commands::Transform(args) => transform::execute(args, &ctx),
            Commands::Publish(args) => publish::execute(args, &ctx),
            Commands::Compilation(args) => compilation::execute(args, &ctx),
            Commands::Run(args) => run::execute(args, &ctx),
            Commands::Config(args) => config::execute(args, &ctx),
        }
    }
}

/// JSON-lines sink on the configured file, or on stdout.
pub(crate) fn open_sink(output: Option<&Path>) -> Result<JsonLinesSink<Box<dyn Write>>> {
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create '{}'", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("Cannot create sink output '{}'", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(JsonLinesSink::new(writer))
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => tracing_subscriber::EnvFilter::new("warn"),
        1 => tracing_subscriber::EnvFilter::new("info,globset=warn"),
        2 => tracing_subscriber::EnvFilter::new("debug,globset=warn"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
