use clap::Parser;
use reportflow::cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Errors are already reported by `Cli::run`
    match Cli::parse().run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
