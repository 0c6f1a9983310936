use super::CommandContext;
use crate::config::CliOverrides;
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as JSON
    Show {
        /// Only print this section, e.g. `xunit` or `analysis.repository`
        section: Option<String>,
    },
}

pub fn execute(args: ConfigArgs, ctx: &CommandContext<'_>) -> Result<()> {
    match args.command {
        ConfigCommands::Show { section } => show(section.as_deref(), ctx),
    }
}

fn show(section: Option<&str>, ctx: &CommandContext<'_>) -> Result<()> {
    let config = ctx.load_config(CliOverrides::default())?;
    let value = match section {
        Some(path) => config.get_section(path)?,
        None => config.get_full_config()?,
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
