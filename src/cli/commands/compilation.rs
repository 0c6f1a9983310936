use super::CommandContext;
use crate::compilation::CompilationSettings;
use crate::config::{CliOverrides, CompilationOverrides};
use crate::report::{GlobLocator, ReportLocator};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct CompilationArgs {
    /// JSON compilation database (defaults to compilation.database)
    #[arg(long, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// MSBuild detailed build log path or glob (repeatable)
    #[arg(long = "build-log", value_name = "PATTERN")]
    pub build_logs: Vec<String>,
}

pub fn execute(args: CompilationArgs, ctx: &CommandContext<'_>) -> Result<()> {
    let config = ctx.load_config(CliOverrides {
        compilation: CompilationOverrides {
            database: args.database,
            build_logs: args.build_logs,
        },
        ..Default::default()
    })?;

    let locator = GlobLocator::new(&config.project.base_dir);
    let build_logs = locator.locate(&config.compilation.build_logs)?;
    ctx.output.verbose(&format!("{} build log(s) located", build_logs.len()));
    let settings = CompilationSettings::collect(
        config.compilation.database.as_deref(),
        &build_logs,
        config.build_log_encoding()?,
        config.policy(),
    )?;

    println!("{}", serde_json::to_string_pretty(&settings)?);
    ctx.output.task_summary(
        &format!("Compilation settings for {} source file(s)", settings.len()),
        !settings.is_empty(),
    );
    Ok(())
}
