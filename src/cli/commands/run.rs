use super::{CommandContext, open_sink};
use crate::bridge::PersistenceBridge;
use crate::config::{CliOverrides, SinkOverrides};
use crate::sink::BaseDirFileSystem;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    /// Write JSON-lines records to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn execute(args: RunArgs, ctx: &CommandContext<'_>) -> Result<()> {
    let config = ctx.load_config(CliOverrides {
        sink: SinkOverrides { output: args.output },
        ..Default::default()
    })?;

    let mut sink = open_sink(config.sink.output.as_deref())?;
    let files = BaseDirFileSystem::new(&config.project.base_dir);
    let mut bridge = PersistenceBridge::new(&mut sink, &files, config.policy(), &config.analysis.repository);

    ctx.output.step(&format!("Publishing project '{}'", config.project.key));
    let tests = super::xunit::import_tests(&config, &mut bridge, &ctx.output)?;
    let pending = match config.analysis.result_set.as_deref() {
        Some(result_set) => super::publish::publish_analysis(result_set, &mut bridge, &ctx.output)?,
        None => {
            tracing::debug!("No analysis result set configured");
            0
        }
    };
    let summary = bridge.into_summary();
    let written = sink.written();
    sink.into_inner()?;

    ctx.output.task_summary(
        &format!("{} record(s) written", written),
        tests.skipped == 0 && summary.metrics_rejected == 0 && summary.issues_rejected == 0 && pending == 0,
    );
    Ok(())
}
