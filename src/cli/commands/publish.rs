use super::{CommandContext, open_sink};
use crate::analysis::AnalysisResultSet;
use crate::bridge::PersistenceBridge;
use crate::cli::Output;
use crate::config::{AnalysisOverrides, CliOverrides, SinkOverrides};
use crate::sink::BaseDirFileSystem;
use anyhow::{Result, bail};
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct PublishArgs {
    /// JSON analysis result set (defaults to analysis.result_set)
    pub result_set: Option<PathBuf>,

    /// Write JSON-lines records to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn execute(args: PublishArgs, ctx: &CommandContext<'_>) -> Result<()> {
    let config = ctx.load_config(CliOverrides {
        analysis: AnalysisOverrides {
            result_set: args.result_set,
        },
        sink: SinkOverrides { output: args.output },
        ..Default::default()
    })?;
    let Some(result_set) = config.analysis.result_set.as_deref() else {
        bail!("No analysis result set given (argument or analysis.result_set)");
    };

    let mut sink = open_sink(config.sink.output.as_deref())?;
    let files = BaseDirFileSystem::new(&config.project.base_dir);
    let mut bridge = PersistenceBridge::new(&mut sink, &files, config.policy(), &config.analysis.repository);

    let pending = publish_analysis(result_set, &mut bridge, &ctx.output)?;
    let summary = bridge.into_summary();
    sink.into_inner()?;

    let clean = summary.metrics_rejected == 0 && summary.issues_rejected == 0 && pending == 0;
    ctx.output.task_summary(
        &format!(
            "Published {} measures and {} issues",
            summary.metrics_saved, summary.issues_saved
        ),
        clean,
    );
    Ok(())
}

/// Push a result set through the bridge. Returns how many multi-location
/// issues are still pending afterwards.
pub(crate) fn publish_analysis(
    result_set: &Path,
    bridge: &mut PersistenceBridge<'_>,
    output: &Output,
) -> Result<usize> {
    output.header("Analysis results");
    let mut analysis = AnalysisResultSet::load(result_set)?;
    output.table_row("Analyzed files", analysis.files.len());

    let before = bridge.summary().clone();
    bridge.save_analysis(&mut analysis.files)?;

    // The bridge may already carry test statistics of the same run
    let after = bridge.summary();
    output.table_row("Measures saved", after.metrics_saved - before.metrics_saved);
    output.table_row("Issues saved", after.issues_saved - before.issues_saved);
    if after.files_skipped > 0 {
        output.warning(&format!("{} file(s) outside the project skipped", after.files_skipped));
    }
    let rejected = (after.metrics_rejected - before.metrics_rejected, after.issues_rejected);
    if rejected.0 + rejected.1 > 0 {
        output.warning(&format!(
            "{} measure(s) and {} issue(s) rejected",
            rejected.0, rejected.1
        ));
    }
    let pending = analysis.pending_multi_location();
    if pending > 0 {
        output.warning(&format!("{} multi-location issue(s) not committed", pending));
    }
    Ok(pending)
}
