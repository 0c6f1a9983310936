use super::{CommandContext, open_sink};
use crate::bridge::PersistenceBridge;
use crate::cli::Output;
use crate::config::{CliOverrides, ReportflowConfig, SinkOverrides, XunitOverrides};
use crate::report::GlobLocator;
use crate::sink::{BaseDirFileSystem, Unit};
use crate::xunit::{ImportSummary, XunitImport};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct TestsArgs {
    /// Report path or glob, relative to the project base dir (repeatable)
    #[arg(long = "report-path", value_name = "PATTERN")]
    pub report_paths: Vec<String>,

    /// Rule set applied to every report before parsing
    #[arg(long)]
    pub transformation: Option<String>,

    /// Character encoding of the reports
    #[arg(long)]
    pub encoding: Option<String>,

    /// Write JSON-lines records to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn execute(args: TestsArgs, ctx: &CommandContext<'_>) -> Result<()> {
    let config = ctx.load_config(CliOverrides {
        xunit: XunitOverrides {
            report_paths: args.report_paths,
            transformation: args.transformation,
            encoding: args.encoding,
        },
        sink: SinkOverrides { output: args.output },
        ..Default::default()
    })?;

    let mut sink = open_sink(config.sink.output.as_deref())?;
    let files = BaseDirFileSystem::new(&config.project.base_dir);
    let mut bridge = PersistenceBridge::new(&mut sink, &files, config.policy(), &config.analysis.repository);

    let summary = import_tests(&config, &mut bridge, &ctx.output)?;
    let published = bridge.into_summary();
    sink.into_inner()?;

    ctx.output.table_row("Measures saved", published.metrics_saved);
    ctx.output.task_summary(
        if summary.published {
            "Test statistics published"
        } else {
            "No test statistics published"
        },
        summary.published || summary.located == 0,
    );
    Ok(())
}

/// The `tests` pipeline on an already opened bridge.
pub(crate) fn import_tests(
    config: &ReportflowConfig,
    bridge: &mut PersistenceBridge<'_>,
    output: &Output,
) -> Result<ImportSummary> {
    output.header("Unit test reports");
    if config.xunit.report_paths.is_empty() {
        output.warning("No report paths configured (xunit.report_paths)");
        return Ok(ImportSummary::default());
    }

    let import = XunitImport::new(config.xunit.report_paths.clone())
        .transformation(config.xunit.transformation.clone())
        .encoding(config.xunit_encoding()?)
        .policy(config.policy());
    let locator = GlobLocator::new(&config.project.base_dir);
    let summary = import.execute(&locator, bridge, &Unit::project(&config.project.key))?;

    if summary.located == 0 {
        output.warning("No reports found, nothing to process");
        return Ok(summary);
    }
    output.table_row("Reports located", summary.located);
    output.table_row("Reports parsed", summary.parsed);
    if summary.empty > 0 {
        output.table_row("Empty reports", summary.empty);
    }
    if summary.skipped > 0 {
        output.warning(&format!("{} report(s) skipped, see the log for details", summary.skipped));
    }
    if let Some(stats) = &summary.statistics {
        output.table_row("Tests", stats.tests);
        output.table_row("Failures", stats.failures);
        output.table_row("Errors", stats.errors);
        output.table_row("Skipped", stats.skipped);
        output.table_row("Execution time", format!("{} ms", stats.time_ms));
    }
    Ok(summary)
}
