use super::CommandContext;
use crate::config::{CliOverrides, XunitOverrides};
use crate::report::Report;
use crate::transform::{FormatTransformer, bundled_stylesheets};
use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct TransformArgs {
    /// Vendor report to convert
    #[arg(required_unless_present = "list")]
    pub report: Option<PathBuf>,

    /// Rule set name, file or URL (defaults to xunit.transformation)
    #[arg(short, long)]
    pub transformation: Option<String>,

    /// Character encoding of the report
    #[arg(long)]
    pub encoding: Option<String>,

    /// List the bundled rule sets
    #[arg(long, conflicts_with = "report")]
    pub list: bool,
}

pub fn execute(args: TransformArgs, ctx: &CommandContext<'_>) -> Result<()> {
    if args.list {
        ctx.output.header("Bundled transformations");
        for stylesheet in bundled_stylesheets()? {
            println!("{:<28} {}", stylesheet.name(), stylesheet.description());
        }
        return Ok(());
    }

    let config = ctx.load_config(CliOverrides {
        xunit: XunitOverrides {
            transformation: args.transformation,
            encoding: args.encoding,
            ..Default::default()
        },
        ..Default::default()
    })?;
    let Some(report) = args.report else {
        bail!("No report given");
    };
    if config.xunit.transformation.is_none() {
        bail!("No transformation given (--transformation or xunit.transformation)");
    }

    let mut transformer = FormatTransformer::new(config.xunit.transformation.clone());
    let source = Report::open(&report, config.xunit_encoding()?)?;
    let canonical = transformer.transform(&source)?;

    println!("{}", canonical.path().display());
    if canonical.path() == source.path() {
        ctx.output.info("The report is empty, nothing to transform");
    } else {
        ctx.output.success(&format!("Transformed '{}'", report.display()));
    }
    Ok(())
}
