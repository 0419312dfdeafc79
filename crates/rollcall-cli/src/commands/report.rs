use std::any::Any;
use std::process::ExitCode;

use rollcall_core::errors::AppResult;

use crate::cli::{OutputMode, ReportArgs};
use crate::commands::CommandHandler;
use crate::output::render_report;
use crate::report::{run_report, ReportOutcome};

type ReportRunner = dyn Fn(&ReportArgs) -> AppResult<ReportOutcome> + Send + Sync;
type ReportRenderer = dyn Fn(&ReportOutcome, OutputMode) -> AppResult<()> + Send + Sync;

pub struct ReportHandler {
    args: ReportArgs,
    run: Box<ReportRunner>,
    render: Box<ReportRenderer>,
}

impl ReportHandler {
    pub fn new(args: ReportArgs) -> Self {
        Self::with_dependencies(args, run_report, render_report)
    }

    pub fn with_dependencies(
        args: ReportArgs,
        run: impl Fn(&ReportArgs) -> AppResult<ReportOutcome> + Send + Sync + 'static,
        render: impl Fn(&ReportOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for ReportHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
