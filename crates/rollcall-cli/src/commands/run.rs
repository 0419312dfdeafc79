use std::any::Any;
use std::process::ExitCode;

use rollcall_core::errors::AppResult;

use crate::cli::{OutputMode, RunArgs};
use crate::commands::CommandHandler;
use crate::output::render_attendance;
use crate::session::{run_attendance, AttendanceRunOutcome};

type AttendanceRunner = dyn Fn(&RunArgs) -> AppResult<AttendanceRunOutcome> + Send + Sync;
type AttendanceRenderer = dyn Fn(&AttendanceRunOutcome, OutputMode) -> AppResult<()> + Send + Sync;

pub struct RunHandler {
    args: RunArgs,
    run: Box<AttendanceRunner>,
    render: Box<AttendanceRenderer>,
}

impl RunHandler {
    pub fn new(args: RunArgs) -> Self {
        Self::with_dependencies(args, run_attendance, render_attendance)
    }

    pub fn with_dependencies(
        args: RunArgs,
        run: impl Fn(&RunArgs) -> AppResult<AttendanceRunOutcome> + Send + Sync + 'static,
        render: impl Fn(&AttendanceRunOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for RunHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
