use std::any::Any;
use std::process::ExitCode;

use rollcall_core::enrollment::EnrollmentOutcome;
use rollcall_core::errors::AppResult;

use crate::cli::{EnrollArgs, OutputMode};
use crate::commands::CommandHandler;
use crate::enroll::run_guided_enrollment;
use crate::output::render_enroll;

type EnrollRunner = dyn Fn(&EnrollArgs) -> AppResult<EnrollmentOutcome> + Send + Sync;
type EnrollRenderer = dyn Fn(&EnrollmentOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync;

pub struct EnrollHandler {
    args: EnrollArgs,
    run: Box<EnrollRunner>,
    render: Box<EnrollRenderer>,
}

impl EnrollHandler {
    pub fn new(args: EnrollArgs) -> Self {
        Self::with_dependencies(args, run_guided_enrollment, render_enroll)
    }

    pub fn with_dependencies(
        args: EnrollArgs,
        run: impl Fn(&EnrollArgs) -> AppResult<EnrollmentOutcome> + Send + Sync + 'static,
        render: impl Fn(&EnrollmentOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for EnrollHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode, verbose)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
