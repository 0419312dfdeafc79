use std::any::Any;
use std::process::ExitCode;

use rollcall_core::errors::AppResult;

use crate::cli::OutputMode;
use crate::commands::CommandHandler;
use crate::doctor::{run_doctor, DoctorOutcome};
use crate::output::render_doctor;

type DoctorRunner = dyn Fn() -> AppResult<DoctorOutcome> + Send + Sync;
type DoctorRenderer = dyn Fn(&DoctorOutcome, OutputMode) -> AppResult<()> + Send + Sync;

pub struct DoctorHandler {
    run: Box<DoctorRunner>,
    render: Box<DoctorRenderer>,
}

impl DoctorHandler {
    pub fn new() -> Self {
        Self::with_dependencies(run_doctor, render_doctor)
    }

    pub fn with_dependencies(
        run: impl Fn() -> AppResult<DoctorOutcome> + Send + Sync + 'static,
        render: impl Fn(&DoctorOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for DoctorHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)()?;
        (self.render)(&outcome, mode)?;
        Ok(if outcome.ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
