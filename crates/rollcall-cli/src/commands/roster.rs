use std::any::Any;
use std::process::ExitCode;

use rollcall_core::errors::AppResult;

use crate::cli::{OutputMode, RosterArgs};
use crate::commands::CommandHandler;
use crate::output::render_roster;
use crate::roster::{run_roster, RosterOutcome};

type RosterRunner = dyn Fn(&RosterArgs) -> AppResult<RosterOutcome> + Send + Sync;
type RosterRenderer = dyn Fn(&RosterOutcome, OutputMode) -> AppResult<()> + Send + Sync;

pub struct RosterHandler {
    args: RosterArgs,
    run: Box<RosterRunner>,
    render: Box<RosterRenderer>,
}

impl RosterHandler {
    pub fn new(args: RosterArgs) -> Self {
        Self::with_dependencies(args, run_roster, render_roster)
    }

    pub fn with_dependencies(
        args: RosterArgs,
        run: impl Fn(&RosterArgs) -> AppResult<RosterOutcome> + Send + Sync + 'static,
        render: impl Fn(&RosterOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for RosterHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
