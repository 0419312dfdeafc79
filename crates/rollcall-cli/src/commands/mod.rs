use std::any::Any;
use std::process::ExitCode;

use rollcall_core::errors::AppResult;

use crate::cli::{Commands, OutputMode};

/// A parsed subcommand, ready to execute. `as_any` exists so dispatch tests
/// can assert which handler a command mapped to.
pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod doctor;
mod enroll;
mod report;
mod roster;
mod run;

pub use doctor::DoctorHandler;
pub use enroll::EnrollHandler;
pub use report::ReportHandler;
pub use roster::RosterHandler;
pub use run::RunHandler;

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Enroll(args) => Box::new(EnrollHandler::new(args)),
            Commands::Run(args) => Box::new(RunHandler::new(args)),
            Commands::Roster(args) => Box::new(RosterHandler::new(args)),
            Commands::Report(args) => Box::new(ReportHandler::new(args)),
            Commands::Doctor => Box::new(DoctorHandler::new()),
        }
    }
}
