use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "rollcall", about = "Webcam attendance tracking for small rooms", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit machine-readable JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Human
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Capture reference snapshots for a person through a guided pose plan.
    Enroll(EnrollArgs),
    /// Run a live attendance session and record who showed up.
    Run(RunArgs),
    /// List enrolled identities.
    Roster(RosterArgs),
    /// Show the attendance records for a day.
    Report(ReportArgs),
    /// Check config, directories, models and the camera.
    Doctor,
}

#[derive(Debug, Args)]
pub struct EnrollArgs {
    /// Name of the person to enroll.
    pub name: String,

    /// Replace the person's existing captures instead of refusing.
    #[arg(long)]
    pub overwrite: bool,

    /// Video device index or path (e.g. 0 or /dev/video1).
    #[arg(long)]
    pub device: Option<String>,

    /// Minimum seconds between captured snapshots.
    #[arg(long)]
    pub delay: Option<f64>,

    /// Root directory holding one subdirectory per enrolled person.
    #[arg(long)]
    pub known_faces_dir: Option<PathBuf>,

    /// Path to the dlib landmark predictor model.
    #[arg(long)]
    pub landmark_model: Option<PathBuf>,

    /// Path to the dlib face encoder model.
    #[arg(long)]
    pub encoder_model: Option<PathBuf>,

    /// Re-encoding jitters when extracting descriptors.
    #[arg(long)]
    pub jitters: Option<u32>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Match tolerance; lower is stricter.
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Run face detection on every Nth frame.
    #[arg(long)]
    pub interval: Option<u32>,

    /// Video device index or path (e.g. 0 or /dev/video1).
    #[arg(long)]
    pub device: Option<String>,

    /// Root directory holding one subdirectory per enrolled person.
    #[arg(long)]
    pub known_faces_dir: Option<PathBuf>,

    /// Directory the daily attendance files are written to.
    #[arg(long)]
    pub reports_dir: Option<PathBuf>,

    /// Path to the dlib landmark predictor model.
    #[arg(long)]
    pub landmark_model: Option<PathBuf>,

    /// Path to the dlib face encoder model.
    #[arg(long)]
    pub encoder_model: Option<PathBuf>,

    /// Re-encoding jitters when extracting descriptors.
    #[arg(long)]
    pub jitters: Option<u32>,
}

#[derive(Debug, Args)]
pub struct RosterArgs {
    /// Root directory holding one subdirectory per enrolled person.
    #[arg(long)]
    pub known_faces_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Day to show as YYYY-MM-DD; defaults to today.
    #[arg(long)]
    pub day: Option<String>,

    /// Directory the daily attendance files are written to.
    #[arg(long)]
    pub reports_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_switches_the_output_mode() {
        assert_eq!(OutputMode::from(false), OutputMode::Human);
        assert_eq!(OutputMode::from(true), OutputMode::Json);
    }

    #[test]
    fn run_arguments_parse() {
        let cli = Cli::parse_from([
            "rollcall",
            "--json",
            "-vv",
            "run",
            "--tolerance",
            "0.5",
            "--interval",
            "3",
            "--device",
            "/dev/video1",
        ]);

        assert_eq!(cli.output_mode(), OutputMode::Json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.tolerance, Some(0.5));
                assert_eq!(args.interval, Some(3));
                assert_eq!(args.device.as_deref(), Some("/dev/video1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn enroll_takes_the_name_positionally() {
        let cli = Cli::parse_from(["rollcall", "enroll", "Mary Jane", "--overwrite"]);

        match cli.command {
            Commands::Enroll(args) => {
                assert_eq!(args.name, "Mary Jane");
                assert!(args.overwrite);
                assert!(args.device.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn report_day_is_optional() {
        let cli = Cli::parse_from(["rollcall", "report"]);

        match cli.command {
            Commands::Report(args) => assert!(args.day.is_none()),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
