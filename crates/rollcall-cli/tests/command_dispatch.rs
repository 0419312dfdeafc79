use rollcall_cli::cli::{Commands, EnrollArgs, ReportArgs, RosterArgs, RunArgs};
use rollcall_cli::commands::{
    CommandHandler, DoctorHandler, EnrollHandler, ReportHandler, RosterHandler, RunHandler,
};

fn assert_dispatch<T: 'static>(command: Commands) {
    let handler: Box<dyn CommandHandler> = command.into();
    assert!(handler.as_any().is::<T>());
}

#[test]
fn enroll_maps_to_its_handler() {
    assert_dispatch::<EnrollHandler>(Commands::Enroll(EnrollArgs {
        name: "alice".to_string(),
        overwrite: false,
        device: None,
        delay: None,
        known_faces_dir: None,
        landmark_model: None,
        encoder_model: None,
        jitters: None,
    }));
}

#[test]
fn run_maps_to_its_handler() {
    assert_dispatch::<RunHandler>(Commands::Run(RunArgs {
        tolerance: None,
        interval: None,
        device: None,
        known_faces_dir: None,
        reports_dir: None,
        landmark_model: None,
        encoder_model: None,
        jitters: None,
    }));
}

#[test]
fn roster_maps_to_its_handler() {
    assert_dispatch::<RosterHandler>(Commands::Roster(RosterArgs {
        known_faces_dir: None,
    }));
}

#[test]
fn report_maps_to_its_handler() {
    assert_dispatch::<ReportHandler>(Commands::Report(ReportArgs {
        day: None,
        reports_dir: None,
    }));
}

#[test]
fn doctor_maps_to_its_handler() {
    assert_dispatch::<DoctorHandler>(Commands::Doctor);
}
