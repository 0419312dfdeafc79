use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use rollcall_cli::cli::{EnrollArgs, OutputMode};
use rollcall_cli::commands::{CommandHandler, EnrollHandler};
use rollcall_core::enrollment::EnrollmentOutcome;
use rollcall_core::errors::AppError;

fn sample_args() -> EnrollArgs {
    EnrollArgs {
        name: "alice".to_string(),
        overwrite: false,
        device: None,
        delay: None,
        known_faces_dir: None,
        landmark_model: None,
        encoder_model: None,
        jitters: None,
    }
}

fn sample_outcome() -> EnrollmentOutcome {
    EnrollmentOutcome {
        person: "alice".to_string(),
        person_dir: PathBuf::from("known_faces/alice"),
        captured: 5,
        completed: true,
        saved_files: Vec::new(),
        logs: vec!["Captured 5/5 for 'alice'".to_string()],
    }
}

#[test]
fn renders_the_outcome_and_exits_cleanly() {
    let rendered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&rendered);
    let handler = EnrollHandler::with_dependencies(
        sample_args(),
        |args| {
            assert_eq!(args.name, "alice");
            Ok(sample_outcome())
        },
        move |outcome, mode, verbose| {
            sink.lock()
                .unwrap()
                .push((outcome.person.clone(), mode, verbose));
            Ok(())
        },
    );

    let code = handler.execute(OutputMode::Json, true).unwrap();

    assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::SUCCESS));
    let calls = rendered.lock().unwrap();
    assert_eq!(calls.as_slice(), [("alice".to_string(), OutputMode::Json, true)]);
}

#[test]
fn runner_errors_surface_without_rendering() {
    let rendered = Arc::new(Mutex::new(0u32));
    let sink = Arc::clone(&rendered);
    let handler = EnrollHandler::with_dependencies(
        sample_args(),
        |args| {
            Err(AppError::PersonExists {
                name: args.name.clone(),
                dir: PathBuf::from("known_faces/alice"),
            })
        },
        move |_, _, _| {
            *sink.lock().unwrap() += 1;
            Ok(())
        },
    );

    let err = handler.execute(OutputMode::Human, false).unwrap_err();

    assert!(matches!(err, AppError::PersonExists { .. }));
    assert_eq!(*rendered.lock().unwrap(), 0);
}
