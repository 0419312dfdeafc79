use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use rollcall_cli::cli::OutputMode;
use rollcall_cli::commands::{CommandHandler, DoctorHandler};
use rollcall_cli::doctor::{CheckStatus, DoctorCheck, DoctorOutcome};

fn check(name: &str, status: CheckStatus) -> DoctorCheck {
    DoctorCheck {
        name: name.to_string(),
        status,
        message: "probe".to_string(),
        path: None,
        device: None,
    }
}

#[test]
fn healthy_outcome_exits_cleanly() {
    let rendered = Arc::new(Mutex::new(0u32));
    let sink = Arc::clone(&rendered);
    let handler = DoctorHandler::with_dependencies(
        || {
            Ok(DoctorOutcome {
                ok: true,
                checks: vec![check("config", CheckStatus::Pass)],
            })
        },
        move |_, _| {
            *sink.lock().unwrap() += 1;
            Ok(())
        },
    );

    let code = handler.execute(OutputMode::Human, false).unwrap();

    assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::SUCCESS));
    assert_eq!(*rendered.lock().unwrap(), 1);
}

#[test]
fn failing_outcome_still_renders_but_exits_nonzero() {
    let rendered = Arc::new(Mutex::new(0u32));
    let sink = Arc::clone(&rendered);
    let handler = DoctorHandler::with_dependencies(
        || {
            Ok(DoctorOutcome {
                ok: false,
                checks: vec![
                    check("config", CheckStatus::Pass),
                    check("video_device", CheckStatus::Fail),
                ],
            })
        },
        move |outcome, _| {
            assert!(!outcome.ok);
            *sink.lock().unwrap() += 1;
            Ok(())
        },
    );

    let code = handler.execute(OutputMode::Json, false).unwrap();

    assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::from(1)));
    assert_eq!(*rendered.lock().unwrap(), 1);
}
