use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use rollcall_config::{
    self, ConfigError, ResolvedConfig, ResolvedConfigWithSource, PRIMARY_CONFIG_PATH,
    SECONDARY_CONFIG_PATH,
};
use rollcall_core::capture::DeviceLocator;
use rollcall_core::errors::AppResult;
use rollcall_core::faces::{ENCODER_MODEL_ENV, LANDMARK_MODEL_ENV};

const CHECK_CONFIG: &str = "config";
const CHECK_KNOWN_FACES_DIR: &str = "known_faces_dir";
const CHECK_REPORTS_DIR: &str = "reports_dir";
const CHECK_LANDMARK_MODEL: &str = "landmark_model";
const CHECK_ENCODER_MODEL: &str = "encoder_model";
const CHECK_VIDEO_DEVICE: &str = "video_device";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorOutcome {
    pub ok: bool,
    pub checks: Vec<DoctorCheck>,
}

/// Probes a video device without streaming from it.
pub trait DeviceOpener {
    fn open(&self, locator: &DeviceLocator) -> AppResult<()>;
}

#[derive(Clone, Copy)]
pub struct RealDeviceOpener;

impl DeviceOpener for RealDeviceOpener {
    fn open(&self, locator: &DeviceLocator) -> AppResult<()> {
        let _ = locator.open()?;
        Ok(())
    }
}

pub struct DoctorContext<D> {
    pub config_paths: Vec<PathBuf>,
    pub device_opener: D,
    pub fallback_config: ResolvedConfig,
}

impl Default for DoctorContext<RealDeviceOpener> {
    fn default() -> Self {
        Self {
            config_paths: vec![
                PathBuf::from(PRIMARY_CONFIG_PATH),
                PathBuf::from(SECONDARY_CONFIG_PATH),
            ],
            device_opener: RealDeviceOpener,
            fallback_config: ResolvedConfig::default(),
        }
    }
}

pub fn run_doctor() -> AppResult<DoctorOutcome> {
    let ctx = DoctorContext::default();
    run_doctor_with(&ctx)
}

/// Probes everything an attendance session depends on. Problems never abort
/// the doctor; each one becomes a failed or warning check in the outcome.
/// A warning alone does not make the outcome not-ok; config is optional and
/// the reports directory appears on first use.
pub fn run_doctor_with<D: DeviceOpener>(ctx: &DoctorContext<D>) -> AppResult<DoctorOutcome> {
    let (config_check, resolved) = check_config(&ctx.config_paths, &ctx.fallback_config);
    let mut checks = vec![config_check];

    checks.push(check_known_faces_dir(&resolved.resolved.known_faces_dir));
    checks.push(check_reports_dir(&resolved.resolved.reports_dir));
    checks.push(check_model(
        CHECK_LANDMARK_MODEL,
        resolved.resolved.landmark_model.as_ref(),
        LANDMARK_MODEL_ENV,
    ));
    checks.push(check_model(
        CHECK_ENCODER_MODEL,
        resolved.resolved.encoder_model.as_ref(),
        ENCODER_MODEL_ENV,
    ));
    checks.push(check_video_device(&resolved, &ctx.device_opener));

    let ok = checks.iter().all(|c| c.status != CheckStatus::Fail);

    Ok(DoctorOutcome { ok, checks })
}

fn check_config(
    paths: &[PathBuf],
    fallback: &ResolvedConfig,
) -> (DoctorCheck, ResolvedConfigWithSource) {
    let existing = paths.iter().filter(|p| p.exists()).count();

    match rollcall_config::load_resolved_from_paths(paths) {
        Ok(loaded) => {
            let check = match &loaded.source {
                None => DoctorCheck {
                    name: CHECK_CONFIG.into(),
                    status: CheckStatus::Warn,
                    message: format!(
                        "No config file found; tried {}; built-in defaults in effect",
                        display_paths(paths)
                    ),
                    path: None,
                    device: None,
                },
                Some(source) if existing > 1 => DoctorCheck {
                    name: CHECK_CONFIG.into(),
                    status: CheckStatus::Warn,
                    message: format!("Multiple config files exist; using {}", source.display()),
                    path: Some(source.display().to_string()),
                    device: None,
                },
                Some(source) => DoctorCheck {
                    name: CHECK_CONFIG.into(),
                    status: CheckStatus::Pass,
                    message: format!("Loaded config from {}", source.display()),
                    path: Some(source.display().to_string()),
                    device: None,
                },
            };
            (check, loaded)
        }
        Err(ConfigError::Parse { path, message }) => (
            DoctorCheck {
                name: CHECK_CONFIG.into(),
                status: CheckStatus::Fail,
                message: format!("Failed to parse {}: {}", path.display(), message),
                path: Some(path.display().to_string()),
                device: None,
            },
            ResolvedConfigWithSource {
                resolved: fallback.clone(),
                source: None,
            },
        ),
        Err(ConfigError::Read { path, source }) => (
            DoctorCheck {
                name: CHECK_CONFIG.into(),
                status: CheckStatus::Fail,
                message: format!("Failed to read {}: {}", path.display(), source),
                path: Some(path.display().to_string()),
                device: None,
            },
            ResolvedConfigWithSource {
                resolved: fallback.clone(),
                source: None,
            },
        ),
    }
}

fn check_known_faces_dir(dir: &Path) -> DoctorCheck {
    match (dir.exists(), dir.is_dir()) {
        (false, _) => DoctorCheck {
            name: CHECK_KNOWN_FACES_DIR.into(),
            status: CheckStatus::Fail,
            message: format!("{} missing; enroll someone first", dir.display()),
            path: Some(dir.display().to_string()),
            device: None,
        },
        (true, false) => DoctorCheck {
            name: CHECK_KNOWN_FACES_DIR.into(),
            status: CheckStatus::Fail,
            message: format!("{} is not a directory", dir.display()),
            path: Some(dir.display().to_string()),
            device: None,
        },
        (true, true) => match count_subdirectories(dir) {
            Ok(0) => DoctorCheck {
                name: CHECK_KNOWN_FACES_DIR.into(),
                status: CheckStatus::Fail,
                message: format!(
                    "{} contains no identity directories; enroll someone first",
                    dir.display()
                ),
                path: Some(dir.display().to_string()),
                device: None,
            },
            Ok(count) => DoctorCheck {
                name: CHECK_KNOWN_FACES_DIR.into(),
                status: CheckStatus::Pass,
                message: format!("{count} identity directorie(s) under {}", dir.display()),
                path: Some(dir.display().to_string()),
                device: None,
            },
            Err(err) => DoctorCheck {
                name: CHECK_KNOWN_FACES_DIR.into(),
                status: CheckStatus::Fail,
                message: format!("Cannot read {}: {}", dir.display(), err),
                path: Some(dir.display().to_string()),
                device: None,
            },
        },
    }
}

fn count_subdirectories(dir: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            count += 1;
        }
    }
    Ok(count)
}

fn check_reports_dir(dir: &Path) -> DoctorCheck {
    match (dir.exists(), dir.is_dir()) {
        (false, _) => DoctorCheck {
            name: CHECK_REPORTS_DIR.into(),
            status: CheckStatus::Warn,
            message: format!(
                "{} does not exist yet; created on the first attendance flush",
                dir.display()
            ),
            path: Some(dir.display().to_string()),
            device: None,
        },
        (true, false) => DoctorCheck {
            name: CHECK_REPORTS_DIR.into(),
            status: CheckStatus::Fail,
            message: format!("{} is not a directory", dir.display()),
            path: Some(dir.display().to_string()),
            device: None,
        },
        (true, true) => DoctorCheck {
            name: CHECK_REPORTS_DIR.into(),
            status: CheckStatus::Pass,
            message: format!("{} present", dir.display()),
            path: Some(dir.display().to_string()),
            device: None,
        },
    }
}

fn check_model(name: &str, path: Option<&PathBuf>, env_var: &str) -> DoctorCheck {
    match path {
        None => DoctorCheck {
            name: name.into(),
            status: CheckStatus::Warn,
            message: format!(
                "Not configured; set {name} in the config file or {env_var} in the environment"
            ),
            path: None,
            device: None,
        },
        Some(p) => match fs::File::open(p) {
            Ok(_) => DoctorCheck {
                name: name.into(),
                status: CheckStatus::Pass,
                message: format!("Found model at {}", p.display()),
                path: Some(p.display().to_string()),
                device: None,
            },
            Err(err) => DoctorCheck {
                name: name.into(),
                status: CheckStatus::Fail,
                message: format!("Cannot read model {}: {}", p.display(), err),
                path: Some(p.display().to_string()),
                device: None,
            },
        },
    }
}

fn check_video_device<D: DeviceOpener>(cfg: &ResolvedConfigWithSource, opener: &D) -> DoctorCheck {
    let locator = DeviceLocator::from_option(Some(cfg.resolved.video_device.clone()));
    let display = locator.display();

    match opener.open(&locator) {
        Ok(_) => DoctorCheck {
            name: CHECK_VIDEO_DEVICE.into(),
            status: CheckStatus::Pass,
            message: format!("Opened video device {display}"),
            path: None,
            device: Some(display),
        },
        Err(err) => DoctorCheck {
            name: CHECK_VIDEO_DEVICE.into(),
            status: CheckStatus::Fail,
            message: err.human_message(),
            path: None,
            device: Some(display),
        },
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    use rollcall_core::errors::AppError;

    struct StubOpener {
        fail_with: Option<String>,
    }

    impl DeviceOpener for StubOpener {
        fn open(&self, locator: &DeviceLocator) -> AppResult<()> {
            match &self.fail_with {
                None => Ok(()),
                Some(message) => Err(AppError::DeviceOpen {
                    device: locator.display(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, message.clone()),
                }),
            }
        }
    }

    fn ok_opener() -> StubOpener {
        StubOpener { fail_with: None }
    }

    fn ctx_with(config_paths: Vec<PathBuf>, opener: StubOpener) -> DoctorContext<StubOpener> {
        DoctorContext {
            config_paths,
            device_opener: opener,
            fallback_config: ResolvedConfig::default(),
        }
    }

    fn check_named<'a>(outcome: &'a DoctorOutcome, name: &str) -> &'a DoctorCheck {
        outcome
            .checks
            .iter()
            .find(|check| check.name == name)
            .unwrap_or_else(|| panic!("no check named {name}"))
    }

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn healthy_environment_passes_every_check() {
        let tmp = tempfile::tempdir().unwrap();
        let faces = tmp.path().join("known_faces");
        let reports = tmp.path().join("attendance_reports");
        fs::create_dir_all(faces.join("alice")).unwrap();
        fs::create_dir_all(&reports).unwrap();
        let landmarks = tmp.path().join("landmarks.dat");
        let encoder = tmp.path().join("encoder.dat");
        fs::write(&landmarks, b"model").unwrap();
        fs::write(&encoder, b"model").unwrap();
        let config = write_config(
            tmp.path(),
            &format!(
                "known_faces_dir = \"{}\"\nreports_dir = \"{}\"\nlandmark_model = \"{}\"\nencoder_model = \"{}\"\n",
                faces.display(),
                reports.display(),
                landmarks.display(),
                encoder.display(),
            ),
        );

        let outcome = run_doctor_with(&ctx_with(vec![config], ok_opener())).unwrap();

        assert!(outcome.ok, "checks: {:?}", outcome.checks);
        assert!(outcome
            .checks
            .iter()
            .all(|check| check.status == CheckStatus::Pass));
    }

    #[test]
    fn missing_config_warns_and_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();

        let outcome =
            run_doctor_with(&ctx_with(vec![tmp.path().join("absent.toml")], ok_opener())).unwrap();

        let config = check_named(&outcome, CHECK_CONFIG);
        assert_eq!(config.status, CheckStatus::Warn);
        assert!(config.message.contains("built-in defaults"));
    }

    #[test]
    fn unparseable_config_fails_the_config_check() {
        let tmp = tempfile::tempdir().unwrap();
        let config = write_config(tmp.path(), "tolerance = \"not a number\"\n");

        let outcome = run_doctor_with(&ctx_with(vec![config], ok_opener())).unwrap();

        assert!(!outcome.ok);
        assert_eq!(check_named(&outcome, CHECK_CONFIG).status, CheckStatus::Fail);
    }

    #[test]
    fn multiple_config_files_warn_about_which_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first.toml");
        let second = tmp.path().join("second.toml");
        fs::write(&first, "frame_interval = 3\n").unwrap();
        fs::write(&second, "frame_interval = 7\n").unwrap();

        let outcome = run_doctor_with(&ctx_with(vec![first.clone(), second], ok_opener())).unwrap();

        let config = check_named(&outcome, CHECK_CONFIG);
        assert_eq!(config.status, CheckStatus::Warn);
        assert!(config.message.contains(&first.display().to_string()));
    }

    #[test]
    fn empty_gallery_fails_the_gallery_check() {
        let tmp = tempfile::tempdir().unwrap();
        let faces = tmp.path().join("known_faces");
        fs::create_dir_all(&faces).unwrap();
        let config = write_config(
            tmp.path(),
            &format!("known_faces_dir = \"{}\"\n", faces.display()),
        );

        let outcome = run_doctor_with(&ctx_with(vec![config], ok_opener())).unwrap();

        assert!(!outcome.ok);
        let check = check_named(&outcome, CHECK_KNOWN_FACES_DIR);
        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.message.contains("no identity directories"));
    }

    #[test]
    fn missing_reports_dir_only_warns() {
        let tmp = tempfile::tempdir().unwrap();
        let faces = tmp.path().join("known_faces");
        fs::create_dir_all(faces.join("alice")).unwrap();
        let landmarks = tmp.path().join("landmarks.dat");
        let encoder = tmp.path().join("encoder.dat");
        fs::write(&landmarks, b"model").unwrap();
        fs::write(&encoder, b"model").unwrap();
        let config = write_config(
            tmp.path(),
            &format!(
                "known_faces_dir = \"{}\"\nreports_dir = \"{}\"\nlandmark_model = \"{}\"\nencoder_model = \"{}\"\n",
                faces.display(),
                tmp.path().join("reports").display(),
                landmarks.display(),
                encoder.display(),
            ),
        );

        let outcome = run_doctor_with(&ctx_with(vec![config], ok_opener())).unwrap();

        assert_eq!(
            check_named(&outcome, CHECK_REPORTS_DIR).status,
            CheckStatus::Warn
        );
        assert!(outcome.ok, "a missing reports dir must not fail the doctor");
    }

    #[test]
    fn unconfigured_models_warn_with_both_alternatives() {
        let tmp = tempfile::tempdir().unwrap();
        let config = write_config(tmp.path(), "frame_interval = 5\n");

        let outcome = run_doctor_with(&ctx_with(vec![config], ok_opener())).unwrap();

        let landmarks = check_named(&outcome, CHECK_LANDMARK_MODEL);
        assert_eq!(landmarks.status, CheckStatus::Warn);
        assert!(landmarks.message.contains("DLIB_LANDMARK_MODEL"));
        let encoder = check_named(&outcome, CHECK_ENCODER_MODEL);
        assert_eq!(encoder.status, CheckStatus::Warn);
        assert!(encoder.message.contains("DLIB_ENCODER_MODEL"));
    }

    #[test]
    fn configured_but_absent_model_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let config = write_config(
            tmp.path(),
            &format!(
                "landmark_model = \"{}\"\n",
                tmp.path().join("nope.dat").display()
            ),
        );

        let outcome = run_doctor_with(&ctx_with(vec![config], ok_opener())).unwrap();

        assert!(!outcome.ok);
        assert_eq!(
            check_named(&outcome, CHECK_LANDMARK_MODEL).status,
            CheckStatus::Fail
        );
    }

    #[test]
    fn unopenable_device_fails_with_the_probe_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = write_config(tmp.path(), "video_device = \"/dev/video7\"\n");
        let opener = StubOpener {
            fail_with: Some("no such device".to_string()),
        };

        let outcome = run_doctor_with(&ctx_with(vec![config], opener)).unwrap();

        assert!(!outcome.ok);
        let check = check_named(&outcome, CHECK_VIDEO_DEVICE);
        assert_eq!(check.status, CheckStatus::Fail);
        assert_eq!(check.device.as_deref(), Some("/dev/video7"));
        assert!(check.message.contains("/dev/video7"));
    }
}
