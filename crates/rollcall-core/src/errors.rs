use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

/// Unified error type for the whole application.
///
/// Recoverable conditions (an unreadable reference image, a frame that fails
/// to convert mid-session) are absorbed and logged where they occur; anything
/// that reaches the caller through this type ends the command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("no enrolled identities found under {}", dir.display())]
    NoKnownIdentities { dir: PathBuf },

    #[error("invalid person name '{name}': {message}")]
    InvalidPersonName { name: String, message: String },

    #[error("'{name}' is already enrolled at {}; pass --overwrite to replace the existing captures", dir.display())]
    PersonExists { name: String, dir: PathBuf },

    #[error("invalid day '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("failed to read config file {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("failed to open video device {device}")]
    DeviceOpen {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("device not usable for capture: {0}")]
    Capability(String),

    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("frame processing failed: {0}")]
    FrameProcessing(String),

    #[error("failed to decode image {}", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("missing {kind} model path; pass {flag} or set {env}")]
    MissingModel {
        kind: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    #[error("failed to load model {}: {message}", path.display())]
    ModelLoad { path: PathBuf, message: String },

    #[error("failed to read attendance ledger {}", path.display())]
    LedgerRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("attendance ledger {} is malformed: {message}", path.display())]
    InvalidLedger { path: PathBuf, message: String },

    #[error("failed to write attendance ledger {}", path.display())]
    LedgerWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to lock attendance ledger {}", path.display())]
    LedgerLock {
        path: PathBuf,
        #[source]
        source: nix::errno::Errno,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Process exit code for this error. Validation and configuration
    /// problems map to 2, camera problems to 3, model problems to 4.
    pub fn exit_code(&self) -> ExitCode {
        let code: u8 = match self {
            Self::NoKnownIdentities { .. }
            | Self::InvalidPersonName { .. }
            | Self::PersonExists { .. }
            | Self::InvalidDate { .. }
            | Self::ConfigRead { .. }
            | Self::ConfigParse { .. } => 2,
            Self::DeviceOpen { .. }
            | Self::Capability(_)
            | Self::UnsupportedFormat(_)
            | Self::FrameProcessing(_) => 3,
            Self::MissingModel { .. } | Self::ModelLoad { .. } => 4,
            _ => 1,
        };
        ExitCode::from(code)
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;
