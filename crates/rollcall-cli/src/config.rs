use tracing::debug;

use rollcall_config::{ConfigError, ResolvedConfigWithSource};
use rollcall_core::errors::{AppError, AppResult};

/// Loads the system config and lifts its errors into [`AppError`] so they
/// exit like any other validation failure.
pub fn load_app_config() -> AppResult<ResolvedConfigWithSource> {
    let loaded = rollcall_config::load_resolved_config().map_err(map_config_error)?;
    match &loaded.source {
        Some(path) => debug!(path = %path.display(), "config file loaded"),
        None => debug!("no config file found; built-in defaults in effect"),
    }
    Ok(loaded)
}

fn map_config_error(err: ConfigError) -> AppError {
    match err {
        ConfigError::Read { path, source } => AppError::ConfigRead { path, source },
        ConfigError::Parse { path, message } => AppError::ConfigParse { path, message },
    }
}
