use tracing_subscriber::{fmt, EnvFilter};

use crate::config::CoreConfig;
use crate::error::{Error, Result};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `cfg.log_level` when set. Returns
/// `Ok(false)` if a global subscriber was already installed.
pub fn init_tracing(cfg: &CoreConfig) -> Result<bool> {
	cfg.validate()?;
	let filter = match EnvFilter::try_from_default_env() {
		Ok(f) => f,
		Err(_) => EnvFilter::try_new(&cfg.log_level).map_err(|e| Error::config(format!("log filter: {e}")))?,
	};
	let installed = fmt().with_env_filter(filter).with_ansi(cfg.log_ansi).with_target(true).try_init().is_ok();
	if installed {
		tracing::debug!(level = %cfg.log_level, "tracing initialized");
	}
	Ok(installed)
}
