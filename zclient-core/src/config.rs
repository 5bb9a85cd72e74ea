use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
	pub log_level: String,
	/// Colored output for the fmt subscriber.
	pub log_ansi: bool,
}

impl Default for CoreConfig {
	fn default() -> Self {
		Self { log_level: "info".into(), log_ansi: false }
	}
}

impl CoreConfig {
	pub fn builder() -> CoreConfigBuilder { CoreConfigBuilder::default() }

	pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
		let data = fs::read_to_string(path)?;
		let cfg: Self = toml::from_str(&data).map_err(|e| Error::config(format!("toml parse error: {e}")))?;
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
		let data = toml::to_string_pretty(self).map_err(|e| Error::config(format!("toml encode error: {e}")))?;
		fs::write(path, data)?;
		Ok(())
	}

	/// Defaults overridden by `ZCLIENT_LOG_LEVEL` and `ZCLIENT_LOG_ANSI`.
	pub fn from_env() -> Result<Self> {
		let mut cfg = Self::default();
		if let Ok(v) = std::env::var("ZCLIENT_LOG_LEVEL") { cfg.log_level = v; }
		if let Ok(v) = std::env::var("ZCLIENT_LOG_ANSI") { cfg.log_ansi = v == "1" || v.eq_ignore_ascii_case("true"); }
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn validate(&self) -> Result<()> {
		if !LOG_LEVELS.contains(&self.log_level.as_str()) {
			return Err(Error::config(format!("invalid log_level: {}", self.log_level)));
		}
		Ok(())
	}
}

#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
	log_level: Option<String>,
	log_ansi: Option<bool>,
}

impl CoreConfigBuilder {
	pub fn log_level(mut self, level: impl Into<String>) -> Self { self.log_level = Some(level.into()); self }
	pub fn log_ansi(mut self, on: bool) -> Self { self.log_ansi = Some(on); self }

	pub fn build(self) -> Result<CoreConfig> {
		let mut cfg = CoreConfig::default();
		if let Some(v) = self.log_level { cfg.log_level = v; }
		if let Some(v) = self.log_ansi { cfg.log_ansi = v; }
		cfg.validate()?;
		Ok(cfg)
	}
}
