mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, LlmProviderConfig, Postgres, Providers, Security, Service, Storage};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	let synthesizer = &cfg.providers.synthesizer;

	for (label, value) in [
		("providers.synthesizer.api_base", &synthesizer.api_base),
		("providers.synthesizer.api_key", &synthesizer.api_key),
		("providers.synthesizer.model", &synthesizer.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if synthesizer.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.synthesizer.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !synthesizer.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.synthesizer.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&synthesizer.temperature) {
		return Err(Error::Validation {
			message: "providers.synthesizer.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}

	for (key, value) in &synthesizer.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!(
					"providers.synthesizer.default_headers.{key} must be a string value."
				),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.providers
		.synthesizer
		.system_prompt
		.as_deref()
		.map(|prompt| prompt.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.synthesizer.system_prompt = None;
	}
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}

	let trimmed = cfg.providers.synthesizer.api_base.trim_end_matches('/').to_string();

	cfg.providers.synthesizer.api_base = trimmed;
}
