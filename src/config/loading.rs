// Copyright 2025 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Config, LogLevel};

const FALLBACK_USERNAME: &str = "root";
const FALLBACK_HOSTNAME: &str = "server";

impl Config {
	/// Load configuration from the system-wide config file, then apply
	/// environment overrides. A missing file means defaults.
	pub fn load() -> Result<Self> {
		let config_path = crate::directories::get_config_file_path()?;
		let mut config = Self::load_from(&config_path)?;
		config.apply_env(|key| std::env::var(key).ok());
		Ok(config)
	}

	/// Load a config file without consulting the environment
	pub fn load_from(config_path: &Path) -> Result<Self> {
		let mut config = if config_path.exists() {
			let config_str = fs::read_to_string(config_path).context(format!(
				"Failed to read config from {}",
				config_path.display()
			))?;
			toml::from_str::<Config>(&config_str).context(format!(
				"Failed to parse TOML configuration in {}",
				config_path.display()
			))?
		} else {
			Config::default()
		};

		config.config_path = Some(config_path.to_path_buf());
		Ok(config)
	}

	/// Environment variables take precedence over config file values
	pub fn apply_env<F>(&mut self, lookup: F)
	where
		F: Fn(&str) -> Option<String>,
	{
		let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

		if let Some(key) = lookup("OPENAI_API_KEY") {
			self.providers.openai.api_key = Some(key);
		}
		if let Some(url) = lookup("OPENAI_BASE_URL") {
			self.providers.openai.base_url = Some(url);
		}
		if let Some(key) = lookup("OPENROUTER_API_KEY") {
			self.providers.openrouter.api_key = Some(key);
		}
		if let Some(model) = lookup("OPENAI_MODEL") {
			self.model = normalize_model(&model);
		}
		if let Some(profile) = lookup("PROMPT_OS") {
			self.profile = profile;
		}
		if let Some(username) = lookup("SHELL_USERNAME") {
			self.username = Some(username);
		}
		if let Some(hostname) = lookup("SHELL_HOSTNAME") {
			self.hostname = Some(hostname);
		}
		if let Some(log_file) = lookup("LOG_FILE") {
			self.log_file = Some(PathBuf::from(log_file));
		}
		if let Some(level) = lookup("AISH_LOG_LEVEL") {
			match level.parse::<LogLevel>() {
				Ok(level) => self.log_level = level,
				Err(e) => eprintln!("Ignoring AISH_LOG_LEVEL: {}", e),
			}
		}
	}

	/// Username shown in the simulated prompt
	pub fn resolve_username(&self) -> String {
		self.resolve_username_with(|key| std::env::var(key).ok())
	}

	/// Configured name, then `USER`, then `USERNAME`; empty values are skipped
	pub fn resolve_username_with<F>(&self, lookup: F) -> String
	where
		F: Fn(&str) -> Option<String>,
	{
		let non_empty = |name: Option<String>| name.filter(|name| !name.is_empty());
		non_empty(self.username.clone())
			.or_else(|| non_empty(lookup("USER")))
			.or_else(|| non_empty(lookup("USERNAME")))
			.unwrap_or_else(|| FALLBACK_USERNAME.to_string())
	}

	/// Hostname shown in the simulated prompt
	pub fn resolve_hostname(&self) -> String {
		self.hostname
			.clone()
			.filter(|name| !name.is_empty())
			.or_else(|| {
				hostname::get()
					.ok()
					.map(|name| name.to_string_lossy().into_owned())
					.filter(|name| !name.is_empty())
			})
			.unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
	}
}

/// Accept both `provider:model` and a bare model name, which means OpenAI
pub fn normalize_model(model: &str) -> String {
	let known_prefix = ["openai:", "openrouter:"]
		.iter()
		.any(|prefix| model.starts_with(prefix));
	if known_prefix {
		model.to_string()
	} else {
		format!("openai:{}", model)
	}
}
