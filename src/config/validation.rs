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

use anyhow::{anyhow, Result};

use super::Config;
use crate::session::ProviderFactory;

impl Config {
	/// Validate the configuration for common issues
	pub fn validate(&self) -> Result<()> {
		self.validate_model()?;
		self.validate_temperature()?;
		crate::prompt::validate_profile_name(&self.profile)
			.map_err(|e| anyhow!("Invalid profile: {}", e))?;
		Ok(())
	}

	pub fn validate_model(&self) -> Result<()> {
		let (provider_name, _) = ProviderFactory::parse_model(&self.model)?;
		if !ProviderFactory::is_supported(&provider_name) {
			return Err(anyhow!(
				"Unsupported provider: '{}'. Supported providers: {}",
				provider_name,
				ProviderFactory::SUPPORTED.join(", ")
			));
		}
		Ok(())
	}

	pub fn validate_temperature(&self) -> Result<()> {
		if !(0.0..=2.0).contains(&self.temperature) {
			return Err(anyhow!(
				"Temperature out of range: {}. Allowed: 0.0 to 2.0",
				self.temperature
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_config_is_valid() {
		assert!(Config::default().validate().is_ok());
	}

	#[test]
	fn test_invalid_models() {
		let invalid_models = [
			"gpt-4",              // Missing provider prefix
			"anthropic:claude-3", // Unsupported provider
			"openai:",            // Empty model
			":gpt-4o",            // Empty provider
			"",
		];

		for model in invalid_models {
			let config = Config {
				model: model.to_string(),
				..Default::default()
			};
			assert!(config.validate_model().is_err(), "Model {} should be invalid", model);
		}
	}

	#[test]
	fn test_temperature_bounds() {
		let mut config = Config::default();
		config.temperature = 2.0;
		assert!(config.validate_temperature().is_ok());
		config.temperature = -0.1;
		assert!(config.validate_temperature().is_err());
		config.temperature = 2.5;
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_profile_name_must_be_plain() {
		let config = Config {
			profile: "../../etc/passwd".to_string(),
			..Default::default()
		};
		assert!(config.validate().is_err());
	}
}
