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

use serde::{Deserialize, Serialize};

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

// Provider configurations - API keys and endpoint overrides only
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProviderConfig {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub api_key: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
	#[serde(default)]
	pub openai: ProviderConfig,
	#[serde(default)]
	pub openrouter: ProviderConfig,
}

impl ProvidersConfig {
	pub fn get(&self, provider: &str) -> Option<&ProviderConfig> {
		match provider {
			"openai" => Some(&self.openai),
			"openrouter" => Some(&self.openrouter),
			_ => None,
		}
	}

	/// Base URL for a provider, falling back to its public endpoint
	pub fn base_url(&self, provider: &str) -> Option<String> {
		let configured = self.get(provider)?.base_url.clone();
		let default = match provider {
			"openai" => OPENAI_DEFAULT_BASE_URL,
			"openrouter" => OPENROUTER_DEFAULT_BASE_URL,
			_ => return None,
		};
		Some(configured.unwrap_or_else(|| default.to_string()))
	}
}
