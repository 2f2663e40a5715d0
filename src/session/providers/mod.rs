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

// Provider abstraction layer for chat completion backends

use anyhow::Result;
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::session::Message;
use crate::shell::ShellResult;

pub mod openai;

pub use openai::OpenAiCompatibleProvider;

/// Lazily produced reply text, split at arbitrary points
pub type FragmentStream = Pin<Box<dyn Stream<Item = ShellResult<String>> + Send>>;

/// What a completion call hands back
pub enum Completion {
	/// The whole reply at once
	Message(String),
	/// The reply as it is generated
	Stream(FragmentStream),
}

impl Completion {
	/// View either shape as a fragment stream
	pub fn into_stream(self) -> FragmentStream {
		match self {
			Completion::Message(content) => Box::pin(futures::stream::once(async move { Ok(content) })),
			Completion::Stream(stream) => stream,
		}
	}
}

impl std::fmt::Debug for Completion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Completion::Message(content) => f.debug_tuple("Message").field(content).finish(),
			Completion::Stream(_) => f.write_str("Stream(..)"),
		}
	}
}

/// Trait that all completion backends must implement
#[async_trait::async_trait]
pub trait CompletionSource: Send + Sync {
	/// Get the provider name (e.g., "openai", "openrouter")
	fn name(&self) -> &str;

	/// Send the whole conversation and return the model's reply.
	///
	/// Resolves once the reply has started (streaming) or is complete
	/// (non-streaming). A failure here, or inside the returned stream, is
	/// fatal to the session; retries are the implementation's business.
	async fn complete(
		&self,
		messages: &[Message],
		model: &str,
		temperature: f32,
		cancel: &CancellationToken,
	) -> ShellResult<Completion>;
}

/// Provider factory to create the appropriate provider based on model string
pub struct ProviderFactory;

impl ProviderFactory {
	pub const SUPPORTED: &'static [&'static str] = &["openai", "openrouter"];

	/// Parse a model string in format "provider:model" and return (provider_name, model_name)
	pub fn parse_model(model: &str) -> Result<(String, String)> {
		if let Some(pos) = model.find(':') {
			let provider = model[..pos].to_string();
			let model_name = model[pos + 1..].to_string();

			if provider.is_empty() || model_name.is_empty() {
				return Err(anyhow::anyhow!(
					"Invalid model format. Use 'provider:model' (e.g., 'openai:gpt-4o-mini')"
				));
			}

			Ok((provider, model_name))
		} else {
			Err(anyhow::anyhow!(
				"Invalid model format '{}'. Must specify provider like 'openai:gpt-4o-mini' or 'openrouter:meta-llama/llama-3.1-8b-instruct'",
				model
			))
		}
	}

	pub fn is_supported(provider_name: &str) -> bool {
		Self::SUPPORTED.contains(&provider_name.to_lowercase().as_str())
	}

	/// Create a provider instance based on the provider name
	pub fn create_provider(provider_name: &str, config: &Config) -> Result<Box<dyn CompletionSource>> {
		let provider_name = provider_name.to_lowercase();
		let provider_config = config.providers.get(&provider_name);
		let base_url = config.providers.base_url(&provider_name);

		match (provider_config, base_url) {
			(Some(provider_config), Some(base_url)) => Ok(Box::new(OpenAiCompatibleProvider::new(
				&provider_name,
				&base_url,
				provider_config.api_key.clone(),
				config.stream,
			))),
			_ => Err(anyhow::anyhow!(
				"Unsupported provider: {}. Supported providers: {}",
				provider_name,
				Self::SUPPORTED.join(", ")
			)),
		}
	}

	/// Get the appropriate provider for a given model string
	pub fn get_provider_for_model(
		model: &str,
		config: &Config,
	) -> Result<(Box<dyn CompletionSource>, String)> {
		let (provider_name, model_name) = Self::parse_model(model)?;
		let provider = Self::create_provider(&provider_name, config)?;
		Ok((provider, model_name))
	}
}
