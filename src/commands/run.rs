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
use clap::Args;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use aish::config::{loading::normalize_model, Config};
use aish::directories;
use aish::prompt::{PromptCatalog, PromptInit};
use aish::session::logger::SessionLogger;
use aish::session::{ProviderFactory, SessionInfo};
use aish::shell::ShellSession;
use aish::{log_debug, log_info};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
	/// Run this single command and exit instead of starting an interactive shell
	#[arg(value_name = "COMMAND", env = "SHELL_COMMAND")]
	pub command: Option<String>,

	/// Simulated operating system profile (ubuntu, debian, alpine, centos, macos or a custom one)
	#[arg(long, short)]
	pub profile: Option<String>,

	/// Model in provider:model format (a bare name means openai)
	#[arg(long, short)]
	pub model: Option<String>,

	/// Sampling temperature (0.0 to 2.0)
	#[arg(long)]
	pub temperature: Option<f32>,

	/// User name shown in the prompt
	#[arg(long)]
	pub username: Option<String>,

	/// Host name shown in the prompt
	#[arg(long)]
	pub hostname: Option<String>,

	/// Append a JSONL transcript of the session to this file
	#[arg(long)]
	pub log_file: Option<PathBuf>,

	/// Wait for whole replies instead of streaming them
	#[arg(long)]
	pub no_stream: bool,
}

impl RunArgs {
	/// Command line flags win over the config file and the environment
	pub fn apply_to(&self, config: &mut Config) {
		if let Some(profile) = &self.profile {
			config.profile = profile.clone();
		}
		if let Some(model) = &self.model {
			config.model = normalize_model(model);
		}
		if let Some(temperature) = self.temperature {
			config.temperature = temperature;
		}
		if let Some(username) = &self.username {
			config.username = Some(username.clone());
		}
		if let Some(hostname) = &self.hostname {
			config.hostname = Some(hostname.clone());
		}
		if let Some(log_file) = &self.log_file {
			config.log_file = Some(log_file.clone());
		}
		if self.no_stream {
			config.stream = false;
		}
	}
}

/// Catalog with the user's prompts directory layered over the built-ins
pub fn prompt_catalog() -> Result<PromptCatalog> {
	let prompts_dir = directories::get_prompts_dir()?;
	Ok(PromptCatalog::with_user_dir(prompts_dir))
}

/// Run one session, one-shot when a command was given
pub async fn execute(args: &RunArgs, config: &Config, cancel: &CancellationToken) -> Result<()> {
	let init = PromptInit {
		username: config.resolve_username(),
		hostname: config.resolve_hostname(),
	};

	let profile = prompt_catalog()?
		.load(&config.profile, &init)
		.context(format!("Failed to load profile '{}'", config.profile))?;

	let (source, model_name) = ProviderFactory::get_provider_for_model(&config.model, config)?;

	let info = SessionInfo::new(&profile.name, &init.username, &init.hostname, &config.model);
	let logger = SessionLogger::new(config.log_file.clone(), &info.id);
	logger.log_session_start(&info);
	log_info!(
		"New session {} as {}@{} ({}, {})",
		info.id,
		init.username,
		init.hostname,
		profile.name,
		config.model
	);
	if let Some(path) = config.config_path() {
		log_debug!("Config file: {}", path.display());
	}
	if let Some(path) = logger.path() {
		log_debug!("Session transcript: {}", path.display());
	}

	let mut session = ShellSession::new(source, profile, &model_name, config.temperature)
		.with_logger(logger);
	let mut stdout = tokio::io::stdout();

	match &args.command {
		Some(command) => session.run_one_shot(command, &mut stdout, cancel).await?,
		None => {
			session
				.run_interactive(tokio::io::stdin(), &mut stdout, cancel)
				.await?
		}
	}

	Ok(())
}
