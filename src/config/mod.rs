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
use std::path::PathBuf;
use std::sync::RwLock;

pub mod loading;
pub mod providers;
pub mod validation;

pub use providers::*;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
	#[default]
	#[serde(rename = "none")]
	None,
	#[serde(rename = "info")]
	Info,
	#[serde(rename = "debug")]
	Debug,
}

impl LogLevel {
	/// Check if info logging is enabled
	pub fn is_info_enabled(&self) -> bool {
		matches!(self, LogLevel::Info | LogLevel::Debug)
	}

	/// Check if debug logging is enabled
	pub fn is_debug_enabled(&self) -> bool {
		matches!(self, LogLevel::Debug)
	}
}

impl std::str::FromStr for LogLevel {
	type Err = anyhow::Error;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value.to_lowercase().as_str() {
			"none" => Ok(LogLevel::None),
			"info" => Ok(LogLevel::Info),
			"debug" => Ok(LogLevel::Debug),
			other => Err(anyhow::anyhow!(
				"Unknown log level '{}'. Use none, info or debug",
				other
			)),
		}
	}
}

// Default functions
fn default_model() -> String {
	"openai:gpt-4o-mini".to_string()
}

fn default_stream() -> bool {
	true
}

fn default_profile() -> String {
	"ubuntu".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
	#[serde(default)]
	pub log_level: LogLevel,

	// Model in provider:model format
	#[serde(default = "default_model")]
	pub model: String,
	#[serde(default)]
	pub temperature: f32,
	// Stream the reply fragment by fragment instead of waiting for all of it
	#[serde(default = "default_stream")]
	pub stream: bool,

	// Simulated system
	#[serde(default = "default_profile")]
	pub profile: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hostname: Option<String>,

	// JSONL session transcript
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub log_file: Option<PathBuf>,

	#[serde(default)]
	pub providers: ProvidersConfig,

	#[serde(skip)]
	config_path: Option<PathBuf>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			log_level: LogLevel::default(),
			model: default_model(),
			temperature: 0.0,
			stream: default_stream(),
			profile: default_profile(),
			username: None,
			hostname: None,
			log_file: None,
			providers: ProvidersConfig::default(),
			config_path: None,
		}
	}
}

impl Config {
	pub fn get_log_level(&self) -> LogLevel {
		self.log_level
	}

	pub fn config_path(&self) -> Option<&PathBuf> {
		self.config_path.as_ref()
	}
}

// Logging macros for different log levels
// These macros check the process-wide level and write to stderr, which keeps
// stdout free for the emulated terminal.

static CURRENT_LOG_LEVEL: RwLock<Option<LogLevel>> = RwLock::new(None);

/// Set the config whose log level the logging macros follow
pub fn set_global_config(config: &Config) {
	if let Ok(mut level) = CURRENT_LOG_LEVEL.write() {
		*level = Some(config.get_log_level());
	}
}

/// Current log level, `None` before any config was installed
pub fn current_log_level() -> Option<LogLevel> {
	CURRENT_LOG_LEVEL.read().ok().and_then(|level| *level)
}

/// Info logging macro with automatic cyan coloring
/// Shows info messages when log level is Info OR Debug
#[macro_export]
macro_rules! log_info {
	($fmt:expr) => {
		if $crate::config::current_log_level().is_some_and(|level| level.is_info_enabled()) {
			use colored::Colorize;
			eprintln!("{}", format!("{}", $fmt).cyan());
		}
	};
	($fmt:expr, $($arg:expr),*) => {
		if $crate::config::current_log_level().is_some_and(|level| level.is_info_enabled()) {
			use colored::Colorize;
			eprintln!("{}", format!($fmt, $($arg),*).cyan());
		}
	};
}

/// Debug logging macro with automatic bright blue coloring
#[macro_export]
macro_rules! log_debug {
	($fmt:expr) => {
		if $crate::config::current_log_level().is_some_and(|level| level.is_debug_enabled()) {
			use colored::Colorize;
			eprintln!("{}", format!("{}", $fmt).bright_blue());
		}
	};
	($fmt:expr, $($arg:expr),*) => {
		if $crate::config::current_log_level().is_some_and(|level| level.is_debug_enabled()) {
			use colored::Colorize;
			eprintln!("{}", format!($fmt, $($arg),*).bright_blue());
		}
	};
}

/// Error logging macro with automatic bright red coloring
/// Always visible regardless of log level
#[macro_export]
macro_rules! log_error {
	($fmt:expr) => {{
		use colored::Colorize;
		eprintln!("{}", format!("{}", $fmt).bright_red());
	}};
	($fmt:expr, $($arg:expr),*) => {{
		use colored::Colorize;
		eprintln!("{}", format!($fmt, $($arg),*).bright_red());
	}};
}
