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

//! Prompt profiles describing the simulated operating system.
//!
//! A profile is a TOML document with the seed conversation and the first
//! prompt line. Placeholders are substituted after parsing, so user and
//! host names never need escaping into the template syntax.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::log_debug;
use crate::session::Message;
use crate::shell::{ShellError, ShellResult};

const BUILTIN_PROFILES: &[(&str, &str)] = &[
	("alpine", include_str!("prompt/templates/alpine.toml")),
	("centos", include_str!("prompt/templates/centos.toml")),
	("debian", include_str!("prompt/templates/debian.toml")),
	("macos", include_str!("prompt/templates/macos.toml")),
	("ubuntu", include_str!("prompt/templates/ubuntu.toml")),
];

/// Data substituted into a profile template
#[derive(Debug, Clone)]
pub struct PromptInit {
	pub username: String,
	pub hostname: String,
}

/// A resolved profile: seed messages plus the first prompt line
#[derive(Debug, Clone)]
pub struct Profile {
	pub name: String,
	pub messages: Vec<Message>,
	pub initial_prompt: String,
}

#[derive(Deserialize)]
struct ProfileTemplate {
	messages: Vec<Message>,
	initial_prompt: String,
}

/// `#` for the superuser, `$` for everyone else
pub fn prompt_symbol(username: &str) -> &'static str {
	if username == "root" {
		"#"
	} else {
		"$"
	}
}

/// Profile names are plain identifiers, never paths
pub fn validate_profile_name(name: &str) -> ShellResult<()> {
	let valid = !name.is_empty()
		&& name
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
	if valid {
		Ok(())
	} else {
		Err(ShellError::profile(format!(
			"'{}' is not a valid profile name (letters, digits, '-' and '_' only)",
			name
		)))
	}
}

/// Resolves profile names to built-in or user-supplied templates.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
	user_dir: Option<PathBuf>,
}

impl PromptCatalog {
	/// Catalog with only the built-in profiles
	pub fn builtin() -> Self {
		Self { user_dir: None }
	}

	/// Catalog where `<dir>/<name>.toml` overrides the built-in of that name
	pub fn with_user_dir(dir: PathBuf) -> Self {
		Self {
			user_dir: Some(dir),
		}
	}

	pub fn load(&self, name: &str, init: &PromptInit) -> ShellResult<Profile> {
		validate_profile_name(name)?;
		let source = self.template_source(name)?;
		let template: ProfileTemplate = toml::from_str(&source)
			.map_err(|e| ShellError::profile(format!("profile '{}' is malformed: {}", name, e)))?;

		if template.initial_prompt.trim().is_empty() {
			return Err(ShellError::profile(format!(
				"profile '{}' has an empty initial_prompt",
				name
			)));
		}

		let placeholders = placeholders(init);
		let messages = template
			.messages
			.into_iter()
			.map(|message| Message::new(message.role, substitute(&message.content, &placeholders)))
			.collect();

		Ok(Profile {
			name: name.to_string(),
			messages,
			initial_prompt: substitute(&template.initial_prompt, &placeholders),
		})
	}

	/// All profile names, built-in and user-supplied, sorted
	pub fn available(&self) -> Vec<String> {
		let mut names: Vec<String> = BUILTIN_PROFILES
			.iter()
			.map(|(name, _)| name.to_string())
			.collect();

		if let Some(dir) = &self.user_dir {
			if let Ok(entries) = fs::read_dir(dir) {
				for entry in entries.flatten() {
					let path = entry.path();
					if path.extension().and_then(|e| e.to_str()) != Some("toml") {
						continue;
					}
					if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
						if validate_profile_name(stem).is_ok() {
							names.push(stem.to_string());
						}
					}
				}
			}
		}

		names.sort();
		names.dedup();
		names
	}

	fn template_source(&self, name: &str) -> ShellResult<String> {
		if let Some(dir) = &self.user_dir {
			let path = dir.join(format!("{}.toml", name));
			if path.is_file() {
				log_debug!("Loading profile '{}' from {}", name, path.display());
				return fs::read_to_string(&path).map_err(|e| {
					ShellError::profile(format!("failed to read {}: {}", path.display(), e))
				});
			}
		}

		BUILTIN_PROFILES
			.iter()
			.find(|(builtin, _)| *builtin == name)
			.map(|(_, source)| source.to_string())
			.ok_or_else(|| {
				ShellError::profile(format!(
					"unknown profile '{}'. Available: {}",
					name,
					self.available().join(", ")
				))
			})
	}
}

fn placeholders(init: &PromptInit) -> HashMap<&'static str, String> {
	let username = sanitize(&init.username);
	let hostname = sanitize(&init.hostname);

	let mut placeholders = HashMap::new();
	placeholders.insert("%{PROMPT_SYMBOL}", prompt_symbol(&username).to_string());
	placeholders.insert("%{USERNAME}", username);
	placeholders.insert("%{HOSTNAME}", hostname);
	placeholders
}

fn substitute(text: &str, placeholders: &HashMap<&'static str, String>) -> String {
	let mut processed = text.to_string();
	for (placeholder, value) in placeholders {
		processed = processed.replace(placeholder, value);
	}
	processed
}

// A name containing control characters would break the prompt line
fn sanitize(value: &str) -> String {
	value.chars().filter(|c| !c.is_control()).collect()
}
