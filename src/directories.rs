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

// Directory utilities for cross-platform data directory management

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "aish";
const DATA_DIR_ENV: &str = "AISH_HOME";

/// Get the system-wide data directory for aish
///
/// `AISH_HOME` overrides the location. Otherwise:
/// - macOS/Linux: ~/.local/share/aish
/// - Windows: %LOCALAPPDATA%/aish
///
/// The directory is not created here; only paths that are written to are.
pub fn get_aish_data_dir() -> Result<PathBuf> {
	if let Some(custom) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
		return Ok(PathBuf::from(custom));
	}

	match dirs::home_dir() {
		Some(home) => {
			#[cfg(target_os = "windows")]
			let path = match dirs::data_local_dir() {
				Some(dir) => dir.join(APP_DIR_NAME),
				None => home.join("AppData").join("Local").join(APP_DIR_NAME),
			};

			#[cfg(not(target_os = "windows"))]
			let path = home.join(".local").join("share").join(APP_DIR_NAME);

			Ok(path)
		}
		None => Err(anyhow::anyhow!("Unable to determine home directory")),
	}
}

/// Get the configuration directory path
pub fn get_config_dir() -> Result<PathBuf> {
	Ok(get_aish_data_dir()?.join("config"))
}

/// Get the directory holding user-defined prompt profiles
pub fn get_prompts_dir() -> Result<PathBuf> {
	Ok(get_aish_data_dir()?.join("prompts"))
}

/// Get the default configuration file path
pub fn get_config_file_path() -> Result<PathBuf> {
	Ok(get_config_dir()?.join("config.toml"))
}

/// Make sure the parent directory of `path` exists
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		if !parent.exists() {
			fs::create_dir_all(parent)
				.context(format!("Failed to create directory: {}", parent.display()))?;
		}
	}
	Ok(())
}

/// Display information about the data directory locations
pub fn print_directory_info() -> Result<()> {
	println!("aish data directories:");
	println!("  Data Dir:    {}", get_aish_data_dir()?.display());
	println!("  Config File: {}", get_config_file_path()?.display());
	println!("  Prompts Dir: {}", get_prompts_dir()?.display());

	Ok(())
}
