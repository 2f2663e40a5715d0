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

// Session transcript - one JSONL entry per event, appended to a single file

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::SessionInfo;
use crate::log_debug;

/// Appends transcript entries for one session. Without a path it is a no-op.
#[derive(Debug, Clone)]
pub struct SessionLogger {
	path: Option<PathBuf>,
	session_id: String,
}

impl SessionLogger {
	pub fn new(path: Option<PathBuf>, session_id: &str) -> Self {
		Self {
			path,
			session_id: session_id.to_string(),
		}
	}

	pub fn disabled() -> Self {
		Self::new(None, "")
	}

	pub fn path(&self) -> Option<&Path> {
		self.path.as_deref()
	}

	/// Log who the session pretends to be
	pub fn log_session_start(&self, info: &SessionInfo) {
		self.write("SESSION", serde_json::json!({ "info": info }));
	}

	/// Log a command typed by the user
	pub fn log_user_input(&self, command: &str) {
		self.write("USER", serde_json::json!({ "command": command }));
	}

	/// Log the full reply committed to history
	pub fn log_assistant_response(&self, content: &str) {
		self.write("AI", serde_json::json!({ "output": content }));
	}

	/// Log the error that ended the session
	pub fn log_error(&self, error: &str) {
		self.write("ERROR", serde_json::json!({ "error": error }));
	}

	// Transcript problems must never take the shell down
	fn write(&self, entry_type: &str, mut fields: serde_json::Value) {
		let Some(path) = &self.path else {
			return;
		};

		fields["type"] = serde_json::json!(entry_type);
		fields["timestamp"] = serde_json::json!(chrono::Utc::now().to_rfc3339());
		fields["session"] = serde_json::json!(self.session_id);

		if let Err(e) = append_to_log(path, &fields) {
			log_debug!("Failed to write session log {}: {}", path.display(), e);
		}
	}
}

/// Helper to append to log file ensuring single lines
fn append_to_log(log_file: &Path, entry: &serde_json::Value) -> Result<()> {
	crate::directories::ensure_parent_dir(log_file)?;
	let mut file = OpenOptions::new()
		.create(true)
		.append(true)
		.open(log_file)?;

	let content = serde_json::to_string(entry)?;
	// Ensure content is on a single line - replace any newlines with spaces
	let single_line_content = content.replace(['\n', '\r'], " ");
	writeln!(file, "{}", single_line_content)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn read_entries(path: &Path) -> Vec<serde_json::Value> {
		std::fs::read_to_string(path)
			.unwrap()
			.lines()
			.map(|line| serde_json::from_str(line).unwrap())
			.collect()
	}

	#[test]
	fn test_entries_are_appended_as_jsonl() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("logs").join("aish.jsonl");
		let logger = SessionLogger::new(Some(path.clone()), "abc");

		let info = SessionInfo::new("ubuntu", "root", "server", "openai:gpt-4o-mini");
		logger.log_session_start(&info);
		logger.log_user_input("ls -la");
		logger.log_assistant_response("total 0\nroot@server:~#");

		let entries = read_entries(&path);
		assert_eq!(entries.len(), 3);
		assert_eq!(entries[0]["type"], "SESSION");
		assert_eq!(entries[0]["info"]["profile"], "ubuntu");
		assert_eq!(entries[1]["type"], "USER");
		assert_eq!(entries[1]["command"], "ls -la");
		assert_eq!(entries[2]["type"], "AI");
		assert_eq!(entries[2]["output"], "total 0\nroot@server:~#");
		assert!(entries.iter().all(|e| e["session"] == "abc"));
	}

	#[test]
	fn test_disabled_logger_writes_nothing() {
		let logger = SessionLogger::disabled();
		assert!(logger.path().is_none());
		logger.log_error("boom");
	}

	#[test]
	fn test_unwritable_path_is_not_fatal() {
		let dir = tempfile::tempdir().unwrap();
		// A directory cannot be opened for appending
		let logger = SessionLogger::new(Some(dir.path().to_path_buf()), "abc");
		logger.log_user_input("whoami");
	}
}
