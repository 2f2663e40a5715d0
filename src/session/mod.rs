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

// Conversation state shared by the shell driver and the providers

pub mod logger; // JSONL session transcript
pub mod providers; // Completion sources

pub use providers::{Completion, CompletionSource, FragmentStream, ProviderFactory};

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
}

impl Role {
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::System => "system",
			Role::User => "user",
			Role::Assistant => "assistant",
		}
	}
}

impl std::fmt::Display for Role {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
	pub role: Role,
	pub content: String,
}

impl Message {
	pub fn new(role: Role, content: impl Into<String>) -> Self {
		Self {
			role,
			content: content.into(),
		}
	}

	pub fn system(content: impl Into<String>) -> Self {
		Self::new(Role::System, content)
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self::new(Role::User, content)
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self::new(Role::Assistant, content)
	}
}

fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}

/// Append-only conversation log. Messages are never reordered or edited.
#[derive(Debug, Clone, Default)]
pub struct History {
	messages: Vec<Message>,
}

impl History {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, message: Message) {
		self.messages.push(message);
	}

	pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
		self.messages.extend(messages);
	}

	pub fn messages(&self) -> &[Message] {
		&self.messages
	}

	pub fn last(&self) -> Option<&Message> {
		self.messages.last()
	}
}

/// Identity of one running shell session, used for the transcript.
#[derive(Serialize, Debug, Clone)]
pub struct SessionInfo {
	pub id: String,
	pub profile: String,
	pub username: String,
	pub hostname: String,
	pub model: String,
	pub created_at: u64,
}

impl SessionInfo {
	pub fn new(profile: &str, username: &str, hostname: &str, model: &str) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			profile: profile.to_string(),
			username: username.to_string(),
			hostname: hostname.to_string(),
			model: model.to_string(),
			created_at: current_timestamp(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_message_serializes_as_api_message() {
		let message = Message::assistant("root@server:~#");
		let json = serde_json::to_value(&message).unwrap();
		assert_eq!(
			json,
			serde_json::json!({"role": "assistant", "content": "root@server:~#"})
		);
	}

	#[test]
	fn test_message_deserializes_from_profile_toml() {
		let message: Message = toml::from_str("role = \"system\"\ncontent = \"You are a Linux box\"").unwrap();
		assert_eq!(message.role, Role::System);
		assert_eq!(message.content, "You are a Linux box");
	}

	#[test]
	fn test_history_appends_in_order() {
		let mut history = History::new();
		assert!(history.last().is_none());
		history.extend([Message::system("s"), Message::assistant("a")]);
		history.push(Message::user("ls"));

		let roles: Vec<Role> = history.messages().iter().map(|m| m.role).collect();
		assert_eq!(roles, vec![Role::System, Role::Assistant, Role::User]);
		assert_eq!(history.last().unwrap().content, "ls");
		assert_eq!(history.messages().len(), 3);
	}

	#[test]
	fn test_session_ids_are_unique() {
		let a = SessionInfo::new("ubuntu", "root", "server", "openai:gpt-4o-mini");
		let b = SessionInfo::new("ubuntu", "root", "server", "openai:gpt-4o-mini");
		assert_ne!(a.id, b.id);
	}
}
