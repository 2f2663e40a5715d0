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

// Error taxonomy for the shell pipeline

use thiserror::Error;

/// Errors that abort a shell session.
///
/// End of input on the command source is not an error: the reader simply
/// yields `None` and the session finishes cleanly.
#[derive(Debug, Error)]
pub enum ShellError {
	/// The character source (stdin) or fragment source failed.
	#[error("input read failed: {0}")]
	InputRead(#[from] std::io::Error),

	/// The completion call failed or returned data we could not use.
	#[error("completion failed: {0}")]
	Completion(String),

	/// The caller's cancellation token fired while a read was in flight.
	#[error("cancelled")]
	Cancelled,

	/// The requested profile could not be resolved or parsed.
	#[error("profile error: {0}")]
	Profile(String),

	/// Writing rendered output failed.
	#[error("output write failed: {0}")]
	Output(#[source] std::io::Error),
}

impl ShellError {
	pub fn completion(message: impl Into<String>) -> Self {
		Self::Completion(message.into())
	}

	pub fn profile(message: impl Into<String>) -> Self {
		Self::Profile(message.into())
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

pub type ShellResult<T> = std::result::Result<T, ShellError>;
