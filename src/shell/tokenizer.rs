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

//! Quote- and escape-aware splitting of raw terminal input into commands.
//!
//! A command ends at a newline that is neither escaped nor inside a quote.
//! Quote characters are kept in the emitted command; they only decide
//! whether a newline terminates it. A backslash always consumes the next
//! character literally and is itself dropped.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use super::error::{ShellError, ShellResult};
use crate::log_debug;

const READ_CHUNK_SIZE: usize = 4096;

/// Character-at-a-time state machine. Reset after each emitted command.
#[derive(Debug, Default, Clone)]
pub struct CommandTokenizer {
	buffer: String,
	in_single_quote: bool,
	in_double_quote: bool,
	escaped: bool,
}

impl CommandTokenizer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Feed one character, returning a command when it completes one.
	pub fn push(&mut self, ch: char) -> Option<String> {
		if self.escaped {
			self.buffer.push(ch);
			self.escaped = false;
			return None;
		}

		match ch {
			'\\' => {
				self.escaped = true;
				None
			}
			'\'' if !self.in_double_quote => {
				self.in_single_quote = !self.in_single_quote;
				self.buffer.push(ch);
				None
			}
			'"' if !self.in_single_quote => {
				self.in_double_quote = !self.in_double_quote;
				self.buffer.push(ch);
				None
			}
			'\n' if !self.in_quote() => Some(self.take()),
			_ => {
				self.buffer.push(ch);
				None
			}
		}
	}

	/// Signal end of input. Whatever was accumulated is flushed, even with a
	/// quote still open; a dangling escape has nothing left to consume and
	/// is dropped.
	pub fn finish(&mut self) -> Option<String> {
		if self.escape_pending() {
			log_debug!("Dropping trailing escape at end of input");
		}
		if self.in_quote() {
			log_debug!("Flushing command with an unterminated quote at end of input");
		}
		if self.buffer.is_empty() {
			self.reset();
			return None;
		}
		Some(self.take())
	}

	pub fn in_quote(&self) -> bool {
		self.in_single_quote || self.in_double_quote
	}

	pub fn escape_pending(&self) -> bool {
		self.escaped
	}

	fn take(&mut self) -> String {
		let command = std::mem::take(&mut self.buffer);
		self.reset();
		command
	}

	fn reset(&mut self) {
		self.buffer.clear();
		self.in_single_quote = false;
		self.in_double_quote = false;
		self.escaped = false;
	}
}

/// Split a complete, in-memory input into commands.
pub fn tokenize(input: &str) -> Vec<String> {
	let mut tokenizer = CommandTokenizer::new();
	let mut commands: Vec<String> = input.chars().filter_map(|ch| tokenizer.push(ch)).collect();
	commands.extend(tokenizer.finish());
	commands
}

/// Pulls commands out of a live byte source such as stdin.
///
/// A read that races a cancellation may consume one extra chunk before the
/// cancellation is observed. Commands decoded from that chunk are queued and
/// returned by later calls, so nothing is emitted twice or lost.
pub struct CommandReader<R> {
	reader: R,
	tokenizer: CommandTokenizer,
	ready: VecDeque<String>,
	// Bytes of a UTF-8 sequence split across reads
	carry: Vec<u8>,
	finished: bool,
}

impl<R: AsyncRead + Unpin> CommandReader<R> {
	pub fn new(reader: R) -> Self {
		Self {
			reader,
			tokenizer: CommandTokenizer::new(),
			ready: VecDeque::new(),
			carry: Vec::new(),
			finished: false,
		}
	}

	/// Next logical command, `None` at end of input.
	///
	/// After a read failure the error is returned once and the reader is
	/// finished.
	pub async fn next_command(&mut self, cancel: &CancellationToken) -> Option<ShellResult<String>> {
		let mut chunk = [0u8; READ_CHUNK_SIZE];

		loop {
			if let Some(command) = self.ready.pop_front() {
				return Some(Ok(command));
			}
			if self.finished {
				return None;
			}

			let read = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Some(Err(ShellError::Cancelled)),
				read = self.reader.read(&mut chunk) => read,
			};

			match read {
				Ok(0) => {
					self.finished = true;
					if !self.carry.is_empty() {
						// Truncated multi-byte sequence at the very end
						self.carry.clear();
						self.feed_str("\u{FFFD}");
					}
					if let Some(command) = self.tokenizer.finish() {
						self.ready.push_back(command);
					}
				}
				Ok(n) => self.feed_bytes(&chunk[..n]),
				Err(e) => {
					self.finished = true;
					self.ready.clear();
					return Some(Err(ShellError::InputRead(e)));
				}
			}
		}
	}

	fn feed_bytes(&mut self, bytes: &[u8]) {
		self.carry.extend_from_slice(bytes);
		let decoded = decode_utf8_prefix(&mut self.carry);
		self.feed_str(&decoded);
	}

	fn feed_str(&mut self, text: &str) {
		for ch in text.chars() {
			if let Some(command) = self.tokenizer.push(ch) {
				self.ready.push_back(command);
			}
		}
	}
}

/// Decode as much of `carry` as forms complete UTF-8, leaving an incomplete
/// trailing sequence in place. Invalid sequences become U+FFFD.
fn decode_utf8_prefix(carry: &mut Vec<u8>) -> String {
	let mut decoded = String::new();
	loop {
		match std::str::from_utf8(carry) {
			Ok(text) => {
				decoded.push_str(text);
				carry.clear();
				return decoded;
			}
			Err(e) => {
				let valid = e.valid_up_to();
				decoded.push_str(&String::from_utf8_lossy(&carry[..valid]));
				match e.error_len() {
					Some(bad) => {
						decoded.push('\u{FFFD}');
						carry.drain(..valid + bad);
					}
					None => {
						carry.drain(..valid);
						return decoded;
					}
				}
			}
		}
	}
}
