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

//! Holds back the last line of a reply until the stream has ended.
//!
//! The model always closes its reply with a line imitating the next shell
//! prompt. That line is delivered tagged `is_last` so the renderer can treat
//! it as a prompt instead of as command output.

use futures::Stream;
use tokio_util::sync::CancellationToken;

use super::error::ShellResult;
use super::reassembler::LineReassembler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedLine {
	pub text: String,
	pub is_last: bool,
}

pub struct TrailingLineSuppressor<S> {
	lines: LineReassembler<S>,
	held: Option<String>,
	released: Vec<String>,
	finished: bool,
}

impl<S> TrailingLineSuppressor<S>
where
	S: Stream<Item = ShellResult<String>> + Unpin,
{
	pub fn new(source: S) -> Self {
		Self {
			lines: LineReassembler::new(source),
			held: None,
			released: Vec::new(),
			finished: false,
		}
	}

	/// Next line, delayed by one so the final line can be tagged.
	///
	/// Returns `None` once the final line has been released, and keeps
	/// returning `None` afterwards.
	pub async fn next(&mut self, cancel: &CancellationToken) -> Option<ShellResult<ReleasedLine>> {
		if self.finished {
			return None;
		}

		loop {
			match self.lines.next_line(cancel).await {
				Some(Ok(line)) => {
					if let Some(previous) = self.held.replace(line) {
						return Some(Ok(self.release(previous, false)));
					}
				}
				Some(Err(e)) => {
					self.finished = true;
					self.held = None;
					return Some(Err(e));
				}
				None => {
					self.finished = true;
					let last = self.held.take()?;
					return Some(Ok(self.release(last, true)));
				}
			}
		}
	}

	/// Lines surfaced so far, in order.
	pub fn released(&self) -> &[String] {
		&self.released
	}

	/// The released lines joined back into reply text.
	pub fn full_text(&self) -> String {
		self.released.join("\n")
	}

	fn release(&mut self, text: String, is_last: bool) -> ReleasedLine {
		self.released.push(text.clone());
		ReleasedLine { text, is_last }
	}
}
