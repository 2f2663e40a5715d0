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

//! Turns arbitrarily split completion fragments back into whole lines.

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::error::{ShellError, ShellResult};

/// Text received but not yet terminated by a newline.
///
/// Lines are cut by advancing `start`; the consumed prefix is dropped in one
/// go on the next push, so a large fragment splits in linear time.
#[derive(Debug, Default)]
pub struct LineBuffer {
	pending: String,
	start: usize,
}

impl LineBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, fragment: &str) {
		if self.start > 0 {
			self.pending.drain(..self.start);
			self.start = 0;
		}
		self.pending.push_str(fragment);
	}

	/// Cut the first complete line off the buffer, without its newline.
	pub fn next_line(&mut self) -> Option<String> {
		let end = self.start + self.pending[self.start..].find('\n')?;
		let line = self.pending[self.start..end].to_string();
		self.start = end + 1;
		Some(line)
	}

	/// End of stream: whatever is left becomes the final line.
	pub fn finish(&mut self) -> Option<String> {
		if self.is_empty() {
			self.discard();
			return None;
		}
		let rest = self.pending[self.start..].to_string();
		self.discard();
		Some(rest)
	}

	pub fn discard(&mut self) {
		self.pending.clear();
		self.start = 0;
	}

	pub fn is_empty(&self) -> bool {
		self.start >= self.pending.len()
	}
}

/// Pull-based line reader over a fragment stream.
///
/// Lines come out strictly in arrival order and only once their newline has
/// arrived, or the stream has ended. An error from the source, or a
/// cancellation, is returned once; unterminated text is discarded and the
/// reassembler yields nothing afterwards.
pub struct LineReassembler<S> {
	source: S,
	buffer: LineBuffer,
	done: bool,
}

impl<S> LineReassembler<S>
where
	S: Stream<Item = ShellResult<String>> + Unpin,
{
	pub fn new(source: S) -> Self {
		Self {
			source,
			buffer: LineBuffer::new(),
			done: false,
		}
	}

	pub async fn next_line(&mut self, cancel: &CancellationToken) -> Option<ShellResult<String>> {
		loop {
			if let Some(line) = self.buffer.next_line() {
				return Some(Ok(line));
			}
			if self.done {
				return None;
			}

			let next = tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					self.abort();
					return Some(Err(ShellError::Cancelled));
				}
				next = self.source.next() => next,
			};

			match next {
				Some(Ok(fragment)) => self.buffer.push(&fragment),
				Some(Err(e)) => {
					self.abort();
					return Some(Err(e));
				}
				None => {
					self.done = true;
					if let Some(rest) = self.buffer.finish() {
						return Some(Ok(rest));
					}
				}
			}
		}
	}

	fn abort(&mut self) {
		self.done = true;
		self.buffer.discard();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::stream;
	use std::time::Duration;

	fn fragments(parts: &[&str]) -> impl Stream<Item = ShellResult<String>> + Unpin {
		stream::iter(
			parts
				.iter()
				.map(|p| Ok(p.to_string()))
				.collect::<Vec<ShellResult<String>>>(),
		)
	}

	async fn collect_lines<S>(mut reassembler: LineReassembler<S>) -> Vec<String>
	where
		S: Stream<Item = ShellResult<String>> + Unpin,
	{
		let cancel = CancellationToken::new();
		let mut lines = Vec::new();
		while let Some(line) = reassembler.next_line(&cancel).await {
			lines.push(line.unwrap());
		}
		lines
	}

	#[test]
	fn test_line_buffer_cuts_at_newlines() {
		let mut buffer = LineBuffer::new();
		buffer.push("ab");
		assert_eq!(buffer.next_line(), None);
		buffer.push("c\nde\n\nf");
		assert_eq!(buffer.next_line().as_deref(), Some("abc"));
		assert_eq!(buffer.next_line().as_deref(), Some("de"));
		assert_eq!(buffer.next_line().as_deref(), Some(""));
		assert_eq!(buffer.next_line(), None);
		assert_eq!(buffer.finish().as_deref(), Some("f"));
		assert!(buffer.is_empty());
		assert_eq!(buffer.finish(), None);
	}

	#[test]
	fn test_line_buffer_keeps_remainder_across_pushes() {
		let mut buffer = LineBuffer::new();
		buffer.push("one\ntw");
		assert_eq!(buffer.next_line().as_deref(), Some("one"));
		assert!(!buffer.is_empty());
		buffer.push("o\nthree");
		assert_eq!(buffer.next_line().as_deref(), Some("two"));
		assert_eq!(buffer.finish().as_deref(), Some("three"));
	}

	#[test]
	fn test_large_single_fragment_splits_in_linear_time() {
		let line = "x".repeat(200);
		let reply: String = (0..20_000).map(|i| format!("{} {}\n", i, line)).collect();

		let started = std::time::Instant::now();
		let mut buffer = LineBuffer::new();
		buffer.push(&reply);
		let mut count = 0;
		while let Some(cut) = buffer.next_line() {
			assert!(cut.ends_with(&line));
			count += 1;
		}
		assert_eq!(count, 20_000);
		assert!(buffer.is_empty());
		assert!(
			started.elapsed() < Duration::from_secs(2),
			"splitting took {:?}",
			started.elapsed()
		);
	}

	#[tokio::test]
	async fn test_lines_split_across_fragments() {
		let lines = collect_lines(LineReassembler::new(fragments(&[
			"total 8\ndrw",
			"xr-xr-x 2 root",
			" root 4096 .\n",
			"root@server:~#",
		])))
		.await;
		assert_eq!(
			lines,
			vec!["total 8", "drwxr-xr-x 2 root root 4096 .", "root@server:~#"]
		);
	}

	#[tokio::test]
	async fn test_multibyte_text_survives_fragmenting() {
		let lines = collect_lines(LineReassembler::new(fragments(&["caf", "é ☕", "\nok"]))).await;
		assert_eq!(lines, vec!["café ☕", "ok"]);
	}

	#[tokio::test]
	async fn test_trailing_newline_adds_no_empty_line() {
		let lines = collect_lines(LineReassembler::new(fragments(&["one\ntwo\n"]))).await;
		assert_eq!(lines, vec!["one", "two"]);
	}

	#[tokio::test]
	async fn test_empty_stream_yields_nothing() {
		let lines = collect_lines(LineReassembler::new(fragments(&[]))).await;
		assert!(lines.is_empty());
	}

	#[tokio::test]
	async fn test_error_discards_partial_line() {
		let source = stream::iter(vec![
			Ok("complete\npart".to_string()),
			Err(ShellError::completion("connection reset")),
			Ok("never\n".to_string()),
		]);
		let cancel = CancellationToken::new();
		let mut reassembler = LineReassembler::new(source);

		assert_eq!(reassembler.next_line(&cancel).await.unwrap().unwrap(), "complete");
		assert!(matches!(
			reassembler.next_line(&cancel).await,
			Some(Err(ShellError::Completion(_)))
		));
		assert!(reassembler.next_line(&cancel).await.is_none());
	}

	#[tokio::test]
	async fn test_cancellation_interrupts_a_stalled_source() {
		let cancel = CancellationToken::new();
		let source = fragments(&["first\nsecond"]).chain(stream::pending());
		let mut reassembler = LineReassembler::new(source);

		assert_eq!(reassembler.next_line(&cancel).await.unwrap().unwrap(), "first");

		let canceller = cancel.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			canceller.cancel();
		});
		let result = tokio::time::timeout(Duration::from_secs(2), reassembler.next_line(&cancel))
			.await
			.expect("cancelled read must return");
		assert!(matches!(result, Some(Err(ShellError::Cancelled))));
		// The unterminated "second" is not emitted afterwards
		assert!(reassembler.next_line(&cancel).await.is_none());
	}
}
