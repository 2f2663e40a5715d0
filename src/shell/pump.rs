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

// Background handoff of completion fragments to the session task

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::error::ShellResult;
use crate::log_debug;
use crate::session::providers::FragmentStream;

// The network task may run at most one fragment ahead of the consumer
const HANDOFF_CAPACITY: usize = 1;

/// Owns the producer task. Dropping it aborts the task, so an abandoned
/// reply never keeps the network stream alive.
pub struct FragmentPump {
	handle: JoinHandle<()>,
}

impl FragmentPump {
	/// Start moving fragments from `stream` into a bounded channel.
	///
	/// The task stops at the end of the stream, after forwarding the first
	/// error, when the receiver is dropped, or when `cancel` fires.
	pub fn spawn(
		mut stream: FragmentStream,
		cancel: CancellationToken,
	) -> (Self, ReceiverStream<ShellResult<String>>) {
		let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);

		let handle = tokio::spawn(async move {
			let mut forwarded = 0usize;
			loop {
				let item = tokio::select! {
					biased;
					_ = cancel.cancelled() => break,
					item = stream.next() => item,
				};
				let Some(item) = item else {
					break;
				};
				let is_error = item.is_err();

				let sent = tokio::select! {
					biased;
					_ = cancel.cancelled() => break,
					sent = tx.send(item) => sent,
				};
				if sent.is_err() || is_error {
					break;
				}
				forwarded += 1;
			}
			log_debug!("Fragment pump stopped after {} fragments", forwarded);
		});

		(Self { handle }, ReceiverStream::new(rx))
	}
}

impl Drop for FragmentPump {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::shell::error::ShellError;
	use futures::stream;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;
	use std::time::Duration;

	#[tokio::test]
	async fn test_forwards_in_order_then_closes() {
		let parts: Vec<ShellResult<String>> =
			vec![Ok("a".to_string()), Ok("b".to_string()), Ok("c".to_string())];
		let source: FragmentStream = Box::pin(stream::iter(parts));
		let (_pump, rx) = FragmentPump::spawn(source, CancellationToken::new());
		let received: Vec<String> = rx.map(|r| r.unwrap()).collect().await;
		assert_eq!(received, vec!["a", "b", "c"]);
	}

	#[tokio::test]
	async fn test_stops_after_first_error() {
		let source: FragmentStream = Box::pin(stream::iter(vec![
			Ok("a".to_string()),
			Err(ShellError::completion("bad chunk")),
			Ok("b".to_string()),
		]));
		let (_pump, rx) = FragmentPump::spawn(source, CancellationToken::new());
		let received: Vec<ShellResult<String>> = rx.collect().await;
		assert_eq!(received.len(), 2);
		assert!(received[1].is_err());
	}

	#[tokio::test]
	async fn test_backpressure_limits_read_ahead() {
		let pulled = Arc::new(AtomicUsize::new(0));
		let counter = pulled.clone();
		let source: FragmentStream = Box::pin(stream::iter(0..100).map(move |i| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok::<String, ShellError>(i.to_string())
		}));

		let (_pump, mut rx) = FragmentPump::spawn(source, CancellationToken::new());
		assert_eq!(rx.next().await.unwrap().unwrap(), "0");
		tokio::time::sleep(Duration::from_millis(50)).await;
		// One taken, one buffered, one blocked in send
		assert!(pulled.load(Ordering::SeqCst) <= 3);
	}

	#[tokio::test]
	async fn test_cancellation_stops_a_stalled_producer() {
		let cancel = CancellationToken::new();
		let source: FragmentStream = Box::pin(stream::pending::<ShellResult<String>>());
		let (_pump, mut rx) = FragmentPump::spawn(source, cancel.clone());

		cancel.cancel();
		let end = tokio::time::timeout(Duration::from_secs(2), rx.next())
			.await
			.expect("channel must close after cancellation");
		assert!(end.is_none());
	}
}
