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

// Session driver: commands in, rendered replies out, history in between

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::error::{ShellError, ShellResult};
use super::pump::FragmentPump;
use super::suppressor::{ReleasedLine, TrailingLineSuppressor};
use super::tokenizer::CommandReader;
use crate::prompt::Profile;
use crate::session::logger::SessionLogger;
use crate::session::{CompletionSource, History, Message};
use crate::{log_debug, log_info};

/// How replies are put on the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
	/// The reply's last line is the next prompt; the user types after it
	Interactive,
	/// Only real output is printed, the synthetic prompt line is dropped
	OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Idle,
	AwaitingCommand,
	Completing,
	Rendering,
	Done,
	Failed,
}

/// One emulated shell session.
///
/// Owns the conversation history. Only `start` and `execute` append to it,
/// and a turn that fails leaves the reply out.
pub struct ShellSession {
	source: Box<dyn CompletionSource>,
	model: String,
	temperature: f32,
	profile: Profile,
	history: History,
	logger: SessionLogger,
	state: SessionState,
}

impl ShellSession {
	pub fn new(
		source: Box<dyn CompletionSource>,
		profile: Profile,
		model: &str,
		temperature: f32,
	) -> Self {
		Self {
			source,
			model: model.to_string(),
			temperature,
			profile,
			history: History::new(),
			logger: SessionLogger::disabled(),
			state: SessionState::Idle,
		}
	}

	pub fn with_logger(mut self, logger: SessionLogger) -> Self {
		self.logger = logger;
		self
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn history(&self) -> &History {
		&self.history
	}

	/// Seed the history from the profile and show the first prompt.
	///
	/// The prompt line is recorded as an assistant message so the model
	/// sees its own greeting. One-shot sessions never print it.
	pub async fn start<W>(&mut self, mode: RenderMode, out: &mut W) -> ShellResult<()>
	where
		W: AsyncWrite + Unpin,
	{
		if self.state != SessionState::Idle {
			return Ok(());
		}

		self.history.extend(self.profile.messages.iter().cloned());
		self.history
			.push(Message::assistant(self.profile.initial_prompt.clone()));

		if mode == RenderMode::Interactive {
			let prompt = format!("{} ", self.profile.initial_prompt);
			write_flushed(out, &prompt).await?;
		}

		log_debug!(
			"Session started with profile '{}' ({} seed messages)",
			self.profile.name,
			self.profile.messages.len()
		);
		self.state = SessionState::AwaitingCommand;
		Ok(())
	}

	/// Run one turn: send `command`, render the reply, commit it.
	pub async fn execute<W>(
		&mut self,
		command: &str,
		mode: RenderMode,
		out: &mut W,
		cancel: &CancellationToken,
	) -> ShellResult<()>
	where
		W: AsyncWrite + Unpin,
	{
		let result = self.run_turn(command, mode, out, cancel).await;
		match &result {
			Ok(()) => self.state = SessionState::AwaitingCommand,
			Err(e) => {
				self.state = SessionState::Failed;
				self.logger.log_error(&e.to_string());
			}
		}
		result
	}

	/// Interactive loop over commands read from `input` until end of input.
	pub async fn run_interactive<R, W>(
		&mut self,
		input: R,
		out: &mut W,
		cancel: &CancellationToken,
	) -> ShellResult<()>
	where
		R: AsyncRead + Unpin,
		W: AsyncWrite + Unpin,
	{
		self.start(RenderMode::Interactive, out).await?;

		let mut commands = CommandReader::new(input);
		loop {
			match commands.next_command(cancel).await {
				Some(Ok(command)) => {
					self.execute(&command, RenderMode::Interactive, out, cancel)
						.await?;
				}
				Some(Err(e)) => {
					self.state = SessionState::Failed;
					self.logger.log_error(&e.to_string());
					return Err(e);
				}
				None => {
					log_info!("End of input, closing session");
					self.state = SessionState::Done;
					return Ok(());
				}
			}
		}
	}

	/// Single command, single reply, done.
	pub async fn run_one_shot<W>(
		&mut self,
		command: &str,
		out: &mut W,
		cancel: &CancellationToken,
	) -> ShellResult<()>
	where
		W: AsyncWrite + Unpin,
	{
		self.start(RenderMode::OneShot, out).await?;
		self.execute(command, RenderMode::OneShot, out, cancel).await?;
		self.state = SessionState::Done;
		Ok(())
	}

	async fn run_turn<W>(
		&mut self,
		command: &str,
		mode: RenderMode,
		out: &mut W,
		cancel: &CancellationToken,
	) -> ShellResult<()>
	where
		W: AsyncWrite + Unpin,
	{
		self.logger.log_user_input(command);
		self.history.push(Message::user(command));

		self.state = SessionState::Completing;
		let completion = self
			.source
			.complete(self.history.messages(), &self.model, self.temperature, cancel)
			.await?;

		self.state = SessionState::Rendering;
		let (pump, fragments) = FragmentPump::spawn(completion.into_stream(), cancel.clone());
		let mut lines = TrailingLineSuppressor::new(fragments);

		while let Some(line) = lines.next(cancel).await {
			render_line(out, &line?, mode).await?;
		}
		drop(pump);

		let reply = lines.full_text();
		log_debug!("Reply complete: {} lines", lines.released().len());
		self.logger.log_assistant_response(&reply);
		self.history.push(Message::assistant(reply));
		Ok(())
	}
}

async fn render_line<W>(out: &mut W, line: &ReleasedLine, mode: RenderMode) -> ShellResult<()>
where
	W: AsyncWrite + Unpin,
{
	let rendered = match (line.is_last, mode) {
		(false, _) => format!("{}\n", line.text),
		(true, RenderMode::Interactive) => format!("{} ", line.text),
		(true, RenderMode::OneShot) => return Ok(()),
	};
	write_flushed(out, &rendered).await
}

async fn write_flushed<W>(out: &mut W, text: &str) -> ShellResult<()>
where
	W: AsyncWrite + Unpin,
{
	out.write_all(text.as_bytes())
		.await
		.map_err(ShellError::Output)?;
	out.flush().await.map_err(ShellError::Output)
}
