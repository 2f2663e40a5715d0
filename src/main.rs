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

use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use aish::config::Config;
use aish::log_error;
use aish::shell::ShellError;

mod commands;

// 130 is the standard exit code for SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "aish")]
#[command(version)]
#[command(about = "A shell that only exists in the imagination of a language model")]
struct AishArgs {
	#[command(subcommand)]
	subcommand: Option<Commands>,

	#[command(flatten)]
	run: commands::RunArgs,
}

#[derive(Subcommand)]
enum Commands {
	/// List the available system profiles
	Profiles(commands::ProfilesArgs),
}

#[tokio::main]
async fn main() {
	// Loaded before parsing so .env can supply SHELL_COMMAND; a missing file is fine
	let _ = dotenvy::dotenv();

	let args = AishArgs::parse();
	let cancel = CancellationToken::new();

	let exit_code = match run_with_args(args, cancel).await {
		Ok(()) => 0,
		Err(e) if is_cancelled(&e) => EXIT_INTERRUPTED,
		Err(e) => {
			log_error!("Error: {:#}", e);
			1
		}
	};

	// Leaves without waiting on a stdin read that may still be blocked
	std::process::exit(exit_code);
}

async fn run_with_args(args: AishArgs, cancel: CancellationToken) -> anyhow::Result<()> {
	let mut config = Config::load()?;
	args.run.apply_to(&mut config);
	aish::config::set_global_config(&config);

	if let Some(Commands::Profiles(profiles_args)) = &args.subcommand {
		return commands::profiles::execute(profiles_args, &config);
	}

	config.validate()?;
	install_interrupt_handler(cancel.clone())?;

	commands::run::execute(&args.run, &config, &cancel).await
}

fn install_interrupt_handler(cancel: CancellationToken) -> anyhow::Result<()> {
	let interrupted = Arc::new(AtomicBool::new(false));
	ctrlc::set_handler(move || {
		// Double Ctrl+C forces immediate exit
		if interrupted.swap(true, Ordering::SeqCst) {
			std::process::exit(EXIT_INTERRUPTED);
		}
		cancel.cancel();
	})?;
	Ok(())
}

fn is_cancelled(error: &anyhow::Error) -> bool {
	error
		.downcast_ref::<ShellError>()
		.is_some_and(ShellError::is_cancelled)
}
