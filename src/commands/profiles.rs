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

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use aish::config::Config;
use aish::directories;

#[derive(Args, Debug)]
pub struct ProfilesArgs {
	/// Also show where configuration and custom profiles are read from
	#[arg(long)]
	pub paths: bool,
}

pub fn execute(args: &ProfilesArgs, config: &Config) -> Result<()> {
	let catalog = super::run::prompt_catalog()?;

	for name in catalog.available() {
		if name == config.profile {
			println!("{} {}", name.bright_green(), "(default)".dimmed());
		} else {
			println!("{}", name);
		}
	}

	if args.paths {
		println!();
		directories::print_directory_info()?;
	}

	Ok(())
}
