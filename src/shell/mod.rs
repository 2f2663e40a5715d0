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

// Text pipeline of the emulated shell: input chars to commands, reply
// fragments to rendered lines

pub mod driver;
pub mod error;
pub mod pump;
pub mod reassembler;
pub mod suppressor;
pub mod tokenizer;

pub use driver::{RenderMode, SessionState, ShellSession};
pub use error::{ShellError, ShellResult};
pub use pump::FragmentPump;
pub use reassembler::{LineBuffer, LineReassembler};
pub use suppressor::{ReleasedLine, TrailingLineSuppressor};
pub use tokenizer::{tokenize, CommandReader, CommandTokenizer};
