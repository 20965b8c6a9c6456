use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::generate;

use super::commands::{Cli, Shell};

pub fn generate_completions(shell: Shell) {
    write_completions(shell, &mut io::stdout());
}

/// Writes the completion script for `shell` under the binary's own name.
pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    generate(clap_complete::Shell::from(shell), &mut cmd, bin, out);
}
