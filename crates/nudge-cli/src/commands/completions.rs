use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::aot::{Generator, Shell};
use clap_complete::generate;

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Self::Bash,
            CompletionShell::Zsh => Self::Zsh,
            CompletionShell::Fish => Self::Fish,
            CompletionShell::PowerShell => Self::PowerShell,
            CompletionShell::Elvish => Self::Elvish,
        }
    }
}

/// Print the completion script, or write it to `output`.
///
/// When `output` is an existing directory the script is placed inside it
/// under the name the shell looks for (`_nudge` for zsh, `nudge.fish`, ...).
pub fn run_completions(shell: CompletionShell, output: Option<&Path>) -> Result<(), CliError> {
    let shell = Shell::from(shell);
    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();
    let mut script = Vec::new();
    generate(shell, &mut command, &bin_name, &mut script);

    let Some(output) = output else {
        io::stdout().write_all(&script)?;
        return Ok(());
    };

    let path = script_path(output, &shell.file_name(&bin_name));
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &script)?;
    tracing::debug!(path = %path.display(), %shell, "Wrote completion script");
    println!("{}", path.display());
    Ok(())
}

pub fn script_path(output: &Path, file_name: &str) -> PathBuf {
    if output.is_dir() {
        output.join(file_name)
    } else {
        output.to_path_buf()
    }
}
