use anyhow::{anyhow, bail, Result};
use std::{
    path::Path,
    process::{Command, Stdio},
};

const FILE_PLACEHOLDER: &str = "{file}";

/// A player invocation template, e.g. `mpg123 -q --loop -1 {file}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    program: String,
    args: Vec<String>,
}

impl PlayerCommand {
    /// Split a command line with shell quoting rules. When no argument contains
    /// `{file}`, the audio path is appended as the last argument.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            bail!("player command cannot be empty");
        }
        let mut parts = shell_words::split(trimmed)
            .map_err(|err| anyhow!("failed to parse player command {trimmed:?}: {err}"))?
            .into_iter();
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("player command cannot be empty"))?;
        let mut args: Vec<String> = parts.collect();
        if !args.iter().any(|arg| arg.contains(FILE_PLACEHOLDER)) {
            args.push(FILE_PLACEHOLDER.to_string());
        }
        Ok(Self { program, args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args_for(&self, file: &Path) -> Vec<String> {
        let file = file.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(FILE_PLACEHOLDER, &file))
            .collect()
    }

    /// Build the process: stdin/stdout/stderr detached from the controlling
    /// terminal, and on Unix its own process group so terminal signals aimed at
    /// the controller do not reach the player directly.
    pub fn command_for(&self, file: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args_for(file))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    pub fn display_for(&self, file: &Path) -> String {
        let mut words = vec![self.program.clone()];
        words.extend(self.args_for(file));
        shell_words::join(words)
    }
}
