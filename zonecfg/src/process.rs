use crate::error::{Error, Result};
use std::fmt;
use std::process::{Command, Stdio};
use tracing::debug;

/// A program and its arguments. No shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a command to completion and captures its output.
pub trait CommandRunner {
    fn run(&self, cmd: &CommandLine) -> Result<CommandOutput>;
}

/// Runs commands on the local host.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandLine) -> Result<CommandOutput> {
        let mut command = build_cmd(cmd);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let output = command.output().map_err(|source| Error::Spawn {
            program: cmd.program.clone(),
            source,
        })?;

        let out = CommandOutput {
            // killed by a signal
            exit_code: output.status.code().unwrap_or(-1),
            // the exit code decides success, stray bytes must not hide it
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(target: "zonecfg", "exit: {} status={}", cmd, out.exit_code);
        Ok(out)
    }
}

fn build_cmd(cmd: &CommandLine) -> Command {
    let mut command = Command::new(&cmd.program);
    // zonecfg output is parsed, keep it in the C locale
    command.env_remove("LANG");
    command.env_remove("LC_CTYPE");
    command.env_remove("LC_NUMERIC");
    command.env_remove("LC_TIME");
    command.env_remove("LC_COLLATE");
    command.env_remove("LC_MONETARY");
    command.env_remove("LC_MESSAGES");
    command.env_remove("LC_ALL");
    command.args(&cmd.args);

    debug!(target: "zonecfg", "exec: {}", cmd);
    command
}
