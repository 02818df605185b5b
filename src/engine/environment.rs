use crate::definition::BuildCommand;
use crate::engine::EngineSettings;
use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// What a finished process left behind.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Starts a command, waits for it and captures its output. `Err` means the
/// process could not be started at all.
#[async_trait]
pub trait ProcessLauncher: Debug + Send + Sync {
    async fn launch(&self, command: &BuildCommand) -> io::Result<ProcessOutput>;
}

/// Runs commands on the host, inside the working directory.
#[derive(Debug)]
pub struct Environment {
    settings: Arc<EngineSettings>,
}

impl Environment {
    pub fn new(settings: Arc<EngineSettings>) -> Self {
        Environment { settings }
    }

    pub fn command(&self, command: &BuildCommand) -> io::Result<Command> {
        let (name, args): (&str, Vec<&str>) = match command {
            BuildCommand::Args(args) => match args.split_first() {
                Some((program, rest)) => (
                    program.as_str(),
                    rest.iter().map(String::as_str).collect(),
                ),
                None => {
                    return Err(io::Error::new(
                        ErrorKind::InvalidInput,
                        "command has no program to run",
                    ))
                }
            },
            BuildCommand::Shell(line) => ("sh", vec!["-c", line.as_str()]),
        };

        let mut cmd = Command::new(name);
        cmd.current_dir(self.settings.work_dir());
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        Ok(cmd)
    }
}

#[async_trait]
impl ProcessLauncher for Environment {
    async fn launch(&self, command: &BuildCommand) -> io::Result<ProcessOutput> {
        let output = self.command(command)?.output().await?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
