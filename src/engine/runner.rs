use crate::definition::{BuildCommand, BuildTarget};
use crate::engine::environment::{ProcessLauncher, ProcessOutput};
use crate::engine::fetcher::file_exists;
use crate::engine::EngineSettings;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BuildOutcome {
    Success,
    Failure {
        /// `None` when the compiler could not be started or was killed.
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Success)
    }
}

/// Invokes a target's command line once. Failures are final.
#[derive(Debug)]
pub struct BuildRunner {
    settings: Arc<EngineSettings>,
    launcher: Arc<dyn ProcessLauncher>,
}

impl BuildRunner {
    pub fn new(settings: Arc<EngineSettings>, launcher: Arc<dyn ProcessLauncher>) -> Self {
        BuildRunner { settings, launcher }
    }

    pub async fn run_target(&self, target: &BuildTarget) -> BuildOutcome {
        info!(build_target = %target.name, command = %target.command, "compiling");

        let outcome = match self.launcher.launch(&target.command).await {
            Ok(output) if output.success() => BuildOutcome::Success,
            Ok(output) if is_shell_not_found(&target.command, &output) => BuildOutcome::Failure {
                exit_code: None,
                stderr: format!(
                    "failed to launch `{}`: {}",
                    target.command,
                    output.stderr.trim()
                ),
            },
            Ok(output) => {
                let stderr = match output.code {
                    Some(_) => output.stderr,
                    None if output.stderr.is_empty() => {
                        "compiler was terminated by a signal".to_string()
                    }
                    None => output.stderr,
                };

                BuildOutcome::Failure {
                    exit_code: output.code,
                    stderr,
                }
            }
            Err(e) => BuildOutcome::Failure {
                exit_code: None,
                stderr: format!("failed to launch `{}`: {}", target.command, e),
            },
        };

        match &outcome {
            BuildOutcome::Success => {
                self.check_artifact(target).await;
                println!("{} compilation successful.", target.display_name);
            }
            BuildOutcome::Failure { exit_code, stderr } => {
                debug!(build_target = %target.name, ?exit_code, "compilation failed");
                println!(
                    "{} compilation failed.\nError: {}",
                    target.display_name, stderr
                );
            }
        }

        outcome
    }

    async fn check_artifact(&self, target: &BuildTarget) {
        let path = self.settings.path_for(&target.artifact);

        match file_exists(&path).await {
            Ok(true) => {}
            Ok(false) => warn!(
                build_target = %target.name,
                artifact = %path.display(),
                "compiler succeeded but the expected artifact is missing"
            ),
            Err(e) => warn!(artifact = %path.display(), error = %e, "could not inspect artifact"),
        }
    }
}

/// `sh` exits with 127 when the command it was asked to run does not exist.
fn is_shell_not_found(command: &BuildCommand, output: &ProcessOutput) -> bool {
    matches!(command, BuildCommand::Shell(_)) && output.code == Some(127)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::environment::Environment;
    use crate::fakes::ScriptedLauncher;
    use tempfile::TempDir;

    fn host_runner(dir: &TempDir) -> BuildRunner {
        let settings = Arc::new(EngineSettings::new(dir.path()));
        BuildRunner::new(settings.clone(), Arc::new(Environment::new(settings)))
    }

    fn shell_target(line: &str) -> BuildTarget {
        BuildTarget::new("cli", BuildCommand::Shell(line.to_string()), "out")
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let dir = TempDir::new().expect("tempdir");
        let outcome = host_runner(&dir).run_target(&shell_target("touch out")).await;

        assert_eq!(outcome, BuildOutcome::Success);
        assert!(dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn nonzero_exit_carries_code_and_stderr() {
        let dir = TempDir::new().expect("tempdir");
        let outcome = host_runner(&dir)
            .run_target(&shell_target("echo 'missing.c: no such file' >&2; exit 1"))
            .await;

        assert_eq!(
            outcome,
            BuildOutcome::Failure {
                exit_code: Some(1),
                stderr: "missing.c: no such file\n".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn missing_compiler_is_a_failure_without_exit_code() {
        let dir = TempDir::new().expect("tempdir");
        let target = BuildTarget::new(
            "cli",
            BuildCommand::Args(vec![
                "shiftbuild-no-such-compiler".to_string(),
                "main.c".to_string(),
            ]),
            "main",
        );

        match host_runner(&dir).run_target(&target).await {
            BuildOutcome::Failure { exit_code, stderr } => {
                assert_eq!(exit_code, None);
                assert!(stderr.contains("failed to launch"), "{}", stderr);
            }
            BuildOutcome::Success => panic!("nonexistent compiler cannot succeed"),
        }
    }

    #[tokio::test]
    async fn missing_compiler_behind_a_shell_is_a_launch_failure() {
        let dir = TempDir::new().expect("tempdir");
        let target = shell_target("shiftbuild-no-such-compiler -o out main.c");

        match host_runner(&dir).run_target(&target).await {
            BuildOutcome::Failure { exit_code, stderr } => {
                assert_eq!(exit_code, None);
                assert!(stderr.starts_with("failed to launch `sh -c"), "{}", stderr);
                assert!(stderr.contains("shiftbuild-no-such-compiler"), "{}", stderr);
            }
            BuildOutcome::Success => panic!("nonexistent compiler cannot succeed"),
        }
    }

    #[tokio::test]
    async fn no_retry_after_failure() {
        let dir = TempDir::new().expect("tempdir");
        let settings = Arc::new(EngineSettings::new(dir.path()));
        let launcher = Arc::new(ScriptedLauncher::new().with_exit("clang", 1, "syntax error"));
        let runner = BuildRunner::new(settings, launcher.clone());

        let target = BuildTarget::new(
            "cli",
            BuildCommand::Args(vec!["clang".to_string(), "cli.c".to_string()]),
            "cli",
        );

        assert!(!runner.run_target(&target).await.is_success());
        assert_eq!(launcher.calls().len(), 1);
    }
}
