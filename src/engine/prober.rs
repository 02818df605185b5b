use crate::definition::{BuildCommand, Toolchain};
use crate::engine::environment::ProcessLauncher;
use std::sync::Arc;
use tracing::debug;

/// Checks whether the compiler can be started. Absence is an answer, not an
/// error.
#[derive(Debug)]
pub struct Prober {
    launcher: Arc<dyn ProcessLauncher>,
}

impl Prober {
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Prober { launcher }
    }

    pub async fn probe(&self, toolchain: &Toolchain) -> bool {
        let installed = self.probe_binary(&toolchain.compiler, &toolchain.probe_args).await;

        if installed {
            println!("{} is installed on your system.", toolchain.compiler);
        } else {
            println!("There is no {} installed on your system.", toolchain.compiler);
        }

        installed
    }

    /// Runs `binary args...` with its output captured and discarded.
    pub async fn probe_binary(&self, binary: &str, args: &[String]) -> bool {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(binary.to_string());
        argv.extend(args.iter().cloned());

        match self.launcher.launch(&BuildCommand::Args(argv)).await {
            Ok(output) => {
                debug!(binary, code = ?output.code, "toolchain probe finished");
                output.success()
            }
            Err(e) => {
                debug!(binary, error = %e, "toolchain probe could not start");
                false
            }
        }
    }
}
