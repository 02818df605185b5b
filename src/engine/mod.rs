use crate::definition::{BuildTarget, DependencySpec, Manifest, Toolchain};
use crate::engine::environment::{Environment, ProcessLauncher};
use crate::engine::fetcher::{Fetcher, HttpClient, ReqwestClient};
use crate::engine::prober::Prober;
use crate::engine::report::RunReport;
use crate::engine::resolver::{Resolution, Resolver};
use crate::engine::runner::{BuildOutcome, BuildRunner};
use anyhow::bail;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub mod environment;
pub mod fetcher;
pub mod prober;
pub mod report;
pub mod resolver;
pub mod runner;

#[derive(Debug)]
pub struct EngineSettings {
    work_dir: PathBuf,
}

impl EngineSettings {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        EngineSettings {
            work_dir: work_dir.into(),
        }
    }

    /// Directory holding the headers, the sources and the built artifacts.
    pub fn work_dir(&self) -> &Path {
        self.work_dir.as_path()
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.work_dir.join(file_name)
    }
}

/// Runs the fixed pipeline: provision dependencies, probe the toolchain,
/// build every target. Each step runs regardless of how the previous ones
/// went, so a single run reports every problem at once.
#[derive(Debug)]
pub struct Engine {
    resolver: Resolver,
    prober: Prober,
    runner: BuildRunner,
    pub settings: Arc<EngineSettings>,
}

impl Engine {
    /// An engine talking to the network and spawning host processes.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let settings = Arc::new(EngineSettings::new(work_dir));
        let launcher = Arc::new(Environment::new(settings.clone()));

        Self::from_parts(settings, Arc::new(ReqwestClient::new()), launcher)
    }

    pub fn from_parts(
        settings: Arc<EngineSettings>,
        http_client: Arc<dyn HttpClient>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Engine {
            resolver: Resolver::new(settings.clone(), Fetcher::new(settings.clone(), http_client)),
            prober: Prober::new(launcher.clone()),
            runner: BuildRunner::new(settings.clone(), launcher),
            settings,
        }
    }

    pub async fn prepare_engine(&self) -> anyhow::Result<()> {
        let work_dir = self.settings.work_dir();

        match tokio::fs::metadata(work_dir).await {
            Ok(md) if md.is_dir() => Ok(()),
            Ok(_) => bail!("{} is not a directory", work_dir.display()),
            Err(e) => bail!("cannot use working directory {}: {}", work_dir.display(), e),
        }
    }

    pub async fn resolve_dependencies(&self, dependencies: &[DependencySpec]) -> Resolution {
        info!(count = dependencies.len(), "resolving dependencies");
        self.resolver.resolve_all(dependencies).await
    }

    pub async fn probe_toolchain(&self, toolchain: &Toolchain) -> bool {
        info!(compiler = %toolchain.compiler, "probing toolchain");
        self.prober.probe(toolchain).await
    }

    pub async fn build_targets<'a, I>(&self, targets: I) -> Vec<(String, BuildOutcome)>
    where
        I: IntoIterator<Item = &'a BuildTarget>,
    {
        let mut outcomes = vec![];

        for target in targets {
            let outcome = self.runner.run_target(target).await;
            outcomes.push((target.name.clone(), outcome));
        }

        outcomes
    }

    pub async fn run(&self, manifest: &Manifest) -> RunReport {
        let Resolution { fetches, readiness } =
            self.resolve_dependencies(&manifest.dependencies).await;
        let toolchain_installed = self.probe_toolchain(&manifest.toolchain).await;
        let builds = self.build_targets(&manifest.targets).await;

        let report = RunReport {
            fetches,
            readiness: Some(readiness),
            toolchain_installed: Some(toolchain_installed),
            builds,
        };

        info!(
            failed_fetches = report.failed_fetches(),
            failed_builds = report.failed_builds(),
            succeeded = report.succeeded(),
            "run finished"
        );

        report
    }
}
