use crate::definition::DependencySpec;
use crate::engine::fetcher::{file_exists, FetchOutcome, Fetcher};
use crate::engine::EngineSettings;
use std::sync::Arc;
use tracing::warn;

/// Which required files are present right now. Always computed from the
/// filesystem, never from what the fetcher reported.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ReadinessReport {
    pub missing: Vec<String>,
}

impl ReadinessReport {
    pub fn ready(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug)]
pub struct Resolution {
    /// One entry per dependency, in manifest order.
    pub fetches: Vec<(String, FetchOutcome)>,
    pub readiness: ReadinessReport,
}

#[derive(Debug)]
pub struct Resolver {
    settings: Arc<EngineSettings>,
    fetcher: Fetcher,
}

impl Resolver {
    pub fn new(settings: Arc<EngineSettings>, fetcher: Fetcher) -> Self {
        Resolver { settings, fetcher }
    }

    /// Attempts every dependency, even after failures, then rescans the
    /// working directory.
    pub async fn resolve_all(&self, dependencies: &[DependencySpec]) -> Resolution {
        let mut fetches = Vec::with_capacity(dependencies.len());

        for dependency in dependencies {
            let outcome = self
                .fetcher
                .ensure_local_file(&dependency.file_name, &dependency.url)
                .await;

            fetches.push((dependency.file_name.clone(), outcome));
        }

        let readiness = self.check(dependencies).await;

        Resolution { fetches, readiness }
    }

    pub async fn check(&self, dependencies: &[DependencySpec]) -> ReadinessReport {
        let mut missing = vec![];

        for dependency in dependencies {
            let path = self.settings.path_for(&dependency.file_name);

            let present = file_exists(&path).await.unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "could not inspect dependency");
                false
            });

            if !present {
                println!("{} is missing", dependency.file_name);
                missing.push(dependency.file_name.clone());
            }
        }

        let report = ReadinessReport { missing };

        if report.ready() {
            println!("All required dependencies are present.");
        } else {
            println!("Some dependencies are missing.");
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeHttpClient;
    use tempfile::TempDir;

    fn resolver(dir: &TempDir, client: Arc<FakeHttpClient>) -> Resolver {
        let settings = Arc::new(EngineSettings::new(dir.path()));
        Resolver::new(settings.clone(), Fetcher::new(settings, client))
    }

    fn specs() -> Vec<DependencySpec> {
        vec![
            DependencySpec::new("a.h", "https://example.com/a.h"),
            DependencySpec::new("b.h", "https://example.com/b.h"),
            DependencySpec::new("c.h", "https://example.com/c.h"),
        ]
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_dependencies() {
        let dir = TempDir::new().expect("tempdir");
        let client = Arc::new(
            FakeHttpClient::new()
                .with_status("https://example.com/a.h", 500)
                .with_body("https://example.com/b.h", "b")
                .with_body("https://example.com/c.h", "c"),
        );

        let resolution = resolver(&dir, client.clone()).resolve_all(&specs()).await;

        assert!(resolution.fetches[0].1.is_failed());
        assert!(matches!(resolution.fetches[1].1, FetchOutcome::Downloaded));
        assert!(matches!(resolution.fetches[2].1, FetchOutcome::Downloaded));
        assert_eq!(client.calls().len(), 3);
        assert_eq!(resolution.readiness.missing, vec!["a.h".to_string()]);
        assert!(!resolution.readiness.ready());
    }

    #[tokio::test]
    async fn check_counts_files_placed_by_anyone() {
        let dir = TempDir::new().expect("tempdir");
        for name in ["a.h", "b.h", "c.h"] {
            std::fs::write(dir.path().join(name), name).expect("place file");
        }

        let report = resolver(&dir, Arc::new(FakeHttpClient::new()))
            .check(&specs())
            .await;

        assert!(report.ready());
        assert!(report.missing.is_empty());
    }

    #[tokio::test]
    async fn check_lists_missing_in_manifest_order() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("b.h"), "b").expect("place file");

        let report = resolver(&dir, Arc::new(FakeHttpClient::new()))
            .check(&specs())
            .await;

        assert_eq!(report.missing, vec!["a.h".to_string(), "c.h".to_string()]);
    }
}
