use crate::engine::EngineSettings;
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;
use std::ffi::OsString;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// A fully received HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a single GET and hands back the whole response. `Err` covers
/// transport problems only; HTTP error statuses are regular responses.
#[async_trait]
pub trait HttpClient: Debug + Send + Sync {
    async fn get(&self, url: &str) -> anyhow::Result<HttpResponse>;
}

#[derive(Debug, Default)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        ReqwestClient {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> anyhow::Result<HttpResponse> {
        let req = self.client.get(url).build()?;
        let resp = self.client.execute(req).await?;
        let status = resp.status();

        if !status.is_success() {
            return Ok(HttpResponse {
                status: status.as_u16(),
                body: vec![],
            });
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            body: resp.bytes().await?.to_vec(),
        })
    }
}

#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("server answered with HTTP {status}")]
    Status { status: u16 },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("could not write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub enum FetchOutcome {
    AlreadyPresent,
    Downloaded,
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct Fetcher {
    settings: Arc<EngineSettings>,
    http_client: Arc<dyn HttpClient>,
}

impl Fetcher {
    pub fn new(settings: Arc<EngineSettings>, http_client: Arc<dyn HttpClient>) -> Self {
        Fetcher {
            settings,
            http_client,
        }
    }

    /// Makes sure `file_name` exists in the working directory, downloading
    /// it from `url` when it does not. An existing file is never touched and
    /// no request is made for it.
    pub async fn ensure_local_file(&self, file_name: &str, url: &str) -> FetchOutcome {
        let outcome = self.fetch(file_name, url).await;

        match &outcome {
            FetchOutcome::AlreadyPresent => println!("{} already exists.", file_name),
            FetchOutcome::Downloaded => println!("{} saved successfully.", file_name),
            FetchOutcome::Failed(failure @ FetchFailure::Io { .. }) => {
                warn!(file_name, error = %failure, "saving download failed");
                println!("Couldn't save {} ({})", file_name, failure);
            }
            FetchOutcome::Failed(failure) => {
                warn!(url, error = %failure, "download failed");
                println!("Couldn't connect to {} ({})", url, failure);
            }
        }

        outcome
    }

    async fn fetch(&self, file_name: &str, url: &str) -> FetchOutcome {
        let path = self.settings.path_for(file_name);

        match file_exists(&path).await {
            Ok(true) => return FetchOutcome::AlreadyPresent,
            Ok(false) => {}
            Err(source) => return FetchOutcome::Failed(FetchFailure::Io { path, source }),
        }

        debug!(url, path = %path.display(), "fetching dependency");

        let response = match self.http_client.get(url).await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failed(FetchFailure::Transport(format!("{:#}", e))),
        };

        if !response.is_success() {
            return FetchOutcome::Failed(FetchFailure::Status {
                status: response.status,
            });
        }

        match save_file(&path, &response.body).await {
            Ok(Saved::Written) => {
                debug!(bytes = response.body.len(), path = %path.display(), "dependency saved");
                FetchOutcome::Downloaded
            }
            Ok(Saved::Existing) => {
                debug!(path = %path.display(), "dependency appeared while downloading, keeping it");
                FetchOutcome::AlreadyPresent
            }
            Err(source) => FetchOutcome::Failed(FetchFailure::Io { path, source }),
        }
    }
}

pub(crate) async fn file_exists(path: &Path) -> io::Result<bool> {
    tokio::fs::metadata(path).await.map(|_| true).or_else(|e| {
        if e.kind() == ErrorKind::NotFound {
            Ok(false)
        } else {
            Err(e)
        }
    })
}

#[derive(Debug, Eq, PartialEq)]
enum Saved {
    Written,
    /// Someone else created the file while the body was being written.
    Existing,
}

/// Writes `body` into a uniquely named sibling of `path` and links it into
/// place once it is complete on disk. The link fails instead of replacing a
/// file that appeared meanwhile. The sibling is removed on every path.
async fn save_file(path: &Path, body: &[u8]) -> io::Result<Saved> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut prefix = OsString::from(".");
    prefix.push(path.file_name().unwrap_or_default());
    prefix.push(".");

    let part = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".part")
        .tempfile_in(dir)?;

    let mut f = File::from_std(part.as_file().try_clone()?);
    f.write_all(body).await?;
    f.sync_all().await?;
    drop(f);

    match tokio::fs::hard_link(part.path(), path).await {
        Ok(()) => Ok(Saved::Written),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(Saved::Existing),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeHttpClient;
    use tempfile::TempDir;

    const URL: &str = "https://example.com/stb_image.h";

    fn fetcher(dir: &TempDir, client: Arc<FakeHttpClient>) -> Fetcher {
        Fetcher::new(Arc::new(EngineSettings::new(dir.path())), client)
    }

    #[tokio::test]
    async fn downloads_missing_file() {
        let dir = TempDir::new().expect("tempdir");
        let client = Arc::new(FakeHttpClient::new().with_body(URL, "#define STBI"));

        let outcome = fetcher(&dir, client.clone())
            .ensure_local_file("stb_image.h", URL)
            .await;

        assert!(matches!(outcome, FetchOutcome::Downloaded));
        let content = std::fs::read_to_string(dir.path().join("stb_image.h")).expect("saved");
        assert_eq!(content, "#define STBI");
        assert_eq!(entries(&dir), vec!["stb_image.h"]);
        assert_eq!(client.calls(), vec![URL.to_string()]);
    }

    #[tokio::test]
    async fn second_call_is_a_no_op() {
        let dir = TempDir::new().expect("tempdir");
        let client = Arc::new(FakeHttpClient::new().with_body(URL, "first"));
        let fetcher = fetcher(&dir, client.clone());

        assert!(matches!(
            fetcher.ensure_local_file("stb_image.h", URL).await,
            FetchOutcome::Downloaded
        ));

        client.set_body(URL, "second");

        assert!(matches!(
            fetcher.ensure_local_file("stb_image.h", URL).await,
            FetchOutcome::AlreadyPresent
        ));

        let content = std::fs::read_to_string(dir.path().join("stb_image.h")).expect("saved");
        assert_eq!(content, "first");
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn error_status_creates_no_file() {
        let dir = TempDir::new().expect("tempdir");
        let client = Arc::new(FakeHttpClient::new().with_status(URL, 404));

        let outcome = fetcher(&dir, client).ensure_local_file("stb_image.h", URL).await;

        assert!(matches!(
            outcome,
            FetchOutcome::Failed(FetchFailure::Status { status: 404 })
        ));
        assert!(!dir.path().join("stb_image.h").exists());
    }

    #[tokio::test]
    async fn transport_error_is_reported_as_failure() {
        let dir = TempDir::new().expect("tempdir");
        let client = Arc::new(FakeHttpClient::new());

        let outcome = fetcher(&dir, client).ensure_local_file("stb_image.h", URL).await;

        assert!(matches!(outcome, FetchOutcome::Failed(FetchFailure::Transport(_))));
        assert!(!dir.path().join("stb_image.h").exists());
    }

    #[tokio::test]
    async fn write_failure_becomes_failed_outcome() {
        let dir = TempDir::new().expect("tempdir");
        let client = Arc::new(FakeHttpClient::new().with_body(URL, "body"));
        let settings = Arc::new(EngineSettings::new(dir.path().join("does-not-exist")));

        let outcome = Fetcher::new(settings, client)
            .ensure_local_file("stb_image.h", URL)
            .await;

        assert!(matches!(outcome, FetchOutcome::Failed(FetchFailure::Io { .. })));
    }

    fn entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|x| x.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn save_keeps_a_file_that_appeared_meanwhile() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("stb_image.h");
        std::fs::write(&path, "placed by operator").expect("place file");

        let saved = save_file(&path, b"remote").await.expect("save");

        assert_eq!(saved, Saved::Existing);
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "placed by operator"
        );
        assert_eq!(entries(&dir), vec!["stb_image.h"]);
    }

    #[tokio::test]
    async fn unrelated_part_file_is_left_alone() {
        let dir = TempDir::new().expect("tempdir");
        let part = dir.path().join("stb_image.h.part");
        std::fs::write(&part, "operator notes").expect("write part");
        let client = Arc::new(FakeHttpClient::new().with_body(URL, "body"));

        let outcome = fetcher(&dir, client).ensure_local_file("stb_image.h", URL).await;

        assert!(matches!(outcome, FetchOutcome::Downloaded));
        assert_eq!(
            std::fs::read_to_string(&part).expect("part kept"),
            "operator notes"
        );
        assert_eq!(entries(&dir), vec!["stb_image.h", "stb_image.h.part"]);
    }
}
