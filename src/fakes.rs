//! In-memory stand-ins for the network and the process table.

use crate::definition::BuildCommand;
use crate::engine::environment::{ProcessLauncher, ProcessOutput};
use crate::engine::fetcher::{HttpClient, HttpResponse};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::io::ErrorKind;
use std::sync::Mutex;

/// Answers GETs from a fixed table. Unknown URLs fail like a refused
/// connection.
#[derive(Debug, Default)]
pub struct FakeHttpClient {
    responses: Mutex<HashMap<String, HttpResponse>>,
    calls: Mutex<Vec<String>>,
}

impl FakeHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.set_body(url, body);
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.set_response(
            url,
            HttpResponse {
                status,
                body: vec![],
            },
        );
        self
    }

    pub fn set_body(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.set_response(
            url,
            HttpResponse {
                status: 200,
                body: body.into(),
            },
        );
    }

    fn set_response(&self, url: &str, response: HttpResponse) {
        lock(&self.responses).insert(url.to_string(), response);
    }

    /// Every URL requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn get(&self, url: &str) -> anyhow::Result<HttpResponse> {
        lock(&self.calls).push(url.to_string());

        lock(&self.responses)
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {}", url))
    }
}

#[derive(Debug, Clone)]
enum Script {
    Exit { code: i32, stderr: String },
    NotFound,
}

/// Plays back a fixed result per program. Programs without a script behave
/// as if they were not installed. Shell commands are looked up as `sh`.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<BuildCommand>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exit(self, program: &str, code: i32, stderr: &str) -> Self {
        lock(&self.scripts).insert(
            program.to_string(),
            Script::Exit {
                code,
                stderr: stderr.to_string(),
            },
        );
        self
    }

    pub fn with_missing(self, program: &str) -> Self {
        lock(&self.scripts).insert(program.to_string(), Script::NotFound);
        self
    }

    pub fn calls(&self) -> Vec<BuildCommand> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    async fn launch(&self, command: &BuildCommand) -> io::Result<ProcessOutput> {
        lock(&self.calls).push(command.clone());

        let program = match command {
            BuildCommand::Args(args) => args.first().map(String::as_str).unwrap_or_default(),
            BuildCommand::Shell(_) => "sh",
        };

        let script = lock(&self.scripts)
            .get(program)
            .cloned()
            .unwrap_or(Script::NotFound);

        match script {
            Script::Exit { code, stderr } => Ok(ProcessOutput {
                code: Some(code),
                stdout: String::new(),
                stderr,
            }),
            Script::NotFound => Err(io::Error::new(
                ErrorKind::NotFound,
                format!("{}: command not found", program),
            )),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
