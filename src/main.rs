use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser, Subcommand};
use shiftbuild::definition::{BUILTIN_MANIFEST, BUILTIN_MANIFEST_NAME};
use shiftbuild::{BuildTarget, Engine, Manifest, RunReport};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const USAGE_ERROR: u8 = 2;

/// Fetches the palette-shift headers and compiles its CLI and GUI programs.
#[derive(Debug, Parser)]
#[command(name = "shiftbuild", version)]
struct Cli {
    /// Build manifest to use instead of the built-in one.
    #[arg(long, global = true, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// Directory holding the headers, sources and artifacts.
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Sets a manifest template variable, e.g. `--var compiler=gcc`.
    #[arg(long = "var", global = true, value_name = "KEY=VALUE", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// Always exit with 0 once the run completes, whatever it reported.
    #[arg(long, global = true)]
    no_fail: bool,

    /// More diagnostic logging on stderr; repeat for more.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch dependencies, probe the toolchain and build every target (default).
    Run,
    /// Fetch missing dependencies and report readiness.
    Fetch,
    /// Check that the compiler can be started.
    Probe,
    /// Build targets without touching dependencies.
    Build {
        /// Only build the named target; repeatable.
        #[arg(long = "target", value_name = "NAME")]
        targets: Vec<String>,
    },
    /// Print what would be fetched and run.
    Plan,
}

fn parse_var(input: &str) -> Result<(String, String), String> {
    input
        .split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", input))
}

fn init_tracing(verbose: u8) -> anyhow::Result<()> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!(e))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let (source, source_name) = match read_manifest(cli.manifest.as_deref()).await {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return Ok(ExitCode::from(USAGE_ERROR));
        }
    };

    let manifest = match Manifest::from_source(&source, &source_name) {
        Ok(manifest) => manifest,
        Err(report) => {
            eprintln!("{:?}", report);
            return Ok(ExitCode::from(USAGE_ERROR));
        }
    };

    let manifest = match manifest.render(cli.vars.clone()) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(ExitCode::from(USAGE_ERROR));
        }
    };

    let engine = Engine::new(&cli.work_dir);
    engine.prepare_engine().await?;

    let report = match cli.command.unwrap_or(Command::Run) {
        Command::Run => engine.run(&manifest).await,

        Command::Fetch => {
            let resolution = engine.resolve_dependencies(&manifest.dependencies).await;
            RunReport {
                fetches: resolution.fetches,
                readiness: Some(resolution.readiness),
                ..Default::default()
            }
        }

        Command::Probe => RunReport {
            toolchain_installed: Some(engine.probe_toolchain(&manifest.toolchain).await),
            ..Default::default()
        },

        Command::Build { targets } => {
            let selected = match select_targets(&manifest, &targets) {
                Ok(selected) => selected,
                Err(unknown) => {
                    eprintln!("error: unknown target {:?}", unknown);
                    return Ok(ExitCode::from(USAGE_ERROR));
                }
            };

            RunReport {
                builds: engine.build_targets(selected).await,
                ..Default::default()
            }
        }

        Command::Plan => {
            print_plan(&manifest);
            return Ok(ExitCode::SUCCESS);
        }
    };

    Ok(ExitCode::from(report.exit_status(cli.no_fail)))
}

/// Source text and display name of the manifest at `path`, or of the
/// built-in one.
async fn read_manifest(path: Option<&Path>) -> anyhow::Result<(String, String)> {
    match path {
        Some(path) => {
            let source = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading manifest {}", path.display()))?;
            Ok((source, path.display().to_string()))
        }
        None => Ok((
            BUILTIN_MANIFEST.to_string(),
            BUILTIN_MANIFEST_NAME.to_string(),
        )),
    }
}

/// All targets when `names` is empty, otherwise the named ones in the given
/// order. Fails with the first unknown name.
fn select_targets<'a>(
    manifest: &'a Manifest,
    names: &'a [String],
) -> Result<Vec<&'a BuildTarget>, &'a str> {
    if names.is_empty() {
        return Ok(manifest.targets.iter().collect());
    }

    names
        .iter()
        .map(|name| manifest.target(name).ok_or(name.as_str()))
        .collect()
}

fn print_plan(manifest: &Manifest) {
    println!("Dependencies:");
    for dependency in &manifest.dependencies {
        println!("  {} <- {}", dependency.file_name, dependency.url);
    }

    let mut probe = vec![manifest.toolchain.compiler.as_str()];
    probe.extend(manifest.toolchain.probe_args.iter().map(String::as_str));
    println!("Toolchain probe: {}", probe.join(" "));

    println!("Targets:");
    for target in &manifest.targets {
        println!(
            "  {} ({}) -> {}",
            target.display_name, target.name, target.artifact
        );
        println!("    {}", target.command);
    }
}
