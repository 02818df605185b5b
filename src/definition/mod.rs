pub mod parsing;
pub mod template;

use serde::Serialize;
use shiftbuild_utils::Traverse;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// The manifest compiled into the binary: the palette-shift headers and its
/// CLI and GUI programs.
pub const BUILTIN_MANIFEST: &str = include_str!("../../manifests/paletteshift.kdl");
pub const BUILTIN_MANIFEST_NAME: &str = "paletteshift.kdl";

/// Everything one run needs: which files to provision, which compiler to look
/// for and which targets to build, in order.
#[derive(Debug, Clone, Traverse)]
pub struct Manifest {
    #[skip]
    pub vars: BTreeMap<String, String>,
    pub dependencies: Vec<DependencySpec>,
    pub toolchain: Toolchain,
    pub targets: Vec<BuildTarget>,
}

impl Manifest {
    pub fn target(&self, name: &str) -> Option<&BuildTarget> {
        self.targets.iter().find(|x| x.name == name)
    }

    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|x| x.file_name.as_str())
    }
}

/// A header that must exist in the working directory, and where to get it.
#[derive(Default, Debug, Clone, Eq, PartialEq, Traverse)]
pub struct DependencySpec {
    pub file_name: String,
    pub url: String,
}

impl DependencySpec {
    pub fn new(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        DependencySpec {
            file_name: file_name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Traverse)]
pub struct Toolchain {
    pub compiler: String,
    pub probe_args: Vec<String>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Toolchain {
            compiler: "clang".to_string(),
            probe_args: vec!["--version".to_string()],
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Traverse)]
pub struct BuildTarget {
    pub name: String,
    pub display_name: String,
    pub command: BuildCommand,
    pub artifact: String,
}

impl BuildTarget {
    pub fn new(name: impl Into<String>, command: BuildCommand, artifact: impl Into<String>) -> Self {
        let name = name.into();
        BuildTarget {
            display_name: name.to_uppercase(),
            name,
            command,
            artifact: artifact.into(),
        }
    }
}

/// How a target's compiler invocation is spelled.
#[derive(Debug, Clone, Eq, PartialEq, Traverse)]
pub enum BuildCommand {
    /// Program followed by its arguments, executed directly.
    Args(Vec<String>),
    /// A command line handed to `sh -c`, for targets that rely on command
    /// substitution such as `pkg-config` queries.
    Shell(String),
}

impl Display for BuildCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildCommand::Args(args) => write!(f, "{}", args.join(" ")),
            BuildCommand::Shell(line) => write!(f, "sh -c '{}'", line),
        }
    }
}

/// Variables exposed to the manifest templates.
#[derive(Serialize, Debug, Default, Clone)]
pub struct TemplateVars(pub BTreeMap<String, String>);
