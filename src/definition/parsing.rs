use crate::definition::{BuildCommand, BuildTarget, DependencySpec, Manifest, Toolchain};
use kdl::{KdlDocument, KdlNode};
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[error("Failed parsing build manifest")]
pub struct ManifestError {
    #[source_code]
    pub source_code: NamedSource,
    #[related]
    pub errors: Vec<ManifestParseError>,
}

#[derive(Debug, Diagnostic, Eq, PartialEq, Error)]
#[error("{kind}")]
pub struct ManifestParseError {
    #[label("{}", label.unwrap_or("here"))]
    pub span: SourceSpan,

    /// Defaults to `"here"`.
    pub label: Option<&'static str>,

    #[help]
    pub help: Option<String>,

    pub kind: &'static str,
}

impl ManifestParseError {
    fn at(span: SourceSpan, kind: &'static str) -> Self {
        ManifestParseError {
            span,
            label: None,
            help: None,
            kind,
        }
    }
}

const EMPTY_NODES: &[KdlNode] = &[];

pub(crate) trait GetNodes {
    fn nodes(&self) -> &[KdlNode];
}

impl GetNodes for KdlNode {
    fn nodes(&self) -> &[KdlNode] {
        self.children().map_or(EMPTY_NODES, |x| x.nodes())
    }
}

pub trait ParseNode {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<ManifestParseError>)
    where
        Self: Sized;
}

macro_rules! parse_string_into {
    ($input:ident, $into:expr, $errors:expr, $name:literal) => {
        match $crate::definition::parsing::extract_single_string_value(
            $input,
            concat!($name, " missing"),
            concat!($name, " should be a string"),
            concat!("only 1 string expected for ", $name),
            concat!($name, " expected a value, property found instead"),
        ) {
            Ok(n) => $into = n.into(),
            Err(e) => $errors.push(e),
        };
    };
}

macro_rules! parse_string_list_into {
    ($input:ident, $into:expr, $errors:expr, $name:literal) => {
        match $crate::definition::parsing::extract_string_values(
            $input,
            concat!($name, " expects only string values"),
            concat!($name, " expected values, property found instead"),
        ) {
            Ok(n) => $into.extend(n),
            Err(e) => $errors.push(e),
        };
    };
}

impl Manifest {
    /// Parses KDL text into a manifest, reporting every problem found as one
    /// diagnostic against `filename`.
    pub fn from_source(source: &str, filename: &str) -> miette::Result<Manifest> {
        let document: KdlDocument = source.parse()?;
        let (manifest, errors) = Manifest::parse_document_with_errors(&document);

        match manifest {
            Some(manifest) if errors.is_empty() => Ok(manifest),

            _ => Err(ManifestError {
                source_code: NamedSource::new(filename, source.to_string()),
                errors,
            }
            .into()),
        }
    }

    pub fn parse_document_with_errors(
        input: &KdlDocument,
    ) -> (Option<Self>, Vec<ManifestParseError>) {
        let mut errors = vec![];
        let mut vars = BTreeMap::new();
        let mut dependencies: Vec<DependencySpec> = vec![];
        let mut toolchain: Option<Toolchain> = None;
        let mut targets: Vec<BuildTarget> = vec![];

        let mut seen_dependencies = HashSet::new();
        let mut seen_targets = HashSet::new();

        for node in input.nodes() {
            match node.name().value() {
                "vars" => {
                    let (parsed, err) = parse_vars(node);
                    errors.extend(err);
                    vars.extend(parsed);
                }

                "dependencies" => {
                    for child in node.nodes() {
                        let (dependency, err) = DependencySpec::parse_node_with_errors(child);
                        errors.extend(err);

                        if let Some(dependency) = dependency {
                            if !seen_dependencies.insert(dependency.file_name.clone()) {
                                errors.push(ManifestParseError {
                                    span: *child.span(),
                                    label: Some("second definition here"),
                                    help: Some(format!(
                                        "{} is already provided by an earlier entry",
                                        dependency.file_name
                                    )),
                                    kind: "duplicate dependency name",
                                });
                                continue;
                            }

                            dependencies.push(dependency);
                        }
                    }
                }

                "toolchain" => {
                    if toolchain.is_some() {
                        errors.push(ManifestParseError {
                            span: *node.span(),
                            label: Some("second definition of toolchain here"),
                            help: None,
                            kind: "redefinition of toolchain, only one compiler can be probed",
                        });
                        continue;
                    }

                    let (parsed, err) = Toolchain::parse_node_with_errors(node);
                    errors.extend(err);
                    toolchain = parsed;
                }

                "target" => {
                    let (target, err) = BuildTarget::parse_node_with_errors(node);
                    errors.extend(err);

                    if let Some(target) = target {
                        if !seen_targets.insert(target.name.clone()) {
                            errors.push(ManifestParseError {
                                span: *node.span(),
                                label: Some("second definition here"),
                                help: None,
                                kind: "duplicate target name",
                            });
                            continue;
                        }

                        targets.push(target);
                    }
                }

                _ => errors.push(ManifestParseError {
                    span: *node.name().span(),
                    label: None,
                    help: Some("expected one of vars, dependencies, toolchain, target".to_string()),
                    kind: "unknown manifest node",
                }),
            }
        }

        let toolchain = match toolchain {
            Some(toolchain) => toolchain,
            None => {
                errors.push(ManifestParseError {
                    span: *input.span(),
                    label: None,
                    help: Some("add a `toolchain \"clang\"` node".to_string()),
                    kind: "manifest missing toolchain",
                });
                return (None, errors);
            }
        };

        (
            Some(Manifest {
                vars,
                dependencies,
                toolchain,
                targets,
            }),
            errors,
        )
    }
}

fn parse_vars(input: &KdlNode) -> (BTreeMap<String, String>, Vec<ManifestParseError>) {
    let mut vars = BTreeMap::new();
    let mut errors = vec![];

    for node in input.nodes() {
        let mut value = String::new();
        parse_string_into!(node, value, errors, "variable value");
        vars.insert(node.name().value().to_string(), value);
    }

    (vars, errors)
}

impl ParseNode for DependencySpec {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<ManifestParseError>) {
        let mut errors = vec![];

        if input.name().value() != "fetch" {
            errors.push(ManifestParseError::at(
                *input.name().span(),
                "Unknown type of dependency",
            ));
            return (None, errors);
        }

        let mut url: Option<String> = None;
        let mut file_name: Option<String> = None;
        let mut name_span = *input.span();

        for node in input.nodes() {
            match node.name().value() {
                "url" => {
                    parse_string_into!(node, url, errors, "url of dependency");
                }

                "name" => {
                    name_span = *node.span();
                    parse_string_into!(node, file_name, errors, "name of dependency");
                }

                _ => {}
            }
        }

        let url = match url {
            Some(url) => url,
            None => {
                errors.push(ManifestParseError::at(
                    *input.span(),
                    "fetch dependency requires an url to be given",
                ));
                return (None, errors);
            }
        };

        let file_name = file_name.unwrap_or_else(|| file_name_from_url(&url));

        if !is_single_component(&file_name) {
            errors.push(ManifestParseError {
                span: name_span,
                label: None,
                help: Some(format!(
                    "{:?} must name a file directly inside the working directory",
                    file_name
                )),
                kind: "dependency name is not a plain file name",
            });
            return (None, errors);
        }

        (Some(DependencySpec { file_name, url }), errors)
    }
}

impl ParseNode for Toolchain {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<ManifestParseError>) {
        let mut errors = vec![];
        let mut compiler: Option<String> = None;
        let mut probe_args: Vec<String> = vec![];
        let mut found_probe_args = false;

        parse_string_into!(input, compiler, errors, "name of compiler");

        for node in input.nodes() {
            if node.name().value() == "probe-args" {
                found_probe_args = true;
                parse_string_list_into!(node, probe_args, errors, "probe-args");
            }
        }

        if !found_probe_args {
            probe_args = Toolchain::default().probe_args;
        }

        (
            compiler.map(|compiler| Toolchain {
                compiler,
                probe_args,
            }),
            errors,
        )
    }
}

impl ParseNode for BuildTarget {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<ManifestParseError>) {
        let mut errors = vec![];
        let mut name: Option<String> = None;
        let mut display_name: Option<String> = None;
        let mut artifact: Option<String> = None;
        let mut command: Option<BuildCommand> = None;

        parse_string_into!(input, name, errors, "name of target");

        for node in input.nodes() {
            match node.name().value() {
                "display" => {
                    parse_string_into!(node, display_name, errors, "display name");
                }

                "artifact" => {
                    parse_string_into!(node, artifact, errors, "artifact");
                }

                "command" | "shell" if command.is_some() => {
                    errors.push(ManifestParseError {
                        span: *node.span(),
                        label: Some("second command here"),
                        help: Some("use either `command` or `shell`, once".to_string()),
                        kind: "target has more than one command",
                    });
                }

                "command" => {
                    let mut args: Vec<String> = vec![];
                    parse_string_list_into!(node, args, errors, "command");

                    if args.is_empty() {
                        errors.push(ManifestParseError::at(
                            *node.span(),
                            "command needs at least the program to run",
                        ));
                    } else {
                        command = Some(BuildCommand::Args(args));
                    }
                }

                "shell" => {
                    let mut line = String::new();
                    parse_string_into!(node, line, errors, "shell command");
                    command = Some(BuildCommand::Shell(line));
                }

                _ => {}
            }
        }

        let (name, command, artifact) = match (name, command, artifact) {
            (Some(name), Some(command), Some(artifact)) => (name, command, artifact),
            (_, command, artifact) => {
                if command.is_none() {
                    errors.push(ManifestParseError::at(
                        *input.span(),
                        "target requires a `command` or `shell` node",
                    ));
                }
                if artifact.is_none() {
                    errors.push(ManifestParseError::at(
                        *input.span(),
                        "target requires an `artifact` node",
                    ));
                }
                return (None, errors);
            }
        };

        (
            Some(BuildTarget {
                display_name: display_name.unwrap_or_else(|| name.to_uppercase()),
                name,
                command,
                artifact,
            }),
            errors,
        )
    }
}

fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

pub(crate) fn is_single_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

pub(crate) fn extract_single_string_value(
    input: &KdlNode,
    missing_error: &'static str,
    wrong_type_error: &'static str,
    too_many_error: &'static str,
    property_found_error: &'static str,
) -> Result<String, ManifestParseError> {
    let entries = input.entries();

    match entries {
        [] => Err(ManifestParseError::at(*input.name().span(), missing_error)),

        [entry] => {
            if entry.name().is_some() {
                return Err(ManifestParseError::at(*entry.span(), property_found_error));
            }

            entry
                .value()
                .as_string()
                .map(ToString::to_string)
                .ok_or_else(|| ManifestParseError::at(*entry.span(), wrong_type_error))
        }

        [first, .., last] => {
            let start = first.span().offset();
            let end = last.span().offset() + last.span().len();

            Err(ManifestParseError::at(
                SourceSpan::new(start.into(), (end - start).into()),
                too_many_error,
            ))
        }
    }
}

pub(crate) fn extract_string_values(
    input: &KdlNode,
    wrong_type_error: &'static str,
    property_found_error: &'static str,
) -> Result<Vec<String>, ManifestParseError> {
    let mut values = vec![];

    for entry in input.entries() {
        if entry.name().is_some() {
            return Err(ManifestParseError::at(*entry.span(), property_found_error));
        }

        match entry.value().as_string() {
            Some(v) => values.push(v.to_string()),
            None => return Err(ManifestParseError::at(*entry.span(), wrong_type_error)),
        }
    }

    Ok(values)
}
