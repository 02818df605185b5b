use crate::definition::parsing::is_single_component;
use crate::definition::{Manifest, TemplateVars};
use handlebars::Handlebars;
use shiftbuild_utils::{Traverse, Visitor};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to render {template:?}: {reason}")]
    Render { template: String, reason: String },

    #[error("dependency name {name:?} is not a plain file name after rendering")]
    InvalidName { name: String },

    #[error("dependency name {name:?} appears twice after rendering")]
    DuplicateName { name: String },
}

/// Substitutes `{{var}}` references in every string of a manifest.
pub struct TemplateReplace<'a> {
    engine: Handlebars<'a>,
    vars: TemplateVars,
    errors: Vec<TemplateError>,
}

impl TemplateReplace<'_> {
    pub fn new(vars: TemplateVars) -> Self {
        let mut engine = Handlebars::new();
        engine.set_strict_mode(true);
        engine.register_escape_fn(handlebars::no_escape);

        TemplateReplace {
            engine,
            vars,
            errors: vec![],
        }
    }
}

impl Visitor for TemplateReplace<'_> {
    fn visit_string(&mut self, value: &mut String) {
        if !value.contains("{{") {
            return;
        }

        match self.engine.render_template(value, &self.vars) {
            Ok(rendered) => *value = rendered,
            Err(e) => self.errors.push(TemplateError::Render {
                template: value.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

impl Manifest {
    /// Renders all templated strings using the manifest's own `vars`, with
    /// `overrides` taking precedence. The first failing template is returned.
    /// Dependency names are checked again afterwards, since variables can
    /// turn them into paths or duplicates.
    pub fn render<I>(mut self, overrides: I) -> Result<Manifest, TemplateError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.vars.extend(overrides);

        let mut replace = TemplateReplace::new(TemplateVars(self.vars.clone()));
        self.traverse(&mut replace);

        if let Some(err) = replace.errors.into_iter().next() {
            return Err(err);
        }

        let mut seen = HashSet::new();
        for name in self.dependency_names() {
            if !is_single_component(name) {
                return Err(TemplateError::InvalidName {
                    name: name.to_string(),
                });
            }

            if !seen.insert(name) {
                return Err(TemplateError::DuplicateName {
                    name: name.to_string(),
                });
            }
        }

        Ok(self)
    }
}
