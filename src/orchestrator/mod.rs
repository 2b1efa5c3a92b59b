//! Runs definitions: loads each one, renders its targets and writes the results.
//!
//! Failures are contained. A target that fails is recorded and its siblings
//! still render; a definition that fails to load is recorded and the other
//! definitions still run.

pub mod report;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::context::VariableContext;
use crate::definition::{DefinitionTree, RenderTarget};
use crate::error::{Error, Result};
use crate::ioutils::{source_key, write_file_atomic};
use crate::renderer::omit::strip_omitted;
use crate::renderer::TemplateRenderer;

pub use report::{DefinitionOutcome, DefinitionReport, RenderResult};

/// Options shared by every target of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Overwrite existing destinations regardless of per-target flags
    pub force_overwrite: bool,
}

pub struct Orchestrator<'a> {
    engine: &'a dyn TemplateRenderer,
    options: RenderOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(engine: &'a dyn TemplateRenderer, options: RenderOptions) -> Self {
        Self { engine, options }
    }

    /// Processes one definition file.
    ///
    /// # Returns
    /// * `bool` - True iff every target succeeded or was skipped
    pub fn process(&self, path: &Path) -> bool {
        self.run_definition(path).succeeded()
    }

    /// Processes every definition, in order, and reports whether all succeeded.
    pub fn process_all(&self, paths: &[PathBuf]) -> bool {
        paths.iter().map(|path| self.process(path)).fold(true, |all, ok| all && ok)
    }

    /// Loads, resolves and renders one definition file, logging as it goes.
    ///
    /// # Arguments
    /// * `path` - Path to the definition document
    ///
    /// # Returns
    /// * `DefinitionReport` - Per-target results (or the load error) and the
    ///   files the definition was built from
    pub fn run_definition(&self, path: &Path) -> DefinitionReport {
        log::info!("Processing definition '{}'", path.display());
        let mut sources = BTreeSet::from([source_key(path)]);

        let targets = match self.load_targets(path, &mut sources) {
            Ok(targets) => targets,
            Err(error) => {
                log::error!("{error}");
                return DefinitionReport {
                    path: path.to_path_buf(),
                    outcome: DefinitionOutcome::LoadFailed(error),
                    sources,
                };
            }
        };

        let results: Vec<RenderResult> = targets
            .iter()
            .map(|target| self.render_target(target, &mut sources))
            .collect();

        let report = DefinitionReport {
            path: path.to_path_buf(),
            outcome: DefinitionOutcome::Rendered(results),
            sources,
        };
        if !report.succeeded() {
            log::error!("Some renders failed:");
            for failure in report.failures() {
                log::error!("    {}", failure.get_message());
            }
        }
        report
    }

    fn load_targets(
        &self,
        path: &Path,
        sources: &mut BTreeSet<PathBuf>,
    ) -> Result<Vec<RenderTarget>> {
        let root = VariableContext::new();
        let tree = DefinitionTree::parse_recording(path, &root, self.engine, sources)?;
        let targets = tree.resolve_contexts(&root, self.engine)?;
        log::debug!("Definition '{}' has {} target(s)", path.display(), targets.len());
        Ok(targets)
    }

    fn render_target(
        &self,
        target: &RenderTarget,
        sources: &mut BTreeSet<PathBuf>,
    ) -> RenderResult {
        let label = target.to_string();
        match self.try_render_target(target, sources) {
            Ok(result) => {
                log::info!("{}", result.get_message());
                result
            }
            Err(error) => {
                log::error!("Failed to render '{label}' from '{}': {error}", target.definition.display());
                RenderResult::Failed { target: label, error }
            }
        }
    }

    fn try_render_target(
        &self,
        target: &RenderTarget,
        sources: &mut BTreeSet<PathBuf>,
    ) -> Result<RenderResult> {
        let template_path = target.template_path(self.engine)?;
        if let Some(template_path) = &template_path {
            sources.insert(source_key(template_path));
        }

        let destination = target.destination(self.engine)?;
        if destination.exists() {
            if !destination.is_file() {
                return Err(Error::DestinationWrite {
                    path: destination,
                    description: "Destination exists and is not a file".to_string(),
                });
            }
            if !target.allows_overwrite(self.options.force_overwrite) {
                return Ok(RenderResult::Skipped { target: target.to_string(), destination });
            }
        }

        let template = target.read_template(template_path.as_deref())?;
        let name = template_path.as_deref().and_then(Path::to_str);
        let rendered = self.engine.render(&template, &target.context.to_value(), name)?;
        let rendered = strip_omitted(&rendered, self.engine.omit_placeholder())?;

        log::debug!("Writing {} byte(s) to '{}'", rendered.len(), destination.display());
        write_file_atomic(&rendered, &destination)?;
        Ok(RenderResult::Success { target: target.to_string(), destination })
    }
}
