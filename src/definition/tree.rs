use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use super::document::{Document, EntryDecl, ScopeDecl, TemplateSource};
use super::target::RenderTarget;
use crate::constants::TEMPLATE_SUFFIX;
use crate::context::{VariableContext, Vars};
use crate::error::{Error, Result};
use crate::ext::PathExt;
use crate::ioutils::source_key;
use crate::renderer::TemplateRenderer;

/// Variable layers declared at one level of a definition.
///
/// Included files are read when the definition is loaded; nothing is rendered
/// until [`Scope::apply`] merges the layers over a parent context.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Included files in order, then the inline variables
    layers: Vec<Vars>,
}

impl Scope {
    fn load(decl: ScopeDecl, base_dir: &Path, sources: &mut BTreeSet<PathBuf>) -> Result<Self> {
        let mut scope = Scope::default();
        for include in decl.include_vars {
            let path = Path::new(&include).resolve_from(base_dir);
            sources.insert(source_key(&path));
            scope.layers.push(load_vars_file(&path)?);
        }
        scope.layers.push(decl.vars);
        Ok(scope)
    }

    /// Merges every layer over `inherited`, rendering values as it goes.
    pub fn apply(
        &self,
        inherited: &VariableContext,
        engine: &dyn TemplateRenderer,
    ) -> Result<VariableContext> {
        self.layers
            .iter()
            .try_fold(inherited.clone(), |context, layer| context.with_layer(layer, engine))
    }
}

/// Reads a YAML mapping of variables; an empty file yields no variables.
fn load_vars_file(path: &Path) -> Result<Vars> {
    if !path.is_file() {
        return Err(Error::VarsFileNotFound { path: path.to_path_buf() });
    }
    let text = fs::read_to_string(path)?;
    let vars: Option<Vars> = serde_yaml::from_str(&text).map_err(|e| Error::ParseError {
        path: path.to_path_buf(),
        description: e.to_string(),
    })?;
    Ok(vars.unwrap_or_default())
}

#[derive(Debug, Clone)]
pub struct TemplateNode {
    pub source: TemplateSource,
    pub dest: String,
    pub scope: Scope,
    pub force: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NestedNode {
    pub scope: Scope,
    pub force: Option<bool>,
    pub tree: DefinitionTree,
}

#[derive(Debug, Clone)]
pub enum DefinitionNode {
    Template(TemplateNode),
    Nested(NestedNode),
}

/// A definition document with its nested definitions expanded.
#[derive(Debug, Clone)]
pub struct DefinitionTree {
    /// Path of the document, as given or resolved from the parent definition
    pub path: PathBuf,
    scope: Scope,
    nodes: Vec<DefinitionNode>,
}

impl DefinitionTree {
    /// Loads a definition and every definition it includes.
    ///
    /// Definitions whose file name ends in `.j2` are rendered with the
    /// context they inherit before being parsed.
    ///
    /// # Arguments
    /// * `path` - Path to the definition document
    /// * `inherited` - Context inherited from the including scope
    /// * `engine` - Renderer used for templated documents, variables and paths
    ///
    /// # Returns
    /// * `Result<DefinitionTree>` - The expanded tree, or the first loading error
    pub fn parse(
        path: &Path,
        inherited: &VariableContext,
        engine: &dyn TemplateRenderer,
    ) -> Result<Self> {
        Self::parse_recording(path, inherited, engine, &mut BTreeSet::new())
    }

    /// Like [`DefinitionTree::parse`], also recording the source key of every
    /// definition and variables file into `sources` before it is read.
    ///
    /// When loading fails, `sources` still holds every file visited up to and
    /// including the one that failed.
    pub fn parse_recording(
        path: &Path,
        inherited: &VariableContext,
        engine: &dyn TemplateRenderer,
        sources: &mut BTreeSet<PathBuf>,
    ) -> Result<Self> {
        let mut ancestors = Vec::new();
        Self::load(path, inherited, engine, &mut ancestors, sources)
    }

    fn load(
        path: &Path,
        inherited: &VariableContext,
        engine: &dyn TemplateRenderer,
        ancestors: &mut Vec<PathBuf>,
        sources: &mut BTreeSet<PathBuf>,
    ) -> Result<Self> {
        sources.insert(source_key(path));
        if !path.exists() {
            return Err(Error::DefinitionNotFound { path: path.to_path_buf() });
        }
        if !path.is_file() {
            return Err(Error::ParseError {
                path: path.to_path_buf(),
                description: "Is not a file".to_string(),
            });
        }

        let canonical = path.canonicalize()?;
        if let Some(start) = ancestors.iter().position(|ancestor| *ancestor == canonical) {
            let mut chain = ancestors[start..].to_vec();
            chain.push(canonical);
            return Err(Error::CyclicDefinition { chain });
        }

        debug!("Loading definition '{}'", path.display());
        let mut text = fs::read_to_string(path)?;
        if path.to_string_lossy().ends_with(TEMPLATE_SUFFIX) {
            text = engine
                .render(&text, &inherited.to_value(), Some(path.to_str_checked()?))
                .map_err(|e| e.in_file(path))?;
        }

        let document = Document::parse(&text, path)?;
        let base_dir = path.base_dir();
        let scope = Scope::load(document.scope, &base_dir, sources)?;
        let context = scope.apply(inherited, engine)?;

        ancestors.push(canonical);
        let nodes = document
            .entries
            .into_iter()
            .map(|entry| Self::load_entry(entry, &base_dir, &context, engine, ancestors, sources))
            .collect::<Result<Vec<_>>>();
        ancestors.pop();

        Ok(Self {
            path: path.to_path_buf(),
            scope,
            nodes: nodes?.into_iter().flatten().collect(),
        })
    }

    fn load_entry(
        entry: EntryDecl,
        base_dir: &Path,
        context: &VariableContext,
        engine: &dyn TemplateRenderer,
        ancestors: &mut Vec<PathBuf>,
        sources: &mut BTreeSet<PathBuf>,
    ) -> Result<Vec<DefinitionNode>> {
        match entry {
            EntryDecl::Template { source, dest, scope, force } => {
                let scope = Scope::load(scope, base_dir, sources)?;
                Ok(vec![DefinitionNode::Template(TemplateNode { source, dest, scope, force })])
            }
            EntryDecl::Definitions { paths, scope, force } => {
                let scope = Scope::load(scope, base_dir, sources)?;
                let child_context = scope.apply(context, engine)?;
                let mut nodes = Vec::with_capacity(paths.len());
                for child in paths {
                    let child_path = engine
                        .render_path(Path::new(&child), &child_context.to_value())?
                        .resolve_from(base_dir);
                    let tree = Self::load(&child_path, &child_context, engine, ancestors, sources)?;
                    nodes.push(DefinitionNode::Nested(NestedNode {
                        scope: scope.clone(),
                        force,
                        tree,
                    }));
                }
                Ok(nodes)
            }
        }
    }

    /// Flattens the tree into render targets, resolving contexts top-down.
    ///
    /// At every level the local context is the inherited context with the
    /// level's variable layers merged over it. Template entries become
    /// targets carrying their local context; nested definitions recurse with
    /// it as their inherited context. A template entry without its own
    /// `force` flag takes the one of the closest including entry.
    ///
    /// # Arguments
    /// * `inherited` - Context the root definition inherits
    /// * `engine` - Renderer used for templated variables
    ///
    /// # Returns
    /// * `Result<Vec<RenderTarget>>` - Targets in document order
    pub fn resolve_contexts(
        &self,
        inherited: &VariableContext,
        engine: &dyn TemplateRenderer,
    ) -> Result<Vec<RenderTarget>> {
        let mut targets = Vec::new();
        self.resolve_into(inherited, None, engine, &mut targets)?;
        Ok(targets)
    }

    fn resolve_into(
        &self,
        inherited: &VariableContext,
        force: Option<bool>,
        engine: &dyn TemplateRenderer,
        targets: &mut Vec<RenderTarget>,
    ) -> Result<()> {
        let context = self.scope.apply(inherited, engine)?;
        let base_dir = self.path.base_dir();

        for node in &self.nodes {
            match node {
                DefinitionNode::Template(template) => {
                    targets.push(RenderTarget {
                        source: template.source.clone(),
                        dest: template.dest.clone(),
                        base_dir: base_dir.clone(),
                        context: template.scope.apply(&context, engine)?,
                        force: template.force.or(force),
                        definition: self.path.clone(),
                    });
                }
                DefinitionNode::Nested(nested) => {
                    let child_context = nested.scope.apply(&context, engine)?;
                    nested.tree.resolve_into(
                        &child_context,
                        nested.force.or(force),
                        engine,
                        targets,
                    )?;
                }
            }
        }
        Ok(())
    }
}
