use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::document::TemplateSource;
use crate::context::VariableContext;
use crate::error::{Error, Result};
use crate::ext::PathExt;
use crate::renderer::TemplateRenderer;

/// One template to render into one destination.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    pub source: TemplateSource,
    /// Destination path, possibly containing template syntax
    pub dest: String,
    /// Directory of the declaring definition; relative paths resolve against it
    pub base_dir: PathBuf,
    pub context: VariableContext,
    /// Overwrite policy set on the entry or inherited from an including entry
    pub force: Option<bool>,
    /// Definition that declared the target
    pub definition: PathBuf,
}

impl RenderTarget {
    /// Renders the destination path with the target context.
    ///
    /// # Returns
    /// * `Result<PathBuf>` - The destination, resolved against the definition directory
    pub fn destination(&self, engine: &dyn TemplateRenderer) -> Result<PathBuf> {
        let rendered = engine.render_path(Path::new(&self.dest), &self.context.to_value())?;
        if rendered.as_os_str().is_empty() {
            return Err(Error::DestinationWrite {
                path: PathBuf::from(&self.dest),
                description: "Destination renders to an empty path".to_string(),
            });
        }
        Ok(rendered.resolve_from(&self.base_dir))
    }

    /// Renders the path of the template file, `None` for inline templates.
    pub fn template_path(&self, engine: &dyn TemplateRenderer) -> Result<Option<PathBuf>> {
        match &self.source {
            TemplateSource::File(src) => {
                let rendered = engine.render_path(Path::new(src), &self.context.to_value())?;
                Ok(Some(rendered.resolve_from(&self.base_dir)))
            }
            TemplateSource::Inline(_) => Ok(None),
        }
    }

    /// Reads the template text.
    ///
    /// # Arguments
    /// * `path` - Template file path from [`RenderTarget::template_path`]
    ///
    /// # Returns
    /// * `Result<String>` - The template text, or [`Error::TemplateSourceError`]
    pub fn read_template(&self, path: Option<&Path>) -> Result<String> {
        let path = match (&self.source, path) {
            (TemplateSource::Inline(content), _) => return Ok(content.clone()),
            (TemplateSource::File(_), Some(path)) => path,
            (TemplateSource::File(src), None) => {
                return Err(Error::TemplateSourceError {
                    path: PathBuf::from(src),
                    description: "Template path was not resolved".to_string(),
                })
            }
        };

        let unreadable = |description: &str| Error::TemplateSourceError {
            path: path.to_path_buf(),
            description: description.to_string(),
        };
        if !path.exists() {
            return Err(unreadable("File does not exist"));
        }
        if !path.is_file() {
            return Err(unreadable("Is not a file"));
        }
        fs::read_to_string(path).map_err(|e| unreadable(&e.to_string()))
    }

    /// Whether an existing destination may be replaced.
    pub fn allows_overwrite(&self, force_overwrite: bool) -> bool {
        force_overwrite || self.force.unwrap_or(false)
    }
}

impl fmt::Display for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            TemplateSource::File(src) => write!(f, "{src} -> {}", self.dest),
            TemplateSource::Inline(_) => write!(f, "<inline> -> {}", self.dest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::MiniJinjaRenderer;
    use serde_json::json;
    use tempfile::TempDir;

    fn target(source: TemplateSource, dest: &str, base_dir: &Path) -> RenderTarget {
        let serde_json::Value::Object(vars) = json!({"service": "web", "empty": ""}) else {
            unreachable!()
        };
        RenderTarget {
            source,
            dest: dest.to_string(),
            base_dir: base_dir.to_path_buf(),
            context: VariableContext::from(vars),
            force: None,
            definition: base_dir.join("def.yml"),
        }
    }

    #[test]
    fn destination_is_rendered_and_resolved() {
        let engine = MiniJinjaRenderer::new();
        let t = target(TemplateSource::Inline(String::new()), "out/{{ service }}.yml", Path::new("defs"));
        assert_eq!(t.destination(&engine).unwrap(), PathBuf::from("defs/out/web.yml"));

        let t = target(TemplateSource::Inline(String::new()), "/abs/{{ service }}.yml", Path::new("defs"));
        assert_eq!(t.destination(&engine).unwrap(), PathBuf::from("/abs/web.yml"));

        let t = target(TemplateSource::Inline(String::new()), "{{ empty }}", Path::new("defs"));
        assert!(matches!(t.destination(&engine).unwrap_err(), Error::DestinationWrite { .. }));

        let t = target(TemplateSource::Inline(String::new()), "{{ missing }}.yml", Path::new("defs"));
        assert!(matches!(t.destination(&engine).unwrap_err(), Error::TemplateError(_)));
    }

    #[test]
    fn reads_inline_and_file_templates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("web.j2"), "image: {{ service }}").unwrap();
        let engine = MiniJinjaRenderer::new();

        let inline = target(TemplateSource::Inline("text".into()), "x", dir.path());
        assert_eq!(inline.template_path(&engine).unwrap(), None);
        assert_eq!(inline.read_template(None).unwrap(), "text");

        let file = target(TemplateSource::File("{{ service }}.j2".into()), "x", dir.path());
        let path = file.template_path(&engine).unwrap();
        assert_eq!(path, Some(dir.path().join("web.j2")));
        assert_eq!(file.read_template(path.as_deref()).unwrap(), "image: {{ service }}");

        let missing = target(TemplateSource::File("gone.j2".into()), "x", dir.path());
        let path = missing.template_path(&engine).unwrap();
        assert!(matches!(
            missing.read_template(path.as_deref()).unwrap_err(),
            Error::TemplateSourceError { .. }
        ));
    }

    #[test]
    fn overwrite_policy() {
        let mut t = target(TemplateSource::Inline(String::new()), "x", Path::new("."));
        assert!(!t.allows_overwrite(false));
        assert!(t.allows_overwrite(true));
        t.force = Some(true);
        assert!(t.allows_overwrite(false));
        t.force = Some(false);
        assert!(t.allows_overwrite(true));
    }
}
