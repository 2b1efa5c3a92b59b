//! Definition document schema.
//!
//! A document is either a mapping with `templates` (plus optional `vars` and
//! `include_vars`) or a bare list of entries. Each entry renders one template
//! or includes one or more nested definitions.

use std::path::Path;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_yaml::Value as YamlValue;

use crate::constants::TEMPLATES_KEY;
use crate::context::Vars;
use crate::error::{Error, Result};

/// Value of an `include_vars` key: a single path or a list of paths.
#[derive(Debug, Clone)]
pub enum IncludeVars {
    One(String),
    Many(Vec<String>),
}

impl Default for IncludeVars {
    fn default() -> Self {
        IncludeVars::Many(Vec::new())
    }
}

impl<'de> Deserialize<'de> for IncludeVars {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
        }

        match Repr::deserialize(deserializer) {
            Ok(Repr::One(one)) => Ok(IncludeVars::One(one)),
            Ok(Repr::Many(many)) => Ok(IncludeVars::Many(many)),
            Err(_) => Err(de::Error::custom(
                "Value of 'include_vars' must be of type list or string",
            )),
        }
    }
}

impl IncludeVars {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            IncludeVars::One(one) => vec![one],
            IncludeVars::Many(many) => many,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefinition {
    #[serde(default)]
    include_vars: IncludeVars,
    #[serde(default)]
    vars: Vars,
    templates: Option<Vec<RawEntry>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    src: Option<String>,
    content: Option<String>,
    dest: Option<String>,
    definition: Option<String>,
    definitions: Option<Vec<String>>,
    #[serde(default)]
    include_vars: IncludeVars,
    #[serde(default)]
    vars: Vars,
    force: Option<bool>,
}

/// Variables declared at one level, before any rendering.
#[derive(Debug, Clone, Default)]
pub struct ScopeDecl {
    /// Variable files, in the order they are applied
    pub include_vars: Vec<String>,
    /// Inline variables, applied after the files
    pub vars: Vars,
}

/// Where a template's text comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSource {
    /// Path to a template file, possibly containing template syntax
    File(String),
    /// Template text written directly in the definition
    Inline(String),
}

#[derive(Debug, Clone)]
pub enum EntryDecl {
    Template { source: TemplateSource, dest: String, scope: ScopeDecl, force: Option<bool> },
    Definitions { paths: Vec<String>, scope: ScopeDecl, force: Option<bool> },
}

/// A parsed and validated definition document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub scope: ScopeDecl,
    pub entries: Vec<EntryDecl>,
}

impl Document {
    /// Parses the YAML text of the definition stored at `path`.
    ///
    /// # Arguments
    /// * `text` - Document text, already pre-rendered if it is a template
    /// * `path` - Path of the document, used in error messages
    ///
    /// # Returns
    /// * `Result<Document>` - The validated document or [`Error::ParseError`]
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let invalid = |description: String| Error::ParseError {
            path: path.to_path_buf(),
            description,
        };

        let value: YamlValue = serde_yaml::from_str(text).map_err(|e| invalid(e.to_string()))?;
        let raw = match value {
            YamlValue::Sequence(_) => RawDefinition {
                templates: Some(serde_yaml::from_value(value).map_err(|e| invalid(e.to_string()))?),
                ..Default::default()
            },
            YamlValue::Mapping(_) => {
                serde_yaml::from_value(value).map_err(|e| invalid(e.to_string()))?
            }
            YamlValue::Null => RawDefinition::default(),
            _ => return Err(invalid("Definition must be a mapping or a list".to_string())),
        };

        let Some(templates) = raw.templates else {
            return Err(invalid(format!("Missing '{TEMPLATES_KEY}' definition")));
        };

        let entries = templates
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                entry.validate().map_err(|description| {
                    invalid(format!("{description} (entry #{})", index + 1))
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Document {
            scope: ScopeDecl { include_vars: raw.include_vars.into_vec(), vars: raw.vars },
            entries,
        })
    }
}

impl RawEntry {
    fn validate(self) -> std::result::Result<EntryDecl, String> {
        let scope = ScopeDecl { include_vars: self.include_vars.into_vec(), vars: self.vars };

        let mut paths: Vec<String> = self.definition.into_iter().collect();
        paths.extend(self.definitions.unwrap_or_default());
        let renders = self.src.is_some() || self.content.is_some() || self.dest.is_some();

        if !paths.is_empty() {
            if renders {
                return Err(
                    "An entry cannot both render a template and include definitions".to_string()
                );
            }
            return Ok(EntryDecl::Definitions { paths, scope, force: self.force });
        }

        let source = match (self.src, self.content) {
            (Some(src), None) => TemplateSource::File(src),
            (None, Some(content)) => TemplateSource::Inline(content),
            (Some(_), Some(_)) => {
                return Err("Keys 'src' and 'content' are mutually exclusive".to_string())
            }
            (None, None) => return Err("Missing key 'src' in template definition".to_string()),
        };
        let Some(dest) = self.dest else {
            return Err("Missing key 'dest' in template definition".to_string());
        };

        Ok(EntryDecl::Template { source, dest, scope, force: self.force })
    }
}
