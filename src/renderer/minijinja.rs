use super::filters::{mandatory_message, register_filters};
use super::omit::new_placeholder;
use crate::{
    constants::{INLINE_TEMPLATE_NAME, OMIT_VARIABLE},
    error::{Error, Result},
    ext::PathExt,
    renderer::interface::TemplateRenderer,
};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use regex::Regex;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Expressions piped into the `mandatory` filter, e.g. `db.password | mandatory`.
static MANDATORY_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"([A-Za-z_][A-Za-z0-9_]*(?:\s*(?:\.[A-Za-z_][A-Za-z0-9_]*|\[[^\]|]*\]))*)\s*\|\s*mandatory\b"#,
    )
    .expect("mandatory expression pattern is valid")
});

/// MiniJinja-based template rendering engine.
///
/// Undefined variables are strict: printing, iterating or testing one fails
/// the render. Block tags strip their surrounding whitespace the way Jinja's
/// `trim_blocks` and `lstrip_blocks` do.
pub struct MiniJinjaRenderer {
    /// MiniJinja environment instance
    env: Environment<'static>,
    /// Value bound to `omit` in every render context
    omit_placeholder: String,
}

impl MiniJinjaRenderer {
    /// Creates a new MiniJinjaRenderer with the custom filter registry installed.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        register_filters(&mut env);

        Self { env, omit_placeholder: new_placeholder() }
    }

    /// Adds `omit` to an object context unless the caller already defined it.
    fn with_omit(&self, context: &serde_json::Value) -> serde_json::Value {
        match context.as_object() {
            Some(context_obj) => {
                let mut result = context_obj.clone();
                result
                    .entry(OMIT_VARIABLE)
                    .or_insert_with(|| json!(self.omit_placeholder.as_str()));
                serde_json::Value::Object(result)
            }
            // If the context isn't an object, just use the provided context
            None => context.clone(),
        }
    }

    /// Internal helper to render templates with the omit variable in scope
    fn render_internal(
        &self,
        template: &str,
        context: &serde_json::Value,
        template_name: Option<&str>,
    ) -> Result<String> {
        let mut env = self.env.clone();
        let name = template_name.unwrap_or(INLINE_TEMPLATE_NAME);
        env.add_template(name, template)?;

        let context = self.with_omit(context);
        let tmpl = env.get_template(name)?;
        tmpl.render(&context).map_err(|e| self.map_render_error(e, template, &context))
    }

    /// Turns errors raised by the `mandatory` filter into [`Error::MissingVariable`].
    fn map_render_error(
        &self,
        err: minijinja::Error,
        template: &str,
        context: &serde_json::Value,
    ) -> Error {
        match mandatory_message(&err) {
            Some(message) => Error::MissingVariable {
                variable: self
                    .find_failed_mandatory(&err, template, context)
                    .unwrap_or_else(|| "<unknown>".to_string()),
                message,
            },
            None => Error::TemplateError(err),
        }
    }

    /// Finds the expression whose `mandatory` filter raised `err`.
    ///
    /// The error span covers the filter call, so the expression piped into
    /// it is the one ending there. Without a span only the error's line is
    /// searched for an expression that is undefined in `context`.
    fn find_failed_mandatory(
        &self,
        err: &minijinja::Error,
        template: &str,
        context: &serde_json::Value,
    ) -> Option<String> {
        let mut candidates = MANDATORY_EXPRESSION.captures_iter(template).filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), caps.get(1)?.as_str().trim()))
        });

        if let Some(span) = err.range() {
            return candidates
                .find(|(_, end, _)| span.start < *end && *end <= span.end)
                .map(|(_, _, expr)| expr.to_string());
        }

        let line = err.line()?;
        candidates
            .filter(|(start, _, _)| template[..*start].matches('\n').count() + 1 == line)
            .find(|(_, _, expr)| match self.env.compile_expression_owned(expr.to_string()) {
                Ok(compiled) => compiled.eval(context).map_or(true, |v| v.is_undefined()),
                Err(_) => false,
            })
            .map(|(_, _, expr)| expr.to_string())
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render(
        &self,
        template: &str,
        context: &serde_json::Value,
        template_name: Option<&str>,
    ) -> Result<String> {
        self.render_internal(template, context, template_name)
    }

    fn render_path(
        &self,
        template_path: &Path,
        context: &serde_json::Value,
    ) -> Result<PathBuf> {
        let path_str = template_path.to_str_checked()?;
        let rendered = self.render_internal(path_str, context, None)?;
        Ok(PathBuf::from(rendered))
    }

    fn omit_placeholder(&self) -> &str {
        &self.omit_placeholder
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::renderer::{interface::TemplateRenderer, MiniJinjaRenderer};
    use serde_json::json;
    use std::path::{Path, PathBuf};

    fn sample_context() -> serde_json::Value {
        json!({
            "a": "foo",
            "b": 123.456,
            "c": true,
            "d": {"x": 1, "y": 2, "z": 3},
            "e": ["my", "very", "own", "context"]
        })
    }

    fn test_template(template: &str, expected: &str) {
        let renderer = MiniJinjaRenderer::new();
        let result = renderer.render(template, &sample_context(), None).unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_render_string() {
        test_template("Lorem ipsum dolor sit amet, ...   ", "Lorem ipsum dolor sit amet, ...   ");
        test_template("The height of {{ a }} is {{ d.x + d.y }}", "The height of foo is 3");
    }

    #[test]
    fn test_undefined_variable_is_a_template_error() {
        let renderer = MiniJinjaRenderer::new();
        let err = renderer.render("{{ a }}", &json!({}), None).unwrap_err();
        assert!(matches!(err, Error::TemplateError(_)), "unexpected error: {err}");
    }

    #[test]
    fn test_syntax_error_is_a_template_error() {
        let renderer = MiniJinjaRenderer::new();
        let err = renderer.render("{{ bar", &sample_context(), None).unwrap_err();
        assert!(matches!(err, Error::TemplateError(_)), "unexpected error: {err}");
    }

    #[test]
    fn test_mandatory_names_the_undefined_variable() {
        let renderer = MiniJinjaRenderer::new();
        let template = "dir: {{ a | mandatory }}/{{ base_volume_dir | mandatory }}";
        let err = renderer.render(template, &sample_context(), None).unwrap_err();
        match err {
            Error::MissingVariable { variable, message } => {
                assert_eq!(variable, "base_volume_dir");
                assert_eq!(message, None);
            }
            other => panic!("expected MissingVariable, got {other}"),
        }

        let mut context = sample_context();
        context["base_volume_dir"] = json!("/srv");
        assert_eq!(renderer.render(template, &context, None).unwrap(), "dir: foo//srv");
    }

    #[test]
    fn test_mandatory_nested_attribute_and_message() {
        let renderer = MiniJinjaRenderer::new();
        let template = "{{ db.password | mandatory('db.password must be set') }}";
        let err = renderer.render(template, &json!({"db": {"user": "u"}}), None).unwrap_err();
        match err {
            Error::MissingVariable { variable, message } => {
                assert_eq!(variable, "db.password");
                assert_eq!(message.as_deref(), Some("db.password must be set"));
            }
            other => panic!("expected MissingVariable, got {other}"),
        }
    }

    #[test]
    fn test_mandatory_names_the_loop_attribute_that_failed() {
        let renderer = MiniJinjaRenderer::new();
        let template =
            "{% for s in services %}{{ s.name | mandatory }}:{{ s.volume | mandatory }}{% endfor %}";
        let err = renderer
            .render(template, &json!({"services": [{"name": "web"}]}), None)
            .unwrap_err();
        assert!(
            matches!(err, Error::MissingVariable { ref variable, .. } if variable == "s.volume"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_mandatory_ignores_branches_that_did_not_run() {
        let renderer = MiniJinjaRenderer::new();
        let template = "{% if false %}{{ a | mandatory }}{% endif %}\n{{ b | mandatory }}";
        let err = renderer.render(template, &json!({}), None).unwrap_err();
        assert!(
            matches!(err, Error::MissingVariable { ref variable, .. } if variable == "b"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_default_filter() {
        test_template("{{ missing | default('fb') }}", "fb");
        test_template("{{ '' | default('fb') }}", "fb");
        test_template("{{ a | default('fb') }}", "foo");
        test_template("{{ missing | d('short') }}", "short");
        test_template("{{ d.x | default(0) }}", "1");
    }

    #[test]
    fn test_omit_is_in_scope() {
        let renderer = MiniJinjaRenderer::new();
        let rendered = renderer.render("{{ omit }}", &json!({}), None).unwrap();
        assert_eq!(rendered, renderer.omit_placeholder());
        let rendered = renderer.render("{{ missing | default(omit) }}", &json!({}), None).unwrap();
        assert_eq!(rendered, renderer.omit_placeholder());
    }

    #[test]
    fn test_regex_filters() {
        test_template(r"{{ '[foo](bar)' | regex_escape }}", r"\[foo\]\(bar\)");
        test_template(
            "{{ 'Lorem ipsum dolor sit amet' | regex_findall('[ae]m') | join(',') }}",
            "em,am",
        );
        test_template("{{ 'foobar' | regex_replace('^foo', 'Cocktail') }}", "Cocktailbar");
        test_template(r"{{ 'Lorem ipsum dolor sit amet' | regex_search('ip(\\S+)') }}", "ipsum");
        test_template(
            r"{{ 'Lorem ipsum dolor sit amet' | regex_search('ip(\\S+)', '\\1') | first }}",
            "sum",
        );
        test_template("{{ 'foobar' | regex_contains('^foo[bB]ar$') }}", "true");
        test_template("{{ 'foobar' | regex_contains('barfoo') }}", "false");
    }

    #[test]
    fn test_to_bool_filter() {
        test_template("{{ 'yes' | to_bool }}", "true");
        test_template("{{ 'xyz' | to_bool(default_value=false) }}", "false");
        let renderer = MiniJinjaRenderer::new();
        assert!(renderer.render("{{ 'xyz' | to_bool }}", &json!({}), None).is_err());
    }

    #[test]
    fn test_serialization_filters() {
        let renderer = MiniJinjaRenderer::new();
        let context = json!({"c": sample_context()});

        assert_eq!(
            renderer.render("{{ c | to_json }}", &context, None).unwrap(),
            r#"{"a": "foo", "b": 123.456, "c": true, "d": {"x": 1, "y": 2, "z": 3}, "e": ["my", "very", "own", "context"]}"#
        );
        assert_eq!(
            renderer.render("{{ c | to_yaml }}", &context, None).unwrap(),
            "a: foo\nb: 123.456\nc: true\nd:\n  x: 1\n  y: 2\n  z: 3\ne:\n- my\n- very\n- own\n- context\n"
        );
        assert_eq!(
            renderer.render("{{ {'b': 1, 'a': [1, 2]} | to_nice_json }}", &json!({}), None).unwrap(),
            "{\n    \"a\": [\n        1,\n        2\n    ],\n    \"b\": 1\n}"
        );
    }

    #[test]
    fn test_trim_and_lstrip_blocks() {
        let template = "services:\n  {% for s in e %}\n  {{ s }}: {}\n  {% endfor %}\n";
        test_template(template, "services:\n  my: {}\n  very: {}\n  own: {}\n  context: {}\n");
    }

    #[test]
    fn render_path_renders_variables() {
        let renderer = MiniJinjaRenderer::new();
        let rendered = renderer
            .render_path(
                Path::new("stacks/{{ service }}/docker-compose.yml"),
                &json!({ "service": "demo" }),
            )
            .unwrap();
        assert_eq!(rendered, PathBuf::from("stacks/demo/docker-compose.yml"));
    }
}
