//! Variable contexts and their merge rules.
//!
//! A [`VariableContext`] is the ordered mapping of variable names to values
//! visible to a template. Contexts are never mutated in place once handed to
//! a render call: every scope builds a new context from its parent with
//! [`VariableContext::merged`] or [`VariableContext::with_layer`].

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::constants::booleans::{FALSE_WORDS, TRUE_WORDS};
use crate::error::Result;
use crate::renderer::TemplateRenderer;

/// A block of variables as written in a definition or variables file.
pub type Vars = IndexMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableContext {
    vars: Map<String, Value>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// The context as a JSON object, ready to be passed to a renderer.
    pub fn to_value(&self) -> Value {
        Value::Object(self.vars.clone())
    }

    /// Returns a new context with `overlay` deep-merged over `self`.
    pub fn merged(&self, overlay: &VariableContext) -> VariableContext {
        match merge(&self.to_value(), &overlay.to_value()) {
            Value::Object(vars) => VariableContext { vars },
            _ => unreachable!("merging two objects always yields an object"),
        }
    }

    /// Returns a new context with a variable block merged over `self`.
    ///
    /// Keys are processed in order and every string value is rendered against
    /// the context accumulated so far, so a block may reference inherited
    /// variables as well as its own earlier keys. Values that render to the
    /// renderer's omit placeholder are dropped.
    ///
    /// # Arguments
    /// * `layer` - Variable block to apply
    /// * `engine` - Renderer used for templated values
    ///
    /// # Returns
    /// * `Result<VariableContext>` - The extended context
    pub fn with_layer(&self, layer: &Vars, engine: &dyn TemplateRenderer) -> Result<Self> {
        let mut context = self.clone();
        for (key, value) in layer {
            let rendered = render_value(value, &context, engine)?;
            if let Some(rendered) = rendered {
                let mut single = Map::new();
                single.insert(key.clone(), rendered);
                context = context.merged(&VariableContext { vars: single });
            }
        }
        Ok(context)
    }
}

impl From<Map<String, Value>> for VariableContext {
    fn from(vars: Map<String, Value>) -> Self {
        Self { vars }
    }
}

impl From<Vars> for VariableContext {
    fn from(vars: Vars) -> Self {
        Self { vars: vars.into_iter().collect() }
    }
}

/// Deep-merges `overlay` over `base` and returns the result.
///
/// Mappings present on both sides are merged recursively. Any other overlay
/// value (scalar or sequence) replaces the base value entirely; sequences are
/// never concatenated. Neither input is modified.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use templer::context::merge;
///
/// let base = json!({"db": {"host": "localhost", "port": 5432}, "tags": ["a"]});
/// let overlay = json!({"db": {"host": "db"}, "tags": ["b"]});
/// assert_eq!(
///     merge(&base, &overlay),
///     json!({"db": {"host": "db", "port": 5432}, "tags": ["b"]})
/// );
/// ```
pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let value = match merged.get(key) {
                    Some(existing @ Value::Object(_)) if value.is_object() => {
                        merge(existing, value)
                    }
                    _ => value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Converts a rendered string into the value it spells.
///
/// Numbers, booleans and inline YAML/JSON sequences or mappings become typed
/// values; the words in [`TRUE_WORDS`] and [`FALSE_WORDS`] become booleans.
/// Everything else is kept as the original string.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use templer::context::evaluate_string;
///
/// assert_eq!(evaluate_string(" 99 "), json!(99));
/// assert_eq!(evaluate_string("yes"), json!(true));
/// assert_eq!(evaluate_string("[1, 2]"), json!([1, 2]));
/// assert_eq!(evaluate_string("image: nginx"), json!("image: nginx"));
/// ```
pub fn evaluate_string(value: &str) -> Value {
    let trimmed = value.trim();
    if let Ok(parsed) = serde_yaml::from_str::<Value>(trimmed) {
        match parsed {
            Value::Number(_) | Value::Bool(_) => return parsed,
            Value::Array(_) if trimmed.starts_with('[') => return parsed,
            Value::Object(_) if trimmed.starts_with('{') => return parsed,
            _ => {}
        }
    }
    let lowered = trimmed.to_lowercase();
    if TRUE_WORDS.contains(&lowered.as_str()) {
        return Value::Bool(true);
    }
    if FALSE_WORDS.contains(&lowered.as_str()) {
        return Value::Bool(false);
    }
    Value::String(value.to_string())
}

/// Renders one variable value; `None` means the value was omitted.
fn render_value(
    value: &Value,
    context: &VariableContext,
    engine: &dyn TemplateRenderer,
) -> Result<Option<Value>> {
    match value {
        Value::String(source) => {
            let rendered = engine.render(source, &context.to_value(), None)?;
            if rendered == *source {
                Ok(Some(value.clone()))
            } else if rendered.contains(engine.omit_placeholder()) {
                Ok(None)
            } else {
                Ok(Some(evaluate_string(&rendered)))
            }
        }
        Value::Array(items) => {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items {
                if let Some(item) = render_value(item, context, engine)? {
                    rendered.push(item);
                }
            }
            Ok(Some(Value::Array(rendered)))
        }
        Value::Object(entries) => {
            let mut rendered = Map::new();
            for (key, item) in entries {
                if let Some(item) = render_value(item, context, engine)? {
                    rendered.insert(key.clone(), item);
                }
            }
            Ok(Some(Value::Object(rendered)))
        }
        other => Ok(Some(other.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::MiniJinjaRenderer;
    use serde_json::json;

    fn sample_context() -> VariableContext {
        let Value::Object(vars) = json!({
            "a": "foo",
            "b": 123.456,
            "c": true,
            "d": {"x": 1, "y": 2, "z": 3},
            "e": ["my", "very", "own", "context"]
        }) else {
            unreachable!()
        };
        VariableContext::from(vars)
    }

    #[test]
    fn merge_overrides_and_extends_nested_mappings() {
        let base = sample_context().to_value();
        let overlay = json!({"a": "bar", "d": {"x": 0.99, "zz": {}}, "e": ["new", "list"]});
        assert_eq!(
            merge(&base, &overlay),
            json!({
                "a": "bar",
                "b": 123.456,
                "c": true,
                "d": {"x": 0.99, "y": 2, "z": 3, "zz": {}},
                "e": ["new", "list"]
            })
        );
    }

    #[test]
    fn merge_does_not_mutate_inputs() {
        let base = json!({"a": {"b": 1}});
        let overlay = json!({"a": {"c": 2}});
        let _ = merge(&base, &overlay);
        assert_eq!(base, json!({"a": {"b": 1}}));
        assert_eq!(overlay, json!({"a": {"c": 2}}));
    }

    #[test]
    fn merge_is_associative_for_mappings() {
        let a = json!({"svc": {"env": {"A": 1, "B": 1}, "ports": [80]}, "name": "a"});
        let b = json!({"svc": {"env": {"B": 2, "C": 2}}, "name": "b"});
        let c = json!({"svc": {"env": {"C": 3}, "ports": [443]}, "extra": {"k": "v"}});

        let left = merge(&merge(&a, &b), &c);
        let right = merge(&a, &merge(&b, &c));
        assert_eq!(left, right);
        assert_eq!(left["svc"]["env"], json!({"A": 1, "B": 2, "C": 3}));
        assert_eq!(left["svc"]["ports"], json!([443]));
    }

    #[test]
    fn scalar_and_sequence_overlay_always_win() {
        assert_eq!(merge(&json!({"k": {"x": 1}}), &json!({"k": 5})), json!({"k": 5}));
        assert_eq!(merge(&json!({"k": [1, 2]}), &json!({"k": [3]})), json!({"k": [3]}));
        assert_eq!(merge(&json!({"k": "s"}), &json!({"k": {"x": 1}})), json!({"k": {"x": 1}}));
    }

    #[test]
    fn merge_keeps_key_order() {
        let merged = merge(&json!({"z": 1, "a": 2}), &json!({"m": 3, "z": 4}));
        let keys: Vec<_> = merged.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn evaluate_string_types() {
        assert_eq!(evaluate_string(" abc "), json!(" abc "));
        assert_eq!(evaluate_string(" n "), json!(false));
        assert_eq!(evaluate_string(" yes "), json!(true));
        assert_eq!(evaluate_string(" True "), json!(true));
        assert_eq!(evaluate_string(" 99 "), json!(99));
        assert_eq!(evaluate_string(" 1.2 "), json!(1.2));
        assert_eq!(evaluate_string(" [1,2,3] "), json!([1, 2, 3]));
        assert_eq!(evaluate_string(r#" {"a": 1} "#), json!({"a": 1}));
        assert_eq!(evaluate_string("db:5432"), json!("db:5432"));
    }

    #[test]
    fn with_layer_renders_values_against_accumulated_context() {
        let engine = MiniJinjaRenderer::new();
        let layer: Vars = serde_json::from_value(json!({
            "a": "{{ e[0] }}",
            "c": "{{ 2 == 1 }}",
            "f": "{{ \"1.2\" }}",
            "g": "{{ a }}-suffix"
        }))
        .unwrap();

        let context = sample_context().with_layer(&layer, &engine).unwrap();
        assert_eq!(context.get("a"), Some(&json!("my")));
        assert_eq!(context.get("b"), Some(&json!(123.456)));
        assert_eq!(context.get("c"), Some(&json!(false)));
        assert_eq!(context.get("f"), Some(&json!(1.2)));
        assert_eq!(context.get("g"), Some(&json!("my-suffix")));
        assert_eq!(context.get("d"), Some(&json!({"x": 1, "y": 2, "z": 3})));
    }

    #[test]
    fn with_layer_drops_omitted_values() {
        let engine = MiniJinjaRenderer::new();
        let layer: Vars = serde_json::from_value(json!({
            "kept": "value",
            "dropped": "{{ omit }}",
            "nested": {"x": 1, "y": "{{ undefined_thing | default(omit) }}"},
            "list": [1, "{{ omit }}", 3]
        }))
        .unwrap();

        let context = VariableContext::new().with_layer(&layer, &engine).unwrap();
        assert_eq!(context.get("kept"), Some(&json!("value")));
        assert_eq!(context.get("dropped"), None);
        assert_eq!(context.get("nested"), Some(&json!({"x": 1})));
        assert_eq!(context.get("list"), Some(&json!([1, 3])));
    }

    #[test]
    fn with_layer_deep_merges_over_parent() {
        let engine = MiniJinjaRenderer::new();
        let layer: Vars = serde_json::from_value(json!({"d": {"x": 10}})).unwrap();
        let context = sample_context().with_layer(&layer, &engine).unwrap();
        assert_eq!(context.get("d"), Some(&json!({"x": 10, "y": 2, "z": 3})));
    }
}
