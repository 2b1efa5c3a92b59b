use std::sync::LazyLock;

use log::warn;
use minijinja::value::{Kwargs, Rest};
use minijinja::{Environment, Error, ErrorKind, Value};
use regex::Regex;
use serde::Serialize;

use crate::constants::booleans::{FALSE_WORDS, TRUE_WORDS};
use crate::constants::MANDATORY_ERROR_MARKER;

/// Installs the custom filters into a MiniJinja environment.
///
/// `default` and `d` replace the engine's builtin versions so that empty
/// strings fall back as well.
pub fn register_filters(env: &mut Environment<'_>) {
    env.add_filter("default", default_filter);
    env.add_filter("d", default_filter);
    env.add_filter("mandatory", mandatory);
    env.add_filter("to_yaml", to_yaml);
    env.add_filter("to_nice_yaml", to_nice_yaml);
    env.add_filter("to_json", to_json);
    env.add_filter("to_nice_json", to_nice_json);
    env.add_filter("to_bool", to_bool);
    env.add_filter("regex_escape", regex_escape);
    env.add_filter("regex_findall", regex_findall);
    env.add_filter("regex_replace", regex_replace);
    env.add_filter("regex_search", regex_search);
    env.add_filter("regex_contains", regex_contains);
}

/// Returns `fallback` when `value` is undefined, none or an empty string.
pub fn default_filter(value: Value, fallback: Option<Value>) -> Value {
    let is_empty = value.is_undefined() || value.is_none() || value.as_str() == Some("");
    if is_empty {
        fallback.unwrap_or_else(|| Value::from(""))
    } else {
        value
    }
}

/// Fails the render when `value` is undefined.
///
/// The error carries [`MANDATORY_ERROR_MARKER`] so the renderer can turn it
/// into [`crate::error::Error::MissingVariable`] with the variable name.
pub fn mandatory(value: Value, message: Option<String>) -> Result<Value, Error> {
    if !value.is_undefined() {
        return Ok(value);
    }
    let detail = match message {
        Some(message) if !message.is_empty() => format!("{MANDATORY_ERROR_MARKER}: {message}"),
        _ => MANDATORY_ERROR_MARKER.to_string(),
    };
    Err(Error::new(ErrorKind::UndefinedError, detail))
}

/// Extracts the custom message from an error raised by [`mandatory`].
///
/// Returns `None` when the error did not come from the filter, and
/// `Some(None)` when the filter was used without a message.
pub fn mandatory_message(err: &Error) -> Option<Option<String>> {
    if err.kind() != ErrorKind::UndefinedError {
        return None;
    }
    let rest = err.detail()?.strip_prefix(MANDATORY_ERROR_MARKER)?;
    Some(rest.strip_prefix(": ").map(str::to_string))
}

fn conversion_error<E: std::error::Error + Send + Sync + 'static>(what: &str, e: E) -> Error {
    Error::new(ErrorKind::InvalidOperation, format!("cannot convert value to {what}"))
        .with_source(e)
}

/// Serializes a value as block-style YAML.
pub fn to_yaml(value: Value) -> Result<String, Error> {
    serde_yaml::to_string(&value).map_err(|e| conversion_error("YAML", e))
}

/// Serializes a value as block-style YAML with mapping keys sorted.
pub fn to_nice_yaml(value: Value) -> Result<String, Error> {
    let sorted = sorted_json(&value)?;
    serde_yaml::to_string(&sorted).map_err(|e| conversion_error("YAML", e))
}

/// JSON formatter with `", "` and `": "` separators.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Serializes a value as single-line JSON.
pub fn to_json(value: Value) -> Result<String, Error> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut serializer).map_err(|e| conversion_error("JSON", e))?;
    String::from_utf8(buf).map_err(|e| conversion_error("JSON", e))
}

/// Serializes a value as indented JSON with sorted keys.
pub fn to_nice_json(value: Value, indent: Option<usize>) -> Result<String, Error> {
    let sorted = sorted_json(&value)?;
    let indent = " ".repeat(indent.unwrap_or(4));
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    sorted.serialize(&mut serializer).map_err(|e| conversion_error("JSON", e))?;
    String::from_utf8(buf).map_err(|e| conversion_error("JSON", e))
}

fn sorted_json(value: &Value) -> Result<serde_json::Value, Error> {
    let value = serde_json::to_value(value).map_err(|e| conversion_error("JSON", e))?;
    Ok(sort_keys(value))
}

fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            serde_json::Value::Object(
                entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

/// Interprets a value as a boolean.
///
/// Accepts booleans, numbers and the words `yes/no/on/off/true/false/y/n/t/f`.
/// Anything else yields the `default_value` keyword argument or an error.
pub fn to_bool(value: Value, kwargs: Kwargs) -> Result<bool, Error> {
    let default_value: Option<bool> = kwargs.get("default_value")?;
    kwargs.assert_all_used()?;

    let parsed = if let Some(b) = bool_of(&value) {
        Some(b)
    } else if let Some(s) = value.as_str() {
        let lowered = s.trim().to_lowercase();
        if TRUE_WORDS.contains(&lowered.as_str()) {
            Some(true)
        } else if FALSE_WORDS.contains(&lowered.as_str()) {
            Some(false)
        } else {
            None
        }
    } else {
        None
    };

    parsed.or(default_value).ok_or_else(|| {
        Error::new(ErrorKind::InvalidOperation, format!("cannot interpret '{value}' as a boolean"))
    })
}

fn bool_of(value: &Value) -> Option<bool> {
    match value.kind() {
        minijinja::value::ValueKind::Bool => Some(value.is_true()),
        minijinja::value::ValueKind::Number => i64::try_from(value.clone()).ok().map(|n| n != 0),
        _ => None,
    }
}

fn compile(pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|e| {
        Error::new(ErrorKind::InvalidOperation, format!("invalid regex '{pattern}'")).with_source(e)
    })
}

/// Escapes all regex meta characters in a string.
pub fn regex_escape(value: String) -> String {
    regex::escape(&value)
}

/// Returns all matches of `pattern`; with one capture group, the group contents.
pub fn regex_findall(value: String, pattern: String) -> Result<Value, Error> {
    let re = compile(&pattern)?;
    let groups = re.captures_len() - 1;
    let found: Vec<Value> = re
        .captures_iter(&value)
        .map(|caps| match groups {
            0 => Value::from(caps.get(0).map_or("", |m| m.as_str())),
            1 => Value::from(caps.get(1).map_or("", |m| m.as_str())),
            _ => Value::from(
                (1..=groups)
                    .map(|i| caps.get(i).map_or("", |m| m.as_str()).to_string())
                    .collect::<Vec<_>>(),
            ),
        })
        .collect();
    Ok(Value::from(found))
}

static BACKREFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(\d+)").expect("backreference pattern is valid"));

/// Replaces all matches of `pattern`; `\1` style backreferences are supported.
pub fn regex_replace(value: String, pattern: String, replacement: String) -> Result<String, Error> {
    let re = compile(&pattern)?;
    let replacement = BACKREFERENCE.replace_all(&replacement, "$${${1}}");
    Ok(re.replace_all(&value, replacement.as_ref()).into_owned())
}

/// Returns the first match of `pattern`, or the listed groups of it.
///
/// Groups are given as `'\\1'` or `'\\g<name>'`. Without a match the result
/// is none.
pub fn regex_search(value: String, pattern: String, groups: Rest<String>) -> Result<Value, Error> {
    let re = compile(&pattern)?;
    let Some(caps) = re.captures(&value) else {
        return Ok(Value::from(()));
    };
    if groups.is_empty() {
        return Ok(Value::from(caps.get(0).map_or("", |m| m.as_str())));
    }

    let mut selected = Vec::with_capacity(groups.len());
    for group in groups.iter() {
        let found = if let Some(index) = group.strip_prefix('\\') {
            if let Some(name) = index.strip_prefix("g<").and_then(|n| n.strip_suffix('>')) {
                caps.name(name)
            } else {
                let index: usize = index.parse().map_err(|_| {
                    Error::new(ErrorKind::InvalidOperation, format!("invalid group '{group}'"))
                })?;
                caps.get(index)
            }
        } else {
            return Err(Error::new(ErrorKind::InvalidOperation, format!("invalid group '{group}'")));
        };
        selected.push(found.map_or("", |m| m.as_str()).to_string());
    }
    Ok(Value::from(selected))
}

/// Tests if a string matches a given regular expression pattern.
///
/// An invalid pattern is logged and treated as no match.
pub fn regex_contains(value: &str, re: &str) -> bool {
    match Regex::new(re) {
        Ok(re) => re.is_match(value),
        Err(err) => {
            warn!("Invalid regex '{re}': {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_falls_back_on_undefined_and_empty() {
        let fallback = Some(Value::from("fb"));
        assert_eq!(default_filter(Value::UNDEFINED, fallback.clone()), Value::from("fb"));
        assert_eq!(default_filter(Value::from(()), fallback.clone()), Value::from("fb"));
        assert_eq!(default_filter(Value::from(""), fallback.clone()), Value::from("fb"));
        assert_eq!(default_filter(Value::UNDEFINED, None), Value::from(""));
    }

    #[test]
    fn default_filter_keeps_defined_scalars() {
        let fallback = Some(Value::from("fb"));
        for value in [Value::from("x"), Value::from(0), Value::from(false), Value::from(1.5)] {
            assert_eq!(default_filter(value.clone(), fallback.clone()), value);
        }
    }

    #[test]
    fn mandatory_passes_defined_values_through() {
        assert_eq!(mandatory(Value::from(""), None).unwrap(), Value::from(""));
        assert_eq!(mandatory(Value::from(3), None).unwrap(), Value::from(3));
    }

    #[test]
    fn mandatory_error_round_trips_its_message() {
        let err = mandatory(Value::UNDEFINED, None).unwrap_err();
        assert_eq!(mandatory_message(&err), Some(None));

        let err = mandatory(Value::UNDEFINED, Some("set it".into())).unwrap_err();
        assert_eq!(mandatory_message(&err), Some(Some("set it".to_string())));

        let other = Error::new(ErrorKind::UndefinedError, "something else");
        assert_eq!(mandatory_message(&other), None);
    }

    #[test]
    fn test_regex_contains_matches() {
        assert!(regex_contains("foobar", "^foo[bB]ar$"));
        assert!(!regex_contains("foobar", "barfoo"));
    }

    #[test]
    fn test_regex_contains_invalid_regex() {
        assert!(!regex_contains("anything", r"([unclosed"));
    }

    #[test]
    fn regex_replace_supports_backreferences() {
        assert_eq!(
            regex_replace("foobar".into(), "^foo".into(), "Cocktail".into()).unwrap(),
            "Cocktailbar"
        );
        assert_eq!(
            regex_replace("key=value".into(), r"(\w+)=(\w+)".into(), r"\2=\1".into()).unwrap(),
            "value=key"
        );
    }
}
