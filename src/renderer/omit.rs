//! The `omit` placeholder.
//!
//! Templates write `{{ some_var | default(omit) }}` to drop a key when the
//! variable is not set. The placeholder is a random string per renderer, so
//! it cannot collide with real content. After rendering, any YAML mapping
//! entry or sequence item that contains it is removed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_yaml::Value as YamlValue;
use sha2::{Digest, Sha256};

use crate::constants::OMIT_PLACEHOLDER_PREFIX;
use crate::error::Result;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Creates a new unique placeholder string.
pub fn new_placeholder() -> String {
    let sequence = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(sequence.to_le_bytes());
    format!("{OMIT_PLACEHOLDER_PREFIX}{}", hex::encode(hasher.finalize()))
}

/// Removes every value containing `placeholder` from a rendered YAML document.
///
/// Text that does not contain the placeholder is returned unchanged, so
/// non-YAML outputs are only parsed when they actually use `omit`.
///
/// # Arguments
/// * `rendered` - Rendered template output
/// * `placeholder` - The renderer's omit placeholder
///
/// # Returns
/// * `Result<String>` - The cleaned document, re-serialized when it was modified
pub fn strip_omitted(rendered: &str, placeholder: &str) -> Result<String> {
    if !rendered.contains(placeholder) {
        return Ok(rendered.to_string());
    }
    let mut document: YamlValue = serde_yaml::from_str(rendered)?;
    if is_omitted(&document, placeholder) {
        return Ok(String::new());
    }
    remove_omitted(&mut document, placeholder);
    Ok(serde_yaml::to_string(&document)?)
}

fn is_omitted(value: &YamlValue, placeholder: &str) -> bool {
    matches!(value, YamlValue::String(s) if s.contains(placeholder))
}

fn remove_omitted(value: &mut YamlValue, placeholder: &str) {
    match value {
        YamlValue::Mapping(mapping) => {
            mapping.retain(|_, v| !is_omitted(v, placeholder));
            for v in mapping.values_mut() {
                remove_omitted(v, placeholder);
            }
        }
        YamlValue::Sequence(items) => {
            items.retain(|v| !is_omitted(v, placeholder));
            for v in items.iter_mut() {
                remove_omitted(v, placeholder);
            }
        }
        YamlValue::Tagged(tagged) => remove_omitted(&mut tagged.value, placeholder),
        _ => {}
    }
}
