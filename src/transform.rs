use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::Value;

use crate::error::TransformError;
use crate::paths::CanonicalPath;

/// Rewrites a file's text into evaluator source before evaluation, selected by file extension.
pub trait SourceTransform: Send + Sync {
    fn transform(&self, path: &CanonicalPath, source: String) -> Result<String, TransformError>;
}

#[derive(Clone, Default)]
pub struct SourceTransforms {
    by_extension: HashMap<String, Arc<dyn SourceTransform>>,
}

impl SourceTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json_data() -> Self {
        let mut transforms = Self::new();
        transforms.register("json", JsonDataTransform);
        transforms
    }

    pub fn register(&mut self, extension: &str, transform: impl SourceTransform + 'static) {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        self.by_extension.insert(key, Arc::new(transform));
    }

    pub fn handles(&self, extension: &str) -> bool {
        self.by_extension.contains_key(&extension.to_ascii_lowercase())
    }

    pub fn apply(&self, path: &CanonicalPath, source: String) -> Result<String, TransformError> {
        let transform = path
            .extension()
            .map(str::to_ascii_lowercase)
            .and_then(|ext| self.by_extension.get(&ext));
        match transform {
            Some(transform) => transform.transform(path, source),
            None => Ok(source),
        }
    }
}

/// Compiles a JSON document into the equivalent rhai literal, so data files load as maps.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDataTransform;

impl SourceTransform for JsonDataTransform {
    fn transform(&self, _path: &CanonicalPath, source: String) -> Result<String, TransformError> {
        let value: Value =
            serde_json::from_str(&source).map_err(|err| TransformError::Json(err.to_string()))?;
        let mut out = String::with_capacity(source.len() + 16);
        write_literal(&mut out, &value);
        Ok(out)
    }
}

fn write_literal(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("()"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                let _ = write!(out, "{int}");
            } else {
                out.push_str(&float_literal(number.as_f64().unwrap_or_default()));
            }
        }
        Value::String(text) => write_string(out, text),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                write_literal(out, item);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            out.push_str("#{");
            for (idx, (key, item)) in fields.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_literal(out, item);
            }
            out.push('}');
        }
    }
}

fn float_literal(value: f64) -> String {
    let text = format!("{value:?}");
    if text.contains('.') {
        return text;
    }
    match text.find('e') {
        Some(idx) => format!("{}.0{}", &text[..idx], &text[idx..]),
        None => format!("{text}.0"),
    }
}

fn write_string(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
