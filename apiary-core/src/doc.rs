//! Documentation accumulated by view decorators.
//!
//! Every decorator on a [`View`](crate::view::View) clones the view's
//! [`DocInfo`] and extends the clone, so a view decorated twice never sees
//! the fragments of the other decoration. The records stored here are turned
//! into OpenAPI operations when a blueprint is registered on an API.

use http::StatusCode;
use serde_json::{Map, Value};

use crate::arguments::Location;
use crate::error::status_name;
use crate::pagination::PaginateOptions;
use crate::schema::SchemaRef;

/// Recursively merge `update` into `original`.
///
/// Objects merge key by key. Any other value in `update` replaces the one in
/// `original`.
pub fn deep_update(original: &mut Value, update: Value) {
    match (original, update) {
        (Value::Object(target), Value::Object(source)) => deep_update_map(target, source),
        (target, source) => *target = source,
    }
}

/// [`deep_update`] on two JSON objects.
pub fn deep_update_map(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match target.get_mut(&key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                deep_update(existing, value)
            }
            _ => {
                target.insert(key, value);
            }
        }
    }
}

// ── Docstrings ─────────────────────────────────────────────

/// Summary and description extracted from a view's documentation text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Docstring {
    pub summary: Option<String>,
    pub description: Option<String>,
}

impl Docstring {
    /// Parse documentation text.
    ///
    /// Text after the first line starting with `---` is ignored. The summary
    /// is the first paragraph, the description everything after the first
    /// blank line.
    ///
    /// ```
    /// use apiary_core::doc::Docstring;
    ///
    /// let doc = Docstring::parse("List items\n\n    Paginated.\n---\ninternal");
    /// assert_eq!(doc.summary.as_deref(), Some("List items"));
    /// assert_eq!(doc.description.as_deref(), Some("Paginated."));
    /// ```
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text
            .lines()
            .take_while(|line| !line.trim_start().starts_with("---"))
            .collect();
        let split = lines.iter().position(|line| line.trim().is_empty());
        let (summary, description) = match split {
            Some(index) => (&lines[..index], &lines[index + 1..]),
            None => (&lines[..], &[][..]),
        };
        Self {
            summary: non_empty(dedent(summary)),
            description: non_empty(dedent(description)),
        }
    }

    /// The `summary` / `description` keys of an operation.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(ref summary) = self.summary {
            map.insert("summary".into(), Value::String(summary.clone()));
        }
        if let Some(ref description) = self.description {
            map.insert("description".into(), Value::String(description.clone()));
        }
        map
    }
}

fn dedent(lines: &[&str]) -> String {
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|line| line.get(indent..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ── Decorator fragments ────────────────────────────────────

/// One `arguments` decoration.
#[derive(Debug, Clone)]
pub struct ArgumentDoc {
    pub location: Location,
    pub schema: SchemaRef,
    pub required: bool,
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub example: Option<Value>,
    pub examples: Option<Value>,
}

/// Documentation of one response of an operation.
#[derive(Debug, Clone)]
pub enum ResponseEntry {
    /// Name of a reusable response component, e.g. `NOT_FOUND`.
    Reference(String),
    Inline(ResponseDoc),
}

impl ResponseEntry {
    /// Reference to the reusable response of a status code.
    pub fn for_status(status: StatusCode) -> Self {
        ResponseEntry::Reference(status_name(status))
    }
}

#[derive(Debug, Clone)]
pub struct ResponseDoc {
    pub schema: Option<SchemaRef>,
    pub description: String,
    pub example: Option<Value>,
    pub examples: Option<Value>,
    pub headers: Option<Map<String, Value>>,
    pub content_type: String,
}

/// Everything the decorators of one view contributed.
#[derive(Debug, Clone, Default)]
pub struct DocInfo {
    /// Fragment merged over the generated operation last.
    pub manual_doc: Map<String, Value>,
    pub arguments: Vec<ArgumentDoc>,
    /// Error responses introduced by argument parsing.
    pub argument_responses: Vec<(String, ResponseEntry)>,
    pub responses: Vec<(String, ResponseEntry)>,
    pub success_status_codes: Vec<String>,
    pub pagination: Option<PaginateOptions>,
    pub etag: bool,
    /// Fragments contributed by doc plugins, keyed by plugin field.
    pub extensions: Map<String, Value>,
}

impl DocInfo {
    /// Set (or replace) the documented response of a status.
    pub fn set_response(&mut self, status: String, entry: ResponseEntry) {
        match self.responses.iter_mut().find(|(s, _)| *s == status) {
            Some(slot) => slot.1 = entry,
            None => self.responses.push((status, entry)),
        }
    }

    pub fn add_success_status(&mut self, status: String) {
        if !self.success_status_codes.contains(&status) {
            self.success_status_codes.push(status);
        }
    }

    /// The body argument (json, form or files), if any.
    pub fn body_argument(&self) -> Option<&ArgumentDoc> {
        self.arguments.iter().find(|arg| arg.location.is_body())
    }
}

/// Per-method documentation stored by a blueprint.
#[derive(Debug, Clone, Default)]
pub struct MethodDocInfo {
    pub docstring: Docstring,
    /// `None` falls back to the blueprint name.
    pub tags: Option<Vec<String>>,
    pub doc: DocInfo,
}

/// Documentation of one endpoint, keyed by lowercase method.
#[derive(Debug, Clone, Default)]
pub struct EndpointDocs {
    /// Route-level parameter objects.
    pub parameters: Vec<Value>,
    pub methods: Vec<(String, MethodDocInfo)>,
}

impl EndpointDocs {
    pub fn method(&self, method: &str) -> Option<&MethodDocInfo> {
        self.methods
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, info)| info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_update_merges_nested_objects() {
        let mut doc = json!({
            "responses": {"200": {"description": "A", "schema": {"$ref": "X"}}},
            "tags": ["a"],
        });
        deep_update(
            &mut doc,
            json!({"responses": {"200": {"description": "B"}}, "tags": ["b"]}),
        );
        assert_eq!(
            doc,
            json!({
                "responses": {"200": {"description": "B", "schema": {"$ref": "X"}}},
                "tags": ["b"],
            })
        );
    }

    #[test]
    fn deep_update_replaces_non_objects() {
        let mut doc = json!("leaf");
        deep_update(&mut doc, json!({"a": 1}));
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn docstring_cut_and_dedent() {
        let doc = Docstring::parse(
            "Get an item\n\n    Returns a single item.\n      Indented line.\n    ---\n    internal: true",
        );
        assert_eq!(doc.summary.as_deref(), Some("Get an item"));
        assert_eq!(
            doc.description.as_deref(),
            Some("Returns a single item.\n  Indented line.")
        );
    }

    #[test]
    fn docstring_summary_only() {
        let doc = Docstring::parse("Summary\nspanning two lines");
        assert_eq!(doc.summary.as_deref(), Some("Summary\nspanning two lines"));
        assert_eq!(doc.description, None);
        assert_eq!(Docstring::parse(""), Docstring::default());
    }
}
