//! Request argument parsing.
//!
//! Each `arguments` decoration reads the raw data of one location, coerces
//! string values to the JSON types of the schema and loads the result
//! through the schema. Failures become `422` responses with the field
//! errors nested under the location name.

use std::collections::HashMap;
use std::str::FromStr;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE};
use http::request::Parts;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::schema::{LoadError, SchemaRef, Unknown};
use crate::validation::ValidationErrors;

const CONFLICTING_KEYS: &str = "Conflicts with dotted keys of the same name.";

/// Where an argument is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Json,
    Query,
    Headers,
    Cookies,
    Form,
    Files,
    Path,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Json => "json",
            Location::Query => "query",
            Location::Headers => "headers",
            Location::Cookies => "cookies",
            Location::Form => "form",
            Location::Files => "files",
            Location::Path => "path",
        }
    }

    /// Locations read from the request body.
    pub fn is_body(&self) -> bool {
        matches!(self, Location::Json | Location::Form | Location::Files)
    }

    /// Documented content type of body locations.
    pub fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Location::Json => Some("application/json"),
            Location::Form => Some("application/x-www-form-urlencoded"),
            Location::Files => Some("multipart/form-data"),
            _ => None,
        }
    }

    /// Unknown keys are errors in bodies the client fully controls.
    pub fn default_unknown(&self) -> Unknown {
        match self {
            Location::Json | Location::Form => Unknown::Raise,
            _ => Unknown::Exclude,
        }
    }
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Location::Json),
            "query" | "querystring" => Ok(Location::Query),
            "headers" => Ok(Location::Headers),
            "cookies" => Ok(Location::Cookies),
            "form" => Ok(Location::Form),
            "files" => Ok(Location::Files),
            "path" => Ok(Location::Path),
            other => Err(format!("invalid location \"{other}\"")),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of an `arguments` decoration.
#[derive(Debug, Clone)]
pub struct ArgOptions {
    pub location: Location,
    pub required: bool,
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub example: Option<Value>,
    pub examples: Option<Value>,
    pub unknown: Option<Unknown>,
}

impl ArgOptions {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            required: true,
            content_type: None,
            description: None,
            example: None,
            examples: None,
            unknown: None,
        }
    }

    pub fn json() -> Self {
        Self::new(Location::Json)
    }

    pub fn query() -> Self {
        Self::new(Location::Query)
    }

    pub fn headers() -> Self {
        Self::new(Location::Headers)
    }

    pub fn cookies() -> Self {
        Self::new(Location::Cookies)
    }

    pub fn form() -> Self {
        Self::new(Location::Form)
    }

    pub fn files() -> Self {
        Self::new(Location::Files)
    }

    pub fn path() -> Self {
        Self::new(Location::Path)
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    pub fn examples(mut self, examples: Value) -> Self {
        self.examples = Some(examples);
        self
    }

    pub fn unknown(mut self, unknown: Unknown) -> Self {
        self.unknown = Some(unknown);
        self
    }
}

impl Default for ArgOptions {
    fn default() -> Self {
        Self::json()
    }
}

// ── Uploaded files ─────────────────────────────────────────

/// A file received in a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// The form field name.
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Description passed to the schema in place of the file content.
    fn descriptor(&self) -> Value {
        let mut map = Map::new();
        map.insert("filename".into(), self.file_name.clone().into());
        map.insert("content_type".into(), self.content_type.clone().into());
        map.insert("size".into(), Value::from(self.data.len()));
        Value::Object(map)
    }
}

/// Text and file parts of a multipart body.
#[derive(Debug, Default)]
pub struct MultipartParts {
    pub texts: Vec<(String, String)>,
    pub files: Vec<UploadedFile>,
}

pub async fn read_multipart(parts: &Parts, body: &Bytes) -> Result<MultipartParts, ApiError> {
    let mut request = Request::new(Body::from(body.clone()));
    if let Some(content_type) = parts.headers.get(CONTENT_TYPE) {
        request.headers_mut().insert(CONTENT_TYPE, content_type.clone());
    }
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut out = MultipartParts::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        if file_name.is_some() {
            out.files.push(UploadedFile {
                name,
                file_name,
                content_type,
                data,
            });
        } else {
            out.texts.push((name, String::from_utf8_lossy(&data).into_owned()));
        }
    }
    Ok(out)
}

fn is_multipart(parts: &Parts) -> bool {
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

// ── Raw location data ──────────────────────────────────────

/// Raw data of a location, before coercion and loading.
pub struct RawArguments {
    pub data: Value,
    pub files: Vec<UploadedFile>,
}

/// Read the raw data of `location`.
///
/// `schema` decides which keys collect repeated values into lists and, for
/// headers, which names are looked up.
pub async fn read_location(
    location: Location,
    parts: &Parts,
    body: &Bytes,
    path_params: &HashMap<String, String>,
    schema: &Value,
) -> Result<RawArguments, ApiError> {
    let mut files = Vec::new();
    let data = match location {
        Location::Json => {
            if body.iter().all(u8::is_ascii_whitespace) {
                Value::Object(Map::new())
            } else {
                serde_json::from_slice(body)
                    .map_err(|_| ApiError::bad_request("Invalid JSON body."))?
            }
        }
        Location::Query => {
            let pairs = form_urlencoded::parse(parts.uri.query().unwrap_or("").as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()));
            explode_dotted(collect_pairs(pairs, schema))
                .map_err(|errors| ApiError::unprocessable(location.as_str(), errors))?
        }
        Location::Form => {
            if is_multipart(parts) {
                let multipart = read_multipart(parts, body).await?;
                collect_pairs(multipart.texts, schema)
            } else {
                let pairs = form_urlencoded::parse(body).map(|(k, v)| (k.into_owned(), v.into_owned()));
                collect_pairs(pairs, schema)
            }
        }
        Location::Files => {
            let multipart = if is_multipart(parts) {
                read_multipart(parts, body).await?
            } else {
                MultipartParts::default()
            };
            let mut map = Map::new();
            for file in &multipart.files {
                let descriptor = file.descriptor();
                if is_array_property(schema, &file.name) {
                    push_value(&mut map, &file.name, descriptor);
                } else {
                    map.entry(file.name.clone()).or_insert(descriptor);
                }
            }
            files = multipart.files;
            Value::Object(map)
        }
        Location::Headers => {
            let mut map = Map::new();
            for name in property_names(schema) {
                let candidates = [name.clone(), name.replace('_', "-")];
                let values: Vec<String> = candidates
                    .iter()
                    .filter_map(|candidate| http::HeaderName::try_from(candidate.as_str()).ok())
                    .map(|header| {
                        parts
                            .headers
                            .get_all(header)
                            .iter()
                            .filter_map(|v| v.to_str().ok().map(str::to_string))
                            .collect::<Vec<_>>()
                    })
                    .find(|values| !values.is_empty())
                    .unwrap_or_default();
                if values.is_empty() {
                    continue;
                }
                let value = if is_array_property(schema, &name) {
                    Value::Array(values.into_iter().map(Value::String).collect())
                } else {
                    Value::String(values.into_iter().next().unwrap_or_default())
                };
                map.insert(name, value);
            }
            Value::Object(map)
        }
        Location::Cookies => {
            let pairs = parts
                .headers
                .get_all(COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|header| header.split(';'))
                .filter_map(|cookie| cookie.split_once('='))
                .map(|(k, v)| (k.trim().to_string(), v.trim().trim_matches('"').to_string()));
            collect_pairs(pairs, schema)
        }
        Location::Path => Value::Object(
            path_params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        ),
    };
    Ok(RawArguments { data, files })
}

/// Group `key=value` pairs into an object. Keys of array properties collect
/// every value, other keys keep the first one.
fn collect_pairs(pairs: impl IntoIterator<Item = (String, String)>, schema: &Value) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        let top = key.split('.').next().unwrap_or(&key);
        if is_array_property(schema, top) {
            push_value(&mut map, &key, Value::String(value));
        } else if !map.contains_key(&key) {
            map.insert(key, Value::String(value));
        }
    }
    Value::Object(map)
}

fn push_value(map: &mut Map<String, Value>, key: &str, value: Value) {
    match map.get_mut(key) {
        Some(Value::Array(items)) => items.push(value),
        _ => {
            map.insert(key.to_string(), Value::Array(vec![value]));
        }
    }
}

/// Turn `a.b=x` into `{"a": {"b": "x"}}`, recursively.
///
/// A flat key next to dotted keys sharing its name (`a=1&a.b=2`) is an
/// error on that key.
///
/// ```
/// use serde_json::json;
/// use apiary_core::arguments::explode_dotted;
///
/// let exploded = explode_dotted(json!({"a.b": "1", "a.c": "2", "d": "3"})).unwrap();
/// assert_eq!(exploded, json!({"a": {"b": "1", "c": "2"}, "d": "3"}));
/// ```
pub fn explode_dotted(value: Value) -> Result<Value, ValidationErrors> {
    let Value::Object(map) = value else {
        return Ok(value);
    };
    let mut out = Map::new();
    let mut errors = ValidationErrors::new();
    for (key, value) in map {
        match key.split_once('.') {
            Some((head, rest)) if !head.is_empty() && !rest.is_empty() => {
                let entry = out
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                match entry {
                    Value::Object(nested) => {
                        nested.insert(rest.to_string(), value);
                    }
                    _ => errors.add(head, CONFLICTING_KEYS),
                }
            }
            _ => match out.get(&key) {
                Some(Value::Object(_)) => errors.add(key, CONFLICTING_KEYS),
                Some(_) => {}
                None => {
                    out.insert(key, value);
                }
            },
        }
    }
    for (key, value) in out.iter_mut() {
        if value.is_object() {
            match explode_dotted(value.take()) {
                Ok(exploded) => *value = exploded,
                Err(nested) => errors.nest(key.clone(), nested),
            }
        }
    }
    errors.into_result(Value::Object(out))
}

// ── Coercion ───────────────────────────────────────────────

fn resolve<'a>(schema: &'a Value, root: &'a Value) -> &'a Value {
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        if let Some(name) = reference.strip_prefix("#/$defs/") {
            if let Some(target) = root.get("$defs").and_then(|defs| defs.get(name)) {
                return resolve(target, root);
            }
        }
    }
    if let Some(variants) = schema
        .get("anyOf")
        .or_else(|| schema.get("oneOf"))
        .and_then(Value::as_array)
    {
        if let Some(variant) = variants
            .iter()
            .find(|v| v.get("type").and_then(Value::as_str) != Some("null"))
        {
            return resolve(variant, root);
        }
    }
    if let Some(all) = schema.get("allOf").and_then(Value::as_array) {
        if all.len() == 1 {
            return resolve(&all[0], root);
        }
    }
    schema
}

fn types_of(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn property<'a>(schema: &'a Value, root: &'a Value, name: &str) -> Option<&'a Value> {
    resolve(schema, root)
        .get("properties")
        .and_then(|props| props.get(name))
        .map(|prop| resolve(prop, root))
}

fn property_names(schema: &Value) -> Vec<String> {
    resolve(schema, schema)
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

fn is_array_property(schema: &Value, name: &str) -> bool {
    property(schema, schema, name).is_some_and(|prop| types_of(prop).contains(&"array"))
}

/// Convert string values to the JSON types declared by `schema`.
///
/// Values that do not parse are left untouched for the schema to report.
pub fn coerce(value: Value, schema: &Value) -> Value {
    coerce_with_root(value, schema, schema)
}

fn coerce_with_root(value: Value, schema: &Value, root: &Value) -> Value {
    let schema = resolve(schema, root);
    let types = types_of(schema);
    match value {
        Value::Object(map) => {
            let coerced = map
                .into_iter()
                .map(|(key, value)| {
                    let value = match property(schema, root, &key) {
                        Some(prop) => coerce_with_root(value, prop, root),
                        None => value,
                    };
                    (key, value)
                })
                .collect();
            Value::Object(coerced)
        }
        Value::Array(items) => {
            let item_schema = schema.get("items").cloned().unwrap_or(Value::Null);
            Value::Array(
                items
                    .into_iter()
                    .map(|item| coerce_with_root(item, &item_schema, root))
                    .collect(),
            )
        }
        Value::String(s) => coerce_string(s, &types),
        other => other,
    }
}

fn coerce_string(s: String, types: &[&str]) -> Value {
    if types.contains(&"string") || types.is_empty() {
        return Value::String(s);
    }
    for t in types {
        match *t {
            "integer" => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    return Value::from(i);
                }
            }
            "number" => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    return Value::from(i);
                }
                if let Some(n) = s.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                    return Value::Number(n);
                }
            }
            "boolean" => match s.to_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => return Value::Bool(true),
                "false" | "0" | "off" | "no" => return Value::Bool(false),
                _ => {}
            },
            "null" if s.is_empty() => return Value::Null,
            "array" => return Value::Array(vec![Value::String(s)]),
            _ => {}
        }
    }
    Value::String(s)
}

// ── Loading ────────────────────────────────────────────────

/// Read, coerce and load one argument.
pub async fn load_argument(
    schema: &SchemaRef,
    options: &ArgOptions,
    parts: &Parts,
    body: &Bytes,
    path_params: &HashMap<String, String>,
) -> Result<(Value, Vec<UploadedFile>), ApiError> {
    let location = options.location;
    let json_schema = schema.json_schema();
    let raw = read_location(location, parts, body, path_params, &json_schema).await?;
    let data = if location == Location::Json {
        raw.data
    } else {
        coerce(raw.data, &json_schema)
    };
    let unknown = options.unknown.unwrap_or_else(|| location.default_unknown());
    match schema.load(data, unknown) {
        Ok(value) => Ok((value, raw.files)),
        Err(LoadError::Invalid(errors)) => {
            tracing::debug!(location = %location, errors = %errors, "argument validation failed");
            Err(ApiError::unprocessable(location.as_str(), errors))
        }
        Err(LoadError::Schema(err)) => Err(ApiError::internal(err)),
    }
}
