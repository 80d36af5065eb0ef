//! OpenAPI document assembly.
//!
//! [`Spec`] accumulates paths, tags and reusable components and renders an
//! OpenAPI 2 (`swagger`) or 3 (`openapi`) document. Components can be
//! registered *lazily*: they are only emitted when something in the
//! document references them.

use std::collections::{HashMap, HashSet};

use apiary_core::arguments::Location;
use apiary_core::doc::deep_update_map;
use apiary_core::rule::Rule;
use apiary_core::schema::{Schema, SchemaRef, FIELD_MARKER};
use serde_json::{json, Map, Value};

use crate::settings::ApiInitError;

/// Component sections, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Schema,
    Response,
    Parameter,
    Header,
    SecurityScheme,
}

impl ComponentKind {
    const ALL: [ComponentKind; 5] = [
        ComponentKind::Schema,
        ComponentKind::Response,
        ComponentKind::Parameter,
        ComponentKind::Header,
        ComponentKind::SecurityScheme,
    ];

    fn v3_key(self) -> &'static str {
        match self {
            ComponentKind::Schema => "schemas",
            ComponentKind::Response => "responses",
            ComponentKind::Parameter => "parameters",
            ComponentKind::Header => "headers",
            ComponentKind::SecurityScheme => "securitySchemes",
        }
    }

    /// Root key on OpenAPI 2. Headers have no reusable section there.
    fn v2_key(self) -> Option<&'static str> {
        match self {
            ComponentKind::Schema => Some("definitions"),
            ComponentKind::Response => Some("responses"),
            ComponentKind::Parameter => Some("parameters"),
            ComponentKind::Header => None,
            ComponentKind::SecurityScheme => Some("securityDefinitions"),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Components {
    sections: HashMap<ComponentKind, Map<String, Value>>,
}

impl Components {
    fn section(&self, kind: ComponentKind) -> Option<&Map<String, Value>> {
        self.sections.get(&kind)
    }

    fn section_mut(&mut self, kind: ComponentKind) -> &mut Map<String, Value> {
        self.sections.entry(kind).or_default()
    }

    fn contains(&self, kind: ComponentKind, name: &str) -> bool {
        self.section(kind).is_some_and(|s| s.contains_key(name))
    }

    fn get(&self, kind: ComponentKind, name: &str) -> Option<&Value> {
        self.section(kind).and_then(|s| s.get(name))
    }
}

#[derive(Debug, Clone)]
pub struct Spec {
    title: String,
    version: String,
    openapi_version: String,
    major: u64,
    options: Map<String, Value>,
    paths: Map<String, Value>,
    tags: Vec<Value>,
    components: Components,
    lazy: Components,
    converters: HashMap<String, (String, Option<String>)>,
    fields: HashMap<String, (String, Option<String>)>,
}

fn type_format(type_: &str, format: Option<&str>) -> (String, Option<String>) {
    (type_.to_string(), format.map(str::to_string))
}

impl Spec {
    /// Create an empty document.
    ///
    /// `options` is merged over the document root when rendering. OpenAPI 2
    /// documents default `produces` and `consumes` to `application/json`.
    pub fn new(
        title: impl Into<String>,
        version: impl Into<String>,
        openapi_version: impl Into<String>,
        options: Map<String, Value>,
    ) -> Result<Self, ApiInitError> {
        let openapi_version = openapi_version.into();
        let major = openapi_version
            .split('.')
            .next()
            .and_then(|m| m.trim().parse::<u64>().ok())
            .ok_or_else(|| ApiInitError::InvalidOpenApiVersion(openapi_version.clone()))?;
        if !(2..=3).contains(&major) {
            return Err(ApiInitError::InvalidOpenApiVersion(openapi_version));
        }

        let mut root_options = Map::new();
        if major < 3 {
            root_options.insert("produces".into(), json!(["application/json"]));
            root_options.insert("consumes".into(), json!(["application/json"]));
        }
        deep_update_map(&mut root_options, options);

        let converters = HashMap::from([
            ("default".to_string(), type_format("string", None)),
            ("string".to_string(), type_format("string", None)),
            ("path".to_string(), type_format("string", None)),
            ("int".to_string(), type_format("integer", Some("int32"))),
            ("float".to_string(), type_format("number", Some("float"))),
            ("uuid".to_string(), type_format("string", Some("uuid"))),
        ]);

        Ok(Self {
            title: title.into(),
            version: version.into(),
            openapi_version,
            major,
            options: root_options,
            paths: Map::new(),
            tags: Vec::new(),
            components: Components::default(),
            lazy: Components::default(),
            converters,
            fields: HashMap::new(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn openapi_version(&self) -> &str {
        &self.openapi_version
    }

    pub fn major_version(&self) -> u64 {
        self.major
    }

    pub fn is_v3(&self) -> bool {
        self.major >= 3
    }

    // ── Registries ──

    /// Document path arguments using converter `name` with `type_`/`format`.
    pub fn register_converter(&mut self, name: &str, type_: &str, format: Option<&str>) {
        self.converters
            .insert(name.to_string(), type_format(type_, format));
    }

    /// Document custom fields named `name` with `type_`/`format`.
    pub fn register_field(&mut self, name: &str, type_: &str, format: Option<&str>) {
        self.fields.insert(name.to_string(), type_format(type_, format));
    }

    fn converter(&self, name: &str) -> (String, Option<String>) {
        self.converters
            .get(name)
            .cloned()
            .unwrap_or_else(|| type_format("string", None))
    }

    // ── Components ──

    fn register(&mut self, kind: ComponentKind, name: &str, value: Value, lazy: bool) {
        let target = if lazy { &mut self.lazy } else { &mut self.components };
        target.section_mut(kind).insert(name.to_string(), value);
    }

    /// Register a schema component from a JSON schema.
    pub fn schema(&mut self, name: &str, json_schema: Value, lazy: bool) {
        let schema = self.sanitize(json_schema);
        self.register(ComponentKind::Schema, name, schema, lazy);
    }

    pub fn response(&mut self, name: &str, response: Value, lazy: bool) {
        self.register(ComponentKind::Response, name, response, lazy);
    }

    /// Register a parameter component. `in` defaults to `location` and
    /// `name` to the component name.
    pub fn parameter(&mut self, name: &str, location: &str, parameter: Value, lazy: bool) {
        let mut param = Map::new();
        param.insert("in".into(), Value::String(location.to_string()));
        param.insert("name".into(), Value::String(name.to_string()));
        if let Value::Object(fields) = parameter {
            param.extend(fields);
        }
        self.register(ComponentKind::Parameter, name, Value::Object(param), lazy);
    }

    pub fn header(&mut self, name: &str, header: Value, lazy: bool) {
        self.register(ComponentKind::Header, name, header, lazy);
    }

    pub fn security_scheme(&mut self, name: &str, scheme: Value) {
        self.register(ComponentKind::SecurityScheme, name, scheme, false);
    }

    /// Add a global tag.
    pub fn tag(&mut self, tag: Value) {
        self.tags.push(tag);
    }

    /// `$ref` target of a component.
    pub fn component_ref(&self, kind: ComponentKind, name: &str) -> String {
        if self.is_v3() {
            format!("#/components/{}/{name}", kind.v3_key())
        } else {
            format!("#/{}/{name}", kind.v2_key().unwrap_or("definitions"))
        }
    }

    fn reference(&self, kind: ComponentKind, name: &str) -> Value {
        json!({"$ref": self.component_ref(kind, name)})
    }

    fn parse_ref(&self, target: &str) -> Option<(ComponentKind, String)> {
        ComponentKind::ALL.into_iter().find_map(|kind| {
            let prefix = self.component_ref(kind, "");
            target
                .strip_prefix(prefix.as_str())
                .map(|name| (kind, name.to_string()))
        })
    }

    // ── Schemas ──

    /// JSON schema of a decorator schema argument.
    ///
    /// Named schemas are registered as components and referenced. Nested
    /// `$defs` are promoted to components.
    pub fn resolve_schema(&mut self, schema: &SchemaRef) -> Value {
        match schema {
            SchemaRef::Instance(instance) => self.schema_for(instance.as_ref()),
            SchemaRef::Many(instance) => {
                json!({"type": "array", "items": self.schema_for(instance.as_ref())})
            }
            SchemaRef::Reference(name) => self.reference(ComponentKind::Schema, name),
            SchemaRef::Inline(value) => self.sanitize(value.clone()),
        }
    }

    fn schema_for(&mut self, schema: &dyn Schema) -> Value {
        let json_schema = schema.json_schema();
        match schema.name() {
            Some(name) => {
                let name = name.into_owned();
                if !self.components.contains(ComponentKind::Schema, &name) {
                    let resolved = self.sanitize(json_schema);
                    self.register(ComponentKind::Schema, &name, resolved, false);
                }
                self.reference(ComponentKind::Schema, &name)
            }
            None => self.sanitize(json_schema),
        }
    }

    /// Strip `$schema`, promote `$defs`, rewrite references and resolve
    /// field markers.
    fn sanitize(&mut self, mut schema: Value) -> Value {
        if let Value::Object(ref mut obj) = schema {
            obj.remove("$schema");
            if let Some(Value::Object(defs)) = obj.remove("$defs") {
                for (name, def) in defs {
                    if !self.components.contains(ComponentKind::Schema, &name) {
                        let def = self.sanitize(def);
                        self.register(ComponentKind::Schema, &name, def, false);
                    }
                }
            }
        }
        self.rewrite(&mut schema);
        schema
    }

    fn rewrite(&self, value: &mut Value) {
        match value {
            Value::Object(obj) => {
                if let Some(Value::String(target)) = obj.get_mut("$ref") {
                    if let Some(name) = target.strip_prefix("#/$defs/") {
                        *target = self.component_ref(ComponentKind::Schema, name);
                    }
                }
                if let Some(marker) = obj.remove(FIELD_MARKER) {
                    self.resolve_marker(obj, &marker);
                }
                for child in obj.values_mut() {
                    self.rewrite(child);
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|item| self.rewrite(item)),
            _ => {}
        }
    }

    fn resolve_marker(&self, obj: &mut Map<String, Value>, marker: &Value) {
        match marker.as_str() {
            Some("upload") => {
                if self.is_v3() {
                    obj.insert("type".into(), json!("string"));
                } else {
                    obj.remove("format");
                    obj.insert("type".into(), json!("file"));
                }
            }
            Some(name) => {
                if let Some((type_, format)) = self.fields.get(name) {
                    obj.insert("type".into(), Value::String(type_.clone()));
                    if let Some(format) = format {
                        obj.insert("format".into(), Value::String(format.clone()));
                    }
                }
            }
            None => {}
        }
    }

    /// One parameter per schema property, for non-body locations.
    ///
    /// Read-only properties are skipped. List properties are exploded
    /// (`collectionFormat: multi` on OpenAPI 2).
    pub fn schema_parameters(&mut self, location: Location, schema: &SchemaRef) -> Vec<Value> {
        let json_schema = match schema {
            SchemaRef::Instance(instance) | SchemaRef::Many(instance) => {
                self.sanitize(instance.json_schema())
            }
            SchemaRef::Reference(name) => self
                .components
                .get(ComponentKind::Schema, name)
                .cloned()
                .unwrap_or(Value::Null),
            SchemaRef::Inline(value) => self.sanitize(value.clone()),
        };
        let Some(properties) = json_schema.get("properties").and_then(Value::as_object) else {
            tracing::debug!(?schema, location = %location, "schema has no properties to document");
            return Vec::new();
        };
        let required: HashSet<&str> = json_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let location_name = parameter_location(location);
        let mut parameters = Vec::new();
        for (name, property) in properties {
            let mut property = property.as_object().cloned().unwrap_or_default();
            if property.get("readOnly") == Some(&Value::Bool(true)) {
                continue;
            }
            let is_list = property.get("type") == Some(&json!("array"));

            let mut param = Map::new();
            param.insert("in".into(), json!(location_name));
            param.insert("name".into(), json!(name));
            if self.is_v3() {
                if let Some(description) = property.remove("description") {
                    param.insert("description".into(), description);
                }
                param.insert("schema".into(), Value::Object(property));
            } else {
                param.extend(property);
            }
            if required.contains(name.as_str()) || location == Location::Path {
                param.insert("required".into(), Value::Bool(true));
            }
            if is_list {
                if self.is_v3() {
                    param.insert("explode".into(), Value::Bool(true));
                    param.insert("style".into(), json!("form"));
                } else {
                    param.insert("collectionFormat".into(), json!("multi"));
                }
            }
            parameters.push(Value::Object(param));
        }
        parameters
    }

    // ── Paths ──

    /// Path parameters derived from the rule converters.
    fn rule_parameters(&self, rule: &Rule) -> Vec<Map<String, Value>> {
        rule.arguments()
            .iter()
            .map(|argument| {
                let (type_, format) = self.converter(&argument.converter);
                let mut schema = Map::new();
                schema.insert("type".into(), Value::String(type_));
                if let Some(format) = format {
                    schema.insert("format".into(), Value::String(format));
                }
                let mut param = Map::new();
                param.insert("in".into(), json!("path"));
                param.insert("name".into(), json!(argument.name));
                param.insert("required".into(), Value::Bool(true));
                if self.is_v3() {
                    param.insert("schema".into(), Value::Object(schema));
                } else {
                    param.extend(schema);
                }
                param
            })
            .collect()
    }

    /// Add the operations of `rule`.
    ///
    /// Path parameters are documented from the rule converters; a parameter
    /// given in `parameters` with the same name wins. Strings in parameter
    /// and response lists, and in response headers, are references to
    /// components of that name.
    pub fn path(&mut self, rule: &Rule, operations: Map<String, Value>, parameters: Vec<Value>) {
        let mut parameters = parameters;
        for path_param in self.rule_parameters(rule) {
            let documented = parameters.iter_mut().find_map(|p| match p {
                Value::Object(obj)
                    if obj.get("in") == Some(&json!("path"))
                        && obj.get("name") == path_param.get("name") =>
                {
                    Some(obj)
                }
                _ => None,
            });
            match documented {
                Some(existing) => {
                    for (key, value) in path_param {
                        existing.entry(key).or_insert(value);
                    }
                }
                None => parameters.push(Value::Object(path_param)),
            }
        }
        let parameters: Vec<Value> = parameters
            .into_iter()
            .map(|p| self.resolve_parameter(p))
            .collect();

        let mut operations = operations;
        for operation in operations.values_mut() {
            self.resolve_operation(operation);
        }

        let entry = self
            .paths
            .entry(rule.openapi_path().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(path_item) = entry {
            path_item.extend(operations);
            if !parameters.is_empty() {
                path_item.insert("parameters".into(), Value::Array(parameters));
            }
        }
    }

    fn resolve_parameter(&self, parameter: Value) -> Value {
        match parameter {
            Value::String(name) => self.reference(ComponentKind::Parameter, &name),
            other => other,
        }
    }

    fn resolve_operation(&self, operation: &mut Value) {
        let Value::Object(operation) = operation else {
            return;
        };
        if let Some(Value::Array(parameters)) = operation.get_mut("parameters") {
            for parameter in parameters.iter_mut() {
                *parameter = self.resolve_parameter(parameter.take());
            }
        }
        if let Some(Value::Object(responses)) = operation.get_mut("responses") {
            for response in responses.values_mut() {
                match response {
                    Value::String(name) => {
                        *response = self.reference(ComponentKind::Response, name);
                    }
                    Value::Object(obj) => {
                        if let Some(Value::Object(headers)) = obj.get_mut("headers") {
                            for header in headers.values_mut() {
                                if let Value::String(name) = header {
                                    *header = self.reference(ComponentKind::Header, name);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    // ── Rendering ──

    /// Eager components plus the lazy ones reachable from the document.
    fn reachable_components(&self) -> Components {
        let mut components = self.components.clone();
        let mut pending = Vec::new();
        collect_refs(&Value::Object(self.paths.clone()), &mut pending);
        for section in components.sections.values() {
            for value in section.values() {
                collect_refs(value, &mut pending);
            }
        }
        let mut activated: HashSet<(ComponentKind, String)> = HashSet::new();
        while let Some(target) = pending.pop() {
            let Some((kind, name)) = self.parse_ref(&target) else {
                continue;
            };
            if components.contains(kind, &name) || activated.contains(&(kind, name.clone())) {
                continue;
            }
            if let Some(value) = self.lazy.get(kind, &name) {
                collect_refs(value, &mut pending);
                activated.insert((kind, name));
            }
        }
        // lazy components keep their registration order
        for kind in ComponentKind::ALL {
            if let Some(section) = self.lazy.section(kind) {
                for (name, value) in section {
                    if activated.contains(&(kind, name.clone())) {
                        components.section_mut(kind).insert(name.clone(), value.clone());
                    }
                }
            }
        }
        components
    }

    /// Render the document.
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        root.insert("paths".into(), Value::Object(self.paths.clone()));
        root.insert(
            "info".into(),
            json!({"title": self.title, "version": self.version}),
        );
        if !self.tags.is_empty() {
            root.insert("tags".into(), Value::Array(self.tags.clone()));
        }

        let components = self.reachable_components();
        if self.is_v3() {
            root.insert("openapi".into(), json!(self.openapi_version));
            let mut rendered = Map::new();
            for kind in ComponentKind::ALL {
                if let Some(section) = components.section(kind).filter(|s| !s.is_empty()) {
                    rendered.insert(kind.v3_key().into(), Value::Object(section.clone()));
                }
            }
            if !rendered.is_empty() {
                root.insert("components".into(), Value::Object(rendered));
            }
        } else {
            root.insert("swagger".into(), json!(self.openapi_version));
            for kind in ComponentKind::ALL {
                let (Some(key), Some(section)) = (kind.v2_key(), components.section(kind)) else {
                    continue;
                };
                if !section.is_empty() {
                    root.insert(key.into(), Value::Object(section.clone()));
                }
            }
        }

        deep_update_map(&mut root, self.options.clone());
        Value::Object(root)
    }

    /// JSON rendering with a two-space indent.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_value())
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_value())
    }
}

fn collect_refs(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(target)) = obj.get("$ref") {
                refs.push(target.clone());
            }
            obj.values().for_each(|v| collect_refs(v, refs));
        }
        Value::Array(items) => items.iter().for_each(|v| collect_refs(v, refs)),
        _ => {}
    }
}

/// OpenAPI `in` value of an argument location.
pub fn parameter_location(location: Location) -> &'static str {
    match location {
        Location::Json => "body",
        Location::Query => "query",
        Location::Headers => "header",
        Location::Cookies => "cookie",
        Location::Form | Location::Files => "formData",
        Location::Path => "path",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_core::schema::{Field, Fields};

    fn spec(version: &str) -> Spec {
        Spec::new("Test API", "1", version, Map::new()).unwrap()
    }

    #[test]
    fn rejects_bad_versions() {
        assert!(matches!(
            Spec::new("T", "1", "x.0", Map::new()),
            Err(ApiInitError::InvalidOpenApiVersion(_))
        ));
        assert!(Spec::new("T", "1", "4.0.0", Map::new()).is_err());
    }

    #[test]
    fn v2_defaults_produces_and_consumes() {
        let doc = spec("2.0").to_value();
        assert_eq!(doc["swagger"], "2.0");
        assert_eq!(doc["produces"], json!(["application/json"]));
        assert!(spec("3.0.2").to_value().get("produces").is_none());
    }

    #[test]
    fn lazy_components_only_when_referenced() {
        let mut spec = spec("3.0.2");
        spec.schema("Error", json!({"type": "object"}), true);
        spec.response(
            "NOT_FOUND",
            json!({"description": "Not Found", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Error"}}}}),
            true,
        );
        spec.response("CONFLICT", json!({"description": "Conflict"}), true);
        assert!(spec.to_value().get("components").is_none());

        let rule = Rule::parse("/pets").unwrap();
        let mut operations = Map::new();
        operations.insert("get".into(), json!({"responses": {"404": "NOT_FOUND"}}));
        spec.path(&rule, operations, Vec::new());

        let doc = spec.to_value();
        assert_eq!(
            doc["paths"]["/pets"]["get"]["responses"]["404"],
            json!({"$ref": "#/components/responses/NOT_FOUND"})
        );
        assert!(doc["components"]["responses"].get("CONFLICT").is_none());
        assert!(doc["components"]["schemas"].get("Error").is_some());
    }

    #[test]
    fn path_parameters_from_converters() {
        let mut spec = spec("3.0.2");
        let rule = Rule::parse("/pets/<int:pet_id>/<name>").unwrap();
        let manual = json!({"in": "path", "name": "name", "description": "Pet name"});
        spec.path(&rule, Map::new(), vec![manual]);
        let doc = spec.to_value();
        let params = doc["paths"]["/pets/{pet_id}/{name}"]["parameters"].as_array().unwrap();
        assert_eq!(
            params[0],
            json!({"in": "path", "name": "name", "description": "Pet name", "required": true, "schema": {"type": "string"}})
        );
        assert_eq!(
            params[1],
            json!({"in": "path", "name": "pet_id", "required": true, "schema": {"type": "integer", "format": "int32"}})
        );
    }

    #[test]
    fn v2_path_parameters_inline_type() {
        let mut spec = spec("2.0");
        spec.register_converter("objectid", "string", Some("ObjectId"));
        let rule = Rule::parse("/pets/<objectid:pet_id>").unwrap();
        spec.path(&rule, Map::new(), Vec::new());
        let doc = spec.to_value();
        assert_eq!(
            doc["paths"]["/pets/{pet_id}"]["parameters"][0],
            json!({"in": "path", "name": "pet_id", "required": true, "type": "string", "format": "ObjectId"})
        );
    }

    #[test]
    fn named_schemas_become_components() {
        let mut spec = spec("2.0");
        let tag = Fields::new().named("Tag").field("name", Field::string());
        let pet = Fields::new()
            .named("Pet")
            .field("tag", Field::nested(tag))
            .field("photo", Field::upload());
        let resolved = spec.resolve_schema(&SchemaRef::new(pet).many());
        assert_eq!(
            resolved,
            json!({"type": "array", "items": {"$ref": "#/definitions/Pet"}})
        );
        let doc = spec.to_value();
        assert_eq!(
            doc["definitions"]["Pet"]["properties"]["tag"],
            json!({"$ref": "#/definitions/Tag"})
        );
        assert_eq!(doc["definitions"]["Pet"]["properties"]["photo"], json!({"type": "file"}));
        assert!(doc["definitions"].get("Tag").is_some());
    }

    #[test]
    fn query_parameters_per_property() {
        let schema = Fields::new()
            .field("name", Field::string().required().description("Pet name"))
            .field("tags", Field::list(Field::string()))
            .field("id", Field::integer().dump_only());
        let mut v3 = spec("3.0.2");
        let params = v3.schema_parameters(Location::Query, &SchemaRef::new(schema.clone()));
        assert_eq!(
            params,
            vec![
                json!({"in": "query", "name": "name", "description": "Pet name", "schema": {"type": "string"}, "required": true}),
                json!({"in": "query", "name": "tags", "schema": {"type": "array", "items": {"type": "string"}}, "explode": true, "style": "form"}),
            ]
        );
        let mut v2 = spec("2.0");
        let params = v2.schema_parameters(Location::Query, &SchemaRef::new(schema));
        assert_eq!(
            params[1],
            json!({"in": "query", "name": "tags", "type": "array", "items": {"type": "string"}, "collectionFormat": "multi"})
        );
    }

    #[test]
    fn custom_fields_use_registered_mapping() {
        let mut spec = spec("3.0.2");
        spec.register_field("objectid", "string", Some("ObjectId"));
        let schema = Fields::new().field("id", Field::custom("objectid"));
        let resolved = spec.resolve_schema(&SchemaRef::new(schema));
        assert_eq!(
            resolved["properties"]["id"],
            json!({"type": "string", "format": "ObjectId"})
        );
    }

    #[test]
    fn options_merge_over_root() {
        let mut options = Map::new();
        options.insert("info".into(), json!({"description": "Pets"}));
        let spec = Spec::new("T", "1", "3.0.2", options).unwrap();
        let doc = spec.to_value();
        assert_eq!(doc["info"], json!({"title": "T", "version": "1", "description": "Pets"}));
        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["paths", "info", "openapi"]);
    }
}
