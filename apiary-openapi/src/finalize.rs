//! Turn the documentation stored by a blueprint into OpenAPI operations.
//!
//! Every operation is built from scratch out of a copy of the stored
//! records, so finalizing the same blueprint twice gives the same output.

use std::sync::Arc;

use apiary_core::arguments::Location;
use apiary_core::blueprint::Blueprint;
use apiary_core::doc::{deep_update_map, DocInfo, MethodDocInfo, ResponseDoc, ResponseEntry};
use apiary_core::error::DeclarationError;
use apiary_core::etag;
use apiary_core::pagination::{PaginationMetadata, PAGINATION_HEADER};
use apiary_core::response::DEFAULT_CONTENT_TYPE;
use apiary_core::schema::SchemaRef;
use http::{Method, StatusCode};
use serde_json::{json, Map, Value};

use crate::plugin::DocPlugin;
use crate::spec::{ComponentKind, Spec};

/// Reusable response documenting any error.
pub const DEFAULT_ERROR_RESPONSE: &str = "DEFAULT_ERROR";
pub const ERROR_SCHEMA: &str = "Error";
pub const PAGINATION_METADATA_SCHEMA: &str = "PaginationMetadata";
pub const IF_MATCH_PARAMETER: &str = "IF_MATCH";
pub const IF_NONE_MATCH_PARAMETER: &str = "IF_NONE_MATCH";
pub const ETAG_RESPONSE_HEADER: &str = "ETAG";
pub const PAGINATION_RESPONSE_HEADER: &str = "PAGINATION";

const ETAG_HEADER_DESCRIPTION: &str = "Tag for the returned entity";
const PAGINATION_HEADER_DESCRIPTION: &str = "Pagination metadata";

/// What the finalizer needs from the API.
pub struct Finalizer<'a> {
    pub spec: &'a mut Spec,
    pub plugins: &'a [Arc<dyn DocPlugin>],
    pub etag_disabled: bool,
}

impl Finalizer<'_> {
    /// Document every endpoint of `blueprint`, mounted as `name` under
    /// `url_prefix`. `parameters` document arguments of the prefix and are
    /// added to every path.
    pub fn register_views_in_doc(
        &mut self,
        blueprint: &Blueprint,
        name: &str,
        url_prefix: &str,
        parameters: &[Value],
    ) -> Result<(), DeclarationError> {
        for (endpoint, docs) in blueprint.docs() {
            let Some(route) = blueprint.route_of(endpoint) else {
                continue;
            };
            let rule = route.rule.prefixed(url_prefix)?;

            let mut operations = Map::new();
            for (method, info) in &docs.methods {
                operations.insert(method.clone(), Value::Object(self.operation(method, info, name)));
            }

            let mut path_parameters = parameters.to_vec();
            path_parameters.extend(docs.parameters.iter().cloned());
            self.spec.path(&rule, operations, path_parameters);
            tracing::debug!(endpoint = %format!("{name}.{endpoint}"), path = %rule.openapi_path(), "endpoint documented");
        }
        Ok(())
    }

    /// The operation of one method.
    ///
    /// Built-in callbacks run first (arguments, response, pagination, etag),
    /// then plugins. The docstring and tags come next and the manual doc is
    /// merged last, so it wins over everything inferred.
    pub fn operation(&mut self, method: &str, info: &MethodDocInfo, blueprint_name: &str) -> Map<String, Value> {
        let doc_info = &info.doc;
        let mut operation = Map::new();
        self.prepare_arguments_doc(&mut operation, doc_info);
        self.prepare_response_doc(&mut operation, doc_info);
        self.prepare_pagination_doc(&mut operation, doc_info);
        self.prepare_etag_doc(&mut operation, doc_info, method);
        for plugin in self.plugins {
            plugin.register_method_docs(&mut operation, doc_info, self.spec);
        }

        operation.extend(info.docstring.to_map());
        let tags = info
            .tags
            .clone()
            .unwrap_or_else(|| vec![blueprint_name.to_string()]);
        operation.insert("tags".into(), json!(tags));

        deep_update_map(&mut operation, doc_info.manual_doc.clone());
        operation
    }

    fn prepare_arguments_doc(&mut self, operation: &mut Map<String, Value>, doc_info: &DocInfo) {
        if doc_info.arguments.is_empty() {
            return;
        }
        let mut update = Map::new();
        let mut parameters = Vec::new();
        let mut has_body = false;

        for argument in &doc_info.arguments {
            if !argument.location.is_body() || has_body {
                parameters.extend(self.spec.schema_parameters(argument.location, &argument.schema));
                continue;
            }
            has_body = true;
            let content_type = argument
                .content_type
                .clone()
                .or_else(|| argument.location.default_content_type().map(str::to_string))
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

            if self.spec.is_v3() {
                let mut content = Map::new();
                content.insert("schema".into(), self.spec.resolve_schema(&argument.schema));
                if let Some(ref example) = argument.example {
                    content.insert("example".into(), example.clone());
                }
                if let Some(ref examples) = argument.examples {
                    content.insert("examples".into(), examples.clone());
                }
                let mut request_body = Map::new();
                if let Some(ref description) = argument.description {
                    request_body.insert("description".into(), json!(description));
                }
                request_body.insert("required".into(), Value::Bool(argument.required));
                request_body.insert("content".into(), json!({ content_type: content }));
                update.insert("requestBody".into(), Value::Object(request_body));
            } else {
                if content_type != DEFAULT_CONTENT_TYPE {
                    update.insert("consumes".into(), json!([content_type]));
                }
                if argument.location == Location::Json {
                    let mut body = Map::new();
                    body.insert("in".into(), json!("body"));
                    body.insert("name".into(), json!("body"));
                    body.insert("required".into(), Value::Bool(argument.required));
                    body.insert("schema".into(), self.spec.resolve_schema(&argument.schema));
                    if let Some(ref description) = argument.description {
                        body.insert("description".into(), json!(description));
                    }
                    parameters.push(Value::Object(body));
                } else {
                    parameters.extend(self.spec.schema_parameters(argument.location, &argument.schema));
                }
            }
        }

        if !parameters.is_empty() {
            update.insert("parameters".into(), Value::Array(parameters));
        }
        let responses: Map<String, Value> = doc_info
            .argument_responses
            .iter()
            .map(|(status, entry)| (status.clone(), self.response_value(entry)))
            .collect();
        update.insert("responses".into(), Value::Object(responses));
        deep_update_map(operation, update);
    }

    fn prepare_response_doc(&mut self, operation: &mut Map<String, Value>, doc_info: &DocInfo) {
        let mut responses = Map::new();
        let mut content_types: Vec<&str> = Vec::new();
        for (status, entry) in &doc_info.responses {
            responses.insert(status.clone(), self.response_value(entry));
            let content_type = match entry {
                ResponseEntry::Inline(doc) => doc.content_type.as_str(),
                ResponseEntry::Reference(_) => DEFAULT_CONTENT_TYPE,
            };
            if !content_types.contains(&content_type) {
                content_types.push(content_type);
            }
        }
        responses.insert("default".into(), json!(DEFAULT_ERROR_RESPONSE));
        if !content_types.contains(&DEFAULT_CONTENT_TYPE) {
            content_types.push(DEFAULT_CONTENT_TYPE);
        }

        let mut update = Map::new();
        update.insert("responses".into(), Value::Object(responses));
        if !self.spec.is_v3() && content_types != [DEFAULT_CONTENT_TYPE] {
            update.insert("produces".into(), json!(content_types));
        }
        deep_update_map(operation, update);
    }

    fn prepare_pagination_doc(&mut self, operation: &mut Map<String, Value>, doc_info: &DocInfo) {
        let Some(ref options) = doc_info.pagination else {
            return;
        };
        let parameters = self
            .spec
            .schema_parameters(Location::Query, &SchemaRef::new(options.parameters_schema()));
        append_parameters(operation, parameters);

        let unprocessable = StatusCode::UNPROCESSABLE_ENTITY;
        let header = if self.spec.is_v3() {
            json!(PAGINATION_RESPONSE_HEADER)
        } else {
            let schema = self
                .spec
                .resolve_schema(&SchemaRef::Reference(PAGINATION_METADATA_SCHEMA.to_string()));
            json!({"description": PAGINATION_HEADER_DESCRIPTION, "schema": schema})
        };
        let unprocessable_doc = self.response_value(&ResponseEntry::for_status(unprocessable));
        with_responses(operation, |responses| {
            responses.insert(unprocessable.as_u16().to_string(), unprocessable_doc);
            add_success_header(responses, &doc_info.success_status_codes, PAGINATION_HEADER, header);
        });
    }

    fn prepare_etag_doc(&mut self, operation: &mut Map<String, Value>, doc_info: &DocInfo, method: &str) {
        if !doc_info.etag || self.etag_disabled {
            return;
        }
        let Ok(method) = Method::from_bytes(method.to_uppercase().as_bytes()) else {
            return;
        };
        let mut statuses = Vec::new();
        let mut parameters = Vec::new();
        if etag::checks_not_modified(&method) {
            statuses.push(StatusCode::NOT_MODIFIED);
            parameters.push(json!(IF_NONE_MATCH_PARAMETER));
        }
        if etag::needs_check(&method) {
            statuses.push(StatusCode::PRECONDITION_FAILED);
            statuses.push(StatusCode::PRECONDITION_REQUIRED);
            parameters.push(json!(IF_MATCH_PARAMETER));
        }
        append_parameters(operation, parameters);

        let header = if self.spec.is_v3() {
            json!(ETAG_RESPONSE_HEADER)
        } else {
            json!({"description": ETAG_HEADER_DESCRIPTION, "type": "string"})
        };
        let entries: Vec<(String, Value)> = statuses
            .into_iter()
            .map(|status| {
                (
                    status.as_u16().to_string(),
                    self.response_value(&ResponseEntry::for_status(status)),
                )
            })
            .collect();
        let allows_set = etag::allows_set(&method);
        with_responses(operation, |responses| {
            responses.extend(entries);
            if allows_set {
                add_success_header(responses, &doc_info.success_status_codes, "ETag", header);
            }
        });
    }

    fn response_value(&mut self, entry: &ResponseEntry) -> Value {
        match entry {
            ResponseEntry::Reference(name) => json!(name),
            ResponseEntry::Inline(doc) => prepare_response(self.spec, doc),
        }
    }
}

/// A response object shaped for the document version.
///
/// OpenAPI 3 nests schema and examples under `content.<content type>`;
/// OpenAPI 2 keeps the schema inline and keys examples by content type.
pub fn prepare_response(spec: &mut Spec, doc: &ResponseDoc) -> Value {
    let schema = doc.schema.as_ref().map(|schema| spec.resolve_schema(schema));
    let mut response = Map::new();
    if spec.is_v3() {
        response.insert("description".into(), json!(doc.description));
        if let Some(ref headers) = doc.headers {
            response.insert("headers".into(), Value::Object(headers.clone()));
        }
        let mut media = Map::new();
        if let Some(schema) = schema {
            media.insert("schema".into(), schema);
        }
        if let Some(ref example) = doc.example {
            media.insert("example".into(), example.clone());
        }
        if let Some(ref examples) = doc.examples {
            media.insert("examples".into(), examples.clone());
        }
        if !media.is_empty() {
            response.insert("content".into(), json!({ doc.content_type.clone(): media }));
        }
    } else {
        if let Some(schema) = schema {
            response.insert("schema".into(), schema);
        }
        response.insert("description".into(), json!(doc.description));
        if let Some(ref headers) = doc.headers {
            response.insert("headers".into(), Value::Object(headers.clone()));
        }
        match (&doc.example, &doc.examples) {
            (Some(example), _) => {
                response.insert("examples".into(), json!({ doc.content_type.clone(): example }));
            }
            (None, Some(examples)) => {
                response.insert("examples".into(), examples.clone());
            }
            (None, None) => {}
        }
    }
    Value::Object(response)
}

/// Register the reusable objects operations refer to by name. They are
/// only rendered when referenced.
pub fn register_default_components(spec: &mut Spec) {
    use apiary_core::error::status_name;
    use apiary_core::schema::{Field, Fields, Schema};

    let error = Fields::new()
        .field("code", Field::integer().description("Error code"))
        .field("status", Field::string().description("Error name"))
        .field("message", Field::string().description("Error message"))
        .field("errors", Field::dict().description("Errors"));
    spec.schema(ERROR_SCHEMA, error.json_schema(), true);
    spec.schema(PAGINATION_METADATA_SCHEMA, PaginationMetadata::json_schema(), true);

    let error_ref = SchemaRef::Reference(ERROR_SCHEMA.to_string());
    for code in 100..600u16 {
        let Ok(status) = StatusCode::from_u16(code) else {
            continue;
        };
        let Some(reason) = status.canonical_reason() else {
            continue;
        };
        let has_body = !status.is_informational()
            && status != StatusCode::NO_CONTENT
            && status != StatusCode::NOT_MODIFIED;
        let doc = response_doc(reason, has_body.then(|| error_ref.clone()));
        let response = prepare_response(spec, &doc);
        spec.response(&status_name(status), response, true);
    }
    let default_error = prepare_response(spec, &response_doc("Default error response", Some(error_ref)));
    spec.response(DEFAULT_ERROR_RESPONSE, default_error, true);

    let tag_parameter = |name: &str, required: bool, v3: bool| {
        let mut param = Map::new();
        param.insert("name".into(), json!(name));
        param.insert("in".into(), json!("header"));
        param.insert("description".into(), json!("Tag to check against"));
        if required {
            param.insert("required".into(), Value::Bool(true));
        }
        if v3 {
            param.insert("schema".into(), json!({"type": "string"}));
        } else {
            param.insert("type".into(), json!("string"));
        }
        Value::Object(param)
    };
    let v3 = spec.is_v3();
    spec.parameter(IF_NONE_MATCH_PARAMETER, "header", tag_parameter("If-None-Match", false, v3), true);
    spec.parameter(IF_MATCH_PARAMETER, "header", tag_parameter("If-Match", true, v3), true);

    if v3 {
        spec.header(
            ETAG_RESPONSE_HEADER,
            json!({"description": ETAG_HEADER_DESCRIPTION, "schema": {"type": "string"}}),
            true,
        );
        let metadata = spec.component_ref(ComponentKind::Schema, PAGINATION_METADATA_SCHEMA);
        spec.header(
            PAGINATION_RESPONSE_HEADER,
            json!({"description": PAGINATION_HEADER_DESCRIPTION, "schema": {"$ref": metadata}}),
            true,
        );
    }
}

fn response_doc(description: &str, schema: Option<SchemaRef>) -> ResponseDoc {
    ResponseDoc {
        schema,
        description: description.to_string(),
        example: None,
        examples: None,
        headers: None,
        content_type: DEFAULT_CONTENT_TYPE.to_string(),
    }
}

fn append_parameters(operation: &mut Map<String, Value>, parameters: Vec<Value>) {
    if parameters.is_empty() {
        return;
    }
    match operation
        .entry("parameters")
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(existing) => existing.extend(parameters),
        other => *other = Value::Array(parameters),
    }
}

fn with_responses(operation: &mut Map<String, Value>, f: impl FnOnce(&mut Map<String, Value>)) {
    let responses = operation
        .entry("responses")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(responses) = responses {
        f(responses);
    }
}

/// Document `header` on the inline success responses. Referenced responses
/// are left as they are.
fn add_success_header(responses: &mut Map<String, Value>, success: &[String], name: &str, header: Value) {
    for status in success {
        if let Some(Value::Object(response)) = responses.get_mut(status) {
            if let Value::Object(headers) = response
                .entry("headers")
                .or_insert_with(|| Value::Object(Map::new()))
            {
                headers.insert(name.to_string(), header.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_core::arguments::ArgOptions;
    use apiary_core::call::Call;
    use apiary_core::error::ApiError;
    use apiary_core::pagination::{PaginateOptions, Pagination};
    use apiary_core::response::{AltResponse, ResponseOptions};
    use apiary_core::schema::{Field, Fields};
    use apiary_core::view::View;

    async fn noop(_call: Call) -> Result<Value, ApiError> {
        Ok(json!({}))
    }

    fn item_schema() -> Fields {
        Fields::new()
            .named("Item")
            .field("item_id", Field::integer().dump_only())
            .field("field", Field::integer())
    }

    fn operation_of(spec: &mut Spec, method: &str, view: &View) -> Value {
        let info = MethodDocInfo {
            docstring: Default::default(),
            tags: None,
            doc: view.doc_info().clone(),
        };
        let mut finalizer = Finalizer {
            spec,
            plugins: &[],
            etag_disabled: false,
        };
        Value::Object(finalizer.operation(method, &info, "items"))
    }

    #[test]
    fn v3_operation() {
        let mut spec = Spec::new("T", "1", "3.0.2", Map::new()).unwrap();
        let view = View::new(noop)
            .arguments(item_schema(), ArgOptions::json().description("New item"))
            .response(ResponseOptions::new(StatusCode::CREATED).schema(item_schema()))
            .etag();
        let operation = operation_of(&mut spec, "post", &view);
        assert_eq!(
            operation["requestBody"],
            json!({
                "description": "New item",
                "required": true,
                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Item"}}},
            })
        );
        assert_eq!(operation["responses"]["422"], "UNPROCESSABLE_ENTITY");
        assert_eq!(operation["responses"]["default"], "DEFAULT_ERROR");
        assert_eq!(operation["responses"]["201"]["headers"]["ETag"], "ETAG");
        assert_eq!(operation["tags"], json!(["items"]));
        // POST has no precondition
        assert!(operation.get("parameters").is_none());
    }

    #[test]
    fn v2_operation() {
        let mut spec = Spec::new("T", "1", "2.0", Map::new()).unwrap();
        let view = View::new(noop)
            .arguments(item_schema(), ArgOptions::json())
            .response(ResponseOptions::new(StatusCode::OK).schema(item_schema()))
            .etag();
        let operation = operation_of(&mut spec, "put", &view);
        assert_eq!(
            operation["parameters"],
            json!([
                {"in": "body", "name": "body", "required": true, "schema": {"$ref": "#/definitions/Item"}},
                "IF_MATCH",
            ])
        );
        assert_eq!(
            operation["responses"]["200"],
            json!({
                "schema": {"$ref": "#/definitions/Item"},
                "description": "OK",
                "headers": {"ETag": {"description": "Tag for the returned entity", "type": "string"}},
            })
        );
        assert_eq!(operation["responses"]["412"], "PRECONDITION_FAILED");
        assert_eq!(operation["responses"]["428"], "PRECONDITION_REQUIRED");
        assert!(operation.get("produces").is_none());
    }

    #[test]
    fn v2_form_arguments_set_consumes() {
        let mut spec = Spec::new("T", "1", "2.0", Map::new()).unwrap();
        let form = Fields::new().field("name", Field::string().required());
        let view = View::new(noop).arguments(form, ArgOptions::form());
        let operation = operation_of(&mut spec, "post", &view);
        assert_eq!(operation["consumes"], json!(["application/x-www-form-urlencoded"]));
        assert_eq!(operation["parameters"][0]["in"], "formData");
        assert_eq!(operation["parameters"][0]["required"], true);
    }

    #[test]
    fn pagination_documents_query_and_header() {
        let mut spec = Spec::new("T", "1", "3.0.2", Map::new()).unwrap();
        let view = View::new(noop)
            .paginate(Pagination::new(PaginateOptions::default()))
            .response(ResponseOptions::new(StatusCode::OK).schema(SchemaRef::new(item_schema()).many()))
            .alt_response(AltResponse::status(StatusCode::NOT_FOUND));
        let operation = operation_of(&mut spec, "get", &view);
        let names: Vec<&str> = operation["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["page", "page_size"]);
        assert_eq!(operation["responses"]["200"]["headers"]["X-Pagination"], "PAGINATION");
        assert_eq!(operation["responses"]["404"], "NOT_FOUND");
        assert_eq!(operation["responses"]["422"], "UNPROCESSABLE_ENTITY");
    }

    #[test]
    fn manual_doc_wins_and_docstring_fills_summary() {
        let mut spec = Spec::new("T", "1", "3.0.2", Map::new()).unwrap();
        let view = View::new(noop)
            .response(ResponseOptions::new(StatusCode::OK).description("Inferred"))
            .doc(json!({"responses": {"200": {"description": "Manual"}}, "summary": "Manual summary"}));
        let info = MethodDocInfo {
            docstring: apiary_core::doc::Docstring::parse("Docstring summary\n\nLong text"),
            tags: Some(vec!["custom".into()]),
            doc: view.doc_info().clone(),
        };
        let mut finalizer = Finalizer {
            spec: &mut spec,
            plugins: &[],
            etag_disabled: false,
        };
        let operation = finalizer.operation("get", &info, "items");
        assert_eq!(operation["summary"], "Manual summary");
        assert_eq!(operation["description"], "Long text");
        assert_eq!(operation["tags"], json!(["custom"]));
        assert_eq!(operation["responses"]["200"]["description"], "Manual");
    }

    #[test]
    fn etag_disabled_leaves_no_trace() {
        let mut spec = Spec::new("T", "1", "3.0.2", Map::new()).unwrap();
        let view = View::new(noop)
            .response(ResponseOptions::new(StatusCode::OK))
            .etag();
        let info = MethodDocInfo {
            doc: view.doc_info().clone(),
            ..Default::default()
        };
        let mut finalizer = Finalizer {
            spec: &mut spec,
            plugins: &[],
            etag_disabled: true,
        };
        let operation = Value::Object(finalizer.operation("get", &info, "items"));
        assert!(operation.get("parameters").is_none());
        assert!(operation["responses"].get("304").is_none());
        assert!(operation["responses"]["200"].get("headers").is_none());
    }

    #[test]
    fn default_components_are_lazy() {
        let mut spec = Spec::new("T", "1", "3.0.2", Map::new()).unwrap();
        register_default_components(&mut spec);
        assert!(spec.to_value().get("components").is_none());

        let mut operations = Map::new();
        operations.insert(
            "get".into(),
            json!({"responses": {"404": "NOT_FOUND", "304": "NOT_MODIFIED"}}),
        );
        spec.path(&apiary_core::rule::Rule::parse("/x").unwrap(), operations, Vec::new());
        let components = &spec.to_value()["components"];
        assert_eq!(
            components["responses"]["NOT_FOUND"],
            json!({
                "description": "Not Found",
                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Error"}}},
            })
        );
        assert_eq!(components["responses"]["NOT_MODIFIED"], json!({"description": "Not Modified"}));
        assert_eq!(components["schemas"]["Error"]["properties"]["code"]["description"], "Error code");
        assert!(components["schemas"].get("PaginationMetadata").is_none());
    }
}
