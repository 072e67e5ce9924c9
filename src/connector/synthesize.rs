use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::http::HttpMethod;

/// One proxied operation discovered from an API document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub path: String,
    pub method: String,
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_params: Vec<String>,
    #[serde(default)]
    pub requires_auth: bool,
    pub category: String,
}

impl OperationDescriptor {
    pub fn http_method(&self) -> HttpMethod {
        HttpMethod::parse(&self.method).unwrap_or(HttpMethod::Get)
    }
}

const PROXIED_METHODS: &[&str] = &["get", "post", "put", "patch", "delete"];

/// OpenAPI 3 / Swagger 2 markers, or at least a `paths` map.
pub fn is_openapi_document(doc: &Value) -> bool {
    let Some(obj) = doc.as_object() else {
        return false;
    };
    obj.contains_key("openapi")
        || obj.contains_key("swagger")
        || obj.get("paths").map_or(false, Value::is_object)
}

/// Gradio `/info` (`named_endpoints`) or `/config` (`dependencies`/`components`).
pub fn is_gradio_document(doc: &Value) -> bool {
    let Some(obj) = doc.as_object() else {
        return false;
    };
    ["named_endpoints", "dependencies", "components"]
        .iter()
        .any(|key| obj.contains_key(*key))
}

/// One descriptor per (path, method) operation in an OpenAPI/Swagger document.
pub fn synthesize_openapi(base_url: &str, spec: &Value) -> Vec<OperationDescriptor> {
    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };
    let base_url = base_url.trim_end_matches('/');
    let global_security = spec
        .get("security")
        .and_then(Value::as_array)
        .map_or(false, |s| !s.is_empty());

    let mut descriptors = Vec::new();
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };
        // path-level parameters apply to every operation under it
        let shared_params = item.get("parameters").and_then(Value::as_array);
        for (method, operation) in item {
            let method = method.to_ascii_lowercase();
            if !PROXIED_METHODS.contains(&method.as_str()) {
                continue;
            }
            let Some(operation) = operation.as_object() else {
                continue;
            };

            let name = operation
                .get("operationId")
                .and_then(Value::as_str)
                .map(sanitize_name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| sanitize_name(&format!("{method}_{path}")));
            let description = ["summary", "description"]
                .iter()
                .find_map(|k| operation.get(*k).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} {path}", method.to_ascii_uppercase()));

            let params = shared_params
                .into_iter()
                .flatten()
                .chain(operation.get("parameters").and_then(Value::as_array).into_iter().flatten());
            let (input_schema, path_params) = build_input_schema(params, operation.get("requestBody"));

            let requires_auth = match operation.get("security").and_then(Value::as_array) {
                Some(security) => !security.is_empty(),
                None => global_security,
            };

            descriptors.push(OperationDescriptor {
                name,
                description,
                base_url: base_url.to_string(),
                path: path.clone(),
                method: method.to_ascii_uppercase(),
                input_schema,
                path_params,
                requires_auth,
                category: "external_api".into(),
            });
        }
    }
    descriptors
}

fn build_input_schema<'a>(
    params: impl Iterator<Item = &'a Value>,
    request_body: Option<&Value>,
) -> (Value, Vec<String>) {
    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut path_params = Vec::new();

    for param in params {
        let Some(name) = param.get("name").and_then(Value::as_str) else {
            continue;
        };
        let location = param.get("in").and_then(Value::as_str).unwrap_or("query");
        // Swagger 2 puts the body in the parameter list
        if location == "body" {
            if let Some(schema) = param.get("schema") {
                merge_body_schema(schema, &mut properties, &mut required);
            }
            continue;
        }
        let mut schema = param
            .get("schema")
            .cloned()
            .unwrap_or_else(|| json!({ "type": param.get("type").and_then(Value::as_str).unwrap_or("string") }));
        if let (Some(obj), Some(desc)) = (schema.as_object_mut(), param.get("description")) {
            obj.insert("description".into(), desc.clone());
        }
        properties.insert(name.to_string(), schema);

        let is_required = location == "path" || param.get("required").and_then(Value::as_bool) == Some(true);
        if is_required && !required.iter().any(|r| r == name) {
            required.push(name.to_string());
        }
        if location == "path" {
            path_params.push(name.to_string());
        }
    }

    if let Some(schema) = request_body
        .and_then(|body| body.get("content"))
        .and_then(|content| content.get("application/json"))
        .and_then(|media| media.get("schema"))
    {
        merge_body_schema(schema, &mut properties, &mut required);
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    (Value::Object(schema), path_params)
}

/// Object bodies contribute their properties; anything else becomes a `body` argument.
fn merge_body_schema(schema: &Value, properties: &mut Map<String, Value>, required: &mut Vec<String>) {
    match schema.get("properties").and_then(Value::as_object) {
        Some(body_props) => {
            for (key, value) in body_props {
                properties.insert(key.clone(), value.clone());
            }
            for name in schema.get("required").and_then(Value::as_array).into_iter().flatten() {
                if let Some(name) = name.as_str() {
                    if !required.iter().any(|r| r == name) {
                        required.push(name.to_string());
                    }
                }
            }
        }
        None => {
            properties.insert("body".into(), schema.clone());
        }
    }
}

/// `gradio_<fn>` descriptors from Gradio `named_endpoints` (map or list form).
pub fn synthesize_gradio(base_url: &str, info: &Value) -> Vec<OperationDescriptor> {
    let base_url = base_url.trim_end_matches('/');
    let entries: Vec<(String, Option<&Value>)> = match info.get("named_endpoints") {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), Some(v))).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let name = item
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("fn_{idx}"));
                (name, Some(item))
            })
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|(raw_name, endpoint)| {
            let function = sanitize_name(raw_name.trim_start_matches('/'));
            if function.is_empty() {
                return None;
            }
            let description = endpoint
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Gradio function {function}"));
            let mut properties = Map::new();
            for (idx, param) in endpoint
                .and_then(|e| e.get("parameters"))
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .enumerate()
            {
                let name = ["parameter_name", "label"]
                    .iter()
                    .find_map(|k| param.get(*k).and_then(Value::as_str))
                    .map(sanitize_name)
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("arg_{idx}"));
                let schema = param
                    .get("type")
                    .filter(|t| t.is_object())
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                properties.insert(name, schema);
            }
            Some(OperationDescriptor {
                name: format!("gradio_{function}"),
                description,
                base_url: base_url.to_string(),
                path: format!("/run/{function}"),
                method: "POST".into(),
                input_schema: json!({ "type": "object", "properties": properties }),
                path_params: Vec::new(),
                requires_auth: false,
                category: "gradio".into(),
            })
        })
        .collect()
}

/// Keeps `[A-Za-z0-9_]`, folds everything else into single underscores.
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
