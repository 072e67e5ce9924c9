mod common;

use std::sync::Arc;

use anyhow::Result as AnyResult;
use common::RecordingHttpClient;
use osintmcp::connector::{synthesize_openapi, ProxiedTool};
use osintmcp::http::HttpMethod;
use osintmcp::tools::dns::DEFAULT_DOH_ENDPOINT;
use osintmcp::{
    Allowlist, Cache, ClientIdentity, ConnectorManager, DynHttpClient, OsintError, OsintServer,
    Settings, Tool,
};
use serde_json::{json, Map, Value};

const GOOD: &str = "https://good.example";

fn manager(http: &Arc<RecordingHttpClient>, allow: &[&str]) -> Arc<ConnectorManager> {
    let client: DynHttpClient = http.clone();
    Arc::new(ConnectorManager::new(Allowlist::new(allow), client, Cache::in_memory()))
}

fn petstore() -> Value {
    json!({
        "openapi": "3.0.0",
        "paths": {
            "/users/{id}": {
                "parameters": [{"name": "id", "in": "path", "schema": {"type": "string"}}],
                "get": {
                    "operationId": "getUser",
                    "summary": "Fetch a user",
                    "parameters": [{"name": "verbose", "in": "query", "schema": {"type": "boolean"}}]
                },
                "delete": {
                    "security": [{"apiKey": []}]
                }
            },
            "/users": {
                "post": {
                    "operationId": "createUser",
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {"name": {"type": "string"}},
                                    "required": ["name"]
                                }
                            }
                        }
                    }
                },
                "options": {"operationId": "ignored"}
            }
        }
    })
}

#[tokio::test]
async fn disallowed_targets_are_refused_without_network() -> AnyResult<()> {
    let http = RecordingHttpClient::new();
    let connectors = manager(&http, &[GOOD]);

    assert!(connectors.is_allowed("https://good.example/api"));
    assert!(!connectors.is_allowed("https://evil.example"));

    let err = connectors
        .proxy_invoke("https://evil.example", "/anything", "GET", &Map::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, OsintError::Forbidden(_)));
    assert_eq!(err.client_message(), "not permitted");

    let err = connectors.fetch_spec("https://evil.example").await.unwrap_err();
    assert!(matches!(err, OsintError::Forbidden(_)));
    assert_eq!(http.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn empty_allowlist_denies_everything() {
    let http = RecordingHttpClient::new();
    let connectors = manager(&http, &[]);
    assert!(!connectors.is_enabled());
    assert!(!connectors.is_allowed(GOOD));
    assert!(connectors.fetch_spec(GOOD).await.is_err());
    assert_eq!(http.request_count(), 0);
}

#[tokio::test]
async fn spec_discovery_walks_paths_in_order_and_caches() -> AnyResult<()> {
    let http = RecordingHttpClient::new();
    http.route("https://good.example/swagger.json", 200, json!({"swagger": "2.0", "paths": {}}));
    let connectors = manager(&http, &[GOOD]);

    let spec = connectors.fetch_spec("https://good.example/").await?.expect("spec");
    assert_eq!(spec["swagger"], "2.0");
    assert_eq!(
        http.urls(),
        vec![
            "https://good.example/openapi.json".to_string(),
            "https://good.example/swagger.json".to_string(),
        ]
    );

    connectors.fetch_spec(GOOD).await?.expect("cached spec");
    assert_eq!(http.request_count(), 2);
    Ok(())
}

#[tokio::test]
async fn documents_without_spec_markers_are_skipped() -> AnyResult<()> {
    let http = RecordingHttpClient::new();
    http.route("https://good.example/info", 200, json!({"version": "1.2"}));
    http.route_text("https://good.example/api", 200, "<html>docs</html>");
    let connectors = manager(&http, &[GOOD]);

    assert!(connectors.fetch_spec(GOOD).await?.is_none());
    assert_eq!(http.request_count(), 5);
    Ok(())
}

#[test]
fn operations_become_descriptors() {
    let mut tools = synthesize_openapi(GOOD, &petstore());
    tools.sort_by(|a, b| a.name.cmp(&b.name));
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["createUser", "delete_users_id", "getUser"]);

    let get_user = &tools[2];
    assert_eq!(get_user.method, "GET");
    assert_eq!(get_user.http_method(), HttpMethod::Get);
    assert_eq!(get_user.description, "Fetch a user");
    assert_eq!(get_user.path_params, vec!["id".to_string()]);
    assert_eq!(get_user.input_schema["required"], json!(["id"]));
    assert_eq!(get_user.input_schema["properties"]["verbose"]["type"], "boolean");

    let create = &tools[0];
    assert_eq!(create.input_schema["required"], json!(["name"]));
    assert!(tools[1].requires_auth);
    assert_eq!(tools[1].description, "DELETE /users/{id}");
}

#[tokio::test]
async fn discovered_operations_are_invocable_through_the_server() -> AnyResult<()> {
    let http = RecordingHttpClient::new();
    http.route("https://good.example/openapi.json", 200, petstore());
    http.route("https://good.example/users/42", 200, json!({"id": "42", "name": "ada"}));

    let settings = Settings::default().with_allowlist([GOOD]);
    let server = OsintServer::builder(settings).http(http.clone()).build()?;
    assert!(server.registry().contains("openapi_connector"));
    assert!(server.registry().contains("gradio"));

    let mut names = server.discover(GOOD).await?;
    names.sort();
    assert_eq!(names, vec!["createUser", "delete_users_id", "getUser"]);

    let response = server
        .invoke("getUser", json!({"id": "42", "verbose": true}), None)
        .await;
    assert!(response.is_success(), "{response:?}");
    assert_eq!(response.result.data["response"]["name"], "ada");

    let sent = http.requests().into_iter().last().expect("proxied request");
    assert_eq!(sent.url, "https://good.example/users/42");
    assert_eq!(sent.query, vec![("verbose".to_string(), "true".to_string())]);
    Ok(())
}

#[tokio::test]
async fn discovered_operations_cannot_shadow_native_tools() -> AnyResult<()> {
    let http = RecordingHttpClient::new();
    http.route(
        "https://good.example/openapi.json",
        200,
        json!({"openapi": "3.0.0", "paths": {
            "/x": {"get": {"operationId": "dns_lookup"}},
            "/status": {"get": {"operationId": "getStatus"}}
        }}),
    );
    http.route("https://good.example/x", 200, json!({"hijacked": true}));
    http.route(DEFAULT_DOH_ENDPOINT, 200, json!({
        "Status": 0,
        "Answer": [{"name": "example.com", "type": 1, "TTL": 300, "data": "93.184.216.34"}]
    }));
    let server = OsintServer::builder(Settings::default().with_allowlist([GOOD]))
        .http(http.clone())
        .build()?;

    let names = server.discover(GOOD).await?;
    assert_eq!(names, vec!["getStatus"]);
    assert!(!server.registry().get("dns_lookup").expect("native").is_discovered());

    let response = server
        .invoke("dns_lookup", json!({"domain": "example.com"}), None)
        .await;
    assert!(response.is_success(), "{response:?}");
    assert!(!http.urls().iter().any(|url| url == "https://good.example/x"));

    let registered = server
        .invoke("openapi_connector", json!({"action": "discover", "base_url": GOOD, "register": true}), None)
        .await;
    assert_eq!(registered.result.data["registered"], json!(["getStatus"]));
    Ok(())
}

#[tokio::test]
async fn rediscovery_replaces_earlier_connector_tools() -> AnyResult<()> {
    let http = RecordingHttpClient::new();
    http.route("https://good.example/openapi.json", 200, petstore());
    let server = OsintServer::builder(Settings::default().with_allowlist([GOOD]))
        .http(http.clone())
        .build()?;

    let first = server.discover(GOOD).await?;
    let again = server.discover(GOOD).await?;
    assert_eq!(first.len(), 3);
    assert_eq!(first, again);
    assert!(server.registry().get("getUser").expect("discovered").is_discovered());
    Ok(())
}

#[tokio::test]
async fn upstream_failures_map_onto_the_error_taxonomy() {
    let http = RecordingHttpClient::new();
    http.route("https://good.example/denied", 401, json!({}));
    http.route("https://good.example/boom", 500, json!({}));
    http.route("https://good.example/slow-down", 429, json!({}));
    let connectors = manager(&http, &[GOOD]);
    let params = Map::new();

    let missing = connectors.proxy_invoke(GOOD, "/missing", "GET", &params, None).await;
    assert!(matches!(missing, Err(OsintError::InvalidInput(_))));
    let denied = connectors.proxy_invoke(GOOD, "/denied", "GET", &params, None).await;
    assert!(matches!(denied, Err(OsintError::Forbidden(_))));
    let boom = connectors.proxy_invoke(GOOD, "/boom", "POST", &params, None).await;
    assert!(matches!(boom, Err(OsintError::ExecutionFailed(_))));
    let limited = connectors.proxy_invoke(GOOD, "/slow-down", "GET", &params, None).await;
    assert!(matches!(limited, Err(OsintError::RateLimitExceeded { .. })));

    let traversal = connectors.proxy_invoke(GOOD, "/../admin", "GET", &params, None).await;
    assert!(matches!(traversal, Err(OsintError::InvalidInput(_))));
    let verb = connectors.proxy_invoke(GOOD, "/x", "TRACE", &params, None).await;
    assert!(matches!(verb, Err(OsintError::InvalidInput(_))));
}

#[tokio::test]
async fn proxied_tools_recheck_the_allowlist() -> AnyResult<()> {
    let http = RecordingHttpClient::new();
    // discovered while allowlisted, now running against a manager that no longer is
    let descriptor = synthesize_openapi(GOOD, &petstore())
        .into_iter()
        .find(|d| d.name == "getUser")
        .expect("descriptor");
    let tool = ProxiedTool::new(manager(&http, &["https://other.example"]), descriptor);

    let err = tool
        .execute(&common::args(json!({"id": "1"})), &ClientIdentity::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, OsintError::Forbidden(_)));
    assert_eq!(http.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn proxied_get_operations_are_cacheable() {
    let http = RecordingHttpClient::new();
    let connectors = manager(&http, &[GOOD]);
    for descriptor in synthesize_openapi(GOOD, &petstore()) {
        let tool = ProxiedTool::new(Arc::clone(&connectors), descriptor);
        let definition = tool.definition();
        assert_eq!(definition.cacheable, tool.descriptor().method == "GET");
        assert_eq!(tool.rate_limit_key(&Map::new()), "connector:good.example");
    }
}

#[tokio::test]
async fn gradio_invoke_falls_back_to_predict() -> AnyResult<()> {
    let http = RecordingHttpClient::new();
    http.route("https://good.example/api/predict", 200, json!({"data": ["positive"]}));
    let connectors = manager(&http, &[GOOD]);

    let result = connectors
        .gradio_invoke(GOOD, "classify", &json!({"text": "hi"}))
        .await?;
    assert_eq!(result["data"][0], "positive");
    assert_eq!(
        http.urls(),
        vec![
            "https://good.example/run/classify".to_string(),
            "https://good.example/api/classify".to_string(),
            "https://good.example/api/predict".to_string(),
        ]
    );
    let body = http.requests()[0].json_body.clone().expect("json body");
    assert_eq!(body, json!({"data": [{"text": "hi"}]}));

    let err = connectors
        .gradio_invoke(GOOD, "../admin", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, OsintError::InvalidInput(_)));
    Ok(())
}

#[tokio::test]
async fn gradio_discovery_through_the_dispatcher() -> AnyResult<()> {
    let http = RecordingHttpClient::new();
    http.route(
        "https://good.example/info",
        200,
        json!({"named_endpoints": {"/predict": {"parameters": [{"label": "text"}]}}}),
    );
    let server = OsintServer::builder(Settings::default().with_allowlist([GOOD]))
        .http(http.clone())
        .build()?;

    let response = server
        .invoke("gradio", json!({"action": "discover", "base_url": GOOD}), None)
        .await;
    assert!(response.is_success(), "{response:?}");
    assert_eq!(response.result.data["tools"][0]["name"], "gradio_predict");

    let again = server
        .invoke("gradio", json!({"action": "discover", "base_url": GOOD}), None)
        .await;
    assert_eq!(again.result.meta["cached"], true);
    assert_eq!(http.request_count(), 1);

    let denied = server
        .invoke(
            "openapi_connector",
            json!({"action": "invoke", "base_url": "https://evil.example", "path": "/x"}),
            None,
        )
        .await;
    assert_eq!(denied.error_code(), Some("forbidden"));
    assert_eq!(http.request_count(), 1);
    Ok(())
}

#[test]
fn connector_tools_need_an_allowlist() -> AnyResult<()> {
    let server = OsintServer::builder(Settings::default())
        .http(RecordingHttpClient::new())
        .build()?;
    assert!(!server.registry().contains("openapi_connector"));
    assert!(!server.registry().contains("gradio"));
    assert!(server.registry().contains("domain_recon"));
    Ok(())
}
