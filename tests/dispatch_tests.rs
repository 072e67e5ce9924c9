mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result as AnyResult;
use common::{CountingTool, FailingTool, SlowTool};
use osintmcp::{
    Cache, CacheBackend, ClientIdentity, Dispatcher, MemoryBackend, OsintError, RateLimiter,
    ToolDefinition, ToolRegistry,
};
use serde_json::json;

fn dispatcher_with(registry: Arc<ToolRegistry>, cache: Cache, limit: u32) -> Dispatcher {
    Dispatcher::new(registry, cache, Arc::new(RateLimiter::new(limit)))
}

#[tokio::test]
async fn second_identical_call_is_served_from_cache() -> AnyResult<()> {
    let registry = Arc::new(ToolRegistry::new());
    let (tool, calls) = CountingTool::new("counting");
    registry.register(tool)?;
    let dispatcher = dispatcher_with(Arc::clone(&registry), Cache::in_memory(), 5);
    let client = ClientIdentity::anonymous();

    let first = dispatcher
        .invoke("counting", json!({"domain": "example.com"}), &client)
        .await?;
    let second = dispatcher
        .invoke("counting", json!({"domain": "example.com"}), &client)
        .await?;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.meta["cached"], false);
    assert!(first.meta.contains_key("elapsed_ms"));
    assert_eq!(second.meta["cached"], true);
    assert_eq!(second.text, first.text);
    assert_eq!(second.data["domain"], "example.com");
    // only the miss consumed budget
    assert_eq!(dispatcher.limiter().remaining("counting"), 4);
    Ok(())
}

#[tokio::test]
async fn different_arguments_miss_the_cache() -> AnyResult<()> {
    let registry = Arc::new(ToolRegistry::new());
    let (tool, calls) = CountingTool::new("counting");
    registry.register(tool)?;
    let dispatcher = dispatcher_with(registry, Cache::in_memory(), 10);
    let client = ClientIdentity::anonymous();

    dispatcher.invoke("counting", json!({"domain": "a.example"}), &client).await?;
    dispatcher.invoke("counting", json!({"domain": "b.example"}), &client).await?;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn unknown_tool_lists_available_names() -> AnyResult<()> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(CountingTool::new("alpha").0)?;
    registry.register(CountingTool::new("beta").0)?;
    let dispatcher = dispatcher_with(registry, Cache::disabled(), 5);

    let err = dispatcher
        .invoke("gamma", json!({}), &ClientIdentity::anonymous())
        .await
        .unwrap_err();
    match err {
        OsintError::InvalidInput(message) => {
            assert!(message.contains("gamma"));
            assert!(message.contains("alpha"));
            assert!(message.contains("beta"));
        }
        other => panic!("expected invalid input, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn malformed_invocations_are_invalid_input() -> AnyResult<()> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(CountingTool::new("alpha").0)?;
    let dispatcher = dispatcher_with(registry, Cache::disabled(), 5);
    let client = ClientIdentity::anonymous();

    let empty = dispatcher.invoke("  ", json!({}), &client).await.unwrap_err();
    assert!(matches!(empty, OsintError::InvalidInput(_)));

    let not_a_map = dispatcher.invoke("alpha", json!([1, 2]), &client).await.unwrap_err();
    assert!(matches!(not_a_map, OsintError::InvalidInput(_)));

    // absent params behave like {}
    let ok = dispatcher.invoke("alpha", serde_json::Value::Null, &client).await?;
    assert_eq!(ok.text, "call 1");
    Ok(())
}

#[tokio::test]
async fn missing_scope_is_forbidden_even_on_cache_hit() -> AnyResult<()> {
    struct AdminTool;

    #[async_trait::async_trait]
    impl osintmcp::Tool for AdminTool {
        fn name(&self) -> &str {
            "admin_only"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::builder("admin_only")
                .cache_ttl(60)
                .required_scope("osint:admin")
                .build()
        }

        async fn execute(
            &self,
            _args: &osintmcp::ToolArgs,
            _client: &ClientIdentity,
        ) -> osintmcp::Result<osintmcp::ToolOutput> {
            Ok("secret".into())
        }
    }

    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(AdminTool))?;
    let dispatcher = dispatcher_with(registry, Cache::in_memory(), 5);

    let admin = ClientIdentity::new("ops", ["osint:read", "osint:admin"]);
    dispatcher.invoke("admin_only", json!({}), &admin).await?;

    let response = dispatcher
        .respond("admin_only", json!({}), &ClientIdentity::anonymous())
        .await;
    assert_eq!(response.error_code(), Some("forbidden"));
    assert_eq!(response.result.text, "not permitted");
    Ok(())
}

#[tokio::test]
async fn internal_failures_become_execution_failed() -> AnyResult<()> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(FailingTool {
        name: "broken",
        make_error: || OsintError::Other(anyhow::anyhow!("connection string postgres://admin:pw@db")),
    }))?;
    registry.register(Arc::new(FailingTool {
        name: "picky",
        make_error: || OsintError::invalid_input("`domain` is required"),
    }))?;
    registry.register(Arc::new(FailingTool {
        name: "unconfigured",
        make_error: || OsintError::unavailable("SHODAN_API_KEY is not configured"),
    }))?;
    let dispatcher = dispatcher_with(registry, Cache::disabled(), 10);
    let client = ClientIdentity::anonymous();

    let broken = dispatcher.respond("broken", json!({}), &client).await;
    assert_eq!(broken.error_code(), Some("execution_failed"));
    let message = &broken.error.as_ref().unwrap().message;
    assert!(!message.contains("postgres"));
    assert_eq!(broken.result.meta["status"], "error");
    assert!(broken.result.data.contains_key("error"));

    let picky = dispatcher.respond("picky", json!({}), &client).await;
    assert_eq!(picky.error_code(), Some("invalid_input"));
    assert_eq!(picky.error.unwrap().message, "`domain` is required");

    let unconfigured = dispatcher.respond("unconfigured", json!({}), &client).await;
    assert_eq!(unconfigured.error_code(), Some("unavailable"));
    Ok(())
}

#[tokio::test]
async fn rate_limit_is_a_distinct_error() -> AnyResult<()> {
    let registry = Arc::new(ToolRegistry::new());
    let (tool, calls) = CountingTool::uncached("limited");
    registry.register(tool)?;
    let dispatcher = dispatcher_with(registry, Cache::disabled(), 2);
    let client = ClientIdentity::anonymous();

    dispatcher.invoke("limited", json!({}), &client).await?;
    dispatcher.invoke("limited", json!({}), &client).await?;
    let response = dispatcher.respond("limited", json!({}), &client).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(response.error_code(), Some("rate_limited"));
    let details = response.error.unwrap().details.expect("retry details");
    assert_eq!(details["key"], "limited");
    assert!(details["retry_after_secs"].as_f64().unwrap() > 0.0);
    Ok(())
}

#[tokio::test]
async fn corrupted_cache_entry_is_discarded() -> AnyResult<()> {
    let registry = Arc::new(ToolRegistry::new());
    let (tool, calls) = CountingTool::new("counting");
    let key = osintmcp::Tool::cache_key(tool.as_ref(), &common::args(json!({"domain": "example.com"})));
    registry.register(tool)?;

    let backend = Arc::new(MemoryBackend::new());
    // valid JSON, wrong shape
    backend.insert_raw(&key, "42").await;
    let cache = Cache::new(Arc::clone(&backend) as Arc<dyn CacheBackend>);
    let dispatcher = dispatcher_with(registry, cache, 5);

    let result = dispatcher
        .invoke("counting", json!({"domain": "example.com"}), &ClientIdentity::anonymous())
        .await?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.meta["cached"], false);

    let stored = backend.get(&key).await?.expect("fresh entry written");
    assert!(stored.contains("call 1"));
    Ok(())
}

#[tokio::test]
async fn cache_outage_does_not_fail_invocations() -> AnyResult<()> {
    let registry = Arc::new(ToolRegistry::new());
    let (tool, calls) = CountingTool::new("counting");
    registry.register(tool)?;
    let dispatcher = dispatcher_with(registry, Cache::disabled(), 5);
    let client = ClientIdentity::anonymous();

    let first = dispatcher.invoke("counting", json!({"domain": "x.example"}), &client).await?;
    let second = dispatcher.invoke("counting", json!({"domain": "x.example"}), &client).await?;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(first.meta["cached"], false);
    assert_eq!(second.meta["cached"], false);
    Ok(())
}

#[tokio::test]
async fn slow_tools_hit_the_execution_timeout() -> AnyResult<()> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(SlowTool {
        delay: Duration::from_secs(5),
    }))?;
    let dispatcher = dispatcher_with(registry, Cache::in_memory(), 5)
        .with_execution_timeout(Duration::from_millis(50));

    let response = dispatcher
        .respond("slow", json!({}), &ClientIdentity::anonymous())
        .await;
    assert_eq!(response.error_code(), Some("execution_failed"));
    Ok(())
}

#[tokio::test]
async fn required_parameters_are_checked_before_execution() -> AnyResult<()> {
    struct NeedsDomain;

    #[async_trait::async_trait]
    impl osintmcp::Tool for NeedsDomain {
        fn name(&self) -> &str {
            "needs_domain"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::builder("needs_domain")
                .param("domain", json!({"type": "string"}), true)
                .build()
        }

        async fn execute(
            &self,
            _args: &osintmcp::ToolArgs,
            _client: &ClientIdentity,
        ) -> osintmcp::Result<osintmcp::ToolOutput> {
            Ok("ran".into())
        }
    }

    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(NeedsDomain))?;
    let dispatcher = dispatcher_with(registry, Cache::disabled(), 5);
    let response = dispatcher
        .respond("needs_domain", json!({"domain": null}), &ClientIdentity::anonymous())
        .await;
    assert_eq!(response.error_code(), Some("invalid_input"));
    assert!(response.error.unwrap().message.contains("domain"));
    Ok(())
}

#[tokio::test]
async fn scope_is_checked_before_required_parameters() -> AnyResult<()> {
    struct GuardedLookup;

    #[async_trait::async_trait]
    impl osintmcp::Tool for GuardedLookup {
        fn name(&self) -> &str {
            "guarded_lookup"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::builder("guarded_lookup")
                .param("target", json!({"type": "string"}), true)
                .required_scope("osint:admin")
                .build()
        }

        async fn execute(
            &self,
            _args: &osintmcp::ToolArgs,
            _client: &ClientIdentity,
        ) -> osintmcp::Result<osintmcp::ToolOutput> {
            Ok("ran".into())
        }
    }

    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(GuardedLookup))?;
    let dispatcher = dispatcher_with(registry, Cache::disabled(), 5);

    let response = dispatcher
        .respond("guarded_lookup", json!({}), &ClientIdentity::anonymous())
        .await;
    assert_eq!(response.error_code(), Some("forbidden"));
    assert!(!response.error.unwrap().message.contains("target"));

    let admin = ClientIdentity::new("ops", ["osint:read", "osint:admin"]);
    let missing = dispatcher.respond("guarded_lookup", json!({}), &admin).await;
    assert_eq!(missing.error_code(), Some("invalid_input"));
    Ok(())
}
