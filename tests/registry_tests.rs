mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::CountingTool;
use osintmcp::{ClientIdentity, OsintError, Tool, ToolRegistry};
use serde_json::json;

#[tokio::test]
async fn duplicate_names_keep_the_last_registration() {
    let registry = ToolRegistry::new();
    let (first, first_calls) = CountingTool::new("dup");
    let (second, second_calls) = CountingTool::new("dup");
    registry.register(first).unwrap();
    registry.register(second).unwrap();

    assert_eq!(registry.len(), 1);
    let tool = registry.get("dup").expect("registered");
    tool.execute(&common::args(json!({})), &ClientIdentity::anonymous())
        .await
        .unwrap();
    assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_names_are_rejected() {
    let registry = ToolRegistry::new();
    let err = registry.register(CountingTool::new("  ").0).unwrap_err();
    assert!(matches!(err, OsintError::InvalidInput(_)));
    assert!(registry.is_empty());
}

#[test]
fn unregister_and_listing() {
    let registry = ToolRegistry::new();
    registry.register(CountingTool::new("zeta").0).unwrap();
    registry.register(CountingTool::new("alpha").0).unwrap();

    assert_eq!(registry.list(), vec!["alpha".to_string(), "zeta".to_string()]);
    let names: Vec<String> = registry.list_definitions().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);

    assert!(registry.unregister("zeta"));
    assert!(!registry.unregister("zeta"));
    assert!(registry.get("zeta").is_none());
    assert!(registry.contains("alpha"));
}

#[test]
fn registration_is_visible_across_clones_of_the_handle() {
    let registry = Arc::new(ToolRegistry::new());
    let writer = Arc::clone(&registry);
    std::thread::spawn(move || writer.register(CountingTool::new("late").0).unwrap())
        .join()
        .unwrap();
    assert!(registry.get("late").is_some());
    assert_eq!(registry.get("late").unwrap().name(), "late");
}
