//! Registry behavior against a scripted fake tool
//!
//! The fake ghc-mod answers the version probe and serves canned browse
//! output, counting browse invocations in a file under the root.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use haskmate_backend::{
    BackendFactory, BackendOptions, BuildTool, LogNotifier, SymbolKind,
};
use haskmate_symbols::{ImportDescriptor, ImportItem, SymbolRegistry};

const FAKE_TOOL: &str = r#"
for arg in "$@"; do
  case "$arg" in
    version)
      echo "ghc-mod version 5.6.0.0 compiled by GHC 8.0.1"
      exit 0;;
    browse)
      echo run >> browse-count
      echo "foo :: Int -> Int"
      echo "bar :: String"
      echo "Tree :: data Tree a"
      echo "Leaf :: Tree a -- from:Tree"
      exit 0;;
    list)
      echo "Data.List"
      exit 0;;
  esac
done
exit 1
"#;

async fn registry_in(
    root: &Path,
    idle_ttl: Duration,
    sweep: Duration,
) -> Arc<SymbolRegistry> {
    let tool = root.join("fake-ghc-mod");
    std::fs::write(&tool, format!("#!/bin/sh\n{FAKE_TOOL}")).unwrap();
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&tool).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&tool, perms).unwrap();
    }

    let mut options = BackendOptions::new(root);
    options.tool_path = tool.to_string_lossy().into_owned();
    options.interactive = false;
    options.build_tool = BuildTool::None;
    let backend = BackendFactory::new(Arc::new(LogNotifier))
        .create(options)
        .await
        .unwrap();
    SymbolRegistry::with_timing(Arc::new(backend), idle_ttl, sweep)
}

fn browse_count(root: &Path) -> usize {
    std::fs::read_to_string(root.join("browse-count"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_concurrent_selects_share_one_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_in(dir.path(), Duration::from_secs(60), Duration::from_secs(60)).await;

    let import = ImportDescriptor::plain("Data.Things");
    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let import = import.clone();
        handles.push(tokio::spawn(async move {
            registry.select(&import, None, false).await.unwrap()
        }));
    }
    for handle in handles {
        assert!(!handle.await.unwrap().is_empty());
    }
    assert_eq!(browse_count(dir.path()), 1);
}

#[tokio::test]
async fn test_hiding_xor_semantics() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_in(dir.path(), Duration::from_secs(60), Duration::from_secs(60)).await;

    let mut import = ImportDescriptor::plain("M");
    import.list = Some(vec![ImportItem::Name("foo".to_string())]);

    let names = |rows: Vec<haskmate_symbols::CompletionSymbol>| {
        rows.into_iter().map(|r| r.qname).collect::<Vec<_>>()
    };

    let included = names(registry.select(&import, None, true).await.unwrap());
    assert_eq!(included, ["foo"]);

    import.hiding = true;
    let excluded = names(registry.select(&import, None, true).await.unwrap());
    assert!(!excluded.contains(&"foo".to_string()));
    assert!(excluded.contains(&"bar".to_string()));
}

#[tokio::test]
async fn test_qualified_and_unqualified_emission() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_in(dir.path(), Duration::from_secs(60), Duration::from_secs(60)).await;

    let mut import = ImportDescriptor::plain("Data.Things");
    import.alias = Some("T".to_string());

    let rows = registry.select(&import, None, false).await.unwrap();
    let foo: Vec<_> = rows.iter().filter(|r| r.symbol.name == "foo").collect();
    assert_eq!(foo.len(), 2);
    assert!(foo.iter().any(|r| r.qname == "T.foo"));
    assert!(foo.iter().any(|r| r.qname == "foo"));

    import.qualified = true;
    let rows = registry.select(&import, None, false).await.unwrap();
    let foo: Vec<_> = rows.iter().filter(|r| r.symbol.name == "foo").collect();
    assert_eq!(foo.len(), 1);
    assert_eq!(foo[0].qname, "T.foo");

    import.qualified = false;
    let rows = registry.select(&import, None, true).await.unwrap();
    let foo: Vec<_> = rows.iter().filter(|r| r.symbol.name == "foo").collect();
    assert_eq!(foo.len(), 1);
    assert_eq!(foo[0].qname, "foo");
}

#[tokio::test]
async fn test_kind_filter_restricts_rows() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_in(dir.path(), Duration::from_secs(60), Duration::from_secs(60)).await;

    let import = ImportDescriptor::plain("M");
    let rows = registry
        .select(&import, Some(SymbolKind::Type), true)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].symbol.name, "Tree");
}

#[tokio::test]
async fn test_save_refetches_owning_module() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_in(dir.path(), Duration::from_secs(60), Duration::from_secs(60)).await;

    let text = "module MyMod where\nimport Data.List\n";
    registry.register_buffer("MyMod.hs", text).await;
    // registration populated MyMod once
    tokio::time::sleep(Duration::from_millis(300)).await;
    let before = browse_count(dir.path());
    assert!(before >= 1);

    registry.buffer_saved(Path::new("MyMod.hs"), text).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(browse_count(dir.path()), before + 1);
}

#[tokio::test]
async fn test_idle_eviction_fires_hook_once() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_in(
        dir.path(),
        Duration::from_millis(200),
        Duration::from_millis(50),
    )
    .await;
    let evictions = Arc::new(AtomicUsize::new(0));
    {
        let evictions = Arc::clone(&evictions);
        registry.set_eviction_hook(move |_| {
            evictions.fetch_add(1, Ordering::SeqCst);
        });
    }

    let import = ImportDescriptor::plain("M");
    registry.select(&import, None, true).await.unwrap();
    assert!(registry.has_module("M").await);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!registry.has_module("M").await);
    assert_eq!(evictions.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(evictions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_buffer_destroy_drops_associations() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_in(dir.path(), Duration::from_secs(60), Duration::from_secs(60)).await;

    let text = "module MyMod where\n";
    registry.register_buffer("MyMod.hs", text).await;
    let module = registry.module("MyMod").await;
    assert!(module.has_buffer(Path::new("MyMod.hs")));

    // registering again is a no-op
    registry.register_buffer("MyMod.hs", text).await;
    assert_eq!(module.buffer_count(), 1);

    registry.remove_buffer(Path::new("MyMod.hs")).await;
    assert!(!module.has_buffer(Path::new("MyMod.hs")));
}
