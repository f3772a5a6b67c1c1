use sqlnav_api::Code;
use sqlnav_core::config::CONFIG_FILE_NAME;
use sqlnav_core::{COUNT_UNKNOWN, RecomputeOutcome, SqlNavConfig, StartOptions, Workspace};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn solution(config: &str) -> TempDir {
    let dir = tempdir().unwrap();
    write(&dir.path().join("Data/Sql/orders/get.sql"), "select 1;");
    write(&dir.path().join("Data/Sql/orders/list.sql"), "select 2;");
    write(
        &dir.path().join("Data/SqlLoader.cs"),
        "namespace My.Data { public static class SqlLoader { public static string Load(string code) => code; } }",
    );
    write(
        &dir.path().join("App/Repo.cs"),
        "using My.Data;\nnamespace My.App {\n    class Repo {\n        public string Get() { return SqlLoader.Load(\"orders.get\"); }\n    }\n}\n",
    );
    write(&dir.path().join(CONFIG_FILE_NAME), config);
    dir
}

fn workspace(dir: &Path) -> Workspace {
    Workspace::with_options(dir, StartOptions { watch_files: false })
}

#[tokio::test]
async fn test_missing_config_disables_everything() {
    let dir = tempdir().unwrap();
    let ws = workspace(dir.path());
    assert!(!ws.reload().await);
    assert!(ws.prefix_search("").is_empty());
    assert!(ws.complete(r#"SqlLoader.Load("o"#, 17).is_empty());
    assert_eq!(ws.get_count(&Code::new("orders.get")), COUNT_UNKNOWN);
    assert_eq!(ws.recompute_now().await, None);
}

#[tokio::test]
async fn test_invalid_root_disables_everything() {
    let dir = solution(r#"{ "SQLRoot": "Missing" }"#);
    let ws = workspace(dir.path());
    assert!(!ws.reload().await);
    assert!(!ws.is_active());

    let dir = solution("{ broken");
    let ws = workspace(dir.path());
    assert!(!ws.reload().await);
}

#[tokio::test]
async fn test_index_features_without_loader_prefix() {
    let dir = solution(r#"{ "SQLRoot": "Data/Sql" }"#);
    let ws = workspace(dir.path());
    assert!(ws.reload().await);

    assert_eq!(
        ws.complete(r#"    SqlLoader.Load("orders.l"#, 29),
        vec![Code::new("orders.list")]
    );
    let line = r#"SqlLoader.Load("orders.get")"#;
    assert_eq!(
        ws.resolve_resource(line, 18),
        Some(dir.path().join("Data/Sql/orders/get.sql"))
    );
    assert_eq!(
        ws.lookup_code_by_path(&dir.path().join("Data/Sql/orders/list.sql")),
        Some(Code::new("orders.list"))
    );
    // Analysis is off
    assert!(!ws.analysis_enabled());
    assert_eq!(
        ws.reference_summary(&dir.path().join("Data/Sql/orders/get.sql")),
        None
    );
}

#[tokio::test]
async fn test_reference_counts() {
    let dir = solution(r#"{ "SQLRoot": "Data/Sql", "SqlLoaderMetaPrefix": "My.Data" }"#);
    let ws = workspace(dir.path());
    assert!(ws.reload().await);
    let get = dir.path().join("Data/Sql/orders/get.sql");

    assert_eq!(
        ws.reference_summary(&get).as_deref(),
        Some("Loading SQL references...")
    );
    // Nobody listens yet
    assert_eq!(ws.recompute_now().await, Some(RecomputeOutcome::NoSubscribers));

    ws.subscribe(|| {});
    let outcome = ws.recompute_now().await.unwrap();
    assert!(matches!(
        outcome,
        RecomputeOutcome::Completed { .. } | RecomputeOutcome::Busy
    ));
    if outcome == RecomputeOutcome::Busy {
        // The debounced pass scheduled by subscribe won the race
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }

    assert_eq!(ws.get_count(&Code::new("orders.get")), 1);
    assert_eq!(
        ws.reference_summary(&get).as_deref(),
        Some("orders.get: 1 references")
    );
    let refs = ws.references(&Code::new("orders.get"));
    assert_eq!(refs[0].file, dir.path().join("App/Repo.cs"));
    assert_eq!(refs[0].range.start_line, 3);

    // Only source documents make the map stale
    ws.document_changed(&dir.path().join("Data/Sql/orders/get.sql"));
    assert!(!ws.session().unwrap().analyzer().unwrap().is_stale());
    ws.document_changed(&dir.path().join("App/Repo.cs"));
    assert!(ws.session().unwrap().analyzer().unwrap().is_stale());
}

#[tokio::test]
async fn test_reconfigure_resets_analysis() {
    let dir = solution(r#"{ "SQLRoot": "Data/Sql", "SqlLoaderMetaPrefix": "My.Data" }"#);
    let ws = workspace(dir.path());
    assert!(ws.reload().await);
    ws.subscribe(|| {});
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    assert_eq!(ws.get_count(&Code::new("orders.get")), 1);

    let config = SqlNavConfig::with_root(dir.path(), Path::new("Data/Sql/orders"))
        .unwrap()
        .with_loader_type("My.Data.SqlLoader");
    ws.start(config).await.unwrap();

    assert_eq!(ws.get_count(&Code::new("orders.get")), COUNT_UNKNOWN);
    assert_eq!(ws.prefix_search(""), vec![Code::new("get"), Code::new("list")]);

    fs::remove_file(dir.path().join(CONFIG_FILE_NAME)).unwrap();
    assert!(!ws.reload().await);
    assert!(ws.prefix_search("").is_empty());
}

#[tokio::test]
async fn test_summary_only_for_indexed_resources() {
    let dir = solution(r#"{ "SQLRoot": "Data/Sql", "SqlLoaderMetaPrefix": "My.Data" }"#);
    write(&dir.path().join("Data/Sql/readme.md"), "# notes");
    let ws = workspace(dir.path());
    assert!(ws.reload().await);

    let sql = dir.path().join("Data/Sql");
    assert!(ws.reference_summary(&sql.join("orders/get.sql")).is_some());
    assert_eq!(ws.reference_summary(&sql.join("readme.md")), None);
    assert_eq!(ws.reference_summary(&sql.join("orders/missing.sql")), None);
    assert_eq!(ws.reference_summary(&dir.path().join("App/Repo.cs")), None);
}

#[tokio::test]
async fn test_listeners_survive_reload() {
    let dir = solution(r#"{ "SQLRoot": "Data/Sql", "SqlLoaderMetaPrefix": "My.Data" }"#);
    let ws = workspace(dir.path());
    assert!(ws.reload().await);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = ws.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // A changed configuration starts a new session with a fresh analyzer
    write(
        &dir.path().join(CONFIG_FILE_NAME),
        r#"{ "SQLRoot": "Data/Sql", "SqlLoaderMetaPrefix": "My.Data", "DebounceMs": 10 }"#,
    );
    assert!(ws.reload().await);
    let outcome = ws.recompute_now().await.unwrap();
    assert_ne!(outcome, RecomputeOutcome::NoSubscribers);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(ws.get_count(&Code::new("orders.get")), 1);

    assert!(ws.unsubscribe(id));
    assert!(!ws.unsubscribe(id));
    assert!(ws.reload().await);
    assert_eq!(
        ws.recompute_now().await,
        Some(RecomputeOutcome::NoSubscribers)
    );
}
