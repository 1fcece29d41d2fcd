//! Full sync passes against a mocked Tasks API.
use chrono::{Duration, Utc};
use gsync::cache::Cache;
use gsync::client::TasksClient;
use gsync::client::auth::{Authenticator, ClientSecrets, StoredToken};
use gsync::context::{AppContext, SharedContext, TestContext};
use serial_test::serial;
use std::fs;
use std::sync::Arc;

fn seed_token(ctx: &dyn AppContext) {
    StoredToken {
        access_token: "test-access-token".to_string(),
        refresh_token: Some("test-refresh-token".to_string()),
        expiry: Utc::now() + Duration::hours(1),
    }
    .save(ctx)
    .unwrap();
}

fn make_client(ctx: &Arc<TestContext>, server_url: &str) -> TasksClient {
    let secrets = ClientSecrets {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        token_uri: Some(format!("{}/token", server_url)),
    };
    let shared: SharedContext = ctx.clone();
    let auth = Authenticator::new(shared.clone(), secrets, server_url).unwrap();
    TasksClient::new(shared, server_url, auth).unwrap()
}

#[tokio::test]
#[serial]
async fn test_sync_file_two_way() {
    let ctx = Arc::new(TestContext::new());
    seed_token(ctx.as_ref());

    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let dir = ctx.root.join("lists");
    fs::create_dir_all(&dir).unwrap();
    let file = dir.join("groceries.md");
    fs::write(&file, "# Groceries\n- [ ] milk\n- [x] bread\n").unwrap();

    let _lists = server
        .mock("GET", "/users/@me/lists")
        .with_header("content-type", "application/json")
        .with_body(r#"{"items":[{"id":"L1","title":"groceries"}]}"#)
        .create_async()
        .await;

    let _tasks = server
        .mock("GET", "/lists/L1/tasks?showCompleted=true")
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"items":[
                {"id":"t1","title":"milk","status":"completed"},
                {"id":"t2","title":"eggs","status":"needsAction"}
            ]}"#,
        )
        .create_async()
        .await;

    let insert = server
        .mock("POST", "/lists/L1/tasks")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "title": "bread",
            "status": "completed"
        })))
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"t3","title":"bread","status":"completed"}"#)
        .create_async()
        .await;

    let client = make_client(&ctx, &url);
    let report = client.sync_file(&file).await.unwrap();

    // Remote completion of "milk" lands in the file, remote-only "eggs" is
    // appended, locally-checked "bread" is pushed.
    assert_eq!(report.completed_remote, 0);
    assert_eq!(report.inserted_remote, 1);
    assert!(report.changed_local);
    assert!(report.warnings.is_empty());

    let content = fs::read_to_string(&file).unwrap();
    assert_eq!(
        content,
        "# Groceries\n- [x] milk\n- [x] bread\n- [ ] eggs\n"
    );

    insert.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_sync_file_completes_remote_task() {
    let ctx = Arc::new(TestContext::new());
    seed_token(ctx.as_ref());

    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let file = ctx.root.join("todo.md");
    fs::write(&file, "- [x] call mom\n").unwrap();

    let _lists = server
        .mock("GET", "/users/@me/lists")
        .with_body(r#"{"items":[{"id":"L9","title":"todo"}]}"#)
        .create_async()
        .await;

    let _tasks = server
        .mock("GET", "/lists/L9/tasks?showCompleted=true")
        .with_body(r#"{"items":[{"id":"t9","title":"call mom","status":"needsAction"}]}"#)
        .create_async()
        .await;

    let patch = server
        .mock("PATCH", "/lists/L9/tasks/t9")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "id": "t9",
            "status": "completed"
        })))
        .with_body(r#"{"id":"t9","title":"call mom","status":"completed"}"#)
        .create_async()
        .await;

    let client = make_client(&ctx, &url);
    let report = client.sync_file(&file).await.unwrap();

    assert_eq!(report.completed_remote, 1);
    assert_eq!(report.inserted_remote, 0);
    // The file already shows the final state; no rewrite happened.
    assert!(!report.changed_local);
    assert_eq!(fs::read_to_string(&file).unwrap(), "- [x] call mom\n");

    patch.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_sync_file_recovers_from_stale_cached_list_id() {
    let ctx = Arc::new(TestContext::new());
    seed_token(ctx.as_ref());

    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let file = ctx.root.join("todo.md");
    fs::write(&file, "- [ ] first task\n").unwrap();

    // Poison the cache with a list id that no longer exists remotely.
    Cache::record(ctx.as_ref(), "todo", "STALE").unwrap();

    let _stale = server
        .mock("GET", "/lists/STALE/tasks?showCompleted=true")
        .with_status(404)
        .create_async()
        .await;

    let _lists = server
        .mock("GET", "/users/@me/lists")
        .with_body(r#"{"items":[{"id":"L2","title":"todo"}]}"#)
        .create_async()
        .await;

    let _tasks = server
        .mock("GET", "/lists/L2/tasks?showCompleted=true")
        .with_body(r#"{"items":[]}"#)
        .create_async()
        .await;

    let insert = server
        .mock("POST", "/lists/L2/tasks")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "title": "first task",
            "status": "needsAction"
        })))
        .with_body(r#"{"id":"n1","title":"first task","status":"needsAction"}"#)
        .create_async()
        .await;

    let client = make_client(&ctx, &url);
    let report = client.sync_file(&file).await.unwrap();

    assert_eq!(report.inserted_remote, 1);
    assert_eq!(
        Cache::lookup(ctx.as_ref(), "todo"),
        Some("L2".to_string()),
        "cache must be repaired after the 404"
    );

    insert.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_sync_file_creates_missing_tasklist() {
    let ctx = Arc::new(TestContext::new());
    seed_token(ctx.as_ref());

    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let file = ctx.root.join("reading.md");
    fs::write(&file, "").unwrap();

    let _lists = server
        .mock("GET", "/users/@me/lists")
        .with_body(r#"{"items":[{"id":"L1","title":"unrelated"}]}"#)
        .create_async()
        .await;

    let create_list = server
        .mock("POST", "/users/@me/lists")
        .match_body(mockito::Matcher::PartialJson(
            serde_json::json!({"title": "reading"}),
        ))
        .with_body(r#"{"id":"NEW","title":"reading"}"#)
        .create_async()
        .await;

    let _tasks = server
        .mock("GET", "/lists/NEW/tasks?showCompleted=true")
        .with_body(r#"{"items":[]}"#)
        .create_async()
        .await;

    let client = make_client(&ctx, &url);
    let report = client.sync_file(&file).await.unwrap();

    assert_eq!(report.inserted_remote, 0);
    assert!(!report.changed_local);
    assert_eq!(Cache::lookup(ctx.as_ref(), "reading"), Some("NEW".to_string()));

    create_list.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_list_tasks_follows_pagination() {
    let ctx = Arc::new(TestContext::new());
    seed_token(ctx.as_ref());

    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let _page1 = server
        .mock("GET", "/lists/L1/tasks?showCompleted=true")
        .with_body(
            r#"{"items":[{"id":"t1","title":"one","status":"needsAction"}],
                "nextPageToken":"page2"}"#,
        )
        .create_async()
        .await;

    let _page2 = server
        .mock("GET", "/lists/L1/tasks?showCompleted=true&pageToken=page2")
        .with_body(r#"{"items":[{"id":"t2","title":"two","status":"completed"}]}"#)
        .create_async()
        .await;

    let client = make_client(&ctx, &url);
    let tasks = client.list_tasks("L1", None).await.unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].title, "one");
    assert_eq!(tasks[1].title, "two");
}
