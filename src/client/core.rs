// File: src/client/core.rs
//! HTTP client for the Google Tasks API v1.
use crate::cache::Cache;
use crate::client::auth::Authenticator;
use crate::client::middleware::{BaseHeadersLayer, BaseHeadersService};
use crate::context::SharedContext;
use crate::model::remote::{TaskListPage, TaskPage};
use crate::model::{RemoteTask, TaskList, TaskStatus};

use http::{Request, StatusCode};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceExt;
use tower_layer::Layer;

pub(crate) type HttpClient = Client<
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
    String,
>;

/// Build the shared hyper client: native roots, HTTPS with a plain-HTTP
/// fallback so test servers work.
pub(crate) fn build_http_client() -> Result<HttpClient, String> {
    let mut root_store = rustls::RootCertStore::empty();
    let result = rustls_native_certs::load_native_certs();
    root_store.add_parsable_certificates(result.certs);
    if root_store.is_empty() {
        return Err("No valid system certificates found.".to_string());
    }
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let https_connector = HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .build();

    Ok(Client::builder(TokioExecutor::new()).build(https_connector))
}

#[derive(Clone, Debug)]
pub struct TasksClient {
    pub ctx: SharedContext,
    base_url: String,
    auth: Authenticator,
    service: BaseHeadersService<HttpClient>,
}

impl TasksClient {
    pub fn new(ctx: SharedContext, base_url: &str, auth: Authenticator) -> Result<Self, String> {
        let http_client = build_http_client()?;
        let service = BaseHeadersLayer::new(format!("gsync/{}", env!("CARGO_PKG_VERSION")))
            .layer(http_client);
        Ok(Self {
            ctx,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            service,
        })
    }

    // --- TRANSPORT ---

    async fn send_raw(
        &self,
        method: &str,
        path_and_query: &str,
        body: Option<String>,
    ) -> Result<(StatusCode, Vec<u8>), String> {
        let token = self
            .auth
            .ensure_token()
            .await
            .map_err(|e| format!("auth error: {}", e))?;

        let uri = format!("{}{}", self.base_url, path_and_query);
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::AUTHORIZATION, format!("Bearer {}", token));
        if body.is_some() {
            builder = builder.header(http::header::CONTENT_TYPE, "application/json");
        }
        let req = builder
            .body(body.unwrap_or_default())
            .map_err(|e| e.to_string())?;

        let resp = self
            .service
            .clone()
            .oneshot(req)
            .await
            .map_err(|e| format!("transport error: {}", e))?;
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| format!("transport error: {}", e))?
            .to_bytes();
        Ok((status, bytes.to_vec()))
    }

    async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        path_and_query: &str,
        body: Option<String>,
    ) -> Result<T, String> {
        let (status, bytes) = self.send_raw(method, path_and_query, body).await?;
        if !status.is_success() {
            return Err(format!(
                "HTTP {} on {} {}",
                status.as_u16(),
                method,
                path_and_query
            ));
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            format!(
                "Invalid response for {} {}: {}",
                method, path_and_query, e
            )
        })
    }

    // --- TASK LISTS ---

    pub async fn list_tasklists(&self) -> Result<Vec<TaskList>, String> {
        let mut lists = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let path = match &page_token {
                Some(token) => format!("/users/@me/lists?pageToken={}", token),
                None => "/users/@me/lists".to_string(),
            };
            let page: TaskListPage = self.request_json("GET", &path, None).await?;
            lists.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(lists)
    }

    /// Find the task list titled `title`, creating it when absent. The
    /// title -> id mapping is cached; callers must treat a later 404 as a
    /// stale cache entry (see the sync engine).
    pub async fn ensure_tasklist(&self, title: &str) -> Result<TaskList, String> {
        if let Some(id) = Cache::lookup(self.ctx.as_ref(), title) {
            return Ok(TaskList {
                id,
                title: title.to_string(),
            });
        }

        let lists = self.list_tasklists().await?;
        let entries = lists.iter().map(|l| (l.title.as_str(), l.id.as_str()));
        if let Err(e) = Cache::record_all(self.ctx.as_ref(), entries) {
            log::warn!("Failed to update task list cache: {}", e);
        }
        if let Some(found) = lists.into_iter().find(|l| l.title == title) {
            return Ok(found);
        }

        log::info!("Creating task list '{}'", title);
        let body = serde_json::json!({ "title": title }).to_string();
        let created: TaskList = self
            .request_json("POST", "/users/@me/lists", Some(body))
            .await?;
        if let Err(e) = Cache::record(self.ctx.as_ref(), title, &created.id) {
            log::warn!("Failed to update task list cache: {}", e);
        }
        Ok(created)
    }

    // --- TASKS ---

    /// All tasks of a list whose parent matches `parent` (None = roots),
    /// completed ones included. The API has no parent filter, so filtering
    /// happens here.
    pub async fn list_tasks(
        &self,
        list_id: &str,
        parent: Option<&str>,
    ) -> Result<Vec<RemoteTask>, String> {
        let mut tasks = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let path = match &page_token {
                Some(token) => format!(
                    "/lists/{}/tasks?showCompleted=true&pageToken={}",
                    list_id, token
                ),
                None => format!("/lists/{}/tasks?showCompleted=true", list_id),
            };
            let page: TaskPage = self.request_json("GET", &path, None).await?;
            tasks.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        tasks.retain(|t| t.parent.as_deref() == parent);
        Ok(tasks)
    }

    /// Create a task (a subtask when `parent` is set; the API takes the
    /// parent as a query parameter).
    pub async fn insert_task(
        &self,
        list_id: &str,
        parent: Option<&str>,
        title: &str,
        completed: bool,
    ) -> Result<RemoteTask, String> {
        let path = match parent {
            Some(parent_id) => format!("/lists/{}/tasks?parent={}", list_id, parent_id),
            None => format!("/lists/{}/tasks", list_id),
        };
        let body = serde_json::to_string(&RemoteTask::new(title, completed))
            .map_err(|e| e.to_string())?;
        self.request_json("POST", &path, Some(body)).await
    }

    /// Mark an existing task completed. Partial update so a queued
    /// completion needs nothing but the ids.
    pub async fn complete_task(
        &self,
        list_id: &str,
        task_id: &str,
    ) -> Result<RemoteTask, String> {
        let path = format!("/lists/{}/tasks/{}", list_id, task_id);
        let body = serde_json::json!({
            "id": task_id,
            "status": TaskStatus::Completed,
        })
        .to_string();
        self.request_json("PATCH", &path, Some(body)).await
    }
}
