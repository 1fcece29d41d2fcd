// File: ./src/client/sync.rs
//! Synchronization engine: reconciles Markdown checklists with remote task
//! lists, and drains the offline journal before each pass.
use crate::cache::Cache;
use crate::client::core::TasksClient;
use crate::config::Config;
use crate::journal::{Journal, RemoteOp};
use crate::model::markdown;
use crate::model::merge::merge_states;
use crate::model::{RemoteTask, TaskStates};
use crate::storage::LocalStorage;

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};

/// Outcome of syncing one Markdown file.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub file: PathBuf,
    pub completed_remote: usize,
    pub inserted_remote: usize,
    pub changed_local: bool,
    pub warnings: Vec<String>,
}

/// Outcome of one whole sync pass.
#[derive(Debug, Default)]
pub struct PassSummary {
    pub reports: Vec<SyncReport>,
    pub warnings: Vec<String>,
}

fn is_transport_error(e: &str) -> bool {
    e.starts_with("transport error")
}

fn file_stem(path: &Path) -> Result<&str, String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| format!("Invalid file name: {}", path.display()))
}

impl TasksClient {
    /// Sync one Markdown file against the task list named after its stem.
    pub async fn sync_file(&self, path: &Path) -> Result<SyncReport, String> {
        let stem = file_stem(path)?;
        log::info!("Processing markdown file: {}", path.display());
        let content = LocalStorage::read_markdown(path).map_err(|e| e.to_string())?;
        let local = markdown::parse_states(&content);

        let mut list = self.ensure_tasklist(stem).await?;
        let remote_tasks = match self.list_tasks(&list.id, None).await {
            // A cached list id goes stale when the list is deleted remotely;
            // forget it and resolve the title again.
            Err(e) if e.contains("HTTP 404") => {
                Cache::forget(self.ctx.as_ref(), stem);
                list = self.ensure_tasklist(stem).await?;
                self.list_tasks(&list.id, None).await?
            }
            other => other?,
        };

        self.sync_states(path, &content, local, &list.id, None, &remote_tasks)
            .await
    }

    /// Sync one daily file: its checkboxes mirror the subtasks of a parent
    /// task named after the file inside the daily list.
    pub async fn sync_daily_file(
        &self,
        path: &Path,
        daily_list_id: &str,
    ) -> Result<SyncReport, String> {
        let stem = file_stem(path)?;
        log::info!("Processing daily markdown file: {}", path.display());
        let content = LocalStorage::read_markdown(path).map_err(|e| e.to_string())?;
        let local = markdown::parse_states(&content);

        let roots = self.list_tasks(daily_list_id, None).await?;
        let anchor = match roots.into_iter().find(|t| t.title == stem) {
            Some(task) => task,
            None => self.insert_task(daily_list_id, None, stem, false).await?,
        };

        let subtasks = self.list_tasks(daily_list_id, Some(&anchor.id)).await?;
        self.sync_states(
            path,
            &content,
            local,
            daily_list_id,
            Some(anchor.id),
            &subtasks,
        )
        .await
    }

    async fn sync_states(
        &self,
        path: &Path,
        content: &str,
        local: TaskStates,
        list_id: &str,
        parent: Option<String>,
        remote_tasks: &[RemoteTask],
    ) -> Result<SyncReport, String> {
        let mut report = SyncReport {
            file: path.to_path_buf(),
            ..Default::default()
        };

        let mut remote_states = TaskStates::new();
        for task in remote_tasks {
            if !task.title.is_empty() {
                remote_states.insert(&task.title, task.status.is_done());
            }
        }
        let merged = merge_states(&local, &remote_states);

        // Local write-back first: the file reflects the merge even if the
        // push below has to fall back to the journal.
        let updated = markdown::apply_states(content, &merged);
        if updated != content {
            LocalStorage::write_markdown(path, &updated).map_err(|e| e.to_string())?;
            report.changed_local = true;
        }

        // Remote push: complete what the merge completed, insert what the
        // remote side has never seen. Remote tasks are never un-completed.
        let mut leftovers = merged;
        for task in remote_tasks {
            if task.title.is_empty() {
                continue;
            }
            let Some(completed) = leftovers.remove(&task.title) else {
                continue;
            };
            if completed && !task.status.is_done() {
                match self.complete_task(list_id, &task.id).await {
                    Ok(_) => report.completed_remote += 1,
                    Err(e) if is_transport_error(&e) => {
                        Journal::push(
                            self.ctx.as_ref(),
                            RemoteOp::Complete {
                                list_id: list_id.to_string(),
                                task_id: task.id.clone(),
                                title: task.title.clone(),
                            },
                        )
                        .map_err(|e| e.to_string())?;
                        report
                            .warnings
                            .push(format!("Queued completion of '{}': {}", task.title, e));
                    }
                    Err(e) if e.contains("HTTP 404") => {
                        report.warnings.push(format!(
                            "Task '{}' vanished remotely; skipping completion",
                            task.title
                        ));
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        for (title, completed) in leftovers.iter() {
            match self
                .insert_task(list_id, parent.as_deref(), title, completed)
                .await
            {
                Ok(_) => report.inserted_remote += 1,
                Err(e) if is_transport_error(&e) => {
                    Journal::push(
                        self.ctx.as_ref(),
                        RemoteOp::Insert {
                            list_id: list_id.to_string(),
                            parent: parent.clone(),
                            title: title.to_string(),
                            completed,
                        },
                    )
                    .map_err(|e| e.to_string())?;
                    report
                        .warnings
                        .push(format!("Queued insert of '{}': {}", title, e));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// One full pass over everything the config names.
    pub async fn sync_all(&self, config: &Config) -> Result<PassSummary, String> {
        let mut summary = PassSummary::default();
        summary.warnings.extend(self.drain_journal().await);

        for dir in &config.directory_paths {
            log::info!("Processing directory: {}", dir);
            let files = match LocalStorage::list_markdown_files(dir.as_std_path()) {
                Ok(files) => files,
                Err(e) => {
                    summary
                        .warnings
                        .push(format!("Skipping directory '{}': {}", dir, e));
                    continue;
                }
            };

            let futures = files.into_iter().map(|path| {
                let client = self.clone();
                async move {
                    let result = client.sync_file(&path).await;
                    (path, result)
                }
            });
            let mut stream =
                stream::iter(futures).buffer_unordered(config.parallel_requests.max(1));
            while let Some((path, result)) = stream.next().await {
                match result {
                    Ok(report) => summary.reports.push(report),
                    Err(e) => summary
                        .warnings
                        .push(format!("Failed to sync '{}': {}", path.display(), e)),
                }
            }
        }

        if let Some(daily_dir) = &config.daily_path {
            self.sync_daily_dir(
                daily_dir.as_std_path(),
                &config.daily_list_name,
                &mut summary,
            )
            .await?;
        }

        Ok(summary)
    }

    async fn sync_daily_dir(
        &self,
        daily_dir: &Path,
        daily_list_name: &str,
        summary: &mut PassSummary,
    ) -> Result<(), String> {
        let daily_list = self.ensure_tasklist(daily_list_name).await?;

        // Materialize a file for every root task so remote-created days
        // show up locally.
        let roots = self.list_tasks(&daily_list.id, None).await?;
        for task in &roots {
            if task.title.is_empty() {
                continue;
            }
            if task.title.contains(['/', '\\']) {
                summary.warnings.push(format!(
                    "Daily task '{}' is not a usable file name; skipping",
                    task.title
                ));
                continue;
            }
            let file = daily_dir.join(format!("{}.md", task.title));
            if !file.exists() {
                LocalStorage::write_markdown(&file, "").map_err(|e| e.to_string())?;
                log::info!("Created daily file {}", file.display());
            }
        }

        let files = match LocalStorage::list_markdown_files(daily_dir) {
            Ok(files) => files,
            Err(e) => {
                summary.warnings.push(format!(
                    "Skipping daily directory '{}': {}",
                    daily_dir.display(),
                    e
                ));
                return Ok(());
            }
        };
        for path in files {
            match self.sync_daily_file(&path, &daily_list.id).await {
                Ok(report) => summary.reports.push(report),
                Err(e) => summary
                    .warnings
                    .push(format!("Failed to sync '{}': {}", path.display(), e)),
            }
        }
        Ok(())
    }

    /// Attempt to deliver queued remote operations. Returns warnings; a
    /// transport failure keeps the rest of the queue for the next pass.
    pub async fn drain_journal(&self) -> Vec<String> {
        let mut journal = Journal::load(self.ctx.as_ref());
        if journal.is_empty() {
            return Vec::new();
        }
        journal.compact();
        log::info!(
            "Draining {} queued remote operation(s)",
            journal.queue.len()
        );

        let mut warnings = Vec::new();
        while let Some(op) = journal.queue.first().cloned() {
            let (what, result) = match &op {
                RemoteOp::Complete {
                    list_id,
                    task_id,
                    title,
                } => (
                    format!("completion of '{}'", title),
                    self.complete_task(list_id, task_id).await.map(|_| ()),
                ),
                RemoteOp::Insert {
                    list_id,
                    parent,
                    title,
                    completed,
                } => (
                    format!("insert of '{}'", title),
                    self.insert_task(list_id, parent.as_deref(), title, *completed)
                        .await
                        .map(|_| ()),
                ),
            };
            match result {
                Ok(()) => {
                    journal.queue.remove(0);
                }
                Err(e) if e.contains("HTTP 4") => {
                    // Poison pill (gone or rejected); keeping it would block
                    // the queue forever.
                    warnings.push(format!("Dropping queued {}: {}", what, e));
                    journal.queue.remove(0);
                }
                Err(e) => {
                    warnings.push(format!("Keeping queued {}: {}", what, e));
                    break;
                }
            }
        }

        if let Err(e) = Journal::modify(self.ctx.as_ref(), |queue| *queue = journal.queue) {
            warnings.push(format!("Failed to persist journal: {}", e));
        }
        warnings
    }
}
