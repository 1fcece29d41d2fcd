// Cached directory of remote task lists (title -> id).
//
// Looking up a list id would otherwise cost a `/users/@me/lists` round-trip
// per Markdown file. Entries can go stale when a list is deleted remotely;
// the sync engine forgets an entry when the API answers 404 for it.
//
// ⚠️ VERSION BUMP REQUIRED:
// Changes to the on-disk layout require incrementing CACHE_VERSION below to
// invalidate stale caches.
use crate::context::AppContext;
use crate::storage::LocalStorage;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Default)]
struct DirectoryData {
    // If this field is missing in the JSON (old cache), it defaults to 0.
    #[serde(default)]
    version: u32,
    #[serde(default)]
    lists: HashMap<String, String>,
}

pub struct Cache;

impl Cache {
    fn get_path(ctx: &dyn AppContext) -> Option<PathBuf> {
        ctx.get_cache_dir().ok().map(|dir| dir.join("tasklists.json"))
    }

    fn load_data(ctx: &dyn AppContext) -> DirectoryData {
        if let Some(path) = Self::get_path(ctx)
            && path.exists()
            && let Ok(data) = LocalStorage::with_lock(&path, || {
                let json = fs::read_to_string(&path)?;
                Ok(serde_json::from_str::<DirectoryData>(&json)?)
            })
            && data.version == CACHE_VERSION
        {
            return data;
        }
        // Missing, unreadable or version mismatch: start over.
        DirectoryData {
            version: CACHE_VERSION,
            lists: HashMap::new(),
        }
    }

    fn store_data(ctx: &dyn AppContext, data: &DirectoryData) -> Result<()> {
        if let Some(path) = Self::get_path(ctx) {
            LocalStorage::with_lock(&path, || {
                let json = serde_json::to_string_pretty(data)?;
                LocalStorage::atomic_write(&path, json)?;
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Look up the id of a task list by title.
    pub fn lookup(ctx: &dyn AppContext, title: &str) -> Option<String> {
        Self::load_data(ctx).lists.get(title).cloned()
    }

    /// Remember a title -> id mapping.
    pub fn record(ctx: &dyn AppContext, title: &str, id: &str) -> Result<()> {
        let mut data = Self::load_data(ctx);
        data.lists.insert(title.to_string(), id.to_string());
        Self::store_data(ctx, &data)
    }

    /// Remember a whole directory of mappings in one write.
    pub fn record_all<'a, I>(ctx: &dyn AppContext, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut data = Self::load_data(ctx);
        for (title, id) in entries {
            data.lists.insert(title.to_string(), id.to_string());
        }
        Self::store_data(ctx, &data)
    }

    /// Drop a mapping that turned out to be stale (e.g. 404 from the API).
    pub fn forget(ctx: &dyn AppContext, title: &str) {
        let mut data = Self::load_data(ctx);
        if data.lists.remove(title).is_some()
            && let Err(e) = Self::store_data(ctx, &data)
        {
            log::warn!("Failed to update task list cache: {}", e);
        }
    }
}
