// Locked, atomic file IO for Markdown checklists and app state files.
//
// Markdown files are shared with editors and other gsync processes (the
// interactive loop can overlap a manual run), so every read and write goes
// through an advisory lock on a sibling `.lock` file and writes land via
// tmp-file + rename.
use anyhow::Result;
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};

pub struct LocalStorage;

impl LocalStorage {
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    /// Run `f` while holding an exclusive advisory lock for `file_path`.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        file.lock_exclusive()?;
        let result = f();
        FileExt::unlock(&file)?;
        result
    }

    /// Atomic write: Write to .tmp file then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    /// Read a Markdown file under the lock so a concurrent sync cannot
    /// observe a half-renamed file.
    pub fn read_markdown(path: &Path) -> Result<String> {
        Self::with_lock(path, || Ok(fs::read_to_string(path)?))
    }

    /// Replace a Markdown file's contents (lock + atomic rename).
    pub fn write_markdown(path: &Path, content: &str) -> Result<()> {
        Self::with_lock(path, || Self::atomic_write(path, content))
    }

    /// Enumerate the `*.md` files directly inside `dir` (non-recursive),
    /// sorted by file name so sync passes are deterministic.
    pub fn list_markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "md") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
