// File: ./src/cli.rs
//! Shared command-line interface logic: help text, the interactive loop
//! prompt, and the grep-style listing printed between passes.
use crate::storage::LocalStorage;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

pub fn print_help(binary_name: &str) {
    println!(
        "gsync v{} - Two-way synchronizer between Google Tasks and Markdown checklists",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [sync]        Run one synchronization pass", binary_name);
    println!(
        "    {} loop          Sync, list checklists, wait for Enter, repeat",
        binary_name
    );
    println!(
        "    {} auth          Authorize this machine with Google Tasks",
        binary_name
    );
    println!("    {} --help        Show this help message", binary_name);
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    -v, --verbose         Log per-file progress to stderr.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("FILES:");
    println!("    config.yaml           directory_paths, daily_path, daily_list_name, ...");
    println!("    credentials.json      OAuth client (Desktop app) from the Google Cloud console");
    println!("    token.json            Stored access/refresh token (written by 'gsync auth')");
    println!();
    println!("SYNC MODEL:");
    println!("    Every '<name>.md' in a configured directory mirrors the task list '<name>'.");
    println!("    Checkbox lines ('- [ ] title' / '- [x] title') mirror tasks by exact title.");
    println!("    Files in daily_path mirror subtasks of a per-file parent in the daily list.");
    println!("    Completion is a latch: checking a box (either side) completes it everywhere;");
    println!("    unchecking a box does not reopen the remote task.");
}

/// Ask the user whether to run another pass. Returns false when the prompt
/// cannot be read (EOF, closed stdin, interrupted read), which must stop the
/// loop without another sync.
pub fn prompt_continue<R: BufRead>(input: &mut R) -> bool {
    print!("Press Enter to sync again (Ctrl-C or EOF quits) ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => false, // EOF
        Ok(_) => true,
        Err(_) => false,
    }
}

/// Print every `*.md` file found one directory level below `root`,
/// grep-style: `path:line_number:line`.
pub fn print_markdown_listing(root: &Path) -> io::Result<()> {
    let mut subdirs: Vec<_> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    for dir in subdirs {
        let files = match LocalStorage::list_markdown_files(&dir) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Cannot list '{}': {}", dir.display(), e);
                continue;
            }
        };
        for file in files {
            match fs::read_to_string(&file) {
                Ok(content) => {
                    for (idx, line) in content.lines().enumerate() {
                        println!("{}:{}:{}", file.display(), idx + 1, line);
                    }
                }
                Err(e) => log::warn!("Cannot read '{}': {}", file.display(), e),
            }
        }
    }
    Ok(())
}
