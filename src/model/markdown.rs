// File: ./src/model/markdown.rs
//! Checkbox-line parsing and content-preserving rewriting of Markdown
//! checklists.
//!
//! Only top-level GitHub-style checkboxes participate in sync: a line is a
//! checklist item iff it starts exactly with `- [ ] ` or `- [x] `. Headings,
//! prose, and indented boxes pass through untouched.

use crate::model::TaskStates;

pub const UNCHECKED_PREFIX: &str = "- [ ] ";
pub const CHECKED_PREFIX: &str = "- [x] ";

fn checkbox_line(line: &str) -> Option<(bool, &str)> {
    if let Some(rest) = line.strip_prefix(UNCHECKED_PREFIX) {
        return Some((false, rest.trim()));
    }
    if let Some(rest) = line.strip_prefix(CHECKED_PREFIX) {
        return Some((true, rest.trim()));
    }
    None
}

/// Extract the checklist state of a document. Duplicate titles collapse to
/// one entry with the last state winning; empty titles are ignored.
pub fn parse_states(content: &str) -> TaskStates {
    let mut states = TaskStates::new();
    for line in content.lines() {
        if let Some((completed, title)) = checkbox_line(line)
            && !title.is_empty()
        {
            states.insert(title, completed);
        }
    }
    states
}

/// Rewrite a document so its checkboxes reflect `merged`.
///
/// Checkbox lines whose title appears in `merged` are rewritten in place and
/// consume that state; every other line passes through unchanged. States left
/// unconsumed (titles that only exist remotely) are appended as new checkbox
/// lines at the end, in order.
pub fn apply_states(content: &str, merged: &TaskStates) -> String {
    let mut remaining = merged.clone();
    let mut out = String::with_capacity(content.len() + 64);

    for line in content.lines() {
        if let Some((_, title)) = checkbox_line(line)
            && let Some(completed) = remaining.remove(title)
        {
            out.push_str(if completed {
                CHECKED_PREFIX
            } else {
                UNCHECKED_PREFIX
            });
            out.push_str(title);
            out.push('\n');
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }

    for (title, completed) in remaining.iter() {
        out.push_str(if completed {
            CHECKED_PREFIX
        } else {
            UNCHECKED_PREFIX
        });
        out.push_str(title);
        out.push('\n');
    }

    out
}
