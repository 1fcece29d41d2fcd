// File: ./src/model/merge.rs
use crate::model::TaskStates;

/// Merge the local and remote views of one checklist.
///
/// Starts from the local states; a remote entry overrides iff the title is
/// unknown locally or the remote copy is completed. Completion is therefore
/// a latch: once either side marks a task done it stays done everywhere,
/// and a task never flips back to open through a merge.
pub fn merge_states(local: &TaskStates, remote: &TaskStates) -> TaskStates {
    let mut merged = local.clone();
    for (title, completed) in remote.iter() {
        if !merged.contains(title) || completed {
            merged.insert(title, completed);
        }
    }
    merged
}
