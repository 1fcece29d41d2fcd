//! Completion-latch semantics of the checklist merge, end to end through
//! the Markdown rewrite.
use gsync::model::markdown::{apply_states, parse_states};
use gsync::model::merge::merge_states;
use gsync::model::TaskStates;

fn states(entries: &[(&str, bool)]) -> TaskStates {
    let mut s = TaskStates::new();
    for (title, completed) in entries {
        s.insert(title, *completed);
    }
    s
}

#[test]
fn test_latch_never_reopens_a_task() {
    // Every combination where at least one side is done must end done.
    for (local_done, remote_done) in [(true, false), (false, true), (true, true)] {
        let merged = merge_states(
            &states(&[("task", local_done)]),
            &states(&[("task", remote_done)]),
        );
        assert_eq!(merged.get("task"), Some(true), "latch must hold");
    }

    // Both open stays open.
    let merged = merge_states(&states(&[("task", false)]), &states(&[("task", false)]));
    assert_eq!(merged.get("task"), Some(false));
}

#[test]
fn test_one_sided_titles_are_copied_both_ways() {
    let local = states(&[("local only", false)]);
    let remote = states(&[("remote only", false)]);

    let merged = merge_states(&local, &remote);
    assert_eq!(merged.get("local only"), Some(false));
    assert_eq!(merged.get("remote only"), Some(false));
}

#[test]
fn test_remote_completion_lands_in_the_file() {
    let doc = "# Inbox\n- [ ] pay rent\n- [ ] renew passport\n";
    let local = parse_states(doc);
    let remote = states(&[("pay rent", true)]);

    let merged = merge_states(&local, &remote);
    let out = apply_states(doc, &merged);
    assert_eq!(out, "# Inbox\n- [x] pay rent\n- [ ] renew passport\n");
}

#[test]
fn test_merge_is_stable_when_sides_agree() {
    let doc = "- [ ] a\n- [x] b\n";
    let local = parse_states(doc);
    let merged = merge_states(&local, &local);
    assert_eq!(apply_states(doc, &merged), doc);
}
