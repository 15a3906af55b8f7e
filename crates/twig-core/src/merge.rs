//! Three-way merge planning and conflict-marker synthesis.
//!
//! Nothing here touches the disk. [`plan`] decides what happens to every
//! path given the split point and both tips; [`conflict_content`] builds
//! the marked-up file for paths that changed on both sides.
//! `Repository::merge` validates the plan against the working copy and
//! applies it.

use std::collections::{BTreeMap, BTreeSet};

use crate::commit::Commit;

pub const MARKER_HEAD: &str = "<<<<<<< HEAD";
pub const MARKER_SPLIT: &str = "=======";
pub const MARKER_END: &str = ">>>>>>>";

/// What a merge does to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    /// Leave the current branch's version (or absence) alone.
    Keep,
    /// Deleted on the other side only: stage removal.
    Remove,
    /// Changed on the other side only: check out this blob and stage it.
    TakeOther(String),
    /// Changed differently on both sides.
    Conflict,
}

impl MergeAction {
    /// True if applying this action writes or deletes the working file.
    pub fn touches_worktree(&self) -> bool {
        !matches!(self, MergeAction::Keep)
    }
}

/// Result of `Repository::merge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The other branch is already an ancestor of the current one.
    AlreadyMerged,
    /// The current branch was moved to the other branch's commit.
    FastForward { commit: String },
    /// A merge commit was created. `conflicts` lists paths that were
    /// written with conflict markers.
    Merged { commit: String, conflicts: Vec<String> },
}

/// Decide the action for one path from its blob hash at the split point,
/// on the current branch, and on the other branch (`""` when absent).
pub fn classify(split: &str, head: &str, other: &str) -> MergeAction {
    if other == split || head == other {
        MergeAction::Keep
    } else if head == split && other.is_empty() {
        MergeAction::Remove
    } else if head == split {
        MergeAction::TakeOther(other.to_string())
    } else {
        MergeAction::Conflict
    }
}

/// Classify every path tracked by any of the three commits.
pub fn plan(split: &Commit, head: &Commit, other: &Commit) -> BTreeMap<String, MergeAction> {
    let paths: BTreeSet<&String> = split
        .tracked
        .keys()
        .chain(head.tracked.keys())
        .chain(other.tracked.keys())
        .collect();

    paths
        .into_iter()
        .map(|path| {
            let action = classify(
                split.blob(path).unwrap_or(""),
                head.blob(path).unwrap_or(""),
                other.blob(path).unwrap_or(""),
            );
            (path.clone(), action)
        })
        .collect()
}

/// Build the conflicted file for two versions of the same path.
///
/// Lines are compared by position only. Equal lines pass through; each run
/// of differing positions becomes one marked block; whatever is left over
/// on the longer side becomes a final block with the other half empty.
/// Lines split on `\n` alone, so a `\r` stays part of its line.
pub fn conflict_content(head: &str, other: &str) -> String {
    let head_lines = split_lines(head);
    let other_lines = split_lines(other);
    let common = head_lines.len().min(other_lines.len());

    let mut out = String::new();
    let mut run_start = None;

    for i in 0..common {
        if head_lines[i] == other_lines[i] {
            if let Some(start) = run_start.take() {
                push_block(&mut out, &head_lines[start..i], &other_lines[start..i]);
            }
            out.push_str(head_lines[i]);
            out.push('\n');
        } else if run_start.is_none() {
            run_start = Some(i);
        }
    }
    if let Some(start) = run_start {
        push_block(&mut out, &head_lines[start..common], &other_lines[start..common]);
    }

    if head_lines.len() > common || other_lines.len() > common {
        push_block(&mut out, &head_lines[common..], &other_lines[common..]);
    }

    out
}

/// Lines of `text` without their `\n`. A final newline does not start an
/// extra empty line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

fn push_block(out: &mut String, head: &[&str], other: &[&str]) {
    out.push_str(MARKER_HEAD);
    out.push('\n');
    for line in head {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(MARKER_SPLIT);
    out.push('\n');
    for line in other {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(MARKER_END);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn snapshot(entries: &[(&str, &str)]) -> Commit {
        Commit::with_timestamp(
            "t".into(),
            DateTime::<Utc>::UNIX_EPOCH,
            vec![],
            entries
                .iter()
                .map(|(p, h)| (p.to_string(), h.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_classify_table() {
        assert_eq!(classify("l", "h", "l"), MergeAction::Keep);
        assert_eq!(classify("l", "x", "x"), MergeAction::Keep);
        assert_eq!(classify("", "", ""), MergeAction::Keep);
        assert_eq!(classify("l", "l", ""), MergeAction::Remove);
        assert_eq!(classify("l", "l", "o"), MergeAction::TakeOther("o".into()));
        assert_eq!(classify("", "", "o"), MergeAction::TakeOther("o".into()));
        assert_eq!(classify("l", "h", "o"), MergeAction::Conflict);
        assert_eq!(classify("l", "", "o"), MergeAction::Conflict);
        assert_eq!(classify("", "h", "o"), MergeAction::Conflict);
    }

    #[test]
    fn test_plan_covers_union() {
        let split = snapshot(&[("same", "1"), ("gone", "2"), ("edited", "3")]);
        let head = snapshot(&[("same", "1"), ("gone", "2"), ("edited", "3"), ("mine", "4")]);
        let other = snapshot(&[("same", "1"), ("edited", "5"), ("theirs", "6")]);

        let plan = plan(&split, &head, &other);
        assert_eq!(plan.len(), 5);
        assert_eq!(plan["same"], MergeAction::Keep);
        assert_eq!(plan["gone"], MergeAction::Remove);
        assert_eq!(plan["edited"], MergeAction::TakeOther("5".into()));
        assert_eq!(plan["mine"], MergeAction::Keep);
        assert_eq!(plan["theirs"], MergeAction::TakeOther("6".into()));
        assert!(!plan["mine"].touches_worktree());
        assert!(plan["gone"].touches_worktree());
    }

    #[test]
    fn test_conflict_single_line() {
        assert_eq!(
            conflict_content("hello\n", "world\n"),
            "<<<<<<< HEAD\nhello\n=======\nworld\n>>>>>>>\n"
        );
    }

    #[test]
    fn test_conflict_keeps_matching_lines() {
        let merged = conflict_content("a\nb\nc\nd\n", "a\nB\nC\nd\n");
        assert_eq!(
            merged,
            "a\n<<<<<<< HEAD\nb\nc\n=======\nB\nC\n>>>>>>>\nd\n"
        );
    }

    #[test]
    fn test_conflict_excess_lines_form_final_block() {
        let merged = conflict_content("a\nb\n", "a\nb\nc\nd\n");
        assert_eq!(merged, "a\nb\n<<<<<<< HEAD\n=======\nc\nd\n>>>>>>>\n");

        let merged = conflict_content("x\ny\nz\n", "q\n");
        assert_eq!(
            merged,
            "<<<<<<< HEAD\nx\n=======\nq\n>>>>>>>\n<<<<<<< HEAD\ny\nz\n=======\n>>>>>>>\n"
        );
    }

    #[test]
    fn test_conflict_with_deleted_side() {
        assert_eq!(
            conflict_content("", "kept\n"),
            "<<<<<<< HEAD\n=======\nkept\n>>>>>>>\n"
        );
        assert_eq!(
            conflict_content("mine\n", ""),
            "<<<<<<< HEAD\nmine\n=======\n>>>>>>>\n"
        );
    }

    #[test]
    fn test_positional_comparison_flags_shifted_lines() {
        // An insertion at the top shifts every line; positional comparison
        // reports all of them.
        let merged = conflict_content("a\nb\n", "new\na\nb\n");
        assert_eq!(
            merged,
            "<<<<<<< HEAD\na\nb\n=======\nnew\na\n>>>>>>>\n<<<<<<< HEAD\n=======\nb\n>>>>>>>\n"
        );
    }

    #[test]
    fn test_conflict_keeps_carriage_returns() {
        assert_eq!(
            conflict_content("same\r\nmine\r\n", "same\r\ntheirs\r\n"),
            "same\r\n<<<<<<< HEAD\nmine\r\n=======\ntheirs\r\n>>>>>>>\n"
        );
        // A CRLF line and an LF line with the same text are different lines.
        assert_eq!(
            conflict_content("a\r\n", "a\n"),
            "<<<<<<< HEAD\na\r\n=======\na\n>>>>>>>\n"
        );
    }

    #[test]
    fn test_split_lines() {
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("a"), vec!["a"]);
        assert_eq!(split_lines("a\n\nb\n"), vec!["a", "", "b"]);
        assert_eq!(split_lines("x\r\n"), vec!["x\r"]);
    }
}
