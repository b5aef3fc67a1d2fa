use std::path::{Path, PathBuf};

use crate::patch::{FilePatch, Outcome, PatchError};

#[derive(Debug)]
pub enum FileStatus {
    Done(FilePatch),
    Failed(PatchError),
}

#[derive(Debug)]
pub struct FileReport {
    pub file: PathBuf,
    pub label: Option<String>,
    pub status: FileStatus,
    pub dry_run: bool,
}

impl FileReport {
    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.status {
            FileStatus::Done(patch) => Some(&patch.outcome),
            FileStatus::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&PatchError> {
        match &self.status {
            FileStatus::Done(_) => None,
            FileStatus::Failed(err) => Some(err),
        }
    }

    pub fn is_unsatisfied(&self) -> bool {
        matches!(
            self.outcome(),
            Some(Outcome::AnchorNotFound { .. } | Outcome::GuardNotIntroduced { .. })
        )
    }

    pub fn status_name(&self) -> &'static str {
        match &self.status {
            FileStatus::Done(patch) => patch.outcome.as_str(),
            FileStatus::Failed(_) => "error",
        }
    }

    pub fn display_name(&self) -> String {
        let path = self.file.display();
        match &self.label {
            Some(label) => format!("{path} [{label}]"),
            None => path.to_string(),
        }
    }

    pub fn status_line(&self) -> String {
        let name = self.display_name();
        match &self.status {
            FileStatus::Done(patch) => match &patch.outcome {
                Outcome::Patched { applied, skipped } => {
                    let verb = if self.dry_run { "would patch" } else { "patched" };
                    let mut line = format!("{name}: {verb} ({applied} {})", plural(*applied, "edit"));
                    if *skipped > 0 {
                        line.push_str(&format!(", {skipped} optional skipped"));
                    }
                    line
                }
                Outcome::AlreadyApplied { token } => {
                    format!("{name}: already patched (guard `{token}` present)")
                }
                Outcome::AnchorNotFound { edit, anchor } => {
                    format!("{name}: anchor not found (edit {edit}: {anchor})")
                }
                Outcome::GuardNotIntroduced { token } => {
                    format!("{name}: guard not introduced (`{token}` missing after edits)")
                }
            },
            FileStatus::Failed(err) => format!("{name}: error: {err}"),
        }
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub patched: usize,
    pub already_applied: usize,
    pub anchor_not_found: usize,
    pub guard_not_introduced: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

#[derive(Debug)]
pub struct RunReport {
    pub root: PathBuf,
    pub files: Vec<FileReport>,
    pub fail_fast: bool,
    pub dry_run: bool,
    pub aborted: bool,
    pub total: usize,
}

impl RunReport {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts {
            not_attempted: self.total.saturating_sub(self.files.len()),
            ..RunCounts::default()
        };
        for file in &self.files {
            match &file.status {
                FileStatus::Done(patch) => match patch.outcome {
                    Outcome::Patched { .. } => counts.patched += 1,
                    Outcome::AlreadyApplied { .. } => counts.already_applied += 1,
                    Outcome::AnchorNotFound { .. } => counts.anchor_not_found += 1,
                    Outcome::GuardNotIntroduced { .. } => counts.guard_not_introduced += 1,
                },
                FileStatus::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }

    // Unreadable or unwritable files always fail the run; unsatisfied
    // descriptors only do under fail_fast.
    pub fn is_success(&self) -> bool {
        let counts = self.counts();
        let unsatisfied = counts.anchor_not_found + counts.guard_not_introduced;
        counts.failed == 0 && !(self.fail_fast && unsatisfied > 0)
    }

    pub fn summary_line(&self) -> String {
        let counts = self.counts();
        let patched_label = if self.dry_run { "would patch" } else { "patched" };
        let mut line = format!(
            "{} {}: {} {patched_label}, {} already patched, {} anchor not found, {} failed",
            self.files.len(),
            plural(self.files.len(), "file"),
            counts.patched,
            counts.already_applied,
            counts.anchor_not_found,
            counts.failed,
        );
        if counts.guard_not_introduced > 0 {
            line.push_str(&format!(
                ", {} guard not introduced",
                counts.guard_not_introduced
            ));
        }
        if self.aborted {
            line.push_str(&format!(
                " (stopped early, {} not attempted)",
                counts.not_attempted
            ));
        }
        line
    }
}
