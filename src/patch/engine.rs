use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::descriptor::{Insertion, PatchDescriptor};
use super::guard::matched_token;
use super::splice::{LineEnding, splice};
use crate::anchor::Span;
use crate::store::{replace_file, sha256_hex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Patched { applied: usize, skipped: usize },
    AlreadyApplied { token: String },
    AnchorNotFound { edit: usize, anchor: String },
    GuardNotIntroduced { token: String },
}

impl Outcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Patched { .. } => "patched",
            Self::AlreadyApplied { .. } => "already_applied",
            Self::AnchorNotFound { .. } => "anchor_not_found",
            Self::GuardNotIntroduced { .. } => "guard_not_introduced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPatch {
    Patched {
        content: String,
        applied: usize,
        skipped: usize,
    },
    AlreadyApplied {
        token: String,
    },
    AnchorNotFound {
        edit: usize,
        anchor: String,
    },
    GuardNotIntroduced {
        token: String,
    },
}

/// Nothing is returned for a partially patched buffer: either every required
/// edit lands or the result is `AnchorNotFound`. Patched content must contain
/// a guard token, otherwise the next run would patch it again and the result
/// is `GuardNotIntroduced`.
pub fn patch_content(content: &str, descriptor: &PatchDescriptor) -> ContentPatch {
    if let Some(token) = matched_token(content, descriptor.guard()) {
        return ContentPatch::AlreadyApplied {
            token: token.to_string(),
        };
    }

    let line_ending = LineEnding::detect(content);
    let mut current = content.to_string();
    let mut applied = 0usize;
    let mut skipped = 0usize;
    let mut first_missing = None;

    for (idx, edit) in descriptor.edits().iter().enumerate() {
        let number = idx + 1;
        let anchor = edit.anchor();
        let Some(span) = anchor
            .locate(&current)
            .filter(|span| span_fits(&current, *span))
        else {
            if edit.is_optional() {
                debug!(edit = number, anchor = %anchor.describe(), "optional anchor missing, skipping edit");
                skipped += 1;
                first_missing.get_or_insert((number, anchor.describe()));
                continue;
            }
            return ContentPatch::AnchorNotFound {
                edit: number,
                anchor: anchor.describe(),
            };
        };

        let insertion = edit.insertion();
        current = match line_ending.apply(&insertion.text) {
            Cow::Borrowed(_) => splice(&current, span, insertion),
            Cow::Owned(text) => splice(&current, span, &Insertion::new(text, insertion.placement)),
        };
        applied += 1;
    }

    if applied == 0 {
        if let Some((edit, anchor)) = first_missing {
            return ContentPatch::AnchorNotFound { edit, anchor };
        }
    }
    if matched_token(&current, descriptor.guard()).is_none() {
        let token = descriptor.guard().tokens().join("`, `");
        debug!(applied, skipped, %token, "patched content lacks the guard");
        return ContentPatch::GuardNotIntroduced { token };
    }

    ContentPatch::Patched {
        content: current,
        applied,
        skipped,
    }
}

fn span_fits(content: &str, span: Span) -> bool {
    let fits = span.start <= span.end
        && span.end <= content.len()
        && content.is_char_boundary(span.start)
        && content.is_char_boundary(span.end);
    if !fits {
        warn!(start = span.start, end = span.end, len = content.len(), "locator returned an invalid span");
    }
    fits
}

#[derive(Debug)]
pub enum PatchError {
    FileNotFound { path: PathBuf },
    Unreadable { path: PathBuf, source: io::Error },
    WriteFailure { path: PathBuf, source: io::Error },
}

impl PatchError {
    pub fn path(&self) -> &Path {
        match self {
            Self::FileNotFound { path }
            | Self::Unreadable { path, .. }
            | Self::WriteFailure { path, .. } => path,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "file_not_found",
            Self::Unreadable { .. } => "unreadable",
            Self::WriteFailure { .. } => "write_failure",
        }
    }
}

impl std::fmt::Display for PatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileNotFound { path } => write!(f, "file not found: {}", path.display()),
            Self::Unreadable { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            Self::WriteFailure { path, source } => {
                write!(f, "cannot write {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for PatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FileNotFound { .. } => None,
            Self::Unreadable { source, .. } | Self::WriteFailure { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    Write,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub path: PathBuf,
    pub outcome: Outcome,
    pub written: bool,
    pub digest_before: String,
    pub digest_after: String,
}

/// Only a `Patched` outcome in `WriteMode::Write` touches the file.
pub fn apply_file(
    root: &Path,
    descriptor: &PatchDescriptor,
    mode: WriteMode,
) -> Result<FilePatch, PatchError> {
    let path = root.join(descriptor.file_path());
    let content = read_text(&path)?;
    let digest_before = sha256_hex(content.as_bytes());

    let (outcome, written, digest_after) = match patch_content(&content, descriptor) {
        ContentPatch::AlreadyApplied { token } => {
            debug!(path = %path.display(), %token, "guard present");
            (Outcome::AlreadyApplied { token }, false, digest_before.clone())
        }
        ContentPatch::AnchorNotFound { edit, anchor } => {
            debug!(path = %path.display(), edit, %anchor, "anchor not found");
            (
                Outcome::AnchorNotFound { edit, anchor },
                false,
                digest_before.clone(),
            )
        }
        ContentPatch::GuardNotIntroduced { token } => {
            warn!(path = %path.display(), %token, "edits would not introduce the guard; file left untouched");
            (
                Outcome::GuardNotIntroduced { token },
                false,
                digest_before.clone(),
            )
        }
        ContentPatch::Patched {
            content: patched,
            applied,
            skipped,
        } => {
            let written = match mode {
                WriteMode::Write => {
                    replace_file(&path, patched.as_bytes()).map_err(|source| {
                        PatchError::WriteFailure {
                            path: path.clone(),
                            source,
                        }
                    })?;
                    debug!(path = %path.display(), applied, skipped, "file rewritten");
                    true
                }
                WriteMode::DryRun => false,
            };
            (
                Outcome::Patched { applied, skipped },
                written,
                sha256_hex(patched.as_bytes()),
            )
        }
    };

    Ok(FilePatch {
        path,
        outcome,
        written,
        digest_before,
        digest_after,
    })
}

fn read_text(path: &Path) -> Result<String, PatchError> {
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            PatchError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PatchError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    String::from_utf8(bytes).map_err(|err| PatchError::Unreadable {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
    })
}
