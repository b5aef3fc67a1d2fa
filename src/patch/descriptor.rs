use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::anchor::Locate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
    Replace,
}

impl Placement {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub text: String,
    pub placement: Placement,
}

impl Insertion {
    pub fn new(text: impl Into<String>, placement: Placement) -> Self {
        Self {
            text: text.into(),
            placement,
        }
    }

    pub fn before(text: impl Into<String>) -> Self {
        Self::new(text, Placement::Before)
    }

    pub fn after(text: impl Into<String>) -> Self {
        Self::new(text, Placement::After)
    }

    pub fn replace(text: impl Into<String>) -> Self {
        Self::new(text, Placement::Replace)
    }
}

/// Marker whose presence means the patch is already in the file.
///
/// Matching is plain substring containment: a token that also shows up in a
/// comment or string literal counts as applied, so pick tokens that only the
/// inserted text introduces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Token(String),
    AnyOf(Vec<String>),
}

impl Guard {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(token.into())
    }

    pub fn tokens(&self) -> &[String] {
        match self {
            Self::Token(token) => std::slice::from_ref(token),
            Self::AnyOf(tokens) => tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Edit {
    anchor: Arc<dyn Locate>,
    insertion: Insertion,
    optional: bool,
}

impl Edit {
    pub fn new(anchor: impl Locate + 'static, insertion: Insertion) -> Self {
        Self::with_locator(Arc::new(anchor), insertion)
    }

    pub fn with_locator(anchor: Arc<dyn Locate>, insertion: Insertion) -> Self {
        Self {
            anchor,
            insertion,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn anchor(&self) -> &dyn Locate {
        self.anchor.as_ref()
    }

    pub fn insertion(&self) -> &Insertion {
        &self.insertion
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    EmptyPath,
    EmptyGuard,
    NoEdits,
    InvalidAnchor { edit: usize, message: String },
    PlacementMismatch { edit: usize, placement: Placement },
}

impl std::fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "descriptor has an empty file path"),
            Self::EmptyGuard => write!(f, "guard token must not be empty"),
            Self::NoEdits => write!(f, "descriptor declares no edits"),
            Self::InvalidAnchor { edit, message } => write!(f, "edit {edit}: {message}"),
            Self::PlacementMismatch { edit, placement } => write!(
                f,
                "edit {edit}: replace anchor cannot take `{}` placement",
                placement.as_str()
            ),
        }
    }
}

impl std::error::Error for DescriptorError {}

#[derive(Debug, Clone)]
pub struct PatchDescriptor {
    file_path: PathBuf,
    label: Option<String>,
    guard: Guard,
    edits: Vec<Edit>,
}

impl PatchDescriptor {
    pub fn new(
        file_path: impl Into<PathBuf>,
        guard: Guard,
        edits: Vec<Edit>,
    ) -> Result<Self, DescriptorError> {
        let file_path = file_path.into();
        if file_path.as_os_str().is_empty() {
            return Err(DescriptorError::EmptyPath);
        }
        let tokens = guard.tokens();
        if tokens.is_empty() || tokens.iter().any(|token| token.trim().is_empty()) {
            return Err(DescriptorError::EmptyGuard);
        }
        if edits.is_empty() {
            return Err(DescriptorError::NoEdits);
        }
        for (idx, edit) in edits.iter().enumerate() {
            let number = idx + 1;
            edit.anchor
                .validate()
                .map_err(|message| DescriptorError::InvalidAnchor {
                    edit: number,
                    message,
                })?;
            let placement = edit.insertion.placement;
            if edit.anchor.requires_replace() && placement != Placement::Replace {
                return Err(DescriptorError::PlacementMismatch {
                    edit: number,
                    placement,
                });
            }
        }

        Ok(Self {
            file_path,
            label: None,
            guard,
            edits,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }
}
