use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::anchor::AnchorSpec;
use crate::patch::{DescriptorError, Edit, Guard, Insertion, PatchDescriptor, Placement};

pub const DEFAULT_MANIFEST_FILE: &str = "anchorpatch.yml";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDefaults {
    pub root: Option<PathBuf>,
    pub fail_fast: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Manifest {
    pub root: Option<PathBuf>,
    pub fail_fast: Option<bool>,
    pub patches: Vec<PatchDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub fail_fast: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub root: PathBuf,
    pub fail_fast: bool,
    pub patches: Vec<PatchDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefaults {
    #[serde(default)]
    root: Option<String>,
    #[serde(default)]
    fail_fast: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    root: Option<String>,
    #[serde(default)]
    fail_fast: Option<bool>,
    #[serde(default)]
    patches: Vec<RawPatch>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPatch {
    file: String,
    #[serde(default)]
    label: Option<String>,
    guard: RawGuard,
    edits: Vec<RawEdit>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawGuard {
    One(String),
    Any(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEdit {
    #[serde(with = "serde_yaml::with::singleton_map")]
    anchor: RawAnchor,
    #[serde(default)]
    placement: Option<RawPlacement>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    text_file: Option<String>,
    #[serde(default)]
    optional: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawAnchor {
    LastOccurrence(String),
    FirstOccurrence(String),
    Replace(String),
    EndOfFile,
    EndOfFileTrimmed,
    Pattern(String),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawPlacement {
    Before,
    After,
    Replace,
}

impl From<RawPlacement> for Placement {
    fn from(value: RawPlacement) -> Self {
        match value {
            RawPlacement::Before => Self::Before,
            RawPlacement::After => Self::After,
            RawPlacement::Replace => Self::Replace,
        }
    }
}

impl From<RawGuard> for Guard {
    fn from(value: RawGuard) -> Self {
        match value {
            RawGuard::One(token) => Self::Token(token),
            RawGuard::Any(tokens) => Self::AnyOf(tokens),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Payload {
        path: PathBuf,
        source: std::io::Error,
    },
    InvalidEdit {
        file: String,
        edit: usize,
        message: String,
    },
    Descriptor {
        file: String,
        source: DescriptorError,
    },
    MissingRoot,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Yaml(err) => write!(f, "{err}"),
            Self::Payload { path, source } => {
                write!(f, "cannot read payload {}: {source}", path.display())
            }
            Self::InvalidEdit {
                file,
                edit,
                message,
            } => write!(f, "{file}: edit {edit}: {message}"),
            Self::Descriptor { file, source } => write!(f, "{file}: {source}"),
            Self::MissingRoot => write!(
                f,
                "no project root configured; pass --root, set `root` in the manifest, or in ~/.anchorpatch/config.yml"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

pub fn load_user_defaults(path: &Path, home: &Path) -> Result<UserDefaults, ConfigError> {
    if !path.is_file() {
        return Ok(UserDefaults::default());
    }
    let content = fs::read_to_string(path)?;
    let raw: RawDefaults = serde_yaml::from_str(&content)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    Ok(UserDefaults {
        root: raw.root.map(|root| resolve_path(&root, base_dir, home)),
        fail_fast: raw.fail_fast,
    })
}

pub fn load_manifest(path: &Path, home: &Path) -> Result<Manifest, ConfigError> {
    let content = fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    parse_manifest(&content, base_dir, home)
}

/// Relative `root` and `text_file` values resolve against `base_dir`.
pub fn parse_manifest(content: &str, base_dir: &Path, home: &Path) -> Result<Manifest, ConfigError> {
    let raw: RawManifest = serde_yaml::from_str(content)?;
    let mut patches = Vec::with_capacity(raw.patches.len());
    for patch in raw.patches {
        patches.push(patch.into_descriptor(base_dir, home)?);
    }
    Ok(Manifest {
        root: raw.root.map(|root| resolve_path(&root, base_dir, home)),
        fail_fast: raw.fail_fast,
        patches,
    })
}

impl RawPatch {
    fn into_descriptor(self, base_dir: &Path, home: &Path) -> Result<PatchDescriptor, ConfigError> {
        let mut edits = Vec::with_capacity(self.edits.len());
        for (idx, raw) in self.edits.into_iter().enumerate() {
            edits.push(raw.into_edit(&self.file, idx + 1, base_dir, home)?);
        }
        let descriptor = PatchDescriptor::new(
            expand_tilde(&self.file, home),
            self.guard.into(),
            edits,
        )
        .map_err(|source| ConfigError::Descriptor {
            file: self.file.clone(),
            source,
        })?;
        Ok(match self.label {
            Some(label) => descriptor.with_label(label),
            None => descriptor,
        })
    }
}

impl RawEdit {
    fn into_edit(
        self,
        file: &str,
        number: usize,
        base_dir: &Path,
        home: &Path,
    ) -> Result<Edit, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidEdit {
            file: file.to_string(),
            edit: number,
            message,
        };

        let text = match (self.text, self.text_file) {
            (Some(text), None) => text,
            (None, Some(text_file)) => {
                let path = resolve_path(&text_file, base_dir, home);
                fs::read_to_string(&path).map_err(|source| ConfigError::Payload { path, source })?
            }
            (Some(_), Some(_)) => {
                return Err(invalid("set either `text` or `text_file`, not both".to_string()));
            }
            (None, None) => return Err(invalid("missing `text` or `text_file`".to_string())),
        };

        let placement = match (self.placement, &self.anchor) {
            (Some(placement), _) => placement.into(),
            (None, RawAnchor::Replace(_)) => Placement::Replace,
            (None, _) => return Err(invalid("missing `placement`".to_string())),
        };

        let anchor = match self.anchor {
            RawAnchor::LastOccurrence(literal) => AnchorSpec::LastOccurrence(literal),
            RawAnchor::FirstOccurrence(literal) => AnchorSpec::FirstOccurrence(literal),
            RawAnchor::Replace(literal) => AnchorSpec::Replace(literal),
            RawAnchor::EndOfFile => AnchorSpec::end_of_file(),
            RawAnchor::EndOfFileTrimmed => AnchorSpec::end_of_file_trimmed(),
            RawAnchor::Pattern(source) => AnchorSpec::pattern(&source)
                .map_err(|err| invalid(format!("invalid pattern `{source}`: {err}")))?,
        };

        let edit = Edit::new(anchor, Insertion::new(text, placement));
        Ok(if self.optional { edit.optional() } else { edit })
    }
}

pub fn resolve_effective_config(
    manifest: Manifest,
    defaults: &UserDefaults,
    overrides: &Overrides,
    cwd: &Path,
) -> Result<EffectiveConfig, ConfigError> {
    let root = overrides
        .root
        .as_ref()
        .map(|root| cwd.join(root))
        .or(manifest.root)
        .or_else(|| defaults.root.clone())
        .ok_or(ConfigError::MissingRoot)?;
    let fail_fast = overrides
        .fail_fast
        .or(manifest.fail_fast)
        .or(defaults.fail_fast)
        .unwrap_or(false);
    Ok(EffectiveConfig {
        root,
        fail_fast,
        patches: manifest.patches,
    })
}

pub fn user_defaults_path(home: &Path) -> PathBuf {
    home.join(".anchorpatch").join("config.yml")
}

pub fn default_manifest_yaml() -> String {
    r#"# Project tree the patch paths are relative to.
root: ~/my-project
fail_fast: false
patches:
  - file: src/lib/api.ts
    label: api client
    guard: stuckRuns
    edits:
      - anchor:
          last_occurrence: "};"
        placement: replace
        text: "  stuckRuns: () => fetchApi(\"/api/runs/stuck\"),\n};\n"
  - file: src/index.css
    guard: stuck-banner
    edits:
      - anchor: end_of_file
        placement: after
        text: "\n.stuck-banner { color: orange; }\n"
"#
    .to_string()
}

pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(path)
}

fn resolve_path(raw: &str, base_dir: &Path, home: &Path) -> PathBuf {
    let expanded = expand_tilde(raw.trim(), home);
    if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    }
}
