use std::fmt;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn point(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }
}

pub trait Locate: fmt::Debug + Send + Sync {
    fn locate(&self, content: &str) -> Option<Span>;

    fn describe(&self) -> String;

    fn requires_replace(&self) -> bool {
        false
    }

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum AnchorSpec {
    LastOccurrence(String),
    FirstOccurrence(String),
    Replace(String),
    // With trimming, the span covers trailing whitespace so a replace swaps it out.
    EndOfFile { trim_trailing_whitespace: bool },
    Pattern(Regex),
}

impl AnchorSpec {
    pub fn last(literal: impl Into<String>) -> Self {
        Self::LastOccurrence(literal.into())
    }

    pub fn first(literal: impl Into<String>) -> Self {
        Self::FirstOccurrence(literal.into())
    }

    pub fn replace(literal: impl Into<String>) -> Self {
        Self::Replace(literal.into())
    }

    pub const fn end_of_file() -> Self {
        Self::EndOfFile {
            trim_trailing_whitespace: false,
        }
    }

    pub const fn end_of_file_trimmed() -> Self {
        Self::EndOfFile {
            trim_trailing_whitespace: true,
        }
    }

    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self::Pattern)
    }

    fn literal(&self) -> Option<&str> {
        match self {
            Self::LastOccurrence(literal)
            | Self::FirstOccurrence(literal)
            | Self::Replace(literal) => Some(literal),
            Self::EndOfFile { .. } | Self::Pattern(_) => None,
        }
    }
}

impl Locate for AnchorSpec {
    fn locate(&self, content: &str) -> Option<Span> {
        match self {
            Self::LastOccurrence(literal) => {
                if literal.is_empty() {
                    return None;
                }
                content
                    .rfind(literal.as_str())
                    .map(|start| Span::new(start, start + literal.len()))
            }
            Self::FirstOccurrence(literal) | Self::Replace(literal) => {
                if literal.is_empty() {
                    return None;
                }
                content
                    .find(literal.as_str())
                    .map(|start| Span::new(start, start + literal.len()))
            }
            Self::EndOfFile {
                trim_trailing_whitespace,
            } => {
                let end = content.len();
                if *trim_trailing_whitespace {
                    Some(Span::new(content.trim_end().len(), end))
                } else {
                    Some(Span::point(end))
                }
            }
            Self::Pattern(regex) => regex
                .find(content)
                .map(|found| Span::new(found.start(), found.end())),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::LastOccurrence(literal) => {
                format!("last occurrence of `{}`", literal.escape_debug())
            }
            Self::FirstOccurrence(literal) => {
                format!("first occurrence of `{}`", literal.escape_debug())
            }
            Self::Replace(literal) => format!("replacement of `{}`", literal.escape_debug()),
            Self::EndOfFile {
                trim_trailing_whitespace: false,
            } => "end of file".to_string(),
            Self::EndOfFile {
                trim_trailing_whitespace: true,
            } => "end of file (trailing whitespace trimmed)".to_string(),
            Self::Pattern(regex) => format!("pattern `{}`", regex.as_str()),
        }
    }

    fn requires_replace(&self) -> bool {
        matches!(self, Self::Replace(_))
    }

    fn validate(&self) -> Result<(), String> {
        match self.literal() {
            Some("") => Err("anchor literal is empty".to_string()),
            _ => Ok(()),
        }
    }
}

impl PartialEq for AnchorSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::LastOccurrence(a), Self::LastOccurrence(b))
            | (Self::FirstOccurrence(a), Self::FirstOccurrence(b))
            | (Self::Replace(a), Self::Replace(b)) => a == b,
            (
                Self::EndOfFile {
                    trim_trailing_whitespace: a,
                },
                Self::EndOfFile {
                    trim_trailing_whitespace: b,
                },
            ) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}
