use std::borrow::Cow;

use super::descriptor::{Insertion, Placement};
use crate::anchor::Span;

pub fn splice(content: &str, span: Span, insertion: &Insertion) -> String {
    let (head_end, tail_start) = match insertion.placement {
        Placement::Before => (span.start, span.start),
        Placement::After => (span.end, span.end),
        Placement::Replace => (span.start, span.end),
    };
    let mut out = String::with_capacity(content.len() + insertion.text.len());
    out.push_str(&content[..head_end]);
    out.push_str(&insertion.text);
    out.push_str(&content[tail_start..]);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn detect(content: &str) -> Self {
        match content.find('\n') {
            Some(idx) if content[..idx].ends_with('\r') => Self::CrLf,
            _ => Self::Lf,
        }
    }

    pub fn apply(self, text: &str) -> Cow<'_, str> {
        if self == Self::Lf || !text.contains('\n') {
            return Cow::Borrowed(text);
        }
        let mut out = String::with_capacity(text.len() + text.len() / 16);
        let mut prev = None;
        for ch in text.chars() {
            if ch == '\n' && prev != Some('\r') {
                out.push('\r');
            }
            out.push(ch);
            prev = Some(ch);
        }
        Cow::Owned(out)
    }
}
