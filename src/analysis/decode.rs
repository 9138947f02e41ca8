//! Response decoder: turns raw provider text into typed analysis results.
//!
//! Providers routinely wrap their answer in a fenced code block
//! (```` ```json ... ``` ````), sometimes with chatter around it, and sometimes
//! reply with something that is not the requested shape at all. All of that
//! is handled here as ordinary `Result` values.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use super::model::{AnalysisKind, AnalysisResult, BugReport, CommentedCode, ReviewReport};
use crate::error::DecodeError;

/// A reply that is exactly one fenced block, possibly language-tagged.
static WHOLE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_+.-]*[ \t]*\r?\n?(.*?)\r?\n?[ \t]*```$")
        .expect("static fence regex")
});

/// The first fenced block anywhere in the reply.
static INNER_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n(.*?)\r?\n?[ \t]*```")
        .expect("static fence regex")
});

/// Strip fenced-code delimiters. Text without fences comes back trimmed.
/// A reply holding several fenced blocks yields the first one.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(inner) = WHOLE_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        // The anchored match spans first-open to last-close; only trust it
        // when no other fence sits in between.
        if !inner.as_str().contains("```") {
            return inner.as_str().trim();
        }
    }

    if let Some(inner) = INNER_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        return inner.as_str().trim();
    }

    trimmed
}

/// Narrow to the outermost `{ ... }` so stray prose around the object is ignored.
fn json_object_bounds(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    let cleaned = strip_fences(raw);
    if cleaned.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_str(json_object_bounds(cleaned))?)
}

/// Decode a scored review reply.
pub fn decode_review(raw: &str) -> Result<ReviewReport, DecodeError> {
    let report: ReviewReport = decode_json(raw)?;
    if report.improvement_points.iter().any(|p| p.point.trim().is_empty()) {
        return Err(DecodeError::InvalidField {
            field: "improvementPoints",
            reason: "entry with empty point".into(),
        });
    }
    Ok(report)
}

/// Decode a bug-finder reply.
pub fn decode_bugs(raw: &str) -> Result<BugReport, DecodeError> {
    let mut report: BugReport = decode_json(raw)?;
    report.mistakes.retain(|m| !m.trim().is_empty());
    Ok(report)
}

/// Decode a commenting reply. The model returns bare code, not JSON.
pub fn decode_comments(raw: &str) -> Result<CommentedCode, DecodeError> {
    let cleaned = strip_fences(raw);
    if cleaned.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(CommentedCode {
        commented_code: cleaned.to_string(),
    })
}

/// Decode according to the job's analysis kind.
pub fn decode(kind: AnalysisKind, raw: &str) -> Result<AnalysisResult, DecodeError> {
    match kind {
        AnalysisKind::Review => decode_review(raw).map(AnalysisResult::Review),
        AnalysisKind::Bugs => decode_bugs(raw).map(AnalysisResult::Bugs),
        AnalysisKind::Comments => decode_comments(raw).map(AnalysisResult::Comments),
    }
}
