//! Inline citation rewriting.
//!
//! The agent service marks grounded spans with opaque markers such as
//! `【3:0†source】` and lists the URL behind each marker as an annotation.
//! Markers are replaced with stable `[n]` indices numbered by first
//! appearance of each distinct URL.

use gateway_core::{AnswerResult, Citation};
use once_cell::sync::Lazy;
use regex::Regex;

#[allow(clippy::expect_used)]
static LEFTOVER_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"【[^】]*】").expect("valid marker regex"));

/// One `url_citation` annotation attached to answer text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlAnnotation {
    /// Marker text as it appears in the answer
    pub marker: String,
    /// Cited URL
    pub url: String,
    /// Page title, if the service supplied one
    pub title: Option<String>,
}

/// Replace citation markers with `[n]` and collect the cited sources.
///
/// Markers without a matching annotation are removed.
pub fn resolve_citations(text: &str, annotations: &[UrlAnnotation]) -> AnswerResult {
    let mut citations: Vec<Citation> = Vec::new();
    let mut content = text.to_string();

    for annotation in annotations {
        let index = match citations.iter().position(|c| c.url == annotation.url) {
            Some(existing) => existing + 1,
            None => {
                citations.push(Citation {
                    url: annotation.url.clone(),
                    title: annotation
                        .title
                        .clone()
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| annotation.url.clone()),
                });
                citations.len()
            }
        };

        if !annotation.marker.is_empty() {
            content = content.replace(&annotation.marker, &format!("[{index}]"));
        }
    }

    let content = LEFTOVER_MARKER.replace_all(&content, "").into_owned();
    AnswerResult { content, citations }
}
