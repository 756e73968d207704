//! Grounded answer types.

use serde::{Deserialize, Serialize};

/// A web source referenced by an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Source URL
    pub url: String,
    /// Page title
    pub title: String,
}

/// Answer text with its citations.
///
/// Citation markers in `content` are `[n]`, where `n` is the 1-based
/// position of the source in `citations`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Answer text
    pub content: String,
    /// Sources in order of first reference
    pub citations: Vec<Citation>,
}
