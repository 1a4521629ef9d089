use serde::{Deserialize, Serialize};

/// A curated question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqRecord {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

impl FaqRecord {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Records with a blank question or answer never take part in search.
    pub fn is_searchable(&self) -> bool {
        !self.question.trim().is_empty() && !self.answer.trim().is_empty()
    }

    /// Text fed to both index backends.
    pub fn index_text(&self) -> String {
        format!("{} {}", self.question, self.answer)
    }
}

/// One row of the side dataset. Column order is preserved.
pub type DatasetRow = serde_json::Map<String, serde_json::Value>;

/// Which similarity backend an index was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Dense,
    Sparse,
}

/// The policy tier that produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerTier {
    EmptyQuery,
    FaqMatch,
    Generated,
    DatasetSnippet,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub escalate: bool,
    pub faq_count: usize,
    pub dataset_count: usize,
    pub tier: AnswerTier,
    pub top_score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub metadata: QueryMetadata,
}

/// A ranked similarity hit. `score` is only comparable within one backend.
#[derive(Debug, Clone, Copy)]
pub struct FaqMatch<'a> {
    pub score: f32,
    pub position: usize,
    pub faq: &'a FaqRecord,
}

/// Outcome of one answer tier.
#[derive(Debug, Clone, PartialEq)]
pub enum Tier<T> {
    Ready(T),
    Empty,
    Failed(String),
}
