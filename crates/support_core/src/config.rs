use serde::{Deserialize, Serialize};

use crate::model::Backend;

/// Minimum top score for answering straight from the FAQ. Dense and sparse
/// scores live on different scales, hence separate cutoffs. The sparse
/// values are empirical; validate them with `evaluate_cases`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub dense: f32,
    pub dense_fast: f32,
    pub sparse: f32,
    pub sparse_fast: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            dense: 0.40,
            dense_fast: 0.35,
            sparse: 0.05,
            sparse_fast: 0.03,
        }
    }
}

impl Thresholds {
    pub fn for_backend(&self, backend: Backend, fast_mode: bool) -> f32 {
        match (backend, fast_mode) {
            (Backend::Dense, false) => self.dense,
            (Backend::Dense, true) => self.dense_fast,
            (Backend::Sparse, false) => self.sparse,
            (Backend::Sparse, true) => self.sparse_fast,
        }
    }
}

pub const COMMON_QUESTIONS: &[&str] = &[
    "How do I reset my password?",
    "What are the working hours?",
    "How do I request leave?",
    "Who do I contact for payroll issues?",
    "How to change bank details?",
    "What is my leave balance?",
    "How do I get reimbursement?",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Reduced-latency mode: lower thresholds, shorter generations.
    pub fast_mode: bool,
    pub thresholds: Thresholds,
    pub faq_top_k: usize,
    pub dataset_top_k: usize,
    /// FAQ matches and dataset rows quoted in the generation prompt.
    pub prompt_faqs: usize,
    pub prompt_rows: usize,
    pub max_output_tokens: u32,
    pub fast_max_output_tokens: u32,
    pub temperature: f32,
    /// Questions with more words than this are not offered as suggestions.
    pub suggestion_max_words: usize,
    pub empty_query_message: String,
    pub fallback_message: String,
    pub no_answer_message: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            fast_mode: false,
            thresholds: Thresholds::default(),
            faq_top_k: 3,
            dataset_top_k: 3,
            prompt_faqs: 2,
            prompt_rows: 3,
            max_output_tokens: 250,
            fast_max_output_tokens: 150,
            temperature: 0.2,
            suggestion_max_words: 8,
            empty_query_message: "Please ask a question.".to_string(),
            fallback_message:
                "Sorry, I don't have an answer right now. Please contact HR at payroll@company.com."
                    .to_string(),
            no_answer_message: "I'm sorry, I couldn't find an answer to that question. \
                                Please try rephrasing or contact support."
                .to_string(),
        }
    }
}

impl AssistantConfig {
    pub fn threshold(&self, backend: Backend) -> f32 {
        self.thresholds.for_backend(backend, self.fast_mode)
    }

    pub fn output_tokens(&self) -> u32 {
        if self.fast_mode {
            self.max_output_tokens.min(self.fast_max_output_tokens)
        } else {
            self.max_output_tokens
        }
    }
}
