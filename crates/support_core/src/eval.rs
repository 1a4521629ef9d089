use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::model::AnswerTier;
use crate::policy::Assistant;

pub const DEFAULT_REQUIRED_PASS_RATE: f32 = 0.85;

/// A labelled query for checking the match thresholds against a corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub case_id: String,
    pub question: String,
    pub expected_tier: AnswerTier,
    /// When set, the answer text must equal this exactly.
    #[serde(default)]
    pub expected_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalOutcome {
    pub case_id: String,
    pub passed: bool,
    pub actual_tier: AnswerTier,
    pub top_score: Option<f32>,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f32,
    pub outcomes: Vec<EvalOutcome>,
}

impl EvalSummary {
    pub fn meets(&self, required_pass_rate: f32) -> bool {
        self.pass_rate >= required_pass_rate
    }
}

/// Runs each case through the full answer policy.
pub fn evaluate_cases(assistant: &Assistant, cases: &[EvalCase]) -> EvalSummary {
    let outcomes: Vec<EvalOutcome> = cases
        .iter()
        .map(|case| {
            let start = Instant::now();
            let answer = assistant.answer(&case.question);
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            let passed = answer.metadata.tier == case.expected_tier
                && case
                    .expected_answer
                    .as_deref()
                    .map_or(true, |expected| expected == answer.text);

            EvalOutcome {
                case_id: case.case_id.clone(),
                passed,
                actual_tier: answer.metadata.tier,
                top_score: answer.metadata.top_score,
                latency_ms,
            }
        })
        .collect();

    let total = outcomes.len();
    let passed = outcomes.iter().filter(|o| o.passed).count();
    let pass_rate = if total == 0 {
        0.0
    } else {
        passed as f32 / total as f32
    };

    EvalSummary {
        total,
        passed,
        failed: total - passed,
        pass_rate,
        outcomes,
    }
}
