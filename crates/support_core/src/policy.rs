use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::{AssistantConfig, COMMON_QUESTIONS};
use crate::dataset::{search_rows, snippet};
use crate::escalation::is_escalation;
use crate::index::SearchIndex;
use crate::model::{Answer, AnswerTier, DatasetRow, FaqMatch, FaqRecord, QueryMetadata, Tier};
use crate::provider::{CompletionRequest, ProviderChain};

/// Answers support questions from the FAQ corpus, the side dataset and,
/// when configured, a generative provider. Holds no per-query state.
pub struct Assistant {
    faqs: Vec<FaqRecord>,
    rows: Vec<DatasetRow>,
    index: SearchIndex,
    providers: ProviderChain,
    config: AssistantConfig,
}

impl Assistant {
    /// Builds the similarity index up front so no query pays for it.
    pub fn new(
        faqs: Vec<FaqRecord>,
        rows: Vec<DatasetRow>,
        index: SearchIndex,
        providers: ProviderChain,
        config: AssistantConfig,
    ) -> Self {
        index.build(&faqs);
        info!(
            faqs = faqs.len(),
            rows = rows.len(),
            backend = ?index.backend(),
            generation = !providers.is_empty(),
            fast_mode = config.fast_mode,
            "assistant ready"
        );
        Self {
            faqs,
            rows,
            index,
            providers,
            config,
        }
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Swaps in a new FAQ collection and rebuilds the index wholesale.
    pub fn replace_faqs(&mut self, faqs: Vec<FaqRecord>) {
        self.index.rebuild(&faqs);
        self.faqs = faqs;
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<FaqMatch<'_>> {
        self.index.search(query.trim(), &self.faqs, top_k)
    }

    /// Produces an answer for `query`. Every path ends in text; the worst
    /// case is the fixed fallback message.
    pub fn answer(&self, query: &str) -> Answer {
        let query = query.trim();
        let mut metadata = QueryMetadata {
            escalate: is_escalation(query),
            faq_count: self.faqs.len(),
            dataset_count: self.rows.len(),
            tier: AnswerTier::EmptyQuery,
            top_score: None,
        };

        if query.is_empty() {
            return Answer {
                text: self.config.empty_query_message.clone(),
                metadata,
            };
        }

        let sim = self.search(query, self.config.faq_top_k);
        metadata.top_score = sim.first().map(|m| m.score);

        let (tier, text) = if let Tier::Ready(text) = self.faq_tier(&sim) {
            (AnswerTier::FaqMatch, text)
        } else {
            let rows = self.dataset_tier(query);
            match self.generation_tier(query, &sim, &rows) {
                Tier::Ready(text) => (AnswerTier::Generated, text),
                Tier::Failed(reason) => {
                    debug!(reason = %reason, "generation failed");
                    self.fallback_tiers(&rows)
                }
                Tier::Empty => self.fallback_tiers(&rows),
            }
        };

        debug!(tier = ?tier, top_score = ?metadata.top_score, escalate = metadata.escalate, "answered");
        metadata.tier = tier;
        let text = if text.trim().is_empty() {
            self.config.no_answer_message.clone()
        } else {
            text
        };
        Answer { text, metadata }
    }

    fn fallback_tiers(&self, rows: &[&DatasetRow]) -> (AnswerTier, String) {
        match self.snippet_tier(rows) {
            Tier::Ready(text) => (AnswerTier::DatasetSnippet, text),
            Tier::Empty | Tier::Failed(_) => (AnswerTier::Fallback, self.config.fallback_message.clone()),
        }
    }

    fn faq_tier(&self, sim: &[FaqMatch<'_>]) -> Tier<String> {
        let (Some(top), Some(backend)) = (sim.first(), self.index.backend()) else {
            return Tier::Empty;
        };
        if top.score >= self.config.threshold(backend) {
            Tier::Ready(top.faq.answer.clone())
        } else {
            Tier::Empty
        }
    }

    fn dataset_tier(&self, query: &str) -> Vec<&DatasetRow> {
        search_rows(query, &self.rows, self.config.dataset_top_k)
            .into_iter()
            .map(|(_, row)| row)
            .collect()
    }

    fn generation_tier(&self, query: &str, sim: &[FaqMatch<'_>], rows: &[&DatasetRow]) -> Tier<String> {
        if self.providers.is_empty() {
            return Tier::Empty;
        }
        let request = CompletionRequest {
            prompt: self.build_prompt(query, sim, rows),
            max_output_tokens: self.config.output_tokens(),
            temperature: self.config.temperature,
        };
        self.providers.attempt(&request)
    }

    /// Grounding prompt: top FAQ matches, then matching dataset rows as
    /// compact JSON.
    pub fn build_prompt(&self, query: &str, sim: &[FaqMatch<'_>], rows: &[&DatasetRow]) -> String {
        let mut context = String::new();
        if !sim.is_empty() {
            context.push_str("Top matching FAQ:\n");
            for m in sim.iter().take(self.config.prompt_faqs) {
                context.push_str(&format!("Q: {}\nA: {}\n\n", m.faq.question, m.faq.answer));
            }
        }
        if !rows.is_empty() {
            context.push_str("Relevant records:\n");
            for row in rows.iter().take(self.config.prompt_rows) {
                let line = serde_json::to_string(row).unwrap_or_default();
                context.push_str(&line);
                context.push('\n');
            }
        }

        format!(
            "You are a helpful concise employee support assistant. Answer the user question \
             using only the provided context where possible. If no exact info exists, give \
             clear next steps.\n\nContext:\n{context}\nUser question: {query}\nAnswer:"
        )
    }

    fn snippet_tier(&self, rows: &[&DatasetRow]) -> Tier<String> {
        if rows.is_empty() {
            return Tier::Empty;
        }
        let mut lines = vec!["I found these relevant records:".to_string()];
        lines.extend(rows.iter().map(|row| format!("- {}", snippet(row, 3))));
        Tier::Ready(lines.join("\n"))
    }

    /// Short FAQ questions first, topped up from the common-question pool.
    /// Duplicates are removed ignoring case.
    pub fn suggestions(&self, limit: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(limit);

        let mut offer = |q: &str| {
            if out.len() < limit && seen.insert(q.to_lowercase()) {
                out.push(q.to_string());
            }
        };

        for faq in &self.faqs {
            let q = faq.question.trim();
            if !q.is_empty() && q.split_whitespace().count() <= self.config.suggestion_max_words {
                offer(q);
            }
        }
        for q in COMMON_QUESTIONS {
            offer(*q);
        }
        out
    }
}
