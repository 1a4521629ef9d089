pub mod config;
pub mod dataset;
pub mod dense;
pub mod embed;
pub mod error;
pub mod escalation;
pub mod eval;
pub mod index;
pub mod minilm_embed;
pub mod model;
pub mod policy;
pub mod provider;
pub mod sparse;
pub mod storage;
mod stopwords;

pub use config::{AssistantConfig, Thresholds, COMMON_QUESTIONS};
pub use dataset::search_rows;
pub use embed::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{CorpusError, ProviderError};
pub use escalation::is_escalation;
pub use eval::{evaluate_cases, EvalCase, EvalOutcome, EvalSummary, DEFAULT_REQUIRED_PASS_RATE};
pub use index::SearchIndex;
pub use minilm_embed::MiniLmEmbeddingProvider;
pub use model::{Answer, AnswerTier, Backend, DatasetRow, FaqMatch, FaqRecord, QueryMetadata, Tier};
pub use policy::Assistant;
pub use provider::{CompletionProvider, CompletionRequest, ProviderChain, ProviderSettings};
pub use storage::{load_dataset, load_faqs, load_faqs_file};
