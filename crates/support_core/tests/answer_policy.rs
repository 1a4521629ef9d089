use std::fs;
use std::sync::{Arc, Mutex};

use support_core::{
    load_dataset, load_faqs, AnswerTier, Assistant, AssistantConfig, Backend, CompletionProvider,
    CompletionRequest, HashEmbeddingProvider, ProviderChain, ProviderError, SearchIndex,
};
use tempfile::tempdir;

/// Records prompts and replies with a fixed text, or fails.
struct FakeProvider {
    reply: Option<String>,
    prompts: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl CompletionProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(request.clone());
        self.reply.clone().ok_or(ProviderError::EmptyOutput)
    }
}

fn write_fixtures(dir: &std::path::Path) {
    fs::write(
        dir.join("faqs.json"),
        r#"[
            {"question": "What are the working hours?", "answer": "9:30 AM to 6:30 PM, Mon–Fri."},
            {"question": "How do I reset my password?", "answer": "Use the self-service portal."},
            {"question": "   ", "answer": "ignored"}
        ]"#,
    )
    .unwrap();
    fs::write(
        dir.join("dataset.csv"),
        "id,note,owner,eta\n1,refund delayed,finance,3 days\n2,password reset,it,1 day\n",
    )
    .unwrap();
}

fn assistant_with(reply: Option<&str>, config: AssistantConfig) -> (Assistant, Arc<Mutex<Vec<CompletionRequest>>>) {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());
    let faqs = load_faqs(&dir.path().join("faqs_large.json"), &dir.path().join("faqs.json")).unwrap();
    let rows = load_dataset(&dir.path().join("dataset.csv")).unwrap();

    let prompts = Arc::new(Mutex::new(Vec::new()));
    let provider = FakeProvider {
        reply: reply.map(str::to_string),
        prompts: prompts.clone(),
    };
    let assistant = Assistant::new(
        faqs,
        rows,
        SearchIndex::sparse(),
        ProviderChain::new(vec![Box::new(provider)]),
        config,
    );
    (assistant, prompts)
}

#[test]
fn strong_match_skips_generation() {
    let (assistant, prompts) = assistant_with(Some("generated"), AssistantConfig::default());
    let answer = assistant.answer("What are the working hours?");

    assert_eq!(answer.text, "9:30 AM to 6:30 PM, Mon–Fri.");
    assert_eq!(answer.metadata.tier, AnswerTier::FaqMatch);
    assert_eq!(answer.metadata.faq_count, 3);
    assert_eq!(answer.metadata.dataset_count, 2);
    assert!(prompts.lock().unwrap().is_empty());
}

#[test]
fn weak_match_goes_to_the_provider_with_context() {
    let (assistant, prompts) = assistant_with(Some("Ask finance."), AssistantConfig::default());
    let answer = assistant.answer("refund delayed again");

    assert_eq!(answer.text, "Ask finance.");
    assert_eq!(answer.metadata.tier, AnswerTier::Generated);

    let sent = prompts.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].max_output_tokens, 250);
    assert!(sent[0].prompt.contains("Relevant records:"));
    assert!(sent[0].prompt.contains(r#""note":"refund delayed""#));
    assert!(sent[0].prompt.contains("User question: refund delayed again"));
}

#[test]
fn provider_failure_falls_through_to_dataset_snippet() {
    let (assistant, prompts) = assistant_with(None, AssistantConfig::default());
    let answer = assistant.answer("refund delayed again");

    assert_eq!(answer.metadata.tier, AnswerTier::DatasetSnippet);
    assert_eq!(
        answer.text,
        "I found these relevant records:\n- id:1, note:refund delayed, owner:finance"
    );
    assert_eq!(prompts.lock().unwrap().len(), 1);
}

#[test]
fn fast_mode_shortens_generation() {
    let config = AssistantConfig {
        fast_mode: true,
        ..AssistantConfig::default()
    };
    let (assistant, prompts) = assistant_with(Some("ok"), config);
    assistant.answer("refund delayed again");
    assert_eq!(prompts.lock().unwrap()[0].max_output_tokens, 150);
}

#[test]
fn escalation_flag_does_not_block_the_answer() {
    let (assistant, _) = assistant_with(None, AssistantConfig::default());
    let answer = assistant.answer("Am I getting fired for taking leave?");
    assert!(answer.metadata.escalate);
    assert_eq!(answer.metadata.tier, AnswerTier::Fallback);
}

#[test]
fn dense_backend_answers_exact_questions() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());
    let faqs = load_faqs(&dir.path().join("faqs.json"), &dir.path().join("none.json")).unwrap();

    let index = SearchIndex::new(Some(Arc::new(HashEmbeddingProvider::default())));
    let assistant = Assistant::new(
        faqs,
        Vec::new(),
        index,
        ProviderChain::default(),
        AssistantConfig::default(),
    );
    assert_eq!(assistant.index().backend(), Some(Backend::Dense));

    let answer = assistant.answer("How do I reset my password?");
    assert_eq!(answer.text, "Use the self-service portal.");
    assert!(answer.metadata.top_score.unwrap() >= 0.40);

    let hits = assistant.search("How do I reset my password?", 5);
    assert!(hits.len() <= 2);
    assert!(hits.iter().all(|h| !h.faq.question.trim().is_empty()));
}

#[test]
fn replacing_the_corpus_rebuilds_the_index() {
    let (mut assistant, _) = assistant_with(None, AssistantConfig::default());
    assistant.replace_faqs(vec![support_core::FaqRecord::new(
        "Where is the cafeteria?",
        "Ground floor.",
    )]);
    assert_eq!(assistant.answer("Where is the cafeteria?").text, "Ground floor.");
    assert_eq!(assistant.answer("What are the working hours?").metadata.tier, AnswerTier::Fallback);
}
