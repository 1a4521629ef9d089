use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn bin(data: &Path) -> Command {
    let path = assert_cmd::cargo::cargo_bin!("support-agent");
    let mut cmd = Command::new(path);
    cmd.env_remove("RUST_LOG")
        .env_remove("FAST_MODE")
        .env_remove("EMBED_MODEL_PATH")
        .env_remove("EMBED_TOKENIZER_PATH")
        .args(["--offline", "--faqs"])
        .arg(data.join("faqs.json"))
        .arg("--faqs-fallback")
        .arg(data.join("missing.json"))
        .arg("--dataset")
        .arg(data.join("dataset.csv"));
    cmd
}

fn fixtures() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("faqs.json"),
        r#"[
            {"question": "What are the working hours?", "answer": "9:30 AM to 6:30 PM, Mon–Fri."},
            {"question": "How do I request leave?", "answer": "Submit it in the HR portal."},
            {"question": "Where is the cafeteria?", "answer": "Ground floor."}
        ]"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("dataset.csv"),
        "id,note,owner\n1,refund delayed,finance\n2,password reset,it\n",
    )
    .unwrap();
    dir
}

#[test]
fn ask_returns_faq_answer_with_metadata() {
    let dir = fixtures();
    let assert = bin(dir.path())
        .args(["--format", "json", "ask", "What are the working hours?"])
        .assert()
        .success();

    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: Value = serde_json::from_str(output.trim()).unwrap();
    assert_eq!(json["text"], "9:30 AM to 6:30 PM, Mon–Fri.");
    assert_eq!(json["metadata"]["escalate"], false);
    assert_eq!(json["metadata"]["tier"], "faq_match");
    assert_eq!(json["metadata"]["faq_count"], 3);
    assert_eq!(json["metadata"]["dataset_count"], 2);
}

#[test]
fn ask_flags_escalation_in_text_mode() {
    let dir = fixtures();
    bin(dir.path())
        .args(["ask", "Am I getting fired for taking leave?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[escalate]"));
}

#[test]
fn blank_question_prompts_for_input() {
    let dir = fixtures();
    bin(dir.path())
        .args(["ask", "   "])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Please ask a question."));
}

#[test]
fn dataset_snippet_when_no_faq_matches() {
    let dir = fixtures();
    bin(dir.path())
        .args(["ask", "refund status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- id:1, note:refund delayed, owner:finance"));
}

#[test]
fn suggest_pads_with_common_questions() {
    let dir = fixtures();
    let assert = bin(dir.path())
        .args(["--format", "json", "suggest", "--limit", "5"])
        .assert()
        .success();

    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let list: Vec<String> = serde_json::from_str(output.trim()).unwrap();
    assert_eq!(list.len(), 5);
    assert_eq!(list[0], "What are the working hours?");
    assert_eq!(list[3], "How do I reset my password?");
    let lowered: std::collections::HashSet<String> = list.iter().map(|s| s.to_lowercase()).collect();
    assert_eq!(lowered.len(), 5);
}

#[test]
fn search_lists_ranked_matches() {
    let dir = fixtures();
    let assert = bin(dir.path())
        .args(["--format", "json", "search", "cafeteria", "--top-k", "2"])
        .assert()
        .success();

    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let rows: Vec<Value> = serde_json::from_str(output.trim()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["question"], "Where is the cafeteria?");
    assert_eq!(rows[0]["rank"], 1);
}

#[test]
fn eval_fails_below_required_pass_rate() {
    let dir = fixtures();
    let cases = dir.path().join("cases.json");
    fs::write(
        &cases,
        r#"[
            {"case_id": "a", "question": "How do I request leave?", "expected_tier": "faq_match"},
            {"case_id": "b", "question": "parking", "expected_tier": "faq_match"}
        ]"#,
    )
    .unwrap();

    bin(dir.path())
        .args(["eval", "--cases"])
        .arg(&cases)
        .args(["--min-pass-rate", "0.9"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("passed=1"))
        .stderr(predicate::str::contains("below required"));

    bin(dir.path())
        .args(["eval", "--cases"])
        .arg(&cases)
        .args(["--min-pass-rate", "0.5"])
        .assert()
        .success();
}

#[test]
fn malformed_corpus_is_fatal() {
    let dir = fixtures();
    fs::write(dir.path().join("faqs.json"), "{not json").unwrap();
    bin(dir.path())
        .args(["ask", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed FAQ file"));
}

#[test]
fn ragged_dataset_rows_still_load() {
    let dir = fixtures();
    fs::write(
        dir.path().join("dataset.csv"),
        "id,note,owner\n1,refund delayed,ops\n2,password reset\n",
    )
    .unwrap();
    bin(dir.path())
        .args(["ask", "password reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- id:2, note:password reset"));
}

#[test]
fn unreadable_dataset_disables_fallback_search() {
    let dir = fixtures();
    fs::write(dir.path().join("dataset.csv"), b"id,note\n1,\xff\xfe\n").unwrap();
    let assert = bin(dir.path())
        .args(["--format", "json", "ask", "What are the working hours?"])
        .assert()
        .success()
        .stderr(predicate::str::contains("dataset unavailable"));

    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: Value = serde_json::from_str(output.trim()).unwrap();
    assert_eq!(json["metadata"]["tier"], "faq_match");
    assert_eq!(json["metadata"]["dataset_count"], 0);
}

#[test]
fn fast_mode_env_accepts_common_spellings() {
    let dir = fixtures();
    for value in ["1", "yes", "on", "true", "0", "off"] {
        bin(dir.path())
            .env("FAST_MODE", value)
            .args(["ask", "What are the working hours?"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("9:30 AM to 6:30 PM"));
    }
}

#[test]
fn fast_thresholds_only_apply_in_fast_mode() {
    let dir = fixtures();
    let tier = |fast: bool| {
        let mut cmd = bin(dir.path());
        if fast {
            cmd.arg("--fast");
        }
        let assert = cmd
            .args(["--sparse-fast-threshold", "0.99", "--format", "json"])
            .args(["ask", "How do I request leave?"])
            .assert()
            .success();
        let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
        let json: Value = serde_json::from_str(output.trim()).unwrap();
        json["metadata"]["tier"].as_str().unwrap().to_string()
    };

    assert_eq!(tier(false), "faq_match");
    assert_eq!(tier(true), "fallback");
}

#[test]
fn hash_embeddings_select_the_dense_backend() {
    let dir = fixtures();
    bin(dir.path())
        .args(["--hash-embeddings", "search", "Where is the cafeteria?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("backend=Some(Dense)"))
        .stdout(predicate::str::contains("1 score=").and(predicate::str::contains("question=Where is the cafeteria?")));
}
