use crate::error::{CorpusError, Result};
use crate::model::{DatasetRow, FaqRecord};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Loads the FAQ collection from `primary`, or from `fallback` when the
/// primary file does not exist. Neither existing yields an empty collection.
/// A file that exists but does not parse is an error.
pub fn load_faqs(primary: &Path, fallback: &Path) -> Result<Vec<FaqRecord>> {
    let path = if primary.exists() { primary } else { fallback };
    if !path.exists() {
        warn!(
            primary = %primary.display(),
            fallback = %fallback.display(),
            "no FAQ file found, starting with an empty corpus"
        );
        return Ok(Vec::new());
    }

    let faqs = load_faqs_file(path)?;
    info!(path = %path.display(), faqs = faqs.len(), "loaded FAQ corpus");
    Ok(faqs)
}

/// Reads a JSON array of records, or one record per line for `.jsonl` files.
pub fn load_faqs_file(path: &Path) -> Result<Vec<FaqRecord>> {
    let file = File::open(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |source| CorpusError::Parse {
        path: path.to_path_buf(),
        source,
    };

    if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        let mut faqs = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| CorpusError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            faqs.push(serde_json::from_str(&line).map_err(parse_err)?);
        }
        return Ok(faqs);
    }

    serde_json::from_reader(BufReader::new(file)).map_err(parse_err)
}

/// Loads a CSV file with a header row into ordered field maps.
/// A missing file is not an error. Rows may be shorter or longer than the
/// header.
pub fn load_dataset(path: &Path) -> Result<Vec<DatasetRow>> {
    if !path.exists() {
        warn!(path = %path.display(), "no dataset file found, fallback search disabled");
        return Ok(Vec::new());
    }

    let csv_err = |source| CorpusError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        // short rows leave trailing columns null; extra fields are dropped
        let row: DatasetRow = headers
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let v = record.get(i).map_or(Value::Null, |v| Value::String(v.to_string()));
                (k.to_string(), v)
            })
            .collect();
        rows.push(row);
    }

    info!(path = %path.display(), rows = rows.len(), "loaded dataset");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn prefers_primary_then_fallback_then_empty() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("faqs_large.json");
        let fallback = dir.path().join("faqs.json");

        assert!(load_faqs(&primary, &fallback).unwrap().is_empty());

        fs::write(&fallback, r#"[{"question":"Q1","answer":"A1"}]"#).unwrap();
        let faqs = load_faqs(&primary, &fallback).unwrap();
        assert_eq!(faqs, vec![FaqRecord::new("Q1", "A1")]);

        fs::write(&primary, r#"[{"question":"Q2","answer":"A2","tags":["x"]}]"#).unwrap();
        let faqs = load_faqs(&primary, &fallback).unwrap();
        assert_eq!(faqs, vec![FaqRecord::new("Q2", "A2")]);
    }

    #[test]
    fn malformed_corpus_is_an_error() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("faqs.json");
        fs::write(&primary, "[{\"question\": ").unwrap();

        let err = load_faqs(&primary, &dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, CorpusError::Parse { .. }));
    }

    #[test]
    fn reads_jsonl_and_tolerates_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("faqs.jsonl");
        fs::write(
            &path,
            "{\"question\":\"Q1\",\"answer\":\"A1\"}\n\n{\"question\":\"Q2\"}\n",
        )
        .unwrap();

        let faqs = load_faqs_file(&path).unwrap();
        assert_eq!(faqs.len(), 2);
        assert!(faqs[0].is_searchable());
        assert!(!faqs[1].is_searchable());
    }

    #[test]
    fn dataset_keeps_column_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        fs::write(&path, "id,note,owner\n1,refund delayed,ops\n2,password reset,it\n").unwrap();

        let rows = load_dataset(&path).unwrap();
        assert_eq!(rows.len(), 2);
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["id", "note", "owner"]);
        assert_eq!(rows[1]["note"], "password reset");

        assert!(load_dataset(&dir.path().join("none.csv")).unwrap().is_empty());
    }

    #[test]
    fn ragged_rows_fill_missing_fields_with_null() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        fs::write(
            &path,
            "id,note,owner\n1,refund delayed,ops\n2,password reset\n3,vpn down,it,urgent\n",
        )
        .unwrap();

        let rows = load_dataset(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["note"], "password reset");
        assert_eq!(rows[1]["owner"], Value::Null);
        assert_eq!(rows[2].len(), 3);
        assert_eq!(rows[2]["owner"], "it");
    }
}
