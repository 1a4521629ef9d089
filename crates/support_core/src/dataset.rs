use std::collections::HashSet;

use serde_json::Value;

use crate::model::DatasetRow;

pub const DEFAULT_TOP_K: usize = 3;

/// Lowercased whitespace tokens.
fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

fn flatten(row: &DatasetRow) -> String {
    row.values()
        .filter_map(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ranks rows by how many distinct query tokens appear among the row's
/// field values. Rows with no shared token are dropped; equal counts keep
/// row order. The count is not normalized, so wide rows are favoured.
pub fn search_rows<'a>(query: &str, rows: &'a [DatasetRow], top_k: usize) -> Vec<(usize, &'a DatasetRow)> {
    let query_tokens = tokens(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &DatasetRow)> = rows
        .iter()
        .map(|row| (tokens(&flatten(row)).intersection(&query_tokens).count(), row))
        .filter(|(overlap, _)| *overlap > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(top_k);
    scored
}

/// `field:value` pairs for the first `n` fields of a row.
pub fn snippet(row: &DatasetRow, n: usize) -> String {
    row.iter()
        .take(n)
        .map(|(k, v)| match v {
            Value::String(s) => format!("{k}:{s}"),
            other => format!("{k}:{other}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
