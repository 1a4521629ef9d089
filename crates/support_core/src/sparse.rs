use std::collections::HashMap;

use crate::stopwords;

/// Upper bound on vocabulary size.
pub const MAX_FEATURES: usize = 50_000;

/// Sparse row: (term column, weight), sorted by column.
pub type SparseVec = Vec<(u32, f32)>;

/// Lowercased word tokens of at least two characters, English stop words
/// removed, expanded into unigrams and bigrams.
pub fn analyze(text: &str) -> Vec<String> {
    let stop = stopwords::english();
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() >= 2 && !stop.contains(w))
        .collect();

    let mut terms: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    terms.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

fn term_counts(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for term in analyze(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

/// TF-IDF with smoothed idf and L2-normalized rows.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    /// Fits the vocabulary and idf weights, returning the document-term rows.
    pub fn fit_transform<S: AsRef<str>>(docs: &[S], max_features: usize) -> (Self, Vec<SparseVec>) {
        let counts: Vec<HashMap<String, u32>> =
            docs.iter().map(|d| term_counts(d.as_ref())).collect();

        let mut df: HashMap<&str, u32> = HashMap::new();
        let mut total: HashMap<&str, u64> = HashMap::new();
        for doc in &counts {
            for (term, n) in doc {
                *df.entry(term).or_insert(0) += 1;
                *total.entry(term).or_insert(0) += *n as u64;
            }
        }

        let mut kept: Vec<&str> = df.keys().copied().collect();
        if kept.len() > max_features {
            kept.sort_by(|a, b| total[b].cmp(&total[a]).then_with(|| a.cmp(b)));
            kept.truncate(max_features);
        }
        kept.sort_unstable();

        let n_docs = docs.len() as f32;
        let idf = kept
            .iter()
            .map(|t| ((1.0 + n_docs) / (1.0 + df[t] as f32)).ln() + 1.0)
            .collect();
        let vocabulary = kept
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i as u32))
            .collect();

        let vectorizer = Self { vocabulary, idf };
        let rows = counts.iter().map(|c| vectorizer.weigh(c)).collect();
        (vectorizer, rows)
    }

    /// Projects text onto the fitted vocabulary. Unknown terms are ignored.
    pub fn transform(&self, text: &str) -> SparseVec {
        self.weigh(&term_counts(text))
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    fn weigh(&self, counts: &HashMap<String, u32>) -> SparseVec {
        let mut row: SparseVec = counts
            .iter()
            .filter_map(|(term, n)| {
                let col = *self.vocabulary.get(term)?;
                Some((col, *n as f32 * self.idf[col as usize]))
            })
            .collect();
        row.sort_unstable_by_key(|(col, _)| *col);

        let norm = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut row {
                *w /= norm;
            }
        }
        row
    }
}

/// Dot product of two column-sorted sparse rows.
pub fn sparse_dot(a: &[(u32, f32)], b: &[(u32, f32)]) -> f32 {
    let (mut i, mut j, mut acc) = (0, 0, 0.0f32);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                acc += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    acc
}

/// Fitted vectorizer plus the document-term matrix of the searchable FAQs.
#[derive(Debug, Clone)]
pub struct SparseIndex {
    vectorizer: TfidfVectorizer,
    rows: Vec<SparseVec>,
    /// Collection position of each row.
    positions: Vec<usize>,
}

impl SparseIndex {
    pub fn build(texts: &[(usize, String)]) -> Self {
        let docs: Vec<&str> = texts.iter().map(|(_, t)| t.as_str()).collect();
        let (vectorizer, rows) = TfidfVectorizer::fit_transform(&docs, MAX_FEATURES);
        Self {
            vectorizer,
            rows,
            positions: texts.iter().map(|(p, _)| *p).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vectorizer.vocabulary_len()
    }

    /// Returns `(position, cosine)` pairs with positive similarity, best first.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(usize, f32)> {
        let q = self.vectorizer.transform(query);
        if q.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .rows
            .iter()
            .zip(&self.positions)
            .map(|(row, pos)| (*pos, sparse_dot(&q, row)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        scored.retain(|(_, s)| *s > 0.0);
        scored
    }
}
