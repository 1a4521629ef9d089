use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};

use crate::dense::DenseIndex;
use crate::embed::EmbeddingProvider;
use crate::model::{Backend, FaqMatch, FaqRecord};
use crate::sparse::SparseIndex;

enum Built {
    Dense(DenseIndex),
    Sparse(SparseIndex),
}

/// Similarity backend for one FAQ collection.
///
/// The backend is chosen once: dense when an embedder is supplied and the
/// corpus encodes without error, sparse otherwise. The built structure lives
/// behind a `OnceLock`, so a lazy build on first search happens exactly once
/// even when several threads search at the same time, and it is read-only
/// afterwards. `rebuild` takes `&mut self`, which rules out a rebuild racing
/// a search.
pub struct SearchIndex {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    built: OnceLock<Built>,
}

impl SearchIndex {
    pub fn new(embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            embedder,
            built: OnceLock::new(),
        }
    }

    /// Sparse-only index.
    pub fn sparse() -> Self {
        Self::new(None)
    }

    /// Builds for `faqs` unless already built. An empty (or fully blank)
    /// collection leaves the index absent.
    pub fn build(&self, faqs: &[FaqRecord]) {
        if self.is_built() {
            return;
        }
        let texts = searchable_texts(faqs);
        if texts.is_empty() {
            debug!("no searchable FAQs, index left absent");
            return;
        }
        self.built.get_or_init(|| self.build_backend(&texts));
    }

    /// Discards the current structure and builds for a new collection.
    pub fn rebuild(&mut self, faqs: &[FaqRecord]) {
        self.built = OnceLock::new();
        self.build(faqs);
    }

    /// Backend in use, or `None` while the index is absent.
    pub fn backend(&self) -> Option<Backend> {
        self.built.get().map(|b| match b {
            Built::Dense(_) => Backend::Dense,
            Built::Sparse(_) => Backend::Sparse,
        })
    }

    pub fn is_built(&self) -> bool {
        self.built.get().is_some()
    }

    fn build_backend(&self, texts: &[(usize, String)]) -> Built {
        if let Some(embedder) = &self.embedder {
            match DenseIndex::build(embedder.as_ref(), texts) {
                Ok(dense) => {
                    info!(
                        embedder = embedder.name(),
                        vectors = dense.len(),
                        dim = dense.dim(),
                        "dense index built"
                    );
                    return Built::Dense(dense);
                }
                Err(err) => {
                    warn!(error = %err, "dense index build failed, using TF-IDF");
                }
            }
        }

        let sparse = SparseIndex::build(texts);
        info!(
            rows = sparse.len(),
            vocabulary = sparse.vocabulary_len(),
            "TF-IDF index built"
        );
        Built::Sparse(sparse)
    }

    /// Ranks `faqs` against `query`: at most `top_k` hits, best first, ties in
    /// collection order. An empty query, an empty collection, or a failed
    /// query encoding gives no hits. Positions outside `faqs` are dropped.
    pub fn search<'a>(&self, query: &str, faqs: &'a [FaqRecord], top_k: usize) -> Vec<FaqMatch<'a>> {
        if query.trim().is_empty() || faqs.is_empty() || top_k == 0 {
            return Vec::new();
        }
        self.build(faqs);

        let ranked = match self.built.get() {
            None => return Vec::new(),
            Some(Built::Sparse(sparse)) => sparse.search(query, top_k),
            Some(Built::Dense(dense)) => {
                let Some(embedder) = &self.embedder else {
                    return Vec::new();
                };
                match dense.search(embedder.as_ref(), query, top_k) {
                    Ok(hits) => hits,
                    Err(err) => {
                        warn!(error = %err, "dense search failed");
                        return Vec::new();
                    }
                }
            }
        };

        ranked
            .into_iter()
            .filter_map(|(position, score)| {
                let faq = faqs.get(position)?;
                Some(FaqMatch { score, position, faq })
            })
            .collect()
    }
}

fn searchable_texts(faqs: &[FaqRecord]) -> Vec<(usize, String)> {
    faqs.iter()
        .enumerate()
        .filter(|(_, f)| f.is_searchable())
        .map(|(i, f)| (i, f.index_text()))
        .collect()
}
