use std::collections::HashSet;
use std::sync::Mutex;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cache::QueryVectorCache;
use crate::catalog::AnimeCatalog;
use crate::config::Config;
use crate::embedding::{Embedder, QueryEmbedder};
use crate::error::Result;
use crate::franchise;

/// Extra candidates examined beyond `offset + limit` to absorb entries
/// lost to exclusion filtering and franchise dedup. Deep offsets can still
/// under-return once the pool is exhausted; that behavior is kept as-is.
const CANDIDATE_POOL_MARGIN: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct RankedAnime {
    pub title: String,
    pub score: f32,
    pub synopsis: String,
    pub image_url: String,
    pub genres: Vec<String>,
}

/// One page of ranked results plus the pre-slice accumulated count.
#[derive(Debug)]
pub struct SearchPage {
    pub results: Vec<RankedAnime>,
    pub total: usize,
}

/// Cosine similarity: dot product over the product of norms. Zero-norm
/// vectors score 0.0 rather than NaN.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// The whole request-path state: embedder, read-only catalog, and the
/// optional mutex-guarded query-vector cache. Constructed once at startup
/// and shared across request handlers.
pub struct SearchService {
    embedder: Box<dyn QueryEmbedder>,
    catalog: AnimeCatalog,
    cache: Option<Mutex<QueryVectorCache>>,
}

impl SearchService {
    pub fn new(
        embedder: Box<dyn QueryEmbedder>,
        catalog: AnimeCatalog,
        cache: Option<QueryVectorCache>,
    ) -> Self {
        Self {
            embedder,
            catalog,
            cache: cache.map(Mutex::new),
        }
    }

    /// Load the embedding model and the precomputed catalog. Runs once at
    /// process start; a failure here leaves the HTTP layer permanently
    /// unhealthy until restart.
    pub fn from_config(config: &Config) -> Result<Self> {
        info!(model = %config.model_type, "loading embedding model");
        let embedder = Embedder::load(config.model_type.clone())?;

        info!(path = %config.embeddings_file.display(), "loading embeddings file");
        let catalog = AnimeCatalog::load(&config.embeddings_file)?;
        info!(entries = catalog.len(), "catalog loaded");

        let cache = config
            .enable_query_cache
            .then(|| QueryVectorCache::new(config.max_cache_size));

        Ok(Self::new(Box::new(embedder), catalog, cache))
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }

    fn query_vector(&self, query: &str) -> Result<Vec<f32>> {
        match &self.cache {
            Some(cache) => {
                let mut cache = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                cache.get_or_compute(query, |q| self.embedder.embed_query(q))
            }
            None => self.embedder.embed_query(query),
        }
    }

    /// Rank the catalog against `query`: score every row, walk the
    /// candidate pool in descending score order applying the exclusion
    /// filter and franchise dedup, then slice out the requested page.
    /// `limit` and `offset` must already be clamped by the caller.
    #[instrument(skip(self, exclude), fields(excluded = exclude.len()))]
    pub fn search(
        &self,
        query: &str,
        exclude: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage> {
        let query_vec = self.query_vector(query)?;

        let scores: Vec<f32> = self
            .catalog
            .embeddings
            .par_iter()
            .map(|row| cosine(&query_vec, row))
            .collect();

        let pool_size = (offset + limit + CANDIDATE_POOL_MARGIN).min(self.catalog.len());
        let mut ranked: Vec<usize> = (0..scores.len()).collect();
        // Stable sort: equal scores keep original catalog order.
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        ranked.truncate(pool_size);

        let wanted = offset + limit;
        let mut accumulated = Vec::new();
        let mut seen_franchises: HashSet<String> = HashSet::new();

        for idx in ranked {
            let entry = &self.catalog.entries[idx];

            let title_lower = entry.title.to_lowercase();
            if exclude.iter().any(|token| title_lower.contains(token)) {
                continue;
            }

            let franchise = franchise::franchise_key(&entry.title);
            if seen_franchises.contains(&franchise) {
                continue;
            }

            accumulated.push(RankedAnime {
                title: entry.title.clone(),
                score: scores[idx],
                synopsis: entry.synopsis.clone(),
                image_url: entry.main_pic.clone(),
                genres: entry.genres.clone(),
            });
            seen_franchises.insert(franchise);

            if accumulated.len() >= wanted {
                break;
            }
        }

        let total = accumulated.len();
        let results: Vec<RankedAnime> = accumulated
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect();

        debug!(total, returned = results.len(), "search complete");
        Ok(SearchPage { results, total })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::catalog::AnimeEntry;

    /// Embedder that always returns the same vector and counts calls.
    struct StubEmbedder {
        vector: Vec<f32>,
        calls: Arc<AtomicUsize>,
    }

    impl StubEmbedder {
        fn new(vector: Vec<f32>) -> Self {
            Self {
                vector,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl QueryEmbedder for StubEmbedder {
        fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }
    }

    fn entry(title: &str) -> AnimeEntry {
        AnimeEntry {
            title: title.to_string(),
            synopsis: format!("{title} synopsis"),
            genres: vec!["Drama".to_string()],
            main_pic: format!("https://cdn.example/{}.webp", title.len()),
        }
    }

    /// Catalog whose rows score, against query vector [1, 0, 0]:
    /// 1.0, 0.8, 0.6, 0.4, 0.2 in declaration order.
    fn graded_catalog(titles: &[&str]) -> AnimeCatalog {
        let steps = [0.0f32, 0.75, 1.33, 2.29, 4.9];
        AnimeCatalog {
            entries: titles.iter().map(|t| entry(t)).collect(),
            embeddings: titles
                .iter()
                .zip(steps)
                .map(|(_, y)| vec![1.0, y, 0.0])
                .collect(),
        }
    }

    fn service(catalog: AnimeCatalog, cache: Option<QueryVectorCache>) -> SearchService {
        SearchService::new(
            Box::new(StubEmbedder::new(vec![1.0, 0.0, 0.0])),
            catalog,
            cache,
        )
    }

    #[test]
    fn cosine_matches_hand_computed_values() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
        assert!((cosine(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        // Zero vector scores 0 instead of NaN.
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn results_are_ordered_by_descending_score() {
        let svc = service(
            graded_catalog(&["Best", "Second", "Third", "Fourth", "Fifth"]),
            None,
        );
        let page = svc.search("anything", &[], 5, 0).unwrap();

        let titles: Vec<&str> = page.results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Best", "Second", "Third", "Fourth", "Fifth"]);
        assert!(page.results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn ranking_is_deterministic() {
        let svc = service(graded_catalog(&["A", "B", "C", "D", "E"]), None);
        let first = svc.search("same query", &[], 5, 0).unwrap();
        let second = svc.search("same query", &[], 5, 0).unwrap();

        let titles = |page: &SearchPage| {
            page.results
                .iter()
                .map(|r| (r.title.clone(), r.score))
                .collect::<Vec<_>>()
        };
        assert_eq!(titles(&first), titles(&second));
    }

    #[test]
    fn equal_scores_keep_catalog_order() {
        let catalog = AnimeCatalog {
            entries: vec![entry("First Listed"), entry("Second Listed")],
            embeddings: vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]],
        };
        let page = service(catalog, None).search("q", &[], 5, 0).unwrap();
        assert_eq!(page.results[0].title, "First Listed");
        assert_eq!(page.results[1].title, "Second Listed");
    }

    #[test]
    fn franchises_are_deduplicated() {
        let svc = service(
            graded_catalog(&[
                "Vinland Saga Season 2",
                "Vinland Saga",
                "Planetes",
                "Vinland Saga Movie",
                "Gankutsuou",
            ]),
            None,
        );
        let page = svc.search("q", &[], 5, 0).unwrap();

        let titles: Vec<&str> = page.results.iter().map(|r| r.title.as_str()).collect();
        // Highest-scoring franchise member survives; later ones are skipped.
        assert_eq!(titles, vec!["Vinland Saga Season 2", "Planetes", "Gankutsuou"]);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn excluded_titles_are_filtered_case_insensitively() {
        let svc = service(
            graded_catalog(&["Naruto", "Bleach", "One Piece", "Trigun", "Berserk"]),
            None,
        );
        let exclude = vec!["naruto".to_string(), "bleach".to_string()];
        let page = svc.search("q", &exclude, 5, 0).unwrap();

        let titles: Vec<&str> = page.results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["One Piece", "Trigun", "Berserk"]);
    }

    #[test]
    fn exclusion_matches_substrings_of_titles() {
        let svc = service(
            graded_catalog(&["Naruto: Shippuuden", "Monster", "Mononoke", "Ping Pong", "Texhnolyze"]),
            None,
        );
        let exclude = vec!["shippuuden".to_string()];
        let page = svc.search("q", &exclude, 5, 0).unwrap();
        assert!(page.results.iter().all(|r| r.title != "Naruto: Shippuuden"));
    }

    #[test]
    fn pagination_slices_the_deduplicated_sequence() {
        let svc = service(graded_catalog(&["A", "B", "C", "D", "E"]), None);

        let first = svc.search("q", &[], 2, 0).unwrap();
        let second = svc.search("q", &[], 2, 2).unwrap();

        assert_eq!(first.results.len(), 2);
        assert_eq!(second.results.len(), 2);
        let first_titles: Vec<&str> = first.results.iter().map(|r| r.title.as_str()).collect();
        let second_titles: Vec<&str> = second.results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(first_titles, vec!["A", "B"]);
        assert_eq!(second_titles, vec!["C", "D"]);
    }

    #[test]
    fn offset_past_accumulated_results_returns_empty_page() {
        let svc = service(graded_catalog(&["A", "B", "C", "D", "E"]), None);
        let page = svc.search("q", &[], 5, 40).unwrap();
        assert!(page.results.is_empty());
        // Total still reports what accumulated before the slice.
        assert_eq!(page.total, 5);
    }

    #[test]
    fn everything_excluded_yields_empty_total() {
        let svc = service(graded_catalog(&["Alpha One", "Alpha Two", "Alpha Three", "Alpha Four", "Alpha Five"]), None);
        let exclude = vec!["alpha".to_string()];
        let page = svc.search("q", &exclude, 5, 0).unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn cache_hit_skips_recomputation() {
        let embedder = StubEmbedder::new(vec![1.0, 0.0, 0.0]);
        let calls = Arc::clone(&embedder.calls);
        let svc = SearchService::new(
            Box::new(embedder),
            graded_catalog(&["A", "B", "C", "D", "E"]),
            Some(QueryVectorCache::new(10)),
        );

        svc.search("repeated", &[], 3, 0).unwrap();
        svc.search("repeated", &[], 3, 0).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_cache_recomputes_every_call() {
        let embedder = StubEmbedder::new(vec![1.0, 0.0, 0.0]);
        let calls = Arc::clone(&embedder.calls);
        let svc = SearchService::new(
            Box::new(embedder),
            graded_catalog(&["A", "B", "C", "D", "E"]),
            None,
        );

        svc.search("repeated", &[], 3, 0).unwrap();
        svc.search("repeated", &[], 3, 0).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
