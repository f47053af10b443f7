//! Matching strategies and score fusion
//!
//! Each strategy ranks the corpus on its own scale; [`fuse`] merges the
//! ranked lists into one deduplicated top-k.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use super::embedding::cosine_similarity;
use crate::core::document::DocumentEntry;

/// Which strategy produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Semantic,
    Keyword,
    Context,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchType::Semantic => "semantic",
            MatchType::Keyword => "keyword",
            MatchType::Context => "context",
        };
        f.write_str(name)
    }
}

/// A scored reference into the loaded corpus
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult<'a> {
    pub document: &'a DocumentEntry,
    pub score: f32,
    pub match_type: MatchType,
}

/// Lowercased, whitespace-delimited query tokens (deduplicated)
pub fn query_tokens(query_lower: &str) -> HashSet<&str> {
    query_lower.split_whitespace().collect()
}

/// Sort by score descending; ties keep corpus order
fn rank(results: &mut Vec<SearchResult<'_>>, limit: usize) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
}

/// Cosine similarity of the query against every precomputed embedding.
///
/// Documents without an embedding, or with a zero vector, are skipped.
pub fn semantic_search<'a>(
    documents: &'a [DocumentEntry],
    query_embedding: &[f32],
    limit: usize,
) -> Vec<SearchResult<'a>> {
    let mut results: Vec<SearchResult<'a>> = documents
        .iter()
        .filter_map(|doc| {
            let embedding = doc.embedding.as_deref()?;
            let score = cosine_similarity(query_embedding, embedding)?;
            Some(SearchResult {
                document: doc,
                score,
                match_type: MatchType::Semantic,
            })
        })
        .collect();

    rank(&mut results, limit);
    results
}

/// Token overlap with name + description + signature.
///
/// A token found in the search text scores 1, or 2 when it also occurs in
/// the API name. The sum is divided by the number of query tokens.
pub fn keyword_search<'a>(
    documents: &'a [DocumentEntry],
    query: &str,
    limit: usize,
) -> Vec<SearchResult<'a>> {
    let query_lower = query.to_lowercase();
    let words = query_tokens(&query_lower);
    if words.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<SearchResult<'a>> = documents
        .iter()
        .filter_map(|doc| {
            let search_text = doc.keyword_text();
            let name = doc.api_name.to_lowercase();

            let matches: usize = words
                .iter()
                .filter(|word| search_text.contains(*word))
                .map(|word| if name.contains(*word) { 2 } else { 1 })
                .sum();

            if matches == 0 {
                return None;
            }

            Some(SearchResult {
                document: doc,
                score: matches as f32 / words.len() as f32,
                match_type: MatchType::Keyword,
            })
        })
        .collect();

    rank(&mut results, limit);
    results
}

/// Usage-scenario matching against `usage_context`.
///
/// A document qualifies when the whole query, or any query token, is a
/// substring of its context. The score is the whole-token overlap divided
/// by the number of query tokens, so a substring-only hit scores 0.
pub fn context_search<'a>(
    documents: &'a [DocumentEntry],
    query: &str,
    limit: usize,
) -> Vec<SearchResult<'a>> {
    let query_lower = query.to_lowercase();
    let words = query_tokens(&query_lower);
    if words.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<SearchResult<'a>> = documents
        .iter()
        .filter_map(|doc| {
            let context_text = doc.usage_context.to_lowercase();

            let hit = context_text.contains(&query_lower)
                || words.iter().any(|word| context_text.contains(*word));
            if !hit {
                return None;
            }

            let context_words = query_tokens(&context_text);
            let overlap = words.intersection(&context_words).count();

            Some(SearchResult {
                document: doc,
                score: overlap as f32 / words.len() as f32,
                match_type: MatchType::Context,
            })
        })
        .collect();

    rank(&mut results, limit);
    results
}

/// Merge strategy lists into the final ranking.
///
/// Candidates are visited in the order given. Those below `min_similarity`
/// are dropped; of the rest, the first per API name is kept. The survivors
/// are re-sorted by score and cut to `top_k`.
pub fn fuse<'a>(
    candidates: impl IntoIterator<Item = SearchResult<'a>>,
    top_k: usize,
    min_similarity: f32,
) -> Vec<SearchResult<'a>> {
    let mut seen: HashSet<&'a str> = HashSet::new();
    let mut unique: Vec<SearchResult<'a>> = candidates
        .into_iter()
        .filter(|r| r.score >= min_similarity)
        .filter(|r| seen.insert(r.document.api_name.as_str()))
        .collect();

    rank(&mut unique, top_k);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, description: &str, signature: &str, context: &str) -> DocumentEntry {
        DocumentEntry {
            api_name: name.to_string(),
            description: description.to_string(),
            signature: signature.to_string(),
            usage_context: context.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_keyword_name_matches_count_twice() {
        let docs = vec![
            doc("estimator_run", "compute expectation values", "", ""),
            doc("sampler_run", "sample bitstrings from an estimator", "", ""),
        ];

        let results = keyword_search(&docs, "Estimator values", 5);
        assert_eq!(results.len(), 2);
        // estimator: in name (2) + values: in description (1) = 3 / 2
        assert_eq!(results[0].document.api_name, "estimator_run");
        assert!((results[0].score - 1.5).abs() < 1e-6);
        // estimator only, in description = 1 / 2
        assert!((results[1].score - 0.5).abs() < 1e-6);
        assert!(results.iter().all(|r| r.match_type == MatchType::Keyword));
    }

    #[test]
    fn test_keyword_requires_a_match() {
        let docs = vec![doc("cirq.H", "hadamard gate", "", "")];
        assert!(keyword_search(&docs, "measurement", 5).is_empty());
        assert!(keyword_search(&docs, "   ", 5).is_empty());
    }

    #[test]
    fn test_keyword_duplicate_tokens_counted_once() {
        let docs = vec![doc("transpile", "map circuit to backend", "", "")];
        let results = keyword_search(&docs, "circuit circuit", 5);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_context_scores_token_overlap() {
        let docs = vec![doc(
            "estimator_run",
            "",
            "",
            "used to compute expectation values of observables",
        )];

        let results = context_search(&docs, "expectation values", 5);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[0].match_type, MatchType::Context);
    }

    #[test]
    fn test_context_substring_hit_scores_zero() {
        let docs = vec![doc("x", "", "", "expectation values")];
        let results = context_search(&docs, "expect", 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn test_context_empty_query() {
        let docs = vec![doc("x", "", "", "anything")];
        assert!(context_search(&docs, "", 5).is_empty());
    }

    #[test]
    fn test_semantic_skips_missing_and_zero_embeddings() {
        let mut a = doc("a", "", "", "");
        a.embedding = Some(vec![1.0, 0.0]);
        let mut b = doc("b", "", "", "");
        b.embedding = Some(vec![0.0, 0.0]);
        let c = doc("c", "", "", "");
        let mut d = doc("d", "", "", "");
        d.embedding = Some(vec![0.6, 0.8]);
        let docs = vec![a, b, c, d];

        let results = semantic_search(&docs, &[1.0, 0.0], 10);
        let names: Vec<_> = results.iter().map(|r| r.document.api_name.as_str()).collect();
        assert_eq!(names, vec!["a", "d"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);

        assert_eq!(semantic_search(&docs, &[1.0, 0.0], 1).len(), 1);
    }

    #[test]
    fn test_fuse_first_seen_wins() {
        let docs = vec![doc("a", "", "", ""), doc("b", "", "", "")];
        let candidates = vec![
            SearchResult { document: &docs[0], score: 0.4, match_type: MatchType::Semantic },
            SearchResult { document: &docs[1], score: 0.3, match_type: MatchType::Semantic },
            SearchResult { document: &docs[0], score: 2.0, match_type: MatchType::Keyword },
        ];

        let fused = fuse(candidates, 10, 0.0);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].document.api_name, "a");
        assert_eq!(fused[0].match_type, MatchType::Semantic);
        assert!((fused[0].score - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_fuse_threshold_before_dedup() {
        let docs = vec![doc("a", "", "", ""), doc("b", "", "", "")];
        let candidates = vec![
            SearchResult { document: &docs[0], score: 0.1, match_type: MatchType::Semantic },
            SearchResult { document: &docs[1], score: 0.9, match_type: MatchType::Semantic },
            SearchResult { document: &docs[0], score: 0.5, match_type: MatchType::Context },
        ];

        let fused = fuse(candidates, 10, 0.3);
        let summary: Vec<_> = fused
            .iter()
            .map(|r| (r.document.api_name.as_str(), r.match_type))
            .collect();
        assert_eq!(summary, vec![("b", MatchType::Semantic), ("a", MatchType::Context)]);

        let truncated = fuse(fused.clone(), 1, 0.3);
        assert_eq!(truncated.len(), 1);
        assert_eq!(truncated[0].document.api_name, "b");
    }
}
