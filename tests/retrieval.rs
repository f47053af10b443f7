use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use apidoc_rag::search::embedding::{cosine_similarity, Embedder, HtpEmbedder};
use apidoc_rag::{EmbeddingCache, EmbeddingProvider, KnowledgeBase, MatchType};

fn write_json(dir: &Path, rel: &str, value: serde_json::Value) -> Result<()> {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&value)?)?;
    Ok(())
}

fn seed_corpus(dir: &Path) -> Result<()> {
    write_json(
        dir,
        "qiskit/primitives.json",
        json!([
            {
                "api_name": "estimator_run",
                "library": "qiskit",
                "signature": "Estimator.run(circuits, observables)",
                "description": "run estimator primitive for expectation values",
                "usage_context": "used to compute expectation values of observables",
                "related_apis": ["sampler_run", "not_in_corpus"]
            },
            {
                "api_name": "sampler_run",
                "library": "qiskit",
                "signature": "Sampler.run(circuits, shots)",
                "description": "sample measurement outcomes of circuits",
                "usage_context": "used to estimate output bitstring distributions"
            }
        ]),
    )?;
    write_json(
        dir,
        "cirq/gates.json",
        json!({
            "api_name": "cirq.CNOT",
            "library": "cirq",
            "signature": "cirq.CNOT(control, target)",
            "description": "controlled not gate",
            "usage_context": "entangle two qubits when preparing bell states"
        }),
    )?;
    Ok(())
}

fn open_kb(root: &Path, provider: EmbeddingProvider) -> KnowledgeBase {
    let cache = Arc::new(EmbeddingCache::open(&root.join("embeddings")));
    KnowledgeBase::new(&root.join("knowledge_base"), cache, provider)
}

#[test]
fn estimator_found_through_context() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    seed_corpus(&tmp.path().join("knowledge_base"))?;

    let mut kb = open_kb(tmp.path(), EmbeddingProvider::htp());
    let report = kb.load();
    assert_eq!(report.documents, 3);
    assert_eq!(report.files, 2);

    let results = kb.search("expectation values", 5, 0.1)?;
    let hit = results
        .iter()
        .find(|r| r.document.api_name == "estimator_run")
        .expect("estimator_run in results");
    assert!(hit.score >= 0.1);

    // context strategy alone scores the document at 1.0
    let offline = {
        let mut kb = open_kb(tmp.path(), EmbeddingProvider::unavailable("offline"));
        kb.load();
        kb.search("expectation values", 5, 0.1)?
            .into_iter()
            .map(|r| (r.document.api_name.clone(), r.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(offline[0].0, "estimator_run");
    assert!((offline[0].1 - 1.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn empty_corpus_returns_no_results() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::create_dir_all(tmp.path().join("knowledge_base"))?;

    let mut kb = open_kb(tmp.path(), EmbeddingProvider::htp());
    kb.load();
    assert!(kb.search("bell state", 5, 0.0)?.is_empty());
    assert_eq!(kb.statistics().total_apis, 0);
    Ok(())
}

#[test]
fn related_drops_unknown_references() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    seed_corpus(&tmp.path().join("knowledge_base"))?;

    let mut kb = open_kb(tmp.path(), EmbeddingProvider::htp());
    kb.load();

    let related = kb.get_related_apis("estimator_run");
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].api_name, "sampler_run");
    assert!(kb.get_related_apis("unknown").is_empty());
    Ok(())
}

#[test]
fn embeddings_reused_after_restart() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    seed_corpus(&tmp.path().join("knowledge_base"))?;

    let first = {
        let mut kb = open_kb(tmp.path(), EmbeddingProvider::htp());
        kb.load()
    };
    assert_eq!(first.embedded_new, 3);
    assert_eq!(first.embedded_cached, 0);

    let mut kb = open_kb(tmp.path(), EmbeddingProvider::htp());
    let second = kb.load();
    assert_eq!(second.embedded_new, 0);
    assert_eq!(second.embedded_cached, 3);
    assert_eq!(kb.cache().metadata().model.as_deref(), Some("htp-384-v1"));
    Ok(())
}

#[test]
fn search_results_are_ranked_unique_and_stable() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    seed_corpus(&tmp.path().join("knowledge_base"))?;

    let mut kb = open_kb(tmp.path(), EmbeddingProvider::htp());
    kb.load();

    for query in ["run circuits", "bell states", "sample", "estimator expectation values"] {
        let results = kb.search(query, 2, 0.05)?;
        assert!(results.len() <= 2);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(results.iter().all(|r| r.score >= 0.05));

        let mut names: Vec<_> = results.iter().map(|r| r.document.api_name.as_str()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);

        let again: Vec<_> = kb
            .search(query, 2, 0.05)?
            .iter()
            .map(|r| (r.document.api_name.clone(), r.score, r.match_type))
            .collect();
        let first: Vec<_> = results
            .iter()
            .map(|r| (r.document.api_name.clone(), r.score, r.match_type))
            .collect();
        assert_eq!(first, again);
    }
    Ok(())
}

#[test]
fn keyword_and_context_survive_missing_model() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    seed_corpus(&tmp.path().join("knowledge_base"))?;

    let mut kb = open_kb(tmp.path(), EmbeddingProvider::unavailable("weights missing"));
    let report = kb.load();
    assert_eq!(report.embedded_new, 0);

    let results = kb.search("CNOT gate", 5, 0.1)?;
    assert_eq!(results[0].document.api_name, "cirq.CNOT");
    assert_eq!(results[0].match_type, MatchType::Keyword);
    assert!(!kb.statistics().embedding_model_loaded);
    Ok(())
}

#[test]
fn reload_replaces_corpus() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let kb_dir = tmp.path().join("knowledge_base");
    seed_corpus(&kb_dir)?;

    let mut kb = open_kb(tmp.path(), EmbeddingProvider::htp());
    kb.load();
    assert!(kb.get_api_by_name("cirq.CNOT").is_some());

    fs::remove_file(kb_dir.join("cirq/gates.json"))?;
    write_json(&kb_dir, "pennylane/qnode.json", json!({"api_name": "qml.qnode", "library": "pennylane"}))?;

    let report = kb.reload();
    assert_eq!(report.documents, 3);
    assert!(kb.get_api_by_name("cirq.CNOT").is_none());
    assert!(kb.get_api_by_name("qml.qnode").is_some());
    assert_eq!(kb.get_apis_by_library("pennylane").len(), 1);
    Ok(())
}

#[test]
fn document_self_similarity_is_one() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    seed_corpus(&tmp.path().join("knowledge_base"))?;

    let mut kb = open_kb(tmp.path(), EmbeddingProvider::htp());
    kb.load();

    let model = HtpEmbedder::new();
    for doc in kb.documents() {
        let a = model.embed(&doc.embedding_text())?;
        let b = model.embed(&doc.embedding_text())?;
        let sim = cosine_similarity(&a, &b).expect("non-zero embedding");
        assert!((sim - 1.0).abs() < 1e-5);
        assert_eq!(doc.embedding.as_deref(), Some(a.as_slice()));
    }
    Ok(())
}
