use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use askdoc_core::chunker::{Chunker, ChunkingConfig};
use askdoc_core::cost::{CostEstimator, EmbeddingPrice, WordApproxCounter};
use askdoc_core::error::Step;
use askdoc_core::traits::{Embedder, Generator, IndexService};
use askdoc_core::types::{EmbeddingRecord, IndexSpec, Metric, ScoredChunk};
use askdoc_core::Error;
use askdoc_embed::HashEmbedder;
use askdoc_loader::default_registry;
use askdoc_rag::{Pipeline, PipelineOptions, SessionState, NO_INFORMATION_ANSWER};
use askdoc_vector::MemoryIndexService;
use tempfile::TempDir;

const DIM: usize = 256;

struct CountingEmbedder {
    inner: HashEmbedder,
    texts: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self { inner: HashEmbedder::new(DIM), texts: AtomicUsize::new(0) })
    }
    fn embedded(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn id(&self) -> &str {
        self.inner.id()
    }
    fn dim(&self) -> usize {
        DIM
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

/// Claims `DIM` but returns shorter vectors.
struct ShortVectorEmbedder;

impl Embedder for ShortVectorEmbedder {
    fn id(&self) -> &str {
        "broken:d256"
    }
    fn dim(&self) -> usize {
        DIM
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.5; 4]).collect())
    }
}

/// Every call fails as if the store were down; `describe` can be pinned so a session can attach first.
struct DownService {
    known: Option<IndexSpec>,
}

fn refused() -> anyhow::Error {
    anyhow::anyhow!("connection refused")
}

impl IndexService for DownService {
    fn list(&self) -> anyhow::Result<Vec<String>> {
        Err(refused())
    }
    fn create(&self, _spec: &IndexSpec) -> anyhow::Result<()> {
        Err(refused())
    }
    fn describe(&self, _name: &str) -> anyhow::Result<Option<IndexSpec>> {
        self.known.clone().map(Some).ok_or_else(refused)
    }
    fn upsert(&self, _name: &str, _records: &[EmbeddingRecord]) -> anyhow::Result<()> {
        Err(refused())
    }
    fn query(&self, _name: &str, _vector: &[f32], _k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        Err(refused())
    }
    fn delete(&self, _name: &str) -> anyhow::Result<()> {
        Err(refused())
    }
}

#[derive(Default)]
struct CountingGenerator {
    calls: AtomicUsize,
}

impl Generator for CountingGenerator {
    fn generate(&self, question: &str, context: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{question} -> {} context chars", context.chars().count()))
    }
}

fn options(clear_before_ingest: bool) -> PipelineOptions {
    PipelineOptions {
        index_name: "askadocument".to_string(),
        dimension: DIM,
        metric: Metric::Cosine,
        top_k: 3,
        clear_before_ingest,
        max_context_chars: 4_000,
        embed_batch: 4,
    }
}

fn pipeline(
    embedder: Arc<dyn Embedder>,
    service: Arc<dyn IndexService>,
    generator: Arc<dyn Generator>,
    clear_before_ingest: bool,
) -> Pipeline {
    Pipeline::new(
        default_registry(),
        Chunker::new(ChunkingConfig::default()).expect("chunker"),
        CostEstimator::new(Box::new(WordApproxCounter), EmbeddingPrice::default()),
        embedder,
        service,
        generator,
        options(clear_before_ingest),
    )
}

fn write_docx(path: &Path, paragraphs: &[String]) {
    let body: String = paragraphs.iter().map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>")).collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default()).unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap();
}

/// Six paragraphs of ~200 characters, each its own chunk at size 256.
fn manual(dir: &Path) -> PathBuf {
    let topics = ["battery", "warranty", "shipping", "returns", "firmware", "cleaning"];
    let paragraphs: Vec<String> = topics
        .iter()
        .map(|t| {
            let mut p = format!("The {t} section explains how {t} works for this device.");
            while p.len() < 190 {
                p.push_str(&format!(" More {t} detail follows here."));
            }
            p
        })
        .collect();
    let path = dir.join("manual.docx");
    write_docx(&path, &paragraphs);
    path
}

#[test]
fn answer_before_ingest_is_not_ready_and_skips_generation() {
    let generator = Arc::new(CountingGenerator::default());
    let p = pipeline(CountingEmbedder::new(), Arc::new(MemoryIndexService::new()), generator.clone(), true);

    let err = p.answer("what is covered?").unwrap_err();
    assert!(matches!(err.kind(), Error::NotReady));
    assert_eq!(err.step, Step::Precondition);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn ingest_then_answer_retrieves_the_verbatim_chunk_first() {
    let tmp = TempDir::new().unwrap();
    let path = manual(tmp.path());
    let generator = Arc::new(CountingGenerator::default());
    let mut p = pipeline(CountingEmbedder::new(), Arc::new(MemoryIndexService::new()), generator.clone(), true);

    let report = p.ingest(&path).expect("ingest");
    assert_eq!(report.chunks, 6);
    assert!(!report.reused);
    assert!(report.cost.total_tokens > 0);
    assert!(p.is_ready());

    let doc = default_registry().load(&path).unwrap();
    let chunks = Chunker::new(ChunkingConfig::default()).unwrap().chunk(&doc);
    let target = chunks[3].content.clone();

    let answer = p.answer(&target).expect("answer");
    assert!(answer.generated);
    assert_eq!(answer.sources.len(), 3);
    assert_eq!(answer.sources.top().map(|h| h.content.as_str()), Some(target.as_str()));
    assert!(answer.sources.hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn question_about_a_topic_ranks_its_paragraph_first() {
    let tmp = TempDir::new().unwrap();
    let path = manual(tmp.path());
    let mut p = pipeline(CountingEmbedder::new(), Arc::new(MemoryIndexService::new()), Arc::new(CountingGenerator::default()), true);
    p.ingest(&path).expect("ingest");

    let answer = p.answer("What does the warranty cover?").expect("answer");
    let top = answer.sources.top().expect("top hit");
    assert!(top.content.contains("The warranty section explains how warranty works"), "top hit was {:?}", top.content);
    assert!(answer.sources.hits[1..].iter().all(|h| !h.content.contains("warranty")));
}

#[test]
fn second_ingest_reuses_index_without_reembedding() {
    let tmp = TempDir::new().unwrap();
    let path = manual(tmp.path());
    let embedder = CountingEmbedder::new();
    let mut p = pipeline(embedder.clone(), Arc::new(MemoryIndexService::new()), Arc::new(CountingGenerator::default()), false);

    let first = p.ingest(&path).expect("first ingest");
    let after_first = embedder.embedded();
    assert_eq!(after_first, first.chunks);

    let second = p.ingest(&path).expect("second ingest");
    assert!(second.reused);
    assert_eq!(embedder.embedded(), after_first);
    assert_eq!(second.handle.name, first.handle.name);
}

#[test]
fn clearing_ingest_rebuilds_the_index() {
    let tmp = TempDir::new().unwrap();
    let path = manual(tmp.path());
    let service = Arc::new(MemoryIndexService::new());
    let mut p = pipeline(CountingEmbedder::new(), service.clone(), Arc::new(CountingGenerator::default()), true);

    p.ingest(&path).expect("first ingest");
    let second = p.ingest(&path).expect("second ingest");
    assert!(!second.reused);
    assert_eq!(second.cleared, vec!["askadocument".to_string()]);
    assert_eq!(service.list().unwrap(), vec!["askadocument".to_string()]);
}

#[test]
fn unsupported_format_has_no_index_side_effects() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.txt");
    std::fs::write(&path, "plain text").unwrap();

    let service = Arc::new(MemoryIndexService::new());
    service
        .create(&IndexSpec {
            name: "keep".into(),
            dimension: DIM,
            metric: Metric::Cosine,
            embedder_id: "x".into(),
            content_hash: None,
            created_at: None,
        })
        .unwrap();
    let mut p = pipeline(CountingEmbedder::new(), service.clone(), Arc::new(CountingGenerator::default()), true);

    let err = p.ingest(&path).unwrap_err();
    assert!(matches!(err.kind(), Error::UnsupportedFormat { .. }));
    assert_eq!(err.step, Step::Precondition);
    assert_eq!(service.list().unwrap(), vec!["keep".to_string()]);
    assert!(matches!(p.state(), SessionState::Empty));
}

#[test]
fn short_vectors_fail_and_roll_back() {
    let tmp = TempDir::new().unwrap();
    let path = manual(tmp.path());
    let service = Arc::new(MemoryIndexService::new());
    let mut p = pipeline(Arc::new(ShortVectorEmbedder), service.clone(), Arc::new(CountingGenerator::default()), true);

    let err = p.ingest(&path).unwrap_err();
    assert!(matches!(err.kind(), Error::DimensionMismatch { expected: DIM, actual: 4 }));
    assert_eq!(err.step, Step::Index);
    assert!(service.describe("askadocument").unwrap().is_none());
    assert!(matches!(p.state(), SessionState::Loaded { .. }));
}

#[test]
fn resume_attaches_to_an_index_built_by_another_session() {
    let tmp = TempDir::new().unwrap();
    let path = manual(tmp.path());
    let service: Arc<dyn IndexService> = Arc::new(MemoryIndexService::new());
    let embedder = CountingEmbedder::new();

    let mut first = pipeline(embedder.clone(), service.clone(), Arc::new(CountingGenerator::default()), true);
    first.ingest(&path).expect("ingest");

    let generator = Arc::new(CountingGenerator::default());
    let mut second = pipeline(embedder, service, generator.clone(), true);
    assert!(second.resume().expect("resume"));
    let answer = second.answer("How does the warranty work?").expect("answer");
    assert!(answer.generated);
    assert_eq!(answer.sources.len(), 3);
    assert!(answer.sources.top().is_some_and(|h| h.content.contains("warranty")));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn resume_without_index_stays_empty() {
    let mut p = pipeline(CountingEmbedder::new(), Arc::new(MemoryIndexService::new()), Arc::new(CountingGenerator::default()), true);
    assert!(!p.resume().unwrap());
    assert!(matches!(p.state(), SessionState::Empty));
}

#[test]
fn estimate_does_not_touch_indexes() {
    let tmp = TempDir::new().unwrap();
    let path = manual(tmp.path());
    let service = Arc::new(MemoryIndexService::new());
    let embedder = CountingEmbedder::new();
    let p = pipeline(embedder.clone(), service.clone(), Arc::new(CountingGenerator::default()), true);

    let report = p.estimate(&path).expect("estimate");
    assert_eq!(report.chunks, 6);
    assert!(report.cost.estimated_cost > 0.0);
    assert!(service.list().unwrap().is_empty());
    assert_eq!(embedder.embedded(), 0);
}

#[test]
fn empty_retrieval_answers_without_generation() {
    use askdoc_core::types::QueryResult;
    let generator = Arc::new(CountingGenerator::default());
    let answerer = askdoc_rag::Answerer::new(generator.clone(), 100);
    let answer = answerer.answer(QueryResult::default(), "anything?").unwrap();
    assert_eq!(answer.text, NO_INFORMATION_ANSWER);
    assert!(!answer.generated);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unreachable_service_fails_the_clear_step() {
    let tmp = TempDir::new().unwrap();
    let path = manual(tmp.path());
    let mut p = pipeline(CountingEmbedder::new(), Arc::new(DownService { known: None }), Arc::new(CountingGenerator::default()), true);

    let err = p.ingest(&path).unwrap_err();
    assert!(matches!(err.kind(), Error::IndexServiceUnavailable(_)));
    assert_eq!(err.step, Step::Clear);
    assert!(!p.is_ready());
}

#[test]
fn unreachable_service_fails_the_index_step_without_clearing() {
    let tmp = TempDir::new().unwrap();
    let path = manual(tmp.path());
    let mut p = pipeline(CountingEmbedder::new(), Arc::new(DownService { known: None }), Arc::new(CountingGenerator::default()), false);

    let err = p.ingest(&path).unwrap_err();
    assert!(matches!(err.kind(), Error::IndexServiceUnavailable(_)));
    assert_eq!(err.step, Step::Index);
    assert!(matches!(p.state(), SessionState::Loaded { .. }));
}

#[test]
fn query_against_a_lost_service_is_a_retrieval_failure() {
    let known = IndexSpec {
        name: "askadocument".into(),
        dimension: DIM,
        metric: Metric::Cosine,
        embedder_id: HashEmbedder::new(DIM).id().to_string(),
        content_hash: None,
        created_at: None,
    };
    let generator = Arc::new(CountingGenerator::default());
    let mut p = pipeline(CountingEmbedder::new(), Arc::new(DownService { known: Some(known) }), generator.clone(), true);
    assert!(p.resume().expect("resume"));

    let err = p.answer("What does the warranty cover?").unwrap_err();
    assert!(matches!(err.kind(), Error::RetrievalFailure(_)));
    assert_eq!(err.step, Step::Retrieve);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn ready_pipeline_answers_from_several_threads() {
    fn assert_sync<T: Send + Sync>() {}
    assert_sync::<Pipeline>();

    let tmp = TempDir::new().unwrap();
    let path = manual(tmp.path());
    let generator = Arc::new(CountingGenerator::default());
    let mut p = pipeline(CountingEmbedder::new(), Arc::new(MemoryIndexService::new()), generator.clone(), true);
    p.ingest(&path).expect("ingest");

    let p = &p;
    std::thread::scope(|s| {
        let a = s.spawn(move || p.answer("How is the battery charged?"));
        let b = s.spawn(move || p.answer("What does the warranty cover?"));
        assert!(a.join().unwrap().expect("battery answer").generated);
        assert!(b.join().unwrap().expect("warranty answer").generated);
    });
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
}
