use askdoc_core::types::{Answer, CostEstimate, META_PAGE};
use askdoc_rag::IngestReport;

pub fn print_cost(chunks: usize, cost: &CostEstimate) {
    println!("📄 {chunks} chunks, {} tokens", cost.total_tokens);
    println!("💵 Estimated embedding cost: ${:.6}", cost.estimated_cost);
}

pub fn print_ingest(report: &IngestReport) {
    println!("📚 Ingested {}", report.document.display());
    print_cost(report.chunks, &report.cost);
    if !report.cleared.is_empty() {
        println!("🧹 Cleared {} existing index(es): {}", report.cleared.len(), report.cleared.join(", "));
    }
    if report.reused {
        println!("♻️  Reused index '{}' (built with {})", report.handle.name, report.handle.embedder_id);
    } else {
        println!("✅ Created index '{}' ({} dims, {})", report.handle.name, report.handle.dimension, report.handle.metric);
    }
}

pub fn print_answer(answer: &Answer) {
    println!("\n{}\n", answer.text);
    if answer.sources.is_empty() {
        return;
    }
    println!("Sources:");
    for (i, hit) in answer.sources.hits.iter().enumerate() {
        let page = hit
            .metadata
            .get(META_PAGE)
            .and_then(|p| p.parse::<usize>().ok())
            .map(|p| format!(" page={}", p + 1))
            .unwrap_or_default();
        println!("  {}. score={:.4}{page}  id={}", i + 1, hit.score, hit.id);
    }
}
