use criterion::{criterion_group, criterion_main, Criterion};
use termdex::{evaluate, parse, AnalyzerConfig, Document, IndexBuilder};

const WORDS: &[&str] = &["caesar", "brutus", "calpurnia", "rome", "senate", "ides", "march", "forum", "legion", "tribune"];

fn bench_search(c: &mut Criterion) {
    let mut builder = IndexBuilder::new(AnalyzerConfig::default());
    let docs: Vec<Document> = (0..20_000usize)
        .map(|i| {
            let body: Vec<&str> = (0..40).map(|j| WORDS[(i * 7 + j * j) % WORDS.len()]).collect();
            Document::new(i.to_string(), format!("{i}.txt"), body.join(" "))
        })
        .collect();
    builder.add_documents_parallel(docs).expect("build");
    let index = builder.finish().index;

    let or_query = parse("caesar OR brutus OR senate", "content").expect("parse");
    c.bench_function("or_top10", |b| b.iter(|| evaluate(&or_query, &index, 10)));

    let and_query = parse("+caesar +forum -ides", "content").expect("parse");
    c.bench_function("and_not_top10", |b| b.iter(|| evaluate(&and_query, &index, 10)));
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
