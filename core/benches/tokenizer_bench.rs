use criterion::{criterion_group, criterion_main, Criterion};
use termdex::tokenizer::{tokenize, Analyzer, AnalyzerConfig};

const TEXT: &str = "Friends, Romans, countrymen, lend me your ears; I come to bury Caesar, not to praise him. \
The evil that men do lives after them; the good is oft interred with their bones; so let it be with Caesar. \
The noble Brutus hath told you Caesar was ambitious: if it were so, it was a grievous fault.";

fn bench_tokenize(c: &mut Criterion) {
    let text = TEXT.repeat(50);
    c.bench_function("tokenize_default", |b| b.iter(|| tokenize(&text)));

    let full = Analyzer::new(AnalyzerConfig { stopwords: true, stemming: true, ..Default::default() });
    c.bench_function("tokenize_stem_stop", |b| b.iter(|| full.analyze(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
