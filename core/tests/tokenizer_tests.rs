use termdex::tokenizer::{tokenize, Analyzer, AnalyzerConfig};

#[test]
fn it_lowercases_and_splits_on_punctuation() {
    let words = tokenize("Caesar's wife, Calpurnia -- 44 B.C.");
    assert_eq!(words, vec!["caesar", "s", "wife", "calpurnia", "44", "b", "c"]);
}

#[test]
fn it_is_unicode_aware() {
    let words = tokenize("ÜBER Straße café ＦＵＬＬ");
    // NFKC folds the full-width letters
    assert_eq!(words, vec!["über", "straße", "café", "full"]);
}

#[test]
fn it_keeps_stopwords_by_default() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(words.contains(&"the".to_string()));
    assert!(words.contains(&"and".to_string()));
}

#[test]
fn it_filters_stopwords_when_enabled() {
    let analyzer = Analyzer::new(AnalyzerConfig { stopwords: true, ..Default::default() });
    let words = analyzer.analyze("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert!(words.contains(&"fox".to_string()));
}

#[test]
fn it_stems_when_enabled() {
    let analyzer = Analyzer::new(AnalyzerConfig { stemming: true, ..Default::default() });
    let words = analyzer.analyze("Running runs");
    assert_eq!(words, vec!["run", "run"]);
}

#[test]
fn it_drops_overlong_tokens() {
    let analyzer = Analyzer::new(AnalyzerConfig { max_token_len: 4, ..Default::default() });
    assert_eq!(analyzer.analyze("tiny enormous word"), vec!["tiny", "word"]);
}

#[test]
fn malformed_input_degrades_to_empty() {
    assert!(tokenize("").is_empty());
    assert!(tokenize(" \t\n ,.;!?").is_empty());
    assert_eq!(tokenize("ok\u{0}\u{fffd}ok"), vec!["ok", "ok"]);
}

#[test]
fn it_is_deterministic() {
    let text = "Friends, Romans, countrymen, lend me your ears";
    assert_eq!(tokenize(text), tokenize(text));
}
