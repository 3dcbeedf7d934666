use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use termdex::persist::{save_index, IndexPaths};
use termdex::{AnalyzerConfig, BuildError, Document, FailurePolicy, Field, IndexBuilder, Searcher};
use walkdir::WalkDir;

/// A record inside a `.json` / `.jsonl` input file.
#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(alias = "body")]
    content: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub analyzer: AnalyzerConfig,
    pub policy: FailurePolicy,
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub num_docs: u32,
    pub num_terms: u64,
    pub skipped: usize,
}

/// Files under `input` in a stable order. A single file is returned as is.
pub fn discover(input: &Path) -> Vec<PathBuf> {
    if input.is_file() {
        return vec![input.to_path_buf()];
    }
    WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

/// Reads every discovered file. JSON/JSONL files contribute one document per
/// record, anything else is one plain-text document whose id is its path
/// relative to `input`. Failures come back as per-document errors.
pub fn load_documents(input: &Path) -> Vec<Result<Document, BuildError>> {
    let mut out = Vec::new();
    for file in discover(input) {
        let rel = relative_name(input, &file);
        match file.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => read_jsonl(&file, &rel, &mut out),
            Some("json") => read_json(&file, &rel, &mut out),
            _ => out.push(read_text(&file, rel)),
        }
    }
    out
}

fn relative_name(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).ok().filter(|p| !p.as_os_str().is_empty()).unwrap_or(file);
    rel.to_string_lossy().replace('\\', "/")
}

fn file_name(file: &Path) -> String {
    file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn read_text(file: &Path, rel: String) -> Result<Document, BuildError> {
    let bytes = fs::read(file).map_err(|source| BuildError::Read { path: rel.clone(), source })?;
    let content = String::from_utf8(bytes).map_err(|_| BuildError::Decode { path: rel.clone() })?;
    Ok(Document::new(rel, file_name(file), content))
}

fn from_record(doc: InputDoc, file: &Path) -> Document {
    let filename = doc.filename.unwrap_or_else(|| file_name(file));
    Document::new(doc.id, filename, doc.content)
}

fn read_jsonl(file: &Path, rel: &str, out: &mut Vec<Result<Document, BuildError>>) {
    let f = match File::open(file) {
        Ok(f) => f,
        Err(source) => return out.push(Err(BuildError::Read { path: rel.to_string(), source })),
    };
    for (lineno, line) in BufReader::new(f).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(source) => {
                out.push(Err(BuildError::Read { path: format!("{rel}:{}", lineno + 1), source }));
                break;
            }
        };
        if line.trim().is_empty() { continue; }
        let doc = serde_json::from_str::<InputDoc>(&line)
            .map(|d| from_record(d, file))
            .map_err(|e| BuildError::Rejected { external_id: format!("{rel}:{}", lineno + 1), reason: e.to_string() });
        out.push(doc);
    }
}

fn read_json(file: &Path, rel: &str, out: &mut Vec<Result<Document, BuildError>>) {
    let f = match File::open(file) {
        Ok(f) => f,
        Err(source) => return out.push(Err(BuildError::Read { path: rel.to_string(), source })),
    };
    let json: serde_json::Value = match serde_json::from_reader(BufReader::new(f)) {
        Ok(v) => v,
        Err(e) => return out.push(Err(BuildError::Rejected { external_id: rel.to_string(), reason: e.to_string() })),
    };
    let records = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => return out.push(Err(BuildError::Rejected { external_id: rel.to_string(), reason: "expected an object or an array".into() })),
    };
    for (i, v) in records.into_iter().enumerate() {
        let doc = serde_json::from_value::<InputDoc>(v)
            .map(|d| from_record(d, file))
            .map_err(|e| BuildError::Rejected { external_id: format!("{rel}[{i}]"), reason: e.to_string() });
        out.push(doc);
    }
}

/// Builds a snapshot from `input` and persists it under `output`.
pub fn build_index(input: &Path, output: &Path, opts: &BuildOptions) -> Result<BuildSummary> {
    if !input.exists() {
        bail!("input path {} does not exist", input.display());
    }
    let documents = load_documents(input);
    let mut builder = IndexBuilder::new(opts.analyzer).with_policy(opts.policy);
    if opts.parallel {
        let mut loaded = Vec::with_capacity(documents.len());
        for doc in documents {
            match doc {
                Ok(doc) => loaded.push(doc),
                Err(e) => builder.record_failure(e)?,
            }
        }
        builder.add_documents_parallel(loaded)?;
    } else {
        for doc in documents {
            match doc {
                Ok(doc) => {
                    builder.add_document(doc)?;
                }
                Err(e) => builder.record_failure(e)?,
            }
        }
    }

    let out = builder.finish();
    let meta = save_index(&IndexPaths::new(output), &out.index)?;
    tracing::info!(output = %output.display(), "index build complete");
    Ok(BuildSummary { num_docs: meta.num_docs, num_terms: meta.num_terms, skipped: out.warnings.len() })
}

/// Writes the aggregate report followed by df / total tf of `terms` in the
/// content field.
pub fn print_stats<W: Write>(searcher: &Searcher, terms: &[String], out: &mut W) -> Result<()> {
    write!(out, "{}", searcher.stats())?;
    if !terms.is_empty() {
        writeln!(out, "df values for field {}", Field::Content)?;
    }
    for term in terms {
        writeln!(out, "df('{term}') = {}", searcher.doc_freq(Field::Content, term))?;
        writeln!(out, "total-tf('{term}') = {}", searcher.total_term_freq(Field::Content, term))?;
    }
    Ok(())
}

/// Reads queries line by line until an empty line or EOF and prints the
/// top-k ranking for each. A bad query is reported and the loop goes on.
pub fn run_search_loop<R: BufRead, W: Write>(searcher: &Searcher, k: usize, mut input: R, out: &mut W) -> Result<()> {
    loop {
        writeln!(out, "enter a query (empty line to quit):")?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 { break; }
        let query = line.trim_end_matches(['\r', '\n']);
        if query.is_empty() { break; }

        let results = match searcher.search(query, k) {
            Ok(results) => results,
            Err(e) => {
                writeln!(out, "could not run query: {e}")?;
                continue;
            }
        };
        writeln!(out, "executed query: {}", results.query)?;
        writeln!(out, "{} hits found", results.total_hits)?;
        if results.hits.is_empty() { continue; }
        writeln!(out, "top-{k} ranking")?;
        for (rank, hit) in results.hits.iter().enumerate() {
            writeln!(out, "hit {}", rank + 1)?;
            writeln!(out, "\tdoc id: {}", hit.external_id)?;
            writeln!(out, "\tscore: {}", hit.score)?;
            writeln!(out, "\tfile name: {}", hit.filename)?;
        }
    }
    Ok(())
}
