use crate::error::SnapshotError;
use crate::tokenizer::AnalyzerConfig;
use crate::{Field, FieldIndex, InvertedIndex, Posting, StoredDoc, TermInfo};
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub num_docs: u32,
    pub num_terms: u64,
    pub created_at: String,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

/// One row of the sorted term dictionary. Its postings are the `doc_freq`
/// entries of `postings.bin` starting at `postings_offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub field: Field,
    pub term: String,
    pub postings_offset: u64,
    pub doc_freq: u32,
    pub total_term_freq: u64,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
}

fn write_bincode<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let bytes = bincode::serialize(value)?;
    f.write_all(&bytes)?;
    Ok(())
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let value = bincode::deserialize(&buf).with_context(|| format!("decoding {}", path.display()))?;
    Ok(value)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Writes the document table, the sorted dictionary and the postings region.
/// `meta.json` goes last so a snapshot without it is never considered complete.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;

    let mut dictionary = Vec::new();
    let mut postings: Vec<Posting> = Vec::new();
    // BTreeMap order on (field, term) is the dictionary sort order
    for (field, field_index) in index.fields() {
        for (term, info) in &field_index.terms {
            dictionary.push(DictionaryEntry {
                field,
                term: term.clone(),
                postings_offset: postings.len() as u64,
                doc_freq: info.doc_freq,
                total_term_freq: info.total_term_freq,
            });
            postings.extend_from_slice(&info.postings);
        }
    }

    write_bincode(&paths.docs(), index.docs())?;
    write_bincode(&paths.dictionary(), &dictionary)?;
    write_bincode(&paths.postings(), &postings)?;

    let meta = MetaFile {
        version: FORMAT_VERSION,
        num_docs: index.num_docs(),
        num_terms: dictionary.len() as u64,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        analyzer: *index.analyzer(),
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "saved index snapshot");
    Ok(meta)
}

/// Loads a snapshot and checks it for structural consistency. Anything off
/// fails the whole load with a [`SnapshotError`].
pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        bail!(SnapshotError::Version { found: meta.version, expected: FORMAT_VERSION });
    }
    let docs: Vec<StoredDoc> = read_bincode(&paths.docs())?;
    let dictionary: Vec<DictionaryEntry> = read_bincode(&paths.dictionary())?;
    let postings: Vec<Posting> = read_bincode(&paths.postings())?;

    let index = assemble(&meta, docs, dictionary, &postings)?;
    tracing::info!(root = %paths.root.display(), num_docs = index.num_docs(), num_terms = index.num_terms(), "loaded index snapshot");
    Ok(index)
}

fn corrupt(msg: String) -> anyhow::Error {
    SnapshotError::Corrupt(msg).into()
}

fn assemble(meta: &MetaFile, docs: Vec<StoredDoc>, dictionary: Vec<DictionaryEntry>, postings: &[Posting]) -> Result<InvertedIndex> {
    let num_docs = docs.len();
    if num_docs != meta.num_docs as usize {
        return Err(corrupt(format!("meta declares {} documents, document table has {num_docs}", meta.num_docs)));
    }
    if dictionary.len() as u64 != meta.num_terms {
        return Err(corrupt(format!("meta declares {} terms, dictionary has {}", meta.num_terms, dictionary.len())));
    }

    let mut fields: BTreeMap<Field, FieldIndex> = BTreeMap::new();
    let mut covered: BTreeMap<Field, Vec<bool>> = BTreeMap::new();
    let mut content_tokens = vec![0u64; num_docs];
    let mut offset = 0usize;
    let mut prev: Option<(Field, String)> = None;

    for entry in dictionary {
        let key = (entry.field, entry.term);
        if let Some(p) = &prev {
            if *p >= key {
                return Err(corrupt(format!("dictionary out of order at {}:{}", key.0, key.1)));
            }
        }
        let (field, term) = key;

        // postings regions are contiguous, so every posting belongs to exactly one term
        if entry.postings_offset != offset as u64 {
            return Err(corrupt(format!("postings of {field}:{term} start at {}, expected {offset}", entry.postings_offset)));
        }
        if entry.doc_freq == 0 {
            return Err(corrupt(format!("{field}:{term} has no postings")));
        }
        let end = offset + entry.doc_freq as usize;
        let Some(slice) = postings.get(offset..end) else {
            return Err(corrupt(format!("postings of {field}:{term} run past the postings region")));
        };

        let mut total = 0u64;
        let mut last: Option<u32> = None;
        let seen = covered.entry(field).or_insert_with(|| vec![false; num_docs]);
        for p in slice {
            if p.doc_id as usize >= num_docs || last.map_or(false, |l| l >= p.doc_id) {
                return Err(corrupt(format!("postings of {field}:{term} are not ascending doc ids in range")));
            }
            if p.term_freq == 0 {
                return Err(corrupt(format!("zero term frequency in {field}:{term}")));
            }
            last = Some(p.doc_id);
            total += u64::from(p.term_freq);
            seen[p.doc_id as usize] = true;
            if field == Field::Content {
                content_tokens[p.doc_id as usize] += u64::from(p.term_freq);
            }
        }
        if total != entry.total_term_freq {
            return Err(corrupt(format!("{field}:{term} declares total tf {}, postings sum to {total}", entry.total_term_freq)));
        }

        let field_index = fields.entry(field).or_default();
        field_index.sum_doc_freq += u64::from(entry.doc_freq);
        field_index.sum_total_term_freq += total;
        field_index.terms.insert(
            term.clone(),
            TermInfo { doc_freq: entry.doc_freq, total_term_freq: total, postings: slice.to_vec() },
        );
        prev = Some((field, term));
        offset = end;
    }

    if offset != postings.len() {
        return Err(corrupt(format!("{} postings are not referenced by any term", postings.len() - offset)));
    }
    for (doc_id, doc) in docs.iter().enumerate() {
        if u64::from(doc.token_count) != content_tokens[doc_id] {
            return Err(corrupt(format!(
                "document {doc_id} declares {} tokens, content postings hold {}",
                doc.token_count, content_tokens[doc_id]
            )));
        }
    }
    for (field, seen) in covered {
        if let Some(fi) = fields.get_mut(&field) {
            fi.doc_count = seen.iter().filter(|s| **s).count() as u32;
        }
    }

    Ok(InvertedIndex::from_parts(fields, docs, meta.analyzer))
}
