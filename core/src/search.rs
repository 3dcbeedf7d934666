use crate::error::SearchError;
use crate::query::Query;
use crate::{DocId, Field, InvertedIndex};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Cooperative cancellation shared between a running query and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredResult {
    pub doc_id: DocId,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDocs {
    /// Matching documents before the top-k cut.
    pub total_hits: usize,
    /// At most k results, best first.
    pub hits: Vec<ScoredResult>,
}

/// `ln(N / (1 + df))`
pub fn idf(num_docs: u32, doc_freq: u32) -> f64 {
    (f64::from(num_docs) / (1.0 + f64::from(doc_freq))).ln()
}

/// Evaluates `query` and returns the `k` best documents.
pub fn evaluate(query: &Query, index: &InvertedIndex, k: usize) -> TopDocs {
    let evaluator = Evaluator { index, cancel: None };
    // without a cancel flag evaluation cannot fail
    evaluator.eval(query).map(|m| top_k(m, k)).unwrap_or_default()
}

/// Like [`evaluate`], checking `cancel` at every clause boundary. A cancelled
/// query yields [`SearchError::Cancelled`], never a partial result.
pub fn evaluate_with_cancel(query: &Query, index: &InvertedIndex, k: usize, cancel: &CancelFlag) -> Result<TopDocs, SearchError> {
    let evaluator = Evaluator { index, cancel: Some(cancel) };
    let matches = evaluator.eval(query)?;
    evaluator.check()?;
    Ok(top_k(matches, k))
}

/// Doc-id-sorted candidates with their accumulated partial scores.
type Matches = Vec<(DocId, f64)>;

struct Evaluator<'a> {
    index: &'a InvertedIndex,
    cancel: Option<&'a CancelFlag>,
}

impl Evaluator<'_> {
    fn check(&self) -> Result<(), SearchError> {
        match self.cancel {
            Some(flag) if flag.is_cancelled() => Err(SearchError::Cancelled),
            _ => Ok(()),
        }
    }

    fn eval(&self, query: &Query) -> Result<Matches, SearchError> {
        self.check()?;
        match query {
            Query::Term { field, term } => Ok(self.term_matches(*field, term)),
            Query::Or(children) => {
                let mut acc = Matches::new();
                for child in children {
                    let m = self.eval(child)?;
                    acc = union(&acc, &m);
                }
                Ok(acc)
            }
            Query::And(children) => {
                let mut positive = Vec::new();
                let mut negative = Vec::new();
                let mut optional = Vec::new();
                for child in children {
                    match child {
                        Query::Not(inner) => negative.push(inner.as_ref()),
                        Query::Optional(inner) => optional.push(inner.as_ref()),
                        other => positive.push(other),
                    }
                }
                let mut acc: Option<Matches> = None;
                // with nothing required, one of the optional children has to match
                if positive.is_empty() && !optional.is_empty() {
                    let mut any = Matches::new();
                    for child in optional.drain(..) {
                        let m = self.eval(child)?;
                        any = union(&any, &m);
                    }
                    acc = Some(any);
                }
                for child in positive {
                    let m = self.eval(child)?;
                    let next = match acc {
                        None => m,
                        Some(a) => intersect(&a, &m),
                    };
                    let empty = next.is_empty();
                    acc = Some(next);
                    if empty { break; }
                }
                // only exclusions: they apply to the whole collection
                let mut acc = acc.unwrap_or_else(|| self.universe());
                for child in negative {
                    if acc.is_empty() { break; }
                    let m = self.eval(child)?;
                    acc = difference(&acc, &m);
                }
                for child in optional {
                    if acc.is_empty() { break; }
                    let m = self.eval(child)?;
                    acc = left_join(&acc, &m);
                }
                Ok(acc)
            }
            Query::Optional(inner) => self.eval(inner),
            Query::Not(inner) => {
                let m = self.eval(inner)?;
                Ok(difference(&self.universe(), &m))
            }
        }
    }

    fn term_matches(&self, field: Field, term: &str) -> Matches {
        let Some(info) = self.index.term(field, term) else {
            return Matches::new();
        };
        let w = idf(self.index.num_docs(), info.doc_freq);
        info.postings.iter().map(|p| (p.doc_id, f64::from(p.term_freq) * w)).collect()
    }

    fn universe(&self) -> Matches {
        (0..self.index.num_docs()).map(|d| (d, 0.0)).collect()
    }
}

fn intersect(a: &[(DocId, f64)], b: &[(DocId, f64)]) -> Matches {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push((a[i].0, a[i].1 + b[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn union(a: &[(DocId, f64)], b: &[(DocId, f64)]) -> Matches {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push((a[i].0, a[i].1 + b[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Keeps every document of `a`, adding the score of `b` where both match.
fn left_join(a: &[(DocId, f64)], b: &[(DocId, f64)]) -> Matches {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for &(doc, score) in a {
        while j < b.len() && b[j].0 < doc {
            j += 1;
        }
        match b.get(j) {
            Some(&(d, extra)) if d == doc => out.push((doc, score + extra)),
            _ => out.push((doc, score)),
        }
    }
    out
}

fn difference(a: &[(DocId, f64)], b: &[(DocId, f64)]) -> Matches {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for &(doc, score) in a {
        while j < b.len() && b[j].0 < doc {
            j += 1;
        }
        if j < b.len() && b[j].0 == doc { continue; }
        out.push((doc, score));
    }
    out
}

/// Heap entry ordered so that `Greater` means a better hit: higher score,
/// then lower doc id.
struct Ranked(ScoredResult);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .score
            .total_cmp(&other.0.score)
            .then_with(|| other.0.doc_id.cmp(&self.0.doc_id))
    }
}

/// Bounded min-heap selection, O(N log k).
fn top_k(matches: Matches, k: usize) -> TopDocs {
    let total_hits = matches.len();
    if k == 0 {
        return TopDocs { total_hits, hits: Vec::new() };
    }
    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k + 1);
    for (doc_id, score) in matches {
        heap.push(Reverse(Ranked(ScoredResult { doc_id, score })));
        if heap.len() > k {
            heap.pop();
        }
    }
    // ascending Reverse order is descending rank
    let hits = heap.into_sorted_vec().into_iter().map(|Reverse(Ranked(r))| r).collect();
    TopDocs { total_hits, hits }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(ids: &[DocId]) -> Matches {
        ids.iter().map(|&d| (d, 1.0)).collect()
    }

    fn ids(ms: &Matches) -> Vec<DocId> {
        ms.iter().map(|(d, _)| *d).collect()
    }

    #[test]
    fn merge_joins() {
        let a = m(&[1, 3, 5, 7]);
        let b = m(&[3, 4, 7, 9]);
        assert_eq!(ids(&intersect(&a, &b)), vec![3, 7]);
        assert_eq!(ids(&union(&a, &b)), vec![1, 3, 4, 5, 7, 9]);
        assert_eq!(ids(&difference(&a, &b)), vec![1, 5]);
        assert_eq!(intersect(&a, &b)[0].1, 2.0);
        assert!(intersect(&a, &[]).is_empty());
        assert_eq!(ids(&difference(&a, &[])), vec![1, 3, 5, 7]);
        let joined = left_join(&a, &b);
        assert_eq!(ids(&joined), vec![1, 3, 5, 7]);
        assert_eq!(joined.iter().map(|(_, s)| *s).collect::<Vec<_>>(), vec![1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn top_k_orders_by_score_then_doc_id() {
        let matches = vec![(0, 1.0), (1, 3.0), (2, 3.0), (3, -1.0), (4, 2.0)];
        let top = top_k(matches, 3);
        assert_eq!(top.total_hits, 5);
        let got: Vec<DocId> = top.hits.iter().map(|r| r.doc_id).collect();
        assert_eq!(got, vec![1, 2, 4]);
    }

    #[test]
    fn top_zero_is_empty() {
        let top = top_k(vec![(0, 1.0)], 0);
        assert_eq!(top.total_hits, 1);
        assert!(top.hits.is_empty());
    }

    #[test]
    fn idf_guard() {
        assert!(idf(10, 9) == 0.0);
        assert!(idf(10, 0) > idf(10, 1));
    }
}
