//! Two-phase ranked retrieval.
//!
//! Phase A scores the query against every title vector and keeps the top
//! `res_cnt_title` documents. Phase B re-scores only those candidates against
//! their body vectors and returns the top `res_cnt_doc`.

use crate::builder::CorpusRecord;
use crate::index::{Term, TieredIndex};
use crate::intersect::positional_intersect;
use crate::query::QueryExpr;
use crate::tokenizer::{terms, PorterStemmer, Stemmer};
use crate::vsm::{DocVector, TieredVsm, VectorSpaceModel};
use crate::{DocId, Error, Result};
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

pub const DEFAULT_RES_CNT_TITLE: usize = 25;
pub const DEFAULT_RES_CNT_DOC: usize = 10;

/// Result counts for the two ranking phases. `res_cnt_doc <= res_cnt_title` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    res_cnt_title: usize,
    res_cnt_doc: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        Self { res_cnt_title: DEFAULT_RES_CNT_TITLE, res_cnt_doc: DEFAULT_RES_CNT_DOC }
    }
}

impl Tunables {
    pub fn res_cnt_title(&self) -> usize {
        self.res_cnt_title
    }

    pub fn res_cnt_doc(&self) -> usize {
        self.res_cnt_doc
    }

    /// Lowering the title count below the document count drags the document count down with it.
    pub fn set_res_cnt_title(&mut self, value: usize) -> Result<()> {
        if value == 0 {
            return Err(Error::InvalidTunable { name: "res_cnt_title", value });
        }
        self.res_cnt_title = value;
        self.res_cnt_doc = self.res_cnt_doc.min(value);
        Ok(())
    }

    /// Clamped to the current title count.
    pub fn set_res_cnt_doc(&mut self, value: usize) -> Result<()> {
        if value == 0 {
            return Err(Error::InvalidTunable { name: "res_cnt_doc", value });
        }
        self.res_cnt_doc = value.min(self.res_cnt_title);
        Ok(())
    }
}

/// Document ids grouped by similarity.
///
/// Ranking walks groups from the highest similarity down; ids inside one
/// group come out in ascending order.
#[derive(Debug, Clone, Default)]
pub struct SimilarityTable {
    groups: BTreeMap<OrderedFloat<f64>, BTreeSet<DocId>>,
    entries: usize,
}

impl SimilarityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc: DocId, similarity: f64) {
        if self.groups.entry(OrderedFloat(similarity)).or_default().insert(doc) {
            self.entries += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Every entry in rank order.
    pub fn ranked(&self) -> impl Iterator<Item = (DocId, f64)> + '_ {
        self.groups
            .iter()
            .rev()
            .flat_map(|(sim, docs)| docs.iter().map(move |&doc| (doc, sim.0)))
    }

    /// The `k` best ids, or every id when there are fewer than `k`.
    pub fn top(&self, k: usize) -> Vec<DocId> {
        self.ranked().take(k).map(|(doc, _)| doc).collect()
    }

    pub fn similarity(&self, doc: DocId) -> Option<f64> {
        self.ranked().find(|&(d, _)| d == doc).map(|(_, sim)| sim)
    }
}

/// Score `query` against the vectors of `model`, restricted to `ids` when given.
pub fn similarity(
    model: &VectorSpaceModel,
    query: &DocVector,
    ids: Option<&[DocId]>,
) -> Result<SimilarityTable> {
    let mut table = SimilarityTable::new();
    match ids {
        None => {
            for (doc, vector) in model.iter() {
                table.insert(doc, vector.cosine(query));
            }
        }
        Some(ids) => {
            for &doc in ids {
                table.insert(doc, model.vector(doc)?.cosine(query));
            }
        }
    }
    Ok(table)
}

/// Raw term counts keyed by stem, normalized to unit length.
pub fn query_vector<S: Stemmer>(text: &str, stemmer: &S) -> DocVector {
    let mut counts: HashMap<String, f64> = HashMap::new();
    for word in terms(text) {
        *counts.entry(stemmer.stem(&word)).or_insert(0.0) += 1.0;
    }
    let mut vector: DocVector = counts.into_iter().collect();
    vector.normalize();
    vector
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub title: String,
}

/// Everything needed to answer queries against one corpus.
///
/// An engine holds the vector models, the positional index or both. Ranked
/// search needs the models and positional queries need the index; asking
/// for the missing part is a recoverable error.
pub struct Engine<S = PorterStemmer> {
    stemmer: S,
    titles: Vec<String>,
    sources: Vec<PathBuf>,
    models: Option<TieredVsm>,
    index: Option<TieredIndex>,
    tunables: Tunables,
}

impl<S: Stemmer> Engine<S> {
    fn new(
        titles: Vec<String>,
        models: Option<TieredVsm>,
        index: Option<TieredIndex>,
        stemmer: S,
    ) -> Self {
        Self { stemmer, titles, sources: Vec::new(), models, index, tunables: Tunables::default() }
    }

    /// Weight the index into models and keep it for positional queries.
    pub fn from_index(index: TieredIndex, stemmer: S) -> Result<Self> {
        let models = TieredVsm::build(&index)?;
        Ok(Self::new(index.titles.clone(), Some(models), Some(index), stemmer))
    }

    pub fn from_models(models: TieredVsm, titles: Vec<String>, stemmer: S) -> Self {
        Self::new(titles, Some(models), None, stemmer)
    }

    /// Positional queries only; no models are built.
    pub fn index_only(index: TieredIndex, stemmer: S) -> Self {
        Self::new(index.titles.clone(), None, Some(index), stemmer)
    }

    /// Record file of each document, in id order. Needed by [`Engine::excerpt`].
    pub fn with_sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.sources = sources;
        self
    }

    pub fn num_docs(&self) -> usize {
        self.titles.len()
    }

    pub fn title(&self, doc: DocId) -> Result<&str> {
        self.titles.get(doc as usize).map(String::as_str).ok_or(Error::UnknownDocument(doc))
    }

    pub fn source(&self, doc: DocId) -> Result<&Path> {
        if doc as usize >= self.num_docs() {
            return Err(Error::UnknownDocument(doc));
        }
        self.sources.get(doc as usize).map(PathBuf::as_path).ok_or(Error::UnknownSource(doc))
    }

    /// Re-read a document's record and return up to `words` body terms from `pos` on.
    pub fn excerpt(&self, doc: DocId, pos: u32, words: usize) -> Result<Vec<String>> {
        let record = CorpusRecord::load(self.source(doc)?)?;
        Ok(record.excerpt(pos, words))
    }

    pub fn tunables(&self) -> Tunables {
        self.tunables
    }

    pub fn tunables_mut(&mut self) -> &mut Tunables {
        &mut self.tunables
    }

    pub fn query_vector(&self, text: &str) -> DocVector {
        query_vector(text, &self.stemmer)
    }

    fn models(&self) -> Result<&TieredVsm> {
        self.models.as_ref().ok_or(Error::ModelsNotLoaded)
    }

    /// Phase A: similarity of the query to every title vector.
    pub fn rank_titles(&self, query: &DocVector) -> Result<SimilarityTable> {
        similarity(&self.models()?.title, query, None)
    }

    /// Ranked free-text search.
    pub fn search(&self, text: &str) -> Result<Vec<SearchHit>> {
        let query = self.query_vector(text);
        let candidates = self.rank_titles(&query)?.top(self.tunables.res_cnt_title);
        let ranked = similarity(&self.models()?.body, &query, Some(&candidates))?;
        tracing::debug!(components = query.len(), candidates = candidates.len(), "ranked query");

        ranked
            .ranked()
            .take(self.tunables.res_cnt_doc)
            .map(|(doc_id, score)| -> Result<SearchHit> {
                Ok(SearchHit { doc_id, score, title: self.title(doc_id)?.to_string() })
            })
            .collect()
    }

    fn body_index(&self) -> Result<&TieredIndex> {
        self.index.as_ref().ok_or(Error::IndexNotLoaded)
    }

    // A query word that normalizes to more or fewer than one term cannot match a single stem.
    fn stem_word(&self, word: &str) -> Option<String> {
        match terms(word).as_slice() {
            [term] => Some(self.stemmer.stem(term)),
            _ => None,
        }
    }

    /// The body-tier term a query word stems to.
    pub fn lookup(&self, word: &str) -> Result<Option<&Term>> {
        let index = self.body_index()?;
        Ok(self.stem_word(word).and_then(|stem| index.body.get(&stem)))
    }

    /// Body positions of `first` that lie within `proximity` words of `second`.
    pub fn intersect(&self, first: &str, second: &str, proximity: u32) -> Result<Option<Term>> {
        let (Some(a), Some(b)) = (self.lookup(first)?, self.lookup(second)?) else {
            return Ok(None);
        };
        positional_intersect(a, b, proximity)
    }

    pub fn positional(&self, expr: &QueryExpr) -> Result<Option<Term>> {
        match expr {
            QueryExpr::Term(word) => Ok(self.lookup(word)?.cloned()),
            QueryExpr::Proximity { first, second, distance } => {
                self.intersect(first, second, *distance)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(w: &str) -> String {
        w.to_string()
    }

    #[test]
    fn top_walks_groups_in_descending_order() {
        let mut t = SimilarityTable::new();
        t.insert(4, 0.2);
        t.insert(1, 0.9);
        t.insert(3, 0.2);
        t.insert(0, 0.0);
        t.insert(2, 0.9);
        assert_eq!(t.top(3), vec![1, 2, 3]);
        assert_eq!(t.top(10), vec![1, 2, 3, 4, 0]);
        assert_eq!(t.top(0), Vec::<DocId>::new());
        assert_eq!(t.len(), 5);
        assert_eq!(t.similarity(4), Some(0.2));
    }

    #[test]
    fn query_vector_counts_stems() {
        let v = query_vector("Cat cat dog", &identity);
        let (c, d) = (v.get("cat").unwrap(), v.get("dog").unwrap());
        assert!((c - 2.0 / 5f64.sqrt()).abs() < 1e-12);
        assert!((d - 1.0 / 5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_query_vector() {
        let v = query_vector(" ?! ", &identity);
        assert!(v.is_empty());
    }

    #[test]
    fn tunables_stay_ordered() {
        let mut t = Tunables::default();
        assert_eq!((t.res_cnt_title(), t.res_cnt_doc()), (25, 10));
        t.set_res_cnt_doc(40).unwrap();
        assert_eq!(t.res_cnt_doc(), 25);
        t.set_res_cnt_title(5).unwrap();
        assert_eq!((t.res_cnt_title(), t.res_cnt_doc()), (5, 5));
        assert!(matches!(t.set_res_cnt_title(0), Err(Error::InvalidTunable { .. })));
        assert!(t.set_res_cnt_doc(0).unwrap_err().is_recoverable());
    }

    #[test]
    fn models_only_engine_has_no_positional_index() {
        let engine = Engine::from_models(TieredVsm::default(), Vec::new(), identity);
        assert!(matches!(engine.lookup("cat"), Err(Error::IndexNotLoaded)));
        assert!(matches!(engine.intersect("a", "b", 1), Err(Error::IndexNotLoaded)));
    }

    #[test]
    fn index_only_engine_cannot_rank() {
        let mut index = TieredIndex::new();
        index.titles.push("The Cat".into());
        index.body.record("cat", "cat", 0, 1).unwrap();
        let engine = Engine::index_only(index, identity);
        assert!(matches!(engine.search("cat"), Err(Error::ModelsNotLoaded)));
        assert_eq!(engine.lookup("cat").unwrap().unwrap().positions(0), Some(&[1][..]));
    }

    #[test]
    fn excerpt_needs_a_known_source() {
        let mut index = TieredIndex::new();
        index.titles.push("The Cat".into());
        let engine = Engine::index_only(index, identity);
        assert!(matches!(engine.excerpt(0, 1, 8), Err(Error::UnknownSource(0))));
        assert!(matches!(engine.excerpt(3, 1, 8), Err(Error::UnknownDocument(3))));
        assert!(engine.excerpt(0, 1, 8).unwrap_err().is_recoverable());
    }
}
