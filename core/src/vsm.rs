//! TF-IDF vector space model.
//!
//! Every document gets one weight vector per tier. Weights are
//! `log10(N / df) * (1 + log10(tf))`; zero weights are never stored.

use crate::index::{Term, TermDictionary, Tier, TieredIndex};
use crate::{DocId, Error, Result};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Sparse weight vector keyed by stem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocVector {
    pub normalized: bool,
    components: BTreeMap<String, f64>,
}

impl DocVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stem: &str) -> Option<f64> {
        self.components.get(stem).copied()
    }

    /// Set a component. A zero weight deletes the component instead.
    pub fn set(&mut self, stem: &str, weight: f64) {
        if weight == 0.0 {
            self.components.remove(stem);
        } else {
            self.components.insert(stem.to_string(), weight);
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Components in ascending stem order.
    pub fn components(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.components.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn norm(&self) -> f64 {
        self.components.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// Scale to unit length, once. Components that divide down to exactly
    /// zero are dropped; an empty vector stays empty.
    pub fn normalize(&mut self) {
        if self.normalized {
            return;
        }
        self.normalized = true;

        let norm = self.norm();
        if norm == 0.0 {
            return;
        }
        for w in self.components.values_mut() {
            *w /= norm;
        }
        self.components.retain(|_, w| *w != 0.0);
    }

    /// Dot product over the query's components only; components the
    /// document has but the query lacks contribute nothing.
    pub fn cosine(&self, query: &DocVector) -> f64 {
        query.components().map(|(stem, q)| self.get(stem).unwrap_or(0.0) * q).sum()
    }
}

impl FromIterator<(String, f64)> for DocVector {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut v = DocVector::new();
        for (stem, w) in iter {
            v.set(&stem, w);
        }
        v
    }
}

/// Document id to weight vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorSpaceModel {
    vectors: BTreeMap<DocId, DocVector>,
}

impl VectorSpaceModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn add_vector(&mut self, id: DocId) -> Result<&mut DocVector> {
        match self.vectors.entry(id) {
            btree_map::Entry::Occupied(_) => Err(Error::DuplicateVector(id)),
            btree_map::Entry::Vacant(slot) => Ok(slot.insert(DocVector::new())),
        }
    }

    pub fn vector(&self, id: DocId) -> Result<&DocVector> {
        self.vectors.get(&id).ok_or(Error::UnknownVector(id))
    }

    pub fn vector_mut(&mut self, id: DocId) -> Result<&mut DocVector> {
        self.vectors.get_mut(&id).ok_or(Error::UnknownVector(id))
    }

    pub fn set_component(&mut self, id: DocId, stem: &str, weight: f64) -> Result<()> {
        self.vector_mut(id)?.set(stem, weight);
        Ok(())
    }

    /// Normalize every vector that has not been normalized yet.
    pub fn normalize(&mut self) {
        for v in self.vectors.values_mut() {
            v.normalize();
        }
    }

    /// Vectors in ascending document order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &DocVector)> + '_ {
        self.vectors.iter().map(|(id, v)| (*id, v))
    }

    /// Weight every term of `dict` for a corpus of `num_docs` documents
    /// and normalize the result.
    pub fn from_dictionary(dict: &TermDictionary, num_docs: usize) -> Result<Self> {
        let mut model = Self::new();
        for id in 0..num_docs {
            model.add_vector(id as DocId)?;
        }
        for term in dict {
            let idf = idf(term, num_docs)?;
            for doc in term.doc_ids() {
                model.set_component(doc, &term.stem, idf * tf_weight(term, doc))?;
            }
        }
        model.normalize();
        Ok(model)
    }
}

/// `log10(N / df)`. A term without postings cannot be weighted.
pub fn idf(term: &Term, num_docs: usize) -> Result<f64> {
    let df = term.document_count();
    if df == 0 {
        return Err(Error::EmptyPostings { stem: term.stem.clone() });
    }
    Ok((num_docs as f64 / df as f64).log10())
}

/// `1 + log10(tf)`, or 0 when the term does not occur in `doc`.
pub fn tf_weight(term: &Term, doc: DocId) -> f64 {
    match term.frequency(doc) {
        0 => 0.0,
        tf => 1.0 + (tf as f64).log10(),
    }
}

/// Title-tier and body-tier models of one corpus.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TieredVsm {
    pub title: VectorSpaceModel,
    pub body: VectorSpaceModel,
}

impl TieredVsm {
    pub fn build(index: &TieredIndex) -> Result<Self> {
        let n = index.num_docs();
        let title = VectorSpaceModel::from_dictionary(&index.title, n)?;
        let body = VectorSpaceModel::from_dictionary(&index.body, n)?;
        tracing::info!(
            vectors = n,
            title_terms = index.title.len(),
            body_terms = index.body.len(),
            "vector space model built"
        );
        Ok(Self { title, body })
    }

    pub fn tier(&self, tier: Tier) -> &VectorSpaceModel {
        match tier {
            Tier::Title => &self.title,
            Tier::Body => &self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term_in(stem: &str, docs: &[(DocId, &[u32])]) -> Term {
        let mut t = Term::new(stem);
        for (doc, positions) in docs {
            t.add_document(*doc).unwrap();
            for p in *positions {
                t.add_position(*doc, *p).unwrap();
            }
        }
        t
    }

    #[test]
    fn idf_falls_as_document_frequency_rises() {
        let rare = term_in("a", &[(0, &[1])]);
        let common = term_in("b", &[(0, &[1]), (1, &[1]), (2, &[1])]);
        let everywhere = term_in("c", &[(0, &[1]), (1, &[1]), (2, &[1]), (3, &[1])]);
        let r = idf(&rare, 4).unwrap();
        let c = idf(&common, 4).unwrap();
        let e = idf(&everywhere, 4).unwrap();
        assert!(r > c && c > e);
        assert_eq!(e, 0.0);
        assert!((r - 4f64.log10()).abs() < 1e-12);
    }

    #[test]
    fn idf_rejects_empty_postings() {
        assert!(matches!(idf(&Term::new("x"), 3), Err(Error::EmptyPostings { .. })));
    }

    #[test]
    fn tf_weight_is_log_scaled() {
        let t = term_in("a", &[(0, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])]);
        assert!((tf_weight(&t, 0) - 2.0).abs() < 1e-12);
        assert_eq!(tf_weight(&t, 1), 0.0);
    }

    #[test]
    fn zero_weights_are_not_stored() {
        let mut v = DocVector::new();
        v.set("a", 0.5);
        v.set("b", 0.0);
        assert_eq!(v.len(), 1);
        v.set("a", 0.0);
        assert!(v.is_empty());
    }

    #[test]
    fn normalize_yields_unit_length_once() {
        let mut v: DocVector =
            [("a".to_string(), 3.0), ("b".to_string(), 4.0)].into_iter().collect();
        v.normalize();
        assert!(v.normalized);
        assert!((v.get("a").unwrap() - 0.6).abs() < 1e-12);
        assert!((v.norm() - 1.0).abs() < 1e-12);

        v.set("a", 3.0);
        v.normalize();
        assert_eq!(v.get("a"), Some(3.0));
    }

    #[test]
    fn empty_vector_normalizes_to_empty() {
        let mut v = DocVector::new();
        v.normalize();
        assert!(v.is_empty());
        assert!(v.normalized);
    }

    #[test]
    fn cosine_ignores_document_only_components() {
        let doc: DocVector = [("a".to_string(), 0.6), ("b".to_string(), 0.8)].into_iter().collect();
        let query: DocVector =
            [("a".to_string(), 1.0), ("z".to_string(), 1.0)].into_iter().collect();
        assert!((doc.cosine(&query) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn model_has_vector_per_document() {
        let mut dict = TermDictionary::new();
        dict.insert(term_in("cat", &[(0, &[1, 2])]));
        dict.insert(term_in("the", &[(0, &[3]), (1, &[1])]));
        let model = VectorSpaceModel::from_dictionary(&dict, 3).unwrap();
        assert_eq!(model.len(), 3);
        assert!(model.vector(2).unwrap().is_empty());
        // "the" is in 2 of 3 documents, "cat" only in doc 0.
        let v0 = model.vector(0).unwrap();
        assert!(v0.get("cat").unwrap() > v0.get("the").unwrap());
        assert!((v0.norm() - 1.0).abs() < 1e-12);
        assert!(matches!(model.vector(7), Err(Error::UnknownVector(7))));
    }

    #[test]
    fn tiers_select_their_model() {
        let mut index = TieredIndex::new();
        index.titles.push("Cat".into());
        index.titles.push("Dog".into());
        index.title.record("cat", "cat", 0, 0).unwrap();
        index.body.record("dog", "dog", 1, 1).unwrap();
        let models = TieredVsm::build(&index).unwrap();
        assert_eq!(models.tier(Tier::Title).vector(0).unwrap().len(), 1);
        assert!(models.tier(Tier::Title).vector(1).unwrap().is_empty());
        let dog = models.tier(Tier::Body).vector(1).unwrap().get("dog").unwrap();
        assert!((dog - 1.0).abs() < 1e-12);
    }

    #[test]
    fn duplicate_vectors_are_rejected() {
        let mut model = VectorSpaceModel::new();
        model.add_vector(0).unwrap();
        assert!(matches!(model.add_vector(0), Err(Error::DuplicateVector(0))));
    }
}
