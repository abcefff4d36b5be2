use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub type TermId = u32;
pub type DocId = u32;

/// A stemmed term: the surface spellings seen for it and, per document,
/// the ascending list of positions where it occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub stem: String,
    pub variants: BTreeSet<String>,
    postings: BTreeMap<DocId, Vec<u32>>,
}

impl Term {
    pub fn new(stem: impl Into<String>) -> Self {
        Self { stem: stem.into(), variants: BTreeSet::new(), postings: BTreeMap::new() }
    }

    pub fn with_variant(stem: impl Into<String>, variant: impl Into<String>) -> Self {
        let mut term = Self::new(stem);
        term.variants.insert(variant.into());
        term
    }

    pub fn add_variant(&mut self, variant: &str) {
        if !self.variants.contains(variant) {
            self.variants.insert(variant.to_string());
        }
    }

    /// Open an empty posting for `doc`. A second posting for the same document is a builder bug.
    pub fn add_document(&mut self, doc: DocId) -> Result<()> {
        if self.postings.contains_key(&doc) {
            return Err(Error::DuplicateDocument { stem: self.stem.clone(), doc });
        }
        self.postings.insert(doc, Vec::new());
        Ok(())
    }

    /// Insert `pos` into the posting of `doc`, keeping positions ascending.
    pub fn add_position(&mut self, doc: DocId, pos: u32) -> Result<()> {
        let Some(positions) = self.postings.get_mut(&doc) else {
            return Err(Error::MissingDocument { stem: self.stem.clone(), doc });
        };
        match positions.binary_search(&pos) {
            Ok(_) => Err(Error::DuplicatePosition { stem: self.stem.clone(), doc, pos }),
            Err(at) => {
                positions.insert(at, pos);
                Ok(())
            }
        }
    }

    pub fn remove_document(&mut self, doc: DocId) -> Option<Vec<u32>> {
        self.postings.remove(&doc)
    }

    pub fn contains_document(&self, doc: DocId) -> bool {
        self.postings.contains_key(&doc)
    }

    pub fn has_position(&self, doc: DocId, pos: u32) -> bool {
        self.positions(doc).is_some_and(|p| p.binary_search(&pos).is_ok())
    }

    pub fn positions(&self, doc: DocId) -> Option<&[u32]> {
        self.postings.get(&doc).map(Vec::as_slice)
    }

    /// Postings in ascending document order.
    pub fn postings(&self) -> impl Iterator<Item = (DocId, &[u32])> + '_ {
        self.postings.iter().map(|(doc, p)| (*doc, p.as_slice()))
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.postings.keys().copied()
    }

    /// Number of documents containing the term.
    pub fn document_count(&self) -> usize {
        self.postings.len()
    }

    /// Occurrences of the term in one document, 0 when absent.
    pub fn frequency(&self, doc: DocId) -> usize {
        self.postings.get(&doc).map_or(0, Vec::len)
    }

    pub fn total_frequency(&self) -> usize {
        self.postings.values().map(Vec::len).sum()
    }
}

/// Stem-keyed dictionary of terms for one tier.
///
/// Terms live in an arena indexed by [`TermId`], in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    ids: HashMap<String, TermId>,
    terms: Vec<Term>,
}

impl TermDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, stem: &str) -> Option<&Term> {
        self.ids.get(stem).map(|&id| &self.terms[id as usize])
    }

    pub fn term_id(&self, stem: &str) -> Option<TermId> {
        self.ids.get(stem).copied()
    }

    pub fn get_by_id(&self, id: TermId) -> Option<&Term> {
        self.terms.get(id as usize)
    }

    /// Terms in term-id order.
    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.terms.iter()
    }

    /// Add a fully formed term. Returns `None` if the stem is already present.
    pub fn insert(&mut self, term: Term) -> Option<TermId> {
        if self.ids.contains_key(&term.stem) {
            return None;
        }
        let id = self.terms.len() as TermId;
        self.ids.insert(term.stem.clone(), id);
        self.terms.push(term);
        Some(id)
    }

    /// Record one occurrence of `variant` (stemmed to `stem`) at `pos` in `doc`.
    pub fn record(&mut self, stem: &str, variant: &str, doc: DocId, pos: u32) -> Result<TermId> {
        let id = match self.ids.get(stem) {
            Some(&id) => {
                self.terms[id as usize].add_variant(variant);
                id
            }
            None => {
                let id = self.terms.len() as TermId;
                self.ids.insert(stem.to_string(), id);
                self.terms.push(Term::with_variant(stem, variant));
                id
            }
        };
        let term = &mut self.terms[id as usize];
        if !term.contains_document(doc) {
            term.add_document(doc)?;
        }
        term.add_position(doc, pos)?;
        Ok(id)
    }
}

// Equality ignores term-id order: a reloaded dictionary may number terms differently.
impl PartialEq for TermDictionary {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.terms.iter().all(|t| other.get(&t.stem) == Some(t))
    }
}

impl<'a> IntoIterator for &'a TermDictionary {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Title,
    Body,
}

/// Title and body dictionaries of one corpus, plus the document titles in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TieredIndex {
    pub titles: Vec<String>,
    pub title: TermDictionary,
    pub body: TermDictionary,
}

impl TieredIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_docs(&self) -> usize {
        self.titles.len()
    }
}
