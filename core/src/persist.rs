//! Text codecs for the tiered index and the vector space models, and the
//! on-disk layout of an index directory.
//!
//! A term record is one line:
//!
//! ```text
//! stem [ variant ... ] docCount { [ docGap freq posGap ... ] ... }
//! ```
//!
//! Document ids and positions are gap encoded; the first gap of each run is
//! relative to 0.

use crate::index::{Term, TermDictionary, TieredIndex};
use crate::vsm::{DocVector, TieredVsm, VectorSpaceModel};
use crate::{DocId, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const TIER_SEPARATOR: &str = "-";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub title_terms: u32,
    pub body_terms: u32,
    pub created_at: String,
    pub version: u32,
    /// Record file of each document, in id order.
    #[serde(default)]
    pub sources: Vec<PathBuf>,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.tier") }
    pub fn title_vsm(&self) -> PathBuf { self.root.join("title.vsm") }
    pub fn body_vsm(&self) -> PathBuf { self.root.join("body.vsm") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// Serialize one term as a single record line (no trailing newline).
pub fn encode_term(term: &Term) -> String {
    let mut out = format!("{} [ ", term.stem);
    for variant in &term.variants {
        out.push_str(variant);
        out.push(' ');
    }
    let _ = write!(out, "] {} {{", term.document_count());

    let mut prev_doc = 0;
    for (doc, positions) in term.postings() {
        let _ = write!(out, " [ {} {} ", doc - prev_doc, positions.len());
        prev_doc = doc;
        let mut prev_pos = 0;
        for &pos in positions {
            let _ = write!(out, "{} ", pos - prev_pos);
            prev_pos = pos;
        }
        out.push(']');
    }
    out.push_str(" }");
    out
}

/// Walks the whitespace-separated fields of one line, reporting errors
/// against that line.
struct Fields<'a> {
    inner: std::str::SplitWhitespace<'a>,
    context: &'a str,
    line: usize,
}

impl<'a> Fields<'a> {
    fn new(text: &'a str, context: &'a str, line: usize) -> Self {
        Self { inner: text.split_whitespace(), context, line }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::malformed(self.context, self.line, message)
    }

    fn next_field(&mut self, what: &str) -> Result<&'a str> {
        self.inner.next().ok_or_else(|| self.error(format!("missing {what}")))
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        let found = self.next_field(&format!("'{token}'"))?;
        if found != token {
            return Err(self.error(format!("expected '{token}', found '{found}'")));
        }
        Ok(())
    }

    fn number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let field = self.next_field(what)?;
        field.parse().map_err(|_| self.error(format!("invalid {what} '{field}'")))
    }

    fn finish(mut self) -> Result<()> {
        match self.inner.next() {
            Some(extra) => Err(self.error(format!("unexpected trailing field '{extra}'"))),
            None => Ok(()),
        }
    }
}

fn contract_violation(fields: &Fields<'_>, err: Error) -> Error {
    fields.error(err.to_string())
}

/// Parse a record line written by [`encode_term`].
pub fn decode_term(line: &str, context: &str, line_no: usize) -> Result<Term> {
    let mut fields = Fields::new(line, context, line_no);
    let stem = fields.next_field("stem")?;
    let mut term = Term::new(stem);

    fields.expect("[")?;
    loop {
        match fields.next_field("']' closing the variant list")? {
            "]" => break,
            variant => term.add_variant(variant),
        }
    }

    let doc_count: usize = fields.number("document count")?;
    fields.expect("{")?;
    let mut doc: DocId = 0;
    for _ in 0..doc_count {
        fields.expect("[")?;
        let gap: DocId = fields.number("document gap")?;
        doc = doc.checked_add(gap).ok_or_else(|| fields.error("document id overflow"))?;
        term.add_document(doc).map_err(|e| contract_violation(&fields, e))?;

        let freq: usize = fields.number("frequency")?;
        if freq == 0 {
            return Err(fields.error(format!("document {doc} with no positions")));
        }
        let mut pos = 0u32;
        for _ in 0..freq {
            let gap: u32 = fields.number("position gap")?;
            pos = pos.checked_add(gap).ok_or_else(|| fields.error("position overflow"))?;
            term.add_position(doc, pos).map_err(|e| contract_violation(&fields, e))?;
        }
        fields.expect("]")?;
    }
    fields.expect("}")?;
    fields.finish()?;
    Ok(term)
}

fn write_dictionary<W: Write>(w: &mut W, dict: &TermDictionary) -> Result<()> {
    for term in dict {
        writeln!(w, "{}", encode_term(term))?;
    }
    Ok(())
}

/// Write the whole tiered index: titles, title records, `-`, body records.
pub fn write_tiered_index<W: Write>(w: &mut W, index: &TieredIndex) -> Result<()> {
    writeln!(w, "{}", index.titles.len())?;
    for title in &index.titles {
        writeln!(w, "{title}")?;
    }
    write_dictionary(w, &index.title)?;
    writeln!(w, "{TIER_SEPARATOR}")?;
    write_dictionary(w, &index.body)?;
    Ok(())
}

/// Line reader that tracks 1-based line numbers for error reporting.
struct Lines<'a, R> {
    inner: std::io::Lines<R>,
    context: &'a str,
    line: usize,
}

impl<'a, R: BufRead> Lines<'a, R> {
    fn new(reader: R, context: &'a str) -> Self {
        Self { inner: reader.lines(), context, line: 0 }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let line = self.inner.next().transpose()?;
        if line.is_some() {
            self.line += 1;
        }
        Ok(line)
    }

    fn require(&mut self, what: &str) -> Result<String> {
        match self.next_line()? {
            Some(line) => Ok(line),
            None => {
                let message = format!("unexpected end of file, expected {what}");
                Err(Error::malformed(self.context, self.line + 1, message))
            }
        }
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let line = self.require(what)?;
        line.trim().parse().map_err(|_| {
            Error::malformed(self.context, self.line, format!("invalid {what} '{line}'"))
        })
    }

    fn titles(&mut self, count: usize) -> Result<Vec<String>> {
        (0..count).map(|_| self.require("a document title")).collect()
    }
}

fn insert_decoded(
    dict: &mut TermDictionary,
    term: Term,
    context: &str,
    line: usize,
    num_docs: usize,
) -> Result<()> {
    if let Some(doc) = term.doc_ids().find(|&d| d as usize >= num_docs) {
        let message = format!("term '{}' references unknown document {doc}", term.stem);
        return Err(Error::malformed(context, line, message));
    }
    let stem = term.stem.clone();
    dict.insert(term)
        .map(|_| ())
        .ok_or_else(|| Error::malformed(context, line, format!("duplicate term '{stem}'")))
}

pub fn read_tiered_index<R: BufRead>(reader: R, context: &str) -> Result<TieredIndex> {
    let mut lines = Lines::new(reader, context);
    let num_docs = lines.count("document count")?;
    let titles = lines.titles(num_docs)?;

    let mut title = TermDictionary::new();
    loop {
        let line = lines.require("the tier separator")?;
        if line == TIER_SEPARATOR {
            break;
        }
        let term = decode_term(&line, context, lines.line)?;
        insert_decoded(&mut title, term, context, lines.line, num_docs)?;
    }

    let mut body = TermDictionary::new();
    while let Some(line) = lines.next_line()? {
        let term = decode_term(&line, context, lines.line)?;
        insert_decoded(&mut body, term, context, lines.line, num_docs)?;
    }

    Ok(TieredIndex { titles, title, body })
}

/// Write a model: count line, then `id normalized count (stem weight)*` per document.
pub fn write_vsm<W: Write>(w: &mut W, model: &VectorSpaceModel) -> Result<()> {
    writeln!(w, "{}", model.len())?;
    for (id, vector) in model.iter() {
        write!(w, "{} {} {} ", id, vector.normalized, vector.len())?;
        for (stem, weight) in vector.components() {
            write!(w, "{stem} {weight:?} ")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn decode_vector(line: &str, context: &str, line_no: usize) -> Result<(DocId, DocVector)> {
    let mut fields = Fields::new(line, context, line_no);
    let id: DocId = fields.number("document id")?;
    let mut vector = DocVector::new();
    vector.normalized = match fields.next_field("normalization flag")? {
        "true" => true,
        "false" => false,
        other => return Err(fields.error(format!("invalid normalization flag '{other}'"))),
    };
    let count: usize = fields.number("component count")?;
    for _ in 0..count {
        let stem = fields.next_field("component stem")?;
        let weight: f64 = fields.number("component weight")?;
        if vector.get(stem).is_some() {
            return Err(fields.error(format!("duplicate component '{stem}'")));
        }
        vector.set(stem, weight);
    }
    fields.finish()?;
    Ok((id, vector))
}

/// Read a model written by [`write_vsm`]. Anything after the last vector
/// line is left unread.
pub fn read_vsm<R: BufRead>(reader: &mut R, context: &str) -> Result<VectorSpaceModel> {
    let mut model = VectorSpaceModel::new();
    let mut lines = Lines::new(reader, context);
    let count = lines.count("vector count")?;
    for _ in 0..count {
        let line = lines.require("a document vector")?;
        let (id, vector) = decode_vector(&line, context, lines.line)?;
        let slot = model
            .add_vector(id)
            .map_err(|e| Error::malformed(context, lines.line, e.to_string()))?;
        *slot = vector;
    }
    Ok(model)
}

/// Titles appended after the title model: every remaining line.
pub fn read_titles<R: BufRead>(reader: R) -> Result<Vec<String>> {
    reader.lines().map(|l| l.map_err(Error::from)).collect()
}

pub fn save_index(paths: &IndexPaths, index: &TieredIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut w = BufWriter::new(File::create(paths.index())?);
    write_tiered_index(&mut w, index)?;
    w.flush()?;
    tracing::info!(path = %paths.index().display(), "tiered index saved");
    Ok(())
}

pub fn load_index(paths: &IndexPaths) -> Result<TieredIndex> {
    let path = paths.index();
    let index = read_tiered_index(BufReader::new(File::open(&path)?), &path.display().to_string())?;
    tracing::info!(
        num_docs = index.num_docs(),
        title_terms = index.title.len(),
        body_terms = index.body.len(),
        "tiered index loaded"
    );
    Ok(index)
}

/// Save both models; the titles go after the title model in the same file.
pub fn save_models(paths: &IndexPaths, models: &TieredVsm, titles: &[String]) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut w = BufWriter::new(File::create(paths.title_vsm())?);
    write_vsm(&mut w, &models.title)?;
    for title in titles {
        writeln!(w, "{title}")?;
    }
    w.flush()?;

    let mut w = BufWriter::new(File::create(paths.body_vsm())?);
    write_vsm(&mut w, &models.body)?;
    w.flush()?;
    tracing::info!(vectors = models.title.len(), "vector space models saved");
    Ok(())
}

/// Load both models and the titles stored with the title model.
pub fn load_models(paths: &IndexPaths) -> Result<(TieredVsm, Vec<String>)> {
    let path = paths.title_vsm();
    let context = path.display().to_string();
    let mut r = BufReader::new(File::open(&path)?);
    let title = read_vsm(&mut r, &context)?;
    let titles = read_titles(r)?;
    if titles.len() != title.len() {
        return Err(Error::malformed(
            context,
            title.len() + 1,
            format!("expected {} titles, found {}", title.len(), titles.len()),
        ));
    }

    let path = paths.body_vsm();
    let mut r = BufReader::new(File::open(&path)?);
    let body = read_vsm(&mut r, &path.display().to_string())?;
    tracing::info!(vectors = title.len(), "vector space models loaded");
    Ok((TieredVsm { title, body }, titles))
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}
