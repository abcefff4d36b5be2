use crate::tokenizer::{tokenize, PorterStemmer, Stemmer};
use crate::{DocId, Error, Result, TieredIndex};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Words shown by [`CorpusRecord::excerpt`] when no length is given.
pub const EXCERPT_WORDS: usize = 8;

const SECTION_MARKERS: [&str; 4] = [".T", ".A", ".B", ".W"];

fn is_marker(line: &str) -> bool {
    SECTION_MARKERS.contains(&line)
}

/// Corpus entry list: a count line followed by that many relative paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub root: PathBuf,
    pub entries: Vec<PathBuf>,
}

impl Manifest {
    /// Read a manifest file. Entries resolve against the manifest's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let reader = BufReader::new(File::open(path)?);
        Self::parse(reader, root, &path.display().to_string())
    }

    pub fn parse<R: BufRead>(reader: R, root: PathBuf, context: &str) -> Result<Self> {
        let mut lines = reader.lines();
        let header = lines.next().transpose()?.unwrap_or_default();
        let count: usize = header
            .trim()
            .parse()
            .map_err(|_| {
                Error::malformed(context, 1, format!("expected an entry count, found '{header}'"))
            })?;

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let line_no = i + 2;
            let line = lines.next().transpose()?.ok_or_else(|| {
                Error::malformed(context, line_no, format!("expected {count} entries, found {i}"))
            })?;
            let entry = line.trim();
            if entry.is_empty() {
                return Err(Error::malformed(context, line_no, "empty corpus entry"));
            }
            entries.push(PathBuf::from(entry));
        }
        Ok(Self { root, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry paths joined onto the manifest root.
    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.entries.iter().map(|e| self.root.join(e))
    }
}

/// One parsed corpus file.
///
/// `title_segment` is the raw title text: every line between `.T` and `.A`,
/// each prefixed with a space. `body` holds the lines of the `.W` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRecord {
    pub title_segment: String,
    pub body: Vec<String>,
}

impl CorpusRecord {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Self::parse(reader, &path.display().to_string())
    }

    pub fn parse<R: BufRead>(reader: R, context: &str) -> Result<Self> {
        let mut lines = reader.lines().enumerate();
        let mut title: Option<String> = None;
        let mut body = Vec::new();
        // A marker line that ended the previous section and still needs dispatching.
        let mut pending: Option<String> = None;
        let mut last_line = 0;

        loop {
            let line = match pending.take() {
                Some(line) => line,
                None => match lines.next() {
                    Some((i, line)) => {
                        last_line = i + 1;
                        line?
                    }
                    None => break,
                },
            };

            match line.as_str() {
                ".T" => {
                    let mut segment = String::new();
                    loop {
                        let Some((i, next)) = lines.next() else {
                            let message = "title is not terminated by .A";
                            return Err(Error::malformed(context, last_line, message));
                        };
                        last_line = i + 1;
                        let next = next?;
                        if next == ".A" {
                            pending = Some(next);
                            break;
                        }
                        segment.push(' ');
                        segment.push_str(&next);
                    }
                    title = Some(segment);
                }
                ".W" => {
                    for (i, next) in lines.by_ref() {
                        last_line = i + 1;
                        let next = next?;
                        if is_marker(&next) {
                            pending = Some(next);
                            break;
                        }
                        body.push(next);
                    }
                }
                // .A and .B sections, and anything outside a section, are skipped.
                _ => {}
            }
        }

        let title_segment =
            title.ok_or_else(|| Error::malformed(context, last_line, "record has no .T section"))?;
        Ok(Self { title_segment, body })
    }

    /// Display title: the trimmed segment with periods removed.
    pub fn title(&self) -> String {
        self.title_segment.trim().replace('.', "")
    }

    /// Body terms with their positions. Positions start at 1 and run on
    /// across lines.
    pub fn body_tokens(&self) -> Vec<(String, u32)> {
        let mut tokens = Vec::new();
        let mut next_pos = 1u32;
        for line in &self.body {
            let line_tokens = tokenize(line, next_pos);
            next_pos += line_tokens.len() as u32;
            tokens.extend(line_tokens);
        }
        tokens
    }

    /// Up to `words` normalized body terms starting at body position `pos`.
    pub fn excerpt(&self, pos: u32, words: usize) -> Vec<String> {
        self.body_tokens()
            .into_iter()
            .skip_while(|&(_, p)| p < pos)
            .take(words)
            .map(|(word, _)| word)
            .collect()
    }
}

/// Accumulates corpus records into a [`TieredIndex`].
///
/// Document ids are assigned in the order records are added.
pub struct IndexBuilder<S = PorterStemmer> {
    stemmer: S,
    index: TieredIndex,
}

impl Default for IndexBuilder<PorterStemmer> {
    fn default() -> Self {
        Self::new(PorterStemmer)
    }
}

impl<S: Stemmer> IndexBuilder<S> {
    pub fn new(stemmer: S) -> Self {
        Self { stemmer, index: TieredIndex::new() }
    }

    /// Tokenize one record into both tiers and return its document id.
    ///
    /// Title positions start at 0; body positions start at 1 and run on
    /// across all body lines.
    pub fn add_record(&mut self, record: &CorpusRecord) -> Result<DocId> {
        let doc = self.index.titles.len() as DocId;

        for (word, pos) in tokenize(&record.title_segment, 0) {
            let stem = self.stemmer.stem(&word);
            self.index.title.record(&stem, &word, doc, pos)?;
        }

        for (word, pos) in record.body_tokens() {
            let stem = self.stemmer.stem(&word);
            self.index.body.record(&stem, &word, doc, pos)?;
        }

        self.index.titles.push(record.title());
        Ok(doc)
    }

    /// Load and add every record listed in `manifest`, in manifest order.
    pub fn add_manifest(&mut self, manifest: &Manifest) -> Result<()> {
        let total = manifest.len();
        let step = total.div_ceil(10).max(1);
        for (i, path) in manifest.paths().enumerate() {
            if i % step == 0 {
                tracing::info!(read = i, total, "indexing corpus");
            }
            tracing::debug!(path = %path.display(), "reading corpus record");
            let record = CorpusRecord::load(&path)?;
            self.add_record(&record)?;
        }
        tracing::info!(
            num_docs = self.index.num_docs(),
            title_terms = self.index.title.len(),
            body_terms = self.index.body.len(),
            "tiered index built"
        );
        Ok(())
    }

    pub fn finish(self) -> TieredIndex {
        self.index
    }
}

/// Build a tiered index from the corpus manifest at `path`.
pub fn build_index<S: Stemmer>(path: &Path, stemmer: S) -> Result<TieredIndex> {
    let manifest = Manifest::load(path)?;
    let mut builder = IndexBuilder::new(stemmer);
    builder.add_manifest(&manifest)?;
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn identity(w: &str) -> String {
        w.to_string()
    }

    #[test]
    fn manifest_lists_entries() {
        let text = Cursor::new("2\n./a/one.txt\ntwo.txt\n");
        let m = Manifest::parse(text, PathBuf::from("/corpus"), "m").unwrap();
        assert_eq!(m.len(), 2);
        let paths: Vec<_> = m.paths().collect();
        assert_eq!(paths[1], PathBuf::from("/corpus/two.txt"));
    }

    #[test]
    fn short_manifest_is_malformed() {
        let err = Manifest::parse(Cursor::new("3\na\nb\n"), PathBuf::new(), "m").unwrap_err();
        assert!(matches!(err, Error::Malformed { line: 4, .. }));
        let err = Manifest::parse(Cursor::new("lots\n"), PathBuf::new(), "m").unwrap_err();
        assert!(matches!(err, Error::Malformed { line: 1, .. }));
    }

    #[test]
    fn record_sections() {
        let text = ".T\nThe Cat\nin the Hat.\n.A\nSeuss, T.\n.B\nRandom House\n\
                    .W\nthe cat sat\non the mat\n";
        let rec = CorpusRecord::parse(Cursor::new(text), "r").unwrap();
        assert_eq!(rec.title_segment, " The Cat in the Hat.");
        assert_eq!(rec.title(), "The Cat in the Hat");
        assert_eq!(rec.body, vec!["the cat sat", "on the mat"]);
    }

    #[test]
    fn unterminated_title_is_malformed() {
        let err = CorpusRecord::parse(Cursor::new(".T\nNo end\n"), "r").unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
        let err = CorpusRecord::parse(Cursor::new(".W\nbody only\n"), "r").unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[test]
    fn builder_assigns_positions_per_tier() {
        let mut b = IndexBuilder::new(identity);
        let rec = CorpusRecord {
            title_segment: " The Cat".into(),
            body: vec!["the cat sat".into(), "on the mat".into()],
        };
        assert_eq!(b.add_record(&rec).unwrap(), 0);
        let rec = CorpusRecord { title_segment: " A Dog".into(), body: vec!["a dog ran".into()] };
        assert_eq!(b.add_record(&rec).unwrap(), 1);
        let idx = b.finish();

        assert_eq!(idx.titles, vec!["The Cat", "A Dog"]);
        assert_eq!(idx.title.get("cat").unwrap().positions(0), Some(&[1][..]));
        assert_eq!(idx.title.get("the").unwrap().positions(0), Some(&[0][..]));
        assert_eq!(idx.body.get("the").unwrap().positions(0), Some(&[1, 5][..]));
        assert_eq!(idx.body.get("mat").unwrap().positions(0), Some(&[6][..]));
        assert_eq!(idx.body.get("dog").unwrap().positions(1), Some(&[2][..]));
    }

    #[test]
    fn variants_collect_under_shared_stem() {
        let strip_s = |w: &str| w.trim_end_matches('s').to_string();
        let mut b = IndexBuilder::new(strip_s);
        let rec = CorpusRecord { title_segment: String::new(), body: vec!["cats cat".into()] };
        b.add_record(&rec).unwrap();
        let idx = b.finish();
        let cat = idx.body.get("cat").unwrap();
        assert_eq!(cat.variants.len(), 2);
        assert_eq!(cat.positions(0), Some(&[1, 2][..]));
    }

    #[test]
    fn excerpt_reads_from_a_body_position() {
        let rec = CorpusRecord {
            title_segment: " T".into(),
            body: vec!["The cat, sat".into(), "".into(), "on the mat.".into()],
        };
        assert_eq!(rec.excerpt(3, EXCERPT_WORDS), vec!["sat", "on", "the", "mat"]);
        assert_eq!(rec.excerpt(2, 2), vec!["cat", "sat"]);
        assert_eq!(rec.excerpt(0, 1), vec!["the"]);
        assert!(rec.excerpt(7, EXCERPT_WORDS).is_empty());
    }
}
