use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tierdex_core::builder::{build_index, Manifest, EXCERPT_WORDS};
use tierdex_core::persist::{
    load_index, load_meta, load_models, save_index, save_meta, save_models, IndexPaths, MetaFile,
    FORMAT_VERSION,
};
use tierdex_core::query::parse_query;
use tierdex_core::tokenizer::PorterStemmer;
use tierdex_core::{DocId, DocVector, Engine, Error, SearchHit, Tier, TieredIndex, TieredVsm};
use tracing_subscriber::{fmt, EnvFilter};

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::Instant;

mod manifest;

#[derive(Parser)]
#[command(name = "tierdex")]
#[command(about = "Build and query a two-tier positional index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Title,
    Body,
}

impl From<TierArg> for Tier {
    fn from(t: TierArg) -> Self {
        match t {
            TierArg::Title => Tier::Title,
            TierArg::Body => Tier::Body,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write corpus.dat listing every file under a corpus directory
    Manifest {
        #[arg(long)]
        corpus: PathBuf,
    },
    /// Build the index and vector models from a manifest or corpus directory
    Build {
        /// corpus.dat, or a directory to generate it in
        #[arg(long)]
        corpus: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
    },
    /// Rebuild the vector models from a saved index
    Vectorize {
        #[arg(long)]
        index_dir: PathBuf,
    },
    /// Ranked free-text search; reads one query per line from stdin without --query
    Search {
        #[arg(long)]
        index_dir: PathBuf,
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        res_title: Option<usize>,
        #[arg(long)]
        res_doc: Option<usize>,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Weight the saved index instead of loading the saved models
        #[arg(long, default_value_t = false)]
        from_index: bool,
    },
    /// Positional queries: `term`, `term term` or `term /N term`
    Phrase {
        #[arg(long)]
        index_dir: PathBuf,
        #[arg(long)]
        query: Option<String>,
    },
    /// Print the body words of a document starting at a position
    Seek {
        #[arg(long)]
        index_dir: PathBuf,
        #[arg(long)]
        doc: DocId,
        #[arg(long)]
        pos: u32,
        #[arg(long, default_value_t = EXCERPT_WORDS)]
        words: usize,
    },
    /// Print the components of a document or query vector
    Vector {
        #[arg(long)]
        index_dir: PathBuf,
        #[arg(long, value_enum, default_value = "body")]
        tier: TierArg,
        #[arg(long, conflicts_with = "query")]
        doc: Option<DocId>,
        #[arg(long)]
        query: Option<String>,
    },
    /// Print the index metadata
    Info {
        #[arg(long)]
        index_dir: PathBuf,
    },
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    took_s: f64,
    total_hits: usize,
    results: Vec<SearchHit>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Manifest { corpus } => {
            let path = manifest::generate_manifest(&corpus)?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Build { corpus, output } => build(&corpus, &output),
        Commands::Vectorize { index_dir } => vectorize(&index_dir),
        Commands::Search { index_dir, query, res_title, res_doc, json, from_index } => {
            let mut engine = open_engine(&index_dir, from_index)?;
            let tunables = engine.tunables_mut();
            if let Some(n) = res_title {
                tunables.set_res_cnt_title(n)?;
            }
            if let Some(n) = res_doc {
                tunables.set_res_cnt_doc(n)?;
            }
            for_each_query(query, |q| search(&engine, q, json))
        }
        Commands::Phrase { index_dir, query } => {
            let engine = open_positional(&index_dir)?;
            for_each_query(query, |q| phrase(&engine, q))
        }
        Commands::Seek { index_dir, doc, pos, words } => {
            let engine = open_positional(&index_dir)?;
            seek(&engine, doc, pos, words)
        }
        Commands::Vector { index_dir, tier, doc, query } => {
            vector(&index_dir, tier.into(), doc, query)
        }
        Commands::Info { index_dir } => {
            let meta = load_meta(&IndexPaths::new(&index_dir))?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }
    }
}

fn build(corpus: &Path, output: &Path) -> Result<()> {
    let manifest =
        if corpus.is_dir() { manifest::generate_manifest(corpus)? } else { corpus.to_path_buf() };
    let paths = IndexPaths::new(output);
    fs::create_dir_all(&paths.root)?;

    let index = build_index(&manifest, PorterStemmer)
        .with_context(|| format!("building index from {}", manifest.display()))?;
    tracing::info!(
        num_docs = index.num_docs(),
        title_terms = index.title.len(),
        body_terms = index.body.len(),
        "indexed corpus"
    );
    save_index(&paths, &index)?;
    write_models(&paths, &index)?;

    // Absolute, so excerpts resolve from any working directory.
    let sources = Manifest::load(&manifest)?
        .paths()
        .map(|p| fs::canonicalize(&p).with_context(|| format!("resolving {}", p.display())))
        .collect::<Result<Vec<_>>>()?;

    let meta = MetaFile {
        num_docs: index.num_docs() as u32,
        title_terms: index.title.len() as u32,
        body_terms: index.body.len() as u32,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into()),
        version: FORMAT_VERSION,
        sources,
    };
    save_meta(&paths, &meta)?;
    tracing::info!(output = %output.display(), "index build complete");
    Ok(())
}

fn write_models(paths: &IndexPaths, index: &TieredIndex) -> Result<()> {
    let models = TieredVsm::build(index)?;
    save_models(paths, &models, &index.titles)?;
    tracing::info!(
        title_vectors = models.title.len(),
        body_vectors = models.body.len(),
        "saved vector models"
    );
    Ok(())
}

fn vectorize(index_dir: &Path) -> Result<()> {
    let paths = IndexPaths::new(index_dir);
    let index = load_index(&paths)?;
    write_models(&paths, &index)
}

fn open_engine(index_dir: &Path, with_index: bool) -> Result<Engine> {
    let paths = IndexPaths::new(index_dir);
    let started = Instant::now();
    let engine = if with_index {
        Engine::from_index(load_index(&paths)?, PorterStemmer)?
    } else {
        let (models, titles) = load_models(&paths)?;
        Engine::from_models(models, titles, PorterStemmer)
    };
    let took_s = started.elapsed().as_secs_f64();
    tracing::info!(num_docs = engine.num_docs(), took_s, "engine ready");
    Ok(engine)
}

// Positional queries and excerpts need the index and the record files, not the models.
fn open_positional(index_dir: &Path) -> Result<Engine> {
    let paths = IndexPaths::new(index_dir);
    let index = load_index(&paths)?;
    let sources = match load_meta(&paths) {
        Ok(meta) => meta.sources,
        Err(e) => {
            tracing::warn!(error = %e, "no document sources, excerpts are unavailable");
            Vec::new()
        }
    };
    Ok(Engine::index_only(index, PorterStemmer).with_sources(sources))
}

fn source_name(engine: &Engine, doc: DocId) -> String {
    engine
        .source(doc)
        .ok()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// A single --query, or one query per stdin line until EOF.
fn for_each_query<F: FnMut(&str) -> Result<()>>(query: Option<String>, mut f: F) -> Result<()> {
    if let Some(q) = query {
        return f(&q);
    }
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        f(&line)?;
    }
    Ok(())
}

fn search(engine: &Engine, query: &str, json: bool) -> Result<()> {
    let started = Instant::now();
    let results = engine.search(query)?;
    let took_s = started.elapsed().as_secs_f64();

    if json {
        let total_hits = results.len();
        let response = SearchResponse { query: query.to_string(), took_s, total_hits, results };
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }
    println!("  Query: {query}");
    for hit in &results {
        println!("  {:>5} : {:.6} {}", hit.doc_id, hit.score, hit.title);
    }
    Ok(())
}

fn phrase(engine: &Engine, query: &str) -> Result<()> {
    let expr = match parse_query(query) {
        Ok(expr) => expr,
        Err(e @ Error::InvalidQuery(_)) => {
            tracing::debug!(error = %e, "skipping query");
            println!("  The query '{}' is invalid.", query.trim());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let Some(term) = engine.positional(&expr)? else {
        println!("  No matches for '{}'.", query.trim());
        return Ok(());
    };
    println!("  '{}' matched {} document(s):", query.trim(), term.document_count());
    for (doc, positions) in term.postings() {
        let title = engine.title(doc)?;
        let name = source_name(engine, doc);
        println!("  {:>5} : {:>3} {:?} {} {}", doc, positions.len(), positions, name, title);
    }
    Ok(())
}

fn seek(engine: &Engine, doc: DocId, pos: u32, words: usize) -> Result<()> {
    match engine.excerpt(doc, pos, words) {
        Ok(words) => {
            println!("  {} : '...{}...'", source_name(engine, doc), words.join(" "));
            Ok(())
        }
        Err(e) if e.is_recoverable() || matches!(e, Error::UnknownDocument(_)) => {
            println!("  The seek request for document {doc} is invalid: {e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn vector(index_dir: &Path, tier: Tier, doc: Option<DocId>, query: Option<String>) -> Result<()> {
    let (models, _) = load_models(&IndexPaths::new(index_dir))?;
    let model = models.tier(tier);
    let owned: DocVector;
    let v = match (doc, query) {
        (Some(doc), _) => model.vector(doc)?,
        (None, Some(q)) => {
            owned = tierdex_core::search::query_vector(&q, &PorterStemmer);
            &owned
        }
        (None, None) => anyhow::bail!("either --doc or --query is required"),
    };
    println!("  normalized: {}  components: {}  norm: {:.6}", v.normalized, v.len(), v.norm());
    for (stem, weight) in v.components() {
        println!("  {stem:<20} {weight:.6}");
    }
    Ok(())
}
