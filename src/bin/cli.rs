use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use litdex::{index_corpus, Document, EngineConfig, NrtIndexer, Searcher};

#[derive(Parser, Debug)]
#[command(name = "litdex", about = "Full-text search over a static book corpus", version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build or extend an index from a directory of `.txt` books
    Index {
        #[arg(short = 'b', long = "books", help = "Directory of .txt files")]
        books_dir: PathBuf,
        #[arg(short = 'i', long = "index", help = "Index output directory")]
        index_dir: PathBuf,
        #[arg(long, default_value_t = 1000)]
        chunk_size: usize,
        #[arg(long, default_value_t = 100)]
        chunk_overlap: usize,
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
        #[arg(long, help = "Path to a JSON stop-word list")]
        stopwords: Option<PathBuf>,
    },
    /// Query an existing index
    Search {
        #[arg(short = 'i', long = "index")]
        index_dir: PathBuf,
        #[arg(short = 'q', long = "query")]
        query: String,
        #[arg(short = 'k', long = "top-k", default_value_t = 10)]
        top_k: usize,
        #[arg(long, help = "Path to a JSON stop-word list")]
        stopwords: Option<PathBuf>,
    },
    /// Near-real-time operations against an open index's WAL
    Nrt {
        #[command(subcommand)]
        action: NrtAction,
    },
}

#[derive(Subcommand, Debug)]
enum NrtAction {
    /// Append a document to the NRT layer
    Add {
        #[arg(short = 'i', long = "index")]
        index_dir: PathBuf,
        #[arg(short = 't', long = "text")]
        text: String,
        #[arg(short = 'm', long = "metadata")]
        metadata: String,
    },
    /// Search disk segments and the NRT layer together
    Search {
        #[arg(short = 'i', long = "index")]
        index_dir: PathBuf,
        #[arg(short = 'q', long = "query")]
        query: String,
        #[arg(short = 'k', long = "top-k", default_value_t = 10)]
        top_k: usize,
    },
    /// Drop the in-memory NRT index and truncate its WAL
    Flush {
        #[arg(short = 'i', long = "index")]
        index_dir: PathBuf,
    },
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Index {
            books_dir,
            index_dir,
            chunk_size,
            chunk_overlap,
            batch_size,
            stopwords,
        } => cmd_index(books_dir, index_dir, chunk_size, chunk_overlap, batch_size, stopwords),
        Commands::Search {
            index_dir,
            query,
            top_k,
            stopwords,
        } => cmd_search(index_dir, query, top_k, stopwords),
        Commands::Nrt { action } => match action {
            NrtAction::Add {
                index_dir,
                text,
                metadata,
            } => cmd_nrt_add(index_dir, text, metadata),
            NrtAction::Search {
                index_dir,
                query,
                top_k,
            } => cmd_nrt_search(index_dir, query, top_k),
            NrtAction::Flush { index_dir } => cmd_nrt_flush(index_dir),
        },
    }
}

fn cmd_index(
    books_dir: PathBuf,
    index_dir: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
    batch_size: usize,
    stopwords: Option<PathBuf>,
) -> Result<()> {
    let reclaimed = litdex::reclaim_orphaned_segments(&index_dir).context("reclaiming orphaned segments")?;
    if reclaimed > 0 {
        log::warn!("reclaimed {reclaimed} orphaned segment directories");
    }

    let documents = load_books(&books_dir).context("reading books directory")?;
    let config = EngineConfig {
        chunk_size,
        chunk_overlap,
        batch_size,
        stopwords_path: stopwords,
        ..EngineConfig::default()
    };

    let stats = index_corpus(&config, &index_dir, documents, None).context("indexing corpus")?;
    println!(
        "indexed {} documents into {} segments ({} chunks)",
        stats.documents_indexed, stats.segments_written, stats.chunks_written
    );
    Ok(())
}

fn cmd_search(index_dir: PathBuf, query: String, top_k: usize, stopwords: Option<PathBuf>) -> Result<()> {
    let mut searcher = Searcher::open(&index_dir).context("opening index")?;
    if let Some(path) = stopwords {
        let config = EngineConfig {
            stopwords_path: Some(path),
            ..EngineConfig::default()
        };
        searcher.set_stopwords(config.load_stopwords()?);
    }

    let hits = searcher.search(&query, top_k).context("searching")?;
    if hits.is_empty() {
        println!("no results");
        return Ok(());
    }
    for hit in hits {
        println!("{:.4}\t{}\tchunk={}", hit.score, hit.book_id, hit.chunk_id);
    }
    Ok(())
}

fn cmd_nrt_add(index_dir: PathBuf, text: String, metadata: String) -> Result<()> {
    let config = EngineConfig::default();
    let nrt = NrtIndexer::open(&index_dir, &config).context("opening NRT index")?;
    let chunk_id = nrt.add_document(&text, &metadata).context("adding document")?;
    println!("added chunk {chunk_id}");
    Ok(())
}

fn cmd_nrt_search(index_dir: PathBuf, query: String, top_k: usize) -> Result<()> {
    let config = EngineConfig::default();
    let nrt = NrtIndexer::open(&index_dir, &config).context("opening NRT index")?;

    let searcher = Searcher::open(&index_dir).ok();
    let segments: &[_] = searcher.as_ref().map(|s| s.segments()).unwrap_or(&[]);

    let hits = nrt.search(segments, &query, top_k, None).context("searching")?;
    if hits.is_empty() {
        println!("no results");
        return Ok(());
    }
    for hit in hits {
        println!("{:.4}\t{}\tchunk={}", hit.score, hit.book_id, hit.chunk_id);
    }
    Ok(())
}

fn cmd_nrt_flush(index_dir: PathBuf) -> Result<()> {
    let config = EngineConfig::default();
    let nrt = NrtIndexer::open(&index_dir, &config).context("opening NRT index")?;
    let count = nrt.flush().context("flushing NRT index")?;
    println!("flushed {count} documents");
    Ok(())
}

fn load_books(dir: &std::path::Path) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let book_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        documents.push(Document { book_id, text });
    }
    Ok(documents)
}
