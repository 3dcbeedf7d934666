use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use termdex::{AnalyzerConfig, FailurePolicy, Field, Searcher};
use termdex_indexer::{build_index, print_stats, run_search_loop, BuildOptions};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "termdex")]
#[command(about = "Build and query an inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of text files or JSON/JSONL records
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long, default_value = "./index")]
        output: PathBuf,
        /// Drop English stopwords
        #[arg(long, default_value_t = false)]
        stopwords: bool,
        /// Apply English stemming
        #[arg(long, default_value_t = false)]
        stemming: bool,
        /// Discard tokens longer than this many characters
        #[arg(long, default_value_t = 255)]
        max_token_len: usize,
        /// Abort on the first unreadable document instead of skipping it
        #[arg(long, default_value_t = false)]
        strict: bool,
        /// Tokenize documents in parallel
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },
    /// Print collection statistics
    Stats {
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Terms to report df / total tf for
        #[arg(long = "term", default_values_t = ["caesar".to_string(), "calpurnia".to_string(), "brutus".to_string()])]
        terms: Vec<String>,
    },
    /// Print statistics, then answer queries read from stdin
    Search {
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Size of the ranking
        #[arg(short, long, default_value_t = 10)]
        k: usize,
        /// Field searched by terms without a field prefix
        #[arg(long, default_value = "content")]
        field: Field,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stopwords, stemming, max_token_len, strict, parallel } => {
            let opts = BuildOptions {
                analyzer: AnalyzerConfig { stopwords, stemming, max_token_len },
                policy: if strict { FailurePolicy::AllOrNothing } else { FailurePolicy::SkipFailed },
                parallel,
            };
            let summary = build_index(&input, &output, &opts)?;
            println!(
                "indexed {} documents, {} terms ({} skipped) into {}",
                summary.num_docs,
                summary.num_terms,
                summary.skipped,
                output.display()
            );
            Ok(())
        }
        Commands::Stats { index, terms } => {
            let searcher = open(&index)?;
            let mut out = io::stdout().lock();
            print_stats(&searcher, &terms, &mut out)?;
            out.flush()?;
            Ok(())
        }
        Commands::Search { index, k, field } => {
            let searcher = open(&index)?.with_default_field(field);
            let mut out = io::stdout().lock();
            writeln!(out, "searching the index in {}", index.display())?;
            print_stats(&searcher, &[], &mut out)?;
            run_search_loop(&searcher, k, io::stdin().lock(), &mut out)?;
            out.flush()?;
            Ok(())
        }
    }
}

fn open(index: &Path) -> Result<Searcher> {
    Searcher::open(index).with_context(|| format!("opening index at {}", index.display()))
}
