//! Binary entry point for running pattern queries against a property graph.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lattice::{load_attributed_graph, EventLimit, EventWindow, PropertyGraph, Result};

#[derive(Parser, Debug)]
#[command(
    name = "query-tool",
    version,
    about = "Run Cypher pattern queries against a property graph",
    disable_help_subcommand = true
)]
struct Cli {
    /// Property-file graph metadata (JSON) or, with --serialized, a binary
    /// snapshot.
    #[arg(value_name = "GRAPH")]
    graph: PathBuf,

    /// Cypher query string.
    #[arg(long, value_name = "QUERY")]
    query: Option<String>,

    /// File containing a Cypher query; takes precedence over --query.
    #[arg(long, value_name = "FILE")]
    query_file: Option<PathBuf>,

    /// File listing query files, one per line; takes precedence over all
    /// other input methods.
    #[arg(long, value_name = "FILE")]
    list_of_queries: Option<PathBuf>,

    /// Treat the graph argument as a binary snapshot.
    #[arg(long)]
    serialized: bool,

    /// With --list-of-queries, write per-query counts to queries.count.
    #[arg(long)]
    output: bool,

    /// Directory for the queries.count file.
    #[arg(long, value_name = "DIR", default_value = "./")]
    output_location: PathBuf,

    /// Memory pre-allocation hint, accepted for command-line
    /// compatibility.
    #[arg(long, value_name = "N", default_value_t = 2500)]
    num_pages: u32,

    /// Restrict matching to edges with timestamps inside [START, END].
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    window: Option<Vec<u64>>,

    /// Cap on the time between consecutive matched events.
    #[arg(long, value_name = "T")]
    limit: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    info!(graph = %cli.graph.display(), "constructing graph");
    let load_start = Instant::now();
    let graph = if cli.serialized {
        PropertyGraph::load_graph(&cli.graph)?
    } else {
        load_attributed_graph(&cli.graph)?
    };
    info!(elapsed = ?load_start.elapsed(), "graph construction done");
    graph.report_graph_stats();

    if cli.num_pages != 2500 {
        info!(num_pages = cli.num_pages, "pre-allocation hint ignored");
    }

    let window = cli.window.as_ref().map(|w| EventWindow {
        start: w[0],
        end: w[1],
    });
    let limit = cli.limit.map(|time| EventLimit { time });

    if let Some(list) = &cli.list_of_queries {
        info!(list = %list.display(), "reading list of query files");
        let reader = BufReader::new(File::open(list)?);
        let mut results: Vec<(String, u64)> = Vec::new();
        for line in reader.lines() {
            let path = line?;
            let path = path.trim();
            if path.is_empty() {
                continue;
            }
            let name = query_name(Path::new(path));
            let count = process_query_file(&graph, limit, window, Path::new(path), &name)?;
            results.push((name, count));
        }
        if cli.output {
            fs::create_dir_all(&cli.output_location)?;
            let out_path = cli.output_location.join("queries.count");
            let mut out = File::create(&out_path)?;
            for (name, count) in &results {
                writeln!(out, "{name} {count}")?;
            }
            info!(path = %out_path.display(), "query counts saved");
        }
    } else if let Some(path) = &cli.query_file {
        process_query_file(&graph, limit, window, path, "Query")?;
    } else if let Some(query) = &cli.query {
        let start = Instant::now();
        let count = graph.match_cypher_query(limit, window, query)?;
        info!(count, elapsed = ?start.elapsed(), "num matched subgraphs");
    } else {
        warn!("no query specified");
    }

    info!("querying complete");
    Ok(())
}

/// Runs the query contained in `path`, returning its match count.
fn process_query_file(
    graph: &PropertyGraph,
    limit: Option<EventLimit>,
    window: Option<EventWindow>,
    path: &Path,
    name: &str,
) -> Result<u64> {
    info!(file = %path.display(), "reading query file");
    let query = fs::read_to_string(path)?;
    let start = Instant::now();
    let count = graph.match_cypher_query(limit, window, &query)?;
    info!(query = name, count, elapsed = ?start.elapsed(), "num matched subgraphs");
    Ok(count)
}

/// File name used as the query's display name in queries.count.
fn query_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
