use anyhow::{Context, Result};
use blockdb_core::config::DEFAULT_EPSILON;
use blockdb_core::{Config, Database, DuplicatePolicy, GameRecord, IndexField, Key, TreeStats};
use clap::{Parser, Subcommand, ValueEnum};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blockdb")]
#[command(about = "Block storage with a B+ tree index over game records")]
struct Cli {
    /// Whitespace-separated game export to import at startup
    #[arg(short, long)]
    data: Option<PathBuf>,

    #[arg(long, default_value_t = 100)]
    disk_size_mb: usize,

    #[arg(long, default_value_t = 400)]
    block_size: usize,

    /// Index node size in bytes, defaults to the block size
    #[arg(long)]
    node_size: Option<usize>,

    #[arg(long, value_enum, default_value_t = FieldArg::FgPctHome)]
    index_field: FieldArg,

    #[arg(long, value_enum, default_value_t = DuplicatesArg::Overflow)]
    duplicates: DuplicatesArg,

    /// Shift applied per duplicate under `--duplicates epsilon`
    #[arg(long, default_value_t = DEFAULT_EPSILON)]
    epsilon: Key,

    /// Also append every result to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record, block and index statistics
    Stats,
    /// Dump the index level by level
    Tree,
    /// Records whose key equals KEY
    Query { key: Key },
    /// Records whose key lies in [LO, HI), compared against a linear scan
    Range { lo: Key, hi: Key },
    /// Delete every record keyed below THRESHOLD
    DeleteBelow { threshold: Key },
    Repl,
}

#[derive(Clone, Copy, ValueEnum)]
enum FieldArg {
    PtsHome,
    FgPctHome,
    FtPctHome,
    Fg3PctHome,
}

impl From<FieldArg> for IndexField {
    fn from(field: FieldArg) -> Self {
        match field {
            FieldArg::PtsHome => IndexField::PtsHome,
            FieldArg::FgPctHome => IndexField::FgPctHome,
            FieldArg::FtPctHome => IndexField::FtPctHome,
            FieldArg::Fg3PctHome => IndexField::Fg3PctHome,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DuplicatesArg {
    Overflow,
    Epsilon,
}

struct Output {
    file: Option<File>,
}

impl Output {
    fn emit(&mut self, text: &str) -> Result<()> {
        print!("{}", text);
        if let Some(file) = self.file.as_mut() {
            file.write_all(text.as_bytes()).context("Failed to write output file")?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let block_size = cli.block_size;
    let policy = match cli.duplicates {
        DuplicatesArg::Overflow => DuplicatePolicy::Overflow,
        DuplicatesArg::Epsilon => DuplicatePolicy::EpsilonShift { epsilon: cli.epsilon },
    };
    let config = Config::new(cli.disk_size_mb * 1_000_000, block_size)
        .with_node_size(cli.node_size.unwrap_or(block_size))
        .with_index_field(cli.index_field.into())
        .with_duplicate_policy(policy);

    let mut db = Database::open(config).context("Failed to open database")?;
    if let Some(path) = &cli.data {
        let inserted = db
            .import_file(path)
            .with_context(|| format!("Failed to import {}", path.display()))?;
        eprintln!("Imported {} records from {}", inserted, path.display());
    }

    let file = match &cli.output {
        Some(path) => Some(File::create(path).with_context(|| format!("Failed to create {}", path.display()))?),
        None => None,
    };
    let mut out = Output { file };

    match cli.command {
        Commands::Stats => out.emit(&stats(&db)),
        Commands::Tree => out.emit(&db.index().dump()),
        Commands::Query { key } => out.emit(&query(&mut db, key)?),
        Commands::Range { lo, hi } => out.emit(&range(&mut db, lo, hi)?),
        Commands::DeleteBelow { threshold } => out.emit(&delete_below(&mut db, threshold)?),
        Commands::Repl => run_repl(&mut db, &mut out),
    }
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_repl(db: &mut Database, out: &mut Output) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("blockdb REPL");
    println!("Commands: stats, tree, query <key>, range <lo> <hi>, delete-below <t>, quit");
    println!();

    loop {
        let readline = rl.readline("blockdb> ");

        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                if line == "quit" || line == "exit" {
                    break;
                }

                match handle_command(db, line) {
                    Ok(text) => out.emit(&text)?,
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    println!("Goodbye");
    Ok(())
}

fn handle_command(db: &mut Database, line: &str) -> Result<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    match parts.as_slice() {
        ["stats"] => Ok(stats(db)),
        ["tree"] => Ok(db.index().dump()),
        ["query", key] => query(db, parse_key(key)?),
        ["range", lo, hi] => range(db, parse_key(lo)?, parse_key(hi)?),
        ["delete-below", threshold] => delete_below(db, parse_key(threshold)?),
        [command, ..] => anyhow::bail!("Unknown command or wrong arguments: {}", command),
        [] => Ok(String::new()),
    }
}

fn parse_key(raw: &str) -> Result<Key> {
    raw.parse().with_context(|| format!("Invalid key: {}", raw))
}

fn stats(db: &Database) -> String {
    let stats = db.stats();
    let mut s = String::new();
    let _ = writeln!(s, "Number of records: {}", stats.records);
    let _ = writeln!(s, "Size of a record: {} bytes", stats.record_size);
    let _ = writeln!(s, "Records per block: {}", stats.records_per_block);
    let _ = writeln!(s, "Blocks in use: {} of {}", stats.blocks_in_use, stats.blocks_total);
    s.push_str(&tree_stats(&stats.tree));
    s
}

fn tree_stats(tree: &TreeStats) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "Parameter n of the B+ tree: {}", tree.max_keys);
    let _ = writeln!(s, "Number of nodes (excluding overflow): {}", tree.nodes);
    let _ = writeln!(s, "Number of overflow nodes: {}", tree.overflow_nodes);
    let _ = writeln!(s, "Number of levels: {}", tree.levels);
    let _ = writeln!(s, "Root keys: {:?}", tree.root_keys);
    s
}

fn records_summary(s: &mut String, records: &[GameRecord], field: IndexField) {
    let _ = writeln!(s, "Records matched: {}", records.len());
    for record in records.iter().take(10) {
        let _ = writeln!(
            s,
            "  #{:<6} {:<10} key={}",
            record.record_id,
            record.game_date(),
            record.key(field)
        );
    }
    if records.len() > 10 {
        let _ = writeln!(s, "  ... {} more", records.len() - 10);
    }
}

fn query(db: &mut Database, key: Key) -> Result<String> {
    let field = db.config().index_field;
    let report = db.query(key)?;

    let mut s = String::new();
    records_summary(&mut s, &report.records, field);
    let _ = writeln!(s, "Index nodes accessed: {}", report.index_nodes);
    let _ = writeln!(s, "Overflow nodes accessed: {}", report.overflow_nodes);
    let _ = writeln!(s, "Data blocks accessed: {}", report.data_blocks);
    if let Some(avg) = report.average(IndexField::Fg3PctHome) {
        let _ = writeln!(s, "Average FG3_PCT_home: {:.4}", avg);
    }
    let _ = writeln!(s, "Elapsed: {:?}", report.elapsed);
    Ok(s)
}

fn range(db: &mut Database, lo: Key, hi: Key) -> Result<String> {
    let field = db.config().index_field;
    let report = db.query_range(lo, hi)?;
    let scan = db.linear_scan(lo, hi)?;

    let mut s = String::new();
    records_summary(&mut s, &report.records, field);
    let _ = writeln!(s, "Index nodes accessed: {}", report.index_nodes);
    let _ = writeln!(s, "Data blocks accessed: {}", report.data_blocks);
    if let Some(avg) = report.average(IndexField::Fg3PctHome) {
        let _ = writeln!(s, "Average FG3_PCT_home: {:.4}", avg);
    }
    let _ = writeln!(s, "Elapsed: {:?}", report.elapsed);
    let _ = writeln!(
        s,
        "Linear scan: {} records, {} data blocks, {:?}",
        scan.records.len(),
        scan.data_blocks,
        scan.elapsed
    );
    Ok(s)
}

fn delete_below(db: &mut Database, threshold: Key) -> Result<String> {
    let report = db.delete_below(threshold)?;
    let scan = db.linear_scan(Key::NEG_INFINITY, threshold)?;

    let mut s = String::new();
    let _ = writeln!(s, "Keys deleted: {}", report.keys_deleted);
    let _ = writeln!(s, "Records deleted: {}", report.records_deleted);
    let _ = writeln!(s, "Blocks freed: {}", report.blocks_freed);
    let _ = writeln!(s, "Elapsed: {:?}", report.elapsed);
    s.push_str(&tree_stats(&report.tree));
    let _ = writeln!(s, "Linear scan afterwards: {} records in {:?}", scan.records.len(), scan.elapsed);
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_shows_import_progress() {
        assert_eq!(default_filter(false), "info");
        assert_eq!(default_filter(true), "debug");
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from(["blockdb", "--block-size", "200", "--duplicates", "epsilon", "range", "0.6", "1.0"]).unwrap();
        assert_eq!(cli.block_size, 200);
        assert!(matches!(cli.duplicates, DuplicatesArg::Epsilon));
        assert!(matches!(cli.command, Commands::Range { lo, hi } if lo == 0.6 && hi == 1.0));
    }
}
