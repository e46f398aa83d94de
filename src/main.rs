use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use group_counter::{CountConfig, GroupCounter, config::max_workers, sorted_entries};
use jemallocator::Jemalloc;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "group-counter")]
#[command(about = "Count CSV rows grouped by columns or JSON sub-fields")]
#[command(version)]
struct Cli {
    /// Path to the CSV file
    #[arg(long)]
    file: PathBuf,

    /// Column names or indexes, comma-separated, each optionally `#json.path`.
    /// Names require --header.
    #[arg(long)]
    column: String,

    /// Delimiter used in the CSV file
    #[arg(long, default_value = ",")]
    delimiter: String,

    /// The CSV file has a header row
    #[arg(long)]
    header: bool,

    /// Read buffer size in KB (0 keeps the default)
    #[arg(long, default_value_t = 0)]
    buffer: usize,

    /// Number of workers (capped at the CPU count)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    worker: u16,

    /// Print groups sorted by key
    #[arg(long)]
    sorted: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = CountConfig::new(&cli.column)
        .with_header(cli.header)
        .with_delimiter(CountConfig::parse_delimiter(&cli.delimiter)?)
        .with_workers(usize::from(cli.worker))
        .with_read_buffer_kb(cli.buffer);
    log::debug!("Up to {} workers available", max_workers());

    let counter = GroupCounter::new(config);
    let counts = counter
        .count_path(&cli.file)
        .with_context(|| format!("Failed to count {}", cli.file.display()))?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if cli.sorted {
        for (key, count) in sorted_entries(&counts) {
            writeln!(out, "{}: {}", key, count)?;
        }
    } else {
        for (key, count) in &counts {
            writeln!(out, "{}: {}", key, count)?;
        }
    }
    writeln!(out, "Group by {} counts\n", counter.config().columns)?;
    out.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["group-counter", "--file", "data.csv", "--column", "0"])
            .unwrap();
        assert_eq!(cli.delimiter, ",");
        assert_eq!(cli.worker, 1);
        assert_eq!(cli.buffer, 0);
        assert!(!cli.header);
        assert!(!cli.sorted);
    }

    #[test]
    fn test_cli_rejects_zero_workers() {
        let parsed = Cli::try_parse_from([
            "group-counter",
            "--file",
            "data.csv",
            "--column",
            "0",
            "--worker",
            "0",
        ]);
        assert!(parsed.is_err());
    }
}
