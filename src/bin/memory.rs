use std::path::PathBuf;

use group_counter::{CountConfig, GroupCounter};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

// usage: memory <file.csv> <columns> [workers]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _profiler = dhat::Profiler::new_heap();

    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(args.next().unwrap_or_else(|| "data/data.csv".to_string()));
    let columns = args.next().unwrap_or_else(|| "address,other#hobby".to_string());
    let workers = args.next().map(|w| w.parse()).transpose()?.unwrap_or(1);

    let config = CountConfig::new(&columns)
        .with_header(true)
        .with_workers(workers);
    let counts = GroupCounter::new(config).count_path(&path)?;

    println!(
        "Counted {} groups in {}. See dhat-heap.json for details",
        counts.len(),
        path.display()
    );
    Ok(())
}
