//! # GroupCounter
//!
//! `GroupCounter` counts the records of a delimited text stream grouped by one
//! or more columns, written in Rust. It supports:
//!
//! - Column selection by header name or by zero-based index
//! - Composite keys over several columns, in selection order
//! - Drilling into a JSON document stored in a cell (`column#path.to.field`)
//! - A bounded record queue, so a fast reader never outruns the workers
//! - Lock-free per-worker tables merged once at the end
//! - Cooperative cancellation: any fatal error stops every thread
//!
//! # Descriptors
//!
//! - `category` / `2`: the raw cell text
//! - `other#hobby`: `hobby=<value>` from the JSON in column `other`;
//!   `hobby=` when the cell is not JSON or has no such field
//! - `category,other#hobby`: both, joined with `,`
//!
//! # Example
//!
//! ```rust,no_run
//! use group_counter::{CountConfig, GroupCounter, sorted_entries};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CountConfig::new("address,other#hobby")
//!         .with_header(true)
//!         .with_workers(4);
//!
//!     let counts = GroupCounter::new(config).count_path(Path::new("data.csv"))?;
//!     for (key, count) in sorted_entries(&counts) {
//!         println!("{}: {}", key, count);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
mod helpers;
pub mod processor;

pub use config::CountConfig;
pub use processor::aggregator::sorted_entries;
pub use processor::cancel::CancelToken;
pub use processor::group_counter::GroupCounter;
pub use processor::{FinalCount, GroupingSpec, ProcessorError};
