//! Batch driver: identifier input, bounded-concurrency walks, JSONL output.

pub mod input;
pub mod runner;
pub mod sink;

pub use input::{load_identifiers, parse_identifiers};
pub use runner::{run_batch, BatchReport};
pub use sink::{JsonlSink, RecordSink};
