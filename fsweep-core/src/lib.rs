pub mod cache;
pub mod error;
pub mod filter;
pub mod options;
pub mod scanner;
pub mod size;

pub use cache::SizeCache;
pub use error::{Result, ScanError};
pub use filter::PathFilter;
pub use options::{ScanMode, ScanOptions};
pub use scanner::{
    CancellationToken, ProgressSnapshot, ScanMessage, ScanOutcome, ScanResult, Scanner,
};
pub use size::{format_count, format_size, parse_size};
