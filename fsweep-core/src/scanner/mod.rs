mod aggregate;
mod engine;
mod progress;
mod queue;
mod worker;

pub use aggregate::ScanResult;
pub use engine::{CancellationToken, ScanOutcome, Scanner};
pub use progress::{ProgressSnapshot, ScanMessage};
pub use queue::ScanJob;
