pub mod exporter;
pub mod harness;
pub mod scheduler;

pub use exporter::{BatchExporter, ExportFormat, ExportSummary};
pub use harness::{Harness, HarnessState, RunSummary};
pub use scheduler::{JobReport, WorkerPool};
