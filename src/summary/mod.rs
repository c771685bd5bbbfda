//! Run summary for the CLI
//!
//! Machine-readable record of one orchestration, printed with `--json`.

mod run_summary;

pub use run_summary::{RunSummary, Status, RUN_SUMMARY_SCHEMA_ID, RUN_SUMMARY_SCHEMA_VERSION};
