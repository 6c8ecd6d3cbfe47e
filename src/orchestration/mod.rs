//! Glue between configuration, candle sources, the engine and report output.

pub mod orchestrator;

pub use orchestrator::{render_report_file, Orchestrator};
