// Scheduler module: daily scan and maintenance triggers

pub mod engine;

pub use engine::{ScanEngine, Scheduler};
