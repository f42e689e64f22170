//! Batch writer: bounded buffer, flush-on-size/interval/shutdown, retry
//! with backoff (spec §4.3).

pub mod config;
pub mod writer;

pub use config::BatchConfig;
pub use writer::BatchWriter;
