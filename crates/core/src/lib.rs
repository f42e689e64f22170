//! logcore — the ingestion/normalization/batching core: Event model,
//! rule engine, parser registry, and batch writer (spec §1's "THE CORE").
//!
//! Framework-agnostic by design: no sockets, no HTTP. The `logserver`
//! crate wires this library to the receivers and the live fan-out hub.

pub mod batch;
pub mod error;
pub mod event;
pub mod parser;
pub mod ruleset;
pub mod storage;
pub mod timestamp;

pub use batch::{BatchConfig, BatchWriter};
pub use event::{AttrValue, Event, Severity};
pub use parser::{default_registry, ParserRegistry};
pub use ruleset::{RuleEngine, RuleSet};
pub use storage::{InMemoryStorage, Query, Storage};
