//! Rule set and rule engine: mapping, defaults, transforms, validation
//! (spec §3, §4.2).

pub mod engine;
pub mod model;

pub use engine::RuleEngine;
pub use model::RuleSet;
