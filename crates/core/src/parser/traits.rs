use crate::error::ParseError;
use crate::event::Event;

/// A single parser in the registry. Implementations must be cheap to
/// probe with `can_parse` — the registry calls it on every candidate
/// before attempting a full `parse`.
pub trait LogParser: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap syntactic check; must not allocate on the happy path.
    fn can_parse(&self, raw: &[u8]) -> bool;

    fn parse(&self, raw: &[u8]) -> Result<Event, ParseError>;
}
