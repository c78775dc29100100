//! Core data models for book records and resolution reports.

mod outcome;
mod record;

pub use outcome::{AdapterOutcome, IsbnResolution, KeywordSearch, LookupMode, SourceAttempt};
pub use record::{BookRecord, BookRecordBuilder, SourceKind};
