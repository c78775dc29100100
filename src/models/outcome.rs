//! Adapter outcomes and resolution reports.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{BookRecord, SourceKind};
use crate::sources::SourceError;

/// Which kind of lookup a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupMode {
    /// Exact identifier (ISBN) lookup
    Exact,
    /// Free-text keyword search
    Fuzzy,
}

impl std::fmt::Display for LookupMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupMode::Exact => write!(f, "isbn"),
            LookupMode::Fuzzy => write!(f, "keyword"),
        }
    }
}

/// What a single adapter call amounted to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AdapterOutcome {
    Matched,
    NoMatch,
    FetchFailed(String),
    ParseFailed(String),
}

impl AdapterOutcome {
    /// Classify an ISBN lookup result
    pub fn of_record(result: &Result<BookRecord, SourceError>) -> Self {
        match result {
            Ok(record) if record.found => AdapterOutcome::Matched,
            Ok(_) => AdapterOutcome::NoMatch,
            Err(err) => Self::of_error(err),
        }
    }

    /// Classify a keyword search result
    pub fn of_list(result: &Result<Vec<BookRecord>, SourceError>) -> Self {
        match result {
            Ok(records) if records.iter().any(|r| r.found) => AdapterOutcome::Matched,
            Ok(_) => AdapterOutcome::NoMatch,
            Err(err) => Self::of_error(err),
        }
    }

    pub fn of_error(err: &SourceError) -> Self {
        match err {
            SourceError::Fetch(e) => AdapterOutcome::FetchFailed(e.to_string()),
            SourceError::Blocked(msg) => AdapterOutcome::FetchFailed(format!("blocked: {}", msg)),
            SourceError::Parse(msg) => AdapterOutcome::ParseFailed(msg.clone()),
            other => AdapterOutcome::FetchFailed(other.to_string()),
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, AdapterOutcome::Matched)
    }
}

/// One adapter invocation inside a resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub source: SourceKind,
    pub outcome: AdapterOutcome,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

/// Result of the ISBN fallback chain, with the trail of sources consulted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsbnResolution {
    pub isbn: String,
    /// The first matching record, if any source matched
    pub record: Option<BookRecord>,
    /// Sources in the order they were tried
    pub attempts: Vec<SourceAttempt>,
}

impl IsbnResolution {
    pub fn is_found(&self) -> bool {
        self.record.is_some()
    }

    /// The record, or a `found == false` placeholder when the chain was exhausted
    pub fn into_record(self) -> BookRecord {
        self.record.unwrap_or_else(|| BookRecord::not_found(self.isbn))
    }
}

/// Result of the keyword fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSearch {
    pub keyword: String,
    /// Candidates in adapter completion order; not ranked, not deduplicated
    pub records: Vec<BookRecord>,
    /// One entry per dispatched adapter, in completion order; adapters still
    /// running at the ceiling are reported last as timed out
    pub attempts: Vec<SourceAttempt>,
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
