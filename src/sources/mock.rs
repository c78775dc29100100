//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::models::{BookRecord, BookRecordBuilder, SourceKind};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::FetchError;

/// What a [`MockSource`] answers with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// One record per title; ISBN lookups use the first
    Titles(Vec<String>),
    NoMatch,
    FetchFailure,
    ParseFailure,
    /// Panic inside the adapter call
    Panic,
}

/// A scripted source that counts its calls.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    capabilities: SourceCapabilities,
    reply: MockReply,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create a mock that supports both lookups and never matches
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: SourceCapabilities::ISBN_LOOKUP | SourceCapabilities::KEYWORD_SEARCH,
            reply: MockReply::NoMatch,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer with one record per title
    pub fn with_titles<I, S>(self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_reply(MockReply::Titles(
            titles.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn with_reply(mut self, reply: MockReply) -> Self {
        self.reply = reply;
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn keyword_only(mut self) -> Self {
        self.capabilities = SourceCapabilities::KEYWORD_SEARCH;
        self
    }

    pub fn isbn_only(mut self) -> Self {
        self.capabilities = SourceCapabilities::ISBN_LOOKUP;
        self
    }

    /// How many lookups have started, including ones cancelled mid-way
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Result<Vec<BookRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.reply {
            MockReply::Titles(titles) => Ok(titles
                .iter()
                .map(|t| BookRecordBuilder::new(t.as_str(), self.kind()).build())
                .collect()),
            MockReply::NoMatch => Ok(Vec::new()),
            MockReply::FetchFailure => Err(SourceError::Fetch(FetchError::Status(503))),
            MockReply::ParseFailure => Err(SourceError::Parse("unexpected markup".into())),
            MockReply::Panic => panic!("mock source {} panicked", self.id),
        }
    }
}

#[async_trait]
impl Source for MockSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Other(self.id.clone())
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    async fn resolve_by_isbn(&self, isbn: &str) -> Result<BookRecord, SourceError> {
        let records = self.answer().await?;
        Ok(match records.into_iter().next() {
            Some(mut record) => {
                record.isbn = Some(isbn.to_string());
                record
            }
            None => BookRecord::no_match(self.kind(), isbn),
        })
    }

    async fn search_by_keyword(
        &self,
        _keyword: &str,
        limit: usize,
    ) -> Result<Vec<BookRecord>, SourceError> {
        let mut records = self.answer().await?;
        records.truncate(limit);
        Ok(records)
    }
}
