//! Bibliographic record model shared by every source adapter.

use serde::{Deserialize, Serialize};

use crate::utils::normalize::{self, PubDate, DESCRIPTION_LIMIT};

/// The source that produced a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Momo,
    Sanmin,
    BooksComTw,
    GoogleBooks,
    #[serde(untagged)]
    Other(String),
}

impl SourceKind {
    /// Returns the display name of the source
    pub fn name(&self) -> &str {
        match self {
            SourceKind::Momo => "momo",
            SourceKind::Sanmin => "Sanmin Bookstore",
            SourceKind::BooksComTw => "books.com.tw",
            SourceKind::GoogleBooks => "Google Books",
            SourceKind::Other(s) => s,
        }
    }

    /// Returns the source identifier used in configuration
    pub fn id(&self) -> &str {
        match self {
            SourceKind::Momo => "momo",
            SourceKind::Sanmin => "sanmin",
            SourceKind::BooksComTw => "books_com_tw",
            SourceKind::GoogleBooks => "google_books",
            SourceKind::Other(s) => s,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Metadata for one book, as reported by one source.
///
/// `found == true` always implies a non-empty `title`. `cover_url`, when set, is
/// an absolute `https` URL. `year` and `month` always come from the same date
/// fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,

    /// Authors joined with ", "; empty when the source did not say
    pub author: String,

    pub publisher: Option<String>,

    pub isbn: Option<String>,

    pub year: Option<i32>,

    pub month: Option<u32>,

    pub cover_url: Option<String>,

    /// Bounded to [`DESCRIPTION_LIMIT`] characters
    pub description: Option<String>,

    /// Adapter that produced the record, `None` for a not-found result
    pub source: Option<SourceKind>,

    /// Distinguishes "queried, nothing matched" from a usable record
    pub found: bool,
}

impl BookRecord {
    /// A "queried, nothing matched" result for the given ISBN
    pub fn not_found(isbn: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            publisher: None,
            isbn: Some(isbn.into()).filter(|s: &String| !s.is_empty()),
            year: None,
            month: None,
            cover_url: None,
            description: None,
            source: None,
            found: false,
        }
    }

    /// A source's "queried, nothing matched" answer for an ISBN
    pub fn no_match(source: SourceKind, isbn: impl Into<String>) -> Self {
        Self {
            source: Some(source),
            ..Self::not_found(isbn)
        }
    }

    /// The publication date, if the source gave one
    pub fn pub_date(&self) -> Option<PubDate> {
        self.year.map(|year| PubDate {
            year,
            month: self.month,
        })
    }

    /// Returns the author names as a vector
    pub fn author_list(&self) -> Vec<&str> {
        self.author
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Builder for records produced by adapters.
///
/// Every setter runs the matching normalizer, so adapters cannot emit a
/// protocol-relative cover or an unbounded description.
#[derive(Debug, Clone)]
pub struct BookRecordBuilder {
    record: BookRecord,
}

impl BookRecordBuilder {
    pub fn new(title: impl Into<String>, source: SourceKind) -> Self {
        let title = normalize::clean_text(&title.into());
        Self {
            record: BookRecord {
                title,
                author: String::new(),
                publisher: None,
                isbn: None,
                year: None,
                month: None,
                cover_url: None,
                description: None,
                source: Some(source),
                found: false,
            },
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.record.author = normalize::clean_text(&author.into());
        self
    }

    /// Join several author names, skipping blanks
    pub fn authors<I, S>(self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = authors
            .into_iter()
            .map(|a| normalize::clean_text(a.as_ref()))
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        self.author(joined)
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        let publisher = normalize::clean_text(&publisher.into());
        self.record.publisher = Some(publisher).filter(|p| !p.is_empty());
        self
    }

    pub fn isbn(mut self, isbn: impl Into<String>) -> Self {
        let isbn = isbn.into().trim().to_string();
        self.record.isbn = Some(isbn).filter(|i| !i.is_empty());
        self
    }

    /// Set year and month together from one parsed date
    pub fn pub_date(mut self, date: Option<PubDate>) -> Self {
        if let Some(date) = date {
            self.record.year = Some(date.year);
            self.record.month = date.month;
        }
        self
    }

    /// Set the cover from a raw attribute value, repairing the URL first
    pub fn cover_url(mut self, raw: &str) -> Self {
        if let Some(url) = normalize::repair_cover_url(raw) {
            self.record.cover_url = Some(url);
        }
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        let text = normalize::clean_text(description);
        if !text.is_empty() {
            self.record.description = Some(normalize::truncate(&text, DESCRIPTION_LIMIT));
        }
        self
    }

    pub fn build(mut self) -> BookRecord {
        self.record.found = !self.record.title.is_empty();
        self.record
    }
}
