//! Sanmin bookstore source.

use async_trait::async_trait;
use scraper::Html;

use super::markup::{self, selector};
use crate::models::{BookRecord, BookRecordBuilder, LookupMode, SourceKind};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::normalize::PubDate;
use crate::utils::FetchClient;

const SANMIN_BASE_URL: &str = "https://www.sanmin.com.tw";

/// Sanmin bookstore search page source
///
/// The search result list already carries every field, so one request per
/// lookup is enough in both modes.
#[derive(Debug, Clone)]
pub struct SanminSource {
    client: FetchClient,
    base_url: String,
}

impl SanminSource {
    pub fn new(client: FetchClient) -> Self {
        Self::with_base_url(client, SANMIN_BASE_URL)
    }

    pub fn with_base_url(client: FetchClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search/index?ct=all&k={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    /// Parse up to `limit` result items into records
    fn parse_results(
        html: &str,
        page_url: &str,
        limit: usize,
    ) -> Result<Vec<BookRecord>, SourceError> {
        let document = Html::parse_document(html);
        let item_sel = selector(".SearchItem")?;
        let title_sel = selector(".ProdName")?;
        let author_sel = selector(".Author")?;
        let publisher_sel = selector(".Publisher")?;
        let date_sel = selector(".PubDate")?;
        let img_sel = selector("img")?;

        let mut records = Vec::new();
        for item in document.select(&item_sel) {
            if records.len() >= limit {
                break;
            }
            let Some(title) = markup::first_text(item, &title_sel) else {
                continue;
            };

            let mut builder = BookRecordBuilder::new(title, SourceKind::Sanmin);
            if let Some(author) = markup::first_text(item, &author_sel) {
                builder = builder.author(markup::strip_label(&author, &["作者"]));
            }
            if let Some(publisher) = markup::first_text(item, &publisher_sel) {
                builder = builder.publisher(markup::strip_label(&publisher, &["出版社"]));
            }
            builder = builder.pub_date(
                markup::first_text(item, &date_sel).and_then(|d| PubDate::extract(&d)),
            );
            if let Some(cover) = item
                .select(&img_sel)
                .next()
                .and_then(|img| markup::image_reference(img, page_url))
            {
                builder = builder.cover_url(&cover);
            }

            records.push(builder.build());
        }

        if records.is_empty() {
            if let Some(marker) = markup::blocked_marker(html) {
                return Err(SourceError::Blocked(marker.to_string()));
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl Source for SanminSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Sanmin
    }

    fn id(&self) -> &str {
        "sanmin"
    }

    fn name(&self) -> &str {
        "Sanmin Bookstore"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::ISBN_LOOKUP | SourceCapabilities::KEYWORD_SEARCH
    }

    async fn resolve_by_isbn(&self, isbn: &str) -> Result<BookRecord, SourceError> {
        let page = self
            .client
            .get_page(&self.search_url(isbn), LookupMode::Exact, &[])
            .await?;

        let record = Self::parse_results(&page.body, &page.url, 1)?
            .into_iter()
            .next()
            .map(|mut record| {
                record.isbn = Some(isbn.to_string());
                record
            })
            .unwrap_or_else(|| BookRecord::no_match(SourceKind::Sanmin, isbn));
        Ok(record)
    }

    async fn search_by_keyword(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<BookRecord>, SourceError> {
        let page = self
            .client
            .get_page(&self.search_url(keyword), LookupMode::Fuzzy, &[])
            .await?;
        Self::parse_results(&page.body, &page.url, limit)
    }
}
