//! books.com.tw source.
//!
//! The search host only answers sessions that first visited the storefront
//! home page, so every lookup opens its own cookie session, warms it up and
//! then searches with a matching `Referer`.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::markup::{self, selector};
use crate::models::{BookRecord, BookRecordBuilder, LookupMode, SourceKind};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::normalize::{self, PubDate};
use crate::utils::{FetchClient, FetchSession};

const BOOKS_HOME_URL: &str = "https://www.books.com.tw/";
const BOOKS_SEARCH_URL: &str = "https://search.books.com.tw";

/// books.com.tw source
#[derive(Debug, Clone)]
pub struct BooksComTwSource {
    client: FetchClient,
    home_url: String,
    search_base: String,
}

/// One search result plus the link to its product page
#[derive(Debug, Clone)]
struct SearchHit {
    record: BookRecord,
    detail_url: Option<String>,
}

/// Fields read from a product page
#[derive(Debug, Clone, Default, PartialEq)]
struct Detail {
    description: Option<String>,
    date: Option<PubDate>,
}

impl BooksComTwSource {
    pub fn new(client: FetchClient) -> Self {
        Self::with_endpoints(client, BOOKS_HOME_URL, BOOKS_SEARCH_URL)
    }

    /// Use other warm-up and search hosts (tests, mirrors)
    pub fn with_endpoints(
        client: FetchClient,
        home_url: impl Into<String>,
        search_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            home_url: home_url.into(),
            search_base: search_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search/query/key/{}/cat/all",
            self.search_base,
            urlencoding::encode(query)
        )
    }

    /// Open a session and visit the home page so the search host accepts us.
    ///
    /// A failed warm-up is logged and the search is attempted anyway.
    async fn warm_session(&self, mode: LookupMode) -> Result<FetchSession, SourceError> {
        let session = self.client.session()?;
        match session.get(&self.home_url, mode, &[]).await {
            Ok(raw) if raw.is_success() => {}
            Ok(raw) => {
                tracing::debug!(source = "books_com_tw", status = raw.status, "warm-up rejected")
            }
            Err(e) => tracing::debug!(source = "books_com_tw", error = %e, "warm-up failed"),
        }
        Ok(session)
    }

    async fn search(
        &self,
        session: &FetchSession,
        query: &str,
        mode: LookupMode,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SourceError> {
        let page = session
            .get_page(
                &self.search_url(query),
                mode,
                &[("Referer", self.home_url.as_str())],
            )
            .await?;
        Self::parse_results(&page.body, &page.url, limit)
    }

    fn parse_results(
        html: &str,
        page_url: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SourceError> {
        let document = Html::parse_document(html);
        let table_sel = selector(".table-search-tbody .table-td")?;
        let list_sel = selector("li.item")?;
        let fields = ItemSelectors::new()?;

        let mut items: Vec<ElementRef<'_>> = document.select(&table_sel).collect();
        if items.is_empty() {
            items = document.select(&list_sel).collect();
        }

        let hits: Vec<SearchHit> = items
            .into_iter()
            .filter_map(|item| Self::parse_item(item, page_url, &fields))
            .take(limit)
            .collect();

        if hits.is_empty() {
            if let Some(marker) = markup::blocked_marker(html) {
                return Err(SourceError::Blocked(marker.to_string()));
            }
        }
        Ok(hits)
    }

    fn parse_item(
        item: ElementRef<'_>,
        page_url: &str,
        fields: &ItemSelectors,
    ) -> Option<SearchHit> {
        let link = item
            .select(&fields.title_h4)
            .next()
            .or_else(|| item.select(&fields.title_h3).next())?;

        let title = link
            .value()
            .attr("title")
            .map(normalize::clean_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| markup::text_of(link));
        if title.is_empty() {
            return None;
        }

        let authors: Vec<String> = item.select(&fields.author).map(markup::text_of).collect();
        let mut builder = BookRecordBuilder::new(title, SourceKind::BooksComTw)
            .authors(authors)
            .pub_date(PubDate::extract(&markup::lines_of(item)));
        if let Some(publisher) = markup::first_text(item, &fields.publisher) {
            builder = builder.publisher(publisher);
        }
        if let Some(cover) = item
            .select(&fields.image)
            .next()
            .and_then(|img| markup::image_reference(img, page_url))
        {
            builder = builder.cover_url(&cover);
        }

        let detail_url = link
            .value()
            .attr("href")
            .and_then(|href| normalize::resolve_link(page_url, href));

        Some(SearchHit {
            record: builder.build(),
            detail_url,
        })
    }

    fn parse_detail(html: &str) -> Result<Detail, SourceError> {
        let document = Html::parse_document(html);
        let desc_sel = selector(".bd div.content")?;

        let description = document
            .select(&desc_sel)
            .next()
            .map(markup::text_of)
            .filter(|d| !d.is_empty());
        let lines = markup::lines_of(document.root_element());
        let date = markup::labelled_value(&lines, &["出版日期"]).and_then(|v| PubDate::extract(&v));

        Ok(Detail { description, date })
    }

    async fn fetch_detail(&self, session: &FetchSession, url: &str) -> Result<Detail, SourceError> {
        let page = session
            .get_page(url, LookupMode::Exact, &[("Referer", self.search_base.as_str())])
            .await?;
        Self::parse_detail(&page.body)
    }
}

/// Selectors applied to every result item
struct ItemSelectors {
    title_h4: Selector,
    title_h3: Selector,
    author: Selector,
    publisher: Selector,
    image: Selector,
}

impl ItemSelectors {
    fn new() -> Result<Self, SourceError> {
        Ok(Self {
            title_h4: selector("h4 a")?,
            title_h3: selector("h3 a")?,
            author: selector(r#"a[rel="go_author"]"#)?,
            publisher: selector(r#"a[rel="go_publisher"]"#)?,
            image: selector("img")?,
        })
    }
}

#[async_trait]
impl Source for BooksComTwSource {
    fn kind(&self) -> SourceKind {
        SourceKind::BooksComTw
    }

    fn id(&self) -> &str {
        "books_com_tw"
    }

    fn name(&self) -> &str {
        "books.com.tw"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::ISBN_LOOKUP
            | SourceCapabilities::KEYWORD_SEARCH
            | SourceCapabilities::DETAIL_PAGE
            | SourceCapabilities::WARM_UP
    }

    async fn resolve_by_isbn(&self, isbn: &str) -> Result<BookRecord, SourceError> {
        let session = self.warm_session(LookupMode::Exact).await?;
        let hit = match self
            .search(&session, isbn, LookupMode::Exact, 1)
            .await?
            .into_iter()
            .next()
        {
            Some(hit) => hit,
            None => return Ok(BookRecord::no_match(SourceKind::BooksComTw, isbn)),
        };

        let mut record = hit.record;
        record.isbn = Some(isbn.to_string());

        if let Some(detail_url) = hit.detail_url {
            match self.fetch_detail(&session, &detail_url).await {
                Ok(detail) => {
                    if let Some(description) = detail.description {
                        record.description = Some(normalize::truncate(
                            &description,
                            normalize::DESCRIPTION_LIMIT,
                        ));
                    }
                    if let Some(date) = detail.date {
                        record.year = Some(date.year);
                        record.month = date.month;
                    }
                }
                Err(e) => tracing::warn!(
                    source = "books_com_tw",
                    url = %detail_url,
                    error = %e,
                    "detail page unavailable, keeping list fields"
                ),
            }
        }

        Ok(record)
    }

    async fn search_by_keyword(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<BookRecord>, SourceError> {
        let session = self.warm_session(LookupMode::Fuzzy).await?;
        let hits = self.search(&session, keyword, LookupMode::Fuzzy, limit).await?;
        Ok(hits.into_iter().map(|hit| hit.record).collect())
    }
}
