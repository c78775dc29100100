//! momo mobile storefront source.
//!
//! Search results carry only a title, a cover and a link; ISBN lookups follow
//! the link to the product page for author, publisher, date and description.

use async_trait::async_trait;
use scraper::Html;

use super::markup::{self, selector};
use crate::models::{BookRecord, BookRecordBuilder, LookupMode, SourceKind};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::normalize::{self, PubDate};
use crate::utils::FetchClient;

const MOMO_BASE_URL: &str = "https://m.momoshop.com.tw";

/// momo storefront source
#[derive(Debug, Clone)]
pub struct MomoSource {
    client: FetchClient,
    base_url: String,
}

/// One entry of the search result list
#[derive(Debug, Clone, PartialEq)]
struct Listing {
    title: String,
    detail_url: Option<String>,
    cover: Option<String>,
}

/// Fields read from a product page
#[derive(Debug, Clone, Default, PartialEq)]
struct Detail {
    author: Option<String>,
    publisher: Option<String>,
    date: Option<PubDate>,
    cover: Option<String>,
    description: Option<String>,
}

impl MomoSource {
    pub fn new(client: FetchClient) -> Self {
        Self::with_base_url(client, MOMO_BASE_URL)
    }

    /// Point the source at another host (tests, mirrors)
    pub fn with_base_url(client: FetchClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search.momo?searchKeyword={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    fn parse_listings(
        html: &str,
        page_url: &str,
        limit: usize,
    ) -> Result<Vec<Listing>, SourceError> {
        let document = Html::parse_document(html);
        let item_sel = selector(".goodsItem")?;
        let title_sel = selector(".prdName")?;
        let link_sel = selector("a[href]")?;
        let img_sel = selector("img")?;

        let listings: Vec<Listing> = document
            .select(&item_sel)
            .filter_map(|item| {
                let title = markup::first_text(item, &title_sel)?;
                let detail_url = item
                    .select(&link_sel)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| normalize::resolve_link(page_url, href));
                let cover = item
                    .select(&img_sel)
                    .next()
                    .and_then(|img| markup::image_reference(img, page_url));
                Some(Listing {
                    title,
                    detail_url,
                    cover,
                })
            })
            .take(limit)
            .collect();

        if listings.is_empty() {
            if let Some(marker) = markup::blocked_marker(html) {
                return Err(SourceError::Blocked(marker.to_string()));
            }
        }
        Ok(listings)
    }

    fn parse_detail(html: &str, page_url: &str) -> Result<Detail, SourceError> {
        let document = Html::parse_document(html);
        let attrs_sel = selector(".Area02, .attributesTable")?;
        let cover_sel = selector(".swiper-slide img")?;
        let desc_sel = selector(".Area03")?;

        let mut detail = Detail::default();

        if let Some(block) = document.select(&attrs_sel).next() {
            let text = markup::lines_of(block);
            detail.publisher = markup::labelled_value(&text, &["出版社"]);
            detail.author = markup::labelled_value(&text, &["作者"]);
            detail.date = markup::labelled_value(&text, &["出版日期", "出版日"])
                .and_then(|value| PubDate::extract(&value));
        }

        detail.cover = document
            .select(&cover_sel)
            .next()
            .and_then(|img| markup::image_reference(img, page_url));
        detail.description = document
            .select(&desc_sel)
            .next()
            .map(markup::text_of)
            .filter(|d| !d.is_empty());

        Ok(detail)
    }

    fn listing_builder(listing: &Listing) -> BookRecordBuilder {
        let builder = BookRecordBuilder::new(listing.title.as_str(), SourceKind::Momo);
        match &listing.cover {
            Some(cover) => builder.cover_url(cover),
            None => builder,
        }
    }

    fn apply_detail(mut builder: BookRecordBuilder, detail: Detail) -> BookRecordBuilder {
        if let Some(author) = detail.author {
            builder = builder.author(author);
        }
        if let Some(publisher) = detail.publisher {
            builder = builder.publisher(publisher);
        }
        builder = builder.pub_date(detail.date);
        if let Some(cover) = detail.cover {
            builder = builder.cover_url(&cover);
        }
        if let Some(description) = detail.description {
            builder = builder.description(&description);
        }
        builder
    }

    async fn fetch_detail(&self, url: &str) -> Result<Detail, SourceError> {
        let page = self.client.get_page(url, LookupMode::Exact, &[]).await?;
        Self::parse_detail(&page.body, &page.url)
    }
}

#[async_trait]
impl Source for MomoSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Momo
    }

    fn id(&self) -> &str {
        "momo"
    }

    fn name(&self) -> &str {
        "momo"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::ISBN_LOOKUP
            | SourceCapabilities::KEYWORD_SEARCH
            | SourceCapabilities::DETAIL_PAGE
    }

    async fn resolve_by_isbn(&self, isbn: &str) -> Result<BookRecord, SourceError> {
        let page = self
            .client
            .get_page(&self.search_url(isbn), LookupMode::Exact, &[])
            .await?;
        let listing = match Self::parse_listings(&page.body, &page.url, 1)?
            .into_iter()
            .next()
        {
            Some(listing) => listing,
            None => return Ok(BookRecord::no_match(SourceKind::Momo, isbn)),
        };

        let mut builder = Self::listing_builder(&listing).isbn(isbn);

        if let Some(detail_url) = &listing.detail_url {
            match self.fetch_detail(detail_url).await {
                Ok(detail) => builder = Self::apply_detail(builder, detail),
                Err(e) => {
                    tracing::warn!(
                        source = "momo",
                        url = %detail_url,
                        error = %e,
                        "detail page unavailable, keeping list fields"
                    )
                }
            }
        }

        Ok(builder.build())
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
        let listings = Self::parse_listings(&page.body, &page.url, limit)?;

        Ok(listings
            .iter()
            .map(|listing| Self::listing_builder(listing).build())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::FetchSettings;

    const LIST_HTML: &str = r#"
        <html><body>
          <ul>
            <li class="goodsItem">
              <a href="/goods.momo?i_code=1001">
                <img src="/img/blank.gif" data-original="//img.momoshop.com.tw/goodsimg/1001.jpg">
                <h3 class="prdName">  三體  </h3>
              </a>
            </li>
            <li class="goodsItem">
              <a href="/goods.momo?i_code=1002">
                <img src="http://img.momoshop.com.tw/goodsimg/1002.jpg">
                <h3 class="prdName">三體II：黑暗森林</h3>
              </a>
            </li>
            <li class="goodsItem"><h3 class="prdName"> </h3></li>
          </ul>
        </body></html>
    "#;

    const DETAIL_HTML: &str = r#"
        <html><body>
          <div class="swiper-slide"><img src="//img.momoshop.com.tw/goodsimg/1001_L.jpg"></div>
          <div class="Area02">
            <ul>
              <li><span>作者：</span><span>劉慈欣</span></li>
              <li>出版社：貓頭鷹</li>
              <li>出版日：2011/12/01</li>
            </ul>
          </div>
          <div class="Area03"><p>文化大革命如火如荼進行，</p><p>軍方探尋外星文明的絕秘計畫。</p></div>
        </body></html>
    "#;

    fn client() -> FetchClient {
        FetchClient::new(FetchSettings::deterministic()).unwrap()
    }

    #[test]
    fn test_parse_listings() {
        let listings =
            MomoSource::parse_listings(LIST_HTML, "https://m.momoshop.com.tw/search.momo", 10)
                .unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].title, "三體");
        assert_eq!(
            listings[0].detail_url.as_deref(),
            Some("https://m.momoshop.com.tw/goods.momo?i_code=1001")
        );
        assert_eq!(
            listings[0].cover.as_deref(),
            Some("//img.momoshop.com.tw/goodsimg/1001.jpg")
        );
    }

    #[test]
    fn test_parse_detail() {
        let detail =
            MomoSource::parse_detail(DETAIL_HTML, "https://m.momoshop.com.tw/goods.momo").unwrap();

        assert_eq!(detail.author.as_deref(), Some("劉慈欣"));
        assert_eq!(detail.publisher.as_deref(), Some("貓頭鷹"));
        assert_eq!(
            detail.date,
            Some(PubDate {
                year: 2011,
                month: Some(12)
            })
        );
        assert!(detail.description.unwrap().starts_with("文化大革命"));
    }

    #[test]
    fn test_search_url_encodes_query() {
        let source = MomoSource::new(client());
        assert_eq!(
            source.search_url("三體 劉慈欣"),
            "https://m.momoshop.com.tw/search.momo?searchKeyword=%E4%B8%89%E9%AB%94%20%E5%8A%89%E6%85%88%E6%AC%A3"
        );
    }

    #[tokio::test]
    async fn test_resolve_by_isbn_follows_detail_page() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("GET", "/search.momo")
            .match_query(mockito::Matcher::UrlEncoded(
                "searchKeyword".into(),
                "9789573317241".into(),
            ))
            .with_status(200)
            .with_body(LIST_HTML)
            .create_async()
            .await;
        let detail = server
            .mock("GET", "/goods.momo")
            .match_query(mockito::Matcher::UrlEncoded("i_code".into(), "1001".into()))
            .with_status(200)
            .with_body(DETAIL_HTML)
            .create_async()
            .await;

        let source = MomoSource::with_base_url(client(), server.url());
        let record = source.resolve_by_isbn("9789573317241").await.unwrap();

        list.assert_async().await;
        detail.assert_async().await;
        assert!(record.found);
        assert_eq!(record.title, "三體");
        assert_eq!(record.author, "劉慈欣");
        assert_eq!(record.publisher.as_deref(), Some("貓頭鷹"));
        assert_eq!((record.year, record.month), (Some(2011), Some(12)));
        assert_eq!(
            record.cover_url.as_deref(),
            Some("https://img.momoshop.com.tw/goodsimg/1001_L.jpg")
        );
        assert_eq!(record.isbn.as_deref(), Some("9789573317241"));
        assert_eq!(record.source, Some(SourceKind::Momo));
    }

    #[tokio::test]
    async fn test_detail_failure_keeps_list_fields() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/search.momo")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(LIST_HTML)
            .create_async()
            .await;
        let _detail = server
            .mock("GET", "/goods.momo")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let source = MomoSource::with_base_url(client(), server.url());
        let record = source.resolve_by_isbn("9789573317241").await.unwrap();

        assert!(record.found);
        assert_eq!(record.title, "三體");
        assert_eq!(record.author, "");
        assert_eq!(
            record.cover_url.as_deref(),
            Some("https://img.momoshop.com.tw/goodsimg/1001.jpg")
        );
    }

    #[tokio::test]
    async fn test_keyword_search_is_list_only() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("GET", "/search.momo")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(LIST_HTML)
            .expect(1)
            .create_async()
            .await;
        let detail = server
            .mock("GET", "/goods.momo")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let source = MomoSource::with_base_url(client(), server.url());
        let records = source.search_by_keyword("三體", 5).await.unwrap();

        list.assert_async().await;
        detail.assert_async().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].title, "三體II：黑暗森林");
        assert_eq!(
            records[1].cover_url.as_deref(),
            Some("https://img.momoshop.com.tw/goodsimg/1002.jpg")
        );
        assert!(records.iter().all(|r| r.author.is_empty() && r.year.is_none()));
    }

    #[tokio::test]
    async fn test_empty_results_are_no_match() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/search.momo")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html><body><p>查無商品</p></body></html>")
            .create_async()
            .await;

        let source = MomoSource::with_base_url(client(), server.url());
        let record = source.resolve_by_isbn("9780000000002").await.unwrap();
        assert!(!record.found);
    }

    #[tokio::test]
    async fn test_blocked_page_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/search.momo")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html><body><div id='captcha'>verify</div></body></html>")
            .create_async()
            .await;

        let source = MomoSource::with_base_url(client(), server.url());
        let result = source.search_by_keyword("三體", 5).await;
        assert!(matches!(result, Err(SourceError::Blocked(_))));
    }
}
