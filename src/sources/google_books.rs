//! Google Books volumes API source.

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{BookRecord, BookRecordBuilder, LookupMode, SourceKind};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::normalize::PubDate;
use crate::utils::FetchClient;

const GOOGLE_BOOKS_API_URL: &str = "https://www.googleapis.com/books/v1/volumes";

/// The API caps `maxResults` at 40
const MAX_RESULTS_CAP: usize = 40;

/// Google Books source
///
/// A public JSON API: no disguise, no pacing. It is the last link of the ISBN
/// chain because it covers regional titles least well.
#[derive(Debug, Clone)]
pub struct GoogleBooksSource {
    client: FetchClient,
    api_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumesResponse {
    #[serde(default)]
    total_items: u32,
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    image_links: Option<ImageLinks>,
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ImageLinks {
    large: Option<String>,
    medium: Option<String>,
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

impl VolumeInfo {
    fn cover(&self) -> Option<&str> {
        let links = self.image_links.as_ref()?;
        links
            .large
            .as_deref()
            .or(links.medium.as_deref())
            .or(links.thumbnail.as_deref())
            .or(links.small_thumbnail.as_deref())
    }

    /// ISBN-13 when listed, otherwise ISBN-10
    fn isbn(&self) -> Option<&str> {
        let find = |kind: &str| {
            self.industry_identifiers
                .iter()
                .find(|id| id.kind == kind)
                .map(|id| id.identifier.as_str())
        };
        find("ISBN_13").or_else(|| find("ISBN_10"))
    }

    fn into_record(self) -> BookRecord {
        let title = match (&self.title, &self.subtitle) {
            (Some(title), Some(subtitle)) if !subtitle.trim().is_empty() => {
                format!("{}: {}", title.trim(), subtitle.trim())
            }
            (Some(title), _) => title.clone(),
            (None, _) => String::new(),
        };

        let mut builder = BookRecordBuilder::new(title, SourceKind::GoogleBooks)
            .authors(&self.authors)
            .pub_date(self.published_date.as_deref().and_then(PubDate::from_iso));
        if let Some(publisher) = &self.publisher {
            builder = builder.publisher(publisher.as_str());
        }
        if let Some(isbn) = self.isbn() {
            builder = builder.isbn(isbn);
        }
        if let Some(cover) = self.cover() {
            builder = builder.cover_url(cover);
        }
        if let Some(description) = &self.description {
            builder = builder.description(description);
        }
        builder.build()
    }
}

impl GoogleBooksSource {
    pub fn new(client: FetchClient) -> Self {
        Self::with_api_url(client, GOOGLE_BOOKS_API_URL)
    }

    pub fn with_api_url(client: FetchClient, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    async fn query(
        &self,
        url: &str,
        mode: LookupMode,
    ) -> Result<VolumesResponse, SourceError> {
        let raw = self.client.api_get(url, mode).await?;
        let response: VolumesResponse = serde_json::from_str(&raw.body)?;
        Ok(response)
    }

    fn parse_volumes(response: VolumesResponse, limit: usize) -> Vec<BookRecord> {
        if response.total_items == 0 {
            return Vec::new();
        }
        response
            .items
            .into_iter()
            .map(|v| v.volume_info.into_record())
            .filter(|r| r.found)
            .take(limit)
            .collect()
    }
}

#[async_trait]
impl Source for GoogleBooksSource {
    fn kind(&self) -> SourceKind {
        SourceKind::GoogleBooks
    }

    fn id(&self) -> &str {
        "google_books"
    }

    fn name(&self) -> &str {
        "Google Books"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::ISBN_LOOKUP | SourceCapabilities::KEYWORD_SEARCH
    }

    async fn resolve_by_isbn(&self, isbn: &str) -> Result<BookRecord, SourceError> {
        let url = format!(
            "{}?q={}",
            self.api_url,
            urlencoding::encode(&format!("isbn:{}", isbn))
        );
        let response = self.query(&url, LookupMode::Exact).await?;

        let record = Self::parse_volumes(response, 1)
            .into_iter()
            .next()
            .map(|mut record| {
                if record.isbn.is_none() {
                    record.isbn = Some(isbn.to_string());
                }
                record
            })
            .unwrap_or_else(|| BookRecord::no_match(SourceKind::GoogleBooks, isbn));
        Ok(record)
    }

    async fn search_by_keyword(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<BookRecord>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}?q={}&maxResults={}",
            self.api_url,
            urlencoding::encode(keyword),
            limit.min(MAX_RESULTS_CAP)
        );
        let response = self.query(&url, LookupMode::Fuzzy).await?;
        Ok(Self::parse_volumes(response, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::FetchSettings;
    use mockito::Matcher;

    const VOLUME_JSON: &str = r#"{
        "kind": "books#volumes",
        "totalItems": 1,
        "items": [{
            "volumeInfo": {
                "title": "The Pragmatic Programmer",
                "subtitle": "Your Journey to Mastery",
                "authors": ["David Thomas", "Andrew Hunt"],
                "publisher": "Addison-Wesley Professional",
                "publishedDate": "2019-09-13",
                "description": "Straight from the programming trenches.",
                "industryIdentifiers": [
                    {"type": "ISBN_10", "identifier": "0135957052"},
                    {"type": "ISBN_13", "identifier": "9780135957059"}
                ],
                "imageLinks": {
                    "smallThumbnail": "http://books.google.com/books/content?id=x&zoom=5",
                    "thumbnail": "http://books.google.com/books/content?id=x&zoom=1"
                }
            }
        }]
    }"#;

    fn client() -> FetchClient {
        FetchClient::new(FetchSettings::deterministic()).unwrap()
    }

    #[test]
    fn test_volume_into_record() {
        let response: VolumesResponse = serde_json::from_str(VOLUME_JSON).unwrap();
        let records = GoogleBooksSource::parse_volumes(response, 5);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(
            record.title,
            "The Pragmatic Programmer: Your Journey to Mastery"
        );
        assert_eq!(record.author, "David Thomas, Andrew Hunt");
        assert_eq!(record.isbn.as_deref(), Some("9780135957059"));
        assert_eq!((record.year, record.month), (Some(2019), Some(9)));
        assert_eq!(
            record.cover_url.as_deref(),
            Some("https://books.google.com/books/content?id=x&zoom=1")
        );
    }

    #[test]
    fn test_year_only_date() {
        let json = r#"{"totalItems": 1, "items": [{"volumeInfo": {"title": "Old", "publishedDate": "1998"}}]}"#;
        let response: VolumesResponse = serde_json::from_str(json).unwrap();
        let records = GoogleBooksSource::parse_volumes(response, 1);
        assert_eq!((records[0].year, records[0].month), (Some(1998), None));
    }

    #[test]
    fn test_zero_total_items() {
        let response: VolumesResponse =
            serde_json::from_str(r#"{"kind": "books#volumes", "totalItems": 0}"#).unwrap();
        assert!(GoogleBooksSource::parse_volumes(response, 5).is_empty());
    }

    #[tokio::test]
    async fn test_resolve_by_isbn() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/volumes")
            .match_query(Matcher::UrlEncoded("q".into(), "isbn:9780135957059".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(VOLUME_JSON)
            .expect(1)
            .create_async()
            .await;

        let source = GoogleBooksSource::with_api_url(client(), format!("{}/volumes", server.url()));
        let record = source.resolve_by_isbn("9780135957059").await.unwrap();

        mock.assert_async().await;
        assert!(record.found);
        assert_eq!(record.source, Some(SourceKind::GoogleBooks));
        assert_eq!(record.publisher.as_deref(), Some("Addison-Wesley Professional"));
    }

    #[tokio::test]
    async fn test_keyword_search_sends_max_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/volumes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "pragmatic programmer".into()),
                Matcher::UrlEncoded("maxResults".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body(VOLUME_JSON)
            .create_async()
            .await;

        let source = GoogleBooksSource::with_api_url(client(), format!("{}/volumes", server.url()));
        let records = source
            .search_by_keyword("pragmatic programmer", 5)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_no_items_is_no_match() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/volumes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"kind": "books#volumes", "totalItems": 0}"#)
            .create_async()
            .await;

        let source = GoogleBooksSource::with_api_url(client(), format!("{}/volumes", server.url()));
        let record = source.resolve_by_isbn("9780000000002").await.unwrap();
        assert!(!record.found);
    }

    #[tokio::test]
    async fn test_malformed_json_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/volumes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let source = GoogleBooksSource::with_api_url(client(), format!("{}/volumes", server.url()));
        let result = source.resolve_by_isbn("9780135957059").await;
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }
}
